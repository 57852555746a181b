//! Editing core: regions, snapshot history, compositing and the session that
//! ties them to pointer input.

pub mod compose;
pub mod history;
pub mod image_region;
pub mod region;
pub mod session;
pub mod store;
pub mod viewport;

pub use compose::{BlockGlyphRenderer, TextRenderer};
pub use history::{HistoryError, HistoryItem, SnapshotHistory, DEFAULT_HISTORY_CAPACITY};
pub use image_region::{ImageRegion, ImageRegionKind, ImageRegionUpdate};
pub use region::{RecognitionState, Region, RegionStyle, RegionUpdate};
pub use session::{EditorSession, PointerOutcome, SessionError, SessionOptions, SessionResult};
pub use store::{RegionSet, RegionStore, StoreError, StoreResult};
pub use viewport::{fit_scale, DisplayTransform};

/// Toolbar modes. Only a few of them start a selection drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorMode {
    #[default]
    Select,
    Region,
    ImageSelect,
    Lasso,
    MagicWand,
    Eyedropper,
    Crop,
    Brush,
    Shape,
    Arrow,
    Marker,
    Mosaic,
    Blur,
}

impl EditorMode {
    pub const fn is_selection_capable(self) -> bool {
        matches!(self, Self::Region | Self::ImageSelect | Self::Lasso)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Region => "region",
            Self::ImageSelect => "image-select",
            Self::Lasso => "lasso",
            Self::MagicWand => "magic-wand",
            Self::Eyedropper => "eyedropper",
            Self::Crop => "crop",
            Self::Brush => "brush",
            Self::Shape => "shape",
            Self::Arrow => "arrow",
            Self::Marker => "marker",
            Self::Mosaic => "mosaic",
            Self::Blur => "blur",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_region_and_image_selection_modes_start_drags() {
        let capable = [EditorMode::Region, EditorMode::ImageSelect, EditorMode::Lasso];
        let others = [
            EditorMode::Select,
            EditorMode::MagicWand,
            EditorMode::Eyedropper,
            EditorMode::Crop,
            EditorMode::Brush,
            EditorMode::Shape,
            EditorMode::Arrow,
            EditorMode::Marker,
            EditorMode::Mosaic,
            EditorMode::Blur,
        ];
        assert!(capable.iter().all(|mode| mode.is_selection_capable()));
        assert!(others.iter().all(|mode| !mode.is_selection_capable()));
    }

    #[test]
    fn default_mode_is_select() {
        assert_eq!(EditorMode::default(), EditorMode::Select);
        assert_eq!(EditorMode::ImageSelect.as_str(), "image-select");
    }
}
