use crate::geometry::ImagePoint;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        start: ImagePoint,
    },
}

impl DragState {
    pub const fn is_dragging(&self) -> bool {
        matches!(self, Self::Dragging { .. })
    }

    pub const fn start(&self) -> Option<ImagePoint> {
        match self {
            Self::Idle => None,
            Self::Dragging { start } => Some(*start),
        }
    }
}
