use image::RgbaImage;

use crate::geometry::{Color, ImagePoint, SelectionRect};

const DEFAULT_TOLERANCE: u8 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRegionKind {
    Rectangle,
    Lasso,
}

/// A selected image fragment that can be moved, scaled and re-placed.
///
/// `original_*` fields keep where the fragment was cut from so the hole can be
/// filled on placement. Lasso fragments keep their path relative to the image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRegion {
    pub id: u64,
    pub kind: ImageRegionKind,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub original_x: f64,
    pub original_y: f64,
    pub original_w: f64,
    pub original_h: f64,
    pub image: RgbaImage,
    pub original_image: RgbaImage,
    pub bg_color: Color,
    pub transparent_bg: bool,
    pub tolerance: u8,
    pub rotation: f64,
    pub scale: f64,
    pub lasso_path: Option<Vec<ImagePoint>>,
    pub original_lasso_path: Option<Vec<ImagePoint>>,
}

impl ImageRegion {
    pub fn new(
        id: u64,
        kind: ImageRegionKind,
        rect: SelectionRect,
        pixels: RgbaImage,
        lasso_path: Option<Vec<ImagePoint>>,
    ) -> Self {
        Self {
            id,
            kind,
            x: rect.x,
            y: rect.y,
            w: rect.w,
            h: rect.h,
            original_x: rect.x,
            original_y: rect.y,
            original_w: rect.w,
            original_h: rect.h,
            original_image: pixels.clone(),
            image: pixels,
            bg_color: Color::WHITE,
            transparent_bg: false,
            tolerance: DEFAULT_TOLERANCE,
            rotation: 0.0,
            scale: 1.0,
            original_lasso_path: lasso_path.clone(),
            lasso_path,
        }
    }

    pub const fn rect(&self) -> SelectionRect {
        SelectionRect::new(self.x, self.y, self.w, self.h)
    }

    pub const fn original_rect(&self) -> SelectionRect {
        SelectionRect::new(
            self.original_x,
            self.original_y,
            self.original_w,
            self.original_h,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageRegionUpdate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub bg_color: Option<Color>,
    pub transparent_bg: Option<bool>,
    pub tolerance: Option<u8>,
    pub rotation: Option<f64>,
    pub scale: Option<f64>,
}

impl ImageRegionUpdate {
    pub fn move_to(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub(crate) fn resulting_scale(&self, region: &ImageRegion) -> f64 {
        self.scale.unwrap_or(region.scale)
    }

    /// Displayed width and height once the update is applied.
    pub(crate) fn resulting_extent(&self, region: &ImageRegion) -> (f64, f64) {
        match self.scale {
            Some(scale) => (region.original_w * scale, region.original_h * scale),
            None => (region.w, region.h),
        }
    }

    /// Merges the update; the displayed extent follows the scale.
    pub(crate) fn apply_to(self, region: &mut ImageRegion) {
        if let Some(x) = self.x {
            if let Some(path) = region.lasso_path.as_mut() {
                path.iter_mut().for_each(|point| point.x += x - region.x);
            }
            region.x = x;
        }
        if let Some(y) = self.y {
            if let Some(path) = region.lasso_path.as_mut() {
                path.iter_mut().for_each(|point| point.y += y - region.y);
            }
            region.y = y;
        }
        if let Some(bg_color) = self.bg_color {
            region.bg_color = bg_color;
        }
        if let Some(transparent_bg) = self.transparent_bg {
            region.transparent_bg = transparent_bg;
        }
        if let Some(tolerance) = self.tolerance {
            region.tolerance = tolerance;
        }
        if let Some(rotation) = self.rotation {
            region.rotation = rotation;
        }
        if let Some(scale) = self.scale {
            region.scale = scale;
            region.w = region.original_w * scale;
            region.h = region.original_h * scale;
        }
    }
}
