use crate::geometry::{DisplayPoint, ImageBounds, ImagePoint};

/// Padding reserved around the canvas when fitting an image to its container.
pub const DEFAULT_FIT_PADDING: f64 = 64.0;

/// Maps pointer positions between display space and image space.
///
/// `origin` is the on-screen top-left of the rendered image; `scale` is the
/// display scale (1.0 shows one image pixel per display unit). The scale is
/// always positive; constructors reject anything else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    origin: DisplayPoint,
    scale: f64,
}

impl Default for DisplayTransform {
    fn default() -> Self {
        Self {
            origin: DisplayPoint::new(0.0, 0.0),
            scale: 1.0,
        }
    }
}

impl DisplayTransform {
    pub fn new(origin: DisplayPoint, scale: f64) -> Option<Self> {
        is_valid_scale(scale).then_some(Self { origin, scale })
    }

    pub const fn origin(&self) -> DisplayPoint {
        self.origin
    }

    pub const fn scale(&self) -> f64 {
        self.scale
    }

    pub fn zoom_percent(&self) -> u32 {
        (self.scale * 100.0).round() as u32
    }

    pub fn set_origin(&mut self, origin: DisplayPoint) {
        self.origin = origin;
    }

    /// Returns `false` and leaves the transform untouched for non-positive scales.
    pub fn set_scale(&mut self, scale: f64) -> bool {
        if !is_valid_scale(scale) {
            tracing::warn!(scale, "ignoring non-positive display scale");
            return false;
        }
        self.scale = scale;
        true
    }

    pub fn to_image_space(&self, point: DisplayPoint) -> ImagePoint {
        let (x, y) = to_image_space(point.x, point.y, self.origin.x, self.origin.y, self.scale);
        ImagePoint::new(x, y)
    }

    pub fn to_display_space(&self, point: ImagePoint) -> DisplayPoint {
        DisplayPoint::new(
            point.x * self.scale + self.origin.x,
            point.y * self.scale + self.origin.y,
        )
    }
}

/// `(pointer - origin) / scale` on both axes.
pub fn to_image_space(
    pointer_x: f64,
    pointer_y: f64,
    origin_x: f64,
    origin_y: f64,
    display_scale: f64,
) -> (f64, f64) {
    debug_assert!(
        is_valid_scale(display_scale),
        "display scale must be positive, got {display_scale}"
    );
    (
        (pointer_x - origin_x) / display_scale,
        (pointer_y - origin_y) / display_scale,
    )
}

/// Largest scale that fits `image` inside the padded container without upscaling.
///
/// Returns `None` when the image is empty or the padded container has no room.
pub fn fit_scale(
    container_width: f64,
    container_height: f64,
    padding: f64,
    image: ImageBounds,
) -> Option<f64> {
    if image.width == 0 || image.height == 0 {
        return None;
    }
    let available_width = container_width - padding;
    let available_height = container_height - padding;
    let scale = (available_width / f64::from(image.width))
        .min(available_height / f64::from(image.height))
        .min(1.0);
    is_valid_scale(scale).then_some(scale)
}

fn is_valid_scale(scale: f64) -> bool {
    scale.is_finite() && scale > 0.0
}
