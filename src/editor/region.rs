use image::RgbaImage;

use crate::geometry::{Color, SelectionRect};

/// Text shown while a region waits for recognition.
pub const RECOGNITION_PENDING_TEXT: &str = "識別中...";
/// Text a region falls back to when recognition fails.
pub const RECOGNITION_FAILED_TEXT: &str = "[識別失敗]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientDirection {
    Horizontal,
    Vertical,
    Diagonal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gradient {
    pub from: Color,
    pub to: Color,
    pub direction: GradientDirection,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStroke {
    pub color: Color,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextShadow {
    pub color: Color,
    pub blur: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

/// Parameters for text laid out along an arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveOptions {
    pub radius: f64,
    pub start_angle: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionStyle {
    pub font_family: String,
    pub font_size: f64,
    pub font_weight: u16,
    pub scale_y: f64,
    pub color: Color,
    pub bg_color: Color,
    pub transparent_bg: bool,
    pub padding: f64,
    pub text_align: TextAlign,
    pub line_height: f64,
    pub letter_spacing: f64,
    pub stroke: TextStroke,
    pub shadow: TextShadow,
    pub gradient: Option<Gradient>,
    pub curve: Option<CurveOptions>,
}

impl Default for RegionStyle {
    fn default() -> Self {
        Self {
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: 24.0,
            font_weight: 400,
            scale_y: 1.0,
            color: Color::BLACK,
            bg_color: Color::WHITE,
            transparent_bg: true,
            padding: 4.0,
            text_align: TextAlign::Left,
            line_height: 1.2,
            letter_spacing: 0.0,
            stroke: TextStroke {
                color: Color::BLACK,
                width: 0.0,
            },
            shadow: TextShadow {
                color: Color::BLACK,
                blur: 0.0,
                offset_x: 0.0,
                offset_y: 0.0,
            },
            gradient: None,
            curve: None,
        }
    }
}

const DEFAULT_FONT_FAMILY: &str = "Noto Sans TC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionState {
    Pending,
    Recognized,
    Failed,
}

/// A text-overlay annotation in image space.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub rotation: f64,
    pub original_text: String,
    pub text: String,
    pub style: RegionStyle,
    pub edited: bool,
    pub recognition: RecognitionState,
    /// Pixels carried by a region that represents a moved image fragment.
    pub floating: Option<RgbaImage>,
}

impl Region {
    pub fn new(id: u64, rect: SelectionRect, style: RegionStyle) -> Self {
        Self {
            id,
            x: rect.x,
            y: rect.y,
            w: rect.w,
            h: rect.h,
            rotation: 0.0,
            original_text: RECOGNITION_PENDING_TEXT.to_string(),
            text: RECOGNITION_PENDING_TEXT.to_string(),
            style,
            edited: false,
            recognition: RecognitionState::Pending,
            floating: None,
        }
    }

    pub const fn rect(&self) -> SelectionRect {
        SelectionRect::new(self.x, self.y, self.w, self.h)
    }

    pub const fn is_floating(&self) -> bool {
        self.floating.is_some()
    }

    /// Stores a recognition result. Returns `false` once the region has left
    /// the pending state; text the user already changed is kept.
    pub(crate) fn apply_recognized_text(&mut self, text: &str) -> bool {
        if self.recognition != RecognitionState::Pending {
            return false;
        }
        if self.text == self.original_text {
            self.text = text.to_string();
        }
        self.original_text = text.to_string();
        self.recognition = RecognitionState::Recognized;
        true
    }

    pub(crate) fn mark_recognition_failed(&mut self) -> bool {
        if self.recognition != RecognitionState::Pending {
            return false;
        }
        if self.text == self.original_text {
            self.text = RECOGNITION_FAILED_TEXT.to_string();
        }
        self.original_text = RECOGNITION_FAILED_TEXT.to_string();
        self.recognition = RecognitionState::Failed;
        true
    }
}

/// Partial update merged into a [`Region`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionUpdate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub w: Option<f64>,
    pub h: Option<f64>,
    pub rotation: Option<f64>,
    pub text: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub font_weight: Option<u16>,
    pub scale_y: Option<f64>,
    pub color: Option<Color>,
    pub bg_color: Option<Color>,
    pub transparent_bg: Option<bool>,
    pub padding: Option<f64>,
    pub text_align: Option<TextAlign>,
    pub line_height: Option<f64>,
    pub letter_spacing: Option<f64>,
    pub stroke: Option<TextStroke>,
    pub shadow: Option<TextShadow>,
    pub gradient: Option<Option<Gradient>>,
    pub curve: Option<Option<CurveOptions>>,
    pub floating: Option<Option<RgbaImage>>,
}

impl RegionUpdate {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Picking a background color also turns the background opaque.
    pub fn background(color: Color) -> Self {
        Self {
            bg_color: Some(color),
            transparent_bg: Some(false),
            ..Self::default()
        }
    }

    pub fn with_font_size(mut self, font_size: f64) -> Self {
        self.font_size = Some(font_size);
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_transparent_bg(mut self, transparent: bool) -> Self {
        self.transparent_bg = Some(transparent);
        self
    }

    /// Extent the region would have after this update.
    pub(crate) fn resulting_extent(&self, region: &Region) -> (f64, f64) {
        (self.w.unwrap_or(region.w), self.h.unwrap_or(region.h))
    }

    pub(crate) fn apply_to(self, region: &mut Region) {
        let Self {
            x,
            y,
            w,
            h,
            rotation,
            text,
            font_family,
            font_size,
            font_weight,
            scale_y,
            color,
            bg_color,
            transparent_bg,
            padding,
            text_align,
            line_height,
            letter_spacing,
            stroke,
            shadow,
            gradient,
            curve,
            floating,
        } = self;

        merge(&mut region.x, x);
        merge(&mut region.y, y);
        merge(&mut region.w, w);
        merge(&mut region.h, h);
        merge(&mut region.rotation, rotation);
        merge(&mut region.text, text);
        merge(&mut region.floating, floating);

        let style = &mut region.style;
        merge(&mut style.font_family, font_family);
        merge(&mut style.font_size, font_size);
        merge(&mut style.font_weight, font_weight);
        merge(&mut style.scale_y, scale_y);
        merge(&mut style.color, color);
        merge(&mut style.bg_color, bg_color);
        merge(&mut style.transparent_bg, transparent_bg);
        merge(&mut style.padding, padding);
        merge(&mut style.text_align, text_align);
        merge(&mut style.line_height, line_height);
        merge(&mut style.letter_spacing, letter_spacing);
        merge(&mut style.stroke, stroke);
        merge(&mut style.shadow, shadow);
        merge(&mut style.gradient, gradient);
        merge(&mut style.curve, curve);
    }
}

fn merge<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
