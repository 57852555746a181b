//! Compositing of committed regions onto the raster.
//!
//! Opaque regions get their whole bounding rectangle filled with the
//! background color before any text is drawn. Transparent regions only touch
//! the pixels the text renderer paints.

use image::{imageops, Rgba, RgbaImage};

use super::image_region::ImageRegion;
use super::region::{Gradient, GradientDirection, Region, TextAlign};
use crate::geometry::{Color, ImageBounds, ImagePoint, SelectionRect};

/// Advance of one character cell relative to the font size.
const CHAR_ADVANCE_RATIO: f64 = 0.62;
/// Share of a character cell covered by its placeholder glyph.
const GLYPH_COVERAGE: f64 = 0.8;
/// Largest placed fragment side, as a multiple of the raster's longer side.
const MAX_FRAGMENT_EXTENT_RATIO: f64 = 4.0;

/// Draws a region's text onto the raster. Implementations must only paint
/// glyph pixels and must stay within the region's bounds.
pub trait TextRenderer {
    fn draw_text(&self, raster: &mut RgbaImage, region: &Region);
}

/// Renders every visible character as a solid block sized from the font
/// metrics. Stands in for real glyph rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockGlyphRenderer;

impl TextRenderer for BlockGlyphRenderer {
    fn draw_text(&self, raster: &mut RgbaImage, region: &Region) {
        let style = &region.style;
        let font_size = style.font_size.max(1.0);
        let cell_width = font_size * CHAR_ADVANCE_RATIO + style.letter_spacing;
        if cell_width <= 0.0 {
            return;
        }
        let line_advance = (font_size * style.line_height).max(1.0);
        let glyph_height = font_size * style.scale_y.max(0.0) * GLYPH_COVERAGE;
        let glyph_width = cell_width * GLYPH_COVERAGE;

        let bounds = region.rect();
        let content_x = region.x + style.padding;
        let content_y = region.y + style.padding;
        let content_width = (region.w - 2.0 * style.padding).max(0.0);

        for (line_index, line) in region.text.split('\n').enumerate() {
            let line_width = line.chars().count() as f64 * cell_width;
            let line_x = match style.text_align {
                TextAlign::Left => content_x,
                TextAlign::Center => content_x + (content_width - line_width) / 2.0,
                TextAlign::Right => content_x + content_width - line_width,
            };
            let line_y = content_y + line_index as f64 * line_advance;
            let glyph_y = line_y + (line_advance - glyph_height) / 2.0;

            for (column, ch) in line.chars().enumerate() {
                if ch.is_whitespace() {
                    continue;
                }
                let glyph_x = line_x + column as f64 * cell_width + (cell_width - glyph_width) / 2.0;
                let glyph = SelectionRect::new(glyph_x, glyph_y, glyph_width, glyph_height);
                if let Some(clipped) = intersect(glyph, bounds) {
                    fill_rect_with(raster, clipped, |x, y| {
                        text_color_at(style.color, style.gradient.as_ref(), bounds, x, y)
                    });
                }
            }
        }
    }
}

/// Writes a committed text region into the raster.
pub fn composite_region(raster: &mut RgbaImage, region: &Region, renderer: &dyn TextRenderer) {
    if !region.style.transparent_bg {
        fill_rect(raster, region.rect(), region.style.bg_color);
    }
    match &region.floating {
        Some(fragment) => paste(raster, fragment, region.x, region.y),
        None => renderer.draw_text(raster, region),
    }
}

pub fn max_fragment_extent(raster: &RgbaImage) -> f64 {
    f64::from(raster.width().max(raster.height())) * MAX_FRAGMENT_EXTENT_RATIO
}

/// Whether `fragment` has a drawable extent no larger than the raster allows.
pub fn fragment_fits(raster: &RgbaImage, fragment: &ImageRegion) -> bool {
    let limit = max_fragment_extent(raster);
    [fragment.w, fragment.h]
        .iter()
        .all(|extent| extent.is_finite() && *extent > 0.0 && *extent <= limit)
}

/// Fills the hole a fragment was cut from, then draws the fragment at its
/// current position and scale. Returns `false`, leaving the raster untouched,
/// when the fragment does not [fit](fragment_fits).
pub fn place_image_region(raster: &mut RgbaImage, fragment: &ImageRegion) -> bool {
    if !fragment_fits(raster, fragment) {
        tracing::warn!(id = fragment.id, w = fragment.w, h = fragment.h, "fragment not placed");
        return false;
    }
    if !fragment.transparent_bg {
        match fragment.original_lasso_path.as_deref() {
            Some(path) => fill_polygon(raster, path, fragment.bg_color),
            None => fill_rect(raster, fragment.original_rect(), fragment.bg_color),
        }
    }

    let width = fragment.w.round().max(1.0) as u32;
    let height = fragment.h.round().max(1.0) as u32;
    if (width, height) == fragment.image.dimensions() {
        paste(raster, &fragment.image, fragment.x, fragment.y);
    } else {
        let scaled = imageops::resize(
            &fragment.image,
            width,
            height,
            imageops::FilterType::Triangle,
        );
        paste(raster, &scaled, fragment.x, fragment.y);
    }
    true
}

/// Copy of the pixels under `rect`, clipped to the raster.
pub fn crop_pixels(raster: &RgbaImage, rect: SelectionRect) -> Option<RgbaImage> {
    let (x, y, width, height) = rect.pixel_box(bounds_of(raster))?;
    Some(imageops::crop_imm(raster, x, y, width, height).to_image())
}

/// Clears alpha for every pixel whose center falls outside `path`.
/// `origin` is the image-space position of the fragment's top-left pixel.
pub fn mask_outside_path(fragment: &mut RgbaImage, origin: ImagePoint, path: &[ImagePoint]) {
    for (x, y, pixel) in fragment.enumerate_pixels_mut() {
        let center = ImagePoint::new(
            origin.x + f64::from(x) + 0.5,
            origin.y + f64::from(y) + 0.5,
        );
        if !point_in_polygon(center, path) {
            pixel.0[3] = 0;
        }
    }
}

pub fn fill_rect(raster: &mut RgbaImage, rect: SelectionRect, color: Color) {
    let pixel = color.to_rgba();
    fill_rect_with(raster, rect, |_, _| pixel);
}

fn fill_rect_with(
    raster: &mut RgbaImage,
    rect: SelectionRect,
    mut color_at: impl FnMut(u32, u32) -> Rgba<u8>,
) {
    let Some((left, top, width, height)) = rect.pixel_box(bounds_of(raster)) else {
        return;
    };
    for y in top..top + height {
        for x in left..left + width {
            raster.put_pixel(x, y, color_at(x, y));
        }
    }
}

fn fill_polygon(raster: &mut RgbaImage, path: &[ImagePoint], color: Color) {
    let Some(bounds) = SelectionRect::bounding(path) else {
        return;
    };
    let Some((left, top, width, height)) = bounds.pixel_box(bounds_of(raster)) else {
        return;
    };
    let pixel = color.to_rgba();
    for y in top..top + height {
        for x in left..left + width {
            let center = ImagePoint::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            if point_in_polygon(center, path) {
                raster.put_pixel(x, y, pixel);
            }
        }
    }
}

fn paste(raster: &mut RgbaImage, fragment: &RgbaImage, x: f64, y: f64) {
    imageops::overlay(raster, fragment, x.round() as i64, y.round() as i64);
}

fn text_color_at(
    color: Color,
    gradient: Option<&Gradient>,
    bounds: SelectionRect,
    x: u32,
    y: u32,
) -> Rgba<u8> {
    let Some(gradient) = gradient else {
        return color.to_rgba();
    };
    let u = ratio(f64::from(x) - bounds.x, bounds.w);
    let v = ratio(f64::from(y) - bounds.y, bounds.h);
    let t = match gradient.direction {
        GradientDirection::Horizontal => u,
        GradientDirection::Vertical => v,
        GradientDirection::Diagonal => (u + v) / 2.0,
    };
    gradient.from.lerp(gradient.to, t).to_rgba()
}

fn ratio(offset: f64, extent: f64) -> f64 {
    if extent <= 0.0 {
        0.0
    } else {
        (offset / extent).clamp(0.0, 1.0)
    }
}

fn intersect(a: SelectionRect, b: SelectionRect) -> Option<SelectionRect> {
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = (a.x + a.w).min(b.x + b.w);
    let bottom = (a.y + a.h).min(b.y + b.h);
    (right > left && bottom > top).then(|| SelectionRect::new(left, top, right - left, bottom - top))
}

/// Even-odd rule; paths with fewer than three points contain nothing.
fn point_in_polygon(point: ImagePoint, path: &[ImagePoint]) -> bool {
    if path.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut previous = path[path.len() - 1];
    for &current in path {
        if (current.y > point.y) != (previous.y > point.y) {
            let crossing_x = (previous.x - current.x) * (point.y - current.y)
                / (previous.y - current.y)
                + current.x;
            if point.x < crossing_x {
                inside = !inside;
            }
        }
        previous = current;
    }
    inside
}

fn bounds_of(raster: &RgbaImage) -> ImageBounds {
    ImageBounds::new(raster.width(), raster.height())
}
