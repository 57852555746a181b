use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::{DynamicImage, ImageFormat, RgbaImage};
use thiserror::Error;

use crate::editor::RegionSet;

const EDITED_SUFFIX: &str = "_edited";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Export target tags understood by the download surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpg,
    Pdf,
    Pptx,
}

impl ExportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Pdf => "pdf",
            Self::Pptx => "pptx",
        }
    }

    /// Raster formats this crate can write itself.
    const fn image_format(self) -> Option<ImageFormat> {
        match self {
            Self::Png => Some(ImageFormat::Png),
            Self::Jpg => Some(ImageFormat::Jpeg),
            Self::Pdf | Self::Pptx => None,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = StorageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "pdf" => Ok(Self::Pdf),
            "pptx" => Ok(Self::Pptx),
            other => Err(StorageError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Committed raster plus the live region overlays, handed to document
/// exporters (PDF, PPTX) that keep regions editable above the raster.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub raster: RgbaImage,
    pub regions: RegionSet,
}

/// Decodes an image file into RGBA pixels.
pub fn load_raster(path: &Path) -> StorageResult<RgbaImage> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        return Err(StorageError::UnsupportedFormat("pdf".to_string()));
    }

    let image = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;
    tracing::debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "raster decoded"
    );
    Ok(image.to_rgba8())
}

pub fn export_raster(
    raster: &RgbaImage,
    format: ExportFormat,
    destination: &Path,
) -> StorageResult<()> {
    let image_format = format
        .image_format()
        .ok_or_else(|| StorageError::UnsupportedFormat(format.to_string()))?;

    if let Some(parent) = destination.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    match format {
        // JPEG has no alpha channel
        ExportFormat::Jpg => DynamicImage::ImageRgba8(raster.clone())
            .to_rgb8()
            .save_with_format(destination, image_format)?,
        _ => raster.save_with_format(destination, image_format)?,
    }
    tracing::info!(path = %destination.display(), %format, "raster exported");
    Ok(())
}

/// `<stem>_edited.<ext>` next to the input file.
pub fn default_output_path(input: &Path, format: ExportFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("image");
    input.with_file_name(format!("{stem}{EDITED_SUFFIX}.{}", format.extension()))
}
