//! Command-line driver: runs one scripted editing session over an image file.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::AppConfig;
use crate::editor::{EditorMode, EditorSession, PointerOutcome, RegionUpdate, SessionError};
use crate::error::{AppError, AppResult};
use crate::geometry::{Color, ImagePoint, SelectionRect};
use crate::notification::{DesktopNotifier, LogNotifier, Notifier};
use crate::ocr::installed_recognizer;
use crate::storage::{self, ExportFormat};

#[derive(Debug, Parser)]
#[command(name = "retext")]
#[command(
    version,
    about = "Select text regions in an image, recognize and replace them",
    long_about = None
)]
pub struct Cli {
    /// Input image
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file (defaults to <INPUT>_edited.<FORMAT>)
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Export format (png or jpg)
    #[arg(
        short,
        long,
        value_name = "FORMAT",
        default_value = "png",
        value_parser = parse_format
    )]
    pub format: ExportFormat,

    /// Region to select, in image pixels (x,y,width,height); repeatable
    #[arg(short, long, value_name = "X,Y,W,H", value_parser = parse_rect)]
    pub region: Vec<SelectionRect>,

    /// Replacement text for the region at the same position; repeatable
    #[arg(short, long, value_name = "TEXT")]
    pub text: Vec<String>,

    /// Background fill for replaced regions (#rgb or #rrggbb)
    #[arg(long, value_name = "COLOR", value_parser = parse_color)]
    pub bg_color: Option<Color>,

    /// Keep region backgrounds transparent
    #[arg(long, conflicts_with = "bg_color")]
    pub transparent: bool,

    /// Simulated canvas size used to fit the image (WIDTHxHEIGHT)
    #[arg(
        long,
        value_name = "WxH",
        default_value = "1280x800",
        value_parser = parse_container
    )]
    pub container: (f64, f64),

    /// Seconds to wait for text recognition
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub ocr_timeout: u64,
}

fn parse_format(value: &str) -> Result<ExportFormat, String> {
    value
        .parse::<ExportFormat>()
        .map_err(|err| err.to_string())
}

fn parse_rect(value: &str) -> Result<SelectionRect, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("invalid number in region '{value}': {err}"))?;
    match parts.as_slice() {
        [x, y, w, h] if *w > 0.0 && *h > 0.0 => Ok(SelectionRect::new(*x, *y, *w, *h)),
        [_, _, _, _] => Err(format!("region '{value}' must have a positive size")),
        _ => Err(format!("region '{value}' must be X,Y,W,H")),
    }
}

fn parse_color(value: &str) -> Result<Color, String> {
    Color::from_hex(value).ok_or_else(|| format!("invalid color '{value}'"))
}

fn parse_container(value: &str) -> Result<(f64, f64), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("container '{value}' must be WIDTHxHEIGHT"))?;
    let width = width
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid container width: {err}"))?;
    let height = height
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid container height: {err}"))?;
    if width > 0.0 && height > 0.0 {
        Ok((width, height))
    } else {
        Err(format!("container '{value}' must have a positive size"))
    }
}

/// Load, select every region, wait for recognition, apply replacements,
/// commit, export.
pub fn execute(cli: Cli, config: &AppConfig) -> AppResult<PathBuf> {
    if cli.text.len() > cli.region.len() {
        return Err(AppError::InvalidArgument(format!(
            "{} texts given for {} regions",
            cli.text.len(),
            cli.region.len()
        )));
    }

    let notifier: Box<dyn Notifier> = if config.desktop_notifications {
        Box::new(DesktopNotifier)
    } else {
        Box::new(LogNotifier)
    };
    let mut session =
        EditorSession::new(config.to_session_options(), installed_recognizer(), notifier);

    session.load_image(storage::load_raster(&cli.input)?)?;
    let (container_width, container_height) = cli.container;
    if !session.fit_to_view(container_width, container_height) {
        tracing::warn!(container_width, container_height, "keeping 100% scale");
    }
    session.set_mode(EditorMode::Region);

    let mut created = Vec::with_capacity(cli.region.len());
    for rect in &cli.region {
        match select(&mut session, *rect)? {
            PointerOutcome::RegionCreated(id) => created.push(id),
            outcome => tracing::warn!(?rect, ?outcome, "region was not created"),
        }
    }

    session.wait_for_recognition(Duration::from_secs(cli.ocr_timeout));
    for region in session.regions().regions() {
        tracing::info!(id = region.id, text = %region.text, "recognized");
    }

    for (index, id) in created.iter().copied().enumerate() {
        let mut update = match cli.text.get(index) {
            Some(text) => RegionUpdate::text(text.clone()),
            None => RegionUpdate::default(),
        };
        if let Some(color) = cli.bg_color {
            update.bg_color = Some(color);
            update.transparent_bg = Some(false);
        } else if cli.transparent {
            update.transparent_bg = Some(true);
        }
        session.select_region(Some(id))?;
        session.update_active_region(update)?;
        session.commit_active_region()?;
    }

    let out = cli
        .out
        .unwrap_or_else(|| storage::default_output_path(&cli.input, cli.format));
    let raster = session.raster().ok_or(SessionError::NoImage)?;
    storage::export_raster(raster, cli.format, &out)?;
    tracing::info!(history = ?session.history_labels(), "session finished");
    Ok(out)
}

/// Replays a drag from one corner of `rect` to the other in display space.
fn select(session: &mut EditorSession, rect: SelectionRect) -> AppResult<PointerOutcome> {
    let transform = session.display_transform();
    let start = transform.to_display_space(ImagePoint::new(rect.x, rect.y));
    let end = transform.to_display_space(ImagePoint::new(rect.x + rect.w, rect.y + rect.h));
    session.pointer_down(start);
    session.pointer_move(end);
    Ok(session.pointer_up(end)?)
}
