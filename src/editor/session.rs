use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use thiserror::Error;

use super::compose::{self, BlockGlyphRenderer, TextRenderer};
use super::history::{HistoryError, SnapshotHistory, DEFAULT_HISTORY_CAPACITY};
use super::image_region::{ImageRegionKind, ImageRegionUpdate};
use super::region::{RecognitionState, Region, RegionStyle, RegionUpdate};
use super::store::{RegionSet, RegionStore, StoreError};
use super::viewport::{fit_scale, DisplayTransform, DEFAULT_FIT_PADDING};
use super::EditorMode;
use crate::geometry::{DisplayPoint, ImageBounds, ImagePoint, SelectionRect};
use crate::notification::{Notifier, Severity};
use crate::ocr::{
    OcrLanguage, RecognitionDispatcher, RecognitionJob, RecognitionOutcome, TextRecognizer,
};
use crate::state::{DragMachine, DragState, PointerEvent};
use crate::storage::ExportRequest;

pub const REGION_SELECTED_NOTICE: &str = "區域已選取，正在分析文字...";
pub const RECOGNITION_FAILED_NOTICE: &str = "OCR 失敗";
pub const IMAGE_PLACEMENT_LABEL: &str = "移動圖片";

const EDIT_LABEL_PREFIX: &str = "編輯文字: ";
const EDIT_LABEL_CHARS: usize = 10;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no image is loaded")]
    NoImage,
    #[error("no region is being edited")]
    NoActiveRegion,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    History(#[from] HistoryError),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Settings an [`EditorSession`] is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub ocr_language: OcrLanguage,
    pub history_capacity: usize,
    pub fit_padding: f64,
    pub default_style: RegionStyle,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            ocr_language: OcrLanguage::Chinese,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            fit_padding: DEFAULT_FIT_PADDING,
            default_style: RegionStyle::default(),
        }
    }
}

/// What a pointer event did to the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerOutcome {
    /// Wrong mode, no image, or no drag in progress.
    Ignored,
    DragStarted,
    /// Transient selection feedback; nothing is stored yet.
    Dragging(SelectionRect),
    /// The release was too small or fell outside the image.
    Discarded,
    RegionCreated(u64),
    ImageRegionCreated(u64),
}

/// How a finished recognition job ended, kept so that regions restored from
/// a snapshot taken mid-recognition can catch up.
#[derive(Debug, Clone, PartialEq)]
enum SettledRecognition {
    Text(String),
    Failed,
}

/// One editing session over a single raster.
///
/// All state mutation happens through `&mut self` on the owning thread.
/// Recognition runs on worker threads and its results are only applied by
/// [`pump_recognition`](Self::pump_recognition) or
/// [`wait_for_recognition`](Self::wait_for_recognition), after checking that
/// the target region still exists.
pub struct EditorSession {
    mode: EditorMode,
    drag: DragMachine,
    drag_current: Option<ImagePoint>,
    lasso_path: Vec<ImagePoint>,
    raster: Option<RgbaImage>,
    store: RegionStore,
    history: SnapshotHistory,
    transform: DisplayTransform,
    recognition: RecognitionDispatcher,
    awaiting: HashSet<u64>,
    settled: HashMap<u64, SettledRecognition>,
    notifier: Box<dyn Notifier>,
    renderer: Box<dyn TextRenderer>,
    default_style: RegionStyle,
    fit_padding: f64,
}

impl EditorSession {
    pub fn new(
        options: SessionOptions,
        recognizer: Option<Arc<dyn TextRecognizer>>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            mode: EditorMode::default(),
            drag: DragMachine::new(),
            drag_current: None,
            lasso_path: Vec::new(),
            raster: None,
            store: RegionStore::new(),
            history: SnapshotHistory::with_capacity(options.history_capacity),
            transform: DisplayTransform::default(),
            recognition: RecognitionDispatcher::new(recognizer, options.ocr_language),
            awaiting: HashSet::new(),
            settled: HashMap::new(),
            notifier,
            renderer: Box::new(BlockGlyphRenderer),
            default_style: options.default_style,
            fit_padding: options.fit_padding,
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn TextRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Starts over with `raster`: regions and history are discarded and the
    /// raster becomes the initial snapshot.
    pub fn load_image(&mut self, raster: RgbaImage) -> SessionResult<()> {
        let (width, height) = raster.dimensions();
        self.cancel_drag();
        self.store.clear();
        self.awaiting.clear();
        self.settled.clear();
        self.history.reset();
        self.history.initialize(raster.clone())?;
        self.raster = Some(raster);
        tracing::info!(width, height, "image loaded");
        Ok(())
    }

    pub fn raster(&self) -> Option<&RgbaImage> {
        self.raster.as_ref()
    }

    pub fn image_bounds(&self) -> Option<ImageBounds> {
        self.raster
            .as_ref()
            .map(|raster| ImageBounds::new(raster.width(), raster.height()))
    }

    /// Fits the image into a container and centers it. Returns `false` when
    /// there is no image or the container is too small.
    pub fn fit_to_view(&mut self, container_width: f64, container_height: f64) -> bool {
        let Some(bounds) = self.image_bounds() else {
            return false;
        };
        let Some(scale) = fit_scale(container_width, container_height, self.fit_padding, bounds)
        else {
            tracing::debug!(container_width, container_height, "container too small to fit image");
            return false;
        };
        self.transform.set_scale(scale);
        self.transform.set_origin(DisplayPoint::new(
            (container_width - f64::from(bounds.width) * scale) / 2.0,
            (container_height - f64::from(bounds.height) * scale) / 2.0,
        ));
        true
    }

    pub fn display_transform(&self) -> DisplayTransform {
        self.transform
    }

    pub fn set_canvas_origin(&mut self, origin: DisplayPoint) {
        self.transform.set_origin(origin);
    }

    pub fn set_display_scale(&mut self, scale: f64) -> bool {
        self.transform.set_scale(scale)
    }

    pub fn zoom_percent(&self) -> u32 {
        self.transform.zoom_percent()
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    /// Switching modes abandons any drag in progress.
    pub fn set_mode(&mut self, mode: EditorMode) {
        if self.mode != mode {
            self.cancel_drag();
            tracing::debug!(from = self.mode.as_str(), to = mode.as_str(), "mode changed");
        }
        self.mode = mode;
    }

    pub fn drag_state(&self) -> DragState {
        self.drag.state()
    }

    pub fn pointer_down(&mut self, position: DisplayPoint) -> PointerOutcome {
        if !self.mode.is_selection_capable() || self.raster.is_none() {
            return PointerOutcome::Ignored;
        }
        let point = self.transform.to_image_space(position);
        if self.drag.transition(PointerEvent::Down(point)).is_err() {
            return PointerOutcome::Ignored;
        }
        self.drag_current = Some(point);
        self.lasso_path.clear();
        if self.mode == EditorMode::Lasso {
            self.lasso_path.push(point);
        }
        PointerOutcome::DragStarted
    }

    pub fn pointer_move(&mut self, position: DisplayPoint) -> PointerOutcome {
        let point = self.transform.to_image_space(position);
        if self.drag.transition(PointerEvent::Move(point)).is_err() {
            return PointerOutcome::Ignored;
        }
        self.drag_current = Some(point);
        if self.mode == EditorMode::Lasso {
            self.lasso_path.push(point);
        }
        self.selection_rect()
            .map_or(PointerOutcome::Ignored, PointerOutcome::Dragging)
    }

    /// Ends the drag. A selection larger than the threshold on both axes
    /// becomes a text region (recognition is dispatched) or an image fragment,
    /// depending on the mode; anything else is dropped.
    pub fn pointer_up(&mut self, position: DisplayPoint) -> SessionResult<PointerOutcome> {
        let point = self.transform.to_image_space(position);
        let Some(start) = self.drag.state().start() else {
            return Ok(PointerOutcome::Ignored);
        };
        if self.drag.transition(PointerEvent::Up(point)).is_err() {
            return Ok(PointerOutcome::Ignored);
        }

        let mut path = std::mem::take(&mut self.lasso_path);
        self.drag_current = None;
        let rect = if self.mode == EditorMode::Lasso {
            path.push(point);
            SelectionRect::bounding(&path)
        } else {
            Some(SelectionRect::from_corners(start, point))
        };
        let Some(rect) = rect.filter(SelectionRect::exceeds_min_extent) else {
            tracing::debug!(?rect, "selection below threshold");
            return Ok(PointerOutcome::Discarded);
        };

        match self.mode {
            EditorMode::Region => self.create_text_region(rect).map(PointerOutcome::RegionCreated),
            EditorMode::ImageSelect => Ok(self
                .create_image_region(ImageRegionKind::Rectangle, rect, None)?
                .map_or(PointerOutcome::Discarded, PointerOutcome::ImageRegionCreated)),
            EditorMode::Lasso => Ok(self
                .create_image_region(ImageRegionKind::Lasso, rect, Some(path))?
                .map_or(PointerOutcome::Discarded, PointerOutcome::ImageRegionCreated)),
            _ => Ok(PointerOutcome::Discarded),
        }
    }

    pub fn pointer_cancel(&mut self) {
        self.cancel_drag();
    }

    /// Normalized rectangle of the drag in progress, for on-screen feedback.
    pub fn selection_rect(&self) -> Option<SelectionRect> {
        let start = self.drag.state().start()?;
        if self.mode == EditorMode::Lasso {
            return SelectionRect::bounding(&self.lasso_path);
        }
        self.drag_current
            .map(|current| SelectionRect::from_corners(start, current))
    }

    pub fn lasso_path(&self) -> &[ImagePoint] {
        &self.lasso_path
    }

    fn cancel_drag(&mut self) {
        if self.drag.state().is_dragging() {
            tracing::debug!("drag cancelled");
        }
        self.drag.reset();
        self.drag_current = None;
        self.lasso_path.clear();
    }

    fn create_text_region(&mut self, rect: SelectionRect) -> SessionResult<u64> {
        let raster = self.raster.as_ref().ok_or(SessionError::NoImage)?;
        let pixels = compose::crop_pixels(raster, rect);
        let id = self.store.create_region(rect, &self.default_style)?.id;
        self.store.set_active(Some(id))?;
        self.notifier.notify(Severity::Info, REGION_SELECTED_NOTICE);

        match pixels {
            Some(pixels) => {
                self.awaiting.insert(id);
                self.recognition.dispatch(RecognitionJob {
                    region_id: id,
                    pixels,
                });
            }
            None => {
                tracing::debug!(id, "region lies outside the image");
                self.settled.insert(id, SettledRecognition::Failed);
                self.fail_recognition(id);
            }
        }
        Ok(id)
    }

    fn create_image_region(
        &mut self,
        kind: ImageRegionKind,
        rect: SelectionRect,
        lasso_path: Option<Vec<ImagePoint>>,
    ) -> SessionResult<Option<u64>> {
        let raster = self.raster.as_ref().ok_or(SessionError::NoImage)?;
        let bounds = ImageBounds::new(raster.width(), raster.height());
        let Some((left, top, width, height)) = rect.pixel_box(bounds) else {
            tracing::debug!(?rect, "image selection outside the image");
            return Ok(None);
        };
        // the fragment covers only the pixels it actually holds
        let clipped = SelectionRect::new(
            f64::from(left),
            f64::from(top),
            f64::from(width),
            f64::from(height),
        );
        if !clipped.exceeds_min_extent() {
            tracing::debug!(?rect, ?clipped, "clipped image selection below threshold");
            return Ok(None);
        }
        let Some(mut pixels) = compose::crop_pixels(raster, clipped) else {
            return Ok(None);
        };
        if let Some(path) = lasso_path.as_deref() {
            let origin = ImagePoint::new(f64::from(left), f64::from(top));
            compose::mask_outside_path(&mut pixels, origin, path);
        }

        let id = self
            .store
            .create_image_region(kind, clipped, pixels, lasso_path)?
            .id;
        self.store.set_active_image_region(Some(id))?;
        Ok(Some(id))
    }

    pub fn regions(&self) -> &RegionStore {
        &self.store
    }

    pub fn active_region(&self) -> Option<&Region> {
        self.store.active()
    }

    pub fn select_region(&mut self, id: Option<u64>) -> SessionResult<()> {
        self.store.set_active(id)?;
        Ok(())
    }

    pub fn update_region(&mut self, id: u64, update: RegionUpdate) -> SessionResult<()> {
        self.store.update_region(id, update)?;
        Ok(())
    }

    pub fn update_active_region(&mut self, update: RegionUpdate) -> SessionResult<()> {
        let id = self.store.active_id().ok_or(SessionError::NoActiveRegion)?;
        self.update_region(id, update)
    }

    /// Moves or restyles a fragment. Scales that would make it larger than
    /// [`compose::max_fragment_extent`] are rejected.
    pub fn update_image_region(&mut self, id: u64, update: ImageRegionUpdate) -> SessionResult<()> {
        if let (Some(raster), Some(region)) = (self.raster.as_ref(), self.store.image_region(id)) {
            let limit = compose::max_fragment_extent(raster);
            let (w, h) = update.resulting_extent(region);
            if w > limit || h > limit {
                return Err(StoreError::InvalidGeometry(id).into());
            }
        }
        self.store.update_image_region(id, update)?;
        Ok(())
    }

    /// Leaves the edit without touching the raster or history.
    pub fn cancel_edit(&mut self) {
        self.store.clear_active();
    }

    /// Composites the active region onto the raster, records a snapshot and
    /// clears the selection.
    pub fn commit_active_region(&mut self) -> SessionResult<()> {
        let id = self.store.active_id().ok_or(SessionError::NoActiveRegion)?;
        let raster = self.raster.as_mut().ok_or(SessionError::NoImage)?;
        let region = self
            .store
            .region_mut(id)
            .ok_or(StoreError::RegionNotFound(id))?;

        region.edited = true;
        compose::composite_region(raster, region, self.renderer.as_ref());
        let label = edit_label(&region.text);

        self.history
            .commit(raster.clone(), self.store.snapshot(), label)?;
        self.store.clear_active();
        tracing::info!(id, "region committed");
        Ok(())
    }

    /// Places an image fragment into the raster at its current position and
    /// records a snapshot. The fragment is consumed.
    pub fn commit_image_region(&mut self, id: u64) -> SessionResult<()> {
        let raster = self.raster.as_mut().ok_or(SessionError::NoImage)?;
        let fragment = self
            .store
            .image_region(id)
            .ok_or(StoreError::RegionNotFound(id))?;
        if !compose::fragment_fits(raster, fragment) {
            return Err(StoreError::InvalidGeometry(id).into());
        }
        let fragment = self
            .store
            .remove_image_region(id)
            .ok_or(StoreError::RegionNotFound(id))?;

        compose::place_image_region(raster, &fragment);
        self.history
            .commit(raster.clone(), self.store.snapshot(), IMAGE_PLACEMENT_LABEL)?;
        tracing::info!(id, "image fragment placed");
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Restores the previous snapshot. `false` at the oldest item.
    pub fn undo(&mut self) -> bool {
        let Some(item) = self.history.undo() else {
            return false;
        };
        restore(&mut self.raster, &mut self.store, item.raster(), item.regions());
        self.cancel_drag();
        self.settle_restored_regions();
        tracing::info!(cursor = ?self.history.cursor(), "undo");
        true
    }

    /// Re-applies the next snapshot. `false` at the newest item.
    pub fn redo(&mut self) -> bool {
        let Some(item) = self.history.redo() else {
            return false;
        };
        restore(&mut self.raster, &mut self.store, item.raster(), item.regions());
        self.cancel_drag();
        self.settle_restored_regions();
        tracing::info!(cursor = ?self.history.cursor(), "redo");
        true
    }

    pub fn history_labels(&self) -> Vec<&str> {
        self.history.labels().collect()
    }

    pub fn history_cursor(&self) -> Option<usize> {
        self.history.cursor()
    }

    pub fn pending_recognitions(&self) -> usize {
        self.recognition.in_flight()
    }

    /// Applies every recognition result that has already arrived. Returns the
    /// number of regions that changed.
    pub fn pump_recognition(&mut self) -> usize {
        let mut applied = 0;
        while let Some(outcome) = self.recognition.try_next() {
            applied += usize::from(self.apply_recognition(outcome));
        }
        applied
    }

    /// Blocks until every dispatched recognition has reported or `timeout`
    /// elapses, applying results as they arrive.
    pub fn wait_for_recognition(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut applied = self.pump_recognition();
        while self.recognition.in_flight() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(pending = self.recognition.in_flight(), "recognition timed out");
                break;
            }
            let Some(outcome) = self.recognition.next_timeout(remaining) else {
                break;
            };
            applied += usize::from(self.apply_recognition(outcome));
        }
        applied
    }

    /// Regions restored from a snapshot taken while they were still pending
    /// pick up the outcome their job reported since. A pending region with no
    /// job in flight and no outcome on record is failed.
    fn settle_restored_regions(&mut self) {
        let pending: Vec<u64> = self
            .store
            .regions()
            .iter()
            .filter(|region| region.recognition == RecognitionState::Pending)
            .map(|region| region.id)
            .collect();
        for id in pending {
            if self.awaiting.contains(&id) {
                continue;
            }
            match self.settled.get(&id) {
                Some(SettledRecognition::Text(text)) => {
                    if let Some(region) = self.store.region_mut(id) {
                        region.apply_recognized_text(text);
                    }
                }
                Some(SettledRecognition::Failed) => {
                    if let Some(region) = self.store.region_mut(id) {
                        region.mark_recognition_failed();
                    }
                }
                None => {
                    tracing::warn!(id, "restored region has no recognition in flight");
                    self.settled.insert(id, SettledRecognition::Failed);
                    self.fail_recognition(id);
                }
            }
        }
    }

    fn apply_recognition(&mut self, outcome: RecognitionOutcome) -> bool {
        let RecognitionOutcome { region_id, result } = outcome;
        if self.awaiting.remove(&region_id) {
            let settled = match &result {
                Ok(text) => SettledRecognition::Text(text.clone()),
                Err(_) => SettledRecognition::Failed,
            };
            self.settled.insert(region_id, settled);
        }
        match result {
            Ok(text) => {
                let Some(region) = self.store.region_mut(region_id) else {
                    tracing::debug!(region_id, "dropping recognition result for removed region");
                    return false;
                };
                let applied = region.apply_recognized_text(&text);
                if applied {
                    tracing::info!(region_id, chars = text.chars().count(), "text recognized");
                }
                applied
            }
            Err(err) => {
                if !self.store.contains_region(region_id) {
                    tracing::debug!(region_id, "dropping recognition failure for removed region");
                    return false;
                }
                tracing::warn!(region_id, "recognition failed: {err}");
                self.fail_recognition(region_id)
            }
        }
    }

    fn fail_recognition(&mut self, region_id: u64) -> bool {
        let failed = self
            .store
            .region_mut(region_id)
            .is_some_and(Region::mark_recognition_failed);
        if failed {
            self.notifier.notify(Severity::Error, RECOGNITION_FAILED_NOTICE);
        }
        failed
    }

    /// The committed raster plus a copy of the live regions, for exporters
    /// that lay editable overlays over the raster (PDF, PPTX). Raster-only
    /// output needs just [`raster`](Self::raster).
    pub fn export_request(&self) -> Option<ExportRequest> {
        let raster = self.raster.clone()?;
        Some(ExportRequest {
            raster,
            regions: self.store.snapshot(),
        })
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("mode", &self.mode)
            .field("drag", &self.drag.state())
            .field("image", &self.image_bounds())
            .field("regions", &self.store.regions().len())
            .field("history_cursor", &self.history.cursor())
            .field("recognition", &self.recognition)
            .finish()
    }
}

fn restore(
    raster: &mut Option<RgbaImage>,
    store: &mut RegionStore,
    snapshot_raster: &RgbaImage,
    snapshot_regions: &RegionSet,
) {
    *raster = Some(snapshot_raster.clone());
    store.replace_all(snapshot_regions);
    store.clear_active();
}

fn edit_label(text: &str) -> String {
    let head: String = text.chars().take(EDIT_LABEL_CHARS).collect();
    format!("{EDIT_LABEL_PREFIX}{head}")
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::Mutex;

    use image::Rgba;

    use super::*;
    use crate::editor::region::{
        RecognitionState, RECOGNITION_FAILED_TEXT, RECOGNITION_PENDING_TEXT,
    };
    use crate::geometry::Color;
    use crate::notification::testing::RecordingNotifier;
    use crate::ocr::{OcrError, OcrResult};

    const WAIT: Duration = Duration::from_secs(5);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    struct FixedText(&'static str);

    impl TextRecognizer for FixedText {
        fn recognize(&self, _image: &RgbaImage, _language: OcrLanguage) -> OcrResult<String> {
            Ok(self.0.to_string())
        }
    }

    /// Blocks each job until the test releases a result for it.
    struct Gated {
        results: Mutex<Receiver<OcrResult<String>>>,
    }

    fn gated() -> (Arc<dyn TextRecognizer>, Sender<OcrResult<String>>) {
        let (tx, rx) = mpsc::channel();
        let recognizer = Gated {
            results: Mutex::new(rx),
        };
        (Arc::new(recognizer), tx)
    }

    impl TextRecognizer for Gated {
        fn recognize(&self, _image: &RgbaImage, _language: OcrLanguage) -> OcrResult<String> {
            let results = self.results.lock().map_err(|_| OcrError::Unavailable)?;
            results.recv().map_err(|_| OcrError::Unavailable)?
        }
    }

    fn session_with(
        recognizer: Option<Arc<dyn TextRecognizer>>,
    ) -> (EditorSession, RecordingNotifier) {
        let notifier = RecordingNotifier::default();
        let mut session = EditorSession::new(
            SessionOptions::default(),
            recognizer,
            Box::new(notifier.clone()),
        );
        session
            .load_image(RgbaImage::from_pixel(800, 600, WHITE))
            .expect("load image");
        session.set_mode(EditorMode::Region);
        (session, notifier)
    }

    fn drag(session: &mut EditorSession, from: (f64, f64), to: (f64, f64)) -> PointerOutcome {
        session.pointer_down(DisplayPoint::new(from.0, from.1));
        session.pointer_move(DisplayPoint::new(to.0, to.1));
        session
            .pointer_up(DisplayPoint::new(to.0, to.1))
            .expect("pointer up")
    }

    fn created_region(outcome: PointerOutcome) -> u64 {
        match outcome {
            PointerOutcome::RegionCreated(id) => id,
            other => panic!("expected a region, got {other:?}"),
        }
    }

    #[test]
    fn edit_commit_undo_redo_round_trip() {
        let (mut session, _) = session_with(Some(Arc::new(FixedText("  Hello world \n"))));
        let initial = session.raster().unwrap().clone();
        assert_eq!(session.history_labels(), vec!["Initial Load"]);
        assert_eq!(session.history_cursor(), Some(0));

        let id = created_region(drag(&mut session, (100.0, 100.0), (300.0, 200.0)));
        let region = session.regions().region(id).unwrap();
        assert_eq!((region.x, region.y, region.w, region.h), (100.0, 100.0, 200.0, 100.0));
        assert_eq!(session.active_region().map(|region| region.id), Some(id));

        session.wait_for_recognition(WAIT);
        assert_eq!(session.regions().region(id).unwrap().text, "Hello world");

        session
            .update_active_region(RegionUpdate::text("Hello"))
            .unwrap();
        session.commit_active_region().unwrap();
        assert_eq!(session.history_labels(), vec!["Initial Load", "編輯文字: Hello"]);
        assert_eq!(session.history_cursor(), Some(1));
        assert!(session.active_region().is_none());
        assert_ne!(session.raster().unwrap(), &initial);

        assert!(session.undo());
        assert_eq!(session.history_cursor(), Some(0));
        assert_eq!(session.raster().unwrap(), &initial);
        assert!(session.regions().regions().is_empty());

        assert!(session.redo());
        assert_eq!(session.history_cursor(), Some(1));
        let region = session.regions().region(id).unwrap();
        assert_eq!(region.text, "Hello");
        assert!(region.edited);
        assert!(!session.redo());
    }

    #[test]
    fn selections_must_exceed_ten_pixels_on_both_axes() {
        let (mut session, notifier) = session_with(None);
        assert_eq!(drag(&mut session, (50.0, 50.0), (60.0, 60.0)), PointerOutcome::Discarded);
        assert_eq!(drag(&mut session, (50.0, 50.0), (150.0, 55.0)), PointerOutcome::Discarded);
        assert!(session.regions().regions().is_empty());
        assert!(notifier.sent().is_empty());

        let id = created_region(drag(&mut session, (61.0, 61.0), (50.0, 50.0)));
        let region = session.regions().region(id).unwrap();
        assert_eq!((region.x, region.y, region.w, region.h), (50.0, 50.0, 11.0, 11.0));
        assert_eq!(session.drag_state(), DragState::Idle);
    }

    #[test]
    fn pointer_positions_are_mapped_through_the_display_transform() {
        let (mut session, _) = session_with(None);
        session.set_canvas_origin(DisplayPoint::new(10.0, 20.0));
        assert!(session.set_display_scale(0.5));
        assert!(!session.set_display_scale(0.0));
        assert_eq!(session.zoom_percent(), 50);

        session.pointer_down(DisplayPoint::new(60.0, 70.0));
        let outcome = session.pointer_move(DisplayPoint::new(110.0, 120.0));
        assert_eq!(
            outcome,
            PointerOutcome::Dragging(SelectionRect::new(100.0, 100.0, 100.0, 100.0))
        );
        let id = created_region(session.pointer_up(DisplayPoint::new(110.0, 120.0)).unwrap());
        assert_eq!(
            session.regions().region(id).unwrap().rect(),
            SelectionRect::new(100.0, 100.0, 100.0, 100.0)
        );
    }

    #[test]
    fn non_selection_modes_ignore_drags_and_mode_changes_cancel() {
        let (mut session, _) = session_with(None);
        session.set_mode(EditorMode::Brush);
        assert_eq!(session.pointer_down(DisplayPoint::new(0.0, 0.0)), PointerOutcome::Ignored);

        session.set_mode(EditorMode::Region);
        session.pointer_down(DisplayPoint::new(0.0, 0.0));
        assert!(session.drag_state().is_dragging());
        session.set_mode(EditorMode::ImageSelect);
        assert_eq!(session.drag_state(), DragState::Idle);
        assert_eq!(
            session.pointer_up(DisplayPoint::new(100.0, 100.0)).unwrap(),
            PointerOutcome::Ignored
        );
        assert!(session.regions().regions().is_empty());
    }

    #[test]
    fn stale_recognition_after_undo_is_dropped() {
        let (recognizer, results) = gated();
        let (mut session, _) = session_with(Some(recognizer));

        let first = created_region(drag(&mut session, (10.0, 10.0), (100.0, 60.0)));
        results.send(Ok("Alpha".to_string())).unwrap();
        session.wait_for_recognition(WAIT);
        session.commit_active_region().unwrap();

        let second = created_region(drag(&mut session, (200.0, 200.0), (300.0, 260.0)));
        assert_eq!(session.regions().region(second).unwrap().text, RECOGNITION_PENDING_TEXT);

        assert!(session.undo());
        assert!(session.regions().regions().is_empty());

        results.send(Ok("Late".to_string())).unwrap();
        assert_eq!(session.wait_for_recognition(WAIT), 0);
        assert_eq!(session.pending_recognitions(), 0);
        assert!(session.regions().regions().is_empty());

        assert!(session.redo());
        let regions = session.regions().regions();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].id, first);
        assert_eq!(regions[0].text, "Alpha");
    }

    #[test]
    fn recognition_finishing_after_commit_survives_undo_and_redo() {
        let (recognizer, results) = gated();
        let (mut session, _) = session_with(Some(recognizer));
        let id = created_region(drag(&mut session, (10.0, 10.0), (100.0, 60.0)));
        session.commit_active_region().unwrap();

        results.send(Ok("Scanned".to_string())).unwrap();
        assert_eq!(session.wait_for_recognition(WAIT), 1);
        assert_eq!(session.regions().region(id).unwrap().text, "Scanned");

        assert!(session.undo());
        assert!(session.redo());
        let region = session.regions().region(id).unwrap();
        assert_eq!(region.text, "Scanned");
        assert_eq!(region.recognition, RecognitionState::Recognized);
        assert_eq!(session.pending_recognitions(), 0);
    }

    #[test]
    fn recognition_finishing_while_undone_applies_on_redo() {
        let (recognizer, results) = gated();
        let (mut session, _) = session_with(Some(recognizer));
        let id = created_region(drag(&mut session, (10.0, 10.0), (100.0, 60.0)));
        session.commit_active_region().unwrap();

        assert!(session.undo());
        results.send(Ok("Late".to_string())).unwrap();
        assert_eq!(session.wait_for_recognition(WAIT), 0);
        assert!(session.regions().regions().is_empty());

        assert!(session.redo());
        let region = session.regions().region(id).unwrap();
        assert_eq!(region.text, "Late");
        assert_eq!(region.recognition, RecognitionState::Recognized);
    }

    #[test]
    fn image_selection_partly_off_image_keeps_clipped_geometry() {
        let (mut session, _) = session_with(None);
        let red = Rgba([255, 0, 0, 255]);
        let mut raster = RgbaImage::from_pixel(100, 100, WHITE);
        for y in 0..100 {
            raster.put_pixel(10, y, red);
        }
        session.load_image(raster).unwrap();
        session.set_mode(EditorMode::ImageSelect);

        let outcome = drag(&mut session, (-5.0, 0.0), (20.0, 20.0));
        let PointerOutcome::ImageRegionCreated(id) = outcome else {
            panic!("expected an image region, got {outcome:?}");
        };
        let fragment = session.regions().image_region(id).unwrap();
        assert_eq!(fragment.rect(), SelectionRect::new(0.0, 0.0, 20.0, 20.0));
        assert_eq!(fragment.original_rect(), fragment.rect());
        assert_eq!(fragment.image.dimensions(), (20, 20));

        session.commit_image_region(id).unwrap();
        let raster = session.raster().unwrap();
        let red_columns: Vec<u32> = (0..100)
            .filter(|x| *raster.get_pixel(*x, 5) == red)
            .collect();
        assert_eq!(red_columns, vec![10]);

        // only 5 px of this one lie on the image
        assert_eq!(
            drag(&mut session, (-15.0, 30.0), (5.0, 60.0)),
            PointerOutcome::Discarded
        );
    }

    #[test]
    fn fragment_scale_is_bounded_by_the_raster() {
        let (mut session, _) = session_with(None);
        session.set_mode(EditorMode::ImageSelect);
        let outcome = drag(&mut session, (10.0, 10.0), (30.0, 30.0));
        let PointerOutcome::ImageRegionCreated(id) = outcome else {
            panic!("expected an image region, got {outcome:?}");
        };

        for scale in [f64::INFINITY, 1.0e6] {
            let result =
                session.update_image_region(id, ImageRegionUpdate::default().with_scale(scale));
            assert!(
                matches!(
                    result,
                    Err(SessionError::Store(StoreError::InvalidGeometry(bad))) if bad == id
                ),
                "scale {scale} should be rejected"
            );
        }
        assert_eq!(session.regions().image_region(id).unwrap().w, 20.0);

        session
            .update_image_region(id, ImageRegionUpdate::default().with_scale(2.0))
            .unwrap();
        session.commit_image_region(id).unwrap();
        assert_eq!(
            session.history_labels().last().copied(),
            Some(IMAGE_PLACEMENT_LABEL)
        );
    }

    #[test]
    fn missing_recognizer_leaves_placeholder_and_notifies_once() {
        let (mut session, notifier) = session_with(None);
        let id = created_region(drag(&mut session, (10.0, 10.0), (100.0, 60.0)));

        assert_eq!(session.pump_recognition(), 1);
        let region = session.regions().region(id).unwrap();
        assert_eq!(region.text, RECOGNITION_FAILED_TEXT);
        assert_eq!(region.recognition, RecognitionState::Failed);
        assert_eq!(session.pump_recognition(), 0);

        assert_eq!(
            notifier.sent(),
            vec![
                (Severity::Info, REGION_SELECTED_NOTICE.to_string()),
                (Severity::Error, RECOGNITION_FAILED_NOTICE.to_string()),
            ]
        );
        assert_eq!(session.history_labels().len(), 1);
    }

    #[test]
    fn user_text_typed_while_pending_survives_recognition() {
        let (recognizer, results) = gated();
        let (mut session, _) = session_with(Some(recognizer));
        let id = created_region(drag(&mut session, (10.0, 10.0), (100.0, 60.0)));

        session.update_region(id, RegionUpdate::text("typed")).unwrap();
        results.send(Ok("scanned".to_string())).unwrap();
        session.wait_for_recognition(WAIT);

        let region = session.regions().region(id).unwrap();
        assert_eq!(region.text, "typed");
        assert_eq!(region.original_text, "scanned");
    }

    #[test]
    fn opaque_commit_fills_bounds_and_transparent_commit_keeps_pixels() {
        let (mut session, _) = session_with(None);
        let red = Color::new(255, 0, 0);

        let opaque = created_region(drag(&mut session, (20.0, 20.0), (60.0, 50.0)));
        session
            .update_region(opaque, RegionUpdate::text("").with_transparent_bg(false))
            .unwrap();
        session.update_region(opaque, RegionUpdate::background(red)).unwrap();
        session.commit_active_region().unwrap();
        let raster = session.raster().unwrap();
        assert_eq!(*raster.get_pixel(20, 20), red.to_rgba());
        assert_eq!(*raster.get_pixel(59, 49), red.to_rgba());
        assert_eq!(*raster.get_pixel(60, 50), WHITE);
        assert_eq!(*raster.get_pixel(19, 19), WHITE);

        let before = session.raster().unwrap().clone();
        let transparent = created_region(drag(&mut session, (200.0, 200.0), (260.0, 240.0)));
        session.select_region(Some(transparent)).unwrap();
        session
            .update_active_region(RegionUpdate::text(" "))
            .unwrap();
        session.commit_active_region().unwrap();
        assert_eq!(session.raster().unwrap(), &before);
        assert_eq!(session.history_labels().last().copied(), Some("編輯文字:  "));
    }

    #[test]
    fn commit_without_active_region_is_an_error() {
        let (mut session, _) = session_with(None);
        assert!(matches!(
            session.commit_active_region(),
            Err(SessionError::NoActiveRegion)
        ));

        let id = created_region(drag(&mut session, (10.0, 10.0), (100.0, 60.0)));
        session.select_region(Some(id)).unwrap();
        session.cancel_edit();
        assert!(session.active_region().is_none());
        assert!(session.regions().contains_region(id));
        assert_eq!(session.history_labels().len(), 1);
    }

    #[test]
    fn edit_label_uses_first_ten_characters() {
        assert_eq!(edit_label("Hello"), "編輯文字: Hello");
        assert_eq!(edit_label("繁體中文字的標籤測試超過十個"), "編輯文字: 繁體中文字的標籤測試");
    }

    #[test]
    fn image_fragment_moves_and_commits_with_placement_label() {
        let (mut session, _) = session_with(None);
        let blue = Rgba([0, 0, 255, 255]);
        let mut raster = RgbaImage::from_pixel(100, 100, WHITE);
        for y in 10..30 {
            for x in 10..30 {
                raster.put_pixel(x, y, blue);
            }
        }
        session.load_image(raster).unwrap();
        session.set_mode(EditorMode::ImageSelect);

        let id = match drag(&mut session, (10.0, 10.0), (30.0, 30.0)) {
            PointerOutcome::ImageRegionCreated(id) => id,
            other => panic!("expected an image region, got {other:?}"),
        };
        assert_eq!(session.regions().image_region(id).unwrap().image.dimensions(), (20, 20));

        session
            .update_image_region(id, ImageRegionUpdate::move_to(60.0, 60.0))
            .unwrap();
        session.commit_image_region(id).unwrap();

        let raster = session.raster().unwrap();
        assert_eq!(*raster.get_pixel(15, 15), WHITE);
        assert_eq!(*raster.get_pixel(65, 65), blue);
        assert!(session.regions().image_region(id).is_none());
        assert_eq!(session.history_labels(), vec!["Initial Load", IMAGE_PLACEMENT_LABEL]);

        assert!(session.undo());
        assert_eq!(*session.raster().unwrap().get_pixel(15, 15), blue);
        assert!(session.regions().image_regions().is_empty());
    }

    #[test]
    fn lasso_fragment_masks_pixels_outside_the_path() {
        let (mut session, _) = session_with(None);
        session.set_mode(EditorMode::Lasso);
        session.pointer_down(DisplayPoint::new(0.0, 0.0));
        session.pointer_move(DisplayPoint::new(40.0, 0.0));
        session.pointer_move(DisplayPoint::new(0.0, 40.0));
        let outcome = session.pointer_up(DisplayPoint::new(0.0, 40.0)).unwrap();
        let PointerOutcome::ImageRegionCreated(id) = outcome else {
            panic!("expected an image region, got {outcome:?}");
        };

        let fragment = session.regions().image_region(id).unwrap();
        assert_eq!(fragment.kind, ImageRegionKind::Lasso);
        assert_eq!(fragment.image.get_pixel(2, 2).0[3], 255);
        assert_eq!(fragment.image.get_pixel(38, 38).0[3], 0);
    }

    #[test]
    fn export_request_carries_raster_and_live_regions() {
        let empty = EditorSession::new(
            SessionOptions::default(),
            None,
            Box::new(RecordingNotifier::default()),
        );
        assert!(empty.export_request().is_none());

        let (mut session, _) = session_with(None);
        let id = created_region(drag(&mut session, (10.0, 10.0), (100.0, 60.0)));
        let request = session.export_request().expect("image is loaded");
        assert_eq!(&request.raster, session.raster().unwrap());
        assert_eq!(request.regions.regions.len(), 1);
        assert_eq!(request.regions.regions[0].id, id);
    }

    #[test]
    fn loading_a_new_image_resets_regions_and_history() {
        let (mut session, _) = session_with(None);
        created_region(drag(&mut session, (10.0, 10.0), (100.0, 60.0)));
        session.commit_active_region().unwrap();
        assert_eq!(session.history_labels().len(), 2);

        session
            .load_image(RgbaImage::from_pixel(320, 200, WHITE))
            .unwrap();
        assert!(session.regions().regions().is_empty());
        assert_eq!(session.history_labels(), vec!["Initial Load"]);
        assert!(!session.can_undo());
        assert!(!session.can_redo());

        assert!(session.fit_to_view(640.0, 400.0));
        assert_eq!(session.display_transform().scale(), 1.0);
        assert_eq!(
            session.display_transform().origin(),
            DisplayPoint::new(160.0, 100.0)
        );
    }
}
