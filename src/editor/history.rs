use std::time::SystemTime;

use image::RgbaImage;
use thiserror::Error;

use super::store::RegionSet;

pub const DEFAULT_HISTORY_CAPACITY: usize = 30;
pub const INITIAL_LOAD_LABEL: &str = "Initial Load";
const MIN_HISTORY_CAPACITY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("history is already initialized")]
    AlreadyInitialized,
    #[error("history has not been initialized")]
    NotInitialized,
}

pub type HistoryResult<T> = std::result::Result<T, HistoryError>;

/// Immutable checkpoint of the raster and every region record.
#[derive(Debug, Clone)]
pub struct HistoryItem {
    raster: RgbaImage,
    regions: RegionSet,
    timestamp: SystemTime,
    label: String,
}

impl HistoryItem {
    fn new(raster: RgbaImage, regions: RegionSet, label: impl Into<String>) -> Self {
        Self {
            raster,
            regions,
            timestamp: SystemTime::now(),
            label: label.into(),
        }
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Bounded linear undo log with a cursor.
///
/// Committing after an undo discards the redo branch. When the log grows past
/// `capacity` the oldest item is evicted and the cursor follows its item.
#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    items: Vec<HistoryItem>,
    cursor: Option<usize>,
    capacity: usize,
}

impl Default for SnapshotHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_HISTORY_CAPACITY);
        Self {
            items: Vec::with_capacity(capacity),
            cursor: None,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&HistoryItem> {
        self.cursor.and_then(|index| self.items.get(index))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(HistoryItem::label)
    }

    pub fn initialize(&mut self, raster: RgbaImage) -> HistoryResult<()> {
        if self.cursor.is_some() {
            return Err(HistoryError::AlreadyInitialized);
        }
        self.items
            .push(HistoryItem::new(raster, RegionSet::default(), INITIAL_LOAD_LABEL));
        self.cursor = Some(0);
        tracing::debug!("history initialized");
        Ok(())
    }

    pub fn commit(
        &mut self,
        raster: RgbaImage,
        regions: RegionSet,
        label: impl Into<String>,
    ) -> HistoryResult<()> {
        let cursor = self.cursor.ok_or(HistoryError::NotInitialized)?;
        let label = label.into();

        let discarded = self.items.len() - (cursor + 1);
        self.items.truncate(cursor + 1);
        self.items.push(HistoryItem::new(raster, regions, label.clone()));

        let mut cursor = self.items.len() - 1;
        if self.items.len() > self.capacity {
            self.items.remove(0);
            cursor -= 1;
            tracing::debug!(capacity = self.capacity, "evicted oldest history item");
        }
        self.cursor = Some(cursor);
        tracing::debug!(%label, cursor, discarded, "history commit");
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|cursor| cursor > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor
            .is_some_and(|cursor| cursor + 1 < self.items.len())
    }

    /// Steps back one item; `None` at the oldest item or when empty.
    pub fn undo(&mut self) -> Option<&HistoryItem> {
        if !self.can_undo() {
            return None;
        }
        let cursor = self.cursor? - 1;
        self.cursor = Some(cursor);
        self.items.get(cursor)
    }

    /// Steps forward one item; `None` at the newest item or when empty.
    pub fn redo(&mut self) -> Option<&HistoryItem> {
        if !self.can_redo() {
            return None;
        }
        let cursor = self.cursor? + 1;
        self.cursor = Some(cursor);
        self.items.get(cursor)
    }

    pub fn reset(&mut self) {
        self.items.clear();
        self.cursor = None;
    }
}
