use image::RgbaImage;
use thiserror::Error;

use super::image_region::{ImageRegion, ImageRegionKind, ImageRegionUpdate};
use super::region::{Region, RegionStyle, RegionUpdate};
use crate::geometry::{ImagePoint, SelectionRect};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("selection is too small to become a region")]
    DegenerateSelection,
    #[error("region {0} not found")]
    RegionNotFound(u64),
    #[error("update would leave region {0} with an empty extent")]
    InvalidGeometry(u64),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Owned copy of every region record, as captured by history snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionSet {
    pub regions: Vec<Region>,
    pub image_regions: Vec<ImageRegion>,
}

impl RegionSet {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.image_regions.is_empty()
    }
}

/// Ordered region collections plus the active selection.
///
/// Text regions and image fragments share one id counter; ids are handed out
/// in creation order and never reused, even across `clear` and `replace_all`.
#[derive(Debug, Clone)]
pub struct RegionStore {
    regions: Vec<Region>,
    image_regions: Vec<ImageRegion>,
    next_id: u64,
    active_region: Option<u64>,
    active_image_region: Option<u64>,
}

impl Default for RegionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionStore {
    pub fn new() -> Self {
        Self {
            regions: Vec::new(),
            image_regions: Vec::new(),
            next_id: 1,
            active_region: None,
            active_image_region: None,
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    fn find_region_mut(&mut self, id: u64) -> Option<&mut Region> {
        self.regions.iter_mut().find(|region| region.id == id)
    }

    fn find_image_region_mut(&mut self, id: u64) -> Option<&mut ImageRegion> {
        self.image_regions.iter_mut().find(|region| region.id == id)
    }

    pub fn create_region(
        &mut self,
        rect: SelectionRect,
        style: &RegionStyle,
    ) -> StoreResult<&Region> {
        if !rect.exceeds_min_extent() {
            return Err(StoreError::DegenerateSelection);
        }

        let id = self.allocate_id();
        self.regions.push(Region::new(id, rect, style.clone()));
        tracing::debug!(id, x = rect.x, y = rect.y, w = rect.w, h = rect.h, "region created");
        Ok(&self.regions[self.regions.len() - 1])
    }

    pub fn create_image_region(
        &mut self,
        kind: ImageRegionKind,
        rect: SelectionRect,
        pixels: RgbaImage,
        lasso_path: Option<Vec<ImagePoint>>,
    ) -> StoreResult<&ImageRegion> {
        if !rect.exceeds_min_extent() {
            return Err(StoreError::DegenerateSelection);
        }

        let id = self.allocate_id();
        self.image_regions
            .push(ImageRegion::new(id, kind, rect, pixels, lasso_path));
        tracing::debug!(id, ?kind, "image region created");
        Ok(&self.image_regions[self.image_regions.len() - 1])
    }

    pub fn update_region(&mut self, id: u64, update: RegionUpdate) -> StoreResult<()> {
        let region = self
            .find_region_mut(id)
            .ok_or(StoreError::RegionNotFound(id))?;
        let (w, h) = update.resulting_extent(region);
        if !(w > 0.0 && h > 0.0) {
            return Err(StoreError::InvalidGeometry(id));
        }
        update.apply_to(region);
        Ok(())
    }

    pub fn update_image_region(&mut self, id: u64, update: ImageRegionUpdate) -> StoreResult<()> {
        let region = self
            .find_image_region_mut(id)
            .ok_or(StoreError::RegionNotFound(id))?;
        let scale = update.resulting_scale(region);
        let (w, h) = update.resulting_extent(region);
        let finite = [scale, w, h].iter().all(|value| value.is_finite());
        if !finite || scale <= 0.0 || w <= 0.0 || h <= 0.0 {
            return Err(StoreError::InvalidGeometry(id));
        }
        update.apply_to(region);
        Ok(())
    }

    /// Mutable access for the recognition write-back and edit commit paths.
    pub(crate) fn region_mut(&mut self, id: u64) -> Option<&mut Region> {
        self.find_region_mut(id)
    }

    pub fn region(&self, id: u64) -> Option<&Region> {
        self.regions.iter().find(|region| region.id == id)
    }

    pub fn image_region(&self, id: u64) -> Option<&ImageRegion> {
        self.image_regions.iter().find(|region| region.id == id)
    }

    pub fn contains_region(&self, id: u64) -> bool {
        self.region(id).is_some()
    }

    /// Drops a fragment once its pixels have been placed into the raster.
    pub(crate) fn remove_image_region(&mut self, id: u64) -> Option<ImageRegion> {
        let index = self.image_regions.iter().position(|region| region.id == id)?;
        if self.active_image_region == Some(id) {
            self.active_image_region = None;
        }
        Some(self.image_regions.remove(index))
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn image_regions(&self) -> &[ImageRegion] {
        &self.image_regions
    }

    pub fn set_active(&mut self, id: Option<u64>) -> StoreResult<()> {
        if let Some(id) = id {
            if !self.contains_region(id) {
                return Err(StoreError::RegionNotFound(id));
            }
        }
        self.active_region = id;
        Ok(())
    }

    pub fn active(&self) -> Option<&Region> {
        self.active_region.and_then(|id| self.region(id))
    }

    pub fn active_id(&self) -> Option<u64> {
        self.active_region
    }

    pub fn set_active_image_region(&mut self, id: Option<u64>) -> StoreResult<()> {
        if let Some(id) = id {
            if self.image_region(id).is_none() {
                return Err(StoreError::RegionNotFound(id));
            }
        }
        self.active_image_region = id;
        Ok(())
    }

    pub fn active_image_region(&self) -> Option<&ImageRegion> {
        self.active_image_region.and_then(|id| self.image_region(id))
    }

    pub fn clear_active(&mut self) {
        self.active_region = None;
        self.active_image_region = None;
    }

    /// Deep copy of every record.
    pub fn snapshot(&self) -> RegionSet {
        RegionSet {
            regions: self.regions.clone(),
            image_regions: self.image_regions.clone(),
        }
    }

    /// Replaces both collections with copies of `set`; selections that no
    /// longer resolve are dropped.
    pub fn replace_all(&mut self, set: &RegionSet) {
        self.regions = set.regions.clone();
        self.image_regions = set.image_regions.clone();
        if self.active_region.is_some_and(|id| !self.contains_region(id)) {
            self.active_region = None;
        }
        if self
            .active_image_region
            .is_some_and(|id| self.image_region(id).is_none())
        {
            self.active_image_region = None;
        }
    }

    pub fn clear(&mut self) {
        self.regions.clear();
        self.image_regions.clear();
        self.clear_active();
    }
}
