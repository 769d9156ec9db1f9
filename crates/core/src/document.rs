//! Document page model
//!
//! Tracks each page's intrinsic size, its current rotation and the state of its
//! raster. The capture scale is recorded when a raster is requested.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::transform::{Rect, Rotation, Size};

/// Page dimensions and rotation as read from the document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Unrotated width in document units (points)
    pub width: f64,
    /// Unrotated height in document units (points)
    pub height: f64,
    #[serde(default)]
    pub rotation: Rotation,
}

impl PageInfo {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            rotation: Rotation::Deg0,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Page metadata needed to open a session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub pages: Vec<PageInfo>,
}

impl DocumentMetadata {
    pub fn new(pages: Vec<PageInfo>) -> Self {
        Self { pages }
    }

    /// Metadata for `count` identical pages
    pub fn uniform(count: u32, info: PageInfo) -> Self {
        Self {
            pages: vec![info; count as usize],
        }
    }
}

/// Raster lifecycle of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterState {
    /// No raster has been requested since the last invalidation
    Stale,
    /// A raster was requested and is not complete yet
    Pending { generation: u64 },
    /// Raster complete; pointer input is accepted
    Ready { width_px: u32, height_px: u32 },
}

/// Ticket returned by a raster request, presented again on completion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterRequest {
    pub page: u32,
    pub scale: f64,
    pub rotation: Rotation,
    generation: u64,
}

impl RasterRequest {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// One page of the document
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    number: u32,
    size: Size,
    rotation: Rotation,
    capture_scale: f64,
    raster: RasterState,
}

impl Page {
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Unrotated size in document units
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Size in document units for the current rotation
    pub fn rotated_size(&self) -> Size {
        self.rotation.apply_to_size(self.size)
    }

    /// Capture scale recorded by the latest raster request
    pub fn capture_scale(&self) -> f64 {
        self.capture_scale
    }

    /// Size of the page raster in capture pixels
    pub fn capture_size(&self) -> Size {
        self.rotated_size().scaled(self.capture_scale)
    }

    /// Capture-space rectangle covering the page
    pub fn capture_bounds(&self) -> Rect {
        Rect::from_size(self.capture_size())
    }

    pub fn raster(&self) -> RasterState {
        self.raster
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.raster, RasterState::Ready { .. })
    }
}

/// Ordered pages of an open document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pages: Vec<Page>,
    next_generation: u64,
}

impl Document {
    /// Build the page model from metadata; every page starts at scale 1.0, not rasterized
    pub fn from_metadata(metadata: &DocumentMetadata) -> Self {
        let pages = metadata
            .pages
            .iter()
            .enumerate()
            .map(|(idx, info)| Page {
                number: idx as u32 + 1,
                size: Size::new(info.width, info.height),
                rotation: info.rotation,
                capture_scale: 1.0,
                raster: RasterState::Stale,
            })
            .collect();
        Self {
            pages,
            next_generation: 0,
        }
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }

    /// Validate a 1-based page number
    pub fn check_page(&self, page: u32) -> EngineResult<()> {
        if page == 0 || page > self.page_count() {
            return Err(EngineError::InvalidPage {
                page,
                page_count: self.page_count(),
            });
        }
        Ok(())
    }

    pub fn page(&self, page: u32) -> EngineResult<&Page> {
        self.check_page(page)?;
        Ok(&self.pages[(page - 1) as usize])
    }

    fn page_mut(&mut self, page: u32) -> EngineResult<&mut Page> {
        self.check_page(page)?;
        Ok(&mut self.pages[(page - 1) as usize])
    }

    /// Record a raster request; the page stops accepting input until completion
    pub fn request_raster(&mut self, page: u32, scale: f64) -> EngineResult<RasterRequest> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(EngineError::InvalidScale(scale));
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        let entry = self.page_mut(page)?;
        entry.capture_scale = scale;
        entry.raster = RasterState::Pending { generation };
        Ok(RasterRequest {
            page,
            scale,
            rotation: entry.rotation,
            generation,
        })
    }

    /// Mark a raster complete; returns false for a stale request
    pub fn complete_raster(
        &mut self,
        request: &RasterRequest,
        width_px: u32,
        height_px: u32,
    ) -> EngineResult<bool> {
        let entry = self.page_mut(request.page)?;
        match entry.raster {
            RasterState::Pending { generation } if generation == request.generation => {
                entry.raster = RasterState::Ready {
                    width_px,
                    height_px,
                };
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Turn a page by `degrees` (additive, modulo 360); the raster becomes stale
    pub fn rotate_page(&mut self, page: u32, degrees: i32) -> EngineResult<Rotation> {
        let delta = quarter_turn(degrees)?;
        let entry = self.page_mut(page)?;
        entry.rotation = entry.rotation.rotated_by(delta);
        entry.raster = RasterState::Stale;
        Ok(entry.rotation)
    }
}

/// Validate a rotation delta in degrees
pub(crate) fn quarter_turn(degrees: i32) -> EngineResult<Rotation> {
    Rotation::from_degrees(degrees).ok_or(EngineError::InvalidRotation(degrees))
}
