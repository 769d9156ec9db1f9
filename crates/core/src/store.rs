//! Per-page annotation storage
//!
//! Each page owns a layer: its annotations in z-order (last is topmost) plus the
//! capture scale and rotation the layer's geometry is expressed in.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotation::{Annotation, AnnotationId};
use crate::error::{EngineError, EngineResult};
use crate::transform::{Point, Rotation, Size};

/// One page's annotations and the capture frame they live in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayer {
    capture_scale: f64,
    rotation: Rotation,
    annotations: Vec<Annotation>,
}

impl PageLayer {
    fn new(capture_scale: f64, rotation: Rotation) -> Self {
        Self {
            capture_scale,
            rotation,
            annotations: Vec::new(),
        }
    }

    /// Capture scale the geometry was drawn at
    pub fn capture_scale(&self) -> f64 {
        self.capture_scale
    }

    /// Page rotation the geometry was drawn under
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Annotations in z-order, bottom first
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

/// Annotation collection for a whole document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationStore {
    layers: Vec<PageLayer>,
    stroke_hit_tolerance: f64,
}

impl AnnotationStore {
    /// Create an empty store for a document with `page_count` pages
    pub fn new(page_count: u32) -> Self {
        Self {
            layers: (0..page_count)
                .map(|_| PageLayer::new(1.0, Rotation::Deg0))
                .collect(),
            stroke_hit_tolerance: 20.0,
        }
    }

    /// Create an empty store whose layers start in the given capture frames
    pub fn with_frames(frames: impl IntoIterator<Item = (f64, Rotation)>) -> Self {
        Self {
            layers: frames
                .into_iter()
                .map(|(scale, rotation)| PageLayer::new(scale, rotation))
                .collect(),
            stroke_hit_tolerance: 20.0,
        }
    }

    /// Set the pick radius used for freehand strokes and lines
    pub fn with_stroke_hit_tolerance(mut self, tolerance: f64) -> Self {
        self.stroke_hit_tolerance = tolerance;
        self
    }

    pub fn page_count(&self) -> u32 {
        self.layers.len() as u32
    }

    fn check_page(&self, page: u32) -> EngineResult<usize> {
        if page == 0 || page > self.page_count() {
            return Err(EngineError::InvalidPage {
                page,
                page_count: self.page_count(),
            });
        }
        Ok((page - 1) as usize)
    }

    fn locate(&self, id: AnnotationId) -> Option<(usize, usize)> {
        self.layers.iter().enumerate().find_map(|(layer_idx, layer)| {
            layer
                .annotations
                .iter()
                .position(|a| a.id() == id)
                .map(|idx| (layer_idx, idx))
        })
    }

    /// Add an annotation on top of a page's z-order
    pub fn add(&mut self, page: u32, mut annotation: Annotation) -> EngineResult<AnnotationId> {
        let idx = self.check_page(page)?;
        annotation.set_page_number(page);
        let id = annotation.id();
        debug!(%id, page, kind = ?annotation.kind(), "annotation added");
        self.layers[idx].annotations.push(annotation);
        Ok(id)
    }

    /// Remove an annotation by id; absent ids are a no-op
    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let (layer_idx, idx) = self.locate(id)?;
        debug!(%id, "annotation removed");
        Some(self.layers[layer_idx].annotations.remove(idx))
    }

    /// Mutate an annotation in place
    pub fn update<F>(&mut self, id: AnnotationId, mutator: F) -> EngineResult<()>
    where
        F: FnOnce(&mut Annotation),
    {
        let (layer_idx, idx) = self.locate(id).ok_or(EngineError::NotFound(id))?;
        mutator(&mut self.layers[layer_idx].annotations[idx]);
        Ok(())
    }

    /// Get an annotation by id
    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.locate(id)
            .map(|(layer_idx, idx)| &self.layers[layer_idx].annotations[idx])
    }

    /// Page number holding an annotation
    pub fn page_of(&self, id: AnnotationId) -> Option<u32> {
        self.locate(id).map(|(layer_idx, _)| layer_idx as u32 + 1)
    }

    /// Annotations on a page in z-order; empty for out-of-range pages
    pub fn query(&self, page: u32) -> &[Annotation] {
        match self.check_page(page) {
            Ok(idx) => &self.layers[idx].annotations,
            Err(_) => &[],
        }
    }

    /// Layer metadata for a page
    pub fn layer(&self, page: u32) -> Option<&PageLayer> {
        self.check_page(page).ok().map(|idx| &self.layers[idx])
    }

    /// Find the topmost annotation at a point
    pub fn hit_test(&self, page: u32, point: &Point) -> Option<&Annotation> {
        self.query(page)
            .iter()
            .rev()
            .find(|a| a.hit_test(point, self.stroke_hit_tolerance))
    }

    /// Every annotation at a point, topmost first
    pub fn hit_test_all(&self, page: u32, point: &Point) -> Vec<AnnotationId> {
        self.query(page)
            .iter()
            .rev()
            .filter(|a| a.hit_test(point, self.stroke_hit_tolerance))
            .map(Annotation::id)
            .collect()
    }

    /// Remove every annotation on a page
    pub fn clear_page(&mut self, page: u32) -> EngineResult<Vec<Annotation>> {
        let idx = self.check_page(page)?;
        Ok(std::mem::take(&mut self.layers[idx].annotations))
    }

    /// Move an annotation to the top of its page's z-order
    pub fn bring_to_front(&mut self, id: AnnotationId) -> EngineResult<()> {
        let (layer_idx, idx) = self.locate(id).ok_or(EngineError::NotFound(id))?;
        let annotations = &mut self.layers[layer_idx].annotations;
        let annotation = annotations.remove(idx);
        annotations.push(annotation);
        Ok(())
    }

    /// Move an annotation to the bottom of its page's z-order
    pub fn send_to_back(&mut self, id: AnnotationId) -> EngineResult<()> {
        let (layer_idx, idx) = self.locate(id).ok_or(EngineError::NotFound(id))?;
        let annotations = &mut self.layers[layer_idx].annotations;
        let annotation = annotations.remove(idx);
        annotations.insert(0, annotation);
        Ok(())
    }

    /// Total number of annotations
    pub fn len(&self) -> usize {
        self.layers.iter().map(|l| l.annotations.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(|l| l.annotations.is_empty())
    }

    /// Iterate over layers with their page numbers
    pub fn layers(&self) -> impl Iterator<Item = (u32, &PageLayer)> {
        self.layers
            .iter()
            .enumerate()
            .map(|(idx, layer)| (idx as u32 + 1, layer))
    }

    /// Declare the capture frame of an empty or freshly loaded layer without
    /// touching its geometry
    pub fn set_layer_frame(
        &mut self,
        page: u32,
        capture_scale: f64,
        rotation: Rotation,
    ) -> EngineResult<()> {
        let idx = self.check_page(page)?;
        if !capture_scale.is_finite() || capture_scale <= 0.0 {
            return Err(EngineError::InvalidScale(capture_scale));
        }
        let layer = &mut self.layers[idx];
        layer.capture_scale = capture_scale;
        layer.rotation = rotation;
        Ok(())
    }

    /// Re-express a page's geometry at a new capture scale
    pub fn rescale_page(&mut self, page: u32, capture_scale: f64) -> EngineResult<()> {
        let idx = self.check_page(page)?;
        if !capture_scale.is_finite() || capture_scale <= 0.0 {
            return Err(EngineError::InvalidScale(capture_scale));
        }
        let layer = &mut self.layers[idx];
        if layer.capture_scale == capture_scale {
            return Ok(());
        }
        let factor = capture_scale / layer.capture_scale;
        for annotation in &mut layer.annotations {
            annotation.rescale(factor);
        }
        debug!(
            page,
            from = layer.capture_scale,
            to = capture_scale,
            "layer rescaled"
        );
        layer.capture_scale = capture_scale;
        Ok(())
    }

    /// Re-project a page's geometry for a new rotation
    ///
    /// `page_size` is the unrotated document size of the page. Annotations keep
    /// covering the same content after the turn.
    pub fn rotate_page(
        &mut self,
        page: u32,
        rotation: Rotation,
        page_size: Size,
    ) -> EngineResult<()> {
        let idx = self.check_page(page)?;
        let layer = &mut self.layers[idx];
        let turns = layer.rotation.turns_to(rotation);
        if turns == 0 {
            return Ok(());
        }
        let capture_size = layer
            .rotation
            .apply_to_size(page_size)
            .scaled(layer.capture_scale);
        for annotation in &mut layer.annotations {
            annotation.shape_mut().rotate_quarter(turns, capture_size);
        }
        debug!(page, from = ?layer.rotation, to = ?rotation, "layer rotated");
        layer.rotation = rotation;
        Ok(())
    }
}
