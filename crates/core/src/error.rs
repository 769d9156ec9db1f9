//! Error types for the annotation engine

use crate::annotation::AnnotationId;

/// Errors surfaced by engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("page {page} is out of range (document has {page_count} pages)")]
    InvalidPage { page: u32, page_count: u32 },

    #[error("annotation not found: {0}")]
    NotFound(AnnotationId),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("page {0} has no raster ready for input")]
    RasterNotReady(u32),

    #[error("rotation of {0} degrees is not a multiple of 90")]
    InvalidRotation(i32),

    #[error("invalid capture scale: {0}")]
    InvalidScale(f64),

    #[error("rasterization failed: {0}")]
    Raster(#[from] crate::raster::RasterError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
