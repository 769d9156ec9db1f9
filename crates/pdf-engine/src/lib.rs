//! PDF backend for the pagemark engine
//!
//! Reads page metadata with lopdf, renders placeholder page bitmaps (or real
//! ones with the `pdfium` feature) and writes baked annotations back into the
//! page content streams.

use std::path::{Path, PathBuf};

use pagemark_core::{RasterError, WriteError};

pub mod document;
pub mod raster;
pub mod writer;

#[cfg(test)]
mod fixtures;

pub use document::{LopdfDocument, PageGeometry};
#[cfg(feature = "pdfium")]
pub use raster::pdfium_backend::PdfiumRasterizer;
pub use raster::PlaceholderRasterizer;
pub use writer::ContentStreamWriter;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f64,
    pub height_pt: f64,
}

/// US Letter, used when a page has no readable MediaBox
pub const DEFAULT_PAGE_SIZE: PageSize = PageSize {
    width_pt: 612.0,
    height_pt: 792.0,
};

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for OpenSource {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<PdfEngineError> for WriteError {
    fn from(err: PdfEngineError) -> Self {
        match err {
            PdfEngineError::PageOutOfRange { page, .. } => WriteError::PageUnavailable(page),
            PdfEngineError::Image(err) => WriteError::Rejected(err.to_string()),
            other => WriteError::Backend(other.to_string()),
        }
    }
}

impl From<PdfEngineError> for RasterError {
    fn from(err: PdfEngineError) -> Self {
        match err {
            PdfEngineError::PageOutOfRange { page, .. } => RasterError::PageUnavailable(page),
            other => RasterError::Backend(other.to_string()),
        }
    }
}
