//! Page rasterization seam
//!
//! The engine never decodes document content itself. Hosts provide a
//! [`PageRasterizer`] that turns a page into pixels at a given scale and rotation.

use crate::transform::Rotation;

/// RGBA8 pixel buffer of a rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA bytes, `width * height * 4` long
    pub pixels: Vec<u8>,
}

/// Errors reported by a rasterizer
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("page {0} cannot be rendered")]
    PageUnavailable(u32),

    #[error("rasterizer backend error: {0}")]
    Backend(String),
}

/// Renders document pages to pixels
pub trait PageRasterizer {
    /// Render `page` (1-based) at `scale` pixels per document unit, turned to `rotation`
    fn rasterize(
        &mut self,
        page: u32,
        scale: f64,
        rotation: Rotation,
    ) -> Result<RasterImage, RasterError>;
}
