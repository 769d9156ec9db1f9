use image::{imageops, ImageBuffer, Rgba};
use pagemark_core::{DocumentMetadata, PageRasterizer, RasterError, RasterImage, Rotation};
use tracing::trace;

use crate::PageSize;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BORDER: Rgba<u8> = Rgba([220, 220, 220, 255]);
const MARKER: Rgba<u8> = Rgba([120, 120, 120, 255]);

/// Renders blank page bitmaps at the right size
///
/// A grey marker sits in the unrotated page's top-left corner so turned
/// rasters can be told apart.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderRasterizer {
    pages: Vec<PageSize>,
}

impl PlaceholderRasterizer {
    pub fn new(pages: Vec<PageSize>) -> Self {
        Self { pages }
    }

    pub fn from_metadata(metadata: &DocumentMetadata) -> Self {
        Self::new(
            metadata
                .pages
                .iter()
                .map(|info| PageSize {
                    width_pt: info.width,
                    height_pt: info.height,
                })
                .collect(),
        )
    }

    pub fn render_page(&self, page: u32, scale: f64) -> Result<RgbaImage, RasterError> {
        let size = page
            .checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .ok_or(RasterError::PageUnavailable(page))?;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(RasterError::Backend(format!("invalid scale {scale}")));
        }

        let width = (size.width_pt * scale).round().max(1.0) as u32;
        let height = (size.height_pt * scale).round().max(1.0) as u32;
        let mut image = RgbaImage::from_pixel(width, height, PAPER);

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, BORDER);
                image.put_pixel(x, height - 1, BORDER);
            }
            for y in 0..height {
                image.put_pixel(0, y, BORDER);
                image.put_pixel(width - 1, y, BORDER);
            }

            let marker = (width.min(height) / 16).max(1);
            for y in 1..=marker {
                for x in 1..=marker {
                    image.put_pixel(x, y, MARKER);
                }
            }
        }

        Ok(image)
    }
}

impl PageRasterizer for PlaceholderRasterizer {
    fn rasterize(
        &mut self,
        page: u32,
        scale: f64,
        rotation: Rotation,
    ) -> Result<RasterImage, RasterError> {
        let image = rotate_image(self.render_page(page, scale)?, rotation);
        trace!(page, scale, width = image.width(), height = image.height(), "placeholder raster");
        Ok(into_raster(image))
    }
}

/// Turn an unrotated page bitmap clockwise
pub fn rotate_image(image: RgbaImage, rotation: Rotation) -> RgbaImage {
    match rotation {
        Rotation::Deg0 => image,
        Rotation::Deg90 => imageops::rotate90(&image),
        Rotation::Deg180 => imageops::rotate180(&image),
        Rotation::Deg270 => imageops::rotate270(&image),
    }
}

fn into_raster(image: RgbaImage) -> RasterImage {
    RasterImage {
        width: image.width(),
        height: image.height(),
        pixels: image.into_raw(),
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    /// Renders real page content through a system pdfium library
    pub struct PdfiumRasterizer {
        pdfium: Pdfium,
        bytes: Vec<u8>,
        intrinsic: Vec<Rotation>,
    }

    impl PdfiumRasterizer {
        /// `intrinsic` holds each page's `/Rotate`, which pdfium already applies
        pub fn from_system_library(
            bytes: Vec<u8>,
            metadata: &DocumentMetadata,
        ) -> Result<Self, RasterError> {
            let bindings = Pdfium::bind_to_system_library().map_err(|err| {
                RasterError::Backend(format!("failed to bind pdfium system library: {err}"))
            })?;

            Ok(Self {
                pdfium: Pdfium::new(bindings),
                bytes,
                intrinsic: metadata.pages.iter().map(|info| info.rotation).collect(),
            })
        }
    }

    impl PageRasterizer for PdfiumRasterizer {
        fn rasterize(
            &mut self,
            page: u32,
            scale: f64,
            rotation: Rotation,
        ) -> Result<RasterImage, RasterError> {
            let intrinsic = page
                .checked_sub(1)
                .and_then(|index| self.intrinsic.get(index as usize))
                .copied()
                .ok_or(RasterError::PageUnavailable(page))?;

            let document = self
                .pdfium
                .load_pdf_from_byte_slice(&self.bytes, None)
                .map_err(|err| RasterError::Backend(err.to_string()))?;
            let pdf_page = document
                .pages()
                .get((page - 1) as u16)
                .map_err(|_| RasterError::PageUnavailable(page))?;

            let width = (pdf_page.width().value as f64 * scale).round().max(1.0) as i32;
            let height = (pdf_page.height().value as f64 * scale).round().max(1.0) as i32;
            let config = PdfRenderConfig::new()
                .set_target_width(width)
                .set_maximum_height(height);

            let bitmap = pdf_page
                .render_with_config(&config)
                .map_err(|err| RasterError::Backend(err.to_string()))?;
            let rendered = RgbaImage::from_raw(
                bitmap.width() as u32,
                bitmap.height() as u32,
                bitmap.as_rgba_bytes(),
            )
            .ok_or_else(|| RasterError::Backend("bitmap size mismatch".to_owned()))?;

            let extra = Rotation::from_quarter_turns(intrinsic.turns_to(rotation) as i64);
            Ok(into_raster(rotate_image(rendered, extra)))
        }
    }
}
