use std::fs;

use lopdf::{Dictionary, Document, Object, ObjectId};
use pagemark_core::{DocumentMetadata, PageInfo, Rotation};
use tracing::debug;

use crate::raster::PlaceholderRasterizer;
use crate::writer::ContentStreamWriter;
use crate::{OpenSource, PageSize, PdfEngineError, DEFAULT_PAGE_SIZE};

/// Guards against cyclic `Parent` chains in malformed files
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Page box and intrinsic rotation as stored in the file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Lower-left corner of the MediaBox
    pub origin_x: f64,
    pub origin_y: f64,
    /// Unrotated MediaBox size
    pub size: PageSize,
    /// `/Rotate`, normalized to a quarter turn
    pub rotation: Rotation,
}

impl PageGeometry {
    pub fn page_info(&self) -> PageInfo {
        PageInfo::new(self.size.width_pt, self.size.height_pt).with_rotation(self.rotation)
    }
}

/// A parsed PDF together with the geometry of each page
#[derive(Debug, Clone)]
pub struct LopdfDocument {
    doc: Document,
    pages: Vec<(ObjectId, PageGeometry)>,
}

impl LopdfDocument {
    pub fn open(source: impl Into<OpenSource>) -> Result<Self, PdfEngineError> {
        match source.into() {
            OpenSource::Path(path) => Self::from_bytes(&fs::read(path)?),
            OpenSource::Bytes(bytes) => Self::from_bytes(&bytes),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }
        Self::from_document(Document::load_mem(bytes)?)
    }

    pub fn from_document(doc: Document) -> Result<Self, PdfEngineError> {
        let pages: Vec<_> = doc
            .get_pages()
            .into_values()
            .map(|id| (id, read_geometry(&doc, id)))
            .collect();

        if pages.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        debug!(pages = pages.len(), "pdf opened");
        Ok(Self { doc, pages })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Geometry of a 1-based page
    pub fn geometry(&self, page: u32) -> Result<PageGeometry, PdfEngineError> {
        page.checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .map(|(_, geometry)| *geometry)
            .ok_or(PdfEngineError::PageOutOfRange {
                page,
                page_count: self.page_count(),
            })
    }

    pub fn page_size(&self, page: u32) -> Result<PageSize, PdfEngineError> {
        Ok(self.geometry(page)?.size)
    }

    /// Page sizes and rotations for building an editing session
    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata::new(self.pages.iter().map(|(_, g)| g.page_info()).collect())
    }

    pub fn rasterizer(&self) -> PlaceholderRasterizer {
        PlaceholderRasterizer::from_metadata(&self.metadata())
    }

    /// Hand the document to a writer that embeds annotations into it
    pub fn into_writer(self) -> ContentStreamWriter {
        ContentStreamWriter::new(self.doc, self.pages)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }
}

fn read_geometry(doc: &Document, page_id: ObjectId) -> PageGeometry {
    let media_box = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|array| {
            if array.len() != 4 {
                return None;
            }
            let mut values = [0.0f64; 4];
            for (value, obj) in values.iter_mut().zip(array) {
                *value = resolve(doc, obj)?.as_float().ok()? as f64;
            }
            Some(values)
        });

    let (origin_x, origin_y, size) = match media_box {
        Some([x0, y0, x1, y1]) => (
            x0.min(x1),
            y0.min(y1),
            PageSize {
                width_pt: (x1 - x0).abs(),
                height_pt: (y1 - y0).abs(),
            },
        ),
        None => (0.0, 0.0, DEFAULT_PAGE_SIZE),
    };

    let rotation = inherited(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .and_then(|degrees| i32::try_from(degrees).ok())
        .and_then(Rotation::from_degrees)
        .unwrap_or_default();

    PageGeometry {
        origin_x,
        origin_y,
        size,
        rotation,
    }
}

/// Look up an inheritable page attribute, walking the `Parent` chain
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node: &Dictionary = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_pdf, FixturePage};

    #[test]
    fn opens_pdf_and_reads_page_count() {
        let bytes = sample_pdf(&[FixturePage::letter(), FixturePage::a4()]);
        let document = LopdfDocument::open(bytes).expect("open should succeed");

        assert_eq!(document.page_count(), 2);
        assert_eq!(
            document.page_size(2).expect("page 2 exists"),
            PageSize {
                width_pt: 595.0,
                height_pt: 842.0
            }
        );
    }

    #[test]
    fn reads_rotate_and_normalizes_negative_angles() {
        let bytes = sample_pdf(&[
            FixturePage::letter().rotated(90),
            FixturePage::letter().rotated(-90),
        ]);
        let document = LopdfDocument::open(bytes).expect("open should succeed");

        assert_eq!(document.geometry(1).expect("page 1").rotation, Rotation::Deg90);
        assert_eq!(document.geometry(2).expect("page 2").rotation, Rotation::Deg270);

        let metadata = document.metadata();
        assert_eq!(metadata.pages[0].rotation, Rotation::Deg90);
        assert_eq!(metadata.pages[0].width, 612.0);
    }

    #[test]
    fn media_box_is_inherited_from_page_tree() {
        let bytes = sample_pdf(&[FixturePage::inherited()]);
        let document = LopdfDocument::open(bytes).expect("open should succeed");

        let geometry = document.geometry(1).expect("page 1");
        assert_eq!(geometry.size.width_pt, 612.0);
        assert_eq!(geometry.size.height_pt, 792.0);
    }

    #[test]
    fn media_box_origin_is_kept() {
        let bytes = sample_pdf(&[FixturePage::letter().with_origin(10.0, 20.0)]);
        let document = LopdfDocument::open(bytes).expect("open should succeed");

        let geometry = document.geometry(1).expect("page 1");
        assert_eq!((geometry.origin_x, geometry.origin_y), (10.0, 20.0));
        assert_eq!(geometry.size.width_pt, 612.0);
    }

    #[test]
    fn page_out_of_range_returns_error() {
        let document =
            LopdfDocument::open(sample_pdf(&[FixturePage::letter()])).expect("open should succeed");

        let err = document.page_size(2).expect_err("page 2 does not exist");
        assert!(matches!(
            err,
            PdfEngineError::PageOutOfRange {
                page: 2,
                page_count: 1
            }
        ));
        assert!(document.page_size(0).is_err());
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        let err = LopdfDocument::open(b"not a pdf".to_vec()).expect_err("should not parse");
        assert!(matches!(err, PdfEngineError::Parse(_)));
    }

    #[test]
    fn encrypted_marker_is_rejected() {
        let mut bytes = sample_pdf(&[FixturePage::letter()]);
        bytes.extend_from_slice(b"\n% /Encrypt\n");

        let err = LopdfDocument::open(bytes).expect_err("should be rejected");
        assert!(matches!(err, PdfEngineError::EncryptedUnsupported));
    }
}
