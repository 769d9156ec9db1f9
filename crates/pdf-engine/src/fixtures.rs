//! In-memory PDFs for unit tests

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

#[derive(Debug, Clone, Copy)]
pub struct FixturePage {
    width: f64,
    height: f64,
    origin: (f64, f64),
    rotate: Option<i64>,
    own_media_box: bool,
}

impl FixturePage {
    pub fn letter() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
            origin: (0.0, 0.0),
            rotate: None,
            own_media_box: true,
        }
    }

    pub fn a4() -> Self {
        Self {
            width: 595.0,
            height: 842.0,
            ..Self::letter()
        }
    }

    /// Letter page whose MediaBox comes from the page tree
    pub fn inherited() -> Self {
        Self {
            own_media_box: false,
            ..Self::letter()
        }
    }

    pub fn rotated(mut self, degrees: i64) -> Self {
        self.rotate = Some(degrees);
        self
    }

    pub fn with_origin(mut self, x: f64, y: f64) -> Self {
        self.origin = (x, y);
        self
    }
}

/// Build a PDF whose pages each carry a short text line using the
/// page-tree font `F1`
pub fn sample_pdf(pages: &[FixturePage]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::String(b"original".to_vec(), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content should encode"),
        ));

        let mut dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if page.own_media_box {
            let (x0, y0) = page.origin;
            let media_box: Vec<Object> = vec![
                (x0 as f32).into(),
                (y0 as f32).into(),
                ((x0 + page.width) as f32).into(),
                ((y0 + page.height) as f32).into(),
            ];
            dict.set("MediaBox", media_box);
        }
        if let Some(rotate) = page.rotate {
            dict.set("Rotate", rotate);
        }
        kids.push(doc.add_object(dict).into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save test PDF");
    buf
}
