//! Content-stream writer
//!
//! Appends baked annotations to each page as PDF operators. Instructions
//! arrive in display coordinates (the page as the user saw it); a `cm` matrix
//! maps them back onto the unrotated MediaBox and `/Rotate` is updated to the
//! session rotation.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use pagemark_core::annotation::TEXT_LINE_HEIGHT;
use pagemark_core::{
    Color, DocumentWriter, DrawInstruction, ImageFormat, PageTarget, Point, Rotation, StampImage,
    WriteError,
};
use tracing::{debug, warn};

use crate::document::{inherited, PageGeometry};
use crate::PdfEngineError;

/// Control point offset for approximating a quarter ellipse with a cubic Bezier
const KAPPA: f64 = 0.552_284_8;

const FONT_NAME: &str = "PmHelv";

/// Page currently being drawn
#[derive(Debug)]
struct PageCanvas {
    page: u32,
    page_id: ObjectId,
    operations: Vec<Operation>,
    resources: Vec<(&'static [u8], String, ObjectId)>,
    drawn: usize,
    /// Canvas lengths when the open annotation began
    mark: Option<Mark>,
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    operations: usize,
    resources: usize,
    drawn: usize,
}

impl PageCanvas {
    fn mark(&self) -> Mark {
        Mark {
            operations: self.operations.len(),
            resources: self.resources.len(),
            drawn: self.drawn,
        }
    }

    fn truncate(&mut self, mark: Mark) {
        self.operations.truncate(mark.operations);
        self.resources.truncate(mark.resources);
        self.drawn = mark.drawn;
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    fn use_resource(&mut self, category: &'static [u8], name: String, id: ObjectId) {
        if !self.resources.iter().any(|(c, n, _)| *c == category && *n == name) {
            self.resources.push((category, name, id));
        }
    }
}

/// [`DocumentWriter`] that embeds annotations into a lopdf document
#[derive(Debug)]
pub struct ContentStreamWriter {
    doc: Document,
    pages: Vec<(ObjectId, PageGeometry)>,
    current: Option<PageCanvas>,
    font_id: Option<ObjectId>,
    /// ExtGState objects keyed by opacity in thousandths
    states: HashMap<u16, ObjectId>,
    next_image: u32,
}

impl ContentStreamWriter {
    pub(crate) fn new(doc: Document, pages: Vec<(ObjectId, PageGeometry)>) -> Self {
        Self {
            doc,
            pages,
            current: None,
            font_id: None,
            states: HashMap::new(),
            next_image: 0,
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, PdfEngineError> {
        if let Some(canvas) = &self.current {
            warn!(page = canvas.page, "saving with an unfinished page; its drawing is dropped");
        }
        self.doc.prune_objects();
        // Objects of rolled back annotations are gone after pruning
        let objects = &self.doc.objects;
        self.states.retain(|_, id| objects.contains_key(id));
        self.font_id = self.font_id.filter(|id| objects.contains_key(id));
        let mut buf = Vec::new();
        self.doc.save_to(&mut buf)?;
        Ok(buf)
    }

    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), PdfEngineError> {
        let bytes = self.save_to_bytes()?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn page(&self, page: u32) -> Result<(ObjectId, PageGeometry), WriteError> {
        page.checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .copied()
            .ok_or(WriteError::PageUnavailable(page))
    }

    fn canvas(&mut self) -> Result<&mut PageCanvas, WriteError> {
        self.current
            .as_mut()
            .ok_or_else(|| WriteError::Rejected("no page is open".to_owned()))
    }

    fn font(&mut self) -> ObjectId {
        if let Some(id) = self.font_id {
            return id;
        }
        let id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        self.font_id = Some(id);
        id
    }

    /// Graphics state for a translucent instruction, or None when opaque
    fn opacity_state(&mut self, opacity: f64) -> Option<(String, ObjectId)> {
        let opacity = if opacity.is_finite() { opacity.clamp(0.0, 1.0) } else { 1.0 };
        if opacity >= 1.0 {
            return None;
        }
        let key = (opacity * 1000.0).round() as u16;
        let doc = &mut self.doc;
        let id = *self.states.entry(key).or_insert_with(|| {
            let value = key as f32 / 1000.0;
            doc.add_object(dictionary! {
                "Type" => "ExtGState",
                "CA" => value,
                "ca" => value,
            })
        });
        Some((format!("PmGs{key}"), id))
    }

    fn image_xobject(&mut self, image: &StampImage) -> Result<ObjectId, PdfEngineError> {
        let format = match image.format() {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        };
        let decoded = image::load_from_memory_with_format(image.bytes(), format)?.to_rgba8();
        let (width, height) = decoded.dimensions();

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in decoded.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
        };
        if alpha.iter().any(|&a| a < u8::MAX) {
            let mask_id = self.doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8i64,
                },
                alpha,
            ));
            dict.set("SMask", mask_id);
        }

        Ok(self.doc.add_object(Stream::new(dict, rgb)))
    }

    /// Make sure the page owns its Resources so additions don't leak into siblings
    fn own_resources(&mut self, page_id: ObjectId) -> Result<(), PdfEngineError> {
        if self.doc.get_dictionary(page_id)?.has(b"Resources") {
            return Ok(());
        }
        let inherited = inherited(&self.doc, page_id, b"Resources")
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_default();
        self.doc
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Resources", inherited);
        Ok(())
    }

    fn register_resource(
        &mut self,
        page_id: ObjectId,
        category: &[u8],
        name: &str,
        id: ObjectId,
    ) -> Result<(), PdfEngineError> {
        let resources = self.doc.get_or_create_resources(page_id)?.as_dict_mut()?;
        let linked = resources
            .get(category)
            .and_then(Object::as_reference)
            .ok();
        if linked.is_none() && !matches!(resources.get(category), Ok(Object::Dictionary(_))) {
            resources.set(category.to_vec(), Dictionary::new());
        }

        let entries = match linked {
            Some(linked) => self.doc.get_object_mut(linked)?.as_dict_mut()?,
            None => self
                .doc
                .get_or_create_resources(page_id)?
                .as_dict_mut()?
                .get_mut(category)?
                .as_dict_mut()?,
        };
        entries.set(name.as_bytes().to_vec(), id);
        Ok(())
    }

    /// Wrap the existing content in q/Q and append ours after it
    fn append_content(&mut self, page_id: ObjectId, ours: Vec<u8>) -> Result<(), PdfEngineError> {
        let existing = match self.doc.get_dictionary(page_id)?.get(b"Contents") {
            Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };

        let open_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let mut tail = b"Q\n".to_vec();
        tail.extend_from_slice(&ours);
        let tail_id = self.doc.add_object(Stream::new(dictionary! {}, tail));

        let mut contents = Vec::with_capacity(existing.len() + 2);
        contents.push(Object::Reference(open_id));
        contents.extend(existing);
        contents.push(Object::Reference(tail_id));

        self.doc
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Contents", contents);
        Ok(())
    }

    fn finish_page(&mut self, canvas: PageCanvas, rotation: Rotation) -> Result<(), PdfEngineError> {
        if canvas.drawn > 0 {
            self.own_resources(canvas.page_id)?;
            for (category, name, id) in &canvas.resources {
                self.register_resource(canvas.page_id, category, name, *id)?;
            }
            let content = Content {
                operations: canvas.operations,
            };
            self.append_content(canvas.page_id, content.encode()?)?;
        }

        self.doc
            .get_object_mut(canvas.page_id)?
            .as_dict_mut()?
            .set("Rotate", rotation.degrees() as i64);
        debug!(page = canvas.page, drawn = canvas.drawn, "page written");
        Ok(())
    }
}

impl DocumentWriter for ContentStreamWriter {
    fn begin_page(&mut self, target: &PageTarget) -> Result<(), WriteError> {
        if let Some(open) = &self.current {
            return Err(WriteError::Rejected(format!("page {} is still open", open.page)));
        }
        let (page_id, geometry) = self.page(target.page)?;

        let mut canvas = PageCanvas {
            page: target.page,
            page_id,
            operations: Vec::new(),
            resources: Vec::new(),
            drawn: 0,
            mark: None,
        };
        canvas.push("q", vec![]);
        canvas.push("cm", reals(&display_matrix(&geometry, target.rotation)));
        self.current = Some(canvas);
        Ok(())
    }

    fn begin_annotation(&mut self) -> Result<(), WriteError> {
        let canvas = self.canvas()?;
        canvas.mark = Some(canvas.mark());
        Ok(())
    }

    fn draw(&mut self, instruction: &DrawInstruction) -> Result<(), WriteError> {
        self.canvas()?;

        // Resources are created before the canvas borrow
        let state = match instruction {
            DrawInstruction::Line { opacity, .. }
            | DrawInstruction::Rect { opacity, .. }
            | DrawInstruction::Ellipse { opacity, .. }
            | DrawInstruction::Text { opacity, .. } => self.opacity_state(*opacity),
            DrawInstruction::Image { .. } => None,
        };
        let font = match instruction {
            DrawInstruction::Text { .. } => Some(self.font()),
            _ => None,
        };
        let image = match instruction {
            DrawInstruction::Image { image, .. } => {
                self.next_image += 1;
                let id = self.image_xobject(image)?;
                Some((format!("PmIm{}", self.next_image), id))
            }
            _ => None,
        };

        let canvas = self.canvas()?;
        canvas.push("q", vec![]);
        if let Some((name, id)) = state {
            canvas.push("gs", vec![Object::Name(name.as_bytes().to_vec())]);
            canvas.use_resource(b"ExtGState", name, id);
        }

        match instruction {
            DrawInstruction::Line {
                start,
                end,
                thickness,
                color,
                ..
            } => {
                canvas.push("RG", rgb(color));
                canvas.push("w", reals(&[*thickness]));
                canvas.push("J", vec![1.into()]);
                canvas.push("j", vec![1.into()]);
                canvas.push("m", point(start));
                canvas.push("l", point(end));
                canvas.push("S", vec![]);
            }
            DrawInstruction::Rect {
                origin,
                width,
                height,
                stroke,
                stroke_width,
                fill,
                ..
            } => {
                set_paint(canvas, stroke, *stroke_width, fill.as_ref());
                canvas.push("re", reals(&[origin.x, origin.y, *width, *height]));
                canvas.push(paint_operator(*stroke_width, fill.is_some()), vec![]);
            }
            DrawInstruction::Ellipse {
                center,
                radius_x,
                radius_y,
                stroke,
                stroke_width,
                fill,
                ..
            } => {
                set_paint(canvas, stroke, *stroke_width, fill.as_ref());
                ellipse_path(canvas, center, *radius_x, *radius_y);
                canvas.push(paint_operator(*stroke_width, fill.is_some()), vec![]);
            }
            DrawInstruction::Text {
                origin,
                content,
                font_size,
                color,
                ..
            } => {
                if let Some(font_id) = font {
                    canvas.use_resource(b"Font", FONT_NAME.to_owned(), font_id);
                }
                canvas.push("BT", vec![]);
                canvas.push(
                    "Tf",
                    vec![Object::Name(FONT_NAME.as_bytes().to_vec()), real(*font_size)],
                );
                canvas.push("rg", rgb(color));
                canvas.push("TL", reals(&[font_size * TEXT_LINE_HEIGHT]));
                canvas.push("Td", point(origin));
                for (index, line) in content.split('\n').enumerate() {
                    if index > 0 {
                        canvas.push("T*", vec![]);
                    }
                    canvas.push(
                        "Tj",
                        vec![Object::String(latin1(line), StringFormat::Literal)],
                    );
                }
                canvas.push("ET", vec![]);
            }
            DrawInstruction::Image {
                origin,
                width,
                height,
                ..
            } => {
                if let Some((name, id)) = image {
                    canvas.push("cm", reals(&[*width, 0.0, 0.0, *height, origin.x, origin.y]));
                    canvas.push("Do", vec![Object::Name(name.as_bytes().to_vec())]);
                    canvas.use_resource(b"XObject", name, id);
                }
            }
        }

        canvas.push("Q", vec![]);
        canvas.drawn += 1;
        Ok(())
    }

    fn commit_annotation(&mut self) -> Result<(), WriteError> {
        self.canvas()?.mark = None;
        Ok(())
    }

    fn rollback_annotation(&mut self) {
        if let Some(canvas) = self.current.as_mut() {
            if let Some(mark) = canvas.mark.take() {
                canvas.truncate(mark);
            }
        }
    }

    fn end_page(&mut self, target: &PageTarget) -> Result<(), WriteError> {
        let mut canvas = self
            .current
            .take()
            .ok_or_else(|| WriteError::Rejected("no page is open".to_owned()))?;
        if canvas.page != target.page {
            let open = canvas.page;
            self.current = Some(canvas);
            return Err(WriteError::Rejected(format!(
                "page {} is open, not page {}",
                open, target.page
            )));
        }

        if let Some(mark) = canvas.mark.take() {
            warn!(page = canvas.page, "annotation left open at end of page; dropped");
            canvas.truncate(mark);
        }
        canvas.push("Q", vec![]);
        self.finish_page(canvas, target.rotation)?;
        Ok(())
    }
}

/// Matrix taking display coordinates (origin bottom-left of the page as
/// shown at `rotation`) to the page's default user space
pub fn display_matrix(geometry: &PageGeometry, rotation: Rotation) -> [f64; 6] {
    let w = geometry.size.width_pt;
    let h = geometry.size.height_pt;
    let [a, b, c, d, e, f] = match rotation {
        Rotation::Deg0 => [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        Rotation::Deg90 => [0.0, 1.0, -1.0, 0.0, w, 0.0],
        Rotation::Deg180 => [-1.0, 0.0, 0.0, -1.0, w, h],
        Rotation::Deg270 => [0.0, -1.0, 1.0, 0.0, 0.0, h],
    };
    [a, b, c, d, e + geometry.origin_x, f + geometry.origin_y]
}

fn set_paint(canvas: &mut PageCanvas, stroke: &Color, stroke_width: f64, fill: Option<&Color>) {
    canvas.push("RG", rgb(stroke));
    canvas.push("w", reals(&[stroke_width]));
    if let Some(fill) = fill {
        canvas.push("rg", rgb(fill));
    }
}

fn paint_operator(stroke_width: f64, filled: bool) -> &'static str {
    match (filled, stroke_width > 0.0) {
        (true, true) => "B",
        (true, false) => "f",
        (false, _) => "S",
    }
}

fn ellipse_path(canvas: &mut PageCanvas, center: &Point, rx: f64, ry: f64) {
    let (cx, cy) = (center.x, center.y);
    let (ox, oy) = (rx * KAPPA, ry * KAPPA);

    canvas.push("m", reals(&[cx + rx, cy]));
    canvas.push("c", reals(&[cx + rx, cy + oy, cx + ox, cy + ry, cx, cy + ry]));
    canvas.push("c", reals(&[cx - ox, cy + ry, cx - rx, cy + oy, cx - rx, cy]));
    canvas.push("c", reals(&[cx - rx, cy - oy, cx - ox, cy - ry, cx, cy - ry]));
    canvas.push("c", reals(&[cx + ox, cy - ry, cx + rx, cy - oy, cx + rx, cy]));
    canvas.push("h", vec![]);
}

fn real(value: f64) -> Object {
    (value as f32).into()
}

fn reals(values: &[f64]) -> Vec<Object> {
    values.iter().copied().map(real).collect()
}

fn point(point: &Point) -> Vec<Object> {
    reals(&[point.x, point.y])
}

fn rgb(color: &Color) -> Vec<Object> {
    let (r, g, b, _) = color.to_normalized();
    reals(&[r, g, b])
}

/// WinAnsi-compatible bytes; characters outside Latin-1 become '?'
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
