//! Export baking
//!
//! Converts every annotation from its page layer's capture space into document
//! space and emits [`DrawInstruction`]s. A [`DocumentWriter`] consumes the
//! instructions; the baking itself is pure.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::annotation::{Annotation, AnnotationId, AnnotationKind, Color, Shape, StampImage};
use crate::document::Document;
use crate::store::AnnotationStore;
use crate::transform::{CaptureTransform, Point, Rotation};

/// Drawing primitive in document units (origin bottom-left)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrawInstruction {
    Line {
        start: Point,
        end: Point,
        thickness: f64,
        color: Color,
        opacity: f64,
    },
    /// Rectangle with `origin` at its bottom-left corner
    Rect {
        origin: Point,
        width: f64,
        height: f64,
        stroke: Color,
        stroke_width: f64,
        fill: Option<Color>,
        opacity: f64,
    },
    Ellipse {
        center: Point,
        radius_x: f64,
        radius_y: f64,
        stroke: Color,
        stroke_width: f64,
        fill: Option<Color>,
        opacity: f64,
    },
    /// Text with `origin` on the baseline of the first line
    Text {
        origin: Point,
        content: String,
        font_size: f64,
        color: Color,
        opacity: f64,
    },
    /// Image with `origin` at its bottom-left corner
    Image {
        origin: Point,
        width: f64,
        height: f64,
        image: StampImage,
    },
}

/// Page a writer is asked to draw on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageTarget {
    pub page: u32,
    /// Width in document units for the current rotation
    pub width: f64,
    /// Height in document units for the current rotation
    pub height: f64,
    pub rotation: Rotation,
}

/// Instructions produced for one annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakedAnnotation {
    pub id: AnnotationId,
    pub kind: AnnotationKind,
    pub instructions: Vec<DrawInstruction>,
}

/// All baked annotations of one page, in z-order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInstructions {
    pub target: PageTarget,
    pub annotations: Vec<BakedAnnotation>,
}

/// An annotation that could not be embedded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedFailure {
    pub page: u32,
    /// None when the failure concerns the page as a whole
    pub id: Option<AnnotationId>,
    pub reason: String,
}

/// Result of baking a whole document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExportPlan {
    pub pages: Vec<PageInstructions>,
    pub failures: Vec<EmbedFailure>,
}

impl ExportPlan {
    /// Serialize the plan for hosts that hand it to an external writer
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn annotation_count(&self) -> usize {
        self.pages.iter().map(|p| p.annotations.len()).sum()
    }

    /// Instructions in emission order, across all pages
    pub fn instructions(&self) -> impl Iterator<Item = (u32, &DrawInstruction)> {
        self.pages.iter().flat_map(|p| {
            p.annotations
                .iter()
                .flat_map(move |a| a.instructions.iter().map(move |i| (p.target.page, i)))
        })
    }
}

/// Summary of an export pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExportReport {
    pub pages_written: usize,
    pub annotations_written: usize,
    pub failures: Vec<EmbedFailure>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Errors returned by a document writer
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("page {0} cannot be written")]
    PageUnavailable(u32),

    #[error("instruction rejected: {0}")]
    Rejected(String),

    #[error("writer backend error: {0}")]
    Backend(String),
}

/// Consumer of baked draw instructions
///
/// Each annotation is drawn between `begin_annotation` and either
/// `commit_annotation` or `rollback_annotation`. A rolled back annotation
/// must leave no trace on the page.
pub trait DocumentWriter {
    fn begin_page(&mut self, target: &PageTarget) -> Result<(), WriteError>;

    fn begin_annotation(&mut self) -> Result<(), WriteError>;

    fn draw(&mut self, instruction: &DrawInstruction) -> Result<(), WriteError>;

    fn commit_annotation(&mut self) -> Result<(), WriteError>;

    /// Discard everything drawn since `begin_annotation`
    fn rollback_annotation(&mut self);

    fn end_page(&mut self, target: &PageTarget) -> Result<(), WriteError>;
}

/// Export options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    /// Visit pages with no annotations (lets writers apply rotation changes)
    pub include_empty_pages: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_empty_pages: true,
        }
    }
}

/// Bakes annotations into document-space instructions
#[derive(Debug, Clone, Default)]
pub struct ExportBaker {
    options: ExportOptions,
}

impl ExportBaker {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Bake every page in ascending order, annotations in z-order
    pub fn bake(&self, document: &Document, store: &AnnotationStore) -> ExportPlan {
        let mut plan = ExportPlan::default();

        for page in document.pages() {
            let number = page.number();
            let annotations = store.query(number);
            if annotations.is_empty() && !self.options.include_empty_pages {
                continue;
            }

            let size = page.rotated_size();
            let target = PageTarget {
                page: number,
                width: size.width,
                height: size.height,
                rotation: page.rotation(),
            };
            let scale = store
                .layer(number)
                .map(|layer| layer.capture_scale())
                .unwrap_or_else(|| page.capture_scale());

            let transform = match CaptureTransform::new(scale, size.height) {
                Ok(transform) => transform,
                Err(err) => {
                    for annotation in annotations {
                        skip(&mut plan.failures, failure(number, annotation.id(), err.to_string()));
                    }
                    continue;
                }
            };

            let mut baked = Vec::with_capacity(annotations.len());
            for annotation in annotations {
                match bake_annotation(annotation, &transform) {
                    Ok(instructions) => baked.push(BakedAnnotation {
                        id: annotation.id(),
                        kind: annotation.kind(),
                        instructions,
                    }),
                    Err(reason) => skip(&mut plan.failures, failure(number, annotation.id(), reason)),
                }
            }

            plan.pages.push(PageInstructions {
                target,
                annotations: baked,
            });
        }

        debug!(
            pages = plan.pages.len(),
            annotations = plan.annotation_count(),
            failures = plan.failures.len(),
            "export baked"
        );
        plan
    }

    /// Bake and drive a writer through the result
    ///
    /// Failures never abort the pass; they are collected in the report.
    pub fn export(
        &self,
        document: &Document,
        store: &AnnotationStore,
        writer: &mut dyn DocumentWriter,
    ) -> ExportReport {
        let plan = self.bake(document, store);
        let mut report = ExportReport {
            failures: plan.failures,
            ..ExportReport::default()
        };

        for page in &plan.pages {
            let target = &page.target;
            if let Err(err) = writer.begin_page(target) {
                warn!(page = target.page, error = %err, "page skipped during export");
                for baked in &page.annotations {
                    skip(&mut report.failures, failure(target.page, baked.id, err.to_string()));
                }
                continue;
            }

            for baked in &page.annotations {
                match write_annotation(writer, baked) {
                    Ok(()) => report.annotations_written += 1,
                    Err(err) => {
                        writer.rollback_annotation();
                        skip(&mut report.failures, failure(target.page, baked.id, err.to_string()));
                    }
                }
            }

            match writer.end_page(target) {
                Ok(()) => report.pages_written += 1,
                Err(err) => {
                    warn!(page = target.page, error = %err, "page could not be finished");
                    report.failures.push(EmbedFailure {
                        page: target.page,
                        id: None,
                        reason: err.to_string(),
                    });
                }
            }
        }

        report
    }
}

fn write_annotation(
    writer: &mut dyn DocumentWriter,
    baked: &BakedAnnotation,
) -> Result<(), WriteError> {
    writer.begin_annotation()?;
    for instruction in &baked.instructions {
        writer.draw(instruction)?;
    }
    writer.commit_annotation()
}

fn skip(failures: &mut Vec<EmbedFailure>, item: EmbedFailure) {
    warn!(page = item.page, id = ?item.id, reason = %item.reason, "annotation not embedded");
    failures.push(item);
}

fn failure(page: u32, id: AnnotationId, reason: String) -> EmbedFailure {
    EmbedFailure {
        page,
        id: Some(id),
        reason,
    }
}

/// Convert one annotation to document-space instructions
pub fn bake_annotation(
    annotation: &Annotation,
    transform: &CaptureTransform,
) -> Result<Vec<DrawInstruction>, String> {
    let shape = annotation.shape();
    if !shape.is_finite() {
        return Err("geometry is not finite".to_string());
    }

    let style = annotation.style();
    let stroke_width = transform.length_to_document(style.stroke_width);
    let opacity = style.opacity;

    let instructions = match shape {
        Shape::Freehand { points } => match points.as_slice() {
            [] => return Err("stroke has no points".to_string()),
            [only] => {
                let p = transform.to_document(*only);
                vec![DrawInstruction::Line {
                    start: p,
                    end: p,
                    thickness: stroke_width,
                    color: style.stroke_color,
                    opacity,
                }]
            }
            _ => points
                .windows(2)
                .map(|w| DrawInstruction::Line {
                    start: transform.to_document(w[0]),
                    end: transform.to_document(w[1]),
                    thickness: stroke_width,
                    color: style.stroke_color,
                    opacity,
                })
                .collect(),
        },
        Shape::Line { start, end } => vec![DrawInstruction::Line {
            start: transform.to_document(*start),
            end: transform.to_document(*end),
            thickness: stroke_width,
            color: style.stroke_color,
            opacity,
        }],
        Shape::Rectangle {
            origin,
            width,
            height,
        } => vec![DrawInstruction::Rect {
            // Bottom-left corner in capture space is the top-left's y plus the height
            origin: transform.to_document(origin.translated(0.0, *height)),
            width: transform.length_to_document(*width),
            height: transform.length_to_document(*height),
            stroke: style.stroke_color,
            stroke_width,
            fill: style.fill_color,
            opacity,
        }],
        Shape::Ellipse {
            origin,
            width,
            height,
        } => vec![DrawInstruction::Ellipse {
            center: transform.to_document(origin.translated(width / 2.0, height / 2.0)),
            radius_x: transform.length_to_document(width / 2.0),
            radius_y: transform.length_to_document(height / 2.0),
            stroke: style.stroke_color,
            stroke_width,
            fill: style.fill_color,
            opacity,
        }],
        Shape::Text {
            origin,
            content,
            font_size,
        } => {
            let font_size = transform.length_to_document(*font_size);
            let top = transform.to_document(*origin);
            vec![DrawInstruction::Text {
                origin: Point::new(top.x, top.y - font_size),
                content: content.clone(),
                font_size,
                color: style.stroke_color,
                opacity,
            }]
        }
        Shape::Image {
            origin,
            width,
            height,
            image,
        } => {
            if image.is_empty() {
                return Err("image payload is empty".to_string());
            }
            vec![DrawInstruction::Image {
                origin: transform.to_document(origin.translated(0.0, *height)),
                width: transform.length_to_document(*width),
                height: transform.length_to_document(*height),
                image: image.clone(),
            }]
        }
    };

    Ok(instructions)
}
