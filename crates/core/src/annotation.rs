//! Annotation data model
//!
//! Geometry is stored in capture space: pixels of the page raster the annotation was
//! drawn on, origin top-left. The page layer holding an annotation records which
//! capture scale and rotation that geometry belongs to.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::handles::{apply_resize, HandleType, ResizeLimits};
use crate::transform::{rotate_capture_point, Point, Rect, Size};

/// Unique identifier for an annotation
///
/// Generated using UUID v4 for guaranteed uniqueness.
pub type AnnotationId = uuid::Uuid;

/// Horizontal advance of one glyph, as a fraction of the font size
pub const TEXT_ADVANCE: f64 = 0.6;

/// Line height, as a multiple of the font size
pub const TEXT_LINE_HEIGHT: f64 = 1.2;

/// RGBA color representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Create a new color
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Convert to normalized RGBA values (0.0 to 1.0)
    pub fn to_normalized(&self) -> (f64, f64, f64, f64) {
        (
            self.r as f64 / 255.0,
            self.g as f64 / 255.0,
            self.b as f64 / 255.0,
            self.a as f64 / 255.0,
        )
    }
}

/// Common annotation colors
impl Color {
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
}

/// Visual styling for annotation rendering
///
/// Stroke width is in capture pixels, like the geometry it decorates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    /// Stroke color for lines, outlines and text
    pub stroke_color: Color,

    /// Fill color for closed shapes (None for no fill)
    pub fill_color: Option<Color>,

    /// Stroke width in capture pixels
    pub stroke_width: f64,

    /// Opacity (0.0 = transparent, 1.0 = opaque)
    pub opacity: f64,
}

impl Style {
    /// Create default style (red stroke, 2px width, no fill)
    pub fn new() -> Self {
        Self {
            stroke_color: Color::RED,
            fill_color: None,
            stroke_width: 2.0,
            opacity: 1.0,
        }
    }

    /// Wide translucent yellow stroke used by the highlighter tool
    pub fn highlighter() -> Self {
        Self {
            stroke_color: Color::YELLOW,
            fill_color: None,
            stroke_width: 16.0,
            opacity: 0.4,
        }
    }

    pub fn with_stroke_color(mut self, color: Color) -> Self {
        self.stroke_color = color;
        self
    }

    pub fn with_fill_color(mut self, color: Color) -> Self {
        self.fill_color = Some(color);
        self
    }

    pub fn with_stroke_width(mut self, width: f64) -> Self {
        self.stroke_width = width;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Whether this is a translucent marker style
    pub fn is_highlighter(&self) -> bool {
        self.opacity < 1.0
    }
}

impl Default for Style {
    fn default() -> Self {
        Self::new()
    }
}

/// Encoding of an embedded image payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

/// Encoded image bytes shared between the store, history snapshots and export
///
/// The bytes are immutable once created, so clones share one allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampImage {
    bytes: Arc<[u8]>,
    format: ImageFormat,
}

impl StampImage {
    pub fn new(bytes: impl Into<Arc<[u8]>>, format: ImageFormat) -> Self {
        Self {
            bytes: bytes.into(),
            format,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Discriminant of [`Shape`], useful for tool and export bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationKind {
    Freehand,
    Line,
    Rectangle,
    Ellipse,
    Text,
    Image,
}

/// Annotation geometry in capture space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Freehand drawing path (also used by the highlighter)
    Freehand { points: Vec<Point> },

    /// Line segment from start to end point
    Line { start: Point, end: Point },

    /// Rectangle with its top-left corner at `origin`
    Rectangle {
        origin: Point,
        width: f64,
        height: f64,
    },

    /// Ellipse inscribed in the box at `origin`
    Ellipse {
        origin: Point,
        width: f64,
        height: f64,
    },

    /// Text box with its top-left corner at `origin`
    Text {
        origin: Point,
        content: String,
        /// Font size in capture pixels
        font_size: f64,
    },

    /// Placed image (signature or stamp)
    Image {
        origin: Point,
        width: f64,
        height: f64,
        image: StampImage,
    },
}

impl Shape {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Shape::Freehand { .. } => AnnotationKind::Freehand,
            Shape::Line { .. } => AnnotationKind::Line,
            Shape::Rectangle { .. } => AnnotationKind::Rectangle,
            Shape::Ellipse { .. } => AnnotationKind::Ellipse,
            Shape::Text { .. } => AnnotationKind::Text,
            Shape::Image { .. } => AnnotationKind::Image,
        }
    }

    /// Whether hit-testing follows the stroke rather than the enclosed area
    pub fn is_stroke(&self) -> bool {
        matches!(self, Shape::Freehand { .. } | Shape::Line { .. })
    }

    /// Get the bounding box in capture space
    pub fn bbox(&self) -> Rect {
        match self {
            Shape::Freehand { points } => points_bbox(points),
            Shape::Line { start, end } => Rect::from_corners(*start, *end),
            Shape::Rectangle {
                origin,
                width,
                height,
            }
            | Shape::Ellipse {
                origin,
                width,
                height,
            }
            | Shape::Image {
                origin,
                width,
                height,
                ..
            } => Rect::new(origin.x, origin.y, *width, *height),
            Shape::Text {
                origin,
                content,
                font_size,
            } => {
                let size = text_extent(content, *font_size);
                Rect::new(origin.x, origin.y, size.width, size.height)
            }
        }
    }

    /// Anchor used for dragging: the bbox top-left corner
    pub fn origin(&self) -> Point {
        self.bbox().origin()
    }

    /// Check if a point hits this shape
    ///
    /// Strokes are picked within `tolerance` of any segment; closed shapes,
    /// text and images are picked anywhere inside their bounding box.
    pub fn hit_test(&self, point: &Point, tolerance: f64) -> bool {
        match self {
            Shape::Freehand { points } => match points.as_slice() {
                [] => false,
                [only] => point.distance_to(only) <= tolerance,
                _ => points
                    .windows(2)
                    .any(|w| point_near_line_segment(point, &w[0], &w[1], tolerance)),
            },
            Shape::Line { start, end } => point_near_line_segment(point, start, end, tolerance),
            Shape::Rectangle { .. }
            | Shape::Ellipse { .. }
            | Shape::Text { .. }
            | Shape::Image { .. } => self.bbox().contains(point),
        }
    }

    /// Move the shape by a delta
    pub fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            Shape::Freehand { points } => {
                for p in points.iter_mut() {
                    *p = p.translated(dx, dy);
                }
            }
            Shape::Line { start, end } => {
                *start = start.translated(dx, dy);
                *end = end.translated(dx, dy);
            }
            Shape::Rectangle { origin, .. }
            | Shape::Ellipse { origin, .. }
            | Shape::Text { origin, .. }
            | Shape::Image { origin, .. } => *origin = origin.translated(dx, dy),
        }
    }

    /// Return a copy moved by a delta
    pub fn translated(&self, dx: f64, dy: f64) -> Shape {
        let mut shape = self.clone();
        shape.translate(dx, dy);
        shape
    }

    /// Shape produced by dragging `handle` of this shape's bounding box by `(dx, dy)`
    ///
    /// Text scales its font and keeps the edges opposite the handle in place. A
    /// line with no extent on one axis moves the endpoint nearest the handle.
    pub fn resized(&self, handle: HandleType, dx: f64, dy: f64, limits: ResizeLimits) -> Shape {
        let from = self.bbox();
        match self {
            Shape::Line { start, end }
                if from.width <= f64::EPSILON || from.height <= f64::EPSILON =>
            {
                drag_line_end(*start, *end, handle, from, dx, dy, limits)
            }
            Shape::Text {
                content, font_size, ..
            } => resize_text(content, *font_size, handle, from, dx, dy, limits),
            _ => {
                let to = apply_resize(from, handle, dx, dy, limits);
                let mut shape = self.clone();
                shape.fit_to(from, to);
                shape
            }
        }
    }

    /// Map the shape so that its bounding box `from` becomes `to`
    ///
    /// Box shapes take the target box exactly. Strokes are scaled per axis; an axis
    /// with no extent keeps its offset. Text scales its font with the box height.
    pub fn fit_to(&mut self, from: Rect, to: Rect) {
        let map = |p: &Point| -> Point {
            let x = if from.width > f64::EPSILON {
                to.x + (p.x - from.x) * to.width / from.width
            } else {
                to.x + (p.x - from.x)
            };
            let y = if from.height > f64::EPSILON {
                to.y + (p.y - from.y) * to.height / from.height
            } else {
                to.y + (p.y - from.y)
            };
            Point::new(x, y)
        };

        match self {
            Shape::Freehand { points } => {
                for p in points.iter_mut() {
                    *p = map(p);
                }
            }
            Shape::Line { start, end } => {
                *start = map(start);
                *end = map(end);
            }
            Shape::Rectangle {
                origin,
                width,
                height,
            }
            | Shape::Ellipse {
                origin,
                width,
                height,
            }
            | Shape::Image {
                origin,
                width,
                height,
                ..
            } => {
                *origin = to.origin();
                *width = to.width;
                *height = to.height;
            }
            Shape::Text {
                origin, font_size, ..
            } => {
                if from.height > f64::EPSILON {
                    *font_size *= to.height / from.height;
                }
                *origin = to.origin();
            }
        }
    }

    /// Multiply every coordinate and extent by `factor` (capture scale change)
    pub fn scale(&mut self, factor: f64) {
        let scale = |p: &Point| Point::new(p.x * factor, p.y * factor);
        match self {
            Shape::Freehand { points } => {
                for p in points.iter_mut() {
                    *p = scale(p);
                }
            }
            Shape::Line { start, end } => {
                *start = scale(start);
                *end = scale(end);
            }
            Shape::Rectangle {
                origin,
                width,
                height,
            }
            | Shape::Ellipse {
                origin,
                width,
                height,
            }
            | Shape::Image {
                origin,
                width,
                height,
                ..
            } => {
                *origin = scale(origin);
                *width *= factor;
                *height *= factor;
            }
            Shape::Text {
                origin, font_size, ..
            } => {
                *origin = scale(origin);
                *font_size *= factor;
            }
        }
    }

    /// Re-project the shape after the page image turned by clockwise quarter turns
    ///
    /// `size` is the capture-space page size before the turn. Box shapes stay
    /// axis-aligned; text keeps reading left to right.
    pub fn rotate_quarter(&mut self, quarter_turns: u8, size: Size) {
        let turns = quarter_turns % 4;
        if turns == 0 {
            return;
        }
        let rotate = |p: &Point| rotate_capture_point(*p, turns, size);
        match self {
            Shape::Freehand { points } => {
                for p in points.iter_mut() {
                    *p = rotate(p);
                }
            }
            Shape::Line { start, end } => {
                *start = rotate(start);
                *end = rotate(end);
            }
            Shape::Rectangle {
                origin,
                width,
                height,
            }
            | Shape::Ellipse {
                origin,
                width,
                height,
            }
            | Shape::Image {
                origin,
                width,
                height,
                ..
            } => {
                let a = rotate(origin);
                let b = rotate(&origin.translated(*width, *height));
                let rect = Rect::from_corners(a, b);
                *origin = rect.origin();
                *width = rect.width;
                *height = rect.height;
            }
            Shape::Text {
                origin,
                content,
                font_size,
            } => {
                // Keep the text box centered on the same content
                let extent = text_extent(content, *font_size);
                let center = rotate(&origin.translated(extent.width / 2.0, extent.height / 2.0));
                *origin = center.translated(-extent.width / 2.0, -extent.height / 2.0);
            }
        }
    }

    /// Whether every coordinate and extent is a finite number
    pub fn is_finite(&self) -> bool {
        match self {
            Shape::Freehand { points } => points.iter().all(Point::is_finite),
            Shape::Line { start, end } => start.is_finite() && end.is_finite(),
            Shape::Rectangle {
                origin,
                width,
                height,
            }
            | Shape::Ellipse {
                origin,
                width,
                height,
            }
            | Shape::Image {
                origin,
                width,
                height,
                ..
            } => origin.is_finite() && width.is_finite() && height.is_finite(),
            Shape::Text {
                origin, font_size, ..
            } => origin.is_finite() && font_size.is_finite(),
        }
    }
}

/// Approximate extent of a text block set in a proportional font
pub fn text_extent(content: &str, font_size: f64) -> Size {
    let lines = content.lines().count().max(1);
    let widest = content
        .lines()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0)
        .max(1);
    Size::new(
        widest as f64 * font_size * TEXT_ADVANCE,
        lines as f64 * font_size * TEXT_LINE_HEIGHT,
    )
}

fn drag_line_end(
    start: Point,
    end: Point,
    handle: HandleType,
    from: Rect,
    dx: f64,
    dy: f64,
    limits: ResizeLimits,
) -> Shape {
    let grip = handle.position_on(&from);
    let dx = if handle.moves_left() || handle.moves_right() { dx } else { 0.0 };
    let dy = if handle.moves_top() || handle.moves_bottom() { dy } else { 0.0 };

    let (mut a, mut b) = (start, end);
    let moved = if a.distance_to(&grip) <= b.distance_to(&grip) {
        &mut a
    } else {
        &mut b
    };
    let mut target = moved.translated(dx, dy);
    if let Some(bounds) = limits.bounds {
        target = Point::new(
            target.x.clamp(bounds.left(), bounds.right()),
            target.y.clamp(bounds.top(), bounds.bottom()),
        );
    }
    *moved = target;

    if a.distance_to(&b) < limits.min_size.max(0.0) {
        return Shape::Line { start, end };
    }
    Shape::Line { start: a, end: b }
}

fn resize_text(
    content: &str,
    font_size: f64,
    handle: HandleType,
    from: Rect,
    dx: f64,
    dy: f64,
    limits: ResizeLimits,
) -> Shape {
    let to = apply_resize(from, handle, dx, dy, limits);
    let width_ratio = to.width / from.width;
    let height_ratio = to.height / from.height;
    let horizontal = handle.moves_left() || handle.moves_right();
    let vertical = handle.moves_top() || handle.moves_bottom();

    // Corners follow whichever axis was dragged further
    let mut factor = match (horizontal, vertical) {
        (true, false) => width_ratio,
        (false, true) => height_ratio,
        _ if width_ratio.ln().abs() >= height_ratio.ln().abs() => width_ratio,
        _ => height_ratio,
    };
    if let Some(bounds) = limits.bounds {
        let room_x = if handle.moves_left() {
            from.right() - bounds.left()
        } else {
            bounds.right() - from.left()
        };
        let room_y = if handle.moves_top() {
            from.bottom() - bounds.top()
        } else {
            bounds.bottom() - from.top()
        };
        factor = factor.min(room_x / from.width).min(room_y / from.height);
    }
    let min = limits.min_size.max(0.0);
    factor = factor.max(min / from.width).max(min / from.height);

    let origin = from.origin();
    if !factor.is_finite() || factor <= 0.0 {
        return Shape::Text {
            origin,
            content: content.to_owned(),
            font_size,
        };
    }

    let font_size = font_size * factor;
    let extent = text_extent(content, font_size);
    let x = if handle.moves_left() {
        from.right() - extent.width
    } else {
        from.left()
    };
    let y = if handle.moves_top() {
        from.bottom() - extent.height
    } else {
        from.top()
    };
    Shape::Text {
        origin: Point::new(x, y),
        content: content.to_owned(),
        font_size,
    }
}

fn points_bbox(points: &[Point]) -> Rect {
    let Some(first) = points.first() else {
        return Rect::default();
    };
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for point in points.iter().skip(1) {
        min_x = min_x.min(point.x);
        max_x = max_x.max(point.x);
        min_y = min_y.min(point.y);
        max_y = max_y.max(point.y);
    }
    Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

/// Helper function for point-to-line-segment distance check
pub(crate) fn point_near_line_segment(
    point: &Point,
    start: &Point,
    end: &Point,
    tolerance: f64,
) -> bool {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-12 {
        // Degenerate line segment
        return point.distance_to(start) <= tolerance;
    }

    // Project point onto line segment
    let t = ((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq;
    let t = t.clamp(0.0, 1.0);

    let closest = Point::new(start.x + t * dx, start.y + t * dy);
    point.distance_to(&closest) <= tolerance
}

/// A user-placed object anchored to one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Stable unique identifier
    id: AnnotationId,

    /// Page this annotation belongs to (1-based)
    page_number: u32,

    shape: Shape,

    style: Style,
}

impl Annotation {
    /// Create a new annotation with a fresh id
    ///
    /// The page number is assigned when the annotation is added to a store.
    pub fn new(shape: Shape, style: Style) -> Self {
        Self::with_id(uuid::Uuid::new_v4(), shape, style)
    }

    /// Create an annotation with a specific id
    pub fn with_id(id: AnnotationId, shape: Shape, style: Style) -> Self {
        Self {
            id,
            page_number: 0,
            shape,
            style,
        }
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub(crate) fn set_page_number(&mut self, page: u32) {
        self.page_number = page;
    }

    pub fn kind(&self) -> AnnotationKind {
        self.shape.kind()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_mut(&mut self) -> &mut Shape {
        &mut self.shape
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut Style {
        &mut self.style
    }

    pub fn bbox(&self) -> Rect {
        self.shape.bbox()
    }

    /// Hit-test with the stroke pick tolerance
    ///
    /// Strokes are picked within `max(stroke_tolerance, stroke_width)`.
    pub fn hit_test(&self, point: &Point, stroke_tolerance: f64) -> bool {
        let tolerance = if self.shape.is_stroke() {
            stroke_tolerance.max(self.style.stroke_width)
        } else {
            0.0
        };
        self.shape.hit_test(point, tolerance)
    }

    /// Apply a capture scale change to geometry and stroke width
    pub fn rescale(&mut self, factor: f64) {
        self.shape.scale(factor);
        self.style.stroke_width *= factor;
    }
}
