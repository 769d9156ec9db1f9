//! Coordinate transforms between pointer, capture, normalized and document space
//!
//! Three spaces are involved when annotating a page:
//! - Pointer space: on-screen pixels, differs from capture space by the live zoom `Z`
//! - Capture space: pixels of the rasterized page image at capture scale `S_c`,
//!   origin top-left, y increasing downward
//! - Document space: native page units (points), origin bottom-left, y increasing upward
//!
//! The rasterizer already renders rotated pages, so nothing here applies a rotation
//! when converting to document space. Callers pass the page height for the page's
//! current (rotated) orientation.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// A 2D point, used in every coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Component-wise difference `self - other`
    pub fn offset_from(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    /// Translate by a delta
    pub fn translated(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Width and height pair
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Multiply both dimensions by a factor
    pub fn scaled(&self, factor: f64) -> Size {
        Size::new(self.width * factor, self.height * factor)
    }

    /// Swap width and height (used for quarter-turn rotations)
    pub fn transposed(&self) -> Size {
        Size::new(self.height, self.width)
    }
}

/// Axis-aligned rectangle in capture space (origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering the area between two arbitrary corners
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    /// Rectangle at the origin with the given size
    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Check whether a point lies inside, with edges inclusive
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }

    /// Grow the rectangle by `amount` on every side
    pub fn inflated(&self, amount: f64) -> Rect {
        Rect::new(
            self.x - amount,
            self.y - amount,
            self.width + amount * 2.0,
            self.height + amount * 2.0,
        )
    }

    /// Clamp a point into the rectangle
    pub fn clamp_point(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(self.left(), self.right()),
            point.y.clamp(self.top(), self.bottom()),
        )
    }
}

/// Page rotation, always a multiple of 90 degrees clockwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Rotation for an angle in degrees, taken modulo 360
    ///
    /// Returns None unless the angle is a whole number of quarter turns.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        (degrees % 90 == 0).then(|| Self::from_quarter_turns(i64::from(degrees / 90)))
    }

    /// Rotation from a number of clockwise quarter turns (any sign)
    pub fn from_quarter_turns(turns: i64) -> Self {
        match turns.rem_euclid(4) {
            0 => Rotation::Deg0,
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    pub fn degrees(self) -> i32 {
        self.quarter_turns() as i32 * 90
    }

    pub fn quarter_turns(self) -> u8 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 1,
            Rotation::Deg180 => 2,
            Rotation::Deg270 => 3,
        }
    }

    /// Compose two clockwise rotations
    pub fn rotated_by(self, delta: Rotation) -> Self {
        Self::from_quarter_turns(i64::from(self.quarter_turns() + delta.quarter_turns()))
    }

    /// Clockwise quarter turns needed to go from `self` to `target`
    pub fn turns_to(self, target: Rotation) -> u8 {
        (target.quarter_turns() + 4 - self.quarter_turns()) % 4
    }

    /// Whether width and height are swapped relative to the unrotated page
    pub fn is_sideways(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    /// Apply this rotation to an unrotated page size
    pub fn apply_to_size(self, size: Size) -> Size {
        if self.is_sideways() {
            size.transposed()
        } else {
            size
        }
    }
}

/// Convert an on-screen pointer position to capture space
pub fn pointer_to_capture(point: Point, zoom: f64) -> Point {
    Point::new(point.x / zoom, point.y / zoom)
}

/// Convert a capture-space point back to on-screen pointer space
pub fn capture_to_pointer(point: Point, zoom: f64) -> Point {
    Point::new(point.x * zoom, point.y * zoom)
}

/// Convert a capture-space point to document space
///
/// The y-flip accounts for capture space having a top-left origin while
/// document space has a bottom-left origin.
pub fn capture_to_document(point: Point, capture_scale: f64, page_height: f64) -> Point {
    Point::new(
        point.x / capture_scale,
        page_height - point.y / capture_scale,
    )
}

/// Exact inverse of [`capture_to_document`]
pub fn document_to_capture(point: Point, capture_scale: f64, page_height: f64) -> Point {
    Point::new(
        point.x * capture_scale,
        (page_height - point.y) * capture_scale,
    )
}

/// Convert a capture-space point to page-relative units in `[0, 1]`
pub fn capture_to_normalized(point: Point, capture_size: Size) -> Point {
    Point::new(point.x / capture_size.width, point.y / capture_size.height)
}

/// Inverse of [`capture_to_normalized`]
pub fn normalized_to_capture(point: Point, capture_size: Size) -> Point {
    Point::new(point.x * capture_size.width, point.y * capture_size.height)
}

/// Convert a capture-space length (stroke width, font size, extent) to document units
pub fn scale_length(length: f64, capture_scale: f64) -> f64 {
    length / capture_scale
}

/// Rotate a capture-space point by clockwise quarter turns
///
/// `size` is the capture-space size of the page *before* rotation. The result is
/// expressed in the rotated image, whose size is `size` transposed for odd turns.
pub fn rotate_capture_point(point: Point, quarter_turns: u8, size: Size) -> Point {
    match quarter_turns % 4 {
        0 => point,
        1 => Point::new(size.height - point.y, point.x),
        2 => Point::new(size.width - point.x, size.height - point.y),
        _ => Point::new(point.y, size.width - point.x),
    }
}

/// Per-page constants for converting between capture and document space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureTransform {
    capture_scale: f64,
    page_height: f64,
}

impl CaptureTransform {
    /// Create a transform for a page
    ///
    /// `page_height` is the document-space height of the page in its current
    /// orientation.
    pub fn new(capture_scale: f64, page_height: f64) -> EngineResult<Self> {
        if !capture_scale.is_finite() || capture_scale <= 0.0 {
            return Err(EngineError::InvalidScale(capture_scale));
        }
        Ok(Self {
            capture_scale,
            page_height,
        })
    }

    pub fn capture_scale(&self) -> f64 {
        self.capture_scale
    }

    pub fn page_height(&self) -> f64 {
        self.page_height
    }

    pub fn to_document(&self, point: Point) -> Point {
        capture_to_document(point, self.capture_scale, self.page_height)
    }

    pub fn to_capture(&self, point: Point) -> Point {
        document_to_capture(point, self.capture_scale, self.page_height)
    }

    pub fn length_to_document(&self, length: f64) -> f64 {
        scale_length(length, self.capture_scale)
    }

    pub fn length_to_capture(&self, length: f64) -> f64 {
        length * self.capture_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_to_document_flips_y() {
        let p = capture_to_document(Point::new(10.0, 10.0), 2.0, 842.0);
        assert!((p.x - 5.0).abs() < 1e-9);
        assert!((p.y - 837.0).abs() < 1e-9);

        let p = capture_to_document(Point::new(50.0, 50.0), 2.0, 842.0);
        assert!((p.x - 25.0).abs() < 1e-9);
        assert!((p.y - 817.0).abs() < 1e-9);
    }

    #[test]
    fn test_document_round_trip() {
        let original = Point::new(123.456, 789.012);
        let doc = capture_to_document(original, 1.5, 792.0);
        let back = document_to_capture(doc, 1.5, 792.0);
        assert!((back.x - original.x).abs() < 1e-6);
        assert!((back.y - original.y).abs() < 1e-6);
    }

    #[test]
    fn test_pointer_zoom_round_trip() {
        let pointer = Point::new(300.0, 150.0);
        let capture = pointer_to_capture(pointer, 1.25);
        assert!((capture.x - 240.0).abs() < 1e-9);
        assert_eq!(capture_to_pointer(capture, 1.25), pointer);
    }

    #[test]
    fn test_normalized_units() {
        let size = Size::new(200.0, 400.0);
        let n = capture_to_normalized(Point::new(50.0, 100.0), size);
        assert_eq!(n, Point::new(0.25, 0.25));
        assert_eq!(normalized_to_capture(n, size), Point::new(50.0, 100.0));
    }

    #[test]
    fn test_rotation_is_additive_modulo_360() {
        let mut rotation = Rotation::Deg0;
        for _ in 0..4 {
            rotation = rotation.rotated_by(Rotation::Deg90);
        }
        assert_eq!(rotation, Rotation::Deg0);
        assert_eq!(Rotation::Deg90.rotated_by(Rotation::Deg180), Rotation::Deg270);
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(-180), Some(Rotation::Deg180));
    }

    #[test]
    fn test_partial_turns_are_not_rotations() {
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::from_degrees(-30), None);
        assert_eq!(Rotation::from_degrees(91), None);
    }

    #[test]
    fn test_rotation_turns_to() {
        assert_eq!(Rotation::Deg0.turns_to(Rotation::Deg90), 1);
        assert_eq!(Rotation::Deg270.turns_to(Rotation::Deg0), 1);
        assert_eq!(Rotation::Deg90.turns_to(Rotation::Deg0), 3);
    }

    #[test]
    fn test_rotate_capture_point_quarter_turn() {
        // 100 wide, 50 tall; top-left corner moves to top-right after a clockwise turn
        let size = Size::new(100.0, 50.0);
        assert_eq!(
            rotate_capture_point(Point::new(0.0, 0.0), 1, size),
            Point::new(50.0, 0.0)
        );
        assert_eq!(
            rotate_capture_point(Point::new(100.0, 50.0), 1, size),
            Point::new(0.0, 100.0)
        );

        let p = Point::new(12.0, 34.0);
        let mut q = p;
        let mut current = size;
        for _ in 0..4 {
            q = rotate_capture_point(q, 1, current);
            current = current.transposed();
        }
        assert!((q.x - p.x).abs() < 1e-9 && (q.y - p.y).abs() < 1e-9);
    }

    #[test]
    fn test_capture_transform_rejects_bad_scale() {
        assert!(matches!(
            CaptureTransform::new(0.0, 100.0),
            Err(EngineError::InvalidScale(_))
        ));
        assert!(CaptureTransform::new(f64::NAN, 100.0).is_err());
        let t = CaptureTransform::new(2.0, 842.0).unwrap();
        assert_eq!(t.length_to_document(4.0), 2.0);
    }

    #[test]
    fn test_rect_from_corners_normalizes() {
        let r = Rect::from_corners(Point::new(50.0, 10.0), Point::new(10.0, 40.0));
        assert_eq!(r, Rect::new(10.0, 10.0, 40.0, 30.0));
        assert!(r.contains(&Point::new(10.0, 40.0)));
        assert!(!r.contains(&Point::new(9.9, 20.0)));
    }
}
