//! Resize handles and resize math
//!
//! Every annotation gets eight handles on its bounding box: four corners and four
//! edge midpoints. Dragging a handle moves the matching edges; the result is clamped
//! to a minimum size and to the page bounds.

use serde::{Deserialize, Serialize};

use crate::annotation::{Annotation, AnnotationId};
use crate::transform::{Point, Rect};

/// Type of resize handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleType {
    /// Corner handles move two edges
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,

    /// Edge handles move one edge
    Top,
    Bottom,
    Left,
    Right,
}

impl HandleType {
    pub const ALL: [HandleType; 8] = [
        HandleType::TopLeft,
        HandleType::Top,
        HandleType::TopRight,
        HandleType::Right,
        HandleType::BottomRight,
        HandleType::Bottom,
        HandleType::BottomLeft,
        HandleType::Left,
    ];

    pub(crate) fn moves_left(self) -> bool {
        matches!(
            self,
            HandleType::TopLeft | HandleType::BottomLeft | HandleType::Left
        )
    }

    pub(crate) fn moves_right(self) -> bool {
        matches!(
            self,
            HandleType::TopRight | HandleType::BottomRight | HandleType::Right
        )
    }

    pub(crate) fn moves_top(self) -> bool {
        matches!(
            self,
            HandleType::TopLeft | HandleType::TopRight | HandleType::Top
        )
    }

    pub(crate) fn moves_bottom(self) -> bool {
        matches!(
            self,
            HandleType::BottomLeft | HandleType::BottomRight | HandleType::Bottom
        )
    }

    /// Position of this handle on a bounding box
    pub fn position_on(self, bbox: &Rect) -> Point {
        let center = bbox.center();
        let x = if self.moves_left() {
            bbox.left()
        } else if self.moves_right() {
            bbox.right()
        } else {
            center.x
        };
        let y = if self.moves_top() {
            bbox.top()
        } else if self.moves_bottom() {
            bbox.bottom()
        } else {
            center.y
        };
        Point::new(x, y)
    }
}

/// Resize handle with position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManipulationHandle {
    /// Type of handle
    pub handle_type: HandleType,

    /// Position in capture space
    pub position: Point,

    /// Hit radius in capture pixels
    pub size: f64,

    /// Associated annotation ID
    pub annotation_id: AnnotationId,
}

impl ManipulationHandle {
    /// Check if a point hits this handle
    pub fn hit_test(&self, point: &Point) -> bool {
        point.distance_to(&self.position) <= self.size
    }
}

/// Generate the eight resize handles for an annotation
pub fn generate_handles(annotation: &Annotation, handle_size: f64) -> Vec<ManipulationHandle> {
    let bbox = annotation.bbox();
    HandleType::ALL
        .iter()
        .map(|&handle_type| ManipulationHandle {
            handle_type,
            position: handle_type.position_on(&bbox),
            size: handle_size,
            annotation_id: annotation.id(),
        })
        .collect()
}

/// Find the handle of an annotation under a point, if any
pub fn handle_at(annotation: &Annotation, point: &Point, handle_size: f64) -> Option<HandleType> {
    generate_handles(annotation, handle_size)
        .into_iter()
        .find(|handle| handle.hit_test(point))
        .map(|handle| handle.handle_type)
}

/// Limits applied while resizing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeLimits {
    /// Minimum width and height
    pub min_size: f64,
    /// Area the box must stay inside (the page capture bounds)
    pub bounds: Option<Rect>,
}

/// Compute the bounding box produced by dragging `handle` by `(dx, dy)`
///
/// Edges that the handle moves are clamped to the bounds first, then pushed apart
/// to the minimum size. The minimum size wins when both cannot hold.
pub fn apply_resize(original: Rect, handle: HandleType, dx: f64, dy: f64, limits: ResizeLimits) -> Rect {
    let mut left = original.left();
    let mut top = original.top();
    let mut right = original.right();
    let mut bottom = original.bottom();

    if handle.moves_left() {
        left += dx;
    }
    if handle.moves_right() {
        right += dx;
    }
    if handle.moves_top() {
        top += dy;
    }
    if handle.moves_bottom() {
        bottom += dy;
    }

    if let Some(bounds) = limits.bounds {
        if handle.moves_left() {
            left = left.clamp(bounds.left(), bounds.right());
        }
        if handle.moves_right() {
            right = right.clamp(bounds.left(), bounds.right());
        }
        if handle.moves_top() {
            top = top.clamp(bounds.top(), bounds.bottom());
        }
        if handle.moves_bottom() {
            bottom = bottom.clamp(bounds.top(), bounds.bottom());
        }
    }

    let min = limits.min_size.max(0.0);
    if handle.moves_left() {
        left = left.min(right - min);
    } else if handle.moves_right() {
        right = right.max(left + min);
    } else if right - left < min {
        right = left + min;
    }
    if handle.moves_top() {
        top = top.min(bottom - min);
    } else if handle.moves_bottom() {
        bottom = bottom.max(top + min);
    } else if bottom - top < min {
        bottom = top + min;
    }

    Rect::new(left, top, right - left, bottom - top)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Shape, Style};

    fn limits() -> ResizeLimits {
        ResizeLimits {
            min_size: 1.0,
            bounds: Some(Rect::new(0.0, 0.0, 200.0, 200.0)),
        }
    }

    #[test]
    fn test_generate_handles_on_bbox() {
        let annotation = Annotation::new(
            Shape::Rectangle {
                origin: Point::new(10.0, 20.0),
                width: 40.0,
                height: 60.0,
            },
            Style::new(),
        );
        let handles = generate_handles(&annotation, 8.0);
        assert_eq!(handles.len(), 8);

        let find = |t: HandleType| {
            handles
                .iter()
                .find(|h| h.handle_type == t)
                .map(|h| h.position)
                .unwrap()
        };
        assert_eq!(find(HandleType::TopLeft), Point::new(10.0, 20.0));
        assert_eq!(find(HandleType::Right), Point::new(50.0, 50.0));
        assert_eq!(find(HandleType::Bottom), Point::new(30.0, 80.0));
    }

    #[test]
    fn test_handle_hit_radius() {
        let annotation = Annotation::new(
            Shape::Rectangle {
                origin: Point::new(10.0, 10.0),
                width: 100.0,
                height: 100.0,
            },
            Style::new(),
        );
        assert_eq!(
            handle_at(&annotation, &Point::new(112.0, 112.0), 8.0),
            Some(HandleType::BottomRight)
        );
        assert_eq!(handle_at(&annotation, &Point::new(60.0, 60.0), 8.0), None);
    }

    #[test]
    fn test_resize_bottom_right() {
        let r = apply_resize(
            Rect::new(10.0, 10.0, 50.0, 50.0),
            HandleType::BottomRight,
            20.0,
            -10.0,
            limits(),
        );
        assert_eq!(r, Rect::new(10.0, 10.0, 70.0, 40.0));
    }

    #[test]
    fn test_resize_past_opposite_edge_clamps_to_min() {
        let r = apply_resize(
            Rect::new(10.0, 10.0, 50.0, 50.0),
            HandleType::Left,
            500.0,
            0.0,
            limits(),
        );
        assert!((r.width - 1.0).abs() < 1e-9);
        assert_eq!(r.right(), 60.0);
        assert_eq!(r.height, 50.0);
    }

    #[test]
    fn test_resize_clamps_to_page_bounds() {
        let r = apply_resize(
            Rect::new(10.0, 10.0, 50.0, 50.0),
            HandleType::TopRight,
            1000.0,
            -1000.0,
            limits(),
        );
        assert_eq!(r, Rect::new(10.0, 0.0, 190.0, 60.0));
    }

    #[test]
    fn test_edge_handle_leaves_other_axis() {
        let r = apply_resize(
            Rect::new(10.0, 10.0, 50.0, 50.0),
            HandleType::Top,
            35.0,
            5.0,
            limits(),
        );
        assert_eq!(r, Rect::new(10.0, 15.0, 50.0, 45.0));
    }
}
