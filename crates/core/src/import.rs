//! Re-loading baked instructions as editable annotations
//!
//! The inverse of baking: document-space primitives are mapped back into a page's
//! capture space so they can be selected and edited again.

use crate::annotation::{Annotation, AnnotationKind, Color, Shape, Style};
use crate::export::{BakedAnnotation, DrawInstruction};
use crate::transform::{CaptureTransform, Point};

/// Convert a baked annotation back to annotations in capture space
///
/// A freehand stroke baked to chained segments comes back as one stroke.
/// Anything else yields one annotation per instruction.
pub fn baked_to_annotations(baked: &BakedAnnotation, transform: &CaptureTransform) -> Vec<Annotation> {
    if baked.kind == AnnotationKind::Freehand {
        if let Some(stroke) = stroke_from_segments(&baked.instructions, transform) {
            return vec![stroke];
        }
    }
    baked
        .instructions
        .iter()
        .map(|instruction| instruction_to_annotation(instruction, transform))
        .collect()
}

fn stroke_from_segments(
    instructions: &[DrawInstruction],
    transform: &CaptureTransform,
) -> Option<Annotation> {
    let mut points: Vec<Point> = Vec::with_capacity(instructions.len() + 1);
    let mut style = None;
    for instruction in instructions {
        let DrawInstruction::Line {
            start,
            end,
            thickness,
            color,
            opacity,
        } = instruction
        else {
            return None;
        };
        let start = transform.to_capture(*start);
        let end = transform.to_capture(*end);
        match points.last() {
            None => points.push(start),
            Some(last) if last.distance_to(&start) > 1e-9 => return None,
            Some(_) => {}
        }
        if points.len() == 1 || points.last() != Some(&end) {
            points.push(end);
        }
        style.get_or_insert_with(|| {
            Style::new()
                .with_stroke_color(*color)
                .with_stroke_width(transform.length_to_capture(*thickness))
                .with_opacity(*opacity)
        });
    }
    // A dot bakes to one zero-length segment
    if points.len() == 2 && points[0] == points[1] {
        points.pop();
    }
    Some(Annotation::new(Shape::Freehand { points }, style?))
}

/// Convert one draw instruction to an annotation in capture space
pub fn instruction_to_annotation(
    instruction: &DrawInstruction,
    transform: &CaptureTransform,
) -> Annotation {
    let (shape, style) = match instruction {
        DrawInstruction::Line {
            start,
            end,
            thickness,
            color,
            opacity,
        } => (
            Shape::Line {
                start: transform.to_capture(*start),
                end: transform.to_capture(*end),
            },
            Style::new()
                .with_stroke_color(*color)
                .with_stroke_width(transform.length_to_capture(*thickness))
                .with_opacity(*opacity),
        ),
        DrawInstruction::Rect {
            origin,
            width,
            height,
            stroke,
            stroke_width,
            fill,
            opacity,
        } => (
            Shape::Rectangle {
                // Document origin is the bottom-left corner; capture origin is the top-left
                origin: transform.to_capture(Point::new(origin.x, origin.y + height)),
                width: transform.length_to_capture(*width),
                height: transform.length_to_capture(*height),
            },
            styled(*stroke, *stroke_width, *fill, *opacity, transform),
        ),
        DrawInstruction::Ellipse {
            center,
            radius_x,
            radius_y,
            stroke,
            stroke_width,
            fill,
            opacity,
        } => (
            Shape::Ellipse {
                origin: transform.to_capture(Point::new(center.x - radius_x, center.y + radius_y)),
                width: transform.length_to_capture(radius_x * 2.0),
                height: transform.length_to_capture(radius_y * 2.0),
            },
            styled(*stroke, *stroke_width, *fill, *opacity, transform),
        ),
        DrawInstruction::Text {
            origin,
            content,
            font_size,
            color,
            opacity,
        } => (
            Shape::Text {
                origin: transform.to_capture(Point::new(origin.x, origin.y + font_size)),
                content: content.clone(),
                font_size: transform.length_to_capture(*font_size),
            },
            Style::new().with_stroke_color(*color).with_opacity(*opacity),
        ),
        DrawInstruction::Image {
            origin,
            width,
            height,
            image,
        } => (
            Shape::Image {
                origin: transform.to_capture(Point::new(origin.x, origin.y + height)),
                width: transform.length_to_capture(*width),
                height: transform.length_to_capture(*height),
                image: image.clone(),
            },
            Style::new(),
        ),
    };
    Annotation::new(shape, style)
}

fn styled(
    stroke: Color,
    stroke_width: f64,
    fill: Option<Color>,
    opacity: f64,
    transform: &CaptureTransform,
) -> Style {
    Style {
        stroke_color: stroke,
        fill_color: fill,
        stroke_width: transform.length_to_capture(stroke_width),
        opacity: opacity.clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::bake_annotation;

    fn bake(annotation: &Annotation, transform: &CaptureTransform) -> BakedAnnotation {
        BakedAnnotation {
            id: annotation.id(),
            kind: annotation.kind(),
            instructions: bake_annotation(annotation, transform).unwrap(),
        }
    }

    fn assert_points_close(actual: &[Point], expected: &[Point]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a.x - e.x).abs() < 1e-6 && (a.y - e.y).abs() < 1e-6, "{actual:?}");
        }
    }

    #[test]
    fn test_freehand_comes_back_as_one_stroke() {
        let transform = CaptureTransform::new(2.0, 842.0).unwrap();
        let points = vec![
            Point::new(10.0, 10.0),
            Point::new(20.0, 30.0),
            Point::new(40.0, 35.0),
            Point::new(60.0, 20.0),
        ];
        let original = Annotation::new(
            Shape::Freehand {
                points: points.clone(),
            },
            Style::highlighter(),
        );

        let imported = baked_to_annotations(&bake(&original, &transform), &transform);
        assert_eq!(imported.len(), 1);
        let Shape::Freehand { points: restored } = imported[0].shape() else {
            panic!("expected a stroke, got {:?}", imported[0].shape());
        };
        assert_points_close(restored, &points);
        assert!((imported[0].style().opacity - 0.4).abs() < 1e-9);
        assert!((imported[0].style().stroke_width - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_dot_comes_back_as_single_point() {
        let transform = CaptureTransform::new(1.0, 792.0).unwrap();
        let dot = Annotation::new(
            Shape::Freehand {
                points: vec![Point::new(5.0, 5.0)],
            },
            Style::new(),
        );
        let imported = baked_to_annotations(&bake(&dot, &transform), &transform);
        let Shape::Freehand { points } = imported[0].shape() else {
            panic!("expected a stroke");
        };
        assert_points_close(points, &[Point::new(5.0, 5.0)]);
    }

    #[test]
    fn test_non_stroke_kinds_map_per_instruction() {
        let transform = CaptureTransform::new(1.0, 792.0).unwrap();
        let line = Annotation::new(
            Shape::Line {
                start: Point::new(0.0, 0.0),
                end: Point::new(30.0, 40.0),
            },
            Style::new(),
        );
        let imported = baked_to_annotations(&bake(&line, &transform), &transform);
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].kind(), AnnotationKind::Line);
    }

    #[test]
    fn test_rect_survives_bake_and_import() {
        let transform = CaptureTransform::new(1.5, 792.0).unwrap();
        let original = Annotation::new(
            Shape::Rectangle {
                origin: Point::new(30.0, 45.0),
                width: 120.0,
                height: 90.0,
            },
            Style::new()
                .with_fill_color(Color::BLUE)
                .with_stroke_width(3.0),
        );
        let baked = bake_annotation(&original, &transform).unwrap();
        let imported = instruction_to_annotation(&baked[0], &transform);

        let (a, b) = (original.bbox(), imported.bbox());
        assert!((a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6);
        assert!((a.width - b.width).abs() < 1e-6 && (a.height - b.height).abs() < 1e-6);
        assert_eq!(imported.style().fill_color, Some(Color::BLUE));
        assert!((imported.style().stroke_width - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_text_baseline_restored() {
        let transform = CaptureTransform::new(2.0, 842.0).unwrap();
        let original = Annotation::new(
            Shape::Text {
                origin: Point::new(20.0, 20.0),
                content: "Note".into(),
                font_size: 24.0,
            },
            Style::new(),
        );
        let baked = bake_annotation(&original, &transform).unwrap();
        let imported = instruction_to_annotation(&baked[0], &transform);
        assert_eq!(imported.shape(), original.shape());
    }
}
