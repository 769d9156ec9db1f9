//! Overlay drawing commands
//!
//! Hosts repaint the annotation layer of a page from a list of capture-space
//! commands. Producing the list has no side effects.

use crate::annotation::{Annotation, Color, Shape, StampImage, Style};
use crate::handles::generate_handles;
use crate::interaction::{InteractionState, InteractionStateMachine};
use crate::store::AnnotationStore;
use crate::transform::{Point, Rect};

/// One overlay drawing step in capture space
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayCommand {
    Polyline {
        points: Vec<Point>,
        color: Color,
        width: f64,
        opacity: f64,
    },
    Rect {
        rect: Rect,
        stroke: Color,
        stroke_width: f64,
        fill: Option<Color>,
        opacity: f64,
    },
    Ellipse {
        rect: Rect,
        stroke: Color,
        stroke_width: f64,
        fill: Option<Color>,
        opacity: f64,
    },
    Text {
        origin: Point,
        content: String,
        font_size: f64,
        color: Color,
        opacity: f64,
    },
    Image {
        rect: Rect,
        image: StampImage,
    },
    /// Dashed outline around the selected annotation
    SelectionOutline { rect: Rect },
    /// Square resize handle centered on a point
    Handle { center: Point, size: f64 },
}

/// Append the commands drawing one shape
pub fn render_shape(shape: &Shape, style: &Style, out: &mut Vec<OverlayCommand>) {
    let command = match shape {
        Shape::Freehand { points } => OverlayCommand::Polyline {
            points: points.clone(),
            color: style.stroke_color,
            width: style.stroke_width,
            opacity: style.opacity,
        },
        Shape::Line { start, end } => OverlayCommand::Polyline {
            points: vec![*start, *end],
            color: style.stroke_color,
            width: style.stroke_width,
            opacity: style.opacity,
        },
        Shape::Rectangle { .. } => OverlayCommand::Rect {
            rect: shape.bbox(),
            stroke: style.stroke_color,
            stroke_width: style.stroke_width,
            fill: style.fill_color,
            opacity: style.opacity,
        },
        Shape::Ellipse { .. } => OverlayCommand::Ellipse {
            rect: shape.bbox(),
            stroke: style.stroke_color,
            stroke_width: style.stroke_width,
            fill: style.fill_color,
            opacity: style.opacity,
        },
        Shape::Text {
            origin,
            content,
            font_size,
        } => OverlayCommand::Text {
            origin: *origin,
            content: content.clone(),
            font_size: *font_size,
            color: style.stroke_color,
            opacity: style.opacity,
        },
        Shape::Image { image, .. } => OverlayCommand::Image {
            rect: shape.bbox(),
            image: image.clone(),
        },
    };
    out.push(command);
}

/// Render a page: annotations in z-order, then the drawing in progress, then the
/// selection decoration
pub fn render_page(
    store: &AnnotationStore,
    machine: &InteractionStateMachine,
    page: u32,
    handle_size: f64,
) -> Vec<OverlayCommand> {
    let mut out = Vec::new();
    for annotation in store.query(page) {
        render_shape(annotation.shape(), annotation.style(), &mut out);
    }

    if let InteractionState::Drawing {
        page: drawing_page,
        partial,
        style,
        ..
    } = machine.state()
    {
        if *drawing_page == page {
            render_shape(partial, style, &mut out);
        }
    }

    let selected = machine
        .selection()
        .id
        .and_then(|id| store.get(id))
        .filter(|a| a.page_number() == page);
    if let Some(annotation) = selected {
        render_selection(annotation, handle_size, &mut out);
    }
    out
}

fn render_selection(annotation: &Annotation, handle_size: f64, out: &mut Vec<OverlayCommand>) {
    out.push(OverlayCommand::SelectionOutline {
        rect: annotation.bbox(),
    });
    out.extend(
        generate_handles(annotation, handle_size)
            .into_iter()
            .map(|handle| OverlayCommand::Handle {
                center: handle.position,
                size: handle.size,
            }),
    );
}
