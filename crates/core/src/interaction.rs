//! Pointer interaction state machine
//!
//! Turns pointer-down/move/up sequences into store mutations according to the active
//! tool. All points handed to the machine are already in capture space. Every event
//! returns an [`InteractionOutcome`]; outcomes that change annotations permanently
//! report `is_commit() == true` so the caller can record history.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotation::{Annotation, AnnotationId, Shape, StampImage, Style};
use crate::config::EngineConfig;
use crate::handles::{handle_at, HandleType, ResizeLimits};
use crate::store::AnnotationStore;
use crate::transform::{Point, Rect};

/// Active editing tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tool {
    #[default]
    Select,
    Pen,
    Highlighter,
    Line,
    Rectangle,
    Ellipse,
    Eraser,
    Text,
    Stamp,
}

/// Image ready to be placed with the stamp tool
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStamp {
    pub image: StampImage,
    /// Width in document units
    pub width: f64,
    /// Height in document units
    pub height: f64,
}

/// Gesture currently in progress
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Drawing {
        page: u32,
        anchor: Point,
        partial: Shape,
        style: Style,
    },
    Dragging {
        page: u32,
        id: AnnotationId,
        grab_offset: Point,
        original: Shape,
    },
    Resizing {
        page: u32,
        id: AnnotationId,
        handle: HandleType,
        start: Point,
        original: Shape,
    },
    PlacingText {
        content: String,
    },
    PlacingStamp {
        stamp: Option<PreparedStamp>,
    },
}

/// Result of feeding one pointer event to the machine
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionOutcome {
    /// Event had no effect
    Ignored,
    /// A drawing gesture began
    DrawingStarted,
    /// The in-progress drawing changed
    DrawingUpdated,
    /// A drawing ended too small to keep
    Discarded,
    Created(AnnotationId),
    Selected(AnnotationId),
    SelectionCleared,
    HandleGrabbed {
        id: AnnotationId,
        handle: HandleType,
    },
    /// Live geometry change during a drag or resize
    Updated(AnnotationId),
    Moved(AnnotationId),
    Resized(AnnotationId),
    Removed(Vec<AnnotationId>),
    Cancelled,
    Warning(String),
}

impl InteractionOutcome {
    /// Whether the outcome is a finished change that belongs in history
    pub fn is_commit(&self) -> bool {
        matches!(
            self,
            InteractionOutcome::Created(_)
                | InteractionOutcome::Moved(_)
                | InteractionOutcome::Resized(_)
                | InteractionOutcome::Removed(_)
        )
    }
}

/// Capture-space frame of the page receiving input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFrame {
    pub page: u32,
    pub bounds: Rect,
    pub capture_scale: f64,
}

/// Everything a pointer event may touch
pub struct InteractionContext<'a> {
    pub store: &'a mut AnnotationStore,
    pub frame: PageFrame,
    pub config: &'a EngineConfig,
}

/// Current selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub id: Option<AnnotationId>,
    /// Handle being dragged, while resizing
    pub handle: Option<HandleType>,
}

/// Tool-driven pointer state machine
#[derive(Debug, Clone, Default)]
pub struct InteractionStateMachine {
    tool: Tool,
    state: InteractionState,
    selection: Selection,
}

impl InteractionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            InteractionState::Drawing { .. }
                | InteractionState::Dragging { .. }
                | InteractionState::Resizing { .. }
        )
    }

    /// Page of the gesture in progress, if any
    pub fn active_page(&self) -> Option<u32> {
        match &self.state {
            InteractionState::Drawing { page, .. }
            | InteractionState::Dragging { page, .. }
            | InteractionState::Resizing { page, .. } => Some(*page),
            _ => None,
        }
    }

    /// Switch tools; any gesture in progress must be cancelled first
    pub fn set_tool(&mut self, tool: Tool) {
        debug!(?tool, "tool selected");
        self.tool = tool;
        self.state = match tool {
            Tool::Text => InteractionState::PlacingText {
                content: String::new(),
            },
            Tool::Stamp => InteractionState::PlacingStamp { stamp: None },
            _ => InteractionState::Idle,
        };
        if tool != Tool::Select {
            self.selection = Selection::default();
        }
    }

    /// Switch to the text tool with the content to place
    pub fn prepare_text(&mut self, content: impl Into<String>) {
        self.set_tool(Tool::Text);
        self.state = InteractionState::PlacingText {
            content: content.into(),
        };
    }

    /// Switch to the stamp tool with an image to place
    pub fn prepare_stamp(&mut self, stamp: PreparedStamp) {
        self.set_tool(Tool::Stamp);
        self.state = InteractionState::PlacingStamp { stamp: Some(stamp) };
    }

    pub fn select(&mut self, id: Option<AnnotationId>) {
        self.selection = Selection { id, handle: None };
    }

    /// Drop the selection if its annotation no longer exists
    pub fn retain_selection(&mut self, store: &AnnotationStore) {
        if let Some(id) = self.selection.id {
            if store.get(id).is_none() {
                self.selection = Selection::default();
            }
        }
    }

    pub fn pointer_down(&mut self, ctx: &mut InteractionContext<'_>, point: Point) -> InteractionOutcome {
        if !ctx.frame.bounds.contains(&point) {
            return InteractionOutcome::Ignored;
        }

        match std::mem::take(&mut self.state) {
            InteractionState::Idle => self.idle_down(ctx, point),
            InteractionState::PlacingText { content } => self.place_text(ctx, point, content),
            InteractionState::PlacingStamp { stamp } => self.place_stamp(ctx, point, stamp),
            gesture => {
                // A gesture is already running (missed pointer-up); keep it
                self.state = gesture;
                InteractionOutcome::Ignored
            }
        }
    }

    fn idle_down(&mut self, ctx: &mut InteractionContext<'_>, point: Point) -> InteractionOutcome {
        let page = ctx.frame.page;
        match self.tool {
            Tool::Select => self.select_down(ctx, point),
            Tool::Pen | Tool::Highlighter | Tool::Line | Tool::Rectangle | Tool::Ellipse => {
                let style = if self.tool == Tool::Highlighter {
                    Style::highlighter()
                } else {
                    ctx.config.default_style.clone()
                };
                let partial = match self.tool {
                    Tool::Line => Shape::Line {
                        start: point,
                        end: point,
                    },
                    Tool::Rectangle => Shape::Rectangle {
                        origin: point,
                        width: 0.0,
                        height: 0.0,
                    },
                    Tool::Ellipse => Shape::Ellipse {
                        origin: point,
                        width: 0.0,
                        height: 0.0,
                    },
                    _ => Shape::Freehand {
                        points: vec![point],
                    },
                };
                self.state = InteractionState::Drawing {
                    page,
                    anchor: point,
                    partial,
                    style,
                };
                InteractionOutcome::DrawingStarted
            }
            Tool::Eraser => {
                let hits = ctx.store.hit_test_all(page, &point);
                if hits.is_empty() {
                    return InteractionOutcome::Ignored;
                }
                for id in &hits {
                    ctx.store.remove(*id);
                }
                self.retain_selection(ctx.store);
                InteractionOutcome::Removed(hits)
            }
            Tool::Text | Tool::Stamp => {
                InteractionOutcome::Warning("nothing prepared to place".to_string())
            }
        }
    }

    fn select_down(&mut self, ctx: &mut InteractionContext<'_>, point: Point) -> InteractionOutcome {
        let page = ctx.frame.page;

        // Handles of the current selection take priority over everything else
        if let Some(selected) = self
            .selection
            .id
            .and_then(|id| ctx.store.get(id))
            .filter(|a| a.page_number() == page)
        {
            if let Some(handle) = handle_at(selected, &point, ctx.config.handle_size) {
                let id = selected.id();
                self.state = InteractionState::Resizing {
                    page,
                    id,
                    handle,
                    start: point,
                    original: selected.shape().clone(),
                };
                self.selection.handle = Some(handle);
                debug!(%id, ?handle, "resize started");
                return InteractionOutcome::HandleGrabbed { id, handle };
            }
        }

        match ctx.store.hit_test(page, &point) {
            Some(hit) => {
                let id = hit.id();
                self.state = InteractionState::Dragging {
                    page,
                    id,
                    grab_offset: point.offset_from(&hit.shape().origin()),
                    original: hit.shape().clone(),
                };
                self.select(Some(id));
                InteractionOutcome::Selected(id)
            }
            None => {
                // Click empty space: deselect
                self.select(None);
                InteractionOutcome::SelectionCleared
            }
        }
    }

    fn place_text(&mut self, ctx: &mut InteractionContext<'_>, point: Point, content: String) -> InteractionOutcome {
        if content.trim().is_empty() {
            self.state = InteractionState::PlacingText { content };
            return InteractionOutcome::Warning("no text to place".to_string());
        }
        let mut shape = Shape::Text {
            origin: point,
            content,
            font_size: ctx.config.text_font_size * ctx.frame.capture_scale,
        };
        keep_inside(&mut shape, &ctx.frame.bounds);
        let style = ctx.config.default_style.clone();
        self.finish_placement(ctx, shape, style)
    }

    fn place_stamp(
        &mut self,
        ctx: &mut InteractionContext<'_>,
        point: Point,
        stamp: Option<PreparedStamp>,
    ) -> InteractionOutcome {
        let Some(stamp) = stamp.filter(|s| !s.image.is_empty()) else {
            self.state = InteractionState::PlacingStamp { stamp: None };
            return InteractionOutcome::Warning("no stamp prepared".to_string());
        };
        let scale = ctx.frame.capture_scale;
        let mut shape = Shape::Image {
            origin: point,
            width: stamp.width * scale,
            height: stamp.height * scale,
            image: stamp.image,
        };
        keep_inside(&mut shape, &ctx.frame.bounds);
        self.finish_placement(ctx, shape, Style::new())
    }

    fn finish_placement(&mut self, ctx: &mut InteractionContext<'_>, shape: Shape, style: Style) -> InteractionOutcome {
        match ctx.store.add(ctx.frame.page, Annotation::new(shape, style)) {
            Ok(id) => {
                self.tool = Tool::Select;
                self.state = InteractionState::Idle;
                self.select(Some(id));
                InteractionOutcome::Created(id)
            }
            Err(err) => InteractionOutcome::Warning(err.to_string()),
        }
    }

    pub fn pointer_move(&mut self, ctx: &mut InteractionContext<'_>, point: Point) -> InteractionOutcome {
        let bounds = ctx.frame.bounds;
        match &mut self.state {
            InteractionState::Drawing {
                page,
                anchor,
                partial,
                ..
            } if *page == ctx.frame.page => {
                grow_partial(partial, *anchor, bounds.clamp_point(point));
                InteractionOutcome::DrawingUpdated
            }
            InteractionState::Dragging {
                page,
                id,
                grab_offset,
                original,
            } if *page == ctx.frame.page => {
                let id = *id;
                let target = point.offset_from(grab_offset);
                let from = original.origin();
                let (dx, dy) = clamp_delta(
                    original.bbox(),
                    target.x - from.x,
                    target.y - from.y,
                    &bounds,
                );
                let moved = original.translated(dx, dy);
                self.apply_live(ctx, id, moved)
            }
            InteractionState::Resizing {
                page,
                id,
                handle,
                start,
                original,
            } if *page == ctx.frame.page => {
                let id = *id;
                let limits = ResizeLimits {
                    min_size: ctx.config.min_size,
                    bounds: Some(bounds),
                };
                let resized = original.resized(*handle, point.x - start.x, point.y - start.y, limits);
                self.apply_live(ctx, id, resized)
            }
            _ => InteractionOutcome::Ignored,
        }
    }

    fn apply_live(&mut self, ctx: &mut InteractionContext<'_>, id: AnnotationId, shape: Shape) -> InteractionOutcome {
        match ctx.store.update(id, |a| *a.shape_mut() = shape) {
            Ok(()) => InteractionOutcome::Updated(id),
            Err(_) => {
                // Target vanished mid-gesture
                self.state = InteractionState::Idle;
                self.selection = Selection::default();
                InteractionOutcome::Ignored
            }
        }
    }

    pub fn pointer_up(&mut self, ctx: &mut InteractionContext<'_>, point: Point) -> InteractionOutcome {
        if matches!(
            self.state,
            InteractionState::Drawing { .. }
                | InteractionState::Dragging { .. }
                | InteractionState::Resizing { .. }
        ) {
            // Release position counts as a final move
            let _ = self.pointer_move(ctx, point);
        }

        match std::mem::take(&mut self.state) {
            InteractionState::Drawing {
                page,
                partial,
                style,
                ..
            } => {
                if !is_committable(&partial, ctx.config.min_size) {
                    debug!(page, kind = ?partial.kind(), "degenerate drawing discarded");
                    return InteractionOutcome::Discarded;
                }
                match ctx.store.add(page, Annotation::new(partial, style)) {
                    Ok(id) => InteractionOutcome::Created(id),
                    Err(err) => InteractionOutcome::Warning(err.to_string()),
                }
            }
            InteractionState::Dragging { id, original, .. } => {
                match ctx.store.get(id) {
                    Some(current) if *current.shape() != original => InteractionOutcome::Moved(id),
                    _ => InteractionOutcome::Ignored,
                }
            }
            InteractionState::Resizing { id, original, .. } => {
                self.selection.handle = None;
                match ctx.store.get(id) {
                    Some(current) if *current.shape() != original => InteractionOutcome::Resized(id),
                    _ => InteractionOutcome::Ignored,
                }
            }
            other => {
                self.state = other;
                InteractionOutcome::Ignored
            }
        }
    }

    /// Abort the gesture in progress, restoring pre-gesture geometry
    pub fn cancel(&mut self, store: &mut AnnotationStore) -> InteractionOutcome {
        match std::mem::take(&mut self.state) {
            InteractionState::Dragging { id, original, .. }
            | InteractionState::Resizing { id, original, .. } => {
                // The target may already be gone; nothing to restore then
                let _ = store.update(id, |a| *a.shape_mut() = original);
                self.selection.handle = None;
                InteractionOutcome::Cancelled
            }
            InteractionState::Drawing { .. } => InteractionOutcome::Cancelled,
            InteractionState::PlacingText { .. } | InteractionState::PlacingStamp { .. } => {
                self.tool = Tool::Select;
                InteractionOutcome::Cancelled
            }
            InteractionState::Idle => InteractionOutcome::Ignored,
        }
    }
}

fn grow_partial(partial: &mut Shape, anchor: Point, point: Point) {
    match partial {
        Shape::Freehand { points } => {
            if points.last() != Some(&point) {
                points.push(point);
            }
        }
        Shape::Line { end, .. } => *end = point,
        Shape::Rectangle {
            origin,
            width,
            height,
        }
        | Shape::Ellipse {
            origin,
            width,
            height,
        } => {
            let rect = Rect::from_corners(anchor, point);
            *origin = rect.origin();
            *width = rect.width;
            *height = rect.height;
        }
        Shape::Text { .. } | Shape::Image { .. } => {}
    }
}

fn is_committable(shape: &Shape, min_size: f64) -> bool {
    match shape {
        Shape::Freehand { points } => !points.is_empty(),
        Shape::Line { start, end } => start.distance_to(end) > 0.0,
        Shape::Rectangle { width, height, .. } | Shape::Ellipse { width, height, .. } => {
            *width >= min_size && *height >= min_size && *width > 0.0 && *height > 0.0
        }
        Shape::Text { content, .. } => !content.trim().is_empty(),
        Shape::Image { image, .. } => !image.is_empty(),
    }
}

/// Limit a translation so the box stays inside the bounds
///
/// An axis on which the box is larger than the bounds is left unclamped.
fn clamp_delta(bbox: Rect, dx: f64, dy: f64, bounds: &Rect) -> (f64, f64) {
    let dx = if bbox.width <= bounds.width {
        dx.clamp(bounds.left() - bbox.left(), bounds.right() - bbox.right())
    } else {
        dx
    };
    let dy = if bbox.height <= bounds.height {
        dy.clamp(bounds.top() - bbox.top(), bounds.bottom() - bbox.bottom())
    } else {
        dy
    };
    (dx, dy)
}

fn keep_inside(shape: &mut Shape, bounds: &Rect) {
    let (dx, dy) = clamp_delta(shape.bbox(), 0.0, 0.0, bounds);
    shape.translate(dx, dy);
}
