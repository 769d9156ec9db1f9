use pagemark_core::transform::{
    capture_to_document, capture_to_normalized, document_to_capture, normalized_to_capture,
    rotate_capture_point,
};
use pagemark_core::{
    apply_resize, DocumentMetadata, EditorSession, EngineConfig, HandleType, PageInfo, Point,
    Rect, ResizeLimits, Shape, Size, Style, Tool,
};
use proptest::prelude::*;

fn handle() -> impl Strategy<Value = HandleType> {
    prop::sample::select(HandleType::ALL.to_vec())
}

/// Edits a user can make on page 1
#[derive(Debug, Clone)]
enum Edit {
    Add { x: f64, y: f64, side: f64 },
    Drag { pick: usize, dx: f64, dy: f64 },
    Resize { pick: usize, handle: HandleType, dx: f64, dy: f64 },
    Erase { pick: usize },
    Restyle { pick: usize, width: f64 },
    Delete { pick: usize },
    ClearPage,
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        3 => (0.0f64..500.0, 0.0f64..680.0, 2.0f64..100.0)
            .prop_map(|(x, y, side)| Edit::Add { x, y, side }),
        2 => (any::<usize>(), -80.0f64..80.0, -80.0f64..80.0)
            .prop_map(|(pick, dx, dy)| Edit::Drag { pick, dx, dy }),
        2 => (any::<usize>(), handle(), -60.0f64..60.0, -60.0f64..60.0)
            .prop_map(|(pick, handle, dx, dy)| Edit::Resize { pick, handle, dx, dy }),
        1 => any::<usize>().prop_map(|pick| Edit::Erase { pick }),
        1 => (any::<usize>(), 0.5f64..12.0).prop_map(|(pick, width)| Edit::Restyle { pick, width }),
        1 => any::<usize>().prop_map(|pick| Edit::Delete { pick }),
        1 => Just(Edit::ClearPage),
    ]
}

fn ready_session() -> EditorSession {
    let metadata = DocumentMetadata::uniform(1, PageInfo::new(612.0, 792.0));
    let mut session = EditorSession::new(&metadata, EngineConfig::default());
    let request = session.request_raster(1, 1.0).expect("page 1 exists");
    session.complete_raster(&request, 612, 792).expect("completion");
    session.set_hot_page(1).expect("page 1 exists");
    session
}

fn gesture(session: &mut EditorSession, from: Point, to: Point) {
    session.pointer_down(1, from);
    session.pointer_move(1, to);
    session.pointer_up(1, to);
}

fn apply(session: &mut EditorSession, edit: &Edit) {
    if let Edit::Add { x, y, side } = edit {
        let shape = Shape::Rectangle { origin: Point::new(*x, *y), width: *side, height: *side };
        session.add_annotation(1, shape, Style::default()).expect("page 1 exists");
        return;
    }
    if let Edit::ClearPage = edit {
        session.clear_page(1).expect("page 1 exists");
        return;
    }

    let annotations = session.annotations(1);
    if annotations.is_empty() {
        return;
    }
    let pick = match edit {
        Edit::Drag { pick, .. }
        | Edit::Resize { pick, .. }
        | Edit::Erase { pick }
        | Edit::Restyle { pick, .. }
        | Edit::Delete { pick } => *pick,
        Edit::Add { .. } | Edit::ClearPage => 0,
    };
    let target = &annotations[pick % annotations.len()];
    let (id, bbox) = (target.id(), target.bbox());
    let center = bbox.center();

    match edit {
        Edit::Drag { dx, dy, .. } => {
            session.set_tool(Tool::Select);
            gesture(session, center, center.translated(*dx, *dy));
        }
        Edit::Resize { handle, dx, dy, .. } => {
            session.set_tool(Tool::Select);
            session.pointer_down(1, center);
            session.pointer_up(1, center);
            let grip = handle.position_on(&bbox);
            gesture(session, grip, grip.translated(*dx, *dy));
        }
        Edit::Erase { .. } => {
            session.set_tool(Tool::Eraser);
            session.pointer_down(1, center);
            session.pointer_up(1, center);
        }
        Edit::Restyle { width, .. } => {
            let style = Style::default().with_stroke_width(*width);
            session.set_style(id, style).expect("annotation exists");
        }
        Edit::Delete { .. } => {
            session.delete(id).expect("annotation exists");
        }
        Edit::Add { .. } | Edit::ClearPage => {}
    }
}

proptest! {
    /// Property: capture -> document -> capture is the identity
    #[test]
    fn capture_document_round_trip(
        x in 0.0f64..5000.0,
        y in 0.0f64..5000.0,
        scale in 0.1f64..8.0,
        height in 50.0f64..3000.0,
    ) {
        let p = Point::new(x, y);
        let back = document_to_capture(capture_to_document(p, scale, height), scale, height);
        prop_assert!((back.x - x).abs() < 1e-6);
        prop_assert!((back.y - y).abs() < 1e-6);
    }

    /// Property: normalized coordinates map back to the same capture point
    #[test]
    fn normalized_round_trip(
        x in 0.0f64..2000.0,
        y in 0.0f64..2000.0,
        width in 10.0f64..3000.0,
        height in 10.0f64..3000.0,
    ) {
        let size = Size::new(width, height);
        let p = Point::new(x, y);
        let back = normalized_to_capture(capture_to_normalized(p, size), size);
        prop_assert!((back.x - x).abs() < 1e-6);
        prop_assert!((back.y - y).abs() < 1e-6);
    }

    /// Property: four quarter turns bring a point home
    #[test]
    fn four_quarter_turns_are_identity(
        x in 0.0f64..600.0,
        y in 0.0f64..800.0,
    ) {
        let mut size = Size::new(600.0, 800.0);
        let mut p = Point::new(x, y);
        for _ in 0..4 {
            p = rotate_capture_point(p, 1, size);
            size = size.transposed();
        }
        prop_assert!((p.x - x).abs() < 1e-9);
        prop_assert!((p.y - y).abs() < 1e-9);
    }

    /// Property: resizing never produces a box below the minimum size
    #[test]
    fn resize_never_goes_negative(
        x in 0.0f64..500.0,
        y in 0.0f64..500.0,
        width in 1.0f64..400.0,
        height in 1.0f64..400.0,
        dx in -2000.0f64..2000.0,
        dy in -2000.0f64..2000.0,
        handle in handle(),
        bounded in any::<bool>(),
    ) {
        let limits = ResizeLimits {
            min_size: 1.0,
            bounds: bounded.then(|| Rect::new(0.0, 0.0, 1000.0, 1000.0)),
        };
        let resized = apply_resize(Rect::new(x, y, width, height), handle, dx, dy, limits);
        prop_assert!(resized.width >= 1.0 - 1e-9);
        prop_assert!(resized.height >= 1.0 - 1e-9);
    }

    /// Property: undo k times then redo k times restores the store
    #[test]
    fn undo_redo_is_idempotent(
        boxes in prop::collection::vec((0.0f64..500.0, 0.0f64..700.0, 2.0f64..100.0), 1..8),
        k in 1usize..8,
    ) {
        let metadata = DocumentMetadata::uniform(1, PageInfo::new(612.0, 792.0));
        let mut session = EditorSession::new(&metadata, EngineConfig::default());
        for (x, y, side) in &boxes {
            let shape = Shape::Rectangle { origin: Point::new(*x, *y), width: *side, height: *side };
            session.add_annotation(1, shape, Style::default()).expect("page 1 exists");
        }

        let before = session.store().clone();
        let k = k.min(boxes.len());
        for _ in 0..k {
            session.undo().expect("enough history");
        }
        prop_assert_eq!(session.annotations(1).len(), boxes.len() - k);
        for _ in 0..k {
            session.redo().expect("enough redo");
        }
        prop_assert_eq!(session.store(), &before);
    }

    /// Property: undo/redo round trips hold for any mix of edits
    #[test]
    fn undo_redo_round_trips_mixed_edits(
        edits in prop::collection::vec(edit(), 1..24),
        k in 1usize..24,
    ) {
        let mut session = ready_session();
        for edit in &edits {
            apply(&mut session, edit);
        }

        let before = session.store().clone();
        let mut undone = 0;
        while undone < k && session.can_undo() {
            session.undo().expect("undo available");
            undone += 1;
        }
        for _ in 0..undone {
            session.redo().expect("redo available");
        }
        prop_assert_eq!(session.store(), &before);
        prop_assert!(!session.can_redo());
    }
}
