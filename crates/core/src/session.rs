//! Editing session
//!
//! [`EditorSession`] owns everything one open document needs: the page model, the
//! annotation store, undo history, the interaction state machine and configuration.
//! Hosts drive it with pointer events, raster completions and commands, and read
//! back overlay commands and export results.

use tracing::debug;

use crate::annotation::{Annotation, AnnotationId, Shape, StampImage, Style};
use crate::config::EngineConfig;
use crate::document::{quarter_turn, Document, DocumentMetadata, RasterRequest};
use crate::error::{EngineError, EngineResult};
use crate::export::{
    BakedAnnotation, DocumentWriter, DrawInstruction, ExportBaker, ExportPlan, ExportReport,
};
use crate::history::HistoryManager;
use crate::import::{baked_to_annotations, instruction_to_annotation};
use crate::interaction::{
    InteractionContext, InteractionOutcome, InteractionState, InteractionStateMachine, PageFrame,
    PreparedStamp, Selection, Tool,
};
use crate::raster::{PageRasterizer, RasterImage};
use crate::render::{render_page, OverlayCommand};
use crate::store::AnnotationStore;
use crate::transform::{pointer_to_capture, CaptureTransform, Point, Rotation};

/// Pages affected by a rotation command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationScope {
    /// The page currently receiving input
    CurrentPage,
    AllPages,
}

#[derive(Debug, Clone, Copy)]
enum PointerPhase {
    Down,
    Move,
    Up,
}

/// One open document with its annotations and editing state
#[derive(Debug)]
pub struct EditorSession {
    document: Document,
    store: AnnotationStore,
    history: HistoryManager<AnnotationStore>,
    machine: InteractionStateMachine,
    config: EngineConfig,
    baker: ExportBaker,
    zoom: f64,
    hot_page: Option<u32>,
}

impl EditorSession {
    /// Open a session; the first page receives input once rasterized
    pub fn new(metadata: &DocumentMetadata, config: EngineConfig) -> Self {
        let document = Document::from_metadata(metadata);
        let store = AnnotationStore::with_frames(
            document
                .pages()
                .map(|page| (page.capture_scale(), page.rotation())),
        )
        .with_stroke_hit_tolerance(config.stroke_hit_tolerance);

        let mut history = HistoryManager::new().with_limit(config.history_limit);
        history.reset(&store);

        let hot_page = (document.page_count() > 0).then_some(1);
        debug!(pages = document.page_count(), "session opened");

        Self {
            document,
            store,
            history,
            machine: InteractionStateMachine::new(),
            config,
            baker: ExportBaker::default(),
            zoom: 1.0,
            hot_page,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn annotations(&self, page: u32) -> &[Annotation] {
        self.store.query(page)
    }

    pub fn tool(&self) -> Tool {
        self.machine.tool()
    }

    pub fn interaction_state(&self) -> &InteractionState {
        self.machine.state()
    }

    pub fn selection(&self) -> Selection {
        self.machine.selection()
    }

    pub fn hot_page(&self) -> Option<u32> {
        self.hot_page
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn record(&mut self) {
        self.history.record(&self.store);
    }

    /// Abort a drag, resize or drawing in progress
    fn abort_gesture(&mut self) {
        if self.machine.is_busy() {
            self.machine.cancel(&mut self.store);
        }
    }

    fn abort_gesture_on(&mut self, page: u32) {
        if self.machine.active_page() == Some(page) {
            self.machine.cancel(&mut self.store);
        }
    }

    // Viewport

    /// Set the live view zoom; purely visual, geometry is unaffected
    pub fn set_zoom(&mut self, zoom: f64) -> EngineResult<()> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(EngineError::InvalidScale(zoom));
        }
        self.zoom = zoom;
        Ok(())
    }

    /// Choose which page receives pointer events
    pub fn set_hot_page(&mut self, page: u32) -> EngineResult<()> {
        self.document.check_page(page)?;
        if self.hot_page != Some(page) {
            self.abort_gesture();
            self.hot_page = Some(page);
        }
        Ok(())
    }

    // Rasterization

    /// Record a new capture scale for a page and mark its raster pending
    ///
    /// The page's annotations are re-expressed at the new scale right away.
    pub fn request_raster(&mut self, page: u32, scale: f64) -> EngineResult<RasterRequest> {
        self.document.check_page(page)?;
        self.abort_gesture_on(page);
        let request = self.document.request_raster(page, scale)?;
        self.store.rescale_page(page, scale)?;
        debug!(page, scale, "raster requested");
        Ok(request)
    }

    /// Mark a requested raster as available; returns false for a superseded request
    pub fn complete_raster(
        &mut self,
        request: &RasterRequest,
        width_px: u32,
        height_px: u32,
    ) -> EngineResult<bool> {
        let current = self.document.complete_raster(request, width_px, height_px)?;
        if !current {
            debug!(page = request.page, "stale raster completion ignored");
        }
        Ok(current)
    }

    /// Rasterize a page synchronously through a rasterizer
    pub fn rasterize_with(
        &mut self,
        rasterizer: &mut dyn PageRasterizer,
        page: u32,
        scale: f64,
    ) -> EngineResult<RasterImage> {
        let request = self.request_raster(page, scale)?;
        let image = rasterizer.rasterize(page, scale, request.rotation)?;
        self.complete_raster(&request, image.width, image.height)?;
        Ok(image)
    }

    // Tools and pointer input

    pub fn set_tool(&mut self, tool: Tool) {
        self.abort_gesture();
        self.machine.set_tool(tool);
    }

    /// Arm the text tool with content to place at the next click
    pub fn prepare_text(&mut self, content: impl Into<String>) {
        self.abort_gesture();
        self.machine.prepare_text(content);
    }

    /// Arm the stamp tool with an image of the given document-space size
    pub fn prepare_stamp(&mut self, image: StampImage, width: f64, height: f64) {
        self.abort_gesture();
        self.machine.prepare_stamp(PreparedStamp {
            image,
            width,
            height,
        });
    }

    pub fn pointer_down(&mut self, page: u32, pointer: Point) -> InteractionOutcome {
        self.dispatch(PointerPhase::Down, page, pointer)
    }

    pub fn pointer_move(&mut self, page: u32, pointer: Point) -> InteractionOutcome {
        self.dispatch(PointerPhase::Move, page, pointer)
    }

    pub fn pointer_up(&mut self, page: u32, pointer: Point) -> InteractionOutcome {
        self.dispatch(PointerPhase::Up, page, pointer)
    }

    /// Abort the current gesture, restoring pre-gesture geometry
    pub fn pointer_cancel(&mut self) -> InteractionOutcome {
        self.machine.cancel(&mut self.store)
    }

    fn frame(&self, page: u32) -> EngineResult<PageFrame> {
        let entry = self.document.page(page)?;
        if !entry.is_ready() {
            return Err(EngineError::RasterNotReady(page));
        }
        Ok(PageFrame {
            page,
            bounds: entry.capture_bounds(),
            capture_scale: entry.capture_scale(),
        })
    }

    fn dispatch(&mut self, phase: PointerPhase, page: u32, pointer: Point) -> InteractionOutcome {
        if self.hot_page != Some(page) {
            return InteractionOutcome::Ignored;
        }
        let frame = match self.frame(page) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(page, ?phase, error = %err, "pointer event dropped");
                return InteractionOutcome::Ignored;
            }
        };

        let point = pointer_to_capture(pointer, self.zoom);
        let mut ctx = InteractionContext {
            store: &mut self.store,
            frame,
            config: &self.config,
        };
        let outcome = match phase {
            PointerPhase::Down => self.machine.pointer_down(&mut ctx, point),
            PointerPhase::Move => self.machine.pointer_move(&mut ctx, point),
            PointerPhase::Up => self.machine.pointer_up(&mut ctx, point),
        };

        if outcome.is_commit() {
            debug!(page, ?outcome, "change committed");
            self.record();
        }
        outcome
    }

    // Commands

    /// Add an annotation programmatically
    pub fn add_annotation(&mut self, page: u32, shape: Shape, style: Style) -> EngineResult<AnnotationId> {
        let id = self.store.add(page, Annotation::new(shape, style))?;
        self.record();
        Ok(id)
    }

    /// Delete an annotation by id
    pub fn delete(&mut self, id: AnnotationId) -> EngineResult<Annotation> {
        self.abort_gesture();
        let removed = self.store.remove(id).ok_or(EngineError::NotFound(id))?;
        self.machine.retain_selection(&self.store);
        self.record();
        Ok(removed)
    }

    /// Delete the selected annotation, if any
    pub fn delete_selected(&mut self) -> EngineResult<Option<AnnotationId>> {
        match self.machine.selection().id {
            Some(id) => self.delete(id).map(|a| Some(a.id())),
            None => Ok(None),
        }
    }

    /// Replace an annotation's style
    pub fn set_style(&mut self, id: AnnotationId, style: Style) -> EngineResult<()> {
        self.store.update(id, |a| *a.style_mut() = style)?;
        self.record();
        Ok(())
    }

    /// Replace the style of the selected annotation; returns false without a selection
    pub fn set_selected_style(&mut self, style: Style) -> EngineResult<bool> {
        match self.machine.selection().id {
            Some(id) => self.set_style(id, style).map(|()| true),
            None => Ok(false),
        }
    }

    pub fn bring_to_front(&mut self, id: AnnotationId) -> EngineResult<()> {
        self.store.bring_to_front(id)?;
        self.record();
        Ok(())
    }

    pub fn send_to_back(&mut self, id: AnnotationId) -> EngineResult<()> {
        self.store.send_to_back(id)?;
        self.record();
        Ok(())
    }

    /// Remove every annotation on a page; returns how many were removed
    pub fn clear_page(&mut self, page: u32) -> EngineResult<usize> {
        self.abort_gesture_on(page);
        let removed = self.store.clear_page(page)?;
        if !removed.is_empty() {
            self.machine.retain_selection(&self.store);
            self.record();
        }
        Ok(removed.len())
    }

    // History

    pub fn undo(&mut self) -> EngineResult<()> {
        self.abort_gesture();
        let snapshot = self.history.undo()?.clone();
        self.restore(snapshot)
    }

    pub fn redo(&mut self) -> EngineResult<()> {
        self.abort_gesture();
        let snapshot = self.history.redo()?.clone();
        self.restore(snapshot)
    }

    /// Install a snapshot and bring every layer to the live capture frame
    fn restore(&mut self, snapshot: AnnotationStore) -> EngineResult<()> {
        self.store = snapshot;
        for page in self.document.pages() {
            let number = page.number();
            self.store.rescale_page(number, page.capture_scale())?;
            self.store.rotate_page(number, page.rotation(), page.size())?;
        }
        self.machine.retain_selection(&self.store);
        Ok(())
    }

    // Rotation

    /// Turn a page by `degrees`; annotations stay on the same content
    pub fn rotate_page(&mut self, page: u32, degrees: i32) -> EngineResult<Rotation> {
        quarter_turn(degrees)?;
        self.document.check_page(page)?;
        self.abort_gesture_on(page);
        let rotation = self.document.rotate_page(page, degrees)?;
        let size = self.document.page(page)?.size();
        self.store.rotate_page(page, rotation, size)?;
        debug!(page, degrees = rotation.degrees(), "page rotated");
        Ok(rotation)
    }

    /// Turn the current page or every page; returns the pages turned
    pub fn rotate_pages(&mut self, degrees: i32, scope: RotationScope) -> EngineResult<Vec<u32>> {
        quarter_turn(degrees)?;
        let pages: Vec<u32> = match scope {
            RotationScope::CurrentPage => {
                let page = self.hot_page.ok_or(EngineError::InvalidPage {
                    page: 0,
                    page_count: self.document.page_count(),
                })?;
                vec![page]
            }
            RotationScope::AllPages => (1..=self.document.page_count()).collect(),
        };
        for page in &pages {
            self.rotate_page(*page, degrees)?;
        }
        Ok(pages)
    }

    // Output

    /// Overlay commands for a page in capture space
    pub fn render(&self, page: u32) -> Vec<OverlayCommand> {
        render_page(&self.store, &self.machine, page, self.config.handle_size)
    }

    /// Bake all annotations to document-space instructions
    pub fn bake(&self) -> ExportPlan {
        self.baker.bake(&self.document, &self.store)
    }

    /// Bake and hand the result to a writer
    ///
    /// A gesture in progress is cancelled first so the exported geometry is settled.
    pub fn export(&mut self, writer: &mut dyn DocumentWriter) -> ExportReport {
        self.abort_gesture();
        self.baker.export(&self.document, &self.store, writer)
    }

    /// Re-load baked instructions onto a page as editable annotations
    pub fn import_instructions(
        &mut self,
        page: u32,
        instructions: &[DrawInstruction],
    ) -> EngineResult<Vec<AnnotationId>> {
        let transform = self.import_transform(page)?;
        let annotations = instructions
            .iter()
            .map(|instruction| instruction_to_annotation(instruction, &transform))
            .collect();
        self.add_imported(page, annotations)
    }

    /// Re-load baked annotations, keeping each freehand stroke whole
    pub fn import_baked(
        &mut self,
        page: u32,
        baked: &[BakedAnnotation],
    ) -> EngineResult<Vec<AnnotationId>> {
        let transform = self.import_transform(page)?;
        let annotations = baked
            .iter()
            .flat_map(|item| baked_to_annotations(item, &transform))
            .collect();
        self.add_imported(page, annotations)
    }

    fn import_transform(&self, page: u32) -> EngineResult<CaptureTransform> {
        let entry = self.document.page(page)?;
        CaptureTransform::new(entry.capture_scale(), entry.rotated_size().height)
    }

    /// Add imported annotations as one history entry
    fn add_imported(
        &mut self,
        page: u32,
        annotations: Vec<Annotation>,
    ) -> EngineResult<Vec<AnnotationId>> {
        let mut ids = Vec::with_capacity(annotations.len());
        for annotation in annotations {
            ids.push(self.store.add(page, annotation)?);
        }
        if !ids.is_empty() {
            self.record();
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PageInfo;
    use crate::transform::Rect;

    fn session() -> EditorSession {
        let metadata = DocumentMetadata::uniform(2, PageInfo::new(612.0, 792.0));
        let mut session = EditorSession::new(&metadata, EngineConfig::default());
        let request = session.request_raster(1, 1.0).unwrap();
        session.complete_raster(&request, 612, 792).unwrap();
        session
    }

    fn rect() -> Shape {
        Shape::Rectangle {
            origin: Point::new(10.0, 10.0),
            width: 50.0,
            height: 50.0,
        }
    }

    #[test]
    fn test_events_dropped_until_raster_ready() {
        let metadata = DocumentMetadata::uniform(1, PageInfo::new(612.0, 792.0));
        let mut session = EditorSession::new(&metadata, EngineConfig::default());
        session.set_tool(Tool::Pen);
        assert_eq!(
            session.pointer_down(1, Point::new(10.0, 10.0)),
            InteractionOutcome::Ignored
        );
        let request = session.request_raster(1, 1.0).unwrap();
        session.complete_raster(&request, 612, 792).unwrap();
        assert_eq!(
            session.pointer_down(1, Point::new(10.0, 10.0)),
            InteractionOutcome::DrawingStarted
        );
    }

    #[test]
    fn test_only_hot_page_receives_input() {
        let mut session = session();
        session.set_tool(Tool::Pen);
        assert_eq!(
            session.pointer_down(2, Point::new(10.0, 10.0)),
            InteractionOutcome::Ignored
        );
    }

    #[test]
    fn test_zoom_maps_pointer_to_capture() {
        let mut session = session();
        session.set_zoom(2.0).unwrap();
        session.set_tool(Tool::Rectangle);
        session.pointer_down(1, Point::new(20.0, 20.0));
        session.pointer_up(1, Point::new(120.0, 220.0));
        assert_eq!(
            session.annotations(1)[0].bbox(),
            Rect::new(10.0, 10.0, 50.0, 100.0)
        );
        assert!(session.set_zoom(0.0).is_err());
    }

    #[test]
    fn test_undo_redo_commands() {
        let mut session = session();
        assert!(matches!(session.undo(), Err(EngineError::NothingToUndo)));
        let id = session.add_annotation(1, rect(), Style::new()).unwrap();
        session.set_style(id, Style::highlighter()).unwrap();
        session.undo().unwrap();
        assert_eq!(session.store().get(id).unwrap().style(), &Style::new());
        session.undo().unwrap();
        assert!(session.store().is_empty());
        session.redo().unwrap();
        session.redo().unwrap();
        assert!(session.store().get(id).unwrap().style().is_highlighter());
        assert!(matches!(session.redo(), Err(EngineError::NothingToRedo)));
    }

    #[test]
    fn test_delete_selected() {
        let mut session = session();
        let id = session.add_annotation(1, rect(), Style::new()).unwrap();
        assert_eq!(session.delete_selected().unwrap(), None);
        session.set_tool(Tool::Select);
        session.pointer_down(1, Point::new(30.0, 30.0));
        session.pointer_up(1, Point::new(30.0, 30.0));
        assert_eq!(session.delete_selected().unwrap(), Some(id));
        assert!(session.store().is_empty());
        assert_eq!(session.selection().id, None);
        assert!(matches!(session.delete(id), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn test_undo_clears_vanished_selection() {
        let mut session = session();
        session.set_tool(Tool::Rectangle);
        session.pointer_down(1, Point::new(10.0, 10.0));
        session.pointer_up(1, Point::new(60.0, 60.0));
        session.set_tool(Tool::Select);
        session.pointer_down(1, Point::new(30.0, 30.0));
        session.pointer_up(1, Point::new(30.0, 30.0));
        assert!(session.selection().id.is_some());
        session.undo().unwrap();
        assert_eq!(session.selection().id, None);
    }

    #[test]
    fn test_rescale_on_new_raster() {
        let mut session = session();
        let id = session.add_annotation(1, rect(), Style::new()).unwrap();
        let request = session.request_raster(1, 2.0).unwrap();
        session.complete_raster(&request, 1224, 1584).unwrap();
        assert_eq!(
            session.store().get(id).unwrap().bbox(),
            Rect::new(20.0, 20.0, 100.0, 100.0)
        );
        // Undo brings back geometry in the live capture frame
        session.add_annotation(1, rect(), Style::new()).unwrap();
        session.undo().unwrap();
        assert_eq!(
            session.store().get(id).unwrap().bbox(),
            Rect::new(20.0, 20.0, 100.0, 100.0)
        );
        assert_eq!(session.store().layer(1).unwrap().capture_scale(), 2.0);
    }

    #[test]
    fn test_rotate_pages_scope() {
        let mut session = session();
        let turned = session.rotate_pages(90, RotationScope::AllPages).unwrap();
        assert_eq!(turned, vec![1, 2]);
        assert_eq!(session.document().page(2).unwrap().rotation(), Rotation::Deg90);
        assert!(!session.document().page(1).unwrap().is_ready());

        session.set_hot_page(2).unwrap();
        session.rotate_pages(-90, RotationScope::CurrentPage).unwrap();
        assert_eq!(session.document().page(2).unwrap().rotation(), Rotation::Deg0);
        assert_eq!(session.document().page(1).unwrap().rotation(), Rotation::Deg90);
        assert!(session.set_hot_page(3).is_err());
    }

    #[test]
    fn test_clear_page_records_history() {
        let mut session = session();
        session.add_annotation(1, rect(), Style::new()).unwrap();
        session.add_annotation(1, rect(), Style::new()).unwrap();
        assert_eq!(session.clear_page(1).unwrap(), 2);
        assert_eq!(session.clear_page(1).unwrap(), 0);
        session.undo().unwrap();
        assert_eq!(session.annotations(1).len(), 2);
    }

    #[test]
    fn test_import_round_trip() {
        let mut session = session();
        session.add_annotation(1, rect(), Style::new()).unwrap();
        let plan = session.bake();
        let instructions: Vec<_> = plan.instructions().map(|(_, i)| i.clone()).collect();
        session.clear_page(1).unwrap();
        let ids = session.import_instructions(1, &instructions).unwrap();
        assert_eq!(ids.len(), 1);
        let bbox = session.annotations(1)[0].bbox();
        assert!((bbox.x - 10.0).abs() < 1e-9 && (bbox.y - 10.0).abs() < 1e-9);
        assert!(session.import_instructions(5, &instructions).is_err());
    }

    #[test]
    fn test_import_baked_keeps_stroke_whole() {
        let mut session = session();
        let stroke = Shape::Freehand {
            points: vec![
                Point::new(10.0, 10.0),
                Point::new(30.0, 20.0),
                Point::new(50.0, 15.0),
            ],
        };
        session.add_annotation(1, stroke, Style::new()).unwrap();
        let plan = session.bake();
        session.clear_page(1).unwrap();

        let ids = session.import_baked(1, &plan.pages[0].annotations).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(
            session.annotations(1)[0].kind(),
            crate::annotation::AnnotationKind::Freehand
        );

        // One undo takes back the whole import
        session.undo().unwrap();
        assert!(session.annotations(1).is_empty());
    }
}
