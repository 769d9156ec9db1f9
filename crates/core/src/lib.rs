//! Pagemark Core Library
//!
//! Annotation model, coordinate transforms and editing session for drawing on
//! rasterized document pages and baking the result back into document space.

pub mod annotation;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod handles;
pub mod history;
pub mod import;
pub mod interaction;
pub mod raster;
pub mod render;
pub mod session;
pub mod store;
pub mod transform;

pub use annotation::{
    Annotation, AnnotationId, AnnotationKind, Color, ImageFormat, Shape, StampImage, Style,
};
pub use config::{ConfigError, EngineConfig};
pub use document::{Document, DocumentMetadata, Page, PageInfo, RasterRequest, RasterState};
pub use error::{EngineError, EngineResult};
pub use export::{
    BakedAnnotation, DocumentWriter, DrawInstruction, EmbedFailure, ExportBaker, ExportOptions,
    ExportPlan, ExportReport, PageInstructions, PageTarget, WriteError,
};
pub use handles::{apply_resize, generate_handles, HandleType, ManipulationHandle, ResizeLimits};
pub use history::HistoryManager;
pub use interaction::{
    InteractionOutcome, InteractionState, InteractionStateMachine, PreparedStamp, Selection, Tool,
};
pub use raster::{PageRasterizer, RasterError, RasterImage};
pub use render::OverlayCommand;
pub use session::{EditorSession, RotationScope};
pub use store::{AnnotationStore, PageLayer};
pub use transform::{CaptureTransform, Point, Rect, Rotation, Size};
