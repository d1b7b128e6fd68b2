//! InkRoom Core Library
//!
//! Platform-agnostic engine for the InkRoom collaborative whiteboard: the
//! element model, scene, camera, hit-testing, tools, undo history and the
//! room sync protocol.

pub mod camera;
pub mod config;
pub mod drawing;
pub mod elements;
pub mod eraser;
pub mod frame;
pub mod geometry;
pub mod history;
pub mod interaction;
pub mod scene;
pub mod selection;
pub mod session;
pub mod store;
pub mod sync;
pub mod transport;

pub use camera::{Camera, Transform};
pub use config::{ConfigError, EngineConfig};
pub use drawing::{DrawingFactory, ShapeTool, TextOverlay};
pub use elements::{Element, ElementError, ElementId, ElementKind, ElementStyle, Rgba, StrokeStyle, TextAlign};
pub use eraser::{EraseBatch, EraserEngine};
pub use frame::{FrameThrottle, RedrawFlag};
pub use history::UndoLedger;
pub use interaction::{
    AppState, Gesture, InputEvent, InteractionStateMachine, Key, Modifiers, Outcome, PointerButton, SceneChange,
    ToolKind,
};
pub use scene::{Scene, SceneDiff, SceneReader, SceneWriter};
pub use selection::{Handle, HandleKind, ManipulationState, SelectionController};
pub use session::Session;
pub use store::{ElementStore, MemoryStore, StoreError};
pub use sync::{Inbound, SyncChannel, SyncError, WireMessage};
pub use transport::{ChannelTransport, ConnectionState, Transport, TransportError};

#[cfg(not(target_arch = "wasm32"))]
pub use transport::WebSocketTransport;
