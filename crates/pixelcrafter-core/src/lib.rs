//! PixelCrafter Core Library
//!
//! Layer model, canvas synchronization, persistence client and real-time
//! collaboration for the PixelCrafter editor. Nothing in here draws pixels:
//! the canvas surface is a scene model that a front end renders.

pub mod auth;
pub mod camera;
pub mod canvas;
pub mod chat;
pub mod collaboration;
pub mod color;
pub mod config;
pub mod editor;
pub mod history;
pub mod image;
pub mod layer;
pub mod project;
pub mod storage;
pub mod sync;
pub mod synchronizer;
pub mod tools;

pub use auth::AuthSession;
pub use camera::Zoom;
pub use canvas::{CanvasObject, CanvasSurface, ObjectId, ObjectKind, SurfaceEvent};
pub use chat::{ChatEntry, ChatSender, ChatSession};
pub use collaboration::{CollabMessage, CollaborationManager, LayerOp, RemoteChange};
pub use config::ClientConfig;
pub use editor::Editor;
pub use history::{History, LayerCommand, MAX_UNDO_HISTORY};
pub use image::{ImageError, ImageLoader, SourceLoader};
pub use layer::{Layer, LayerContent, LayerId, LayerKind, LayerPatch, LayerStore, ShapeKind};
pub use project::{NewProject, Project, User};
pub use storage::{ApiError, ApiResult, HttpApi, MemoryApi, ProjectApi, SaveQueue, SaveReason};
pub use sync::{ChannelEvent, CollabChannel, ConnectionState, LocalChannel, NativeConnector};
pub use synchronizer::{LoadReport, Synchronizer};
pub use tools::{ToolController, ToolKind};
