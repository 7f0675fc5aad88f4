//! hanji-editor-core: composition-safe input handling without framework dependencies.
//!
//! This crate provides:
//! - `TextSurface` trait, the narrow capability set an editor widget adapter exposes
//! - `CompositionTracker` - IME composition state per surface instance
//! - `EnterPolicy` - decides when Enter is handled by the surface or inserted manually
//! - `CursorScheduler` - cancellable, delayed caret repositioning
//! - `ImagePipeline` - pick, encode and embed local images as data URLs
//! - `InputCoordinator<S>` - wires the above to one mounted surface
//! - `RichDocument` - ropey-backed reference surface with formatting and embeds

pub mod composition;
pub mod config;
pub mod coordinator;
pub mod document;
pub mod embed;
pub mod enter;
pub mod error;
pub mod formatting;
pub mod image;
pub mod platform;
pub mod scheduler;
pub mod surface;
pub mod text;
pub mod types;

pub use composition::CompositionTracker;
pub use config::{
    DEFAULT_MAX_IMAGES, DEFAULT_REPOSITION_DELAY, EnterWorkaround, GuardConfig,
    MAX_REPOSITION_DELAY,
};
pub use coordinator::InputCoordinator;
pub use document::{DeltaInsert, DeltaOp, DocumentStats, RichDocument};
pub use embed::{Embed, normalize_video_url, sanitize_link};
pub use enter::{EnterAction, EnterPolicy};
pub use error::{ConfigError, EmbedError, ImageError, SurfaceError};
pub use formatting::{Align, FormatCommand, Formatting};
pub use image::{
    FilePicker, ImageBatch, ImageInsertion, ImagePipeline, ImageSource, LogNotifier, MemoryImage,
    Notifier, PickRequest, encode_data_url,
};
pub use platform::Platform;
pub use scheduler::{CursorScheduler, DeferredTasks, Spawner, TaskToken};
#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
pub use scheduler::TokioLocalSpawner;
pub use smol_str::SmolStr;
pub use surface::{SharedSurface, TextSurface};
pub use text::{EditorRope, TextBuffer};
pub use types::{Key, KeyEvent, Selection};
