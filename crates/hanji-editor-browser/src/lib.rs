//! Browser DOM layer for hanji.
//!
//! Wires an `InputCoordinator` to a real editor element. It assumes a
//! `wasm32-unknown-unknown` target environment.
//!
//! # Architecture
//!
//! - `surface`: `TextSurface` adapter over `<textarea>`
//! - `events`: composition, keydown and beforeinput listeners, install-once guard
//! - `files`: `<input type=file>` picker and `File` reads
//! - `platform`: navigator-based platform detection
//! - `runtime`: spawner, alert notifier, logging setup
//!
//! # Re-exports
//!
//! This crate re-exports `hanji-editor-core`, so consumers only need to
//! depend on `hanji-editor-browser`.

pub use hanji_editor_core;
pub use hanji_editor_core::*;

pub mod error;
pub mod events;
pub mod files;
pub mod platform;
pub mod runtime;
pub mod surface;

pub use error::AttachError;
pub use events::{ATTACHED_ATTR, AttachedGuard, attach, key_event_from_dom};
pub use files::{BrowserFile, BrowserFilePicker};
pub use platform::platform;
pub use runtime::{AlertNotifier, WasmSpawner, init_logging};
pub use surface::TextAreaSurface;
