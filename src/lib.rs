//! PaintPad: raster paint core.
//!
//! The drawing session (pixel buffer, tools, flood fill, undo/redo history) is
//! plain Rust with no rendering surface attached; the optional `gui` feature adds
//! a thin egui adapter and the `cli` module replays gesture scripts headlessly.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod ops;
pub mod session;
pub mod settings;

#[cfg(feature = "gui")]
pub mod app;

pub use canvas::{PixelBuffer, Snapshot};
pub use components::history::HistoryLog;
pub use components::tools::{DrawEngine, LineStyle, PointerOutcome, ToolKind, ToolState};
pub use error::PaintError;
pub use session::Session;
