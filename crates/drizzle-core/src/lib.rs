//! Core library for drizzle
//!
//! Streams Markdown from a byte source to the terminal incrementally:
//! source -> (box stripping) -> accumulator + boundary detector -> renderer -> terminal.

pub mod accumulator;
pub mod boundary;
pub mod boxes;
pub mod cancel;
pub mod config;
pub mod emitter;
pub mod error;
pub mod inject;
pub mod pipeline;
pub mod render;
pub mod source;
pub mod theme;

pub use accumulator::{Accumulator, Chunk, ChunkPolicy};
pub use boundary::{BoundaryDetector, Fence, StructuralState};
pub use boxes::{strip_boxes, BoxStripper};
pub use cancel::StreamCancellation;
pub use config::{ConfigFile, StreamConfig};
pub use emitter::Emitter;
pub use error::{Error, Origin, Result};
pub use pipeline::{run, StreamSummary};
pub use render::{RenderEvent, Renderer};
pub use source::{ByteSource, CommandSource, ReaderSource};
pub use theme::{ElementKind, Preset, ThemeLayer, ThemeMap, ThemeWarning};
