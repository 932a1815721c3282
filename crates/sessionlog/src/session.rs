//! Session file decoding and the row-indexed document model.
//!
//! Layers, bottom up: chunk framing, tagged fields, typed records, the
//! parsed `SessionLog`, the merged `Document` and its diffs, and the
//! resumable stream plus the diff sources built on top of them.
pub mod chunk;
pub mod document;
pub mod field;
mod log;
pub mod parser;
pub mod record;
pub mod source;
pub mod stream;

pub use document::{Diff, Document, Entry, diff};
pub use log::{SessionBuilder, SessionLog};
pub use source::{DiffSource, RereadSource, TailSource};
pub use stream::{SessionStream, StreamResult, TailReader};
