//! Whole-file session parsing.
//!
//! Entry points:
//! - `parse_session(bytes)`: decode every chunk of a buffer into a
//!   `SessionLog`.
//! - `read_session(path)`: the same for a file on disk, through
//!   `ChunkReader`.
//!
//! Both are strict: a truncated trailing chunk is a `FormatError`. Use
//! `SessionStream` when the file may still be growing.
use std::path::Path;

use crate::binutil::FormatError;
use crate::error::Result;
use crate::session::chunk::{ChunkReader, parse_chunk};
use crate::session::log::SessionLog;
use crate::session::record::decode_record;

/// Parse a complete session buffer.
pub fn parse_session(bytes: &[u8]) -> std::result::Result<SessionLog, FormatError> {
    let mut log = SessionLog::default();
    let mut off = 0usize;
    while let Some((chunk, consumed)) = parse_chunk(bytes, off)? {
        log.push(decode_record(&chunk)?);
        off += consumed;
    }
    Ok(log)
}

/// Read and parse a session file.
pub fn read_session<P: AsRef<Path>>(path: P) -> Result<SessionLog> {
    let mut reader = ChunkReader::open(path)?;
    let mut log = SessionLog::default();
    while let Some(chunk) = reader.next_chunk()? {
        log.push(decode_record(&chunk)?);
    }
    Ok(log)
}
