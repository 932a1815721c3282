//! Resumable session decoding.
//!
//! The mixing application appends to its session file while we read it, so
//! the last chunk in the file is often only partly written. `SessionStream`
//! buffers pushed bytes and yields records one at a time; an incomplete
//! trailing chunk is reported as `NeedsMoreData` instead of an error, and
//! decoding resumes at the same chunk boundary on the next push.
//!
//! `TailReader` drives a `SessionStream` from a file on disk, remembering how
//! far it has read so each call only touches the appended bytes.
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{trace, warn};

use crate::binutil::{FormatError, read_u32_be_at};
use crate::error::Result;
use crate::session::chunk::{CHUNK_HEADER_LEN, Chunk, tag_to_string};
use crate::session::record::{Record, decode_record};

/// Result of one decode attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamResult {
    /// A complete chunk was decoded.
    Record(Record),
    /// The buffer ends inside a chunk, or is empty.
    NeedsMoreData,
    /// `finish` was called and the buffer is fully consumed.
    EndOfStream,
}

/// Incremental chunk/record decoder.
///
/// Feed bytes with `push_chunk` and pull records with `next_record` (or the
/// `Iterator` impl). The iterator never ends on its own: callers stop on
/// `NeedsMoreData` or `EndOfStream`.
///
/// ```
/// use sessionlog::{SessionBuilder, SessionStream, StreamResult, Track};
///
/// let mut builder = SessionBuilder::new();
/// builder.add_track(Track::new(1).with_deck(1));
/// let bytes: Vec<u8> = builder.finalize().into();
///
/// let mut stream = SessionStream::new();
/// stream.push_chunk(&bytes[..5]);
/// assert_eq!(stream.next_record().unwrap(), StreamResult::NeedsMoreData);
/// stream.push_chunk(&bytes[5..]);
/// assert!(matches!(stream.next_record().unwrap(), StreamResult::Record(_)));
/// ```
#[derive(Debug, Default)]
pub struct SessionStream {
    buffer: Vec<u8>,
    /// Absolute offset of `buffer[0]`.
    consumed: usize,
    finished: bool,
}

impl SessionStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes to the decode buffer.
    pub fn push_chunk(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Declare that no more bytes will be pushed.
    ///
    /// After this, a partial trailing chunk is a `FormatError`, matching the
    /// whole-file parser.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Absolute number of bytes decoded so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Bytes buffered but not yet decoded.
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Drop buffered bytes and start over at offset zero.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.consumed = 0;
        self.finished = false;
    }

    /// Decode the next record if a complete chunk is buffered.
    pub fn next_record(&mut self) -> std::result::Result<StreamResult, FormatError> {
        let Some(chunk_len) = self.complete_chunk_len()? else {
            return Ok(if self.finished && self.buffer.is_empty() {
                StreamResult::EndOfStream
            } else {
                StreamResult::NeedsMoreData
            });
        };
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&self.buffer[..4]);
        let body = self.buffer[CHUNK_HEADER_LEN..chunk_len].to_vec();
        self.buffer.drain(..chunk_len);
        self.consumed += chunk_len;

        let chunk = Chunk::new(tag, body);
        trace!(
            "chunk {} ({} bytes) ending at {}",
            chunk.tag_str(),
            chunk.body.len(),
            self.consumed
        );
        decode_record(&chunk).map(StreamResult::Record)
    }

    /// Length of the buffered leading chunk, `None` while it is incomplete.
    fn complete_chunk_len(&self) -> std::result::Result<Option<usize>, FormatError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let Some(declared) = read_u32_be_at(&self.buffer, 4) else {
            if self.finished {
                return Err(FormatError::TruncatedHeader {
                    offset: self.consumed,
                    available: self.buffer.len(),
                });
            }
            return Ok(None);
        };
        let total = CHUNK_HEADER_LEN + declared as usize;
        if self.buffer.len() < total {
            if self.finished {
                let mut tag = [0u8; 4];
                tag.copy_from_slice(&self.buffer[..4]);
                return Err(FormatError::TruncatedBody {
                    offset: self.consumed,
                    tag: tag_to_string(tag),
                    declared: declared as usize,
                    available: self.buffer.len() - CHUNK_HEADER_LEN,
                });
            }
            return Ok(None);
        }
        Ok(Some(total))
    }

    /// Decode every complete record currently buffered.
    pub fn drain_records(&mut self) -> std::result::Result<Vec<Record>, FormatError> {
        let mut records = Vec::new();
        self.drain_into(&mut records)?;
        Ok(records)
    }

    /// Like `drain_records`, but appends to `out` as it goes.
    ///
    /// On error `out` still holds every record decoded before the bad chunk,
    /// and the bad chunk itself has been consumed.
    pub fn drain_into(&mut self, out: &mut Vec<Record>) -> std::result::Result<(), FormatError> {
        while let StreamResult::Record(record) = self.next_record()? {
            out.push(record);
        }
        Ok(())
    }
}

impl Iterator for SessionStream {
    type Item = std::result::Result<StreamResult, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_record())
    }
}

/// Follows a growing session file.
#[derive(Debug)]
pub struct TailReader {
    path: PathBuf,
    position: u64,
    stream: SessionStream,
    /// Records decoded but not yet handed out, kept across a failed read.
    ready: Vec<Record>,
}

impl TailReader {
    /// Prepare to tail `path`; nothing is read until `read_new`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            position: 0,
            stream: SessionStream::new(),
            ready: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes read from the file so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Start again from the beginning of the file.
    pub fn reset(&mut self) {
        self.position = 0;
        self.stream.reset();
        self.ready.clear();
    }

    /// Read bytes appended since the last call and decode every complete
    /// chunk among them.
    ///
    /// If the file became shorter than what was already read, it was
    /// replaced and reading restarts at offset zero.
    ///
    /// A chunk that fails to decode is skipped and reported as an error.
    /// Records decoded ahead of it are not lost: the next call returns them
    /// first.
    pub fn read_new(&mut self) -> Result<Vec<Record>> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        if len < self.position {
            warn!(
                "{} shrank from {} to {} bytes; rereading",
                self.path.display(),
                self.position,
                len
            );
            self.reset();
        }
        file.seek(SeekFrom::Start(self.position))?;
        let mut appended = Vec::new();
        file.read_to_end(&mut appended)?;
        self.position += appended.len() as u64;
        self.stream.push_chunk(&appended);
        self.stream.drain_into(&mut self.ready)?;
        Ok(std::mem::take(&mut self.ready))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::log::SessionBuilder;
    use crate::session::record::Track;

    fn sample_bytes() -> Vec<u8> {
        let mut builder = SessionBuilder::new();
        builder
            .set_version("1.0/test")
            .add_track(Track::new(1).with_deck(1).with_title("one"))
            .add_track(Track::new(2).with_deck(2).with_title("two"));
        builder.finalize().into()
    }

    #[test]
    fn test_byte_at_a_time_matches_whole_parse() {
        let bytes = sample_bytes();
        let whole = crate::session::parser::parse_session(&bytes).unwrap();

        let mut stream = SessionStream::new();
        let mut records = Vec::new();
        for b in &bytes {
            stream.push_chunk(std::slice::from_ref(b));
            records.extend(stream.drain_records().unwrap());
        }
        stream.finish();
        assert_eq!(stream.next_record().unwrap(), StreamResult::EndOfStream);
        assert_eq!(records, whole.records);
        assert_eq!(stream.consumed(), bytes.len());
    }

    #[test]
    fn test_partial_tail_is_error_only_after_finish() {
        let bytes = sample_bytes();
        let mut stream = SessionStream::new();
        stream.push_chunk(&bytes[..bytes.len() - 2]);
        let records = stream.drain_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(stream.next_record().unwrap(), StreamResult::NeedsMoreData);

        stream.finish();
        assert!(matches!(
            stream.next_record(),
            Err(FormatError::TruncatedBody { .. })
        ));
    }

    #[test]
    fn test_partial_header_after_finish() {
        let mut stream = SessionStream::new();
        stream.push_chunk(b"oen");
        assert_eq!(stream.next_record().unwrap(), StreamResult::NeedsMoreData);
        stream.finish();
        assert_eq!(
            stream.next_record(),
            Err(FormatError::TruncatedHeader {
                offset: 0,
                available: 3
            })
        );
    }

    #[test]
    fn test_tail_reader_reads_only_appended_bytes() {
        use std::io::Write;

        let bytes = sample_bytes();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let split = bytes.len() - 3;
        file.write_all(&bytes[..split]).unwrap();
        file.flush().unwrap();

        let mut tail = TailReader::new(file.path());
        assert_eq!(tail.read_new().unwrap().len(), 2);
        assert_eq!(tail.position(), split as u64);

        file.write_all(&bytes[split..]).unwrap();
        file.flush().unwrap();
        let more = tail.read_new().unwrap();
        assert_eq!(more.len(), 1);
        assert!(matches!(&more[0], Record::Track(t) if t.row == 2));
        assert!(tail.read_new().unwrap().is_empty());
    }

    /// An `oent` whose `adat` payload stops inside a field header.
    const BROKEN_ENTRY: &[u8] = b"oent\0\0\0\x0cadat\0\0\0\x04\0\0\0\x01";

    #[test]
    fn test_drain_into_keeps_records_before_bad_chunk() {
        let mut bytes = sample_bytes();
        bytes.extend_from_slice(BROKEN_ENTRY);
        let mut stream = SessionStream::new();
        stream.push_chunk(&bytes);
        let mut records = Vec::new();
        assert!(matches!(
            stream.drain_into(&mut records),
            Err(FormatError::TruncatedField { .. })
        ));
        assert_eq!(records.len(), 3);
        assert_eq!(stream.buffer_size(), 0);
    }

    #[test]
    fn test_tail_reader_returns_records_read_before_error() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&sample_bytes()).unwrap();
        file.write_all(BROKEN_ENTRY).unwrap();
        file.flush().unwrap();

        let mut tail = TailReader::new(file.path());
        assert!(tail.read_new().is_err());
        let kept = tail.read_new().unwrap();
        assert_eq!(kept.len(), 3);
        assert!(tail.read_new().unwrap().is_empty());
    }
}
