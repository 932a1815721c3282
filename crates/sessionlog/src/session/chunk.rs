//! Chunk framing: `[4-byte tag][4-byte big-endian length][payload]`.
//!
//! `parse_chunk` decodes one chunk from an in-memory buffer and reports how
//! many bytes it consumed. `ChunkReader` wraps any `Read` source and yields
//! chunks one at a time until the source is exhausted at a chunk boundary.
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::binutil::{FormatError, read_tag_at, read_u32_be_at};
use crate::error::Result;

/// Chunk header size in bytes.
pub const CHUNK_HEADER_LEN: usize = 8;

/// Version chunk. Payload is UTF-16BE text.
pub const TAG_VERSION: [u8; 4] = *b"vrsn";
/// Entry chunk. Payload holds an `adat` field carrying the track fields.
pub const TAG_ENTRY: [u8; 4] = *b"oent";
/// Delete marker chunk. Payload holds a `uent` field carrying the row.
pub const TAG_DELETE: [u8; 4] = *b"oren";
/// Nested field holding a track's field list inside an entry chunk.
pub const TAG_ENTRY_DATA: [u8; 4] = *b"adat";
/// Nested field holding the deleted row inside a delete marker chunk.
pub const TAG_DELETED_ROW: [u8; 4] = *b"uent";

/// One type-tagged block of the session file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub tag: [u8; 4],
    pub body: Vec<u8>,
}

impl Chunk {
    pub fn new(tag: [u8; 4], body: Vec<u8>) -> Self {
        Self { tag, body }
    }

    /// Tag rendered for diagnostics (non-ASCII bytes escaped).
    pub fn tag_str(&self) -> String {
        tag_to_string(self.tag)
    }

    /// Size of this chunk on the wire, header included.
    pub fn encoded_len(&self) -> usize {
        CHUNK_HEADER_LEN + self.body.len()
    }
}

pub(crate) fn tag_to_string(tag: [u8; 4]) -> String {
    tag.iter()
        .flat_map(|b| std::ascii::escape_default(*b))
        .map(char::from)
        .collect()
}

/// Parse one chunk starting at `off`.
///
/// Returns `Ok(None)` when `off` is exactly the end of `bytes`, otherwise the
/// chunk and the number of bytes it occupies. A partial header or body is a
/// `FormatError`.
pub fn parse_chunk(
    bytes: &[u8],
    off: usize,
) -> std::result::Result<Option<(Chunk, usize)>, FormatError> {
    let remaining = bytes.len().saturating_sub(off);
    if remaining == 0 {
        return Ok(None);
    }
    let (Some(tag), Some(declared)) = (read_tag_at(bytes, off), read_u32_be_at(bytes, off + 4))
    else {
        return Err(FormatError::TruncatedHeader {
            offset: off,
            available: remaining,
        });
    };
    let declared = declared as usize;
    let body_start = off + CHUNK_HEADER_LEN;
    let available = bytes.len() - body_start;
    if available < declared {
        return Err(FormatError::TruncatedBody {
            offset: off,
            tag: tag_to_string(tag),
            declared,
            available,
        });
    }
    let body = bytes[body_start..body_start + declared].to_vec();
    Ok(Some((Chunk::new(tag, body), CHUNK_HEADER_LEN + declared)))
}

/// Parse every chunk in `bytes`.
pub fn parse_chunks(bytes: &[u8]) -> std::result::Result<Vec<Chunk>, FormatError> {
    let mut chunks = Vec::new();
    let mut off = 0usize;
    while let Some((chunk, consumed)) = parse_chunk(bytes, off)? {
        off += consumed;
        chunks.push(chunk);
    }
    Ok(chunks)
}

/// Sequential chunk reader over any byte source.
///
/// Dropping the reader closes the underlying source.
pub struct ChunkReader<R> {
    inner: R,
    offset: usize,
}

impl ChunkReader<BufReader<File>> {
    /// Open a session file for whole-file decoding.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> ChunkReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Absolute offset of the next chunk header.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Read the next chunk, or `None` at a clean end of stream.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        let mut header = [0u8; CHUNK_HEADER_LEN];
        let got = read_up_to(&mut self.inner, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < CHUNK_HEADER_LEN {
            return Err(FormatError::TruncatedHeader {
                offset: self.offset,
                available: got,
            }
            .into());
        }
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&header[..4]);
        let declared = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

        let mut body = vec![0u8; declared];
        let got = read_up_to(&mut self.inner, &mut body)?;
        if got < declared {
            return Err(FormatError::TruncatedBody {
                offset: self.offset,
                tag: tag_to_string(tag),
                declared,
                available: got,
            }
            .into());
        }
        self.offset += CHUNK_HEADER_LEN + declared;
        Ok(Some(Chunk::new(tag, body)))
    }

    /// Drain the source into a vector of chunks.
    pub fn read_all(&mut self) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.next_chunk()? {
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    /// Release the reader and return the underlying source.
    pub fn close(self) -> R {
        self.inner
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

/// Fill `buf` as far as the source allows; short only at end of input.
fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn framed(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        crate::binutil::write_entry(&mut out, *tag, body);
        out
    }

    #[test]
    fn test_empty_input_is_end_of_stream() {
        assert_eq!(parse_chunk(&[], 0).unwrap(), None);
        let mut reader = ChunkReader::new(&[0u8; 0][..]);
        assert!(reader.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_parse_two_chunks() {
        let mut bytes = framed(b"vrsn", &[0, 0x31]);
        bytes.extend(framed(b"abcd", &[]));
        let chunks = parse_chunks(&bytes).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].tag, *b"vrsn");
        assert_eq!(chunks[1].body.len(), 0);
    }

    #[test]
    fn test_short_header_is_format_error() {
        let bytes = [b'o', b'e', b'n'];
        assert!(matches!(
            parse_chunk(&bytes, 0),
            Err(FormatError::TruncatedHeader { available: 3, .. })
        ));
        let mut reader = ChunkReader::new(&bytes[..]);
        assert!(matches!(
            reader.next_chunk(),
            Err(Error::Format(FormatError::TruncatedHeader { .. }))
        ));
    }

    #[test]
    fn test_short_body_is_format_error() {
        let mut bytes = framed(b"oent", &[1, 2, 3, 4]);
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            parse_chunk(&bytes, 0),
            Err(FormatError::TruncatedBody {
                declared: 4,
                available: 3,
                ..
            })
        ));
        let mut reader = ChunkReader::new(&bytes[..]);
        assert!(reader.read_all().is_err());
    }

    #[test]
    fn test_reader_tracks_offset() {
        let mut bytes = framed(b"vrsn", &[0, 0x31]);
        bytes.extend(framed(b"oent", &[9; 5]));
        let mut reader = ChunkReader::new(&bytes[..]);
        reader.next_chunk().unwrap();
        assert_eq!(reader.offset(), 10);
        reader.next_chunk().unwrap();
        assert_eq!(reader.offset(), bytes.len());
    }
}
