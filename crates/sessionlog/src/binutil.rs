//! Utilities used by the decoders: the format error type and big-endian
//! byte readers/writers.
use thiserror::Error;

/// Error returned when session bytes are truncated or structurally corrupt.
///
/// The decoders never decide whether a corrupt file should be skipped or
/// abandoned; the error is handed back to whoever asked for the decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// A chunk header was started but fewer than eight bytes were available.
    ///
    /// - `offset` is the absolute position of the header.
    /// - `available` is the number of header bytes actually present.
    #[error("truncated chunk header at offset 0x{offset:X} ({available} of 8 bytes)")]
    TruncatedHeader { offset: usize, available: usize },

    /// A chunk body was shorter than the length declared in its header.
    #[error(
        "truncated chunk body for {tag:?} at offset 0x{offset:X} (declared {declared} bytes, available {available})"
    )]
    TruncatedBody {
        offset: usize,
        tag: String,
        declared: usize,
        available: usize,
    },

    /// A field entry inside a chunk payload ran past the end of the payload.
    ///
    /// `offset` is relative to the start of the payload being decoded.
    #[error("truncated field 0x{id:08X} at payload offset 0x{offset:X}")]
    TruncatedField { id: u32, offset: usize },

    /// A record was missing a field it cannot exist without.
    #[error("{record} record is missing its {field} field")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },
}

/// Read a 32-bit big-endian unsigned integer from `bytes` at `off`.
///
/// Returns `None` when fewer than four bytes are available.
pub fn read_u32_be_at(bytes: &[u8], off: usize) -> Option<u32> {
    let end = off.checked_add(4)?;
    let slice = bytes.get(off..end)?;
    let mut tmp: [u8; 4] = [0; 4];
    tmp.copy_from_slice(slice);
    Some(u32::from_be_bytes(tmp))
}

/// Return the four bytes at `off` as a tag array.
pub fn read_tag_at(bytes: &[u8], off: usize) -> Option<[u8; 4]> {
    let end = off.checked_add(4)?;
    let slice = bytes.get(off..end)?;
    let mut tag: [u8; 4] = [0; 4];
    tag.copy_from_slice(slice);
    Some(tag)
}

/// Interpret `bytes` as a big-endian two's-complement integer and sign-extend
/// it to 64 bits.
///
/// Widths above eight bytes keep the eight least significant bytes. An empty
/// slice decodes to zero.
pub fn read_int_be(bytes: &[u8]) -> i64 {
    let tail = &bytes[bytes.len().saturating_sub(8)..];
    if tail.is_empty() {
        return 0;
    }
    let mut acc: u64 = 0;
    for b in tail {
        acc = (acc << 8) | *b as u64;
    }
    let bits = (tail.len() * 8) as u32;
    if bits < 64 {
        let shift = 64 - bits;
        ((acc << shift) as i64) >> shift
    } else {
        acc as i64
    }
}

/// Interpret `bytes` as a big-endian unsigned integer, keeping the low eight
/// bytes, and return it as `i64`.
pub fn read_uint_be(bytes: &[u8]) -> i64 {
    let tail = &bytes[bytes.len().saturating_sub(8)..];
    tail.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64) as i64
}

/// Decode UTF-16BE text, replacing invalid sequences and stripping trailing
/// NUL code units. An odd trailing byte is ignored.
pub fn read_utf16_be(bytes: &[u8]) -> String {
    let mut units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    while units.last() == Some(&0) {
        units.pop();
    }
    String::from_utf16_lossy(&units)
}

/// Encode `s` as UTF-16BE without a terminator.
pub fn write_utf16_be(out: &mut Vec<u8>, s: &str) {
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
}

/// Render bytes as lowercase hex, used for fields the decoder does not know.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

/// Append a `[tag][BE length][body]` entry to `out`.
///
/// The chunk layer and the field layer share this framing.
pub fn write_entry(out: &mut Vec<u8>, tag: [u8; 4], body: &[u8]) {
    out.extend_from_slice(&tag);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
}

/// Encode `v` in the narrowest big-endian two's-complement width of
/// 1, 2, 4 or 8 bytes that preserves it.
pub fn int_to_be_min(v: i64) -> Vec<u8> {
    if let Ok(b) = i8::try_from(v) {
        b.to_be_bytes().to_vec()
    } else if let Ok(h) = i16::try_from(v) {
        h.to_be_bytes().to_vec()
    } else if let Ok(w) = i32::try_from(v) {
        w.to_be_bytes().to_vec()
    } else {
        v.to_be_bytes().to_vec()
    }
}
