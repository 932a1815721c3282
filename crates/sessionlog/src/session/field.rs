//! Tagged field decoding.
//!
//! A field list is a sequence of `[4-byte BE id][4-byte BE length][value]`
//! entries. Each known id maps through `FIELD_TABLE` to a value kind and a
//! destination; anything else is kept as raw bytes and rendered as hex.
use std::fmt;

use tracing::trace;

use crate::binutil::{
    FormatError, int_to_be_min, read_int_be, read_u32_be_at, read_uint_be, read_utf16_be,
    to_hex, write_entry, write_utf16_be,
};

/// How a field's value bytes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// UTF-16BE text, converted to UTF-8.
    Text,
    /// Opaque bytes kept as-is.
    Bytes,
    /// Big-endian signed integer of 1..=8 bytes.
    Int,
    /// 32- or 64-bit big-endian IEEE-754 float.
    Float,
    /// Big-endian unsigned seconds since the Unix epoch.
    Timestamp,
}

/// Where a decoded field lands on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Destination {
    Row,
    FullPath,
    Location,
    Filename,
    Title,
    Artist,
    Album,
    Genre,
    Length,
    FileSize,
    Bitrate,
    Frequency,
    Bpm,
    Comment,
    Remixer,
    Label,
    Composer,
    Year,
    StartTime,
    EndTime,
    Deck,
    Played,
    Playtime,
    SessionId,
    Key,
    Added,
    UpdatedAt,
    AutoGain,
    FileHash,
}

impl Destination {
    pub fn name(self) -> &'static str {
        match self {
            Destination::Row => "row",
            Destination::FullPath => "fullpath",
            Destination::Location => "location",
            Destination::Filename => "filename",
            Destination::Title => "title",
            Destination::Artist => "artist",
            Destination::Album => "album",
            Destination::Genre => "genre",
            Destination::Length => "length",
            Destination::FileSize => "filesize",
            Destination::Bitrate => "bitrate",
            Destination::Frequency => "frequency",
            Destination::Bpm => "bpm",
            Destination::Comment => "comment",
            Destination::Remixer => "remixer",
            Destination::Label => "label",
            Destination::Composer => "composer",
            Destination::Year => "year",
            Destination::StartTime => "starttime",
            Destination::EndTime => "endtime",
            Destination::Deck => "deck",
            Destination::Played => "played",
            Destination::Playtime => "playtime",
            Destination::SessionId => "session_id",
            Destination::Key => "key",
            Destination::Added => "added",
            Destination::UpdatedAt => "updated_at",
            Destination::AutoGain => "autogain",
            Destination::FileHash => "filehash",
        }
    }
}

/// One row of the static decode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub id: u32,
    pub kind: FieldKind,
    pub destination: Destination,
}

const fn def(id: u32, kind: FieldKind, destination: Destination) -> FieldDef {
    FieldDef {
        id,
        kind,
        destination,
    }
}

/// Field id used by older writers for the played flag.
pub const FIELD_PLAYED_LEGACY: u32 = 0x27;
/// Field id used by current writers for the played flag.
pub const FIELD_PLAYED: u32 = 0x32;

/// Field id → (kind, destination).
///
/// `0x27` and `0x32` both land on `Played`; whichever appears later in a
/// payload wins.
pub const FIELD_TABLE: &[FieldDef] = &[
    def(0x01, FieldKind::Int, Destination::Row),
    def(0x02, FieldKind::Text, Destination::FullPath),
    def(0x03, FieldKind::Text, Destination::Location),
    def(0x04, FieldKind::Text, Destination::Filename),
    def(0x06, FieldKind::Text, Destination::Title),
    def(0x07, FieldKind::Text, Destination::Artist),
    def(0x08, FieldKind::Text, Destination::Album),
    def(0x09, FieldKind::Text, Destination::Genre),
    def(0x0a, FieldKind::Text, Destination::Length),
    def(0x0b, FieldKind::Text, Destination::FileSize),
    def(0x0d, FieldKind::Text, Destination::Bitrate),
    def(0x0e, FieldKind::Text, Destination::Frequency),
    def(0x0f, FieldKind::Int, Destination::Bpm),
    def(0x11, FieldKind::Text, Destination::Comment),
    def(0x14, FieldKind::Text, Destination::Remixer),
    def(0x15, FieldKind::Text, Destination::Label),
    def(0x16, FieldKind::Text, Destination::Composer),
    def(0x17, FieldKind::Text, Destination::Year),
    def(0x1c, FieldKind::Timestamp, Destination::StartTime),
    def(0x1d, FieldKind::Timestamp, Destination::EndTime),
    def(0x1f, FieldKind::Int, Destination::Deck),
    def(FIELD_PLAYED_LEGACY, FieldKind::Int, Destination::Played),
    def(0x2d, FieldKind::Int, Destination::Playtime),
    def(0x30, FieldKind::Int, Destination::SessionId),
    def(FIELD_PLAYED, FieldKind::Int, Destination::Played),
    def(0x33, FieldKind::Text, Destination::Key),
    def(0x34, FieldKind::Timestamp, Destination::Added),
    def(0x35, FieldKind::Timestamp, Destination::UpdatedAt),
    def(0x39, FieldKind::Float, Destination::AutoGain),
    def(0x3e, FieldKind::Bytes, Destination::FileHash),
];

/// Look up a field id in the decode table.
pub fn lookup(id: u32) -> Option<&'static FieldDef> {
    FIELD_TABLE.iter().find(|s| s.id == id)
}

/// Canonical field id written for a destination (the current id for
/// `Played`).
pub fn id_for(destination: Destination) -> u32 {
    if destination == Destination::Played {
        return FIELD_PLAYED;
    }
    FIELD_TABLE
        .iter()
        .find(|s| s.destination == destination)
        .map(|s| s.id)
        .unwrap_or_default()
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
    Timestamp(i64),
    /// Value of a field the table does not know, or whose width did not fit
    /// its kind. Displayed as hex.
    Unknown(Vec<u8>),
}

impl FieldValue {
    /// Decode `bytes` according to `kind`.
    pub fn decode(kind: FieldKind, bytes: &[u8]) -> Self {
        match kind {
            FieldKind::Text => FieldValue::Text(read_utf16_be(bytes)),
            FieldKind::Bytes => FieldValue::Bytes(bytes.to_vec()),
            FieldKind::Int => FieldValue::Int(read_int_be(bytes)),
            FieldKind::Timestamp => FieldValue::Timestamp(read_uint_be(bytes)),
            FieldKind::Float => match bytes.len() {
                4 => {
                    let narrow = f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                    FieldValue::Float(narrow as f64)
                }
                8 => {
                    let mut tmp = [0u8; 8];
                    tmp.copy_from_slice(bytes);
                    FieldValue::Float(f64::from_be_bytes(tmp))
                }
                _ => FieldValue::Unknown(bytes.to_vec()),
            },
        }
    }

    /// Encode the value back into wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            FieldValue::Text(s) => {
                let mut out = Vec::with_capacity(s.len() * 2);
                write_utf16_be(&mut out, s);
                out
            }
            FieldValue::Bytes(b) | FieldValue::Unknown(b) => b.clone(),
            FieldValue::Int(v) => int_to_be_min(*v),
            FieldValue::Timestamp(v) => match u32::try_from(*v) {
                Ok(w) => w.to_be_bytes().to_vec(),
                Err(_) => v.to_be_bytes().to_vec(),
            },
            FieldValue::Float(v) => {
                let narrow = *v as f32;
                if narrow as f64 == *v {
                    narrow.to_be_bytes().to_vec()
                } else {
                    v.to_be_bytes().to_vec()
                }
            }
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) | FieldValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Int(v) | FieldValue::Timestamp(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Bytes(b) | FieldValue::Unknown(b) => write!(f, "{}", to_hex(b)),
        }
    }
}

/// A single decoded field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub id: u32,
    pub value: FieldValue,
}

impl Field {
    pub fn new(id: u32, value: FieldValue) -> Self {
        Self { id, value }
    }

    /// Decode one field using the table, falling back to `Unknown`.
    pub fn decode(id: u32, bytes: &[u8]) -> Self {
        match lookup(id) {
            Some(spec) => Field::new(id, FieldValue::decode(spec.kind, bytes)),
            None => {
                trace!("unknown field 0x{:08X} ({} bytes)", id, bytes.len());
                Field::new(id, FieldValue::Unknown(bytes.to_vec()))
            }
        }
    }

    pub fn destination(&self) -> Option<Destination> {
        lookup(self.id).map(|s| s.destination)
    }

    /// Destination name, or `field_0x..` for ids outside the table.
    pub fn name(&self) -> String {
        match self.destination() {
            Some(d) => d.name().to_string(),
            None => format!("field_0x{:08x}", self.id),
        }
    }
}

/// Split a payload into `(id, value bytes)` pairs without interpreting them.
pub fn split_fields(payload: &[u8]) -> Result<Vec<(u32, &[u8])>, FormatError> {
    let mut out = Vec::new();
    let mut off = 0usize;
    while off < payload.len() {
        let id = read_u32_be_at(payload, off).unwrap_or_default();
        let Some(len) = read_u32_be_at(payload, off + 4) else {
            return Err(FormatError::TruncatedField { id, offset: off });
        };
        let start = off + 8;
        let end = start
            .checked_add(len as usize)
            .filter(|end| *end <= payload.len())
            .ok_or(FormatError::TruncatedField { id, offset: off })?;
        out.push((id, &payload[start..end]));
        off = end;
    }
    Ok(out)
}

/// Decode a payload into fields, in payload order.
pub fn decode_fields(payload: &[u8]) -> Result<Vec<Field>, FormatError> {
    Ok(split_fields(payload)?
        .into_iter()
        .map(|(id, bytes)| Field::decode(id, bytes))
        .collect())
}

/// Append an encoded field to `out`.
pub fn write_field(out: &mut Vec<u8>, id: u32, value: &FieldValue) {
    write_entry(out, id.to_be_bytes(), &value.encode());
}
