//! Typed records decoded from chunks.
//!
//! An entry chunk carries a [`Track`], a delete marker carries a
//! [`Tombstone`], and a version chunk carries the format version string.
//! Chunks with any other tag decode to [`Record::Unknown`] so newer files
//! never stop the decoder.
use tracing::trace;

use crate::binutil::{FormatError, read_int_be, read_utf16_be, write_utf16_be};
use crate::session::chunk::{
    Chunk, TAG_DELETE, TAG_DELETED_ROW, TAG_ENTRY, TAG_ENTRY_DATA, TAG_VERSION, tag_to_string,
};
use crate::session::field::{
    Destination, Field, FieldValue, decode_fields, id_for, split_fields, write_field,
};

/// Writer-assigned row identifier.
pub type RowId = i64;

/// Physical deck identifier.
pub type DeckId = i64;

/// Status a track record reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackStatus {
    /// Loaded, not yet confirmed playing.
    New,
    /// Confirmed playing, still loaded.
    Playing,
    /// Ejected after being played.
    Played,
    /// Ejected without being played.
    Skipped,
}

/// One track entry as written by the mixing application.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Track {
    pub row: RowId,
    pub deck: Option<DeckId>,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    /// Track length as the writer formats it, e.g. `"05:00.00"`.
    pub length: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub played: bool,
    pub updated_at: Option<i64>,
    /// Authoritative elapsed seconds, when the writer reports one.
    pub playtime: Option<i64>,
    /// Every other decoded field, in payload order.
    pub extra: Vec<Field>,
}

impl Track {
    pub fn new(row: RowId) -> Self {
        Self {
            row,
            ..Default::default()
        }
    }

    pub fn with_deck(mut self, deck: DeckId) -> Self {
        self.deck = Some(deck);
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_length(mut self, length: impl Into<String>) -> Self {
        self.length = Some(length.into());
        self
    }

    pub fn with_start_time(mut self, ts: i64) -> Self {
        self.start_time = Some(ts);
        self
    }

    pub fn with_end_time(mut self, ts: i64) -> Self {
        self.end_time = Some(ts);
        self
    }

    pub fn with_played(mut self, played: bool) -> Self {
        self.played = played;
        self
    }

    pub fn with_updated_at(mut self, ts: i64) -> Self {
        self.updated_at = Some(ts);
        self
    }

    pub fn with_playtime(mut self, seconds: i64) -> Self {
        self.playtime = Some(seconds);
        self
    }

    /// Status derived from the `played` flag and whether an end time is set.
    pub fn status(&self) -> TrackStatus {
        match (self.end_time.is_some(), self.played) {
            (false, false) => TrackStatus::New,
            (false, true) => TrackStatus::Playing,
            (true, true) => TrackStatus::Played,
            (true, false) => TrackStatus::Skipped,
        }
    }

    /// Length in whole seconds.
    ///
    /// Accepts `mm:ss`, `mm:ss.ff`, `hh:mm:ss` and bare seconds.
    pub fn length_seconds(&self) -> Option<u64> {
        parse_length(self.length.as_deref()?)
    }

    /// Build a track from a decoded field list.
    ///
    /// Later fields overwrite earlier ones for the same destination, which is
    /// how the two played ids resolve.
    pub fn from_fields(fields: Vec<Field>) -> Result<Self, FormatError> {
        let mut row = None;
        let mut track = Track::default();
        for field in fields {
            let Some(destination) = field.destination() else {
                track.extra.push(field);
                continue;
            };
            match (destination, &field.value) {
                (Destination::Row, FieldValue::Int(v)) => row = Some(*v),
                (Destination::Deck, FieldValue::Int(v)) => track.deck = Some(*v),
                (Destination::Artist, FieldValue::Text(s)) => track.artist = Some(s.clone()),
                (Destination::Title, FieldValue::Text(s)) => track.title = Some(s.clone()),
                (Destination::Album, FieldValue::Text(s)) => track.album = Some(s.clone()),
                (Destination::Length, FieldValue::Text(s)) => track.length = Some(s.clone()),
                (Destination::StartTime, FieldValue::Timestamp(v)) => track.start_time = Some(*v),
                (Destination::EndTime, FieldValue::Timestamp(v)) => track.end_time = Some(*v),
                (Destination::Played, FieldValue::Int(v)) => track.played = *v != 0,
                (Destination::UpdatedAt, FieldValue::Timestamp(v)) => track.updated_at = Some(*v),
                (Destination::Playtime, FieldValue::Int(v)) => track.playtime = Some(*v),
                _ => track.extra.push(field),
            }
        }
        track.row = row.ok_or(FormatError::MissingField {
            record: "track",
            field: "row",
        })?;
        Ok(track)
    }

    /// Field list in the order the builder writes it.
    pub fn to_fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::new(id_for(Destination::Row), FieldValue::Int(self.row))];
        let mut text = |d: Destination, v: &Option<String>| {
            if let Some(s) = v {
                fields.push(Field::new(id_for(d), FieldValue::Text(s.clone())));
            }
        };
        text(Destination::Title, &self.title);
        text(Destination::Artist, &self.artist);
        text(Destination::Album, &self.album);
        text(Destination::Length, &self.length);
        if let Some(v) = self.start_time {
            fields.push(Field::new(id_for(Destination::StartTime), FieldValue::Timestamp(v)));
        }
        if let Some(v) = self.end_time {
            fields.push(Field::new(id_for(Destination::EndTime), FieldValue::Timestamp(v)));
        }
        if let Some(v) = self.deck {
            fields.push(Field::new(id_for(Destination::Deck), FieldValue::Int(v)));
        }
        fields.push(Field::new(
            id_for(Destination::Played),
            FieldValue::Int(self.played as i64),
        ));
        if let Some(v) = self.playtime {
            fields.push(Field::new(id_for(Destination::Playtime), FieldValue::Int(v)));
        }
        if let Some(v) = self.updated_at {
            fields.push(Field::new(id_for(Destination::UpdatedAt), FieldValue::Timestamp(v)));
        }
        fields.extend(self.extra.iter().cloned());
        fields
    }

    /// Short human-readable label, `artist - title`.
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.artist.as_deref().unwrap_or("?"),
            self.title.as_deref().unwrap_or("?")
        )
    }
}

fn parse_length(s: &str) -> Option<u64> {
    let mut total = 0f64;
    for part in s.trim().split(':') {
        let v: f64 = part.trim().parse().ok()?;
        if v < 0.0 {
            return None;
        }
        total = total * 60.0 + v;
    }
    Some(total.floor() as u64)
}

/// Marks a row as deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tombstone {
    pub row: RowId,
}

/// A decoded chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Track(Track),
    Tombstone(Tombstone),
    Version(String),
    /// Chunk with a tag the decoder does not interpret.
    Unknown { tag: [u8; 4], len: usize },
}

impl Record {
    /// Row this record refers to, if any.
    pub fn row(&self) -> Option<RowId> {
        match self {
            Record::Track(t) => Some(t.row),
            Record::Tombstone(t) => Some(t.row),
            _ => None,
        }
    }

    /// Encode the record back into a chunk.
    ///
    /// Unknown chunks keep only their length; their body is zero-filled.
    pub fn to_chunk(&self) -> Chunk {
        match self {
            Record::Track(track) => {
                let mut data = Vec::new();
                for field in track.to_fields() {
                    write_field(&mut data, field.id, &field.value);
                }
                let mut body = Vec::with_capacity(data.len() + 8);
                write_field(
                    &mut body,
                    u32::from_be_bytes(TAG_ENTRY_DATA),
                    &FieldValue::Bytes(data),
                );
                Chunk::new(TAG_ENTRY, body)
            }
            Record::Tombstone(t) => {
                let mut body = Vec::new();
                write_field(
                    &mut body,
                    u32::from_be_bytes(TAG_DELETED_ROW),
                    &FieldValue::Int(t.row),
                );
                Chunk::new(TAG_DELETE, body)
            }
            Record::Version(v) => {
                let mut body = Vec::new();
                write_utf16_be(&mut body, v);
                Chunk::new(TAG_VERSION, body)
            }
            Record::Unknown { tag, len } => Chunk::new(*tag, vec![0; *len]),
        }
    }
}

/// Decode a chunk into a record.
pub fn decode_record(chunk: &Chunk) -> Result<Record, FormatError> {
    match chunk.tag {
        TAG_ENTRY => {
            let data = nested(&chunk.body, TAG_ENTRY_DATA)?.ok_or(FormatError::MissingField {
                record: "entry",
                field: "adat",
            })?;
            let fields = decode_fields(data)?;
            Ok(Record::Track(Track::from_fields(fields)?))
        }
        TAG_DELETE => {
            let row = nested(&chunk.body, TAG_DELETED_ROW)?.ok_or(FormatError::MissingField {
                record: "delete marker",
                field: "uent",
            })?;
            Ok(Record::Tombstone(Tombstone {
                row: read_int_be(row),
            }))
        }
        TAG_VERSION => Ok(Record::Version(read_utf16_be(&chunk.body))),
        tag => {
            trace!("unknown chunk {} ({} bytes)", tag_to_string(tag), chunk.body.len());
            Ok(Record::Unknown {
                tag,
                len: chunk.body.len(),
            })
        }
    }
}

/// Find the last nested entry named `tag` inside a field list.
fn nested(payload: &[u8], tag: [u8; 4]) -> Result<Option<&[u8]>, FormatError> {
    let id = u32::from_be_bytes(tag);
    Ok(split_fields(payload)?
        .into_iter()
        .rev()
        .find(|(entry_id, _)| *entry_id == id)
        .map(|(_, bytes)| bytes))
}
