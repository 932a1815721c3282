//! Parsed session log and builder utilities
//!
//! `SessionLog` is the in-memory form of one session file: its version
//! string and every record in file order, duplicates included. Because the
//! writer appends updates instead of rewriting rows, the same row usually
//! shows up several times; merging those into one row table is the job of
//! [`Document`](crate::session::document::Document).
//!
//! `SessionBuilder` assembles logs programmatically and serializes them to
//! the wire format, which is how fixtures and tests produce session bytes.
use std::collections::BTreeMap;
use std::convert::TryFrom;

use crate::binutil::{FormatError, write_entry};
use crate::session::parser;
use crate::session::record::{Record, RowId, Tombstone, Track};

/// Ordered records of one session file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionLog {
    pub version: Option<String>,
    pub records: Vec<Record>,
}

impl SessionLog {
    /// Append a decoded record, remembering the version if it is one.
    pub fn push(&mut self, record: Record) {
        if let Record::Version(v) = &record {
            self.version = Some(v.clone());
        }
        self.records.push(record);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Every track record, in file order.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.records.iter().filter_map(|r| match r {
            Record::Track(t) => Some(t),
            _ => None,
        })
    }

    /// One track per row, for bulk import.
    ///
    /// For every row the occurrence closest to the end of the record list is
    /// kept. Rows whose last record is a tombstone are dropped. The result is
    /// in ascending row order.
    pub fn dedup_for_storage(&self) -> Vec<Track> {
        let mut latest: BTreeMap<RowId, Option<&Track>> = BTreeMap::new();
        for record in self.records.iter().rev() {
            match record {
                Record::Track(t) => {
                    latest.entry(t.row).or_insert(Some(t));
                }
                Record::Tombstone(t) => {
                    latest.entry(t.row).or_insert(None);
                }
                _ => {}
            }
        }
        latest.into_values().flatten().cloned().collect()
    }

    /// Serialize to session file bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for record in &self.records {
            let chunk = record.to_chunk();
            write_entry(&mut out, chunk.tag, &chunk.body);
        }
        out
    }
}

impl TryFrom<&[u8]> for SessionLog {
    type Error = FormatError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        parser::parse_session(bytes)
    }
}

impl From<SessionLog> for Vec<u8> {
    fn from(log: SessionLog) -> Vec<u8> {
        log.to_bytes()
    }
}

impl From<&SessionLog> for Vec<u8> {
    fn from(log: &SessionLog) -> Vec<u8> {
        log.to_bytes()
    }
}

impl IntoIterator for SessionLog {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a SessionLog {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Builder for assembling a `SessionLog`.
///
/// Records are kept in the order they are added; a version set with
/// `set_version` is emitted first when the log is finalized.
#[derive(Debug, Default)]
pub struct SessionBuilder {
    version: Option<String>,
    records: Vec<Record>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.version = Some(version.into());
        self
    }

    /// Append a track entry. Appending the same row again models an update.
    pub fn add_track(&mut self, track: Track) -> &mut Self {
        self.records.push(Record::Track(track));
        self
    }

    pub fn add_tombstone(&mut self, row: RowId) -> &mut Self {
        self.records.push(Record::Tombstone(Tombstone { row }));
        self
    }

    pub fn add_record(&mut self, record: Record) -> &mut Self {
        self.records.push(record);
        self
    }

    pub fn finalize(self) -> SessionLog {
        let mut log = SessionLog::default();
        if let Some(v) = self.version {
            log.push(Record::Version(v));
        }
        for record in self.records {
            log.push(record);
        }
        log
    }
}

impl From<SessionLog> for SessionBuilder {
    fn from(log: SessionLog) -> Self {
        SessionBuilder {
            version: None,
            records: log.records,
        }
    }
}
