//! Row-indexed session table and incremental diffs
//!
//! A `Document` is what a session file says *now*: replaying its records in
//! order, each row keeps whatever was written for it last (a track, or a
//! deletion). Append order is recency, so no timestamp comparison happens
//! while merging.
//!
//! `diff(older, newer)` reports the tracks that appeared in `newer`, or whose
//! `updated_at` moved forward since `older`. This is what the deck layer
//! consumes on every poll.
use std::collections::BTreeMap;

use crate::binutil::FormatError;
use crate::session::chunk::Chunk;
use crate::session::record::{DeckId, Record, RowId, Track, decode_record};

/// State of one row in a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Track(Track),
    Deleted,
}

impl Entry {
    pub fn as_track(&self) -> Option<&Track> {
        match self {
            Entry::Track(t) => Some(t),
            Entry::Deleted => None,
        }
    }
}

/// Merge-by-row view of a session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    rows: BTreeMap<RowId, Entry>,
    version: Option<String>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay `records` in order.
    pub fn build<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut document = Document::new();
        for record in records {
            document.apply(record);
        }
        document
    }

    /// Decode and replay raw chunks in order.
    pub fn from_chunks(chunks: &[Chunk]) -> Result<Self, FormatError> {
        let mut document = Document::new();
        for chunk in chunks {
            document.apply(&decode_record(chunk)?);
        }
        Ok(document)
    }

    /// Apply one record; later writes to a row replace earlier ones.
    pub fn apply(&mut self, record: &Record) {
        match record {
            Record::Track(t) => {
                self.rows.insert(t.row, Entry::Track(t.clone()));
            }
            Record::Tombstone(t) => {
                self.rows.insert(t.row, Entry::Deleted);
            }
            Record::Version(v) => self.version = Some(v.clone()),
            Record::Unknown { .. } => {}
        }
    }

    /// Merge `other` into `self`, `other` winning on every row it holds.
    ///
    /// Merging a document into itself changes nothing.
    pub fn merge(&mut self, other: &Document) {
        for (row, entry) in &other.rows {
            self.rows.insert(*row, entry.clone());
        }
        if other.version.is_some() {
            self.version = other.version.clone();
        }
    }

    pub fn get(&self, row: RowId) -> Option<&Entry> {
        self.rows.get(&row)
    }

    /// Live track for `row`, `None` if absent or deleted.
    pub fn track(&self, row: RowId) -> Option<&Track> {
        self.rows.get(&row).and_then(Entry::as_track)
    }

    /// Live tracks in ascending row order.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.rows.values().filter_map(Entry::as_track)
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Number of rows, deleted ones included.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether `track` counts as new or updated relative to this document.
    pub fn is_newer(&self, track: &Track) -> bool {
        match self.track(track.row) {
            None => true,
            Some(old) => track.updated_at > old.updated_at,
        }
    }
}

/// Tracks that are new or updated between two documents.
///
/// The order of tracks carries no meaning; consumers that need one (the
/// deck layer) sort for themselves.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Diff {
    tracks: Vec<Track>,
}

impl Diff {
    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Track> {
        self.tracks.iter()
    }

    pub fn rows(&self) -> Vec<RowId> {
        self.tracks.iter().map(|t| t.row).collect()
    }

    /// Tracks of this diff that belong to `deck`.
    pub fn for_deck(&self, deck: DeckId) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(move |t| t.deck == Some(deck))
    }

    /// Distinct deck ids referenced by the diff, ascending.
    pub fn decks(&self) -> Vec<DeckId> {
        let mut decks: Vec<DeckId> = self.tracks.iter().filter_map(|t| t.deck).collect();
        decks.sort_unstable();
        decks.dedup();
        decks
    }

    pub fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }
}

impl<'a> IntoIterator for &'a Diff {
    type Item = &'a Track;
    type IntoIter = std::slice::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.iter()
    }
}

/// Compute the tracks of `newer` that are absent from `older` or whose
/// `updated_at` strictly increased.
///
/// Rows deleted or missing in `newer` are never reported.
pub fn diff(older: &Document, newer: &Document) -> Diff {
    Diff::from_tracks(
        newer
            .tracks()
            .filter(|t| older.is_newer(t))
            .cloned()
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(records: &[Record]) -> Document {
        Document::build(records)
    }

    #[test]
    fn test_later_write_wins() {
        let d = doc(&[
            Record::Track(Track::new(1).with_title("first")),
            Record::Track(Track::new(1).with_title("second")),
        ]);
        assert_eq!(d.track(1).unwrap().title.as_deref(), Some("second"));
    }

    #[test]
    fn test_tombstone_hides_row() {
        let d = doc(&[
            Record::Track(Track::new(1)),
            Record::Tombstone(crate::session::record::Tombstone { row: 1 }),
        ]);
        assert_eq!(d.get(1), Some(&Entry::Deleted));
        assert!(d.track(1).is_none());
        assert_eq!(d.tracks().count(), 0);
    }

    #[test]
    fn test_diff_includes_new_and_strictly_updated_rows() {
        let older = doc(&[
            Record::Track(Track::new(1).with_updated_at(10)),
            Record::Track(Track::new(2).with_updated_at(10)),
        ]);
        let newer = doc(&[
            Record::Track(Track::new(1).with_updated_at(10).with_title("same ts")),
            Record::Track(Track::new(2).with_updated_at(11)),
            Record::Track(Track::new(3).with_updated_at(11)),
        ]);
        assert_eq!(diff(&older, &newer).rows(), vec![2, 3]);
    }

    #[test]
    fn test_diff_of_identical_documents_is_empty() {
        let d = doc(&[
            Record::Track(Track::new(1).with_updated_at(5)),
            Record::Track(Track::new(2)),
        ]);
        assert!(diff(&d, &d).is_empty());
    }

    #[test]
    fn test_diff_never_reports_deleted_rows() {
        let older = Document::new();
        let newer = doc(&[
            Record::Track(Track::new(1)),
            Record::Tombstone(crate::session::record::Tombstone { row: 1 }),
        ]);
        assert!(diff(&older, &newer).is_empty());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut d = doc(&[
            Record::Version("1.0".into()),
            Record::Track(Track::new(1).with_updated_at(5)),
            Record::Tombstone(crate::session::record::Tombstone { row: 2 }),
        ]);
        let snapshot = d.clone();
        d.merge(&snapshot);
        assert_eq!(d, snapshot);
    }

    #[test]
    fn test_diff_decks_sorted_and_distinct() {
        let diff = Diff::from_tracks(vec![
            Track::new(3).with_deck(2),
            Track::new(1).with_deck(1),
            Track::new(2).with_deck(2),
            Track::new(4),
        ]);
        assert_eq!(diff.decks(), vec![1, 2]);
        assert_eq!(diff.for_deck(2).count(), 2);
    }
}
