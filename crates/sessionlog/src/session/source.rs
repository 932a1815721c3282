//! Diff producers for a session file.
//!
//! Both sources turn "whatever the file holds now" into the list of diffs
//! since the previous poll; they differ only in how much they read.
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::session::document::{Diff, Document, diff};
use crate::session::parser::read_session;
use crate::session::record::{Record, Track};
use crate::session::stream::TailReader;

/// Something that yields the diffs of a session file since the last poll.
pub trait DiffSource {
    /// Diffs produced since the previous call, in production order.
    fn poll(&mut self) -> Result<Vec<Diff>>;

    /// Forget all history; the next poll reports the whole file.
    fn reset(&mut self);

    /// Merged view of everything seen so far.
    fn document(&self) -> &Document;

    fn path(&self) -> &Path;
}

/// Rereads the whole file on every poll and diffs it against the previous
/// snapshot.
#[derive(Debug)]
pub struct RereadSource {
    path: PathBuf,
    document: Document,
}

impl RereadSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            document: Document::new(),
        }
    }
}

impl DiffSource for RereadSource {
    fn poll(&mut self) -> Result<Vec<Diff>> {
        let log = read_session(&self.path)?;
        let newer = Document::build(&log);
        let changes = diff(&self.document, &newer);
        self.document = newer;
        debug!("reread {}: {} changed rows", self.path.display(), changes.len());
        Ok(if changes.is_empty() {
            Vec::new()
        } else {
            vec![changes]
        })
    }

    fn reset(&mut self) {
        self.document = Document::new();
    }

    fn document(&self) -> &Document {
        &self.document
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Decodes only the bytes appended since the previous poll.
///
/// Appended tracks pass the same newer-than rule as `diff`, checked against
/// a running document. Accepted tracks with the same `updated_at` that arrive
/// back to back form one diff; a change in `updated_at` starts the next.
///
/// Within one read the last write of a row wins: a rewrite with the same
/// `updated_at` replaces the accepted record, and a delete marker withdraws
/// it, so a read reports the same final rows as a full reread would.
///
/// A decode error is returned as is. Records decoded before the bad chunk
/// come back on the next poll.
#[derive(Debug)]
pub struct TailSource {
    reader: TailReader,
    document: Document,
}

impl TailSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            reader: TailReader::new(path),
            document: Document::new(),
        }
    }

    fn batch(&mut self, records: Vec<Record>) -> Vec<Diff> {
        let mut batches: Vec<Vec<Track>> = Vec::new();
        for record in records {
            match &record {
                Record::Track(track) if self.document.is_newer(track) => {
                    let same_stamp = batches
                        .last()
                        .and_then(|b| b.last())
                        .is_some_and(|last| last.updated_at == track.updated_at);
                    if !same_stamp {
                        batches.push(Vec::new());
                    }
                    if let Some(batch) = batches.last_mut() {
                        match batch.iter().position(|t| t.row == track.row) {
                            Some(i) => batch[i] = track.clone(),
                            None => batch.push(track.clone()),
                        }
                    }
                }
                // same row and stamp written again in this read: later wins
                Record::Track(track) => {
                    if let Some(slot) = batches
                        .iter_mut()
                        .flatten()
                        .find(|t| t.row == track.row && t.updated_at == track.updated_at)
                    {
                        *slot = track.clone();
                    }
                }
                Record::Tombstone(t) => {
                    for batch in &mut batches {
                        batch.retain(|track| track.row != t.row);
                    }
                }
                Record::Version(_) | Record::Unknown { .. } => {}
            }
            self.document.apply(&record);
        }
        batches
            .into_iter()
            .filter(|b| !b.is_empty())
            .map(Diff::from_tracks)
            .collect()
    }
}

impl DiffSource for TailSource {
    fn poll(&mut self) -> Result<Vec<Diff>> {
        let records = self.reader.read_new()?;
        let diffs = self.batch(records);
        if !diffs.is_empty() {
            debug!(
                "tail {}: {} batches, offset {}",
                self.reader.path().display(),
                diffs.len(),
                self.reader.position()
            );
        }
        Ok(diffs)
    }

    fn reset(&mut self) {
        self.reader.reset();
        self.document = Document::new();
    }

    fn document(&self) -> &Document {
        &self.document
    }

    fn path(&self) -> &Path {
        self.reader.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_batches_split_on_updated_at() {
        let mut source = TailSource::new("unused");
        let records = vec![
            Record::Track(Track::new(1).with_updated_at(10)),
            Record::Track(Track::new(2).with_updated_at(10)),
            Record::Track(Track::new(1).with_updated_at(11)),
            // same stamp again: replaces the record accepted just above
            Record::Track(Track::new(1).with_updated_at(11).with_title("dup")),
        ];
        let diffs = source.batch(records);
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].rows(), vec![1, 2]);
        assert_eq!(diffs[1].rows(), vec![1]);
        assert_eq!(diffs[1].iter().next().unwrap().title.as_deref(), Some("dup"));
        assert_eq!(source.document().track(1).unwrap().title.as_deref(), Some("dup"));
    }

    #[test]
    fn test_tail_rewrite_with_same_stamp_wins() {
        let mut source = TailSource::new("unused");
        let diffs = source.batch(vec![
            Record::Track(Track::new(1).with_deck(1).with_updated_at(10)),
            Record::Track(Track::new(2).with_deck(2).with_updated_at(10)),
            Record::Track(Track::new(1).with_deck(1).with_played(true).with_updated_at(10)),
        ]);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].rows(), vec![1, 2]);
        assert!(diffs[0].iter().find(|t| t.row == 1).unwrap().played);
    }

    #[test]
    fn test_tail_delete_withdraws_row_from_read() {
        let mut source = TailSource::new("unused");
        let diffs = source.batch(vec![
            Record::Track(Track::new(1).with_updated_at(10)),
            Record::Track(Track::new(2).with_updated_at(10)),
            Record::Tombstone(crate::session::record::Tombstone { row: 1 }),
        ]);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].rows(), vec![2]);
    }

    #[test]
    fn test_tail_skips_rows_already_known() {
        let mut source = TailSource::new("unused");
        source.batch(vec![Record::Track(Track::new(1).with_updated_at(5))]);
        let diffs = source.batch(vec![Record::Track(Track::new(1).with_updated_at(5))]);
        assert!(diffs.is_empty());
    }
}
