//! Per-deck playback automaton.
//!
//! States: `Empty` (initial), `New`, `Playing`, `Played`, `Skipped`.
//!
//! Base transitions:
//!
//! | from                        | to        |
//! |-----------------------------|-----------|
//! | `Empty`/`Skipped`/`Played`  | `New`     |
//! | `New`                       | `Skipped` |
//! | `New`                       | `Playing` |
//! | `Playing`                   | `Played`  |
//!
//! Other pairs either decompose into a chain of base transitions (see
//! `path`) or are rejected with a warning and leave the deck untouched.
use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::deck::event::DeckChange;
use crate::session::record::{DeckId, RowId, Track, TrackStatus};

/// Playback state of one deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeckStatus {
    #[default]
    Empty,
    New,
    Playing,
    Played,
    Skipped,
}

impl From<TrackStatus> for DeckStatus {
    fn from(status: TrackStatus) -> Self {
        match status {
            TrackStatus::New => DeckStatus::New,
            TrackStatus::Playing => DeckStatus::Playing,
            TrackStatus::Played => DeckStatus::Played,
            TrackStatus::Skipped => DeckStatus::Skipped,
        }
    }
}

use DeckStatus::*;

/// Base transitions needed to go from `from` to `to`.
///
/// `None` means the pair is invalid. Same-status pairs only reach this for a
/// row other than the current one.
fn path(from: DeckStatus, to: DeckStatus) -> Option<&'static [DeckStatus]> {
    match (from, to) {
        (Empty | Skipped | Played, New) => Some(&[New]),
        (New, Skipped) => Some(&[Skipped]),
        (New, Playing) => Some(&[Playing]),
        (Playing, Played) => Some(&[Played]),
        (Empty | Skipped | Played, Playing) => Some(&[New, Playing]),
        (Empty | Skipped | Played, Played) => Some(&[New, Playing, Played]),
        (New, New) => Some(&[Skipped, New]),
        (Playing, New) => Some(&[Played, New]),
        // handled like New -> Skipped
        (Playing, Skipped) => Some(&[Skipped]),
        _ => None,
    }
}

/// One physical deck.
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    pub id: DeckId,
    pub status: DeckStatus,
    pub current_track: Option<Track>,
    pub previous_track: Option<Track>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub max_row_seen: Option<RowId>,
}

impl Deck {
    pub fn new(id: DeckId) -> Self {
        Self {
            id,
            status: Empty,
            current_track: None,
            previous_track: None,
            start_time: None,
            end_time: None,
            max_row_seen: None,
        }
    }

    fn current_row(&self) -> Option<RowId> {
        self.current_track.as_ref().map(|t| t.row)
    }

    /// Apply this deck's tracks from one diff.
    ///
    /// Tracks older than the newest row already seen are dropped; the rest
    /// are applied in ascending row order. The returned change compares the
    /// current track before and after the whole batch.
    pub fn apply<'a, I, C>(&mut self, tracks: I, clock: &C) -> DeckChange
    where
        I: IntoIterator<Item = &'a Track>,
        C: Clock + ?Sized,
    {
        let floor = self.max_row_seen;
        let mut batch: Vec<&Track> = tracks
            .into_iter()
            .filter(|t| floor.is_none_or(|max| t.row >= max))
            .collect();
        batch.sort_by_key(|t| t.row);

        let before = self.current_track.clone();
        let before_row = before.as_ref().map(|t| t.row);
        let mut leaving = None;
        for track in batch {
            if Some(track.row) == before_row {
                leaving = Some(track);
            }
            self.apply_track(track, clock);
            self.max_row_seen = Some(self.max_row_seen.map_or(track.row, |m| m.max(track.row)));
        }

        let after = self.current_track.as_ref();
        let after_row = after.map(|t| t.row);
        let mut change = DeckChange::default();
        if before_row != after_row {
            if let Some(before) = before {
                change.stopped = Some(leaving.cloned().unwrap_or(before));
            }
            change.started = after.cloned();
        } else if let (Some(before), Some(after)) = (before.as_ref(), after)
            && before != after
        {
            change.updated = Some(after.clone());
        }
        change
    }

    /// Feed one record through the automaton.
    pub fn apply_track<C: Clock + ?Sized>(&mut self, track: &Track, clock: &C) {
        let to = DeckStatus::from(track.status());
        if to == self.status && self.current_row() == Some(track.row) {
            trace!("deck {}: refresh row {}", self.id, track.row);
            self.current_track = Some(track.clone());
            return;
        }
        if to == self.status
            && matches!(to, Played | Skipped)
            && self.max_row_seen.is_some_and(|max| track.row <= max)
        {
            trace!("deck {}: row {} already ended", self.id, track.row);
            if self.previous_track.as_ref().map(|t| t.row) == Some(track.row) {
                self.previous_track = Some(track.clone());
            }
            return;
        }
        let Some(steps) = path(self.status, to) else {
            warn!(
                "deck {}: invalid transition {:?} -> {:?} for row {}",
                self.id, self.status, to, track.row
            );
            return;
        };
        for &step in steps {
            self.step(step, track, clock);
        }
    }

    fn step<C: Clock + ?Sized>(&mut self, to: DeckStatus, track: &Track, clock: &C) {
        debug!("deck {}: {:?} -> {:?} (row {})", self.id, self.status, to, track.row);
        match to {
            New => {
                self.start_time = Some(clock.now());
                self.end_time = None;
                self.current_track = Some(track.clone());
            }
            Playing => {
                self.current_track = Some(track.clone());
            }
            Played => {
                self.end_time = Some(clock.now());
                let current = self.current_track.take();
                self.previous_track = if current.as_ref().map(|t| t.row) == Some(track.row) {
                    Some(track.clone())
                } else {
                    current
                };
            }
            Skipped => {
                self.end_time = Some(clock.now());
                self.current_track = None;
            }
            Empty => {}
        }
        self.status = to;
    }
}
