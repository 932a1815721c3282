//! Now-playing arbitration across every loaded track.
//!
//! Several decks can hold a track at once. The model keeps them in load
//! order and picks one as "now playing":
//!
//! 1. the first track past the now-playing threshold and short of the
//!    scrobble threshold;
//! 2. otherwise the first track whose row is not older than the current
//!    selection;
//! 3. otherwise the first track;
//! 4. otherwise nothing, announced once as `NowPlaying(None)`.
//!
//! A notification goes out only when the selected row changes.
use tracing::debug;

use crate::deck::event::TrackChange;
use crate::error::{Error, Result};
use crate::scrobble::model::{ScrobbleTrackModel, Thresholds};
use crate::session::record::{RowId, Track};

/// Output of the arbitration model.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    NowPlaying(Option<Track>),
    Scrobble(Track),
}

#[derive(Debug, Clone, Default)]
pub struct NowPlayingModel {
    queue: Vec<ScrobbleTrackModel>,
    selected_row: Option<RowId>,
    /// Row carried by the last `NowPlaying` notification.
    announced_row: Option<RowId>,
    thresholds: Thresholds,
}

impl NowPlayingModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            ..Self::default()
        }
    }

    pub fn queue(&self) -> &[ScrobbleTrackModel] {
        &self.queue
    }

    pub fn selected_row(&self) -> Option<RowId> {
        self.selected_row
    }

    /// The currently selected track.
    pub fn now_playing(&self) -> Option<&Track> {
        let row = self.selected_row?;
        self.position(row).map(|i| self.queue[i].track())
    }

    fn position(&self, row: RowId) -> Option<usize> {
        self.queue.iter().position(|m| m.track().row == row)
    }

    /// Apply one batch of track changes, then arbitrate.
    pub fn apply(&mut self, events: &[TrackChange]) -> Result<Vec<Notification>> {
        let mut notifications = Vec::new();
        for event in events {
            match event {
                TrackChange::Started { track, .. } => {
                    if self.position(track.row).is_none() {
                        self.queue
                            .push(ScrobbleTrackModel::with_thresholds(track.clone(), self.thresholds));
                    }
                }
                TrackChange::Stopped { track, .. } => {
                    let Some(i) = self.position(track.row) else {
                        continue;
                    };
                    let mut model = self.queue.remove(i);
                    model.update(track.clone());
                    if model.is_scrobblable() {
                        debug!(
                            "scrobble row {} after {}s",
                            track.row,
                            model.elapsed_seconds()
                        );
                        notifications.push(Notification::Scrobble(model.track().clone()));
                    }
                    if self.selected_row == Some(track.row) {
                        self.selected_row = None;
                    }
                }
                TrackChange::Updated { track, .. } => {
                    if let Some(i) = self.position(track.row) {
                        self.queue[i].update(track.clone());
                    }
                }
            }
        }
        notifications.extend(self.tick(0)?);
        Ok(notifications)
    }

    /// Advance every queued track by `seconds`, then arbitrate.
    pub fn tick(&mut self, seconds: u64) -> Result<Vec<Notification>> {
        for model in &mut self.queue {
            model.elapse(seconds);
        }
        let notifications = self.arbitrate();
        self.check_invariants()?;
        Ok(notifications)
    }

    fn arbitrate(&mut self) -> Vec<Notification> {
        let previous = self.selected_row;
        let selected = self
            .queue
            .iter()
            .find(|m| m.is_now_playing())
            .or_else(|| {
                previous.and_then(|prev| self.queue.iter().find(|m| m.track().row >= prev))
            })
            .or_else(|| self.queue.first())
            .map(|m| m.track().row);
        self.selected_row = selected;

        if selected == self.announced_row {
            return Vec::new();
        }
        self.announced_row = selected;
        debug!("now playing row {:?}", selected);
        vec![Notification::NowPlaying(self.now_playing().cloned())]
    }

    fn check_invariants(&self) -> Result<()> {
        for (i, model) in self.queue.iter().enumerate() {
            let row = model.track().row;
            if self.queue[i + 1..].iter().any(|m| m.track().row == row) {
                return Err(Error::QueueInvariant(format!("row {row} queued twice")));
            }
        }
        if let Some(row) = self.selected_row
            && self.position(row).is_none()
        {
            return Err(Error::QueueInvariant(format!(
                "selected row {row} is not queued"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(row: RowId) -> Track {
        Track::new(row).with_deck(row).with_length("05:00")
    }

    fn started(t: &Track) -> TrackChange {
        TrackChange::Started {
            deck: t.deck.unwrap_or_default(),
            track: t.clone(),
        }
    }

    fn stopped(t: &Track) -> TrackChange {
        TrackChange::Stopped {
            deck: t.deck.unwrap_or_default(),
            track: t.clone(),
        }
    }

    #[test]
    fn test_started_twice_is_queued_once() {
        let mut model = NowPlayingModel::new();
        let a = track(1);
        model.apply(&[started(&a)]).unwrap();
        model.apply(&[started(&a)]).unwrap();
        assert_eq!(model.queue().len(), 1);
    }

    #[test]
    fn test_prefers_track_in_now_playing_window() {
        let mut model = NowPlayingModel::new();
        let a = track(1);
        let b = track(2);
        model.apply(&[started(&a)]).unwrap();
        // a runs into its scrobble window before b is loaded
        model.tick(200).unwrap();
        model.apply(&[started(&b)]).unwrap();
        assert_eq!(model.selected_row(), Some(1));

        let notes = model.tick(30).unwrap();
        assert_eq!(notes, vec![Notification::NowPlaying(Some(b.clone()))]);
    }

    #[test]
    fn test_never_regresses_to_older_row() {
        let mut model = NowPlayingModel::new();
        let a = track(1);
        let b = track(2);
        let c = track(3);
        model.apply(&[started(&a), started(&b)]).unwrap();
        model.tick(200).unwrap(); // both beyond the now-playing window
        model.apply(&[started(&c)]).unwrap();
        assert_eq!(model.selected_row(), Some(1));
        model.apply(&[stopped(&a)]).unwrap();
        // selection was cleared, so the first queued track wins
        assert_eq!(model.selected_row(), Some(2));
    }

    #[test]
    fn test_scrobble_on_stop_when_played_long_enough() {
        let mut model = NowPlayingModel::new();
        let a = track(1).with_played(true);
        model.apply(&[started(&a)]).unwrap();
        model.tick(149).unwrap();
        let ended = a.clone().with_end_time(10);
        let notes = model.apply(&[stopped(&ended)]).unwrap();
        assert!(!notes.contains(&Notification::Scrobble(ended.clone())));

        let b = track(2).with_played(true);
        model.apply(&[started(&b)]).unwrap();
        model.tick(150).unwrap();
        let ended = b.clone().with_end_time(10);
        let notes = model.apply(&[stopped(&ended)]).unwrap();
        assert_eq!(
            notes,
            vec![
                Notification::Scrobble(ended),
                Notification::NowPlaying(None)
            ]
        );
    }

    #[test]
    fn test_updated_playtime_moves_into_window() {
        let mut model = NowPlayingModel::new();
        let a = track(1);
        let b = track(2);
        model.apply(&[started(&a), started(&b)]).unwrap();
        assert_eq!(model.selected_row(), Some(1));
        let notes = model
            .apply(&[TrackChange::Updated {
                deck: 2,
                track: b.clone().with_playtime(45),
            }])
            .unwrap();
        assert_eq!(model.selected_row(), Some(2));
        assert_eq!(notes.len(), 1);
    }
}
