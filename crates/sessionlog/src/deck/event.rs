//! Track-change events emitted by the deck layer.
use crate::session::record::{DeckId, Track};

/// What happened to the track on one deck during one diff.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackChange {
    /// The track left the deck (played out or skipped).
    Stopped { deck: DeckId, track: Track },
    /// A different track became current on the deck.
    Started { deck: DeckId, track: Track },
    /// The current track was rewritten with new values.
    Updated { deck: DeckId, track: Track },
}

impl TrackChange {
    pub fn deck(&self) -> DeckId {
        match self {
            TrackChange::Stopped { deck, .. }
            | TrackChange::Started { deck, .. }
            | TrackChange::Updated { deck, .. } => *deck,
        }
    }

    pub fn track(&self) -> &Track {
        match self {
            TrackChange::Stopped { track, .. }
            | TrackChange::Started { track, .. }
            | TrackChange::Updated { track, .. } => track,
        }
    }

    /// Lowercase event name, for logs and tools.
    pub fn kind(&self) -> &'static str {
        match self {
            TrackChange::Stopped { .. } => "stopped",
            TrackChange::Started { .. } => "started",
            TrackChange::Updated { .. } => "updated",
        }
    }
}

/// Per-deck outcome of applying one diff.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeckChange {
    pub stopped: Option<Track>,
    pub started: Option<Track>,
    pub updated: Option<Track>,
}

impl DeckChange {
    pub fn is_empty(&self) -> bool {
        self.stopped.is_none() && self.started.is_none() && self.updated.is_none()
    }

    /// Events in delivery order: stopped, started, updated.
    pub fn into_events(self, deck: DeckId) -> Vec<TrackChange> {
        let mut events = Vec::new();
        if let Some(track) = self.stopped {
            events.push(TrackChange::Stopped { deck, track });
        }
        if let Some(track) = self.started {
            events.push(TrackChange::Started { deck, track });
        }
        if let Some(track) = self.updated {
            events.push(TrackChange::Updated { deck, track });
        }
        events
    }
}
