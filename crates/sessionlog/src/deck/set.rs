//! All decks of one session.
use std::collections::BTreeMap;

use tracing::trace;

use crate::clock::Clock;
use crate::deck::event::TrackChange;
use crate::deck::state::Deck;
use crate::session::document::Diff;
use crate::session::record::DeckId;

/// Decks keyed by id, created on first sight.
#[derive(Debug, Clone, Default)]
pub struct DeckSet {
    decks: BTreeMap<DeckId, Deck>,
}

impl DeckSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one diff and return its events as a single ordered batch.
    ///
    /// Decks are visited in ascending id; each contributes its stopped,
    /// started and updated events in that order. Tracks without a deck are
    /// ignored.
    pub fn apply<C: Clock + ?Sized>(&mut self, diff: &Diff, clock: &C) -> Vec<TrackChange> {
        let unassigned = diff.iter().filter(|t| t.deck.is_none()).count();
        if unassigned > 0 {
            trace!("{} rows without a deck ignored", unassigned);
        }
        let mut events = Vec::new();
        for id in diff.decks() {
            let deck = self.decks.entry(id).or_insert_with(|| Deck::new(id));
            let change = deck.apply(diff.for_deck(id), clock);
            events.extend(change.into_events(id));
        }
        events
    }

    pub fn get(&self, id: DeckId) -> Option<&Deck> {
        self.decks.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Deck> {
        self.decks.values()
    }

    pub fn len(&self) -> usize {
        self.decks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decks.is_empty()
    }

    /// Forget every deck.
    pub fn clear(&mut self) {
        self.decks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::session::record::Track;

    #[test]
    fn test_events_ordered_by_deck_then_kind() {
        let clock = ManualClock::at_epoch();
        let mut decks = DeckSet::new();
        decks.apply(
            &Diff::from_tracks(vec![
                Track::new(1).with_deck(2).with_played(true),
                Track::new(2).with_deck(1),
            ]),
            &clock,
        );

        let events = decks.apply(
            &Diff::from_tracks(vec![
                Track::new(3).with_deck(2),
                Track::new(2).with_deck(1).with_played(true),
            ]),
            &clock,
        );
        let summary: Vec<(&str, i64, i64)> = events
            .iter()
            .map(|e| (e.kind(), e.deck(), e.track().row))
            .collect();
        assert_eq!(
            summary,
            vec![("updated", 1, 2), ("stopped", 2, 1), ("started", 2, 3)]
        );
        assert_eq!(decks.len(), 2);
    }

    #[test]
    fn test_rows_without_deck_are_ignored() {
        let clock = ManualClock::at_epoch();
        let mut decks = DeckSet::new();
        let events = decks.apply(&Diff::from_tracks(vec![Track::new(1)]), &clock);
        assert!(events.is_empty());
        assert!(decks.is_empty());
    }
}
