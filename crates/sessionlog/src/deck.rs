//! Deck tracking: turns diffs into track-change events.
pub mod event;
pub mod set;
pub mod state;

pub use event::{DeckChange, TrackChange};
pub use set::DeckSet;
pub use state::{Deck, DeckStatus};
