#![doc = include_str!("../README.md")]
//! Decoder and playback tracker for DJ session logs.
//!
//! Layers, from bytes up:
//! - `session`: chunk framing, tagged field decoding, typed records, the
//!   parsed `SessionLog` and its builder, the row-indexed `Document` with
//!   incremental diffs, and resumable tail decoding.
//! - `deck`: one playback automaton per deck; turns each diff into an
//!   ordered batch of `TrackChange` events.
//! - `scrobble`: per-track play timing and now-playing arbitration.
//! - `follow`: the poll/tick loop (`SessionFollower`) wiring the above to a
//!   file name source, a clock, a tick source and the `EventBus`.
//!
//! Example: following a file with instant ticks
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use sessionlog::{Config, FixedFile, InstantTicks, SessionFollower, SystemClock, Track};
//!
//! let mut follower = SessionFollower::new(
//!     FixedFile::new("history.session"),
//!     SystemClock,
//!     Config::default(),
//! );
//! follower.bus_mut().on_now_playing(|track: Option<&Track>| {
//!     println!("now playing: {:?}", track.map(Track::label));
//! });
//! let stop = AtomicBool::new(false);
//! follower.run(&mut InstantTicks::new(1, 0), &stop)?;
//! # Ok::<(), sessionlog::Error>(())
//! ```
mod binutil;
pub mod bus;
pub mod clock;
pub mod config;
pub mod deck;
mod error;
pub mod follow;
pub mod scrobble;
pub mod session;
pub mod tick;

pub use binutil::FormatError;
pub use bus::{EventBus, NowPlayingListener, ScrobbleListener, TrackChangeListener};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, PollMode};
pub use deck::{Deck, DeckSet, DeckStatus, TrackChange};
pub use error::{Error, Result};
pub use follow::{FilenameSource, FixedFile, SessionFollower};
pub use scrobble::{Notification, NowPlayingModel, ScrobbleTrackModel, Thresholds};
pub use session::record::{DeckId, Record, RowId, Tombstone, Track, TrackStatus};
pub use session::{
    Diff, DiffSource, Document, Entry, RereadSource, SessionBuilder, SessionLog, SessionStream,
    StreamResult, TailReader, TailSource, diff,
};
pub use tick::{InstantTicks, IntervalTicks, ManualTicks, TickSource};
