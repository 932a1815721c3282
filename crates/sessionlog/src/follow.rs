//! The poll/tick loop tying decoding, decks and now-playing together.
//!
//! `SessionFollower` is the composition root: it owns the diff source for
//! the file currently followed, the deck set, the now-playing model and the
//! event bus, and receives its clock and file name source from the caller.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::clock::Clock;
use crate::config::{Config, PollMode};
use crate::deck::set::DeckSet;
use crate::error::{Error, Result};
use crate::scrobble::now_playing::{Notification, NowPlayingModel};
use crate::session::source::{DiffSource, RereadSource, TailSource};
use crate::tick::TickSource;

/// Tells the follower which session file to read.
pub trait FilenameSource {
    /// Path to follow right now, `None` if there is none yet.
    fn current(&mut self) -> Option<PathBuf>;
}

/// Always the same file.
#[derive(Debug, Clone)]
pub struct FixedFile(PathBuf);

impl FixedFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self(path.as_ref().to_path_buf())
    }
}

impl FilenameSource for FixedFile {
    fn current(&mut self) -> Option<PathBuf> {
        Some(self.0.clone())
    }
}

impl<F: FnMut() -> Option<PathBuf>> FilenameSource for F {
    fn current(&mut self) -> Option<PathBuf> {
        self()
    }
}

pub struct SessionFollower<F, C> {
    filenames: F,
    clock: C,
    config: Config,
    source: Option<Box<dyn DiffSource>>,
    decks: DeckSet,
    now_playing: NowPlayingModel,
    bus: EventBus,
}

impl<F: FilenameSource, C: Clock> SessionFollower<F, C> {
    pub fn new(filenames: F, clock: C, config: Config) -> Self {
        let now_playing = NowPlayingModel::with_thresholds(config.thresholds());
        Self {
            filenames,
            clock,
            config,
            source: None,
            decks: DeckSet::new(),
            now_playing,
            bus: EventBus::new(),
        }
    }

    /// Register listeners here before the first poll.
    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn decks(&self) -> &DeckSet {
        &self.decks
    }

    pub fn now_playing(&self) -> &NowPlayingModel {
        &self.now_playing
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path of the file being followed.
    pub fn path(&self) -> Option<&Path> {
        self.source.as_ref().map(|s| s.path())
    }

    fn open_source(&self, path: PathBuf) -> Box<dyn DiffSource> {
        match self.config.poll_mode {
            PollMode::Tail => Box::new(TailSource::new(path)),
            PollMode::Reread => Box::new(RereadSource::new(path)),
        }
    }

    /// Start over on `path`, dropping every deck and queued track.
    fn switch_to(&mut self, path: PathBuf) {
        info!("following {}", path.display());
        let had_selection = self.now_playing.selected_row().is_some();
        self.decks.clear();
        self.now_playing = NowPlayingModel::with_thresholds(self.config.thresholds());
        if had_selection {
            self.bus.publish(&[Notification::NowPlaying(None)]);
        }
        self.source = Some(self.open_source(path));
    }

    /// Read whatever changed in the session file and deliver the resulting
    /// events. Returns the number of track-change events produced.
    pub fn poll(&mut self) -> Result<usize> {
        let Some(path) = self.filenames.current() else {
            return Ok(0);
        };
        if self.path() != Some(path.as_path()) {
            self.switch_to(path);
        }
        let Some(source) = self.source.as_mut() else {
            return Ok(0);
        };
        let diffs = source.poll()?;

        let mut produced = 0;
        for diff in &diffs {
            let events = self.decks.apply(diff, &self.clock);
            if events.is_empty() {
                continue;
            }
            debug!("{} events from {} changed rows", events.len(), diff.len());
            produced += events.len();
            self.bus.publish_changes(&events);
            let notifications = self.now_playing.apply(&events)?;
            self.bus.publish(&notifications);
        }
        Ok(produced)
    }

    /// Advance playback time by `seconds`.
    pub fn tick(&mut self, seconds: u64) -> Result<()> {
        let notifications = self.now_playing.tick(seconds)?;
        self.bus.publish(&notifications);
        Ok(())
    }

    /// Poll, wait for a tick, repeat, until the tick source runs dry or
    /// `stop` is set.
    ///
    /// Decode and I/O errors are logged and retried on the next poll (the
    /// writer may be mid-append). A queue invariant violation ends the loop.
    pub fn run<T: TickSource + ?Sized>(&mut self, ticks: &mut T, stop: &AtomicBool) -> Result<()> {
        loop {
            if stop.load(Ordering::Relaxed) {
                info!("stop requested");
                return Ok(());
            }
            match self.poll() {
                Ok(_) => {}
                Err(Error::Format(e)) => warn!("skipping poll: {}", e),
                Err(Error::Io(e)) => warn!("skipping poll: {}", e),
                Err(e) => return Err(e),
            }
            let Some(seconds) = ticks.next_tick() else {
                return Ok(());
            };
            self.tick(seconds)?;
        }
    }
}

impl<F, C> std::fmt::Debug for SessionFollower<F, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFollower")
            .field("config", &self.config)
            .field("path", &self.source.as_ref().map(|s| s.path().to_path_buf()))
            .field("decks", &self.decks.len())
            .field("queued", &self.now_playing.queue().len())
            .field("bus", &self.bus)
            .finish()
    }
}
