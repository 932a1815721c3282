//! Per-track play timing.
use crate::session::record::Track;

/// Seconds a track must play before it counts as now playing.
pub const DEFAULT_NOW_PLAYING_THRESHOLD: u64 = 30;
/// A track is scrobblable after `length / divisor` seconds.
pub const DEFAULT_SCROBBLE_DIVISOR: u64 = 2;

/// Timing thresholds shared by every queued track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub now_playing_secs: u64,
    pub scrobble_divisor: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            now_playing_secs: DEFAULT_NOW_PLAYING_THRESHOLD,
            scrobble_divisor: DEFAULT_SCROBBLE_DIVISOR,
        }
    }
}

/// One loaded track and how long it has been playing.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrobbleTrackModel {
    track: Track,
    elapsed: u64,
    thresholds: Thresholds,
}

impl ScrobbleTrackModel {
    pub fn new(track: Track) -> Self {
        Self::with_thresholds(track, Thresholds::default())
    }

    pub fn with_thresholds(track: Track, thresholds: Thresholds) -> Self {
        let mut model = Self {
            track,
            elapsed: 0,
            thresholds,
        };
        model.take_playtime();
        model
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed
    }

    /// Add `seconds` of playback.
    pub fn elapse(&mut self, seconds: u64) {
        self.elapsed = self.elapsed.saturating_add(seconds);
    }

    /// Replace the track with a newer record of the same row.
    ///
    /// A reported `playtime` overrides the accumulated elapsed time.
    pub fn update(&mut self, track: Track) {
        self.track = track;
        self.take_playtime();
    }

    fn take_playtime(&mut self) {
        if let Some(playtime) = self.track.playtime {
            self.elapsed = playtime.max(0) as u64;
        }
    }

    /// Seconds after which the track may be scrobbled. Unknown length is 0.
    pub fn scrobble_threshold(&self) -> u64 {
        let divisor = self.thresholds.scrobble_divisor.max(1);
        self.track.length_seconds().map_or(0, |len| len / divisor)
    }

    pub fn is_now_playing(&self) -> bool {
        self.elapsed >= self.thresholds.now_playing_secs
            && self.elapsed < self.scrobble_threshold()
    }

    pub fn is_scrobblable(&self) -> bool {
        self.track.played && self.elapsed >= self.scrobble_threshold()
    }
}
