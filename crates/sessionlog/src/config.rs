//! Follower configuration.
//!
//! Every key is optional; missing keys fall back to the built-in defaults.
//!
//! ```toml
//! now_playing_threshold_secs = 30
//! scrobble_divisor = 2
//! poll_mode = "tail"
//! tick_interval_secs = 1
//! ```
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::scrobble::model::{
    DEFAULT_NOW_PLAYING_THRESHOLD, DEFAULT_SCROBBLE_DIVISOR, Thresholds,
};

/// How the follower reads the session file on each poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollMode {
    /// Decode only appended bytes.
    #[default]
    Tail,
    /// Reread the whole file and diff against the previous read.
    Reread,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub now_playing_threshold_secs: u64,
    pub scrobble_divisor: u64,
    pub poll_mode: PollMode,
    pub tick_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            now_playing_threshold_secs: DEFAULT_NOW_PLAYING_THRESHOLD,
            scrobble_divisor: DEFAULT_SCROBBLE_DIVISOR,
            poll_mode: PollMode::default(),
            tick_interval_secs: 1,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            now_playing_secs: self.now_playing_threshold_secs,
            scrobble_divisor: self.scrobble_divisor.max(1),
        }
    }
}
