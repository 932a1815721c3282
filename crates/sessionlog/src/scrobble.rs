//! Now-playing selection and scrobble timing.
pub mod model;
pub mod now_playing;

pub use model::{ScrobbleTrackModel, Thresholds};
pub use now_playing::{NowPlayingModel, Notification};
