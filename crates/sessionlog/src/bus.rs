//! Typed listener lists for everything the follower reports.
//!
//! Listeners are registered once and called synchronously, in registration
//! order. A listener that talks to the network should queue the work and
//! return.
use crate::deck::event::TrackChange;
use crate::scrobble::now_playing::Notification;
use crate::session::record::Track;

/// Receives every batch of deck events produced by one diff.
pub trait TrackChangeListener {
    fn on_track_changes(&mut self, batch: &[TrackChange]);
}

/// Receives now-playing selection changes; `None` means nothing is playing.
pub trait NowPlayingListener {
    fn on_now_playing(&mut self, track: Option<&Track>);
}

/// Receives tracks that qualified for submission when they stopped.
pub trait ScrobbleListener {
    fn on_scrobble(&mut self, track: &Track);
}

impl<F: FnMut(&[TrackChange])> TrackChangeListener for F {
    fn on_track_changes(&mut self, batch: &[TrackChange]) {
        self(batch)
    }
}

impl<F: FnMut(Option<&Track>)> NowPlayingListener for F {
    fn on_now_playing(&mut self, track: Option<&Track>) {
        self(track)
    }
}

impl<F: FnMut(&Track)> ScrobbleListener for F {
    fn on_scrobble(&mut self, track: &Track) {
        self(track)
    }
}

#[derive(Default)]
pub struct EventBus {
    track_changes: Vec<Box<dyn TrackChangeListener>>,
    now_playing: Vec<Box<dyn NowPlayingListener>>,
    scrobbles: Vec<Box<dyn ScrobbleListener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_track_changes<L: TrackChangeListener + 'static>(&mut self, listener: L) {
        self.track_changes.push(Box::new(listener));
    }

    pub fn on_now_playing<L: NowPlayingListener + 'static>(&mut self, listener: L) {
        self.now_playing.push(Box::new(listener));
    }

    pub fn on_scrobble<L: ScrobbleListener + 'static>(&mut self, listener: L) {
        self.scrobbles.push(Box::new(listener));
    }

    /// Deliver one batch. Empty batches are not delivered.
    pub fn publish_changes(&mut self, batch: &[TrackChange]) {
        if batch.is_empty() {
            return;
        }
        for listener in &mut self.track_changes {
            listener.on_track_changes(batch);
        }
    }

    pub fn publish(&mut self, notifications: &[Notification]) {
        for notification in notifications {
            match notification {
                Notification::NowPlaying(track) => {
                    for listener in &mut self.now_playing {
                        listener.on_now_playing(track.as_ref());
                    }
                }
                Notification::Scrobble(track) => {
                    for listener in &mut self.scrobbles {
                        listener.on_scrobble(track);
                    }
                }
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.track_changes.len() + self.now_playing.len() + self.scrobbles.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("track_changes", &self.track_changes.len())
            .field("now_playing", &self.now_playing.len())
            .field("scrobbles", &self.scrobbles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_listeners_called_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        for name in ["first", "second"] {
            let log = Rc::clone(&log);
            bus.on_now_playing(move |track: Option<&Track>| {
                log.borrow_mut().push((name, track.map(|t| t.row)));
            });
        }
        bus.publish(&[
            Notification::NowPlaying(Some(Track::new(4))),
            Notification::NowPlaying(None),
        ]);
        assert_eq!(
            *log.borrow(),
            vec![
                ("first", Some(4)),
                ("second", Some(4)),
                ("first", None),
                ("second", None)
            ]
        );
    }

    #[test]
    fn test_empty_change_batch_not_delivered() {
        let calls = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        let counter = Rc::clone(&calls);
        bus.on_track_changes(move |_: &[TrackChange]| *counter.borrow_mut() += 1);
        bus.publish_changes(&[]);
        assert_eq!(*calls.borrow(), 0);
    }
}
