use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::AtomicBool;

use sessionlog::{
    Config, DeckStatus, FixedFile, InstantTicks, ManualClock, ManualTicks, Notification,
    NowPlayingModel, PollMode, SessionBuilder, SessionFollower, TickSource, Track, TrackChange,
};

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Change(&'static str, i64, i64),
    NowPlaying(Option<i64>),
    Scrobble(i64),
}

type Log = Rc<RefCell<Vec<Seen>>>;

fn attach<F: sessionlog::FilenameSource>(follower: &mut SessionFollower<F, ManualClock>) -> Log {
    let seen: Log = Rc::new(RefCell::new(Vec::new()));
    let bus = follower.bus_mut();
    let s = Rc::clone(&seen);
    bus.on_track_changes(move |batch: &[TrackChange]| {
        for e in batch {
            s.borrow_mut()
                .push(Seen::Change(e.kind(), e.deck(), e.track().row));
        }
    });
    let s = Rc::clone(&seen);
    bus.on_now_playing(move |track: Option<&Track>| {
        s.borrow_mut().push(Seen::NowPlaying(track.map(|t| t.row)));
    });
    let s = Rc::clone(&seen);
    bus.on_scrobble(move |track: &Track| s.borrow_mut().push(Seen::Scrobble(track.row)));
    seen
}

fn append(path: &Path, tracks: &[Track]) {
    let mut builder = SessionBuilder::new();
    for t in tracks {
        builder.add_track(t.clone());
    }
    let bytes: Vec<u8> = builder.finalize().into();
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(&bytes).unwrap();
}

fn a() -> Track {
    Track::new(1).with_deck(1).with_title("A").with_length("05:00.00")
}

fn b() -> Track {
    Track::new(2).with_deck(2).with_title("B").with_length("05:00.00")
}

fn drain(log: &Log) -> Vec<Seen> {
    std::mem::take(&mut *log.borrow_mut())
}

fn two_deck_scenario(mode: PollMode) {
    let file = tempfile::NamedTempFile::new().unwrap();
    let config = Config {
        poll_mode: mode,
        ..Config::default()
    };
    let mut follower = SessionFollower::new(
        FixedFile::new(file.path()),
        ManualClock::at_epoch(),
        config,
    );
    let seen = attach(&mut follower);

    append(file.path(), &[a().with_updated_at(1)]);
    follower.poll().unwrap();
    assert_eq!(
        drain(&seen),
        vec![Seen::Change("started", 1, 1), Seen::NowPlaying(Some(1))]
    );

    append(file.path(), &[b().with_updated_at(2)]);
    follower.poll().unwrap();
    assert_eq!(drain(&seen), vec![Seen::Change("started", 2, 2)]);

    append(file.path(), &[a().with_end_time(100).with_updated_at(3)]);
    follower.poll().unwrap();
    assert_eq!(
        drain(&seen),
        vec![Seen::Change("stopped", 1, 1), Seen::NowPlaying(Some(2))]
    );

    append(file.path(), &[b().with_end_time(200).with_updated_at(4)]);
    follower.poll().unwrap();
    assert_eq!(
        drain(&seen),
        vec![Seen::Change("stopped", 2, 2), Seen::NowPlaying(None)]
    );
}

#[test]
fn now_playing_follows_two_decks_in_tail_mode() {
    two_deck_scenario(PollMode::Tail);
}

#[test]
fn now_playing_follows_two_decks_in_reread_mode() {
    two_deck_scenario(PollMode::Reread);
}

#[test]
fn now_playing_model_two_track_scenario() {
    let mut model = NowPlayingModel::new();
    let started = |t: Track| TrackChange::Started {
        deck: t.deck.unwrap_or_default(),
        track: t,
    };
    let stopped = |t: Track| TrackChange::Stopped {
        deck: t.deck.unwrap_or_default(),
        track: t,
    };

    assert_eq!(
        model.apply(&[started(a())]).unwrap(),
        vec![Notification::NowPlaying(Some(a()))]
    );
    assert!(model.apply(&[started(b())]).unwrap().is_empty());
    assert_eq!(
        model.apply(&[stopped(a())]).unwrap(),
        vec![Notification::NowPlaying(Some(b()))]
    );
    assert_eq!(
        model.apply(&[stopped(b())]).unwrap(),
        vec![Notification::NowPlaying(None)]
    );
}

#[test]
fn played_track_scrobbles_when_stopped() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut follower = SessionFollower::new(
        FixedFile::new(file.path()),
        ManualClock::at_epoch(),
        Config::default(),
    );
    let seen = attach(&mut follower);

    append(file.path(), &[a().with_updated_at(1)]);
    follower.poll().unwrap();
    append(file.path(), &[a().with_played(true).with_updated_at(2)]);
    follower.poll().unwrap();
    for _ in 0..5 {
        follower.tick(30).unwrap();
    }
    drain(&seen);

    append(
        file.path(),
        &[a().with_played(true).with_end_time(150).with_updated_at(3)],
    );
    follower.poll().unwrap();
    assert_eq!(
        drain(&seen),
        vec![
            Seen::Change("stopped", 1, 1),
            Seen::Scrobble(1),
            Seen::NowPlaying(None)
        ]
    );
    assert_eq!(follower.decks().get(1).unwrap().status, DeckStatus::Played);
    assert_eq!(
        follower
            .decks()
            .get(1)
            .unwrap()
            .previous_track
            .as_ref()
            .map(|t| t.row),
        Some(1)
    );
}

#[test]
fn unchanged_reread_leaves_decks_alone() {
    let file = tempfile::NamedTempFile::new().unwrap();
    append(file.path(), &[a().with_updated_at(1), b().with_played(true).with_updated_at(1)]);
    let config = Config {
        poll_mode: PollMode::Reread,
        ..Config::default()
    };
    let mut follower =
        SessionFollower::new(FixedFile::new(file.path()), ManualClock::at_epoch(), config);
    assert_eq!(follower.poll().unwrap(), 2);
    let before: Vec<_> = follower.decks().iter().cloned().collect();
    assert_eq!(follower.poll().unwrap(), 0);
    let after: Vec<_> = follower.decks().iter().cloned().collect();
    assert_eq!(before, after);
}

/// Run the same session under a tick source and record what comes out.
fn replay_with<T: TickSource>(ticks: &mut T) -> Vec<Seen> {
    let file = tempfile::NamedTempFile::new().unwrap();
    append(
        file.path(),
        &[
            a().with_played(true).with_updated_at(1),
            b().with_updated_at(1),
        ],
    );
    let mut follower = SessionFollower::new(
        FixedFile::new(file.path()),
        ManualClock::at_epoch(),
        Config::default(),
    );
    let seen = attach(&mut follower);
    follower.run(ticks, &AtomicBool::new(false)).unwrap();
    drain(&seen)
}

#[test]
fn tick_sources_are_interchangeable() {
    let instant = replay_with(&mut InstantTicks::new(3, 20));
    let manual = replay_with(&mut ManualTicks::new(&b"20\n20\n20\n"[..], 1));
    assert_eq!(instant, manual);
    // both enter the window on the second tick; a() was queued first
    assert!(instant.contains(&Seen::NowPlaying(Some(1))));
}

#[test]
fn stop_flag_ends_run_before_polling() {
    let file = tempfile::NamedTempFile::new().unwrap();
    append(file.path(), &[a().with_updated_at(1)]);
    let mut follower = SessionFollower::new(
        FixedFile::new(file.path()),
        ManualClock::at_epoch(),
        Config::default(),
    );
    let seen = attach(&mut follower);
    follower
        .run(&mut InstantTicks::new(10, 1), &AtomicBool::new(true))
        .unwrap();
    assert!(drain(&seen).is_empty());
}

#[test]
fn switching_files_resets_decks() {
    let first = tempfile::NamedTempFile::new().unwrap();
    let second = tempfile::NamedTempFile::new().unwrap();
    append(first.path(), &[a().with_updated_at(1)]);
    append(
        second.path(),
        &[Track::new(1).with_deck(1).with_title("other").with_updated_at(1)],
    );

    let current: Rc<RefCell<PathBuf>> = Rc::new(RefCell::new(first.path().to_path_buf()));
    let chooser = Rc::clone(&current);
    let mut follower = SessionFollower::new(
        move || Some(chooser.borrow().clone()),
        ManualClock::at_epoch(),
        Config::default(),
    );
    let seen = attach(&mut follower);

    follower.poll().unwrap();
    assert_eq!(follower.path(), Some(first.path()));
    drain(&seen);

    *current.borrow_mut() = second.path().to_path_buf();
    follower.poll().unwrap();
    assert_eq!(follower.path(), Some(second.path()));
    assert_eq!(
        drain(&seen),
        vec![
            Seen::NowPlaying(None),
            Seen::Change("started", 1, 1),
            Seen::NowPlaying(Some(1))
        ]
    );
    let deck = follower.decks().get(1).unwrap();
    assert_eq!(
        deck.current_track.as_ref().and_then(|t| t.title.as_deref()),
        Some("other")
    );
}

#[test]
fn missing_file_is_retried_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not-yet.session");
    let mut follower = SessionFollower::new(
        FixedFile::new(&path),
        ManualClock::at_epoch(),
        Config::default(),
    );
    assert!(follower.poll().is_err());
    follower
        .run(&mut InstantTicks::new(2, 1), &AtomicBool::new(false))
        .unwrap();
}
