//! Tick sources driving the follower loop.
//!
//! Each tick reports how many seconds of playback it stands for. The three
//! sources differ only in cadence; the follower treats them the same.
use std::io::BufRead;
use std::thread;
use std::time::Duration;

use tracing::trace;

pub trait TickSource {
    /// Wait for the next tick and return the seconds it represents, or
    /// `None` once the source is exhausted.
    fn next_tick(&mut self) -> Option<u64>;
}

/// Real-time ticks: sleeps for `interval` before each one.
///
/// Whole seconds are reported; the fractional part of the interval carries
/// over, so a 500 ms interval reports 1 s on every second tick.
#[derive(Debug, Clone)]
pub struct IntervalTicks {
    interval: Duration,
    carry: Duration,
}

impl IntervalTicks {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            carry: Duration::ZERO,
        }
    }

    pub fn every_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs.max(1)))
    }

    /// Account for one elapsed interval and return the whole seconds due.
    fn advance(&mut self) -> u64 {
        let total = self.carry + self.interval;
        let seconds = total.as_secs();
        self.carry = total - Duration::from_secs(seconds);
        seconds
    }
}

impl TickSource for IntervalTicks {
    fn next_tick(&mut self) -> Option<u64> {
        thread::sleep(self.interval);
        Some(self.advance())
    }
}

/// Replays a fixed number of ticks without waiting.
#[derive(Debug, Clone)]
pub struct InstantTicks {
    remaining: usize,
    seconds: u64,
}

impl InstantTicks {
    pub fn new(count: usize, seconds: u64) -> Self {
        Self {
            remaining: count,
            seconds,
        }
    }
}

impl TickSource for InstantTicks {
    fn next_tick(&mut self) -> Option<u64> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.seconds)
    }
}

/// One tick per input line, for stepping through a session by hand.
///
/// A line holding a number ticks that many seconds; any other line ticks
/// the default.
#[derive(Debug)]
pub struct ManualTicks<R> {
    input: R,
    seconds: u64,
}

impl<R: BufRead> ManualTicks<R> {
    pub fn new(input: R, seconds: u64) -> Self {
        Self { input, seconds }
    }
}

impl<R: BufRead> TickSource for ManualTicks<R> {
    fn next_tick(&mut self) -> Option<u64> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let seconds = line.trim().parse().unwrap_or(self.seconds);
                trace!("manual tick {}s", seconds);
                Some(seconds)
            }
        }
    }
}

impl<T: TickSource + ?Sized> TickSource for Box<T> {
    fn next_tick(&mut self) -> Option<u64> {
        (**self).next_tick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_ticks_are_bounded() {
        let mut ticks = InstantTicks::new(2, 5);
        assert_eq!(ticks.next_tick(), Some(5));
        assert_eq!(ticks.next_tick(), Some(5));
        assert_eq!(ticks.next_tick(), None);
    }

    #[test]
    fn test_manual_ticks_per_line() {
        let mut ticks = ManualTicks::new(&b"\n30\nx\n"[..], 1);
        assert_eq!(ticks.next_tick(), Some(1));
        assert_eq!(ticks.next_tick(), Some(30));
        assert_eq!(ticks.next_tick(), Some(1));
        assert_eq!(ticks.next_tick(), None);
    }

    #[test]
    fn test_interval_ticks_report_interval() {
        let mut ticks = IntervalTicks::new(Duration::from_millis(1));
        assert_eq!(ticks.next_tick(), Some(0));
        assert_eq!(IntervalTicks::every_secs(0).advance(), 1);
    }

    #[test]
    fn test_sub_second_interval_carries_fraction() {
        let mut ticks = IntervalTicks::new(Duration::from_millis(400));
        let reported: Vec<u64> = (0..5).map(|_| ticks.advance()).collect();
        assert_eq!(reported, vec![0, 0, 1, 0, 1]);

        let mut ticks = IntervalTicks::new(Duration::from_millis(1500));
        let total: u64 = (0..4).map(|_| ticks.advance()).sum();
        assert_eq!(total, 6);
    }
}
