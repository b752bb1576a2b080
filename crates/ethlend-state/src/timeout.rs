//! # Timeout Clock
//!
//! Remaining time in a time-bounded state, computed from a single window
//! start and a fixed configured duration:
//!
//! ```text
//! remaining = max(0, duration - (now - window_start))
//! ```
//!
//! The computation is plain subtraction floored at zero. It never goes
//! negative and never wraps back to a full window once elapsed time passes
//! the duration. Evaluation is lazy: nothing runs in the background, and a
//! restart loses nothing as long as the window start is persisted.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ethlend_core::Timestamp;

/// Error starting a timeout window.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeoutError {
    /// `start` was called on a running window without an intervening `reset`.
    #[error("timeout window already started at {started_at}")]
    WindowAlreadyStarted {
        /// When the running window started.
        started_at: Timestamp,
    },
}

/// Start of a time-bounded window, if one is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutClock {
    window_start: Option<Timestamp>,
}

impl TimeoutClock {
    /// Record the window start. The first call wins.
    ///
    /// # Errors
    ///
    /// Returns [`TimeoutError::WindowAlreadyStarted`] if a window is
    /// running. Call [`reset`](Self::reset) first when re-entering a timed
    /// state.
    pub fn start(&mut self, at: Timestamp) -> Result<(), TimeoutError> {
        if let Some(started_at) = self.window_start {
            return Err(TimeoutError::WindowAlreadyStarted { started_at });
        }
        self.window_start = Some(at);
        Ok(())
    }

    /// Clear the window so it can be started again.
    pub fn reset(&mut self) {
        self.window_start = None;
    }

    /// When the running window started.
    pub fn window_start(&self) -> Option<Timestamp> {
        self.window_start
    }

    /// Whether a window is running.
    pub fn is_started(&self) -> bool {
        self.window_start.is_some()
    }

    /// Time left in the window at `now`; zero once expired or if no
    /// window is running.
    pub fn remaining(&self, now: Timestamp, duration: Duration) -> Duration {
        let Some(start) = self.window_start else {
            return Duration::zero();
        };
        let left = duration - now.since(start);
        if left < Duration::zero() {
            Duration::zero()
        } else {
            left
        }
    }

    /// Whether a running window has no time left at `now`.
    pub fn has_expired(&self, now: Timestamp, duration: Duration) -> bool {
        self.is_started() && self.remaining(now, duration) == Duration::zero()
    }

    /// The instant the window runs out.
    pub fn deadline(&self, duration: Duration) -> Option<Timestamp> {
        self.window_start.and_then(|start| start.checked_add(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> Timestamp {
        Timestamp::parse("2026-04-01T00:00:00Z").unwrap()
    }

    fn after(delta: Duration) -> Timestamp {
        t0().checked_add(delta).unwrap()
    }

    #[test]
    fn start_then_start_again_fails() {
        let mut clock = TimeoutClock::default();
        clock.start(t0()).unwrap();
        let err = clock.start(after(Duration::hours(1))).unwrap_err();
        assert_eq!(err, TimeoutError::WindowAlreadyStarted { started_at: t0() });
        assert_eq!(clock.window_start(), Some(t0()));
    }

    #[test]
    fn reset_allows_restart() {
        let mut clock = TimeoutClock::default();
        clock.start(t0()).unwrap();
        clock.reset();
        assert!(!clock.is_started());
        clock.start(after(Duration::days(2))).unwrap();
        assert_eq!(clock.window_start(), Some(after(Duration::days(2))));
    }

    #[test]
    fn remaining_counts_down() {
        let mut clock = TimeoutClock::default();
        clock.start(t0()).unwrap();
        let window = Duration::days(10);
        assert_eq!(clock.remaining(t0(), window), window);
        assert_eq!(
            clock.remaining(after(Duration::days(3)), window),
            Duration::days(7)
        );
    }

    #[test]
    fn remaining_floors_at_zero_instead_of_wrapping() {
        let mut clock = TimeoutClock::default();
        clock.start(t0()).unwrap();
        let window = Duration::minutes(1440);
        // Elapsed time well past the window would wrap under a modulo computation.
        for elapsed in [1440, 1441, 2000, 2880, 2881, 100_000] {
            assert_eq!(
                clock.remaining(after(Duration::minutes(elapsed)), window),
                Duration::zero()
            );
        }
    }

    #[test]
    fn expiry_boundary() {
        let mut clock = TimeoutClock::default();
        clock.start(t0()).unwrap();
        let window = Duration::days(10);
        assert!(!clock.has_expired(after(window - Duration::seconds(1)), window));
        assert!(clock.has_expired(after(window), window));
        assert!(clock.has_expired(after(window + Duration::seconds(1)), window));
    }

    #[test]
    fn unstarted_window_never_expires() {
        let clock = TimeoutClock::default();
        assert!(!clock.has_expired(t0(), Duration::days(1)));
        assert_eq!(clock.remaining(t0(), Duration::days(1)), Duration::zero());
        assert_eq!(clock.deadline(Duration::days(1)), None);
    }

    #[test]
    fn clock_stepping_backwards_does_not_extend_window() {
        let mut clock = TimeoutClock::default();
        clock.start(t0()).unwrap();
        let earlier = Timestamp::parse("2026-03-31T00:00:00Z").unwrap();
        let window = Duration::days(10);
        assert_eq!(clock.remaining(earlier, window), window);
    }

    #[test]
    fn deadline_is_start_plus_duration() {
        let mut clock = TimeoutClock::default();
        clock.start(t0()).unwrap();
        assert_eq!(
            clock.deadline(Duration::days(10)).unwrap().to_iso8601(),
            "2026-04-11T00:00:00Z"
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn remaining_is_non_increasing_and_non_negative(
                window_secs in 1i64..10_000_000,
                mut offsets in proptest::collection::vec(0i64..50_000_000, 1..30),
            ) {
                let mut clock = TimeoutClock::default();
                clock.start(t0()).unwrap();
                let window = Duration::seconds(window_secs);
                offsets.sort_unstable();
                let mut previous = window;
                for offset in offsets {
                    let left = clock.remaining(after(Duration::seconds(offset)), window);
                    prop_assert!(left >= Duration::zero());
                    prop_assert!(left <= previous);
                    previous = left;
                }
            }
        }
    }
}
