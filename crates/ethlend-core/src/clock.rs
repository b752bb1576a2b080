//! # Clock: Injectable Time Source
//!
//! All "now" readings in the lifecycle engine go through a [`Clock`].
//! Production code uses [`SystemClock`]; tests and the simulator drive a
//! [`ManualClock`] so that payback windows can be crossed deterministically.

use chrono::Duration;
use parking_lot::Mutex;

use crate::temporal::Timestamp;

/// Supplies the current time.
pub trait Clock: Send + Sync {
    /// The current UTC time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: Timestamp) {
        *self.now.lock() = to;
    }

    /// Move forward by `delta`. Saturates at the current time if the
    /// result would be out of range.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock();
        if let Some(next) = now.checked_add(delta) {
            *now = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}
