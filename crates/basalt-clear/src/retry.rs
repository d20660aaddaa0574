//! Bounded waiting for buckets to recover a primary.

use std::thread;
use std::time::{Duration, Instant};

/// Paces the polls of a bounded retry loop.
pub trait RetryTimer {
    /// True once the allowed time has run out.
    fn over_maximum(&self) -> bool;

    /// Pause before the next poll.
    fn wait_for_buckets_recovery(&mut self);
}

/// A [`RetryTimer`] that gives up after a fixed time from its creation.
#[derive(Debug, Clone)]
pub struct RetryTimeKeeper {
    started: Instant,
    maximum: Duration,
    interval: Duration,
    waits: u32,
}

impl RetryTimeKeeper {
    pub fn new(maximum: Duration, interval: Duration) -> Self {
        RetryTimeKeeper {
            started: Instant::now(),
            maximum,
            interval,
            waits: 0,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Number of pauses taken so far.
    pub fn waits(&self) -> u32 {
        self.waits
    }
}

impl RetryTimer for RetryTimeKeeper {
    fn over_maximum(&self) -> bool {
        self.elapsed() >= self.maximum
    }

    fn wait_for_buckets_recovery(&mut self) {
        let remaining = self.maximum.saturating_sub(self.elapsed());
        thread::sleep(self.interval.min(remaining));
        self.waits += 1;
    }
}
