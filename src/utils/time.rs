// src/utils/time.rs
//! Injectable clock used to bound the driver's busy-wait loops

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time source for deadline checks, injectable for testing
pub trait TimeProvider: Send + Sync {
    /// Current time in nanoseconds since an arbitrary epoch
    fn now_nanos(&self) -> u64;

    /// Current time in milliseconds since the same epoch
    fn now_millis(&self) -> u64 {
        self.now_nanos() / 1_000_000
    }
}

/// Time provider backed by the system clock
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_nanos(&self) -> u64 {
        current_timestamp_nanos()
    }
}

/// Deterministic time provider for tests
///
/// Time only moves when the test says so, either explicitly via
/// [`advance_by`](MockTimeProvider::advance_by) or implicitly by a fixed step
/// per observation, which lets a test drive a poll loop to its deadline
/// without sleeping.
pub struct MockTimeProvider {
    current: AtomicU64,
    step_per_read: u64,
}

impl MockTimeProvider {
    /// Create a mock clock starting at `initial_nanos`
    pub fn new(initial_nanos: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_nanos),
            step_per_read: 0,
        }
    }

    /// Advance the clock by `step` on every `now_nanos` call
    pub fn with_auto_advance(mut self, step: Duration) -> Self {
        self.step_per_read = step.as_nanos() as u64;
        self
    }

    /// Move the clock forward
    pub fn advance_by(&self, delta: Duration) {
        self.current
            .fetch_add(delta.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Set the clock to an absolute value
    pub fn set_nanos(&self, nanos: u64) {
        self.current.store(nanos, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_nanos(&self) -> u64 {
        if self.step_per_read == 0 {
            self.current.load(Ordering::Relaxed)
        } else {
            self.current.fetch_add(self.step_per_read, Ordering::Relaxed) + self.step_per_read
        }
    }
}

/// Nanoseconds since the unix epoch from the system clock
pub fn current_timestamp_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
