//! Time-based suppression gates.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Opens once `period` has elapsed since the last mark. Never marked means open.
///
/// Uses the monotonic clock; state lives only for the process lifetime.
#[derive(Debug)]
pub struct CooldownGate {
    period: Duration,
    last: Mutex<Option<Instant>>,
}

impl CooldownGate {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Instant>> {
        self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn open_since(last: Option<Instant>, period: Duration, now: Instant) -> bool {
        match last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= period,
        }
    }

    pub fn is_open_at(&self, now: Instant) -> bool {
        Self::open_since(*self.lock(), self.period, now)
    }

    /// Record a successful trigger at `now`.
    pub fn mark_at(&self, now: Instant) {
        *self.lock() = Some(now);
    }

    /// Check and mark in one step. Returns whether the gate was open.
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut last = self.lock();
        if Self::open_since(*last, self.period, now) {
            *last = Some(now);
            true
        } else {
            false
        }
    }

    /// Time until the gate opens, zero when already open.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        match *self.lock() {
            None => Duration::ZERO,
            Some(last) => self
                .period
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }
}
