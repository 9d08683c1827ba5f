//! Monotonic time source
//!
//! The engine never reads the wall clock. Everything that needs a
//! timestamp receives a [`Clock`] at construction, which keeps the rate
//! windows in risk and the staleness math in the feature engine
//! deterministic under test.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::core::types::Nanos;

/// Nanosecond monotonic time source.
pub trait Clock: Send + Sync {
    /// Nanoseconds since this clock's epoch. Must never go backwards.
    fn now_ns(&self) -> Nanos;
}

/// Production clock: `Instant` measured against a process-start epoch.
#[derive(Debug)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline(always)]
    fn now_ns(&self) -> Nanos {
        self.epoch.elapsed().as_nanos() as Nanos
    }
}

/// Manually stepped clock for tests and deterministic replay.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ns: Nanos) -> Self {
        Self {
            now: AtomicU64::new(start_ns),
        }
    }

    pub fn set(&self, ns: Nanos) {
        self.now.store(ns, Ordering::Release);
    }

    pub fn advance(&self, delta_ns: Nanos) {
        self.now.fetch_add(delta_ns, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    #[inline(always)]
    fn now_ns(&self) -> Nanos {
        self.now.load(Ordering::Acquire)
    }
}
