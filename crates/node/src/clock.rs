// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Millisecond clocks: the real wall clock and the per-tick cached clock.
//!
//! The sequencer reads the real clock exactly once per tick and publishes the
//! value through [`CachedClock`] so every callback within the tick observes
//! the same timestamp.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of epoch milliseconds.
pub trait EpochClock: Send {
    fn now_ms(&self) -> u64;
}

/// Wall clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl EpochClock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Shared cached timestamp, refreshed once per tick by the agent.
///
/// The cached value never moves backwards: a wall clock step back is absorbed
/// by keeping the previous maximum.
#[derive(Debug, Clone, Default)]
pub struct CachedClock {
    value: Arc<AtomicU64>,
}

impl CachedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the cache to `now_ms` (or keep the current value if it is
    /// already ahead) and return the timestamp the tick should use.
    pub fn advance_to(&self, now_ms: u64) -> u64 {
        let prev = self.value.fetch_max(now_ms, Ordering::Release);
        prev.max(now_ms)
    }

    /// Read the most recently published tick timestamp.
    pub fn now_ms(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
