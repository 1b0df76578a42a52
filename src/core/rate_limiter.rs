//! Route-scoped fixed-window rate limiting.
//!
//! One limiter instance serves the whole gateway; slots are keyed by the
//! aggregation's path pattern, so the limit is global per route rather than
//! per client. Windows reset on the first request after expiry, not on a
//! rolling basis, which admits boundary bursts of up to twice the limit
//! across two adjacent windows.
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

/// Per-key counter state.
#[derive(Debug)]
struct WindowSlot {
    limit: u64,
    interval: Duration,
    count: u64,
    last_reset: Instant,
}

/// Fixed-window counters behind a single coarse mutex.
///
/// The critical section is O(1) arithmetic, so one lock over the whole map is
/// enough; check-and-update is atomic per key.
#[derive(Debug, Default)]
pub struct FixedWindowLimiter {
    slots: Mutex<HashMap<String, WindowSlot>>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a request for `key` is admitted under
    /// `limit` requests per `interval_secs` seconds.
    pub fn allow(&self, key: &str, limit: u64, interval_secs: u64) -> bool {
        self.allow_at(key, limit, interval_secs, Instant::now())
    }

    fn allow_at(&self, key: &str, limit: u64, interval_secs: u64, now: Instant) -> bool {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let slot = slots.entry(key.to_string()).or_insert_with(|| WindowSlot {
            limit,
            interval: Duration::from_secs(interval_secs),
            count: 0,
            last_reset: now,
        });

        if now.duration_since(slot.last_reset) > slot.interval {
            slot.count = 0;
            slot.last_reset = now;
        }

        if slot.count < slot.limit {
            slot.count += 1;
            true
        } else {
            false
        }
    }
}
