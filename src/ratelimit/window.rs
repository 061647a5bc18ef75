//! Sliding-window event limiter.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::backend::{self, CounterStore};
use super::countdown::format_remaining;
use super::key::LimiterKey;
use crate::clock::Clock;

/// Limits for a sliding window: at most `max_events` per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPolicy {
    /// Events admitted per window
    pub max_events: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl WindowPolicy {
    /// Create a new window policy.
    pub fn new(max_events: u32, window: Duration) -> Self {
        Self {
            max_events,
            window_secs: window.as_secs(),
        }
    }

    /// Get the duration of the window.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.window_secs).unwrap_or(i64::MAX).saturating_mul(1000)
    }
}

/// Stored event timestamps (epoch-ms), ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampWindow {
    /// Event times, oldest first
    #[serde(default)]
    pub timestamps: Vec<i64>,
}

impl TimestampWindow {
    /// Index of the first timestamp still inside the window.
    fn first_valid(&self, now_ms: i64, window_ms: i64) -> usize {
        self.timestamps
            .partition_point(|ts| now_ms.saturating_sub(*ts) >= window_ms)
    }

    /// Timestamps still inside the window at `now_ms`.
    pub fn valid(&self, now_ms: i64, window_ms: i64) -> &[i64] {
        &self.timestamps[self.first_valid(now_ms, window_ms)..]
    }

    /// Drop every timestamp that has left the window.
    pub fn prune(&mut self, now_ms: i64, window_ms: i64) -> usize {
        let expired = self.first_valid(now_ms, window_ms);
        self.timestamps.drain(..expired);
        expired
    }

    /// Drop timestamps from the future and restore ascending order.
    ///
    /// Returns how many entries were discarded.
    pub fn sanitize(&mut self, now_ms: i64) -> usize {
        let before = self.timestamps.len();
        self.timestamps.retain(|ts| *ts <= now_ms);
        self.timestamps.sort_unstable();
        before - self.timestamps.len()
    }

    /// Insert a timestamp, keeping the sequence sorted.
    pub fn insert(&mut self, ts: i64) {
        let pos = self.timestamps.partition_point(|existing| *existing <= ts);
        self.timestamps.insert(pos, ts);
    }
}

/// One consistent evaluation of a sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowSnapshot {
    /// Whether another event may proceed now
    pub allowed: bool,
    /// Events counted in the current window
    pub used: u32,
    /// Events still admitted in the current window
    pub remaining: u32,
    /// The configured maximum
    pub limit: u32,
    /// Seconds until the oldest event leaves the window (0 when allowed)
    pub retry_after_secs: u64,
}

impl WindowSnapshot {
    /// Human-readable wait, e.g. `"45s"`.
    pub fn retry_after_display(&self) -> String {
        format_remaining(self.retry_after_secs)
    }
}

/// A sliding-window limiter whose timestamps live in a counter store.
///
/// Admission checks never write; only `record_event` and `reset` do, and
/// they hold an internal lock across their read-modify-write so rapid
/// repeated calls from one process cannot lose events.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    key: LimiterKey,
    policy: WindowPolicy,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl SlidingWindowLimiter {
    /// Create a new sliding-window limiter.
    pub fn new(
        key: LimiterKey,
        policy: WindowPolicy,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            key,
            policy,
            store,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Get the key this limiter stores under.
    pub fn key(&self) -> &LimiterKey {
        &self.key
    }

    /// Get the policy for this limiter.
    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// Evaluate the window without recording anything.
    pub fn snapshot(&self) -> WindowSnapshot {
        let now = self.clock.now_ms();
        let window = self.load(&self.key.to_string_key(), now);
        self.evaluate(&window, now)
    }

    /// Whether the guarded action may proceed now.
    pub fn can_proceed(&self) -> bool {
        self.snapshot().allowed
    }

    /// Events still admitted in the current window.
    pub fn remaining(&self) -> u32 {
        self.snapshot().remaining
    }

    /// Seconds until a slot frees up; 0 when one is available now.
    pub fn seconds_until_next_slot(&self) -> u64 {
        self.snapshot().retry_after_secs
    }

    /// Record that the guarded action was performed.
    ///
    /// Call this after the action has actually happened, never before, so
    /// the window reflects real consumption.
    pub fn record_event(&self) -> WindowSnapshot {
        let _guard = self.write_lock.lock();
        let now = self.clock.now_ms();
        let key = self.key.to_string_key();

        let mut window = self.load(&key, now);
        let expired = window.prune(now, self.policy.window_ms());
        if expired > 0 {
            debug!(key = %self.key, expired = expired, "Pruned expired events");
        }
        window.insert(now);
        backend::save(self.store.as_ref(), &key, &window);

        let snapshot = self.evaluate(&window, now);
        trace!(
            key = %self.key,
            used = snapshot.used,
            remaining = snapshot.remaining,
            "Recorded event"
        );
        snapshot
    }

    /// Forget every recorded event.
    pub fn reset(&self) {
        let _guard = self.write_lock.lock();
        backend::clear(self.store.as_ref(), &self.key.to_string_key());
        debug!(key = %self.key, "Window reset");
    }

    fn load(&self, key: &str, now: i64) -> TimestampWindow {
        let mut window: TimestampWindow = backend::load_or_default(self.store.as_ref(), key);
        let discarded = window.sanitize(now);
        if discarded > 0 {
            warn!(key = %self.key, discarded = discarded, "Ignoring future-dated events");
        }
        window
    }

    fn evaluate(&self, window: &TimestampWindow, now: i64) -> WindowSnapshot {
        let window_ms = self.policy.window_ms();
        let valid = window.valid(now, window_ms);
        let used = valid.len().min(u32::MAX as usize) as u32;
        let remaining = self.policy.max_events.saturating_sub(used);
        let allowed = used < self.policy.max_events;

        let retry_after_secs = match (allowed, valid.first()) {
            (false, Some(oldest)) => {
                let wait_ms = oldest.saturating_add(window_ms).saturating_sub(now).max(0);
                (wait_ms.saturating_add(999) / 1000) as u64
            }
            _ => 0,
        };

        trace!(
            key = %self.key,
            used = used,
            limit = self.policy.max_events,
            allowed = allowed,
            "Checking window"
        );

        WindowSnapshot {
            allowed,
            used,
            remaining,
            limit: self.policy.max_events,
            retry_after_secs,
        }
    }
}
