//! Attempt counter with a hard block once a threshold is crossed.
//!
//! A failed attempt opens a counting window. Reaching `max_attempts` inside
//! that window blocks every attempt until `blocked_until`. The window is
//! long and the block is short: slow retries stay possible across the
//! window while bursts get stopped quickly. Block expiry is evaluated
//! lazily on the next access.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::backend::{self, CounterStore};
use super::countdown::format_remaining;
use super::key::LimiterKey;
use crate::clock::Clock;

/// Thresholds for a lockout limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutPolicy {
    /// Failed attempts that trigger a block
    pub max_attempts: u32,
    /// Counting window length in seconds
    pub window_secs: u64,
    /// Block length in seconds
    pub block_secs: u64,
}

impl LockoutPolicy {
    /// Create a new lockout policy.
    pub fn new(max_attempts: u32, window: Duration, block: Duration) -> Self {
        Self {
            max_attempts,
            window_secs: window.as_secs(),
            block_secs: block.as_secs(),
        }
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.window_secs).unwrap_or(i64::MAX).saturating_mul(1000)
    }

    fn block_ms(&self) -> i64 {
        i64::try_from(self.block_secs).unwrap_or(i64::MAX).saturating_mul(1000)
    }
}

/// The stored attempt record.
///
/// `first_attempt_at` of 0 means no window is open. A record with zero
/// attempts always has no window and no block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    /// Failed attempts in the current window
    #[serde(default)]
    pub attempts: u32,
    /// When the current window began (epoch-ms, 0 when unset)
    #[serde(default)]
    pub first_attempt_at: i64,
    /// End of the active block (epoch-ms)
    #[serde(default)]
    pub blocked_until: Option<i64>,
}

impl RateLimitRecord {
    fn block_expired(&self, now: i64) -> bool {
        matches!(self.blocked_until, Some(until) if now >= until)
    }

    fn window_expired(&self, now: i64, window_ms: i64) -> bool {
        self.first_attempt_at != 0 && now.saturating_sub(self.first_attempt_at) > window_ms
    }

    /// Whether the record could have been written by this limiter at `now`.
    fn is_plausible(&self, now: i64, block_ms: i64) -> bool {
        if self.attempts == 0 {
            return self.first_attempt_at == 0 && self.blocked_until.is_none();
        }
        if self.first_attempt_at < 0 || self.first_attempt_at > now {
            return false;
        }
        match self.blocked_until {
            Some(until) => until.saturating_sub(now) <= block_ms,
            None => true,
        }
    }
}

/// Logical state of a lockout limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockoutState {
    /// No restriction
    Open,
    /// Window active, below the threshold
    Counting,
    /// Every attempt denied until the block ends
    Blocked,
}

/// One consistent evaluation of a lockout limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockoutSnapshot {
    /// Current state
    pub state: LockoutState,
    /// Failed attempts counted in the live window
    pub attempts: u32,
    /// Failed attempts left before a block
    pub attempts_remaining: u32,
    /// Seconds left in the block (0 when not blocked)
    pub remaining_block_secs: u64,
}

impl LockoutSnapshot {
    /// Whether attempts are currently denied.
    pub fn is_blocked(&self) -> bool {
        self.state == LockoutState::Blocked
    }

    /// Human-readable block countdown, e.g. `"4m 59s"`.
    pub fn remaining_display(&self) -> String {
        format_remaining(self.remaining_block_secs)
    }
}

/// A block/cooldown limiter whose record lives in a counter store.
#[derive(Debug)]
pub struct LockoutLimiter {
    key: LimiterKey,
    policy: LockoutPolicy,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl LockoutLimiter {
    /// Create a new lockout limiter.
    pub fn new(
        key: LimiterKey,
        policy: LockoutPolicy,
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
    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    /// Evaluate the limiter, clearing an elapsed block.
    pub fn snapshot(&self) -> LockoutSnapshot {
        let _guard = self.write_lock.lock();
        let now = self.clock.now_ms();
        let record = self.load_current(now);
        self.evaluate(&record, now)
    }

    /// Whether attempts are currently denied.
    pub fn is_blocked(&self) -> bool {
        self.snapshot().is_blocked()
    }

    /// Seconds left in the block; 0 when not blocked.
    pub fn remaining_block_seconds(&self) -> u64 {
        self.snapshot().remaining_block_secs
    }

    /// Failed attempts left before a block.
    pub fn attempts_remaining(&self) -> u32 {
        self.snapshot().attempts_remaining
    }

    /// Record the outcome of an attempt.
    ///
    /// Success clears the record whatever its state. A failure opens or
    /// extends the counting window and blocks once the threshold is reached.
    /// Failures while blocked are not counted, so retrying during a block
    /// never extends it.
    pub fn record_attempt(&self, success: bool) -> LockoutSnapshot {
        let _guard = self.write_lock.lock();
        let now = self.clock.now_ms();
        let key = self.key.to_string_key();

        if success {
            backend::clear(self.store.as_ref(), &key);
            debug!(key = %self.key, "Successful attempt, record cleared");
            return self.evaluate(&RateLimitRecord::default(), now);
        }

        let mut record = self.load_current(now);

        if record.blocked_until.is_some() {
            debug!(key = %self.key, "Attempt during block ignored");
            return self.evaluate(&record, now);
        }

        if record.attempts == 0 || record.window_expired(now, self.policy.window_ms()) {
            // The attempt that finds the window expired opens the next one.
            record = RateLimitRecord {
                attempts: 1,
                first_attempt_at: now,
                blocked_until: None,
            };
            debug!(key = %self.key, "Counting window opened");
        } else {
            record.attempts = record.attempts.saturating_add(1);
        }

        if record.attempts >= self.policy.max_attempts {
            record.blocked_until = Some(now.saturating_add(self.policy.block_ms()));
            warn!(
                key = %self.key,
                attempts = record.attempts,
                block_secs = self.policy.block_secs,
                "Attempt threshold reached, blocking"
            );
        }

        backend::save(self.store.as_ref(), &key, &record);
        let snapshot = self.evaluate(&record, now);
        trace!(
            key = %self.key,
            attempts = snapshot.attempts,
            attempts_remaining = snapshot.attempts_remaining,
            "Recorded failed attempt"
        );
        snapshot
    }

    /// Clear the record unconditionally.
    pub fn reset(&self) {
        let _guard = self.write_lock.lock();
        backend::clear(self.store.as_ref(), &self.key.to_string_key());
        debug!(key = %self.key, "Lockout reset");
    }

    /// Load the record, resetting it when its block has elapsed.
    ///
    /// Callers must hold `write_lock`.
    fn load_current(&self, now: i64) -> RateLimitRecord {
        let key = self.key.to_string_key();
        let record: RateLimitRecord = backend::load_or_default(self.store.as_ref(), &key);

        if !record.is_plausible(now, self.policy.block_ms()) {
            warn!(key = %self.key, record = ?record, "Discarding inconsistent record");
            backend::clear(self.store.as_ref(), &key);
            return RateLimitRecord::default();
        }

        if record.block_expired(now) {
            info!(key = %self.key, "Block elapsed, record reset");
            backend::clear(self.store.as_ref(), &key);
            return RateLimitRecord::default();
        }
        record
    }

    fn evaluate(&self, record: &RateLimitRecord, now: i64) -> LockoutSnapshot {
        if let Some(until) = record.blocked_until {
            let wait_ms = until.saturating_sub(now).max(0);
            return LockoutSnapshot {
                state: LockoutState::Blocked,
                attempts: record.attempts,
                attempts_remaining: 0,
                remaining_block_secs: (wait_ms.saturating_add(999) / 1000) as u64,
            };
        }

        // An elapsed window counts for nothing until the next failure resets it.
        let attempts = if record.window_expired(now, self.policy.window_ms()) {
            0
        } else {
            record.attempts
        };

        LockoutSnapshot {
            state: if attempts == 0 {
                LockoutState::Open
            } else {
                LockoutState::Counting
            },
            attempts,
            attempts_remaining: self.policy.max_attempts.saturating_sub(attempts),
            remaining_block_secs: 0,
        }
    }
}
