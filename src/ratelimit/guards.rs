//! Login, search and upload guards.
//!
//! Each guard binds a limiter to its fixed policy and storage key, and can
//! hand out a live `Countdown` for displaying a denial.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::backend::CounterStore;
use super::countdown::Countdown;
use super::key::LimiterKey;
use super::lockout::{LockoutLimiter, LockoutPolicy, LockoutSnapshot};
use super::window::{SlidingWindowLimiter, WindowPolicy, WindowSnapshot};
use crate::clock::Clock;
use crate::config::{LimitsConfig, UploadLimitConfig};
use crate::store::MemoryStore;

/// Store key for the login limiter.
pub const LOGIN_KEY: &str = "login_rate_limit";
/// Store key for the search limiter.
pub const SEARCH_KEY: &str = "search_rate_limit";
/// Store key for the upload limiter.
pub const UPLOAD_KEY: &str = "upload_rate_limit";

/// Outcome of an action attempted through a guard.
#[derive(Debug)]
pub enum Guarded<T> {
    /// The action ran; its result is enclosed
    Performed(T),
    /// The action was not run
    Denied(WindowSnapshot),
}

/// Guard against rapid repeated login failures.
#[derive(Debug)]
pub struct LoginGuard {
    limiter: LockoutLimiter,
}

impl LoginGuard {
    /// Create a login guard under the default key.
    pub fn new(policy: LockoutPolicy, store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_key(LimiterKey::new(LOGIN_KEY), policy, store, clock)
    }

    /// Create a login guard under an explicit key.
    pub fn with_key(
        key: LimiterKey,
        policy: LockoutPolicy,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limiter: LockoutLimiter::new(key, policy, store, clock),
        }
    }

    /// Create a login guard from configuration.
    pub fn from_config(limits: &LimitsConfig, store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self::new(limits.login, store, clock)
    }

    /// Current evaluation.
    pub fn status(&self) -> LockoutSnapshot {
        self.limiter.snapshot()
    }

    /// Whether login attempts are currently denied.
    pub fn is_blocked(&self) -> bool {
        self.limiter.is_blocked()
    }

    /// Seconds left in the block.
    pub fn remaining_block_seconds(&self) -> u64 {
        self.limiter.remaining_block_seconds()
    }

    /// Failed attempts left before a block.
    pub fn attempts_remaining(&self) -> u32 {
        self.limiter.attempts_remaining()
    }

    /// Record a login outcome.
    pub fn record_attempt(&self, success: bool) -> LockoutSnapshot {
        self.limiter.record_attempt(success)
    }

    /// Clear all state.
    pub fn reset(&self) {
        self.limiter.reset()
    }

    /// Live countdown of the remaining block.
    pub fn countdown(self: &Arc<Self>) -> Countdown {
        let guard = Arc::clone(self);
        Countdown::start(move || guard.remaining_block_seconds())
    }
}

/// Guard for external search requests.
///
/// Search quota is cheap and per-session, so by default it lives in
/// process memory and resets on restart.
#[derive(Debug)]
pub struct SearchGuard {
    limiter: SlidingWindowLimiter,
}

impl SearchGuard {
    /// Create a search guard with a private in-memory window.
    pub fn new(policy: WindowPolicy, clock: Arc<dyn Clock>) -> Self {
        Self::with_store(LimiterKey::new(SEARCH_KEY), policy, Arc::new(MemoryStore::new()), clock)
    }

    /// Create a search guard over an explicit store and key.
    pub fn with_store(
        key: LimiterKey,
        policy: WindowPolicy,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limiter: SlidingWindowLimiter::new(key, policy, store, clock),
        }
    }

    /// Create a search guard from configuration.
    pub fn from_config(limits: &LimitsConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(limits.search, clock)
    }

    /// Current evaluation.
    pub fn status(&self) -> WindowSnapshot {
        self.limiter.snapshot()
    }

    /// Whether a search may run now.
    pub fn can_search(&self) -> bool {
        self.limiter.can_proceed()
    }

    /// Searches left in the window.
    pub fn remaining_searches(&self) -> u32 {
        self.limiter.remaining()
    }

    /// Seconds until the next search slot.
    pub fn seconds_until_next_slot(&self) -> u64 {
        self.limiter.seconds_until_next_slot()
    }

    /// Record a search that was actually performed.
    pub fn record_search(&self) -> WindowSnapshot {
        self.limiter.record_event()
    }

    /// Run `search` if admitted, recording it only when it succeeds.
    pub fn try_acquire<T, E, F>(&self, search: F) -> Result<Guarded<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        try_acquire(&self.limiter, search)
    }

    /// Forget recorded searches.
    pub fn reset(&self) {
        self.limiter.reset()
    }

    /// Live countdown until the next slot.
    pub fn countdown(self: &Arc<Self>) -> Countdown {
        let guard = Arc::clone(self);
        Countdown::start(move || guard.seconds_until_next_slot())
    }
}

/// Result of validating an upload's contact count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCountValidation {
    /// Whether the count is acceptable
    pub valid: bool,
    /// Why it is not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContactCountValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }
}

/// Reject files with more than `max_contacts_per_file` contacts.
pub fn validate_contact_count(count: u64, max_contacts_per_file: u64) -> ContactCountValidation {
    if count > max_contacts_per_file {
        return ContactCountValidation {
            valid: false,
            error: Some(format!(
                "File exceeds the limit of {} contacts per upload ({} contacts submitted)",
                max_contacts_per_file, count
            )),
        };
    }
    ContactCountValidation::ok()
}

/// Decision for a contact upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadDecision {
    /// Upload may proceed
    Allowed,
    /// The file is too large
    Invalid {
        /// Validation message
        error: String,
    },
    /// Too many recent uploads
    RateLimited {
        /// Seconds until the next slot
        retry_after_secs: u64,
    },
}

/// Guard for contact-list uploads.
#[derive(Debug)]
pub struct UploadGuard {
    limiter: SlidingWindowLimiter,
    max_contacts_per_file: u64,
}

impl UploadGuard {
    /// Create an upload guard under the default key.
    pub fn new(config: UploadLimitConfig, store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_key(LimiterKey::new(UPLOAD_KEY), config, store, clock)
    }

    /// Create an upload guard under an explicit key.
    pub fn with_key(
        key: LimiterKey,
        config: UploadLimitConfig,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limiter: SlidingWindowLimiter::new(key, config.window_policy(), store, clock),
            max_contacts_per_file: config.max_contacts_per_file,
        }
    }

    /// Create an upload guard from configuration.
    pub fn from_config(limits: &LimitsConfig, store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self::new(limits.upload, store, clock)
    }

    /// Per-file contact cap.
    pub fn max_contacts_per_file(&self) -> u64 {
        self.max_contacts_per_file
    }

    /// Current evaluation.
    pub fn status(&self) -> WindowSnapshot {
        self.limiter.snapshot()
    }

    /// Whether an upload may start now.
    pub fn can_upload(&self) -> bool {
        self.limiter.can_proceed()
    }

    /// Uploads left in the window.
    pub fn remaining_uploads(&self) -> u32 {
        self.limiter.remaining()
    }

    /// Seconds until the next upload slot.
    pub fn seconds_until_next_slot(&self) -> u64 {
        self.limiter.seconds_until_next_slot()
    }

    /// Validate a file's contact count against the per-file cap.
    pub fn validate_contact_count(&self, count: u64) -> ContactCountValidation {
        validate_contact_count(count, self.max_contacts_per_file)
    }

    /// Combined size and rate check for an upload of `count` contacts.
    pub fn check_upload(&self, count: u64) -> UploadDecision {
        let validation = self.validate_contact_count(count);
        if let Some(error) = validation.error {
            warn!(count = count, limit = self.max_contacts_per_file, "Upload rejected by size");
            return UploadDecision::Invalid { error };
        }

        let snapshot = self.limiter.snapshot();
        if !snapshot.allowed {
            return UploadDecision::RateLimited {
                retry_after_secs: snapshot.retry_after_secs,
            };
        }
        UploadDecision::Allowed
    }

    /// Record an upload that was actually performed.
    pub fn record_upload(&self) -> WindowSnapshot {
        self.limiter.record_event()
    }

    /// Run `upload` if admitted, recording it only when it succeeds.
    pub fn try_acquire<T, E, F>(&self, upload: F) -> Result<Guarded<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        try_acquire(&self.limiter, upload)
    }

    /// Forget recorded uploads.
    pub fn reset(&self) {
        self.limiter.reset()
    }

    /// Live countdown until the next slot.
    pub fn countdown(self: &Arc<Self>) -> Countdown {
        let guard = Arc::clone(self);
        Countdown::start(move || guard.seconds_until_next_slot())
    }
}

fn try_acquire<T, E, F>(limiter: &SlidingWindowLimiter, action: F) -> Result<Guarded<T>, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let snapshot = limiter.snapshot();
    if !snapshot.allowed {
        debug!(key = %limiter.key(), retry_after_secs = snapshot.retry_after_secs, "Action denied");
        return Ok(Guarded::Denied(snapshot));
    }

    let value = action()?;
    limiter.record_event();
    Ok(Guarded::Performed(value))
}
