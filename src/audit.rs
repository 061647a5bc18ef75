//! Best-effort audit trail.
//!
//! Audit writes never influence throttling decisions: `record_best_effort`
//! logs and drops any sink failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;

/// One audited action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// What happened, e.g. `campaign.auto_pause`
    pub action: String,
    /// Kind of resource acted on
    pub resource_type: String,
    /// Identifier of the resource, when there is one
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Free-form context
    #[serde(default)]
    pub details: Value,
    /// When it happened
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    /// Create an entry stamped with the current time.
    pub fn new(action: &str, resource_type: &str, details: Value) -> Self {
        Self {
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: None,
            details,
            at: Utc::now(),
        }
    }

    /// Attach a resource identifier.
    pub fn with_resource_id(mut self, id: impl ToString) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }
}

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Store one entry.
    async fn record(&self, entry: AuditEntry) -> Result<()>;
}

/// Audit sink that emits entries as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        info!(
            target: "audit",
            action = %entry.action,
            resource_type = %entry.resource_type,
            resource_id = ?entry.resource_id,
            details = %entry.details,
            "Audit entry"
        );
        Ok(())
    }
}

/// Record an entry, logging and discarding any failure.
pub async fn record_best_effort(sink: &dyn AuditSink, entry: AuditEntry) {
    let action = entry.action.clone();
    if let Err(e) = sink.record(entry).await {
        warn!(action = %action, error = %e, "Audit sink failed, entry dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ThrottleError;
    use serde_json::json;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn record(&self, _entry: AuditEntry) -> Result<()> {
            Err(ThrottleError::Audit("sink offline".to_string()))
        }
    }

    #[test]
    fn test_entry_builder() {
        let entry = AuditEntry::new("campaign.auto_pause", "campaign", json!({"hourly": 40}))
            .with_resource_id("c-1");
        assert_eq!(entry.resource_id.as_deref(), Some("c-1"));
        assert_eq!(entry.details["hourly"], 40);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        record_best_effort(&FailingSink, AuditEntry::new("x", "y", Value::Null)).await;
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_entries() {
        let entry = AuditEntry::new("login.blocked", "user", json!({}));
        assert!(TracingAuditSink.record(entry).await.is_ok());
    }
}
