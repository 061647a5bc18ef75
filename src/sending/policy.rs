//! Automatic campaign pausing when a sending cap is reached.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::settings::SendingConfig;
use super::status::RateLimitStatus;
use crate::audit::{record_best_effort, AuditEntry, AuditSink};
use crate::error::Result;

/// Identifier of a campaign in the backing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(pub Uuid);

impl CampaignId {
    /// A fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CampaignId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CampaignId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CampaignId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Reply from a remote pause or resume call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlOutcome {
    /// Whether the remote side applied the change
    pub success: bool,
}

/// Remote capability for pausing and resuming campaigns.
#[async_trait]
pub trait CampaignControl: Send + Sync {
    /// Pause dispatch for a campaign.
    async fn pause_campaign(&self, id: CampaignId) -> Result<ControlOutcome>;

    /// Resume dispatch for a campaign.
    async fn resume_campaign(&self, id: CampaignId) -> Result<ControlOutcome>;
}

/// What the policy decided for a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDecision {
    /// Quota left; keep sending
    Continue,
    /// A cap is reached and auto-pause is off; the dispatcher must hold
    LimitReached,
    /// A cap is reached and the campaign was paused
    Paused,
    /// A cap is reached but the pause call failed or was refused
    PauseFailed,
}

/// Decide whether a campaign may keep sending, pausing it when configured.
#[instrument(skip(status, config, control, audit), fields(campaign = %campaign_id))]
pub async fn enforce_send_limits(
    campaign_id: CampaignId,
    status: &RateLimitStatus,
    config: &SendingConfig,
    control: &dyn CampaignControl,
    audit: &dyn AuditSink,
) -> PolicyDecision {
    if !status.is_limit_reached() {
        debug!(
            hourly_remaining = status.hourly_remaining,
            daily_remaining = status.daily_remaining,
            "Quota available"
        );
        return PolicyDecision::Continue;
    }

    if !config.auto_pause_on_limit {
        debug!("Limit reached, auto-pause disabled");
        return PolicyDecision::LimitReached;
    }

    let decision = match control.pause_campaign(campaign_id).await {
        Ok(ControlOutcome { success: true }) => {
            info!(
                hourly_limit_reached = status.is_hourly_limit_reached,
                daily_limit_reached = status.is_daily_limit_reached,
                "Campaign paused on sending limit"
            );
            PolicyDecision::Paused
        }
        Ok(ControlOutcome { success: false }) => {
            warn!("Pause request refused");
            PolicyDecision::PauseFailed
        }
        Err(e) => {
            warn!(error = %e, "Pause request failed");
            PolicyDecision::PauseFailed
        }
    };

    let entry = AuditEntry::new(
        "campaign.auto_pause",
        "campaign",
        json!({
            "decision": decision,
            "hourlyCount": status.hourly_count,
            "dailyCount": status.daily_count,
            "hourlyLimit": status.hourly_limit,
            "dailyLimit": status.daily_limit,
        }),
    )
    .with_resource_id(campaign_id);
    record_best_effort(audit, entry).await;

    decision
}

/// Resume a campaign and audit the outcome.
#[instrument(skip(control, audit), fields(campaign = %campaign_id))]
pub async fn resume_campaign(
    campaign_id: CampaignId,
    control: &dyn CampaignControl,
    audit: &dyn AuditSink,
) -> Result<ControlOutcome> {
    let outcome = control.resume_campaign(campaign_id).await?;
    if outcome.success {
        info!("Campaign resumed");
    } else {
        warn!("Resume request refused");
    }

    let entry = AuditEntry::new("campaign.resume", "campaign", json!({ "success": outcome.success }))
        .with_resource_id(campaign_id);
    record_best_effort(audit, entry).await;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ThrottleError;
    use crate::sending::{compute_rate_limit_status, SendProfile};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingControl {
        calls: Mutex<Vec<(&'static str, CampaignId)>>,
        refuse: bool,
        fail: bool,
    }

    #[async_trait]
    impl CampaignControl for RecordingControl {
        async fn pause_campaign(&self, id: CampaignId) -> Result<ControlOutcome> {
            self.calls.lock().push(("pause", id));
            if self.fail {
                return Err(ThrottleError::CampaignControl("timeout".to_string()));
            }
            Ok(ControlOutcome { success: !self.refuse })
        }

        async fn resume_campaign(&self, id: CampaignId) -> Result<ControlOutcome> {
            self.calls.lock().push(("resume", id));
            Ok(ControlOutcome { success: true })
        }
    }

    #[derive(Default)]
    struct MemorySink {
        entries: Mutex<Vec<AuditEntry>>,
    }

    #[async_trait]
    impl AuditSink for MemorySink {
        async fn record(&self, entry: AuditEntry) -> Result<()> {
            self.entries.lock().push(entry);
            Ok(())
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl AuditSink for BrokenSink {
        async fn record(&self, _entry: AuditEntry) -> Result<()> {
            Err(ThrottleError::Audit("down".to_string()))
        }
    }

    fn test_config() -> SendingConfig {
        SendingConfig::with_profile(SendProfile::Test)
    }

    #[tokio::test]
    async fn test_continue_under_limit() {
        let control = RecordingControl::default();
        let status = compute_rate_limit_status(1, 1, &test_config());

        let decision =
            enforce_send_limits(CampaignId::new(), &status, &test_config(), &control, &MemorySink::default())
                .await;

        assert_eq!(decision, PolicyDecision::Continue);
        assert!(control.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_pauses_and_audits_on_limit() {
        let control = RecordingControl::default();
        let sink = MemorySink::default();
        let id = CampaignId::new();
        let status = compute_rate_limit_status(5, 5, &test_config());

        let decision = enforce_send_limits(id, &status, &test_config(), &control, &sink).await;

        assert_eq!(decision, PolicyDecision::Paused);
        assert_eq!(control.calls.lock().as_slice(), &[("pause", id)]);
        let entries = sink.entries.lock();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "campaign.auto_pause");
        assert_eq!(entries[0].resource_id, Some(id.to_string()));
        assert_eq!(entries[0].details["decision"], "paused");
    }

    #[tokio::test]
    async fn test_limit_without_auto_pause() {
        let control = RecordingControl::default();
        let mut config = test_config();
        config.auto_pause_on_limit = false;
        let status = compute_rate_limit_status(0, 10, &config);

        let decision =
            enforce_send_limits(CampaignId::new(), &status, &config, &control, &MemorySink::default()).await;

        assert_eq!(decision, PolicyDecision::LimitReached);
        assert!(control.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_pause_failures() {
        let status = compute_rate_limit_status(5, 0, &test_config());

        let refusing = RecordingControl {
            refuse: true,
            ..Default::default()
        };
        let decision =
            enforce_send_limits(CampaignId::new(), &status, &test_config(), &refusing, &MemorySink::default())
                .await;
        assert_eq!(decision, PolicyDecision::PauseFailed);

        let failing = RecordingControl {
            fail: true,
            ..Default::default()
        };
        let decision =
            enforce_send_limits(CampaignId::new(), &status, &test_config(), &failing, &MemorySink::default())
                .await;
        assert_eq!(decision, PolicyDecision::PauseFailed);
    }

    #[test]
    fn test_audit_failure_does_not_change_decision() {
        let control = RecordingControl::default();
        let status = compute_rate_limit_status(5, 5, &test_config());

        let decision = tokio_test::block_on(enforce_send_limits(
            CampaignId::new(),
            &status,
            &test_config(),
            &control,
            &BrokenSink,
        ));
        assert_eq!(decision, PolicyDecision::Paused);
    }

    #[test]
    fn test_resume_campaign() {
        let control = RecordingControl::default();
        let sink = MemorySink::default();
        let id = CampaignId::new();

        let outcome = tokio_test::block_on(resume_campaign(id, &control, &sink)).unwrap();

        assert!(outcome.success);
        assert_eq!(control.calls.lock().as_slice(), &[("resume", id)]);
        assert_eq!(sink.entries.lock()[0].action, "campaign.resume");
    }

    #[test]
    fn test_campaign_id_round_trip() {
        let id: CampaignId = "67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap();
        assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert!("not-a-uuid".parse::<CampaignId>().is_err());
    }
}
