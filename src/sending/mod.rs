//! Campaign sending policy: pacing presets, quota status, schedule
//! projection and automatic pausing.
//!
//! Everything here except `policy` is pure computation over a
//! `SendingConfig` and caller-supplied counts.

mod policy;
mod profile;
mod schedule;
mod settings;
mod status;

pub use policy::{enforce_send_limits, resume_campaign, CampaignControl, CampaignId, ControlOutcome, PolicyDecision};
pub use profile::{resolve_profile, ProfilePreset, SendProfile, SEND_PROFILES};
pub use schedule::{project_schedule, QueueSchedulePreview, ScheduleConstraint};
pub use settings::SendingConfig;
pub use status::{compute_rate_limit_status, RateLimitStatus};
