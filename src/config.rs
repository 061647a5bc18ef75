//! Configuration management for campaign throttling.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::{Result, ThrottleError};
use crate::ratelimit::{LockoutPolicy, WindowPolicy};
use crate::sending::SendingConfig;

/// Prefix for environment overrides, e.g. `CAMPAIGN_THROTTLE__LIMITS__LOGIN__MAX_ATTEMPTS`.
pub const ENV_PREFIX: &str = "CAMPAIGN_THROTTLE";

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Limiter thresholds
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Campaign pacing policy
    #[serde(default)]
    pub sending: SendingConfig,

    /// Counter persistence
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Thresholds for the three guards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Login lockout
    #[serde(default = "default_login")]
    pub login: LockoutPolicy,

    /// External search window
    #[serde(default = "default_search")]
    pub search: WindowPolicy,

    /// Contact upload window and file cap
    #[serde(default)]
    pub upload: UploadLimitConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            login: default_login(),
            search: default_search(),
            upload: UploadLimitConfig::default(),
        }
    }
}

fn default_login() -> LockoutPolicy {
    LockoutPolicy::new(30, Duration::from_secs(30 * 60), Duration::from_secs(5 * 60))
}

fn default_search() -> WindowPolicy {
    WindowPolicy::new(3, Duration::from_secs(60))
}

/// Upload limiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLimitConfig {
    /// Uploads admitted per window
    #[serde(default = "default_upload_events")]
    pub max_events: u32,

    /// Window length in seconds
    #[serde(default = "default_upload_window")]
    pub window_secs: u64,

    /// Largest contact list accepted in one file
    #[serde(default = "default_max_contacts")]
    pub max_contacts_per_file: u64,
}

impl Default for UploadLimitConfig {
    fn default() -> Self {
        Self {
            max_events: default_upload_events(),
            window_secs: default_upload_window(),
            max_contacts_per_file: default_max_contacts(),
        }
    }
}

impl UploadLimitConfig {
    /// The sliding-window part of this configuration.
    pub fn window_policy(&self) -> WindowPolicy {
        WindowPolicy {
            max_events: self.max_events,
            window_secs: self.window_secs,
        }
    }
}

fn default_upload_events() -> u32 {
    3
}

fn default_upload_window() -> u64 {
    60
}

fn default_max_contacts() -> u64 {
    10_000
}

/// Counter persistence configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for durable counters; in-memory when unset
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl ThrottleConfig {
    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ThrottleConfig = serde_yaml::from_str(yaml)
            .map_err(|e| ThrottleError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, with environment overrides on top.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let config: ThrottleConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section for values the limiters cannot work with.
    pub fn validate(&self) -> Result<()> {
        let login = &self.limits.login;
        if login.max_attempts == 0 || login.window_secs == 0 || login.block_secs == 0 {
            return Err(ThrottleError::InvalidConfig(
                "login limits must be greater than zero".to_string(),
            ));
        }

        let search = &self.limits.search;
        if search.max_events == 0 || search.window_secs == 0 {
            return Err(ThrottleError::InvalidConfig(
                "search limits must be greater than zero".to_string(),
            ));
        }

        let upload = &self.limits.upload;
        if upload.max_events == 0 || upload.window_secs == 0 || upload.max_contacts_per_file == 0 {
            return Err(ThrottleError::InvalidConfig(
                "upload limits must be greater than zero".to_string(),
            ));
        }

        self.sending.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sending::SendProfile;

    #[test]
    fn test_defaults() {
        let config = ThrottleConfig::default();
        assert_eq!(config.limits.login.max_attempts, 30);
        assert_eq!(config.limits.login.window_secs, 1800);
        assert_eq!(config.limits.login.block_secs, 300);
        assert_eq!(config.limits.search.max_events, 3);
        assert_eq!(config.limits.upload.max_contacts_per_file, 10_000);
        assert!(config.storage.state_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
limits:
  login:
    max_attempts: 5
    window_secs: 600
    block_secs: 60
  upload:
    max_contacts_per_file: 500
sending:
  profile: test
  interval_seconds: 10
  max_per_hour: 5
  max_per_day: 10
storage:
  state_dir: /var/lib/campaign-throttle
"#;
        let config = ThrottleConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.limits.login.max_attempts, 5);
        assert_eq!(config.limits.search.max_events, 3);
        assert_eq!(config.limits.upload.max_contacts_per_file, 500);
        assert_eq!(config.limits.upload.max_events, 3);
        assert_eq!(config.sending.profile, SendProfile::Test);
        assert_eq!(
            config.storage.state_dir,
            Some(PathBuf::from("/var/lib/campaign-throttle"))
        );
    }

    #[test]
    fn test_rejects_zero_limits() {
        let yaml = r#"
limits:
  search:
    max_events: 0
    window_secs: 60
"#;
        assert!(matches!(
            ThrottleConfig::from_yaml(yaml),
            Err(ThrottleError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let yaml = r#"
sending:
  interval_seconds: 0
"#;
        assert!(matches!(
            ThrottleConfig::from_yaml(yaml),
            Err(ThrottleError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("throttle.yaml");
        std::fs::write(
            &path,
            "limits:\n  search:\n    max_events: 7\n    window_secs: 30\n",
        )
        .unwrap();

        let config = ThrottleConfig::load(&path).unwrap();
        assert_eq!(config.limits.search.max_events, 7);
        assert_eq!(config.limits.search.window_secs, 30);
        assert_eq!(config.limits.login.max_attempts, 30);
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            ThrottleConfig::from_yaml("limits: [unclosed"),
            Err(ThrottleError::Config(_))
        ));
    }
}
