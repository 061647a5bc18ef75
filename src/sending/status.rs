//! Hourly and daily quota projection.

use serde::{Deserialize, Serialize};

use super::settings::SendingConfig;

/// Sent counts against the configured caps.
///
/// Derived on demand from counts the caller already tracks; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    /// Messages sent in the current hour
    pub hourly_count: u32,
    /// Messages sent today
    pub daily_count: u32,
    /// Hourly cap
    pub hourly_limit: u32,
    /// Daily cap
    pub daily_limit: u32,
    /// Messages left this hour
    pub hourly_remaining: u32,
    /// Messages left today
    pub daily_remaining: u32,
    /// No hourly quota left
    pub is_hourly_limit_reached: bool,
    /// No daily quota left
    pub is_daily_limit_reached: bool,
}

impl RateLimitStatus {
    /// Whether either cap has been reached.
    pub fn is_limit_reached(&self) -> bool {
        self.is_hourly_limit_reached || self.is_daily_limit_reached
    }

    /// Messages that may still go out before a cap binds.
    pub fn sendable_now(&self) -> u32 {
        self.hourly_remaining.min(self.daily_remaining)
    }
}

/// Project counts against a configuration's caps.
pub fn compute_rate_limit_status(
    hourly_count: u32,
    daily_count: u32,
    config: &SendingConfig,
) -> RateLimitStatus {
    let hourly_remaining = config.max_per_hour.saturating_sub(hourly_count);
    let daily_remaining = config.max_per_day.saturating_sub(daily_count);

    RateLimitStatus {
        hourly_count,
        daily_count,
        hourly_limit: config.max_per_hour,
        daily_limit: config.max_per_day,
        hourly_remaining,
        daily_remaining,
        is_hourly_limit_reached: hourly_remaining == 0,
        is_daily_limit_reached: daily_remaining == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sending::SendProfile;

    #[test]
    fn test_under_limits() {
        let config = SendingConfig::with_profile(SendProfile::Moderate);
        let status = compute_rate_limit_status(10, 50, &config);

        assert_eq!(status.hourly_remaining, 30);
        assert_eq!(status.daily_remaining, 150);
        assert!(!status.is_limit_reached());
        assert_eq!(status.sendable_now(), 30);
    }

    #[test]
    fn test_hourly_limit_reached() {
        let config = SendingConfig::with_profile(SendProfile::Test);
        let status = compute_rate_limit_status(5, 5, &config);

        assert!(status.is_hourly_limit_reached);
        assert!(!status.is_daily_limit_reached);
        assert!(status.is_limit_reached());
        assert_eq!(status.sendable_now(), 0);
    }

    #[test]
    fn test_overshoot_floors_at_zero() {
        let config = SendingConfig::with_profile(SendProfile::Test);
        let status = compute_rate_limit_status(9, 25, &config);

        assert_eq!(status.hourly_remaining, 0);
        assert_eq!(status.daily_remaining, 0);
        assert!(status.is_daily_limit_reached);
    }

    #[test]
    fn test_serializes_camel_case() {
        let config = SendingConfig::with_profile(SendProfile::Test);
        let json = serde_json::to_value(compute_rate_limit_status(1, 1, &config)).unwrap();
        assert_eq!(json["hourlyRemaining"], 4);
        assert_eq!(json["isDailyLimitReached"], false);
    }
}
