//! Campaign pacing configuration.

use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Timelike, Weekday};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::profile::{resolve_profile, SendProfile};
use crate::error::{Result, ThrottleError};

/// Pacing policy for one campaign.
///
/// Selecting a profile overwrites the interval and both caps; editing those
/// fields afterwards keeps the edit and leaves `profile` as it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendingConfig {
    /// Preset the numeric fields were last taken from
    pub profile: SendProfile,
    /// Nominal seconds between messages
    pub interval_seconds: u32,
    /// Jitter the interval when dispatching
    pub randomize_interval: bool,
    /// Jitter band as a percentage of the interval
    pub jitter_percent: u8,
    /// Messages per hour
    pub max_per_hour: u32,
    /// Messages per day
    pub max_per_day: u32,
    /// Start of the daily sending window
    #[serde(with = "time_of_day")]
    pub allowed_start: NaiveTime,
    /// End of the daily sending window (inclusive)
    #[serde(with = "time_of_day")]
    pub allowed_end: NaiveTime,
    /// Weekdays sending is allowed on
    pub allowed_days: Vec<Weekday>,
    /// Pause the campaign when a cap is hit
    pub auto_pause_on_limit: bool,
}

impl Default for SendingConfig {
    fn default() -> Self {
        let preset = resolve_profile(SendProfile::Moderate);
        Self {
            profile: SendProfile::Moderate,
            interval_seconds: preset.interval_seconds,
            randomize_interval: true,
            jitter_percent: 50,
            max_per_hour: preset.max_per_hour,
            max_per_day: preset.max_per_day,
            allowed_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            allowed_end: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default(),
            allowed_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
            ],
            auto_pause_on_limit: true,
        }
    }
}

impl SendingConfig {
    /// Default configuration with a profile applied.
    pub fn with_profile(profile: SendProfile) -> Self {
        let mut config = Self::default();
        config.apply_profile(profile);
        config
    }

    /// Overwrite interval and caps with a profile's preset.
    pub fn apply_profile(&mut self, profile: SendProfile) {
        let preset = resolve_profile(profile);
        self.profile = profile;
        self.interval_seconds = preset.interval_seconds;
        self.max_per_hour = preset.max_per_hour;
        self.max_per_day = preset.max_per_day;
    }

    /// Allow sending around the clock on every day.
    pub fn unrestricted(mut self) -> Self {
        self.allowed_start = NaiveTime::default();
        self.allowed_end = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
        self.allowed_days = vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        self
    }

    /// Nominal interval between messages.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds as u64)
    }

    /// Reject values the scheduler cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.interval_seconds == 0 {
            return Err(ThrottleError::InvalidConfig(
                "interval_seconds must be greater than zero".to_string(),
            ));
        }
        if self.max_per_hour == 0 || self.max_per_day == 0 {
            return Err(ThrottleError::InvalidConfig(
                "hourly and daily limits must be greater than zero".to_string(),
            ));
        }
        if self.jitter_percent > 100 {
            return Err(ThrottleError::InvalidConfig(format!(
                "jitter_percent must be at most 100, got {}",
                self.jitter_percent
            )));
        }
        if self.allowed_start >= self.allowed_end {
            return Err(ThrottleError::InvalidConfig(format!(
                "allowed window {} - {} is empty",
                self.allowed_start.format("%H:%M"),
                self.allowed_end.format("%H:%M")
            )));
        }
        if self.allowed_days.is_empty() {
            return Err(ThrottleError::InvalidConfig(
                "at least one allowed day is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `at` falls on an allowed day inside the allowed window.
    pub fn is_allowed_at<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        let time = at.time().with_nanosecond(0).unwrap_or_else(|| at.time());
        self.allowed_days.contains(&at.weekday())
            && time >= self.allowed_start
            && time <= self.allowed_end
    }

    /// Delay before the next message.
    ///
    /// With `randomize_interval`, the delay is uniform over
    /// `interval ± jitter_percent`, so its mean stays at the nominal interval.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let nominal = self.interval_seconds as f64;
        if !self.randomize_interval || self.jitter_percent == 0 {
            return self.interval();
        }

        let band = nominal * f64::from(self.jitter_percent.min(100)) / 100.0;
        let secs = rng.gen_range((nominal - band)..=(nominal + band));
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// `HH:MM` (or `HH:MM:SS`) time-of-day serialization.
mod time_of_day {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|e| serde::de::Error::custom(format!("invalid time of day {:?}: {}", raw, e)))
    }
}
