//! Queue completion projection.
//!
//! Walks the queue one message at a time from `now`: each send is pushed
//! forward past disallowed days and hours, past a full hourly bucket, and
//! past a full day, then the cursor advances by the nominal interval. Jitter
//! only spreads individual delays around the interval, so the nominal value
//! is used for the point estimate.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use super::settings::SendingConfig;

/// What first pushed the projected schedule beyond plain pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleConstraint {
    /// Nothing; messages go out back to back at the interval
    None,
    /// A send fell outside the allowed hours or days
    AllowedWindow,
    /// The hourly cap forced a wait
    HourlyLimit,
    /// The daily cap forced spillover to another day
    DailyLimit,
}

/// Projected timing for sending a queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSchedulePreview {
    /// Messages in the queue
    pub total_messages: u32,
    /// Nominal seconds between messages
    pub interval_seconds: u32,
    /// Active pacing time, `total_messages × interval_seconds` in minutes
    pub estimated_duration_minutes: f64,
    /// When the first message goes out
    pub first_send_at: Option<DateTime<FixedOffset>>,
    /// When the queue is projected to be done
    pub estimated_end_time: DateTime<FixedOffset>,
    /// Calendar days spanned by the sends
    pub estimated_days: u32,
    /// Effective throughput while sending
    pub messages_per_hour: u32,
    /// First constraint that delayed the schedule
    pub limited_by: ScheduleConstraint,
}

/// Project when a queue of `total_messages` finishes, starting at `now`.
///
/// Expects a validated configuration; zero caps are treated as one so the
/// walk always terminates.
pub fn project_schedule(
    total_messages: u32,
    config: &SendingConfig,
    now: DateTime<FixedOffset>,
) -> QueueSchedulePreview {
    let interval_seconds = config.interval_seconds;
    let max_per_hour = config.max_per_hour.max(1);
    let max_per_day = config.max_per_day.max(1);

    let pace_per_hour = if interval_seconds == 0 {
        max_per_hour
    } else {
        3600 / interval_seconds
    };

    let mut preview = QueueSchedulePreview {
        total_messages,
        interval_seconds,
        estimated_duration_minutes: f64::from(total_messages) * f64::from(interval_seconds) / 60.0,
        first_send_at: None,
        estimated_end_time: now,
        estimated_days: 0,
        messages_per_hour: pace_per_hour.min(max_per_hour),
        limited_by: ScheduleConstraint::None,
    };

    if total_messages == 0 {
        return preview;
    }

    let interval = Duration::seconds(i64::from(interval_seconds));
    let hour = Duration::hours(1);

    let mut cursor = now;
    let mut limited_by: Option<ScheduleConstraint> = None;
    let mut hour_start: Option<DateTime<FixedOffset>> = None;
    let mut hour_count = 0u32;
    let mut day: Option<NaiveDate> = None;
    let mut day_count = 0u32;
    let mut first: Option<DateTime<FixedOffset>> = None;
    let mut last = now;

    for _ in 0..total_messages {
        loop {
            let allowed = next_allowed(config, cursor);
            if allowed != cursor {
                limited_by.get_or_insert(ScheduleConstraint::AllowedWindow);
                cursor = allowed;
            }

            let date = cursor.date_naive();
            if day != Some(date) {
                day = Some(date);
                day_count = 0;
            }
            if day_count >= max_per_day {
                limited_by.get_or_insert(ScheduleConstraint::DailyLimit);
                cursor = start_of_next_day(cursor);
                continue;
            }

            let bucket = match hour_start {
                Some(start) if cursor - start < hour => start,
                _ => {
                    hour_count = 0;
                    cursor
                }
            };
            hour_start = Some(bucket);
            if hour_count >= max_per_hour {
                limited_by.get_or_insert(ScheduleConstraint::HourlyLimit);
                cursor = bucket + hour;
                continue;
            }

            break;
        }

        first.get_or_insert(cursor);
        last = cursor;
        hour_count += 1;
        day_count += 1;
        cursor = cursor + interval;
    }

    let first = first.unwrap_or(now);
    let days = (last.date_naive() - first.date_naive()).num_days() + 1;

    preview.first_send_at = Some(first);
    preview.estimated_end_time = cursor;
    preview.estimated_days = days.max(1) as u32;
    preview.limited_by = limited_by.unwrap_or(ScheduleConstraint::None);
    preview
}

/// The earliest allowed instant at or after `at`.
///
/// Returns `at` unchanged when no allowed instant exists within a week,
/// which only happens for configurations that fail validation.
fn next_allowed(config: &SendingConfig, at: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let offset = *at.offset();
    let mut candidate = at;

    for _ in 0..8 {
        if config.is_allowed_at(&candidate) {
            return candidate;
        }

        let date = candidate.date_naive();
        if config.allowed_days.contains(&date.weekday()) && candidate.time() < config.allowed_start {
            return local(offset, date.and_time(config.allowed_start));
        }

        match date.succ_opt() {
            Some(next) => candidate = local(offset, next.and_time(config.allowed_start)),
            None => return at,
        }
    }

    at
}

fn start_of_next_day(at: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    match at.date_naive().succ_opt() {
        Some(next) => local(*at.offset(), next.and_time(NaiveTime::default())),
        None => at + Duration::days(1),
    }
}

fn local(offset: FixedOffset, wall: NaiveDateTime) -> DateTime<FixedOffset> {
    let utc = wall - Duration::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sending::SendProfile;
    use chrono::{TimeZone, Timelike, Weekday};

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    /// Monday 2024-01-01 at the given local time.
    fn monday(h: u32, m: u32) -> DateTime<FixedOffset> {
        brt().with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_zero_messages_ends_now() {
        let now = monday(10, 0);
        let preview = project_schedule(0, &SendingConfig::default(), now);

        assert_eq!(preview.estimated_days, 0);
        assert_eq!(preview.estimated_end_time, now);
        assert_eq!(preview.estimated_duration_minutes, 0.0);
        assert!(preview.first_send_at.is_none());
    }

    #[test]
    fn test_unconstrained_pacing() {
        let config = SendingConfig::with_profile(SendProfile::Moderate).unrestricted();
        let now = monday(10, 0);
        let preview = project_schedule(10, &config, now);

        assert_eq!(preview.first_send_at, Some(now));
        assert_eq!(preview.estimated_end_time, now + Duration::seconds(300));
        assert_eq!(preview.estimated_days, 1);
        assert_eq!(preview.limited_by, ScheduleConstraint::None);
        assert_eq!(preview.messages_per_hour, 40);
    }

    #[test]
    fn test_test_profile_duration_and_hourly_spillover() {
        let config = SendingConfig::with_profile(SendProfile::Test).unrestricted();
        let now = monday(10, 0);
        let preview = project_schedule(10, &config, now);

        assert!((preview.estimated_duration_minutes - 100.0 / 60.0).abs() < 1e-9);
        assert_eq!(preview.messages_per_hour, 5);
        // Five go out, then the hourly cap holds the rest for an hour.
        assert_eq!(preview.limited_by, ScheduleConstraint::HourlyLimit);
        assert_eq!(
            preview.estimated_end_time,
            now + Duration::seconds(3600 + 50)
        );
        assert_eq!(preview.estimated_days, 1);
    }

    #[test]
    fn test_daily_cap_spills_to_next_day() {
        let mut config = SendingConfig::with_profile(SendProfile::Test).unrestricted();
        config.max_per_hour = 100;
        let now = monday(10, 0);
        let preview = project_schedule(15, &config, now);

        assert_eq!(preview.limited_by, ScheduleConstraint::DailyLimit);
        assert_eq!(preview.estimated_days, 2);
        // Messages 11-15 start at midnight Tuesday.
        let tuesday = brt().with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(preview.estimated_end_time, tuesday + Duration::seconds(50));
    }

    #[test]
    fn test_starts_at_allowed_window() {
        let config = SendingConfig::with_profile(SendProfile::Conservative);
        let now = monday(6, 30);
        let preview = project_schedule(3, &config, now);

        assert_eq!(preview.first_send_at, Some(monday(8, 0)));
        assert_eq!(preview.limited_by, ScheduleConstraint::AllowedWindow);
        assert_eq!(preview.estimated_end_time, monday(8, 3));
    }

    #[test]
    fn test_skips_past_window_end_and_disallowed_days() {
        let mut config = SendingConfig::with_profile(SendProfile::Conservative);
        config.allowed_days = vec![Weekday::Mon, Weekday::Wed];
        config.max_per_hour = 1_000;
        config.max_per_day = 1_000;

        // 19:58, 19:59 and 20:00 still fit today.
        let now = monday(19, 58);
        let preview = project_schedule(4, &config, now);

        let first = preview.first_send_at.unwrap();
        assert_eq!(first, now);
        // Tuesday is skipped, the last one goes out Wednesday morning.
        let wednesday = brt().with_ymd_and_hms(2024, 1, 3, 8, 0, 0).unwrap();
        assert_eq!(preview.estimated_end_time, wednesday + Duration::seconds(60));
        assert_eq!(preview.estimated_days, 3);
        assert_eq!(preview.limited_by, ScheduleConstraint::AllowedWindow);
    }

    #[test]
    fn test_window_end_is_inclusive() {
        let config = SendingConfig::with_profile(SendProfile::Conservative);
        let preview = project_schedule(1, &config, monday(20, 0));
        assert_eq!(preview.first_send_at, Some(monday(20, 0)));
    }

    #[test]
    fn test_keeps_callers_offset() {
        let config = SendingConfig::default();
        let preview = project_schedule(1, &config, monday(5, 0));
        let first = preview.first_send_at.unwrap();

        assert_eq!(first.offset(), &brt());
        assert_eq!(first.hour(), 8);
    }

    #[test]
    fn test_next_allowed_gives_up_on_invalid_config() {
        let mut config = SendingConfig::default();
        config.allowed_days.clear();
        let now = monday(10, 0);
        assert_eq!(next_allowed(&config, now), now);
    }
}
