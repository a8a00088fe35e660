//! Time utilities for gymtrack
//!
//! Provides wall-clock time (for check-in timestamps and local calendar
//! dates) and monotonic time (for the two-tap confirmation window).
//!
//! # Mock Time for Development
//!
//! In debug builds, the `GYMTRACK_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is
//! useful for exercising streaks across several days and midnight crossovers.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 23:58:00`)
//!
//! Example:
//! ```bash
//! GYMTRACK_MOCK_TIME="2025-12-25 23:58:00" gymtrack --user u1 check-in
//! ```

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "GYMTRACK_MOCK_TIME";

/// Format of local calendar date keys stored on check-in history records
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

/// Initialize the mock time offset based on the environment variable.
/// Returns the offset between mock time and real time at process start.
#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    Ok(naive_dt) => match Local.from_local_datetime(&naive_dt).single() {
                        Some(mock_dt) => {
                            let offset = mock_dt.signed_duration_since(chrono::Local::now());
                            tracing::info!(
                                mock_time = %mock_time_str,
                                offset_secs = offset.num_seconds(),
                                "Mock time enabled"
                            );
                            return Some(offset);
                        }
                        None => tracing::warn!(
                            mock_time = %mock_time_str,
                            "Failed to convert mock time to local timezone"
                        ),
                    },
                    Err(_) => tracing::warn!(
                        mock_time = %mock_time_str,
                        expected_format = "%Y-%m-%d %H:%M:%S",
                        "Invalid mock time format"
                    ),
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// Local calendar date of an instant, in the device's timezone (never UTC).
pub fn local_date<Tz: TimeZone>(dt: &DateTime<Tz>) -> NaiveDate {
    dt.with_timezone(&Local).date_naive()
}

/// `YYYY-MM-DD` key for a calendar date.
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// `YYYY-MM-DD` key of the local calendar day containing `dt`.
pub fn local_date_key<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    date_key(local_date(dt))
}

/// Parse a `YYYY-MM-DD` date key.
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key.trim(), DATE_KEY_FORMAT).ok()
}

/// Coarse "time ago" label used for notification lists.
pub fn format_relative(then: &DateTime<Local>, now: &DateTime<Local>) -> String {
    let diff = now.signed_duration_since(*then);
    let mins = diff.num_minutes();
    let hours = mins / 60;
    let days = hours / 24;

    if mins < 1 {
        "Just now".to_string()
    } else if mins < 60 {
        format!("{}m ago", mins)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 7 {
        format!("{}d ago", days)
    } else {
        then.format("%b %-d").to_string()
    }
}

/// Greeting for the hour of day (0-23).
pub fn greeting(hour: u32) -> &'static str {
    if hour < 12 {
        "Good Morning"
    } else if hour < 17 {
        "Good Afternoon"
    } else {
        "Good Evening"
    }
}

/// Represents a point in monotonic time for confirmation windows.
/// This is immune to wall-clock changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicInstant(Instant);

impl MonotonicInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn duration_since(&self, earlier: MonotonicInstant) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }
}

impl std::ops::Add<Duration> for MonotonicInstant {
    type Output = MonotonicInstant;

    fn add(self, rhs: Duration) -> Self::Output {
        MonotonicInstant(self.0 + rhs)
    }
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    format_seconds(d.as_secs())
}

/// Same as [`format_duration`] for a plain seconds counter
pub fn format_seconds(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Utc};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
        assert_eq!(format_seconds(0), "0s");
    }

    #[test]
    fn test_date_key_round_trip_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(date_key(date), "2024-01-05");
        assert_eq!(parse_date_key("2024-01-05"), Some(date));
    }

    #[test]
    fn test_parse_date_key_rejects_garbage() {
        assert_eq!(parse_date_key(""), None);
        assert_eq!(parse_date_key("2024/01/05"), None);
        assert_eq!(parse_date_key("2024-13-01"), None);
    }

    #[test]
    fn test_local_date_key_uses_local_calendar_day() {
        // 00:02 local belongs to the new day even if UTC is still on the old one
        let dt = Local.with_ymd_and_hms(2024, 3, 10, 0, 2, 0).unwrap();
        assert_eq!(local_date_key(&dt), "2024-03-10");

        let as_utc = dt.with_timezone(&Utc);
        assert_eq!(local_date_key(&as_utc), "2024-03-10");
    }

    #[test]
    fn test_format_relative() {
        let now = Local.with_ymd_and_hms(2025, 6, 20, 12, 0, 0).unwrap();
        assert_eq!(format_relative(&now, &now), "Just now");
        assert_eq!(
            format_relative(&(now - chrono::Duration::minutes(5)), &now),
            "5m ago"
        );
        assert_eq!(
            format_relative(&(now - chrono::Duration::hours(3)), &now),
            "3h ago"
        );
        assert_eq!(
            format_relative(&(now - chrono::Duration::days(2)), &now),
            "2d ago"
        );
        let old = Local.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(format_relative(&old, &now), "Jun 1");
    }

    #[test]
    fn test_greeting() {
        assert_eq!(greeting(6), "Good Morning");
        assert_eq!(greeting(12), "Good Afternoon");
        assert_eq!(greeting(16), "Good Afternoon");
        assert_eq!(greeting(17), "Good Evening");
    }

    #[test]
    fn test_monotonic_instant() {
        let t1 = MonotonicInstant::now();
        let t2 = t1 + Duration::from_secs(3);

        assert!(t2 > t1);
        assert_eq!(t2.duration_since(t1), Duration::from_secs(3));
        assert_eq!(t1.duration_since(t2), Duration::ZERO);
    }

    #[test]
    fn test_now_returns_time() {
        let t = now();
        assert!(t.year() >= 2020);
        assert!(t.year() <= 2100);
    }

    #[test]
    fn test_mock_time_env_var_name() {
        assert_eq!(MOCK_TIME_ENV_VAR, "GYMTRACK_MOCK_TIME");
    }
}
