//! Configuration validation

use crate::schema::RawConfig;
use crate::settings::{DEFAULT_CONFIRM_WINDOW_SECS, DEFAULT_TICK_INTERVAL_MS};
use gymtrack_api::{CrowdThresholds, SlotBoundaries};
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid hour {value} for '{field}': must be 0-23")]
    InvalidHour { field: &'static str, value: u32 },

    #[error("Time slot boundaries must be increasing: morning {morning} < evening {evening} < night {night}")]
    SlotOrder { morning: u32, evening: u32, night: u32 },

    #[error("'{0}' must be greater than zero")]
    NotPositive(&'static str),

    #[error("Crowd thresholds must satisfy low_max {low_max} < medium_max {medium_max}")]
    CrowdOrder { low_max: u64, medium_max: u64 },
}

/// Validate a raw configuration, collecting every problem
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_time_slots(config));

    let tracker = &config.tracker;
    if tracker.confirm_window_seconds.unwrap_or(DEFAULT_CONFIRM_WINDOW_SECS) == 0 {
        errors.push(ValidationError::NotPositive("tracker.confirm_window_seconds"));
    }
    if tracker.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS) == 0 {
        errors.push(ValidationError::NotPositive("tracker.tick_interval_ms"));
    }

    let defaults = CrowdThresholds::default();
    let low_max = config.crowd.low_max.unwrap_or(defaults.low_max);
    let medium_max = config.crowd.medium_max.unwrap_or(defaults.medium_max);
    if low_max >= medium_max {
        errors.push(ValidationError::CrowdOrder { low_max, medium_max });
    }

    errors
}

fn validate_time_slots(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let defaults = SlotBoundaries::default();
    let slots = &config.time_slots;

    let hours = [
        (
            "time_slots.morning_start_hour",
            slots.morning_start_hour.unwrap_or(defaults.morning_start),
        ),
        (
            "time_slots.evening_start_hour",
            slots.evening_start_hour.unwrap_or(defaults.evening_start),
        ),
        (
            "time_slots.night_start_hour",
            slots.night_start_hour.unwrap_or(defaults.night_start),
        ),
    ];

    for (field, value) in hours {
        if value >= 24 {
            errors.push(ValidationError::InvalidHour { field, value });
        }
    }

    let [(_, morning), (_, evening), (_, night)] = hours;
    if !(morning < evening && evening < night) {
        errors.push(ValidationError::SlotOrder {
            morning,
            evening,
            night,
        });
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(toml_str: &str) -> RawConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&raw("config_version = 1")).is_empty());
    }

    #[test]
    fn out_of_range_hour() {
        let errors = validate_config(&raw(
            r#"
            config_version = 1
            [time_slots]
            night_start_hour = 24
            "#,
        ));
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::InvalidHour { field: "time_slots.night_start_hour", value: 24 }
        )));
    }

    #[test]
    fn slots_must_increase() {
        let errors = validate_config(&raw(
            r#"
            config_version = 1
            [time_slots]
            morning_start_hour = 17
            "#,
        ));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::SlotOrder { .. })));
    }

    #[test]
    fn collects_every_error() {
        let errors = validate_config(&raw(
            r#"
            config_version = 1
            [tracker]
            confirm_window_seconds = 0
            tick_interval_ms = 0
            [crowd]
            low_max = 30
            medium_max = 30
            "#,
        ));
        assert_eq!(errors.len(), 3);
    }
}
