//! Validated settings

use crate::schema::RawConfig;
use gymtrack_api::{CrowdThresholds, SlotBoundaries};
use gymtrack_util::default_data_dir;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIRM_WINDOW_SECS: u64 = 3;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Validated settings ready for use by the engine
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub tracker: TrackerSettings,
    pub slots: SlotBoundaries,
    pub crowd: CrowdThresholds,
}

/// Check-in tracker timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    /// How long an armed press waits for its confirming press
    pub confirm_window: Duration,

    /// Session timer period; each tick adds one second to the timer
    pub tick_interval: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            confirm_window: Duration::from_secs(DEFAULT_CONFIRM_WINDOW_SECS),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
        }
    }
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let slot_defaults = SlotBoundaries::default();
        let crowd_defaults = CrowdThresholds::default();

        Self {
            data_dir: raw.store.data_dir.unwrap_or_else(default_data_dir),
            tracker: TrackerSettings {
                confirm_window: Duration::from_secs(
                    raw.tracker
                        .confirm_window_seconds
                        .unwrap_or(DEFAULT_CONFIRM_WINDOW_SECS),
                ),
                tick_interval: Duration::from_millis(
                    raw.tracker.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS),
                ),
            },
            slots: SlotBoundaries {
                morning_start: raw
                    .time_slots
                    .morning_start_hour
                    .unwrap_or(slot_defaults.morning_start),
                evening_start: raw
                    .time_slots
                    .evening_start_hour
                    .unwrap_or(slot_defaults.evening_start),
                night_start: raw
                    .time_slots
                    .night_start_hour
                    .unwrap_or(slot_defaults.night_start),
            },
            crowd: CrowdThresholds {
                low_max: raw.crowd.low_max.unwrap_or(crowd_defaults.low_max),
                medium_max: raw.crowd.medium_max.unwrap_or(crowd_defaults.medium_max),
            },
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            tracker: TrackerSettings::default(),
            slots: SlotBoundaries::default(),
            crowd: CrowdThresholds::default(),
        }
    }
}
