//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    #[serde(default)]
    pub store: RawStoreConfig,

    #[serde(default)]
    pub tracker: RawTrackerConfig,

    #[serde(default)]
    pub time_slots: RawTimeSlots,

    #[serde(default)]
    pub crowd: RawCrowd,
}

/// Local persistence settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawStoreConfig {
    /// Data directory for the local store
    pub data_dir: Option<PathBuf>,
}

/// Check-in tracker timing
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawTrackerConfig {
    /// Two-tap confirmation window (default: 3)
    pub confirm_window_seconds: Option<u64>,

    /// Session timer period (default: 1000)
    pub tick_interval_ms: Option<u64>,
}

/// Hour boundaries between time slots
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawTimeSlots {
    pub morning_start_hour: Option<u32>,
    pub evening_start_hour: Option<u32>,
    pub night_start_hour: Option<u32>,
}

/// Crowd label thresholds (member counts)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawCrowd {
    pub low_max: Option<u64>,
    pub medium_max: Option<u64>,
}
