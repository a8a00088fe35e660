//! Shared types for the gymtrack domain

use chrono::{DateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserRole {
    SuperAdmin,
    GymAdmin,
    #[default]
    Member,
}

/// Membership enrollment state; only `Approved` permits check-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    #[default]
    None,
    Pending,
    Approved,
    Rejected,
}

/// How the member paid (or intends to pay) for the membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "online")]
    Online,
    #[serde(rename = "offline")]
    Offline,
    #[serde(rename = "Quarterly")]
    Quarterly,
    #[serde(rename = "6-Month")]
    SixMonth,
}

impl PaymentMethod {
    pub fn plan_name(&self) -> &'static str {
        match self {
            PaymentMethod::Online => "Monthly Plan (Online)",
            PaymentMethod::Offline => "Offline Payment",
            PaymentMethod::Quarterly => "3 Month Plan",
            PaymentMethod::SixMonth => "6 Month Plan",
        }
    }

    /// Online payments must carry a transaction reference
    pub fn requires_transaction_id(&self) -> bool {
        matches!(self, PaymentMethod::Online)
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(PaymentMethod::Online),
            "offline" => Ok(PaymentMethod::Offline),
            "Quarterly" | "quarterly" => Ok(PaymentMethod::Quarterly),
            "6-Month" | "6-month" | "six-month" => Ok(PaymentMethod::SixMonth),
            other => Err(format!("unknown payment method '{}'", other)),
        }
    }
}

/// Hour-of-day boundaries that split the day into time slots.
///
/// `[morning_start, evening_start)` is Morning, `[evening_start, night_start)`
/// is Evening, and everything else (wrapping past midnight) is Night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotBoundaries {
    pub morning_start: u32,
    pub evening_start: u32,
    pub night_start: u32,
}

impl Default for SlotBoundaries {
    fn default() -> Self {
        Self {
            morning_start: 6,
            evening_start: 16,
            night_start: 21,
        }
    }
}

/// Training time slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeSlot {
    Morning,
    Evening,
    Night,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 3] = [TimeSlot::Morning, TimeSlot::Evening, TimeSlot::Night];

    /// Slot containing the given hour (0-23)
    pub fn for_hour(bounds: &SlotBoundaries, hour: u32) -> Self {
        if hour >= bounds.morning_start && hour < bounds.evening_start {
            TimeSlot::Morning
        } else if hour >= bounds.evening_start && hour < bounds.night_start {
            TimeSlot::Evening
        } else {
            TimeSlot::Night
        }
    }

    /// Slot containing the given instant, using its own (local) hour
    pub fn for_time<Tz: TimeZone>(bounds: &SlotBoundaries, dt: &DateTime<Tz>) -> Self {
        Self::for_hour(bounds, dt.hour())
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimeSlot::Morning => "Morning",
            TimeSlot::Evening => "Evening",
            TimeSlot::Night => "Night",
        }
    }

    /// e.g. "Morning (6 AM - 4 PM)"
    pub fn display_range(&self, bounds: &SlotBoundaries) -> String {
        let (start, end) = match self {
            TimeSlot::Morning => (bounds.morning_start, bounds.evening_start),
            TimeSlot::Evening => (bounds.evening_start, bounds.night_start),
            TimeSlot::Night => (bounds.night_start, bounds.morning_start),
        };
        format!("{} ({} - {})", self.name(), format_hour(start), format_hour(end))
    }
}

fn format_hour(hour: u32) -> String {
    match hour % 24 {
        0 => "12 AM".to_string(),
        12 => "12 PM".to_string(),
        h if h < 12 => format!("{} AM", h),
        h => format!("{} PM", h - 12),
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TimeSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "morning" => Ok(TimeSlot::Morning),
            "evening" => Ok(TimeSlot::Evening),
            "night" => Ok(TimeSlot::Night),
            other => Err(format!("unknown time slot '{}'", other)),
        }
    }
}

/// Member-count thresholds for crowd labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrowdThresholds {
    pub low_max: u64,
    pub medium_max: u64,
}

impl Default for CrowdThresholds {
    fn default() -> Self {
        Self {
            low_max: 10,
            medium_max: 25,
        }
    }
}

/// How busy a time slot is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CrowdLevel {
    Empty,
    Low,
    Medium,
    High,
}

impl CrowdLevel {
    pub fn for_count(thresholds: &CrowdThresholds, count: u64) -> Self {
        if count == 0 {
            CrowdLevel::Empty
        } else if count <= thresholds.low_max {
            CrowdLevel::Low
        } else if count <= thresholds.medium_max {
            CrowdLevel::Medium
        } else {
            CrowdLevel::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CrowdLevel::Empty => "Empty",
            CrowdLevel::Low => "Low",
            CrowdLevel::Medium => "Medium",
            CrowdLevel::High => "High",
        }
    }
}

/// Category of a gym issue report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueType {
    Equipment,
    Cleanliness,
    Staff,
    Safety,
    Other,
}

impl FromStr for IssueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "equipment" => Ok(IssueType::Equipment),
            "cleanliness" => Ok(IssueType::Cleanliness),
            "staff" => Ok(IssueType::Staff),
            "safety" => Ok(IssueType::Safety),
            "other" => Ok(IssueType::Other),
            other => Err(format!("unknown issue type '{}'", other)),
        }
    }
}

/// Admin-side progress of an issue report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Pending,
    Reviewed,
    Resolved,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Reviewed => "reviewed",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Rejected => "rejected",
        }
    }
}

/// States of the check-in button flow.
///
/// Presses move `Idle -> ConfirmArmed -> Active` and
/// `Active -> StoppingConfirmArmed -> Idle`; an armed state that is not
/// confirmed in time falls back to where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    Idle,
    ConfirmArmed,
    Active,
    StoppingConfirmArmed,
}

impl TrackerState {
    /// Whether a session is open (including while checkout is armed)
    pub fn is_checked_in(&self) -> bool {
        matches!(self, TrackerState::Active | TrackerState::StoppingConfirmArmed)
    }
}
