//! Core events emitted by the engine

use chrono::{DateTime, Local, NaiveDate};
use gymtrack_api::{TimeSlot, TrackerState};
use gymtrack_util::{GymId, format_seconds};
use std::time::Duration;

use crate::ConfirmAction;

/// Outcome of an engine operation, with a user-facing message
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// First tap registered; press again within `window` to confirm
    ConfirmArmed {
        action: ConfirmAction,
        window: Duration,
    },

    /// An armed confirmation lapsed
    ConfirmExpired { state: TrackerState },

    CheckedIn {
        gym_id: GymId,
        gym_name: String,
        time_slot: TimeSlot,
        start_time: DateTime<Local>,
    },

    /// Check-in did not happen; the member is not checked in
    CheckInFailed { message: String },

    /// The session was recorded. `warning` is set when the history record
    /// was saved but a later step (stats, marker removal) failed.
    CheckedOut {
        date: NaiveDate,
        duration_secs: u64,
        streak: u64,
        total_duration: u64,
        warning: Option<String>,
    },

    /// Check-out did not happen; the session is still running
    CheckOutFailed { message: String },

    /// An active session was found in the store on load
    SessionRecovered {
        start_time: DateTime<Local>,
        elapsed_secs: u64,
    },

    /// No active session in the store; local state was cleared
    SessionCleared,

    /// Load finished with nothing to reconcile
    Loaded { active_members: usize },

    /// The member has not reviewed the gym they are about to leave
    ReviewSuggested { gym_name: String },

    /// Leaving needs an explicit confirmation
    LeaveConfirmationRequired { gym_name: String },

    LeftGym {
        gym_name: String,
        forced_checkout: bool,
    },

    LeaveFailed { message: String },
}

impl CoreEvent {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CoreEvent::CheckInFailed { .. }
                | CoreEvent::CheckOutFailed { .. }
                | CoreEvent::LeaveFailed { .. }
        )
    }

    /// Text to show the member
    pub fn message(&self) -> String {
        match self {
            CoreEvent::ConfirmArmed { action, window } => {
                let verb = match action {
                    ConfirmAction::CheckIn => "check in",
                    ConfirmAction::CheckOut => "check out",
                };
                format!("Tap again within {}s to {}", window.as_secs(), verb)
            }
            CoreEvent::ConfirmExpired { .. } => "Confirmation timed out".to_string(),
            CoreEvent::CheckedIn {
                gym_name,
                time_slot,
                ..
            } => format!("Checked in at {} ({})", gym_name, time_slot),
            CoreEvent::CheckInFailed { message }
            | CoreEvent::CheckOutFailed { message }
            | CoreEvent::LeaveFailed { message } => message.clone(),
            CoreEvent::CheckedOut {
                duration_secs,
                streak,
                warning,
                ..
            } => {
                let mut text = format!(
                    "Checked out after {}. Streak: {} {}",
                    format_seconds(*duration_secs),
                    streak,
                    if *streak == 1 { "day" } else { "days" }
                );
                if let Some(w) = warning {
                    text.push_str(&format!(" ({})", w));
                }
                text
            }
            CoreEvent::SessionRecovered { elapsed_secs, .. } => format!(
                "Resumed session in progress ({})",
                format_seconds(*elapsed_secs)
            ),
            CoreEvent::SessionCleared => "No active session".to_string(),
            CoreEvent::Loaded { active_members } => format!(
                "{} {} currently checked in",
                active_members,
                if *active_members == 1 { "member" } else { "members" }
            ),
            CoreEvent::ReviewSuggested { gym_name } => format!(
                "You're about to leave {}. Please rate it first, or skip the review.",
                gym_name
            ),
            CoreEvent::LeaveConfirmationRequired { gym_name } => format!(
                "Are you sure you want to leave {}? Your membership payment is non-refundable.",
                gym_name
            ),
            CoreEvent::LeftGym { .. } => {
                "You have left the gym. Your streak has been reset to 0.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_out_message() {
        let event = CoreEvent::CheckedOut {
            date: NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
            duration_secs: 3723,
            streak: 1,
            total_duration: 3723,
            warning: None,
        };
        assert_eq!(event.message(), "Checked out after 1h 2m 3s. Streak: 1 day");
        assert!(!event.is_failure());
    }

    #[test]
    fn failure_events() {
        let event = CoreEvent::CheckInFailed {
            message: "Failed to check in. Please try again.".into(),
        };
        assert!(event.is_failure());
        assert_eq!(event.message(), "Failed to check in. Please try again.");
    }
}
