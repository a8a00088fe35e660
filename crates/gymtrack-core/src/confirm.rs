//! Two-tap confirmation state machine for the check-in button

use gymtrack_api::TrackerState;
use gymtrack_util::MonotonicInstant;
use std::time::Duration;

/// Operation a confirmed press should run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    CheckIn,
    CheckOut,
}

/// Result of a single press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    /// First tap; a second tap before `expires_at` confirms
    Armed {
        action: ConfirmAction,
        expires_at: MonotonicInstant,
    },
    /// Second tap inside the window
    Confirmed(ConfirmAction),
}

/// Tracks which confirmation (if any) is armed.
///
/// A confirmed press moves optimistically to the operation's target state;
/// the caller reports the real outcome with [`ConfirmFlow::settle`].
#[derive(Debug)]
pub struct ConfirmFlow {
    state: TrackerState,
    armed_at: Option<MonotonicInstant>,
    window: Duration,
}

impl ConfirmFlow {
    pub fn new(window: Duration) -> Self {
        Self {
            state: TrackerState::Idle,
            armed_at: None,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Current state as of `now`, without mutating
    pub fn state_at(&self, now: MonotonicInstant) -> TrackerState {
        if self.is_expired(now) {
            Self::disarmed(self.state)
        } else {
            self.state
        }
    }

    /// Drop an armed confirmation whose window has passed.
    /// Returns the state it fell back to.
    pub fn expire(&mut self, now: MonotonicInstant) -> Option<TrackerState> {
        if !self.is_expired(now) {
            return None;
        }
        self.state = Self::disarmed(self.state);
        self.armed_at = None;
        Some(self.state)
    }

    pub fn press(&mut self, now: MonotonicInstant) -> Press {
        self.expire(now);

        match self.state {
            TrackerState::Idle => self.arm(TrackerState::ConfirmArmed, ConfirmAction::CheckIn, now),
            TrackerState::Active => {
                self.arm(TrackerState::StoppingConfirmArmed, ConfirmAction::CheckOut, now)
            }
            TrackerState::ConfirmArmed => {
                self.armed_at = None;
                self.state = TrackerState::Active;
                Press::Confirmed(ConfirmAction::CheckIn)
            }
            TrackerState::StoppingConfirmArmed => {
                self.armed_at = None;
                self.state = TrackerState::Idle;
                Press::Confirmed(ConfirmAction::CheckOut)
            }
        }
    }

    /// Align with the tracker after an operation ran (or on load)
    pub fn settle(&mut self, checked_in: bool) {
        self.armed_at = None;
        self.state = if checked_in {
            TrackerState::Active
        } else {
            TrackerState::Idle
        };
    }

    fn arm(&mut self, state: TrackerState, action: ConfirmAction, now: MonotonicInstant) -> Press {
        self.state = state;
        self.armed_at = Some(now);
        Press::Armed {
            action,
            expires_at: now + self.window,
        }
    }

    fn is_expired(&self, now: MonotonicInstant) -> bool {
        self.armed_at
            .is_some_and(|armed| now.duration_since(armed) >= self.window)
    }

    fn disarmed(state: TrackerState) -> TrackerState {
        match state {
            TrackerState::ConfirmArmed => TrackerState::Idle,
            TrackerState::StoppingConfirmArmed => TrackerState::Active,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(3);

    #[test]
    fn check_in_needs_two_presses() {
        let mut flow = ConfirmFlow::new(WINDOW);
        let t0 = MonotonicInstant::now();

        assert!(matches!(
            flow.press(t0),
            Press::Armed { action: ConfirmAction::CheckIn, .. }
        ));
        assert_eq!(flow.state_at(t0), TrackerState::ConfirmArmed);

        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(flow.press(t1), Press::Confirmed(ConfirmAction::CheckIn));
        assert_eq!(flow.state_at(t1), TrackerState::Active);
    }

    #[test]
    fn armed_check_in_times_out_to_idle() {
        let mut flow = ConfirmFlow::new(WINDOW);
        let t0 = MonotonicInstant::now();
        flow.press(t0);

        let late = t0 + Duration::from_secs(3);
        assert_eq!(flow.state_at(late), TrackerState::Idle);

        // A late second tap arms again instead of confirming
        assert!(matches!(flow.press(late), Press::Armed { .. }));
    }

    #[test]
    fn armed_check_out_times_out_to_active() {
        let mut flow = ConfirmFlow::new(WINDOW);
        flow.settle(true);
        let t0 = MonotonicInstant::now();

        assert!(matches!(
            flow.press(t0),
            Press::Armed { action: ConfirmAction::CheckOut, .. }
        ));
        assert_eq!(flow.state_at(t0), TrackerState::StoppingConfirmArmed);

        let later = t0 + Duration::from_secs(5);
        assert_eq!(flow.expire(later), Some(TrackerState::Active));
        assert_eq!(flow.expire(later), None);
    }

    #[test]
    fn check_out_confirm() {
        let mut flow = ConfirmFlow::new(WINDOW);
        flow.settle(true);
        let t0 = MonotonicInstant::now();
        flow.press(t0);

        let t1 = t0 + Duration::from_millis(2900);
        assert_eq!(flow.press(t1), Press::Confirmed(ConfirmAction::CheckOut));
        assert_eq!(flow.state_at(t1), TrackerState::Idle);
    }

    #[test]
    fn settle_after_failed_check_in() {
        let mut flow = ConfirmFlow::new(WINDOW);
        let t0 = MonotonicInstant::now();
        flow.press(t0);
        flow.press(t0);
        flow.settle(false);
        assert_eq!(flow.state_at(t0), TrackerState::Idle);
    }
}
