//! Check-in engine: composes the session tracker, confirmation flow,
//! streak calculator and stats aggregator for one signed-in member

use chrono::{DateTime, Local};
use gymtrack_api::{
    ActiveCheckIn, CheckInRecord, Document, EnrollmentStatus, Gym, SlotBoundaries, TimeSlot,
    TrackerState, UserProfile, collections, to_document,
};
use gymtrack_config::Settings;
use gymtrack_remote::{DocumentStore, FieldFilter};
use gymtrack_util::{GymError, GymId, MonotonicInstant, Result, UserId, date_key, local_date};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::feedback::has_reviewed;
use crate::membership::{load_gym, load_profile};
use crate::{
    ConfirmAction, ConfirmFlow, CoreEvent, Press, SessionTracker, StatsAggregator,
    StreakCalculator, UserStats,
};

const CHECK_IN_FAILED: &str = "Failed to check in. Please try again.";
const CHECK_OUT_FAILED: &str = "Failed to save check-out record. Please try again.";
const LEAVE_FAILED: &str = "Failed to leave gym. Please try again.";

/// Per-member check-in state
pub struct CheckInEngine {
    store: Arc<dyn DocumentStore>,
    slots: SlotBoundaries,
    user_id: UserId,
    profile: Option<UserProfile>,
    gym: Option<Gym>,
    session: SessionTracker,
    confirm: ConfirmFlow,
    streaks: StreakCalculator,
    stats: StatsAggregator,
    cached_stats: UserStats,
    active_members: usize,
}

impl CheckInEngine {
    pub fn new(store: Arc<dyn DocumentStore>, settings: &Settings, user_id: UserId) -> Self {
        debug!(
            user_id = %user_id,
            confirm_window_ms = settings.tracker.confirm_window.as_millis() as u64,
            "Check-in engine created"
        );

        Self {
            streaks: StreakCalculator::new(Arc::clone(&store)),
            stats: StatsAggregator::new(Arc::clone(&store)),
            store,
            slots: settings.slots,
            user_id,
            profile: None,
            gym: None,
            session: SessionTracker::new(settings.tracker.tick_interval),
            confirm: ConfirmFlow::new(settings.tracker.confirm_window),
            cached_stats: UserStats::default(),
            active_members: 0,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn gym_id(&self) -> Option<&GymId> {
        self.profile.as_ref().and_then(|p| p.gym_id.as_ref())
    }

    pub fn gym(&self) -> Option<&Gym> {
        self.gym.as_ref()
    }

    pub fn gym_name(&self) -> &str {
        self.gym.as_ref().map_or("Unknown Gym", Gym::name_or_default)
    }

    pub fn stats(&self) -> UserStats {
        self.cached_stats
    }

    pub fn active_members(&self) -> usize {
        self.active_members
    }

    pub fn is_checked_in(&self) -> bool {
        self.session.is_checked_in()
    }

    pub fn is_ticking(&self) -> bool {
        self.session.is_ticking()
    }

    pub fn timer_seconds(&self) -> u64 {
        self.session.timer_seconds()
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.session.start_time()
    }

    pub fn current_slot(&self, now: &DateTime<Local>) -> TimeSlot {
        TimeSlot::for_time(&self.slots, now)
    }

    pub fn state(&self, now_mono: MonotonicInstant) -> TrackerState {
        self.confirm.state_at(now_mono)
    }

    /// Read the profile, gym and stats, then reconcile the tracker with the
    /// active-check-in marker in the store
    pub async fn load(&mut self, now: DateTime<Local>) -> Result<CoreEvent> {
        let profile = load_profile(self.store.as_ref(), &self.user_id).await?;

        self.cached_stats = match self.stats.load(&self.user_id).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "Failed to load stats");
                UserStats::default()
            }
        };

        self.gym = match &profile.gym_id {
            Some(gym_id) => match load_gym(self.store.as_ref(), gym_id).await {
                Ok(gym) => Some(gym),
                Err(e) => {
                    warn!(gym_id = %gym_id, error = %e, "Failed to load gym");
                    None
                }
            },
            None => None,
        };
        self.profile = Some(profile);

        info!(
            user_id = %self.user_id,
            gym_id = ?self.gym_id(),
            streak = self.cached_stats.streak,
            "Member loaded"
        );

        Ok(self.refresh(now).await)
    }

    /// Re-run active-session reconciliation for the member's gym
    pub async fn refresh(&mut self, now: DateTime<Local>) -> CoreEvent {
        let Some(gym_id) = self.gym_id().cloned() else {
            let was_checked_in = self.session.is_checked_in();
            self.session.reset();
            self.confirm.settle(false);
            self.active_members = 0;
            return if was_checked_in {
                CoreEvent::SessionCleared
            } else {
                CoreEvent::Loaded { active_members: 0 }
            };
        };

        let rows = match self
            .store
            .query(
                collections::ACTIVE_CHECK_INS,
                &[FieldFilter::eq("gymId", gym_id.as_str())],
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(gym_id = %gym_id, error = %e, "Failed to read active check-ins");
                self.active_members = 0;
                return CoreEvent::Loaded { active_members: 0 };
            }
        };
        self.active_members = rows.len();

        let mut marker = rows
            .into_iter()
            .find(|(id, _)| id.as_str() == self.user_id.as_str())
            .map(|(_, doc)| doc);

        let stale = match &marker {
            Some(doc) => self.already_recorded(doc).await,
            None => false,
        };
        if stale {
            self.discard_marker().await;
            marker = None;
        }

        let event = match marker {
            Some(doc) => {
                let (start_time, elapsed_secs) = recovered_start(&doc, now);
                self.session.start(start_time, elapsed_secs);
                info!(
                    user_id = %self.user_id,
                    start_time = %start_time,
                    elapsed_secs,
                    "Recovered active session"
                );
                CoreEvent::SessionRecovered {
                    start_time,
                    elapsed_secs,
                }
            }
            None => {
                let was_checked_in = self.session.is_checked_in();
                self.session.reset();
                if was_checked_in {
                    info!(user_id = %self.user_id, "Active session no longer in store");
                    CoreEvent::SessionCleared
                } else {
                    CoreEvent::Loaded {
                        active_members: self.active_members,
                    }
                }
            }
        };

        self.confirm.settle(self.session.is_checked_in());
        event
    }

    /// Drop a lapsed confirmation
    pub fn expire_confirmation(&mut self, now_mono: MonotonicInstant) -> Option<CoreEvent> {
        self.confirm
            .expire(now_mono)
            .map(|state| CoreEvent::ConfirmExpired { state })
    }

    /// Handle a tap on the check-in button. The first tap arms the
    /// confirmation; a second tap inside the window runs the operation.
    pub async fn press(&mut self, now: DateTime<Local>, now_mono: MonotonicInstant) -> CoreEvent {
        match self.confirm.press(now_mono) {
            Press::Armed { action, .. } => CoreEvent::ConfirmArmed {
                action,
                window: self.confirm.window(),
            },
            Press::Confirmed(ConfirmAction::CheckIn) => match self.start_session(now).await {
                Ok(event) => event,
                Err(e) => {
                    self.confirm.settle(self.session.is_checked_in());
                    CoreEvent::CheckInFailed {
                        message: e.to_string(),
                    }
                }
            },
            Press::Confirmed(ConfirmAction::CheckOut) => match self.stop_session(now).await {
                Ok(event) => event,
                Err(e) => {
                    self.confirm.settle(self.session.is_checked_in());
                    CoreEvent::CheckOutFailed {
                        message: e.to_string(),
                    }
                }
            },
        }
    }

    /// Check in at the member's gym.
    ///
    /// Precondition failures return an error without touching the store. A
    /// failed marker write is reported as [`CoreEvent::CheckInFailed`] with
    /// local state rolled back.
    pub async fn start_session(&mut self, now: DateTime<Local>) -> Result<CoreEvent> {
        if self.session.is_checked_in() {
            return Err(GymError::AlreadyCheckedIn);
        }
        let profile = self
            .profile
            .as_ref()
            .ok_or_else(|| GymError::UserNotFound(self.user_id.clone()))?;
        let gym_id = profile.gym_id.clone().ok_or(GymError::NotEnrolled)?;
        if !profile.is_approved_at(&gym_id) {
            return Err(GymError::NotEnrolled);
        }

        let gym_name = self.gym_name().to_string();
        let time_slot = self.current_slot(&now);
        let marker = ActiveCheckIn {
            user_id: self.user_id.clone(),
            user_name: profile.name_or_default().to_string(),
            gym_id: gym_id.clone(),
            gym_name: gym_name.clone(),
            time_slot,
            check_in_time: now,
            created_at: now,
        };

        self.session.start(now, 0);

        let written = match to_document(&marker) {
            Ok(doc) => self
                .store
                .set(collections::ACTIVE_CHECK_INS, self.user_id.as_str(), doc)
                .await
                .map_err(GymError::from),
            Err(e) => Err(GymError::internal(e.to_string())),
        };
        if let Err(e) = written {
            warn!(user_id = %self.user_id, error = %e, "Check-in marker write failed");
            self.session.reset();
            self.confirm.settle(false);
            return Ok(CoreEvent::CheckInFailed {
                message: CHECK_IN_FAILED.to_string(),
            });
        }

        self.confirm.settle(true);
        self.active_members += 1;
        info!(
            user_id = %self.user_id,
            gym_id = %gym_id,
            time_slot = %time_slot,
            "Checked in"
        );

        Ok(CoreEvent::CheckedIn {
            gym_id,
            gym_name,
            time_slot,
            start_time: now,
        })
    }

    /// Check out: append history, recompute the streak, persist stats, then
    /// remove the marker.
    ///
    /// If the history write fails the session keeps running. Failures after
    /// that still check the member out and are reported as a warning.
    pub async fn stop_session(&mut self, now: DateTime<Local>) -> Result<CoreEvent> {
        if !self.session.is_checked_in() {
            return Err(GymError::NotCheckedIn);
        }
        let profile = self
            .profile
            .as_ref()
            .ok_or_else(|| GymError::UserNotFound(self.user_id.clone()))?;
        let gym_id = profile.gym_id.clone().ok_or(GymError::NotEnrolled)?;

        let stopped = self.session.stop();
        let duration = stopped.duration_secs;
        let date = local_date(&now);

        let record = CheckInRecord {
            user_id: self.user_id.clone(),
            user_name: profile.name_or_default().to_string(),
            user_email: profile.email.clone(),
            gym_id,
            gym_name: self.gym_name().to_string(),
            time_slot: self.current_slot(&now),
            date: date_key(date),
            check_in_time: stopped.start_time.unwrap_or(now),
            check_out_time: now,
            duration,
            created_at: now,
        };

        let appended = match to_document(&record) {
            Ok(doc) => self
                .store
                .add(collections::CHECK_IN_HISTORY, doc)
                .await
                .map_err(GymError::from),
            Err(e) => Err(GymError::internal(e.to_string())),
        };
        if let Err(e) = appended {
            warn!(user_id = %self.user_id, error = %e, "History write failed, session continues");
            self.session.resume(stopped);
            self.confirm.settle(true);
            return Ok(CoreEvent::CheckOutFailed {
                message: CHECK_OUT_FAILED.to_string(),
            });
        }

        let streak = self
            .streaks
            .calculate(&self.user_id, date, self.cached_stats.streak)
            .await;
        let updated = UserStats {
            streak,
            total_duration: self.cached_stats.total_duration.saturating_add(duration),
        };

        let mut warning = None;
        if let Err(e) = self.stats.persist(&self.user_id, updated, now).await {
            warn!(user_id = %self.user_id, error = %e, "Failed to persist stats");
            warning = Some("stats will update on your next check-out".to_string());
        }
        self.cached_stats = updated;

        if let Err(e) = self
            .store
            .delete(collections::ACTIVE_CHECK_INS, self.user_id.as_str())
            .await
        {
            warn!(user_id = %self.user_id, error = %e, "Failed to remove check-in marker");
            warning.get_or_insert_with(|| "check-in marker was not removed".to_string());
        }

        self.session.reset();
        self.confirm.settle(false);
        self.active_members = self.active_members.saturating_sub(1);

        info!(
            user_id = %self.user_id,
            date = %date,
            duration_secs = duration,
            streak,
            total_duration = updated.total_duration,
            "Checked out"
        );

        Ok(CoreEvent::CheckedOut {
            date,
            duration_secs: duration,
            streak,
            total_duration: updated.total_duration,
            warning,
        })
    }

    /// End the session without recording it. Local state is reset even if
    /// the marker cannot be removed.
    pub async fn force_stop_without_history(&mut self) -> Result<()> {
        let stopped = self.session.stop();
        self.session.reset();
        self.confirm.settle(false);

        self.store
            .delete(collections::ACTIVE_CHECK_INS, self.user_id.as_str())
            .await?;
        self.active_members = self.active_members.saturating_sub(1);

        info!(
            user_id = %self.user_id,
            discarded_secs = stopped.duration_secs,
            "Session ended without history"
        );
        Ok(())
    }

    /// Leave the member's gym.
    ///
    /// Unless `skip_review` is set, a member who has not reviewed the gym is
    /// asked to first. Nothing is changed until `confirmed` is set.
    pub async fn leave_gym(
        &mut self,
        confirmed: bool,
        skip_review: bool,
        now: DateTime<Local>,
    ) -> CoreEvent {
        let Some(gym_id) = self.gym_id().cloned() else {
            return CoreEvent::LeaveFailed {
                message: GymError::NotEnrolled.to_string(),
            };
        };
        let gym_name = self.gym_name().to_string();

        if !skip_review && !self.reviewed(&gym_id).await {
            return CoreEvent::ReviewSuggested { gym_name };
        }
        if !confirmed {
            return CoreEvent::LeaveConfirmationRequired { gym_name };
        }

        let forced_checkout = self.session.is_checked_in();
        if forced_checkout {
            if let Err(e) = self.force_stop_without_history().await {
                warn!(user_id = %self.user_id, error = %e, "Forced check-out incomplete, leaving anyway");
            }
        }

        if let Err(e) = self.stats.reset_on_leave(&self.user_id, now).await {
            warn!(user_id = %self.user_id, error = %e, "Failed to leave gym");
            return CoreEvent::LeaveFailed {
                message: LEAVE_FAILED.to_string(),
            };
        }

        self.cached_stats = UserStats::default();
        if let Some(profile) = self.profile.as_mut() {
            profile.gym_id = None;
            profile.enrollment_status = EnrollmentStatus::None;
            profile.payment_method = None;
            profile.transaction_id = None;
            profile.enrolled_at = None;
            profile.streak = 0;
            profile.total_duration = 0;
            profile.has_reviewed_current_gym = false;
        }
        self.gym = None;
        self.active_members = 0;
        self.confirm.settle(false);

        info!(user_id = %self.user_id, gym_id = %gym_id, forced_checkout, "Left gym");
        CoreEvent::LeftGym {
            gym_name,
            forced_checkout,
        }
    }

    /// Zero the streak, keeping total duration
    pub async fn reset_streak(&mut self, now: DateTime<Local>) -> Result<()> {
        self.stats.reset_streak(&self.user_id, now).await?;
        self.cached_stats.streak = 0;
        Ok(())
    }

    /// Whether a history record already covers the session `marker`
    /// describes. That happens when a checkout saved history but could not
    /// remove the marker.
    async fn already_recorded(&self, marker: &Document) -> bool {
        let Some(check_in_time) = timestamp(marker, "checkInTime") else {
            return false;
        };

        match self
            .store
            .query(
                collections::CHECK_IN_HISTORY,
                &[FieldFilter::eq("userId", self.user_id.as_str())],
            )
            .await
        {
            Ok(rows) => rows
                .iter()
                .any(|(_, record)| timestamp(record, "checkInTime") == Some(check_in_time)),
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "Could not read history to check marker");
                false
            }
        }
    }

    async fn discard_marker(&mut self) {
        warn!(user_id = %self.user_id, "Check-in marker already recorded, removing it");
        if let Err(e) = self
            .store
            .delete(collections::ACTIVE_CHECK_INS, self.user_id.as_str())
            .await
        {
            warn!(user_id = %self.user_id, error = %e, "Failed to remove stale check-in marker");
        }
        self.active_members = self.active_members.saturating_sub(1);
    }

    async fn reviewed(&self, gym_id: &GymId) -> bool {
        if self
            .profile
            .as_ref()
            .is_some_and(|p| p.has_reviewed_current_gym)
        {
            return true;
        }
        match has_reviewed(self.store.as_ref(), &self.user_id, gym_id).await {
            Ok(reviewed) => reviewed,
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "Could not check for a review");
                false
            }
        }
    }
}

fn timestamp(doc: &Document, field: &str) -> Option<DateTime<Local>> {
    doc.get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Local))
}

/// Start time and elapsed seconds from a stored marker. An unreadable
/// `checkInTime` restarts the clock at `now`.
fn recovered_start(doc: &Document, now: DateTime<Local>) -> (DateTime<Local>, u64) {
    match timestamp(doc, "checkInTime") {
        Some(start) => {
            let elapsed = (now - start).num_seconds().max(0) as u64;
            (start, elapsed)
        }
        None => {
            warn!("Active check-in has no readable checkInTime, restarting timer");
            (now, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use gymtrack_remote::{MemoryStore, StoreOp};
    use serde_json::json;
    use std::time::Duration;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).earliest().unwrap()
    }

    fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert(collections::GYMS, "g1", doc(json!({"name": "Iron Den", "isActive": true})));
        store.insert(
            collections::USERS,
            "u1",
            doc(json!({
                "displayName": "Asha",
                "email": "asha@gym.io",
                "gymId": "g1",
                "enrollmentStatus": "approved",
                "streak": 3,
                "totalDuration": 600,
            })),
        );
        store
    }

    fn history(store: &MemoryStore, date: &str) {
        store.insert(
            collections::CHECK_IN_HISTORY,
            &format!("h-{}", date),
            doc(json!({"userId": "u1", "gymId": "g1", "date": date, "duration": 60})),
        );
    }

    async fn loaded(store: &Arc<MemoryStore>, now: DateTime<Local>) -> CheckInEngine {
        let mut engine = CheckInEngine::new(store.clone(), &Settings::default(), UserId::new("u1"));
        engine.load(now).await.unwrap();
        engine
    }

    #[tokio::test(start_paused = true)]
    async fn load_without_marker() {
        let store = seeded();
        let mut engine = CheckInEngine::new(store.clone(), &Settings::default(), UserId::new("u1"));
        let event = engine.load(Local::now()).await.unwrap();

        assert_eq!(event, CoreEvent::Loaded { active_members: 0 });
        assert_eq!(engine.stats(), UserStats { streak: 3, total_duration: 600 });
        assert_eq!(engine.gym_name(), "Iron Den");
        assert!(!engine.is_checked_in());
    }

    #[tokio::test(start_paused = true)]
    async fn load_missing_profile_errors() {
        let store = Arc::new(MemoryStore::new());
        let mut engine = CheckInEngine::new(store, &Settings::default(), UserId::new("ghost"));
        assert!(matches!(
            engine.load(Local::now()).await,
            Err(GymError::UserNotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_session_from_marker() {
        let store = seeded();
        let now = at(2024, 1, 10, 18, 0);
        let start = now - ChronoDuration::seconds(125);
        store.insert(
            collections::ACTIVE_CHECK_INS,
            "u1",
            doc(json!({"userId": "u1", "gymId": "g1", "checkInTime": start.to_rfc3339()})),
        );
        store.insert(
            collections::ACTIVE_CHECK_INS,
            "u2",
            doc(json!({"userId": "u2", "gymId": "g1", "checkInTime": start.to_rfc3339()})),
        );

        let mut engine = CheckInEngine::new(store.clone(), &Settings::default(), UserId::new("u1"));
        let event = engine.load(now).await.unwrap();

        assert_eq!(
            event,
            CoreEvent::SessionRecovered {
                start_time: start,
                elapsed_secs: 125
            }
        );
        assert!(engine.is_checked_in());
        assert!(engine.is_ticking());
        assert_eq!(engine.timer_seconds(), 125);
        assert_eq!(engine.active_members(), 2);
        assert_eq!(engine.state(MonotonicInstant::now()), TrackerState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn marker_removed_elsewhere_clears_session() {
        let store = seeded();
        let now = Local::now();
        let mut engine = loaded(&store, now).await;
        engine.start_session(now).await.unwrap();

        store.delete(collections::ACTIVE_CHECK_INS, "u1").await.unwrap();
        assert_eq!(engine.refresh(now).await, CoreEvent::SessionCleared);
        assert!(!engine.is_checked_in());
        assert_eq!(engine.timer_seconds(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn recorded_session_is_not_recovered() {
        let store = seeded();
        let start = at(2024, 1, 10, 18, 0);
        let mut engine = loaded(&store, start).await;
        engine.start_session(start).await.unwrap();

        store.fail_on(collections::ACTIVE_CHECK_INS, StoreOp::Delete);
        let event = engine.stop_session(at(2024, 1, 10, 19, 0)).await.unwrap();
        let CoreEvent::CheckedOut { warning, total_duration, .. } = event else {
            panic!("expected CheckedOut, got {event:?}");
        };
        assert!(warning.is_some());
        assert_eq!(store.count(collections::ACTIVE_CHECK_INS), 1);
        store.clear_failures();

        let mut restarted = loaded(&store, at(2024, 1, 10, 20, 0)).await;
        assert!(!restarted.is_checked_in());
        assert!(!restarted.is_ticking());
        assert_eq!(restarted.active_members(), 0);
        assert_eq!(store.count(collections::ACTIVE_CHECK_INS), 0);
        assert_eq!(restarted.stats().total_duration, total_duration);

        assert!(matches!(
            restarted.stop_session(at(2024, 1, 10, 20, 0)).await,
            Err(GymError::NotCheckedIn)
        ));
        assert_eq!(store.count(collections::CHECK_IN_HISTORY), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn query_failure_keeps_state() {
        let store = seeded();
        let now = Local::now();
        let mut engine = loaded(&store, now).await;
        engine.start_session(now).await.unwrap();

        store.fail_on(collections::ACTIVE_CHECK_INS, StoreOp::Query);
        assert_eq!(engine.refresh(now).await, CoreEvent::Loaded { active_members: 0 });
        assert!(engine.is_checked_in());
    }

    #[tokio::test(start_paused = true)]
    async fn check_in_writes_marker() {
        let store = seeded();
        let now = at(2024, 1, 10, 7, 30);
        let mut engine = loaded(&store, now).await;

        let event = engine.start_session(now).await.unwrap();
        assert!(matches!(
            event,
            CoreEvent::CheckedIn { time_slot: TimeSlot::Morning, .. }
        ));
        assert!(engine.is_checked_in());
        assert!(engine.is_ticking());

        let marker = store.document(collections::ACTIVE_CHECK_INS, "u1").unwrap();
        assert_eq!(marker.get("gymName"), Some(&json!("Iron Den")));
        assert_eq!(marker.get("userName"), Some(&json!("Asha")));
        assert_eq!(marker.get("timeSlot"), Some(&json!("Morning")));

        assert!(matches!(
            engine.start_session(now).await,
            Err(GymError::AlreadyCheckedIn)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn check_in_requires_approval() {
        let store = seeded();
        store
            .update(collections::USERS, "u1", doc(json!({"enrollmentStatus": "pending"})))
            .await
            .unwrap();
        let mut engine = loaded(&store, Local::now()).await;

        assert!(matches!(
            engine.start_session(Local::now()).await,
            Err(GymError::NotEnrolled)
        ));
        assert_eq!(store.count(collections::ACTIVE_CHECK_INS), 0);
        assert!(!engine.is_checked_in());
    }

    #[tokio::test(start_paused = true)]
    async fn marker_write_failure_rolls_back() {
        let store = seeded();
        let now = Local::now();
        let mut engine = loaded(&store, now).await;
        store.fail_on(collections::ACTIVE_CHECK_INS, StoreOp::Set);

        let event = engine.start_session(now).await.unwrap();
        assert_eq!(
            event,
            CoreEvent::CheckInFailed {
                message: "Failed to check in. Please try again.".into()
            }
        );
        assert!(!engine.is_checked_in());
        assert!(!engine.is_ticking());
        assert_eq!(engine.state(MonotonicInstant::now()), TrackerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn checkout_extends_streak() {
        let store = seeded();
        for d in ["2024-01-01", "2024-01-02", "2024-01-03"] {
            history(&store, d);
        }
        let start = at(2024, 1, 4, 17, 0);
        let mut engine = loaded(&store, start).await;
        engine.start_session(start).await.unwrap();

        let event = engine.stop_session(start + ChronoDuration::hours(1)).await.unwrap();
        let CoreEvent::CheckedOut { streak, warning, date, .. } = event else {
            panic!("expected CheckedOut, got {event:?}");
        };
        assert_eq!(streak, 4);
        assert_eq!(warning, None);
        assert_eq!(date_key(date), "2024-01-04");
        assert_eq!(store.count(collections::ACTIVE_CHECK_INS), 0);
        assert_eq!(store.count(collections::CHECK_IN_HISTORY), 4);

        let profile = store.document(collections::USERS, "u1").unwrap();
        assert_eq!(profile.get("streak"), Some(&json!(4)));
        assert!(!engine.is_checked_in());
        assert_eq!(engine.timer_seconds(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn checkout_after_midnight_uses_checkout_date() {
        let store = seeded();
        let start = at(2024, 1, 10, 23, 58);
        let mut engine = loaded(&store, start).await;
        engine.start_session(start).await.unwrap();
        engine.stop_session(at(2024, 1, 11, 0, 2)).await.unwrap();

        let records = store.documents(collections::CHECK_IN_HISTORY);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("date"), Some(&json!("2024-01-11")));
        assert_eq!(records[0].get("timeSlot"), Some(&json!("Night")));
    }

    #[tokio::test(start_paused = true)]
    async fn checkout_adds_ticked_duration() {
        let store = seeded();
        let now = Local::now();
        let mut engine = loaded(&store, now).await;
        engine.start_session(now).await.unwrap();

        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(engine.timer_seconds(), 4);

        let event = engine.stop_session(now).await.unwrap();
        assert!(matches!(
            event,
            CoreEvent::CheckedOut { duration_secs: 4, total_duration: 604, .. }
        ));
        assert_eq!(engine.stats().total_duration, 604);
    }

    #[tokio::test(start_paused = true)]
    async fn history_failure_keeps_session_running() {
        let store = seeded();
        let now = Local::now();
        let mut engine = loaded(&store, now).await;
        engine.start_session(now).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        store.fail_on(collections::CHECK_IN_HISTORY, StoreOp::Add);
        let event = engine.stop_session(now).await.unwrap();
        assert_eq!(
            event,
            CoreEvent::CheckOutFailed {
                message: "Failed to save check-out record. Please try again.".into()
            }
        );
        assert!(engine.is_checked_in());
        assert!(engine.is_ticking());
        assert_eq!(engine.timer_seconds(), 2);
        assert_eq!(engine.start_time(), Some(now));
        assert_eq!(engine.stats(), UserStats { streak: 3, total_duration: 600 });
        assert_eq!(store.count(collections::ACTIVE_CHECK_INS), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(engine.timer_seconds(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_failure_is_soft() {
        let store = seeded();
        let now = Local::now();
        let mut engine = loaded(&store, now).await;
        engine.start_session(now).await.unwrap();

        store.fail_on(collections::USERS, StoreOp::Update);
        let event = engine.stop_session(now).await.unwrap();
        let CoreEvent::CheckedOut { warning, .. } = event else {
            panic!("expected CheckedOut, got {event:?}");
        };
        assert!(warning.is_some());
        assert!(!engine.is_checked_in());
        assert_eq!(store.count(collections::CHECK_IN_HISTORY), 1);
        assert_eq!(store.count(collections::ACTIVE_CHECK_INS), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_then_start_keeps_one_marker() {
        let store = seeded();
        let now = Local::now();
        let mut engine = loaded(&store, now).await;

        engine.start_session(now).await.unwrap();
        engine.stop_session(now).await.unwrap();
        engine.start_session(now).await.unwrap();

        assert_eq!(store.count(collections::ACTIVE_CHECK_INS), 1);
        assert!(matches!(
            engine.stop_session(now).await.unwrap(),
            CoreEvent::CheckedOut { .. }
        ));
        assert!(matches!(
            engine.stop_session(now).await,
            Err(GymError::NotCheckedIn)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn force_stop_writes_no_history() {
        let store = seeded();
        let now = at(2024, 1, 10, 18, 0);
        store.insert(
            collections::ACTIVE_CHECK_INS,
            "u1",
            doc(json!({
                "userId": "u1",
                "gymId": "g1",
                "checkInTime": (now - ChronoDuration::seconds(500)).to_rfc3339(),
            })),
        );
        let mut engine = loaded(&store, now).await;
        assert_eq!(engine.timer_seconds(), 500);

        engine.force_stop_without_history().await.unwrap();

        assert!(!engine.is_checked_in());
        assert_eq!(engine.timer_seconds(), 0);
        assert_eq!(store.count(collections::CHECK_IN_HISTORY), 0);
        assert_eq!(store.count(collections::ACTIVE_CHECK_INS), 0);
        let profile = store.document(collections::USERS, "u1").unwrap();
        assert_eq!(profile.get("streak"), Some(&json!(3)));
        assert_eq!(profile.get("totalDuration"), Some(&json!(600)));
    }

    #[tokio::test(start_paused = true)]
    async fn two_taps_check_in_and_out() {
        let store = seeded();
        let now = Local::now();
        let mut engine = loaded(&store, now).await;
        let t0 = MonotonicInstant::now();

        let event = engine.press(now, t0).await;
        assert!(matches!(
            event,
            CoreEvent::ConfirmArmed { action: ConfirmAction::CheckIn, .. }
        ));
        assert_eq!(engine.state(t0), TrackerState::ConfirmArmed);

        let event = engine.press(now, t0 + Duration::from_secs(1)).await;
        assert!(matches!(event, CoreEvent::CheckedIn { .. }));
        assert_eq!(engine.state(t0), TrackerState::Active);

        let t1 = t0 + Duration::from_secs(10);
        engine.press(now, t1).await;
        assert_eq!(engine.state(t1), TrackerState::StoppingConfirmArmed);

        let t2 = t1 + Duration::from_secs(5);
        assert_eq!(
            engine.expire_confirmation(t2),
            Some(CoreEvent::ConfirmExpired { state: TrackerState::Active })
        );
        assert!(engine.is_checked_in());

        engine.press(now, t2).await;
        let event = engine.press(now, t2 + Duration::from_secs(2)).await;
        assert!(matches!(event, CoreEvent::CheckedOut { .. }));
        assert_eq!(engine.state(t2), TrackerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_check_in_without_enrollment_fails() {
        let store = seeded();
        store
            .update(collections::USERS, "u1", doc(json!({"enrollmentStatus": "rejected"})))
            .await
            .unwrap();
        let now = Local::now();
        let mut engine = loaded(&store, now).await;
        let t0 = MonotonicInstant::now();

        engine.press(now, t0).await;
        let event = engine.press(now, t0).await;
        assert!(event.is_failure());
        assert_eq!(engine.state(t0), TrackerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn leave_suggests_review_then_confirms() {
        let store = seeded();
        let now = Local::now();
        let mut engine = loaded(&store, now).await;

        assert_eq!(
            engine.leave_gym(true, false, now).await,
            CoreEvent::ReviewSuggested { gym_name: "Iron Den".into() }
        );
        assert_eq!(
            engine.leave_gym(false, true, now).await,
            CoreEvent::LeaveConfirmationRequired { gym_name: "Iron Den".into() }
        );
        assert_eq!(store.document(collections::USERS, "u1").unwrap().get("gymId"), Some(&json!("g1")));
    }

    #[tokio::test(start_paused = true)]
    async fn leave_while_checked_in() {
        let store = seeded();
        store.insert(
            collections::GYM_REVIEWS,
            "rv1",
            doc(json!({"userId": "u1", "gymId": "g1", "rating": 5})),
        );
        let now = Local::now();
        let mut engine = loaded(&store, now).await;
        engine.start_session(now).await.unwrap();

        let event = engine.leave_gym(true, false, now).await;
        assert_eq!(
            event,
            CoreEvent::LeftGym { gym_name: "Iron Den".into(), forced_checkout: true }
        );
        assert_eq!(event.message(), "You have left the gym. Your streak has been reset to 0.");

        assert!(!engine.is_checked_in());
        assert_eq!(engine.stats(), UserStats::default());
        assert_eq!(engine.gym_id(), None);
        assert_eq!(store.count(collections::ACTIVE_CHECK_INS), 0);
        assert_eq!(store.count(collections::CHECK_IN_HISTORY), 0);

        let profile = store.document(collections::USERS, "u1").unwrap();
        assert_eq!(profile.get("gymId"), Some(&json!(null)));
        assert_eq!(profile.get("enrollmentStatus"), Some(&json!("none")));
        assert_eq!(profile.get("streak"), Some(&json!(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn leave_failure_keeps_membership() {
        let store = seeded();
        let now = Local::now();
        let mut engine = loaded(&store, now).await;
        store.fail_on(collections::USERS, StoreOp::Update);

        let event = engine.leave_gym(true, true, now).await;
        assert_eq!(
            event,
            CoreEvent::LeaveFailed { message: "Failed to leave gym. Please try again.".into() }
        );
        assert_eq!(engine.gym_id(), Some(&GymId::new("g1")));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_streak_keeps_duration() {
        let store = seeded();
        let now = Local::now();
        let mut engine = loaded(&store, now).await;
        engine.reset_streak(now).await.unwrap();
        assert_eq!(engine.stats(), UserStats { streak: 0, total_duration: 600 });
    }
}
