//! Gym listing, joining, and time-slot selection

use chrono::{DateTime, Local};
use gymtrack_api::{
    CrowdLevel, CrowdThresholds, EnrollmentStatus, Gym, PaymentMethod, SlotBoundaries, TimeSlot,
    UserProfile, collections, from_document,
};
use gymtrack_remote::{DocumentStore, FieldFilter, LocalCache};
use gymtrack_util::{GymError, GymId, Result, UserId};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

/// Local cache key holding the last chosen time slot
pub const SLOT_CACHE_KEY: &str = "userTimeSlot";

/// Read `users/{uid}`
pub async fn load_profile(store: &dyn DocumentStore, user_id: &UserId) -> Result<UserProfile> {
    let doc = store
        .get(collections::USERS, user_id.as_str())
        .await?
        .ok_or_else(|| GymError::UserNotFound(user_id.clone()))?;
    from_document(doc).map_err(|e| GymError::store(format!("unreadable profile: {}", e)))
}

/// Read `gyms/{gymId}`
pub async fn load_gym(store: &dyn DocumentStore, gym_id: &GymId) -> Result<Gym> {
    let doc = store
        .get(collections::GYMS, gym_id.as_str())
        .await?
        .ok_or_else(|| GymError::GymNotFound(gym_id.clone()))?;
    from_document(doc).map_err(|e| GymError::store(format!("unreadable gym: {}", e)))
}

/// Approved members who picked a slot, with the crowd label for that count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCount {
    pub slot: TimeSlot,
    pub members: u64,
    pub level: CrowdLevel,
}

pub struct MembershipService {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn LocalCache>,
    slots: SlotBoundaries,
    crowd: CrowdThresholds,
}

impl MembershipService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn LocalCache>,
        slots: SlotBoundaries,
        crowd: CrowdThresholds,
    ) -> Self {
        Self {
            store,
            cache,
            slots,
            crowd,
        }
    }

    pub fn slot_boundaries(&self) -> &SlotBoundaries {
        &self.slots
    }

    /// Active gyms, ordered by id. Unreadable gym documents are skipped.
    pub async fn list_gyms(&self) -> Result<Vec<(GymId, Gym)>> {
        let rows = self
            .store
            .query(collections::GYMS, &[FieldFilter::eq("isActive", true)])
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, doc)| match from_document::<Gym>(doc) {
                Ok(gym) => Some((GymId::new(id.as_str()), gym)),
                Err(e) => {
                    warn!(gym_id = %id, error = %e, "Skipping unreadable gym");
                    None
                }
            })
            .collect())
    }

    pub async fn gym(&self, gym_id: &GymId) -> Result<Gym> {
        load_gym(self.store.as_ref(), gym_id).await
    }

    pub async fn profile(&self, user_id: &UserId) -> Result<UserProfile> {
        load_profile(self.store.as_ref(), user_id).await
    }

    /// Slot the given instant falls into
    pub fn slot_at(&self, at: &DateTime<Local>) -> TimeSlot {
        TimeSlot::for_time(&self.slots, at)
    }

    /// Approved members of `gym_id` per time slot
    pub async fn member_counts(&self, gym_id: &GymId) -> Result<Vec<SlotCount>> {
        let mut counts = Vec::with_capacity(TimeSlot::ALL.len());
        for slot in TimeSlot::ALL {
            let rows = self
                .store
                .query(
                    collections::USERS,
                    &[
                        FieldFilter::eq("gymId", gym_id.as_str()),
                        FieldFilter::eq("timeSlot", slot.name()),
                        FieldFilter::eq("enrollmentStatus", "approved"),
                    ],
                )
                .await?;
            let members = rows.len() as u64;
            counts.push(SlotCount {
                slot,
                members,
                level: CrowdLevel::for_count(&self.crowd, members),
            });
        }
        Ok(counts)
    }

    /// The member's chosen slot: profile first, then the local cache
    pub async fn preferred_slot(&self, user_id: &UserId) -> Result<Option<TimeSlot>> {
        match self.profile(user_id).await {
            Ok(profile) if profile.time_slot.is_some() => return Ok(profile.time_slot),
            Ok(_) => {}
            Err(e) => warn!(user_id = %user_id, error = %e, "Could not read profile slot"),
        }

        let cached = self.cache.get(SLOT_CACHE_KEY).await?;
        Ok(cached.and_then(|s| s.parse().ok()))
    }

    pub async fn change_slot(
        &self,
        user_id: &UserId,
        slot: TimeSlot,
        now: DateTime<Local>,
    ) -> Result<()> {
        let fields = object(json!({
            "timeSlot": slot.name(),
            "timeSlotUpdatedAt": now.to_rfc3339(),
        }));
        self.store
            .update(collections::USERS, user_id.as_str(), fields)
            .await?;

        if let Err(e) = self.cache.set(SLOT_CACHE_KEY, slot.name()).await {
            warn!(error = %e, "Could not cache time slot");
        }

        info!(user_id = %user_id, slot = %slot, "Time slot changed");
        Ok(())
    }

    /// Ask to join `gym_id`. The request stays pending until an admin
    /// approves it.
    pub async fn request_join(
        &self,
        user_id: &UserId,
        gym_id: &GymId,
        method: PaymentMethod,
        transaction_id: Option<&str>,
        now: DateTime<Local>,
    ) -> Result<()> {
        let profile = self.profile(user_id).await?;
        if profile.gym_id.is_some() && profile.enrollment_status != EnrollmentStatus::Rejected {
            return Err(GymError::validation("You are already a member of a gym"));
        }

        let gym = self.gym(gym_id).await?;
        if !gym.is_active {
            return Err(GymError::GymNotFound(gym_id.clone()));
        }

        let transaction_id = transaction_id.map(str::trim).filter(|t| !t.is_empty());
        if method.requires_transaction_id() && transaction_id.is_none() {
            return Err(GymError::validation(
                "Please enter the transaction ID for online payment",
            ));
        }

        let fields = object(json!({
            "gymId": gym_id.as_str(),
            "enrollmentStatus": "pending",
            "paymentMethod": method,
            "transactionId": transaction_id,
            "enrollmentRequestedAt": now.to_rfc3339(),
        }));
        self.store
            .update(collections::USERS, user_id.as_str(), fields)
            .await?;

        info!(
            user_id = %user_id,
            gym_id = %gym_id,
            plan = method.plan_name(),
            "Join request submitted"
        );
        Ok(())
    }
}

pub(crate) fn object(value: Value) -> gymtrack_api::Document {
    match value {
        Value::Object(map) => map,
        _ => gymtrack_api::Document::new(),
    }
}
