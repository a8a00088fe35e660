//! Running streak/duration totals on the user profile

use chrono::{DateTime, Local};
use gymtrack_api::{Document, coerce_count, collections};
use gymtrack_remote::{DocumentStore, RemoteResult};
use gymtrack_util::UserId;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

/// Stats kept on `users/{uid}`; a running total, not derived from history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub streak: u64,
    /// Seconds
    pub total_duration: u64,
}

pub struct StatsAggregator {
    store: Arc<dyn DocumentStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Read stats, treating missing or non-numeric values as 0.
    /// A missing profile reads as zero stats.
    pub async fn load(&self, user_id: &UserId) -> RemoteResult<UserStats> {
        let doc = self.store.get(collections::USERS, user_id.as_str()).await?;
        Ok(doc
            .map(|d| UserStats {
                streak: coerce_count(d.get("streak")),
                total_duration: coerce_count(d.get("totalDuration")),
            })
            .unwrap_or_default())
    }

    /// Overwrite streak and total duration. Last write wins.
    pub async fn persist(
        &self,
        user_id: &UserId,
        stats: UserStats,
        now: DateTime<Local>,
    ) -> RemoteResult<()> {
        let fields = fields(json!({
            "streak": stats.streak,
            "totalDuration": stats.total_duration,
            "statsUpdatedAt": now.to_rfc3339(),
        }));
        self.store
            .update(collections::USERS, user_id.as_str(), fields)
            .await?;

        debug!(
            user_id = %user_id,
            streak = stats.streak,
            total_duration = stats.total_duration,
            "Stats persisted"
        );
        Ok(())
    }

    /// Clear stats and membership when the member leaves their gym
    pub async fn reset_on_leave(&self, user_id: &UserId, now: DateTime<Local>) -> RemoteResult<()> {
        let fields = fields(json!({
            "gymId": Value::Null,
            "enrollmentStatus": "none",
            "paymentMethod": Value::Null,
            "transactionId": Value::Null,
            "enrolledAt": Value::Null,
            "streak": 0,
            "totalDuration": 0,
            "hasReviewedCurrentGym": false,
            "statsUpdatedAt": now.to_rfc3339(),
        }));
        self.store
            .update(collections::USERS, user_id.as_str(), fields)
            .await?;

        info!(user_id = %user_id, "Membership and stats reset");
        Ok(())
    }

    /// Zero the streak only
    pub async fn reset_streak(&self, user_id: &UserId, now: DateTime<Local>) -> RemoteResult<()> {
        let fields = fields(json!({
            "streak": 0,
            "statsUpdatedAt": now.to_rfc3339(),
        }));
        self.store
            .update(collections::USERS, user_id.as_str(), fields)
            .await?;

        info!(user_id = %user_id, "Streak reset");
        Ok(())
    }
}

fn fields(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}
