//! Consecutive-day streak computation over check-in history

use chrono::{DateTime, Local, NaiveDate};
use gymtrack_api::{Document, collections};
use gymtrack_remote::{DocumentStore, FieldFilter, RemoteResult};
use gymtrack_util::{UserId, parse_date_key};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Streak for a member whose history (including any check-out made today)
/// contains `dates`.
///
/// - today present: length of the run ending today (at least 1)
/// - only yesterday present: length of the run ending yesterday, plus 1
/// - otherwise: 1
pub fn compute_streak(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> u64 {
    if dates.contains(&today) {
        return run_ending_at(dates, today).max(1);
    }

    match today.pred_opt() {
        Some(yesterday) if dates.contains(&yesterday) => run_ending_at(dates, yesterday) + 1,
        _ => 1,
    }
}

/// Number of consecutive days present in `dates`, walking back from `day`
fn run_ending_at(dates: &BTreeSet<NaiveDate>, day: NaiveDate) -> u64 {
    let mut count = 0;
    let mut current = Some(day);
    while let Some(d) = current.filter(|d| dates.contains(d)) {
        count += 1;
        current = d.pred_opt();
    }
    count
}

/// Why a history row contributed no date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDateError {
    /// `date` is a string that is not `YYYY-MM-DD`
    BadDateKey(String),
    /// The chosen timestamp field is not an RFC 3339 string
    BadTimestamp { field: &'static str },
    /// None of `date`, `checkOutTime`, `checkInTime`
    Missing,
}

/// Local calendar date of a history row.
///
/// Uses `date` when it is a string, else the local date of `checkOutTime`,
/// else of `checkInTime`.
pub fn record_date(doc: &Document) -> Result<NaiveDate, RecordDateError> {
    if let Some(Value::String(key)) = doc.get("date") {
        return parse_date_key(key).ok_or_else(|| RecordDateError::BadDateKey(key.clone()));
    }

    for field in ["checkOutTime", "checkInTime"] {
        if let Some(value) = doc.get(field).filter(|v| !v.is_null()) {
            return value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Local).date_naive())
                .ok_or(RecordDateError::BadTimestamp { field });
        }
    }

    Err(RecordDateError::Missing)
}

/// Collect distinct local dates, skipping rows that have none
pub fn history_dates<'a>(
    rows: impl IntoIterator<Item = (&'a str, &'a Document)>,
) -> BTreeSet<NaiveDate> {
    let mut dates = BTreeSet::new();
    for (id, doc) in rows {
        match record_date(doc) {
            Ok(date) => {
                dates.insert(date);
            }
            Err(e) => warn!(record_id = %id, error = ?e, "Skipping history record without a usable date"),
        }
    }
    dates
}

/// Reads a member's history from the store and computes the streak
pub struct StreakCalculator {
    store: Arc<dyn DocumentStore>,
}

impl StreakCalculator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Distinct local check-in dates for `user_id`
    pub async fn load_dates(&self, user_id: &UserId) -> RemoteResult<BTreeSet<NaiveDate>> {
        let rows = self
            .store
            .query(
                collections::CHECK_IN_HISTORY,
                &[FieldFilter::eq("userId", user_id.as_str())],
            )
            .await?;

        Ok(history_dates(rows.iter().map(|(id, doc)| (id.as_str(), doc))))
    }

    /// Streak as of `today`. If history cannot be read, falls back to
    /// `prior_streak + 1`.
    pub async fn calculate(&self, user_id: &UserId, today: NaiveDate, prior_streak: u64) -> u64 {
        match self.load_dates(user_id).await {
            Ok(dates) => {
                let streak = compute_streak(&dates, today);
                debug!(user_id = %user_id, days = dates.len(), streak, "Streak computed");
                streak
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Could not read history, extending prior streak");
                prior_streak.saturating_add(1).max(1)
            }
        }
    }
}
