//! Document records for the remote collections.
//!
//! Documents are JSON objects with camelCase field names. The document id
//! (user id, gym id, generated id) is not part of the body.

use chrono::{DateTime, Local};
use gymtrack_util::{GymId, UserId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{EnrollmentStatus, IssueType, PaymentMethod, ReportStatus, TimeSlot, UserRole};

/// A document body as stored remotely
pub type Document = serde_json::Map<String, Value>;

/// Collection names
pub mod collections {
    pub const USERS: &str = "users";
    pub const GYMS: &str = "gyms";
    pub const ACTIVE_CHECK_INS: &str = "activeCheckIns";
    pub const CHECK_IN_HISTORY: &str = "checkInHistory";
    pub const GYM_REPORTS: &str = "gymReports";
    pub const GYM_REVIEWS: &str = "gymReviews";
}

/// Serialize a record into a document body
pub fn to_document<T: Serialize>(record: &T) -> Result<Document, serde_json::Error> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Deserialize a document body into a record
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(doc))
}

/// Read a non-negative count that may be missing, fractional, negative or
/// a numeric string. Anything unusable reads as 0.
pub fn coerce_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                v
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f > 0.0)
                    .map(|f| f.floor() as u64)
                    .unwrap_or(0)
            }
        }
        Some(Value::String(s)) => s.trim().parse::<f64>().map_or(0, |f| {
            if f.is_finite() && f > 0.0 {
                f.floor() as u64
            } else {
                0
            }
        }),
        _ => 0,
    }
}

fn lenient_count<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(coerce_count(value.as_ref()))
}

/// Unknown or malformed values read as `None` instead of failing the record
fn lenient_option<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(de)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient_option(de)?.unwrap_or_default())
}

/// `users/{uid}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub has_provided_phone: bool,
    #[serde(default, deserialize_with = "lenient_default")]
    pub role: UserRole,
    #[serde(default)]
    pub gym_id: Option<GymId>,
    #[serde(default, deserialize_with = "lenient_default")]
    pub enrollment_status: EnrollmentStatus,
    #[serde(default, deserialize_with = "lenient_option")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub enrolled_at: Option<DateTime<Local>>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub created_at: Option<DateTime<Local>>,
    #[serde(default = "default_plan_duration", deserialize_with = "lenient_count")]
    pub plan_duration: u64,
    #[serde(default, deserialize_with = "lenient_option")]
    pub time_slot: Option<TimeSlot>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub streak: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_duration: u64,
    #[serde(default, deserialize_with = "lenient_option")]
    pub stats_updated_at: Option<DateTime<Local>>,
    #[serde(default)]
    pub has_reviewed_current_gym: bool,
}

fn default_plan_duration() -> u64 {
    1
}

impl UserProfile {
    /// Display name, or "User" when unset
    pub fn name_or_default(&self) -> &str {
        let name = self.display_name.trim();
        if name.is_empty() { "User" } else { name }
    }

    /// Whether the member may check in at `gym_id`
    pub fn is_approved_at(&self, gym_id: &GymId) -> bool {
        self.enrollment_status == EnrollmentStatus::Approved
            && self.gym_id.as_ref() == Some(gym_id)
    }
}

/// `gyms/{gymId}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gym {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub upi_id: String,
    #[serde(default)]
    pub monthly_fee: f64,
    #[serde(default)]
    pub admin_id: Option<UserId>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, deserialize_with = "lenient_option")]
    pub created_at: Option<DateTime<Local>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarterly_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amenities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u64>,
}

impl Gym {
    /// Gym name, or "Unknown Gym" when unset
    pub fn name_or_default(&self) -> &str {
        let name = self.name.trim();
        if name.is_empty() { "Unknown Gym" } else { name }
    }
}

/// `activeCheckIns/{userId}`: existence means the user is checked in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCheckIn {
    pub user_id: UserId,
    pub user_name: String,
    pub gym_id: GymId,
    pub gym_name: String,
    pub time_slot: TimeSlot,
    pub check_in_time: DateTime<Local>,
    pub created_at: DateTime<Local>,
}

/// `checkInHistory/{generated}`: one per completed checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRecord {
    pub user_id: UserId,
    pub user_name: String,
    pub user_email: String,
    pub gym_id: GymId,
    pub gym_name: String,
    pub time_slot: TimeSlot,
    /// Local calendar date of checkout, `YYYY-MM-DD`
    pub date: String,
    pub check_in_time: DateTime<Local>,
    pub check_out_time: DateTime<Local>,
    /// Seconds
    pub duration: u64,
    pub created_at: DateTime<Local>,
}

/// `gymReports/{generated}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GymReport {
    pub gym_id: GymId,
    pub gym_name: String,
    pub user_id: UserId,
    pub user_name: String,
    pub user_email: String,
    pub issue_types: Vec<IssueType>,
    pub description: String,
    #[serde(default)]
    pub status: ReportStatus,
    pub created_at: DateTime<Local>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub reviewed_at: Option<DateTime<Local>>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub user_has_read: bool,
}

/// `gymReviews/{generated}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GymReview {
    pub gym_id: GymId,
    pub user_id: UserId,
    pub user_name: String,
    pub user_email: String,
    #[serde(default)]
    pub user_phone: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Local>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn profile_missing_stats_read_as_zero() {
        let profile: UserProfile = from_document(doc(json!({
            "email": "a@b.co",
            "displayName": "Asha",
        })))
        .unwrap();
        assert_eq!(profile.streak, 0);
        assert_eq!(profile.total_duration, 0);
        assert_eq!(profile.plan_duration, 1);
        assert_eq!(profile.enrollment_status, EnrollmentStatus::None);
        assert_eq!(profile.role, UserRole::Member);
    }

    #[test]
    fn profile_tolerates_bad_values() {
        let profile: UserProfile = from_document(doc(json!({
            "streak": "7",
            "totalDuration": "not a number",
            "timeSlot": "Brunch",
            "enrollmentStatus": "approved",
            "gymId": "g1",
        })))
        .unwrap();
        assert_eq!(profile.streak, 7);
        assert_eq!(profile.total_duration, 0);
        assert_eq!(profile.time_slot, None);
        assert!(profile.is_approved_at(&GymId::new("g1")));
        assert!(!profile.is_approved_at(&GymId::new("g2")));
    }

    #[test]
    fn coerce_count_edges() {
        assert_eq!(coerce_count(None), 0);
        assert_eq!(coerce_count(Some(&json!(null))), 0);
        assert_eq!(coerce_count(Some(&json!(-4))), 0);
        assert_eq!(coerce_count(Some(&json!(12.9))), 12);
        assert_eq!(coerce_count(Some(&json!(" 30 "))), 30);
        assert_eq!(coerce_count(Some(&json!(true))), 0);
    }

    #[test]
    fn history_record_uses_camel_case() {
        let now = Local::now();
        let record = CheckInRecord {
            user_id: UserId::new("u1"),
            user_name: "Asha".into(),
            user_email: "a@b.co".into(),
            gym_id: GymId::new("g1"),
            gym_name: "Iron Den".into(),
            time_slot: TimeSlot::Evening,
            date: "2024-01-04".into(),
            check_in_time: now,
            check_out_time: now,
            duration: 90,
            created_at: now,
        };
        let d = to_document(&record).unwrap();
        assert_eq!(d.get("userId"), Some(&json!("u1")));
        assert_eq!(d.get("timeSlot"), Some(&json!("Evening")));
        assert_eq!(d.get("date"), Some(&json!("2024-01-04")));
        assert!(d.get("checkOutTime").and_then(Value::as_str).is_some());
    }

    #[test]
    fn names_fall_back() {
        assert_eq!(UserProfile::default().name_or_default(), "User");
        assert_eq!(Gym::default().name_or_default(), "Unknown Gym");
    }
}
