//! Issue reports, report notifications, and gym reviews

use chrono::{DateTime, Local};
use gymtrack_api::{GymReport, GymReview, IssueType, ReportStatus, collections, from_document, to_document};
use gymtrack_remote::{DocumentStore, FieldFilter, RemoteResult};
use gymtrack_util::{DocumentId, GymError, GymId, Result, UserId};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::membership::{load_gym, load_profile, object};

/// Whether `user_id` has already reviewed `gym_id`
pub async fn has_reviewed(
    store: &dyn DocumentStore,
    user_id: &UserId,
    gym_id: &GymId,
) -> RemoteResult<bool> {
    let rows = store
        .query(
            collections::GYM_REVIEWS,
            &[
                FieldFilter::eq("userId", user_id.as_str()),
                FieldFilter::eq("gymId", gym_id.as_str()),
            ],
        )
        .await?;
    Ok(!rows.is_empty())
}

/// A report update the member should see
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub report_id: DocumentId,
    pub title: String,
    pub message: String,
    pub date: DateTime<Local>,
    pub read: bool,
}

impl Notification {
    fn from_report(report_id: DocumentId, report: GymReport, now: DateTime<Local>) -> Self {
        let (title, default_message) = match report.status {
            ReportStatus::Resolved => (
                "Report Resolved",
                "Your report has been resolved and the issue has been addressed.",
            ),
            ReportStatus::Reviewed => (
                "Report Reviewed",
                "Your report has been reviewed and is under review.",
            ),
            _ => ("Report Rejected", "Your report has been rejected by the admin."),
        };

        let message = report
            .admin_notes
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| default_message.to_string());

        Self {
            report_id,
            title: title.to_string(),
            message,
            date: report.reviewed_at.unwrap_or(now),
            read: report.user_has_read,
        }
    }
}

pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.read).count()
}

pub struct FeedbackService {
    store: Arc<dyn DocumentStore>,
}

impl FeedbackService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// File a report against the member's current gym
    pub async fn submit_report(
        &self,
        user_id: &UserId,
        issues: &[IssueType],
        description: &str,
        now: DateTime<Local>,
    ) -> Result<DocumentId> {
        if issues.is_empty() {
            return Err(GymError::validation("Please select at least one issue type"));
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(GymError::validation("Please describe the issue(s)"));
        }

        let profile = load_profile(self.store.as_ref(), user_id).await?;
        let gym_id = profile.gym_id.clone().ok_or(GymError::NotEnrolled)?;
        let gym_name = match load_gym(self.store.as_ref(), &gym_id).await {
            Ok(gym) => gym.name_or_default().to_string(),
            Err(e) => {
                warn!(gym_id = %gym_id, error = %e, "Reporting against unreadable gym");
                "Unknown Gym".to_string()
            }
        };

        let mut issue_types: Vec<IssueType> = Vec::with_capacity(issues.len());
        for issue in issues {
            if !issue_types.contains(issue) {
                issue_types.push(*issue);
            }
        }

        let report = GymReport {
            gym_id,
            gym_name,
            user_id: user_id.clone(),
            user_name: profile.name_or_default().to_string(),
            user_email: profile.email.clone(),
            issue_types,
            description: description.to_string(),
            status: ReportStatus::Pending,
            created_at: now,
            reviewed_at: None,
            reviewed_by: None,
            admin_notes: None,
            user_has_read: false,
        };
        let doc = to_document(&report).map_err(|e| GymError::internal(e.to_string()))?;
        let id = self.store.add(collections::GYM_REPORTS, doc).await?;

        info!(user_id = %user_id, report_id = %id, "Report submitted");
        Ok(id)
    }

    /// Reports an admin has acted on, newest first
    pub async fn notifications(
        &self,
        user_id: &UserId,
        now: DateTime<Local>,
    ) -> Result<Vec<Notification>> {
        let rows = self
            .store
            .query(
                collections::GYM_REPORTS,
                &[
                    FieldFilter::eq("userId", user_id.as_str()),
                    FieldFilter::any_of(
                        "status",
                        [
                            ReportStatus::Resolved.as_str(),
                            ReportStatus::Reviewed.as_str(),
                            ReportStatus::Rejected.as_str(),
                        ],
                    ),
                ],
            )
            .await?;

        let mut notifications: Vec<Notification> = rows
            .into_iter()
            .filter_map(|(id, doc)| match from_document::<GymReport>(doc) {
                Ok(report) => Some(Notification::from_report(id, report, now)),
                Err(e) => {
                    warn!(report_id = %id, error = %e, "Skipping unreadable report");
                    None
                }
            })
            .collect();

        notifications.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(notifications)
    }

    pub async fn mark_read(&self, report_id: &DocumentId) -> Result<()> {
        self.store
            .update(
                collections::GYM_REPORTS,
                report_id.as_str(),
                object(json!({ "userHasRead": true })),
            )
            .await?;
        Ok(())
    }

    /// Mark every unread notification read. Returns how many were updated.
    pub async fn mark_all_read(&self, user_id: &UserId, now: DateTime<Local>) -> Result<usize> {
        let mut updated = 0;
        for notification in self.notifications(user_id, now).await? {
            if notification.read {
                continue;
            }
            self.mark_read(&notification.report_id).await?;
            updated += 1;
        }
        Ok(updated)
    }

    pub async fn has_reviewed(&self, user_id: &UserId, gym_id: &GymId) -> Result<bool> {
        Ok(has_reviewed(self.store.as_ref(), user_id, gym_id).await?)
    }

    /// Review the member's current gym
    pub async fn submit_review(
        &self,
        user_id: &UserId,
        rating: u8,
        comment: &str,
        now: DateTime<Local>,
    ) -> Result<DocumentId> {
        if !(1..=5).contains(&rating) {
            return Err(GymError::validation("Please select a rating"));
        }

        let profile = load_profile(self.store.as_ref(), user_id).await?;
        let gym_id = profile.gym_id.clone().ok_or(GymError::NotEnrolled)?;

        let review = GymReview {
            gym_id,
            user_id: user_id.clone(),
            user_name: profile.name_or_default().to_string(),
            user_email: profile.email.clone(),
            user_phone: profile.phone.clone().unwrap_or_default(),
            rating,
            comment: comment.trim().to_string(),
            created_at: now,
        };
        let doc = to_document(&review).map_err(|e| GymError::internal(e.to_string()))?;
        let id = self.store.add(collections::GYM_REVIEWS, doc).await?;

        self.store
            .update(
                collections::USERS,
                user_id.as_str(),
                object(json!({ "hasReviewedCurrentGym": true })),
            )
            .await?;

        info!(user_id = %user_id, rating, "Review submitted");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gymtrack_remote::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, FeedbackService, UserId) {
        let store = Arc::new(MemoryStore::new());
        store.insert(collections::GYMS, "g1", object(json!({"name": "Iron Den", "isActive": true})));
        store.insert(
            collections::USERS,
            "u1",
            object(json!({
                "displayName": "Asha",
                "email": "asha@gym.io",
                "phone": "+9779812345678",
                "gymId": "g1",
                "enrollmentStatus": "approved",
            })),
        );
        let service = FeedbackService::new(store.clone());
        (store, service, UserId::new("u1"))
    }

    fn seed_report(store: &MemoryStore, id: &str, status: &str, reviewed_at: Option<DateTime<Local>>, read: bool) {
        store.insert(
            collections::GYM_REPORTS,
            id,
            object(json!({
                "gymId": "g1",
                "gymName": "Iron Den",
                "userId": "u1",
                "userName": "Asha",
                "userEmail": "asha@gym.io",
                "issueTypes": ["Equipment"],
                "description": "Broken treadmill",
                "status": status,
                "createdAt": Local::now().to_rfc3339(),
                "reviewedAt": reviewed_at.map(|t| t.to_rfc3339()),
                "userHasRead": read,
            })),
        );
    }

    #[tokio::test]
    async fn report_validation() {
        let (_, service, user) = setup();
        let err = service.submit_report(&user, &[], "Broken", Local::now()).await.unwrap_err();
        assert!(matches!(err, GymError::ValidationError(m) if m == "Please select at least one issue type"));

        let err = service
            .submit_report(&user, &[IssueType::Staff], "   ", Local::now())
            .await
            .unwrap_err();
        assert!(matches!(err, GymError::ValidationError(m) if m == "Please describe the issue(s)"));
    }

    #[tokio::test]
    async fn report_is_stored_pending_and_unread() {
        let (store, service, user) = setup();
        let id = service
            .submit_report(
                &user,
                &[IssueType::Equipment, IssueType::Safety, IssueType::Equipment],
                "  Loose cable on rack 3 ",
                Local::now(),
            )
            .await
            .unwrap();

        let doc = store.document(collections::GYM_REPORTS, id.as_str()).unwrap();
        let report: GymReport = from_document(doc).unwrap();
        assert_eq!(report.status, ReportStatus::Pending);
        assert!(!report.user_has_read);
        assert_eq!(report.issue_types, vec![IssueType::Equipment, IssueType::Safety]);
        assert_eq!(report.description, "Loose cable on rack 3");
        assert_eq!(report.gym_name, "Iron Den");
    }

    #[tokio::test]
    async fn notifications_sorted_and_titled() {
        let (store, service, user) = setup();
        let now = Local::now();
        seed_report(&store, "r1", "resolved", Some(now - Duration::days(2)), false);
        seed_report(&store, "r2", "rejected", Some(now - Duration::hours(1)), true);
        seed_report(&store, "r3", "pending", None, false);
        seed_report(&store, "r4", "reviewed", Some(now - Duration::days(1)), false);

        let list = service.notifications(&user, now).await.unwrap();
        let ids: Vec<&str> = list.iter().map(|n| n.report_id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r4", "r1"]);
        assert_eq!(list[0].title, "Report Rejected");
        assert_eq!(list[1].title, "Report Reviewed");
        assert_eq!(
            list[2].message,
            "Your report has been resolved and the issue has been addressed."
        );
        assert_eq!(unread_count(&list), 2);
    }

    #[tokio::test]
    async fn admin_notes_become_message() {
        let (store, service, user) = setup();
        seed_report(&store, "r1", "resolved", None, false);
        store
            .update(
                collections::GYM_REPORTS,
                "r1",
                object(json!({"adminNotes": "Treadmill replaced"})),
            )
            .await
            .unwrap();

        let list = service.notifications(&user, Local::now()).await.unwrap();
        assert_eq!(list[0].message, "Treadmill replaced");
    }

    #[tokio::test]
    async fn mark_all_read() {
        let (store, service, user) = setup();
        let now = Local::now();
        seed_report(&store, "r1", "resolved", Some(now), false);
        seed_report(&store, "r2", "reviewed", Some(now), false);

        assert_eq!(service.mark_all_read(&user, now).await.unwrap(), 2);
        let list = service.notifications(&user, now).await.unwrap();
        assert_eq!(unread_count(&list), 0);
        assert_eq!(service.mark_all_read(&user, now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn review_flow() {
        let (store, service, user) = setup();
        let gym = GymId::new("g1");
        assert!(!service.has_reviewed(&user, &gym).await.unwrap());

        assert!(matches!(
            service.submit_review(&user, 0, "", Local::now()).await,
            Err(GymError::ValidationError(_))
        ));
        assert!(matches!(
            service.submit_review(&user, 6, "", Local::now()).await,
            Err(GymError::ValidationError(_))
        ));

        let id = service
            .submit_review(&user, 4, "  Clean and friendly  ", Local::now())
            .await
            .unwrap();
        assert!(service.has_reviewed(&user, &gym).await.unwrap());

        let review: GymReview =
            from_document(store.document(collections::GYM_REVIEWS, id.as_str()).unwrap()).unwrap();
        assert_eq!(review.comment, "Clean and friendly");
        assert_eq!(review.user_phone, "+9779812345678");

        let profile = store.document(collections::USERS, "u1").unwrap();
        assert_eq!(profile.get("hasReviewedCurrentGym"), Some(&json!(true)));
    }
}
