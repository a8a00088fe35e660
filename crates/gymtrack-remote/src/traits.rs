//! Collaborator traits

use async_trait::async_trait;
use gymtrack_api::Document;
use gymtrack_util::{DocumentId, GymError, UserId};
use serde_json::Value;
use thiserror::Error;

/// Errors from remote operations
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already in use")]
    EmailInUse,

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RemoteError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    fn is_auth(&self) -> bool {
        matches!(self, RemoteError::InvalidCredentials | RemoteError::EmailInUse)
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::InvalidDocument(e.to_string())
    }
}

impl From<RemoteError> for GymError {
    fn from(e: RemoteError) -> Self {
        if e.is_auth() {
            GymError::auth(e.to_string())
        } else {
            GymError::store(e.to_string())
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// A top-level field test used by [`DocumentStore::query`]
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    Eq { field: String, value: Value },
    In { field: String, values: Vec<Value> },
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn any_of<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            FieldFilter::Eq { field, .. } | FieldFilter::In { field, .. } => field,
        }
    }

    /// Whether `doc` passes this filter. A missing field never matches.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            FieldFilter::Eq { field, value } => doc.get(field) == Some(value),
            FieldFilter::In { field, values } => {
                doc.get(field).is_some_and(|v| values.contains(v))
            }
        }
    }
}

/// Whether `doc` passes every filter
pub fn matches_all(filters: &[FieldFilter], doc: &Document) -> bool {
    filters.iter().all(|f| f.matches(doc))
}

/// Merge `fields` into `doc`, replacing top-level keys
pub fn merge_fields(doc: &mut Document, fields: Document) {
    for (k, v) in fields {
        doc.insert(k, v);
    }
}

/// Remote document database
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> RemoteResult<Option<Document>>;

    /// Create or replace
    async fn set(&self, collection: &str, id: &str, doc: Document) -> RemoteResult<()>;

    /// Merge fields into an existing document; `NotFound` if it is missing
    async fn update(&self, collection: &str, id: &str, fields: Document) -> RemoteResult<()>;

    /// Insert under a generated id
    async fn add(&self, collection: &str, doc: Document) -> RemoteResult<DocumentId>;

    /// Idempotent
    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<()>;

    /// Documents passing all filters, ordered by id
    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> RemoteResult<Vec<(DocumentId, Document)>>;
}

/// Credential provider
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn create_user(&self, email: &str, password: &str) -> RemoteResult<UserId>;

    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<UserId>;

    /// Re-authenticates with `current` before changing the password
    async fn update_password(&self, uid: &UserId, current: &str, new: &str) -> RemoteResult<()>;

    async fn update_display_name(&self, uid: &UserId, name: &str) -> RemoteResult<()>;
}

/// Device-local key/value cache
#[async_trait]
pub trait LocalCache: Send + Sync {
    async fn get(&self, key: &str) -> RemoteResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> RemoteResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn eq_filter() {
        let d = doc(json!({"gymId": "g1", "timeSlot": "Morning"}));
        assert!(FieldFilter::eq("gymId", "g1").matches(&d));
        assert!(!FieldFilter::eq("gymId", "g2").matches(&d));
        assert!(!FieldFilter::eq("missing", "g1").matches(&d));
    }

    #[test]
    fn in_filter() {
        let d = doc(json!({"status": "resolved"}));
        assert!(FieldFilter::any_of("status", ["resolved", "rejected"]).matches(&d));
        assert!(!FieldFilter::any_of("status", ["pending"]).matches(&d));
    }

    #[test]
    fn filters_are_anded() {
        let d = doc(json!({"userId": "u1", "gymId": "g1"}));
        assert!(matches_all(
            &[FieldFilter::eq("userId", "u1"), FieldFilter::eq("gymId", "g1")],
            &d
        ));
        assert!(!matches_all(
            &[FieldFilter::eq("userId", "u1"), FieldFilter::eq("gymId", "g2")],
            &d
        ));
        assert!(matches_all(&[], &d));
    }

    #[test]
    fn remote_error_maps_to_domain_error() {
        let e: GymError = RemoteError::InvalidCredentials.into();
        assert!(matches!(e, GymError::AuthError(_)));
        let e: GymError = RemoteError::Unavailable("offline".into()).into();
        assert!(matches!(e, GymError::StoreError(_)));
    }
}
