//! Local persistence for gymtrack
//!
//! Provides a single-file stand-in for the remote services:
//! - Document collections (get/set/update/add/delete/query)
//! - Device-local key/value cache
//! - Email/password accounts

mod accounts;
mod sqlite;

pub use sqlite::*;

use gymtrack_remote::RemoteError;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already in use")]
    EmailInUse,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<argon2::password_hash::Error> for StoreError {
    fn from(e: argon2::password_hash::Error) -> Self {
        StoreError::PasswordHash(e.to_string())
    }
}

impl From<StoreError> for RemoteError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { collection, id } => RemoteError::NotFound { collection, id },
            StoreError::Serialization(msg) => RemoteError::InvalidDocument(msg),
            StoreError::InvalidCredentials => RemoteError::InvalidCredentials,
            StoreError::EmailInUse => RemoteError::EmailInUse,
            StoreError::PasswordHash(msg) => RemoteError::Internal(msg),
            other => RemoteError::Unavailable(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
