//! Error types for gymtrack

use thiserror::Error;

use crate::{GymId, UserId};

/// Domain error shared by gymtrack crates
#[derive(Debug, Error)]
pub enum GymError {
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Gym not found: {0}")]
    GymNotFound(GymId),

    #[error("Already checked in")]
    AlreadyCheckedIn,

    #[error("Not checked in")]
    NotCheckedIn,

    #[error("No approved enrollment at this gym")]
    NotEnrolled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GymError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, GymError>;
