//! Shared utilities for gymtrack
//!
//! This crate provides:
//! - ID types (UserId, GymId, DocumentId)
//! - Time utilities (mockable wall clock, local date keys, monotonic time)
//! - Error types
//! - Form validation helpers (email, phone, password strength)
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;
mod validation;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
pub use validation::*;
