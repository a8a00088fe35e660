//! External collaborator interfaces for gymtrack
//!
//! This crate defines the boundary between the check-in engine and the
//! services it talks to: the remote document database, the credential
//! provider and the device-local cache. It contains no backend code itself;
//! the in-memory implementations here exist for tests and demos.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
