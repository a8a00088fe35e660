//! Check-in engine and member services for gymtrack
//!
//! This crate contains:
//! - The check-in engine (two-tap confirmation, session tracking, checkout sequence)
//! - Streak computation over check-in history
//! - Stats persistence on the user profile
//! - Membership, feedback and account services

mod account;
mod confirm;
mod engine;
mod events;
mod feedback;
mod membership;
mod session;
mod stats;
mod streak;

pub use account::*;
pub use confirm::*;
pub use engine::*;
pub use events::*;
pub use feedback::*;
pub use membership::*;
pub use session::*;
pub use stats::*;
pub use streak::*;
