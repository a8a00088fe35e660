//! Shared domain types for gymtrack
//!
//! This crate defines the types every other gymtrack crate agrees on:
//! - Membership enums (roles, enrollment, payment methods)
//! - Time slots and crowd levels
//! - The tracker's confirmation states
//! - Document records stored in the remote collections

mod records;
mod types;

pub use records::*;
pub use types::*;
