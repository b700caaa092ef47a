//! Roadmap subsystems.
//!
//! - `features`: suggestions, status changes, the status board
//! - `comments`: append-only discussion per feature
//! - `votes`: the vote ledger and its denormalized counter
//! - `permissions`: identity and admin checks

pub mod comments;
pub mod features;
pub mod permissions;
pub mod votes;
