//! Domain models for Milepost.
//!
//! # Core Concepts
//!
//! - [`Project`]: Top-level container for milestones, members, and time logs.
//!   Carries a persisted cache of its completion rate.
//! - [`Milestone`]: A tracked unit of project work with its own status,
//!   progress percentage, and budget figures. Soft-deleted, never removed.
//! - [`TimeLog`]: A record of hours worked against a project (and optionally
//!   a milestone). Its billable amount is always derived, never stored.
//! - [`ProjectMember`]: The association between a user and a project carrying
//!   the negotiated hourly rate used for rate fallback and budget roll-ups.
//!
//! Users themselves live in an external identity system and are referenced
//! by id only.

mod member;
mod milestone;
mod project;
mod timelog;

pub use member::*;
pub use milestone::*;
pub use project::*;
pub use timelog::*;
