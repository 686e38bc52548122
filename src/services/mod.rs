//! Derived-state services over the persistence layer.
//!
//! The three services cooperate in a fixed direction: the reconciler
//! normalizes time logs as they are written, the lifecycle service rolls
//! logged work up into a milestone and drives its state machine, and the
//! aggregator rolls milestones and logs up into project-level figures.
//! All recomputation is synchronous; nothing here runs in the background.

mod aggregate;
mod clock;
mod lifecycle;
mod reconcile;

pub use aggregate::ProjectAggregator;
pub use clock::{Clock, FixedClock, SystemClock};
pub use lifecycle::MilestoneLifecycle;
pub use reconcile::TimeLogReconciler;
