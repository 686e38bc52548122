use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::Database;
use crate::error::DomainError;
use crate::models::{Milestone, MilestoneStatus};

use super::Clock;

/// Owns the status/progress state machine of a single milestone.
///
/// Status is never written directly by callers; it is inferred from progress
/// updates or moved by the explicit lifecycle calls here. None of these
/// operations raise domain errors for rule violations — out-of-range
/// progress is clamped and repeated transitions are idempotent or
/// self-correcting.
///
/// Recomputing the parent project after a change here is deliberately left
/// to the caller (the API handler), so there are no hidden recomputation
/// cascades.
#[derive(Clone)]
pub struct MilestoneLifecycle {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl MilestoneLifecycle {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Apply a progress report. The percentage is clamped to [0, 100];
    /// reaching 100 completes the milestone, and the first nonzero report
    /// on a pending milestone starts it.
    pub fn update_progress(&self, id: Uuid, percentage: i64) -> Result<Milestone> {
        let mut milestone = self.load(id)?;
        let clamped = percentage.clamp(0, 100);
        let now = self.clock.now();

        milestone.progress_percentage = clamped;
        if clamped >= 100 {
            complete_in_place(&mut milestone, now);
        } else if clamped > 0 && milestone.status == MilestoneStatus::Pending {
            start_in_place(&mut milestone, now);
        }
        milestone.updated_at = now;

        self.db.save_milestone_lifecycle(&milestone)?;
        tracing::debug!(
            milestone = %milestone.id,
            progress = clamped,
            status = milestone.status.as_str(),
            "Progress updated"
        );
        Ok(milestone)
    }

    /// Move a milestone into `InProgress`. The first start sets
    /// `started_at`; restarting never resets it.
    pub fn start(&self, id: Uuid) -> Result<Milestone> {
        let mut milestone = self.load(id)?;
        let now = self.clock.now();
        start_in_place(&mut milestone, now);
        milestone.updated_at = now;
        self.db.save_milestone_lifecycle(&milestone)?;
        Ok(milestone)
    }

    /// Complete a milestone: progress snaps to exactly 100 and
    /// `completed_at` is overwritten with the current time, even when the
    /// milestone was already completed.
    pub fn complete(&self, id: Uuid) -> Result<Milestone> {
        let mut milestone = self.load(id)?;
        let now = self.clock.now();
        complete_in_place(&mut milestone, now);
        milestone.updated_at = now;
        self.db.save_milestone_lifecycle(&milestone)?;
        Ok(milestone)
    }

    /// Park a milestone. No-op on terminal milestones.
    pub fn hold(&self, id: Uuid) -> Result<Milestone> {
        self.transition_non_terminal(id, MilestoneStatus::OnHold)
    }

    /// Abandon a milestone. No-op on terminal milestones.
    pub fn cancel(&self, id: Uuid) -> Result<Milestone> {
        self.transition_non_terminal(id, MilestoneStatus::Cancelled)
    }

    /// Refresh `actual_hours` from the milestone's time logs, billable or
    /// not. Returns the computed sum.
    pub fn recalculate_actual_hours(&self, id: Uuid) -> Result<Decimal> {
        let milestone = self.load(id)?;
        let logs = self.db.get_time_logs_by_milestone(milestone.id)?;
        let total: Decimal = logs.iter().map(|log| log.hours).sum();
        self.db.set_milestone_actual_hours(milestone.id, total)?;
        Ok(total)
    }

    /// Refresh `budget_used` from the milestone's billable time logs.
    /// Accumulation stays in decimal; rounding is a display concern.
    pub fn recalculate_budget_used(&self, id: Uuid) -> Result<Decimal> {
        let milestone = self.load(id)?;
        let logs = self.db.get_time_logs_by_milestone(milestone.id)?;
        let total: Decimal = logs
            .iter()
            .filter(|log| log.is_billable)
            .map(|log| log.hours * log.hourly_rate)
            .sum();
        self.db.set_milestone_budget_used(milestone.id, total)?;
        Ok(total)
    }

    fn transition_non_terminal(&self, id: Uuid, status: MilestoneStatus) -> Result<Milestone> {
        let mut milestone = self.load(id)?;
        if milestone.status.is_terminal() {
            return Ok(milestone);
        }
        let now = self.clock.now();
        milestone.status = status;
        milestone.updated_at = now;
        self.db.save_milestone_lifecycle(&milestone)?;
        Ok(milestone)
    }

    fn load(&self, id: Uuid) -> Result<Milestone> {
        self.db
            .get_milestone(id)?
            .ok_or_else(|| DomainError::NotFound("Milestone").into())
    }
}

fn start_in_place(milestone: &mut Milestone, now: chrono::DateTime<chrono::Utc>) {
    milestone.status = MilestoneStatus::InProgress;
    if milestone.started_at.is_none() {
        milestone.started_at = Some(now);
    }
}

fn complete_in_place(milestone: &mut Milestone, now: chrono::DateTime<chrono::Utc>) {
    milestone.status = MilestoneStatus::Completed;
    milestone.progress_percentage = 100;
    // Re-completion refreshes the timestamp.
    milestone.completed_at = Some(now);
}
