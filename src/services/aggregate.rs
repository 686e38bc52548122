use std::collections::HashMap;

use anyhow::Result;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::Database;
use crate::error::DomainError;
use crate::models::ProjectStats;

/// Derives project-level completion and budget figures from child
/// milestones and time logs.
///
/// Nothing here subscribes to milestone changes; callers invoke
/// [`ProjectAggregator::update_progress`] after a milestone-level change.
#[derive(Clone)]
pub struct ProjectAggregator {
    db: Database,
}

impl ProjectAggregator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Completed milestones over total milestones, as a percentage in
    /// [0, 100]. A project with no milestones reports 0 rather than
    /// dividing by zero.
    pub fn completion_rate(&self, project_id: Uuid) -> Result<f64> {
        let (total, completed) = self.db.milestone_counts(project_id)?;
        if total == 0 {
            return Ok(0.0);
        }
        Ok(f64::from(completed) / f64::from(total) * 100.0)
    }

    /// Recompute the completion rate and persist it into the project's
    /// cached `progress_percentage`.
    pub fn update_progress(&self, project_id: Uuid) -> Result<f64> {
        let rate = self.completion_rate(project_id)?;
        if !self.db.set_project_progress(project_id, rate)? {
            return Err(DomainError::NotFound("Project").into());
        }
        tracing::debug!(project = %project_id, rate, "Project progress recomputed");
        Ok(rate)
    }

    /// Total spend against the project: each time log's hours priced at the
    /// membership rate of the user who logged it. Hours logged by users
    /// without a membership contribute nothing — deliberately silent.
    pub fn budget_used(&self, project_id: Uuid) -> Result<Decimal> {
        let rates: HashMap<Uuid, Decimal> = self
            .db
            .get_members_by_project(project_id)?
            .into_iter()
            .map(|m| (m.user_id, m.hourly_rate))
            .collect();

        let total = self
            .db
            .get_time_logs_by_project(project_id)?
            .iter()
            .map(|log| log.hours * rates.get(&log.user_id).copied().unwrap_or(Decimal::ZERO))
            .sum();

        Ok(total)
    }

    /// Sum of hours across all the project's time logs, billable or not.
    pub fn total_hours_logged(&self, project_id: Uuid) -> Result<Decimal> {
        let total = self
            .db
            .get_time_logs_by_project(project_id)?
            .iter()
            .map(|log| log.hours)
            .sum();
        Ok(total)
    }

    /// Read-side bundle of the derived figures for one project.
    pub fn stats(&self, project_id: Uuid) -> Result<ProjectStats> {
        self.db
            .get_project(project_id)?
            .ok_or(DomainError::NotFound("Project"))?;

        let (total, completed) = self.db.milestone_counts(project_id)?;
        let completion_rate = if total == 0 {
            0.0
        } else {
            f64::from(completed) / f64::from(total) * 100.0
        };

        Ok(ProjectStats {
            project_id,
            milestones_total: total,
            milestones_completed: completed,
            completion_rate,
            total_hours_logged: self.total_hours_logged(project_id)?,
            budget_used: self.budget_used(project_id)?,
        })
    }
}
