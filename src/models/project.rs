use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A project containing milestones, members, and time logs.
///
/// `progress_percentage` is a persisted cache of the completion rate
/// (completed milestones / total milestones × 100). It is recomputed by the
/// project aggregator whenever a caller asks for it after milestone changes;
/// budget figures are never stored on the project row and are always derived
/// from child time logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Cached completion rate in [0, 100].
    pub progress_percentage: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectInput {
    pub name: String,
    pub description: Option<String>,
}

/// Input for updating an existing project. All fields are optional for partial updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProjectInput {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Derived read-side figures for a project.
///
/// Everything here is recomputed from child rows on each request so the
/// numbers always reflect the current milestones and time logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStats {
    pub project_id: Uuid,
    pub milestones_total: u32,
    pub milestones_completed: u32,
    /// Completion rate in [0, 100], 0 when the project has no milestones.
    pub completion_rate: f64,
    /// Sum of hours across all time logs, billable or not.
    pub total_hours_logged: Decimal,
    /// Sum of hours × membership rate across all time logs. Logs from users
    /// without a membership contribute nothing.
    pub budget_used: Decimal,
}
