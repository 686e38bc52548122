use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracked unit of work within a project.
///
/// Milestones own the status/progress state machine: status is inferred from
/// progress updates by the lifecycle service, never written directly by API
/// callers. `actual_hours` and `budget_used` are roll-ups over the
/// milestone's time logs, refreshed on demand.
///
/// Milestones are soft-deleted; `sort_order` stays unique within a project
/// even across deletions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Optional assignee, referenced in the external identity system.
    pub assignee_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub status: MilestoneStatus,
    pub priority: Priority,
    /// Per-project sequence; auto-assigned as max + 1 when not supplied.
    pub sort_order: i64,
    /// Always within [0, 100]; exactly 100 iff status is `Completed`.
    pub progress_percentage: i64,
    pub estimated_hours: Option<Decimal>,
    pub actual_hours: Decimal,
    pub due_date: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub budget_allocated: Option<Decimal>,
    pub budget_used: Decimal,
    pub risk_level: RiskLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The lifecycle status of a milestone.
///
/// - `Pending`: Created, no work recorded yet
/// - `InProgress`: First progress recorded or explicitly started
/// - `Completed`: Progress reached 100 (terminal)
/// - `Cancelled`: Abandoned (terminal)
/// - `OnHold`: Parked, reachable from any non-terminal state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
    OnHold,
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::OnHold => "on_hold",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "on_hold" => Some(Self::OnHold),
            _ => None,
        }
    }

    /// Completed and cancelled milestones are never reopened automatically.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Scheduling priority of a milestone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Delivery risk assessment for a milestone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Input for creating a new milestone. Status always starts at `Pending`;
/// `sort_order` is auto-assigned within the project when not supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMilestoneInput {
    pub name: String,
    pub description: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub sort_order: Option<i64>,
    pub estimated_hours: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
    pub budget_allocated: Option<Decimal>,
    pub risk_level: Option<RiskLevel>,
}

/// Input for updating a milestone's descriptive fields. Status and progress
/// are owned by the lifecycle service and deliberately absent here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMilestoneInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub sort_order: Option<i64>,
    pub estimated_hours: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
    pub budget_allocated: Option<Decimal>,
    pub risk_level: Option<RiskLevel>,
}

/// Input for the progress endpoint. Out-of-range values are clamped, not
/// rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProgressInput {
    pub percentage: i64,
}
