use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A record of hours worked against a project, optionally attributed to a
/// milestone.
///
/// Hours and rate may be left unset at creation; the reconciler derives
/// hours from the start/end span and resolves the rate from the user's
/// project membership before the row is persisted. The billable amount is
/// never stored — see [`TimeLog::total_amount`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeLog {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub milestone_id: Option<Uuid>,
    pub description: Option<String>,
    pub hours: Decimal,
    pub hourly_rate: Decimal,
    pub is_billable: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Set exactly once by an approver; re-approval is rejected.
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeLog {
    /// Billable amount, always computed from the current hours and rate so
    /// the figure never goes stale when either changes after creation.
    pub fn total_amount(&self) -> Decimal {
        self.hours * self.hourly_rate
    }
}

/// Input for logging work. `hours` and `hourly_rate` may be omitted; the
/// reconciler fills them in from the time span and project membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTimeLogInput {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub milestone_id: Option<Uuid>,
    pub description: Option<String>,
    pub hours: Option<Decimal>,
    pub hourly_rate: Option<Decimal>,
    #[serde(default = "default_billable")]
    pub is_billable: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

fn default_billable() -> bool {
    true
}

/// Input for updating a time log. Clearing `hours` while start/end are set
/// re-derives the span on save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTimeLogInput {
    pub milestone_id: Option<Uuid>,
    pub description: Option<String>,
    pub hours: Option<Decimal>,
    pub hourly_rate: Option<Decimal>,
    pub is_billable: Option<bool>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Input for approving a time log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveTimeLogInput {
    pub approver_id: Uuid,
}

/// A time log together with its derived billable amount, used for detailed
/// responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeLogWithAmount {
    #[serde(flatten)]
    pub time_log: TimeLog,
    pub total_amount: Decimal,
}

impl From<TimeLog> for TimeLogWithAmount {
    fn from(time_log: TimeLog) -> Self {
        let total_amount = time_log.total_amount();
        Self {
            time_log,
            total_amount,
        }
    }
}
