use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The association between a user and a project.
///
/// Carries the negotiated hourly rate used when a time log is created
/// without an explicit rate, and when project budget usage is rolled up.
/// A user can be a member of a project at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMember {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub hourly_rate: Decimal,
    pub created_at: DateTime<Utc>,
}

/// The member's role within the project. Authorization itself is enforced
/// upstream; the role is carried here for display and reporting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Manager,
    Contributor,
    Viewer,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Contributor => "contributor",
            Self::Viewer => "viewer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "manager" => Some(Self::Manager),
            "contributor" => Some(Self::Contributor),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

/// Input for adding a member to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemberInput {
    pub user_id: Uuid,
    pub role: Option<MemberRole>,
    pub hourly_rate: Option<Decimal>,
}
