use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::DomainError;
use crate::models::*;

// ============================================================
// Error Handling
// ============================================================

/// Map a service/storage error to a client response. Domain-rule errors are
/// safe to expose; anything else is logged server-side and reported as a
/// generic internal error so storage details never leak to clients.
fn map_error(e: anyhow::Error) -> (StatusCode, String) {
    match e.downcast_ref::<DomainError>() {
        Some(DomainError::NotFound(_)) => {
            tracing::warn!("Not found: {}", e);
            (StatusCode::NOT_FOUND, e.to_string())
        }
        Some(_) => {
            tracing::warn!("Validation error: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        None => {
            tracing::error!("Internal error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

fn not_found(what: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{what} not found"))
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Projects
// ============================================================

pub async fn list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<Project>>, (StatusCode, String)> {
    state.db.get_all_projects().map(Json).map_err(map_error)
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, (StatusCode, String)> {
    state
        .db
        .get_project(id)
        .map_err(map_error)?
        .map(Json)
        .ok_or_else(|| not_found("Project"))
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(input): Json<CreateProjectInput>,
) -> Result<(StatusCode, Json<Project>), (StatusCode, String)> {
    state
        .db
        .create_project(input)
        .map(|p| (StatusCode::CREATED, Json(p)))
        .map_err(map_error)
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateProjectInput>,
) -> Result<Json<Project>, (StatusCode, String)> {
    state
        .db
        .update_project(id, input)
        .map_err(map_error)?
        .map(Json)
        .ok_or_else(|| not_found("Project"))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.db.soft_delete_project(id).map_err(map_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Project"))
    }
}

pub async fn get_project_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectStats>, (StatusCode, String)> {
    state.aggregator.stats(id).map(Json).map_err(map_error)
}

/// Explicit recompute of the project's cached completion rate. Milestone
/// handlers call the same aggregation after their own writes; this endpoint
/// lets callers reconcile on demand (e.g. after bulk imports).
pub async fn recompute_project_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, (StatusCode, String)> {
    state.aggregator.update_progress(id).map_err(map_error)?;
    state
        .db
        .get_project(id)
        .map_err(map_error)?
        .map(Json)
        .ok_or_else(|| not_found("Project"))
}

// ============================================================
// Milestones
// ============================================================

pub async fn list_milestones(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Milestone>>, (StatusCode, String)> {
    state
        .db
        .get_milestones_by_project(project_id)
        .map(Json)
        .map_err(map_error)
}

pub async fn get_milestone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Milestone>, (StatusCode, String)> {
    state
        .db
        .get_milestone(id)
        .map_err(map_error)?
        .map(Json)
        .ok_or_else(|| not_found("Milestone"))
}

pub async fn create_milestone(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(input): Json<CreateMilestoneInput>,
) -> Result<(StatusCode, Json<Milestone>), (StatusCode, String)> {
    state
        .db
        .create_milestone(project_id, input)
        .map(|m| (StatusCode::CREATED, Json(m)))
        .map_err(map_error)
}

pub async fn update_milestone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateMilestoneInput>,
) -> Result<Json<Milestone>, (StatusCode, String)> {
    state
        .db
        .update_milestone(id, input)
        .map_err(map_error)?
        .map(Json)
        .ok_or_else(|| not_found("Milestone"))
}

pub async fn delete_milestone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let Some(milestone) = state.db.get_milestone(id).map_err(map_error)? else {
        return Err(not_found("Milestone"));
    };

    state.db.soft_delete_milestone(id).map_err(map_error)?;
    // The milestone leaves the completion-rate denominator, so refresh the
    // parent's cached figure.
    state
        .aggregator
        .update_progress(milestone.project_id)
        .map_err(map_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_milestone_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateProgressInput>,
) -> Result<Json<Milestone>, (StatusCode, String)> {
    let milestone = state
        .lifecycle
        .update_progress(id, input.percentage)
        .map_err(map_error)?;
    state
        .aggregator
        .update_progress(milestone.project_id)
        .map_err(map_error)?;
    Ok(Json(milestone))
}

pub async fn start_milestone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Milestone>, (StatusCode, String)> {
    state.lifecycle.start(id).map(Json).map_err(map_error)
}

pub async fn complete_milestone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Milestone>, (StatusCode, String)> {
    let milestone = state.lifecycle.complete(id).map_err(map_error)?;
    state
        .aggregator
        .update_progress(milestone.project_id)
        .map_err(map_error)?;
    Ok(Json(milestone))
}

pub async fn hold_milestone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Milestone>, (StatusCode, String)> {
    state.lifecycle.hold(id).map(Json).map_err(map_error)
}

pub async fn cancel_milestone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Milestone>, (StatusCode, String)> {
    state.lifecycle.cancel(id).map(Json).map_err(map_error)
}

#[derive(Debug, Serialize)]
pub struct RecalculateResponse {
    pub actual_hours: Decimal,
    pub budget_used: Decimal,
}

pub async fn recalculate_milestone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RecalculateResponse>, (StatusCode, String)> {
    let actual_hours = state
        .lifecycle
        .recalculate_actual_hours(id)
        .map_err(map_error)?;
    let budget_used = state
        .lifecycle
        .recalculate_budget_used(id)
        .map_err(map_error)?;
    Ok(Json(RecalculateResponse {
        actual_hours,
        budget_used,
    }))
}

// ============================================================
// Project members
// ============================================================

pub async fn list_members(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<ProjectMember>>, (StatusCode, String)> {
    state
        .db
        .get_members_by_project(project_id)
        .map(Json)
        .map_err(map_error)
}

pub async fn add_member(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(input): Json<AddMemberInput>,
) -> Result<(StatusCode, Json<ProjectMember>), (StatusCode, String)> {
    state
        .db
        .add_member(project_id, input)
        .map(|m| (StatusCode::CREATED, Json(m)))
        .map_err(map_error)
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.db.remove_member(id).map_err(map_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Member"))
    }
}

// ============================================================
// Time logs
// ============================================================

pub async fn list_time_logs(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<TimeLogWithAmount>>, (StatusCode, String)> {
    let logs = state
        .db
        .get_time_logs_by_project(project_id)
        .map_err(map_error)?;
    Ok(Json(logs.into_iter().map(Into::into).collect()))
}

pub async fn get_time_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TimeLogWithAmount>, (StatusCode, String)> {
    state
        .db
        .get_time_log(id)
        .map_err(map_error)?
        .map(|log| Json(log.into()))
        .ok_or_else(|| not_found("Time log"))
}

pub async fn create_time_log(
    State(state): State<AppState>,
    Json(input): Json<CreateTimeLogInput>,
) -> Result<(StatusCode, Json<TimeLogWithAmount>), (StatusCode, String)> {
    state
        .reconciler
        .log_time(input)
        .map(|log| (StatusCode::CREATED, Json(log.into())))
        .map_err(map_error)
}

pub async fn update_time_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTimeLogInput>,
) -> Result<Json<TimeLogWithAmount>, (StatusCode, String)> {
    state
        .reconciler
        .update(id, input)
        .map_err(map_error)?
        .map(|log| Json(log.into()))
        .ok_or_else(|| not_found("Time log"))
}

pub async fn delete_time_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.db.delete_time_log(id).map_err(map_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Time log"))
    }
}

pub async fn approve_time_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ApproveTimeLogInput>,
) -> Result<Json<TimeLogWithAmount>, (StatusCode, String)> {
    state
        .reconciler
        .approve(id, input.approver_id)
        .map(|log| Json(log.into()))
        .map_err(map_error)
}
