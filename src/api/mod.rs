mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Database;
use crate::services::{
    Clock, MilestoneLifecycle, ProjectAggregator, SystemClock, TimeLogReconciler,
};

/// Shared handler state: the database plus the three services built over it.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub lifecycle: MilestoneLifecycle,
    pub aggregator: ProjectAggregator,
    pub reconciler: TimeLogReconciler,
}

impl AppState {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self {
            lifecycle: MilestoneLifecycle::new(db.clone(), clock.clone()),
            aggregator: ProjectAggregator::new(db.clone()),
            reconciler: TimeLogReconciler::new(db.clone(), clock),
            db,
        }
    }
}

pub fn create_router(db: Database) -> Router {
    create_router_with_clock(db, Arc::new(SystemClock))
}

/// Router with an injected clock, used by tests that pin time.
pub fn create_router_with_clock(db: Database, clock: Arc<dyn Clock>) -> Router {
    let state = AppState::new(db, clock);

    let api = Router::new()
        // Projects
        .route("/projects", get(handlers::list_projects))
        .route("/projects", post(handlers::create_project))
        .route("/projects/{id}", get(handlers::get_project))
        .route("/projects/{id}", put(handlers::update_project))
        .route("/projects/{id}", delete(handlers::delete_project))
        .route("/projects/{id}/stats", get(handlers::get_project_stats))
        .route("/projects/{id}/progress", post(handlers::recompute_project_progress))
        .route("/projects/{id}/milestones", get(handlers::list_milestones))
        .route("/projects/{id}/milestones", post(handlers::create_milestone))
        .route("/projects/{id}/members", get(handlers::list_members))
        .route("/projects/{id}/members", post(handlers::add_member))
        .route("/projects/{id}/time-logs", get(handlers::list_time_logs))
        // Members (for delete by membership id)
        .route("/members/{id}", delete(handlers::remove_member))
        // Milestones
        .route("/milestones/{id}", get(handlers::get_milestone))
        .route("/milestones/{id}", put(handlers::update_milestone))
        .route("/milestones/{id}", delete(handlers::delete_milestone))
        .route("/milestones/{id}/progress", post(handlers::update_milestone_progress))
        .route("/milestones/{id}/start", post(handlers::start_milestone))
        .route("/milestones/{id}/complete", post(handlers::complete_milestone))
        .route("/milestones/{id}/hold", post(handlers::hold_milestone))
        .route("/milestones/{id}/cancel", post(handlers::cancel_milestone))
        .route("/milestones/{id}/recalculate", post(handlers::recalculate_milestone))
        // Time logs
        .route("/time-logs", post(handlers::create_time_log))
        .route("/time-logs/{id}", get(handlers::get_time_log))
        .route("/time-logs/{id}", put(handlers::update_time_log))
        .route("/time-logs/{id}", delete(handlers::delete_time_log))
        .route("/time-logs/{id}/approve", post(handlers::approve_time_log))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
