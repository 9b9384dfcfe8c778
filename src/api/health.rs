use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::controller::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    solver: &'static str,
    max_parallel_runs: usize,
    idle_run_slots: usize,
    default_tariff: bool,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let controller = &state.controller;
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        solver: controller.solver_method(),
        max_parallel_runs: controller.max_parallel_runs(),
        idle_run_slots: controller.idle_slots(),
        default_tariff: !state.cfg.tariff.monthly.is_empty(),
    };
    (StatusCode::OK, Json(response))
}
