use axum::Json;
use serde::Deserialize;
use validator::Validate;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    domain::{attach_observed_power, index_sessions, ChargeReading, Session, TimedSession},
};

#[derive(Debug, Deserialize, Validate)]
pub struct IndexSessionsRequest {
    #[validate(length(min = 1, message = "at least one session is required"))]
    pub sessions: Vec<TimedSession>,
    /// Readings used to estimate each session's observed max power
    #[serde(default)]
    pub readings: Vec<ChargeReading>,
    #[validate(range(min = 1))]
    pub departure_cap_hours: Option<u32>,
}

/// POST /api/v1/sessions/index
///
/// Turns timestamped sessions into the hour-indexed table the optimizer takes.
pub async fn index(
    Json(req): Json<IndexSessionsRequest>,
) -> Result<ApiResponse<Vec<Session>>, ApiError> {
    req.validate()?;
    let mut sessions = req.sessions;
    if !req.readings.is_empty() {
        attach_observed_power(&mut sessions, &req.readings);
    }
    let indexed = index_sessions(&sessions, req.departure_cap_hours);
    let count = indexed.len();
    Ok(ApiResponse::success(indexed).with_count(count))
}
