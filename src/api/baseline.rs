use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::{sync::Arc, time::Instant};
use validator::Validate;

use crate::{
    api::{error::ApiError, optimize::HistoryPayload, response::ApiResponse},
    baseline::BaselineResult,
    controller::{AppState, BaselineInputs},
    domain::{PeakTariff, PricePoint, PriceSeries},
};

#[derive(Debug, Deserialize, Validate)]
pub struct BaselineRequest {
    pub start: DateTime<Utc>,
    #[serde(flatten)]
    #[validate(nested)]
    pub history: HistoryPayload,
    #[validate(length(min = 1, message = "price series is empty"))]
    pub prices: Vec<PricePoint>,
    pub tariff: Option<PeakTariff>,
}

/// POST /api/v1/baseline
pub async fn baseline(
    State(st): State<AppState>,
    Json(req): Json<BaselineRequest>,
) -> Result<ApiResponse<BaselineResult>, ApiError> {
    req.validate()?;
    let started = Instant::now();

    let tariff = st.controller.tariff_or_default(req.tariff)?;
    let result = st
        .controller
        .baseline(
            req.start,
            Arc::new(PriceSeries::new(req.prices)),
            tariff,
            Arc::new(BaselineInputs::from(req.history)),
        )
        .await?;

    Ok(ApiResponse::success(result).with_duration(started.elapsed().as_millis() as u64))
}
