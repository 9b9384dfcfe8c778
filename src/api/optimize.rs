use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::{sync::Arc, time::Duration, time::Instant};
use validator::Validate;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    controller::{AppState, BaselineInputs, SweepOutcome},
    domain::{
        ChargeReading, OptimizationResult, PeakTariff, PowerMethod, PricePoint, PriceSeries,
        Session, TimedSession,
    },
    optimizer::{RunInputs, RunParameters},
};

/// Per-request overrides of the configured optimizer settings
#[derive(Debug, Default, Deserialize, Validate)]
pub struct RunOverrides {
    pub power_method: Option<PowerMethod>,
    #[validate(range(exclusive_min = 0.0))]
    pub global_capacity_kw: Option<f64>,
    #[validate(range(min = 0.0))]
    pub relaxation_penalty_weight: Option<f64>,
    #[validate(range(exclusive_min = 0.0, max = 3600.0))]
    pub solver_timeout_seconds: Option<f64>,
}

impl RunOverrides {
    fn apply(&self, mut params: RunParameters) -> RunParameters {
        if let Some(kw) = self.global_capacity_kw {
            params = params.with_capacity(kw);
        }
        if let Some(weight) = self.relaxation_penalty_weight {
            params = params.with_penalty(weight);
        }
        if let Some(secs) = self.solver_timeout_seconds {
            params = params.with_timeout(Duration::from_secs_f64(secs));
        }
        params
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct OptimizeRequest {
    pub start: DateTime<Utc>,
    #[validate(length(min = 1, message = "at least one session is required"))]
    pub sessions: Vec<Session>,
    #[validate(length(min = 1, message = "price series is empty"))]
    pub prices: Vec<PricePoint>,
    pub tariff: Option<PeakTariff>,
    #[serde(flatten)]
    #[validate(nested)]
    pub run: RunOverrides,
}

/// Historical charging used for baseline costing
#[derive(Debug, Deserialize, Validate)]
pub struct HistoryPayload {
    #[serde(default)]
    pub sessions: Vec<TimedSession>,
    #[validate(length(min = 1, message = "no charge readings"))]
    pub readings: Vec<ChargeReading>,
}

impl From<HistoryPayload> for BaselineInputs {
    fn from(h: HistoryPayload) -> Self {
        BaselineInputs {
            sessions: h.sessions,
            readings: h.readings,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SweepRequest {
    #[validate(length(min = 1, max = 1000, message = "between 1 and 1000 start times"))]
    pub starts: Vec<DateTime<Utc>>,
    #[validate(length(min = 1, message = "at least one session is required"))]
    pub sessions: Vec<Session>,
    #[validate(length(min = 1, message = "price series is empty"))]
    pub prices: Vec<PricePoint>,
    pub tariff: Option<PeakTariff>,
    #[validate(nested)]
    pub history: Option<HistoryPayload>,
    #[serde(flatten)]
    #[validate(nested)]
    pub run: RunOverrides,
}

/// POST /api/v1/optimize
pub async fn optimize(
    State(st): State<AppState>,
    Json(req): Json<OptimizeRequest>,
) -> Result<ApiResponse<OptimizationResult>, ApiError> {
    req.validate()?;
    let started = Instant::now();

    let tariff = st.controller.tariff_or_default(req.tariff)?;
    let params = req
        .run
        .apply(st.controller.run_parameters(req.start, req.run.power_method));
    let inputs = Arc::new(RunInputs {
        sessions: req.sessions,
        prices: PriceSeries::new(req.prices),
        tariff,
    });

    let result = st.controller.optimize(inputs, params).await?;
    Ok(ApiResponse::success(result).with_duration(started.elapsed().as_millis() as u64))
}

/// POST /api/v1/sweep
pub async fn sweep(
    State(st): State<AppState>,
    Json(req): Json<SweepRequest>,
) -> Result<ApiResponse<Vec<SweepOutcome>>, ApiError> {
    req.validate()?;
    let started = Instant::now();

    let tariff = st.controller.tariff_or_default(req.tariff)?;
    let inputs = Arc::new(RunInputs {
        sessions: req.sessions,
        prices: PriceSeries::new(req.prices),
        tariff,
    });
    let history = req.history.map(|h| Arc::new(BaselineInputs::from(h)));

    // sweep runs take configured settings plus the request's overrides
    let outcomes = st
        .controller
        .sweep_with(inputs, &req.starts, history, |start| {
            req.run.apply(st.controller.run_parameters(start, req.run.power_method))
        })
        .await;

    let count = outcomes.len();
    Ok(ApiResponse::success(outcomes)
        .with_count(count)
        .with_duration(started.elapsed().as_millis() as u64))
}
