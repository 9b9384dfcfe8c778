pub mod sweep;

pub use sweep::*;

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::baseline::{compare, BaselineCostEngine, BaselineResult, CostComparison};
use crate::config::{Config, OptimizerConfig};
use crate::domain::{
    ChargeReading, OptimizationResult, PeakTariff, PowerMethod, PriceSeries, SolveStatus,
    TimedSession,
};
use crate::error::{SchedulerError, ValidationError};
use crate::optimizer::{FleetScheduler, RunInputs, RunParameters, RunSlot};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub controller: Arc<FleetController>,
}

impl AppState {
    pub fn new(cfg: Config) -> Result<Self> {
        Self::with_scheduler(cfg, FleetScheduler::default())
    }

    pub fn with_scheduler(cfg: Config, scheduler: FleetScheduler) -> Result<Self> {
        let default_tariff = cfg.tariff.peak_tariff()?;
        if default_tariff.is_none() {
            warn!("no default tariff configured, every request must carry its own");
        }
        let controller = Arc::new(FleetController::new(
            scheduler,
            cfg.optimizer.clone(),
            default_tariff,
        ));
        Ok(Self { cfg, controller })
    }
}

/// Historical sessions and readings for a baseline evaluation
#[derive(Debug, Clone, Default)]
pub struct BaselineInputs {
    pub sessions: Vec<TimedSession>,
    pub readings: Vec<ChargeReading>,
}

/// Runs optimizations off the async executor, at most `max_parallel_runs` at once.
///
/// A run slot stays taken until every solver worker of the run has returned,
/// including workers the run stopped waiting for at its deadline.
pub struct FleetController {
    scheduler: FleetScheduler,
    defaults: OptimizerConfig,
    default_tariff: Option<PeakTariff>,
    permits: Arc<Semaphore>,
}

impl FleetController {
    pub fn new(
        scheduler: FleetScheduler,
        defaults: OptimizerConfig,
        default_tariff: Option<PeakTariff>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(defaults.max_parallel_runs.max(1)));
        Self {
            scheduler,
            defaults,
            default_tariff,
            permits,
        }
    }

    pub fn solver_method(&self) -> &'static str {
        self.scheduler.solver_method()
    }

    /// Run slots not currently taken by an optimization
    pub fn idle_slots(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn max_parallel_runs(&self) -> usize {
        self.defaults.max_parallel_runs.max(1)
    }

    /// Configured run parameters for `start`, with an optional method override
    pub fn run_parameters(&self, start: DateTime<Utc>, method: Option<PowerMethod>) -> RunParameters {
        let mut params = RunParameters::new(start, method.unwrap_or(self.defaults.power_method))
            .with_capacity(self.defaults.global_capacity_kw)
            .with_penalty(self.defaults.relaxation_penalty_weight);
        if let Some(limit) = self.defaults.solver_timeout() {
            params = params.with_timeout(limit);
        }
        params
    }

    pub fn tariff_or_default(&self, tariff: Option<PeakTariff>) -> Result<PeakTariff, SchedulerError> {
        tariff
            .or_else(|| self.default_tariff.clone())
            .ok_or_else(|| ValidationError::new("tariff", "no tariff in request and none configured").into())
    }

    pub async fn optimize(
        &self,
        inputs: Arc<RunInputs>,
        params: RunParameters,
    ) -> Result<OptimizationResult, SchedulerError> {
        let slot = RunSlot::held(self.acquire().await?);
        let scheduler = self.scheduler.clone();
        tokio::task::spawn_blocking(move || scheduler.run_in_slot(&inputs, &params, slot))
            .await
            .map_err(join_failure)?
    }

    pub async fn baseline(
        &self,
        start: DateTime<Utc>,
        prices: Arc<PriceSeries>,
        tariff: PeakTariff,
        history: Arc<BaselineInputs>,
    ) -> Result<BaselineResult, SchedulerError> {
        tokio::task::spawn_blocking(move || {
            BaselineCostEngine::new(&prices, &tariff).evaluate(start, &history.sessions, &history.readings)
        })
        .await
        .map_err(join_failure)?
    }

    /// Optimize and evaluate the baseline for one start, then compare them
    pub async fn optimize_and_compare(
        &self,
        inputs: Arc<RunInputs>,
        params: RunParameters,
        history: Arc<BaselineInputs>,
    ) -> Result<(OptimizationResult, BaselineResult, CostComparison), SchedulerError> {
        let prices = Arc::new(inputs.prices.clone());
        let tariff = inputs.tariff.clone();
        let start = params.start;
        let optimized = self.optimize(inputs, params).await?;
        let baseline = self.baseline(start, prices, tariff, history).await?;
        let comparison = compare(&optimized, &baseline);
        info!(
            %start,
            optimized = comparison.optimized_total,
            baseline = comparison.baseline_total,
            savings = comparison.savings,
            "optimized schedule compared to baseline"
        );
        Ok((optimized, baseline, comparison))
    }

    async fn acquire(&self) -> Result<tokio::sync::OwnedSemaphorePermit, SchedulerError> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| SchedulerError::Solver {
                status: SolveStatus::Other,
                reason: e.to_string(),
            })
    }
}

fn join_failure(e: tokio::task::JoinError) -> SchedulerError {
    SchedulerError::Solver {
        status: SolveStatus::Other,
        reason: format!("run task failed: {e}"),
    }
}
