//! Start-time sweeps: the same fleet optimized against many simulation starts.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::baseline::CostComparison;
use crate::controller::{BaselineInputs, FleetController};
use crate::domain::{OptimizationResult, PowerMethod, SolveStatus};
use crate::error::SchedulerError;
use crate::optimizer::{RunInputs, RunParameters};

/// Result of one start in a sweep. A failed start does not abort the others.
#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    pub start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SolveStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<OptimizationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<CostComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SweepOutcome {
    fn succeeded(start: DateTime<Utc>, result: OptimizationResult, comparison: Option<CostComparison>) -> Self {
        Self {
            start,
            status: Some(result.status),
            result: Some(result),
            comparison,
            error: None,
        }
    }

    fn failed(start: DateTime<Utc>, err: &SchedulerError) -> Self {
        Self {
            start,
            status: err.status(),
            result: None,
            comparison: None,
            error: Some(err.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_some()
    }
}

impl FleetController {
    /// Sweep with the configured run parameters. Outcomes are returned in the
    /// order of `starts`.
    pub async fn sweep(
        &self,
        inputs: Arc<RunInputs>,
        starts: &[DateTime<Utc>],
        method: Option<PowerMethod>,
        history: Option<Arc<BaselineInputs>>,
    ) -> Vec<SweepOutcome> {
        self.sweep_with(inputs, starts, history, |start| self.run_parameters(start, method))
            .await
    }

    pub async fn sweep_with(
        &self,
        inputs: Arc<RunInputs>,
        starts: &[DateTime<Utc>],
        history: Option<Arc<BaselineInputs>>,
        params_for: impl Fn(DateTime<Utc>) -> RunParameters,
    ) -> Vec<SweepOutcome> {
        let started = Instant::now();

        let runs = starts.iter().map(|&start| {
            let inputs = inputs.clone();
            let history = history.clone();
            let params = params_for(start);
            async move {
                let outcome = match history {
                    Some(history) => self
                        .optimize_and_compare(inputs, params, history)
                        .await
                        .map(|(result, _, comparison)| (result, Some(comparison))),
                    None => self.optimize(inputs, params).await.map(|r| (r, None)),
                };
                match outcome {
                    Ok((result, comparison)) => SweepOutcome::succeeded(start, result, comparison),
                    Err(e) => {
                        warn!(%start, error = %e, "sweep run failed");
                        SweepOutcome::failed(start, &e)
                    }
                }
            }
        });
        let outcomes = join_all(runs).await;

        info!(
            runs = outcomes.len(),
            failed = outcomes.iter().filter(|o| !o.is_ok()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sweep finished"
        );
        outcomes
    }
}
