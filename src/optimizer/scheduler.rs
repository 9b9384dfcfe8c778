use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    sessions_to_vehicles, OptimizationResult, PeakTariff, PowerMethod, PriceSeries, Session,
    SolveStatus, Vehicle,
};
use crate::error::SchedulerError;
use crate::optimizer::extract::{ResultExtractor, RunStamp};
use crate::optimizer::horizon::Horizon;
use crate::optimizer::model::{ChargingModel, ModelBuilder, DEFAULT_GLOBAL_CAPACITY_KW};
use crate::optimizer::relax::{ConstraintRelaxer, DEFAULT_PENALTY_WEIGHT};
use crate::optimizer::solver::{LpSolver, MinilpSolver, RunSlot, SolverOutput, SolverSession};

/// Knobs of a single optimization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub power_method: PowerMethod,
    #[serde(default = "default_capacity")]
    pub global_capacity_kw: f64,
    #[serde(default = "default_penalty")]
    pub relaxation_penalty_weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver_timeout: Option<Duration>,
}

fn default_capacity() -> f64 {
    DEFAULT_GLOBAL_CAPACITY_KW
}

fn default_penalty() -> f64 {
    DEFAULT_PENALTY_WEIGHT
}

impl RunParameters {
    pub fn new(start: DateTime<Utc>, power_method: PowerMethod) -> Self {
        Self {
            start,
            power_method,
            global_capacity_kw: DEFAULT_GLOBAL_CAPACITY_KW,
            relaxation_penalty_weight: DEFAULT_PENALTY_WEIGHT,
            solver_timeout: None,
        }
    }

    pub fn with_capacity(mut self, kw: f64) -> Self {
        self.global_capacity_kw = kw;
        self
    }

    pub fn with_penalty(mut self, weight: f64) -> Self {
        self.relaxation_penalty_weight = weight;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.solver_timeout = Some(timeout);
        self
    }
}

/// Read-only inputs shared by every run over the same fleet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInputs {
    pub sessions: Vec<Session>,
    pub prices: PriceSeries,
    pub tariff: PeakTariff,
}

/// Horizon → model → solve → (relax → solve) → extract
#[derive(Clone)]
pub struct FleetScheduler {
    solver: Arc<dyn LpSolver>,
}

impl Default for FleetScheduler {
    fn default() -> Self {
        Self::new(Arc::new(MinilpSolver))
    }
}

impl FleetScheduler {
    pub fn new(solver: Arc<dyn LpSolver>) -> Self {
        Self { solver }
    }

    pub fn solver_method(&self) -> &'static str {
        self.solver.method()
    }

    /// Convert the session table for the run's power method and optimize it
    pub fn run(&self, inputs: &RunInputs, params: &RunParameters) -> Result<OptimizationResult, SchedulerError> {
        self.run_in_slot(inputs, params, RunSlot::unbounded())
    }

    /// [`run`](Self::run) while holding a controller run slot; solver workers
    /// keep the slot taken until they return.
    pub fn run_in_slot(
        &self,
        inputs: &RunInputs,
        params: &RunParameters,
        slot: RunSlot,
    ) -> Result<OptimizationResult, SchedulerError> {
        let vehicles = sessions_to_vehicles(&inputs.sessions, params.power_method)?;
        self.optimize(&vehicles, &inputs.prices, &inputs.tariff, params, slot)
    }

    pub fn run_vehicles(
        &self,
        vehicles: &[Vehicle],
        prices: &PriceSeries,
        tariff: &PeakTariff,
        params: &RunParameters,
    ) -> Result<OptimizationResult, SchedulerError> {
        self.optimize(vehicles, prices, tariff, params, RunSlot::unbounded())
    }

    fn optimize(
        &self,
        vehicles: &[Vehicle],
        prices: &PriceSeries,
        tariff: &PeakTariff,
        params: &RunParameters,
        slot: RunSlot,
    ) -> Result<OptimizationResult, SchedulerError> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();

        // prices bound the horizon: nothing is sized by n_hours before they cover it
        let n_hours = Horizon::fleet_hours(vehicles)?;
        let hourly = prices.window(params.start, n_hours)?;
        let horizon = Horizon::new(params.start, n_hours)?;
        let model = ModelBuilder::new(vehicles, &hourly, &horizon, tariff)
            .global_capacity_kw(params.global_capacity_kw)
            .build()?;

        info!(
            %run_id,
            start = %params.start,
            power_method = %params.power_method,
            vehicles = vehicles.len(),
            n_hours = horizon.n_hours(),
            "optimization run started"
        );

        let session =
            SolverSession::open(run_id, self.solver.method(), params.solver_timeout).holding(slot);
        let (model, output) = self.solve_with_policy(&session, model, params)?;

        let result = ResultExtractor {
            vehicles,
            prices: &hourly,
            horizon: &horizon,
            tariff,
        }
        .extract(
            &model,
            &output.values,
            RunStamp {
                run_id,
                start: params.start,
                power_method: params.power_method,
            },
        )?;

        info!(
            %run_id,
            total_cost = result.total_cost,
            energy_cost = result.total_energy_cost,
            peak_cost = result.total_peak_cost,
            exceeded_power = result.exceeded_power,
            relaxed = result.relaxed,
            solves = session.solves(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "optimization run finished"
        );

        Ok(result)
    }

    /// Solve the hard model; on infeasibility relax once if the power method
    /// allows it. Only an optimal answer leaves this function.
    ///
    /// A relaxed model is solved twice: first for the least total overshoot,
    /// then for cost with the overshoot held at that least amount.
    fn solve_with_policy(
        &self,
        session: &SolverSession,
        model: ChargingModel,
        params: &RunParameters,
    ) -> Result<(ChargingModel, SolverOutput), SchedulerError> {
        let output = self.solver.solve(session, model.program());
        match output.status {
            SolveStatus::Optimal => return Ok((model, output)),
            SolveStatus::Infeasible if params.power_method.allows_relaxation() => {
                warn!(run_id = %session.run_id(), "hard model infeasible, relaxing rate caps");
            }
            SolveStatus::Infeasible => return Err(SchedulerError::Infeasible),
            status => return Err(solver_failure(session, status, output.message)),
        }

        let relaxer = ConstraintRelaxer::new(params.relaxation_penalty_weight);
        let relaxed = relaxer.relax(&model);
        let exhausted = |relaxed: &ChargingModel| SchedulerError::RelaxationExhausted {
            relaxed: relaxed.slack_vars().len(),
        };

        let least = self.solver.solve(session, &relaxer.violation_program(&relaxed));
        let least_violation = match least.status {
            SolveStatus::Optimal => least.objective,
            SolveStatus::Infeasible => return Err(exhausted(&relaxed)),
            status => return Err(solver_failure(session, status, least.message)),
        };

        let bounded = relaxer.bound_violation(relaxed, least_violation);
        let output = self.solver.solve(session, bounded.program());
        match output.status {
            SolveStatus::Optimal => Ok((bounded, output)),
            SolveStatus::Infeasible => Err(exhausted(&bounded)),
            status => Err(solver_failure(session, status, output.message)),
        }
    }
}

fn solver_failure(session: &SolverSession, status: SolveStatus, message: Option<String>) -> SchedulerError {
    match session.time_limit() {
        Some(limit) if status == SolveStatus::Other && session.deadline_passed() => {
            SchedulerError::Timeout { limit }
        }
        _ => SchedulerError::Solver {
            status,
            reason: message.unwrap_or_else(|| format!("solver returned {status}")),
        },
    }
}
