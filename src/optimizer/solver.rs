//! LP engine integration
//!
//! The engine is reached through [`LpSolver`]. The shipped implementation
//! hands the program to good_lp's minilp backend: a single pinned dual simplex
//! method with no presolve or infeasibility-reduction heuristics, deterministic
//! for identical inputs.

use good_lp::{
    constraint, minilp, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use std::cell::Cell;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::SolveStatus;
use crate::optimizer::lp::{LinearProgram, Relation};

/// Claim on one run slot of the controller.
///
/// Cloned into every solver worker, so the slot is only given back once the
/// last worker of a run has returned, even if the run stopped waiting for it.
#[derive(Debug, Clone, Default)]
pub struct RunSlot(Option<Arc<OwnedSemaphorePermit>>);

impl RunSlot {
    pub fn held(permit: OwnedSemaphorePermit) -> Self {
        Self(Some(Arc::new(permit)))
    }

    /// No slot to hold; used for direct library calls
    pub fn unbounded() -> Self {
        Self(None)
    }
}

/// Per-run solver resource.
///
/// Opened by the scheduler at the start of a run, passed by reference to every
/// solve of that run and released when dropped. Carries the run deadline.
#[derive(Debug)]
pub struct SolverSession {
    run_id: Uuid,
    method: &'static str,
    opened_at: Instant,
    time_limit: Option<Duration>,
    solves: Cell<u32>,
    slot: RunSlot,
}

impl SolverSession {
    pub fn open(run_id: Uuid, method: &'static str, time_limit: Option<Duration>) -> Self {
        debug!(%run_id, method, ?time_limit, "solver session opened");
        Self {
            run_id,
            method,
            opened_at: Instant::now(),
            time_limit,
            solves: Cell::new(0),
            slot: RunSlot::unbounded(),
        }
    }

    /// Attach the run slot that solver workers keep alive
    pub fn holding(mut self, slot: RunSlot) -> Self {
        self.slot = slot;
        self
    }

    pub fn slot(&self) -> &RunSlot {
        &self.slot
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    /// Time left before the run deadline; `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.time_limit
            .map(|limit| limit.saturating_sub(self.opened_at.elapsed()))
    }

    pub fn deadline_passed(&self) -> bool {
        self.remaining().is_some_and(|r| r.is_zero())
    }

    pub fn solves(&self) -> u32 {
        self.solves.get()
    }

    pub(crate) fn record_solve(&self) {
        self.solves.set(self.solves.get() + 1);
    }
}

impl Drop for SolverSession {
    fn drop(&mut self) {
        debug!(
            run_id = %self.run_id,
            solves = self.solves.get(),
            elapsed_ms = self.opened_at.elapsed().as_millis() as u64,
            "solver session released"
        );
    }
}

/// What came back from one solve
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    pub status: SolveStatus,
    /// Column values; empty unless `status` is optimal
    pub values: Vec<f64>,
    pub objective: f64,
    pub message: Option<String>,
}

impl SolverOutput {
    pub fn optimal(values: Vec<f64>, objective: f64) -> Self {
        Self {
            status: SolveStatus::Optimal,
            values,
            objective,
            message: None,
        }
    }

    pub fn without_solution(status: SolveStatus, message: impl Into<Option<String>>) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective: f64::NAN,
            message: message.into(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait LpSolver: Send + Sync {
    /// Method identifier recorded on the session
    fn method(&self) -> &'static str;

    fn solve(&self, session: &SolverSession, program: &LinearProgram) -> SolverOutput;
}

/// Pure-Rust dual simplex engine
#[derive(Debug, Clone, Copy, Default)]
pub struct MinilpSolver;

impl MinilpSolver {
    pub const METHOD: &'static str = "minilp-dual-simplex";

    fn solve_blocking(program: &LinearProgram) -> SolverOutput {
        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = program
            .variables()
            .iter()
            .map(|v| problem.add(variable().min(v.lower).max(v.upper)))
            .collect();

        let objective: Expression = program
            .variables()
            .iter()
            .zip(&vars)
            .map(|(v, &x)| v.cost * x)
            .sum();

        let mut model = problem.minimise(objective).using(minilp);
        for c in program.constraints() {
            let lhs: Expression = c.terms.iter().map(|&(id, coeff)| coeff * vars[id.0]).sum();
            let rhs = c.rhs;
            model = model.with(match c.relation {
                Relation::Eq => constraint!(lhs == rhs),
                Relation::Le => constraint!(lhs <= rhs),
                Relation::Ge => constraint!(lhs >= rhs),
            });
        }

        match model.solve() {
            Ok(solution) => {
                let values: Vec<f64> = vars.iter().map(|&v| solution.value(v)).collect();
                let objective = program.objective(&values);
                SolverOutput::optimal(values, objective)
            }
            Err(ResolutionError::Infeasible) => SolverOutput::without_solution(SolveStatus::Infeasible, None),
            Err(ResolutionError::Unbounded) => SolverOutput::without_solution(SolveStatus::Unbounded, None),
            Err(e) => SolverOutput::without_solution(SolveStatus::Other, Some(e.to_string())),
        }
    }
}

/// Run `work` on a worker thread and stop waiting after `remaining`.
///
/// The worker owns a clone of `slot` until `work` returns; a late answer is
/// dropped with the channel.
pub(crate) fn run_with_deadline<F>(remaining: Duration, slot: RunSlot, work: F) -> SolverOutput
where
    F: FnOnce() -> SolverOutput + Send + 'static,
{
    if remaining.is_zero() {
        return SolverOutput::without_solution(
            SolveStatus::Other,
            Some("deadline reached before solve".to_string()),
        );
    }

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _slot = slot;
        let _ = tx.send(work());
    });

    match rx.recv_timeout(remaining) {
        Ok(output) => output,
        Err(mpsc::RecvTimeoutError::Timeout) => SolverOutput::without_solution(
            SolveStatus::Other,
            Some(format!("deadline exceeded after {} ms", remaining.as_millis())),
        ),
        Err(mpsc::RecvTimeoutError::Disconnected) => SolverOutput::without_solution(
            SolveStatus::Other,
            Some("solver worker terminated without a result".to_string()),
        ),
    }
}

impl LpSolver for MinilpSolver {
    fn method(&self) -> &'static str {
        Self::METHOD
    }

    fn solve(&self, session: &SolverSession, program: &LinearProgram) -> SolverOutput {
        session.record_solve();
        let started = Instant::now();

        let output = match session.remaining() {
            Some(remaining) => {
                let owned = program.clone();
                run_with_deadline(remaining, session.slot().clone(), move || {
                    Self::solve_blocking(&owned)
                })
            }
            None => Self::solve_blocking(program),
        };

        if output.status == SolveStatus::Other {
            warn!(run_id = %session.run_id(), message = ?output.message, "solve did not complete");
        }
        debug!(
            run_id = %session.run_id(),
            status = %output.status,
            variables = program.num_vars(),
            constraints = program.num_constraints(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "lp solved"
        );

        output
    }
}
