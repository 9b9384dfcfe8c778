use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::domain::SolveStatus;

/// A malformed input record, rejected before any solver work
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {subject}: {reason}")]
pub struct ValidationError {
    pub subject: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}

/// Terminal failures of a scheduling or baseline run
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no peak tariff configured for month {month}")]
    MissingTariff { month: u32 },

    #[error("price series has no entry for hour {hour}")]
    DataGap { hour: DateTime<Utc> },

    #[error("no feasible charging schedule under hard constraints")]
    Infeasible,

    #[error("model still infeasible after relaxing {relaxed} rate caps")]
    RelaxationExhausted { relaxed: usize },

    #[error("solver deadline of {} ms exceeded", .limit.as_millis())]
    Timeout { limit: Duration },

    #[error("solver finished with status {status}: {reason}")]
    Solver { status: SolveStatus, reason: String },
}

impl SchedulerError {
    /// Solve status this error corresponds to, if it came out of the solver stage
    pub fn status(&self) -> Option<SolveStatus> {
        match self {
            SchedulerError::Infeasible | SchedulerError::RelaxationExhausted { .. } => {
                Some(SolveStatus::Infeasible)
            }
            SchedulerError::Timeout { .. } => Some(SolveStatus::Other),
            SchedulerError::Solver { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Infeasibility without relaxation is reportable; everything after a solver
    /// attempt that could not recover is fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedulerError::RelaxationExhausted { .. }
                | SchedulerError::Timeout { .. }
                | SchedulerError::Solver { .. }
        )
    }

    /// Raised before the solver was ever invoked
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SchedulerError::Validation(_)
                | SchedulerError::MissingTariff { .. }
                | SchedulerError::DataGap { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SchedulerError::Timeout { .. })
    }
}
