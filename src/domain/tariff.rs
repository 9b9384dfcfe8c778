use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{SchedulerError, ValidationError};

/// Monthly demand charge: currency per kW of the month's highest hourly load
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<u32, f64>", into = "BTreeMap<u32, f64>")]
pub struct PeakTariff {
    rates: BTreeMap<u32, f64>,
}

impl PeakTariff {
    pub fn new(rates: BTreeMap<u32, f64>) -> Result<Self, ValidationError> {
        for (&month, &rate) in &rates {
            if !(1..=12).contains(&month) {
                return Err(ValidationError::new(
                    "peak tariff",
                    format!("month {month} is outside 1..=12"),
                ));
            }
            if !rate.is_finite() || rate < 0.0 {
                return Err(ValidationError::new(
                    "peak tariff",
                    format!("rate for month {month} must be non-negative, got {rate}"),
                ));
            }
        }
        Ok(Self { rates })
    }

    /// Same rate for every month
    pub fn uniform(rate: f64) -> Result<Self, ValidationError> {
        Self::new((1..=12).map(|m| (m, rate)).collect())
    }

    pub fn rate(&self, month: u32) -> Option<f64> {
        self.rates.get(&month).copied()
    }

    pub fn require(&self, month: u32) -> Result<f64, SchedulerError> {
        self.rate(month).ok_or(SchedulerError::MissingTariff { month })
    }

    pub fn rates(&self) -> &BTreeMap<u32, f64> {
        &self.rates
    }
}

impl TryFrom<BTreeMap<u32, f64>> for PeakTariff {
    type Error = ValidationError;

    fn try_from(rates: BTreeMap<u32, f64>) -> Result<Self, Self::Error> {
        Self::new(rates)
    }
}

impl From<PeakTariff> for BTreeMap<u32, f64> {
    fn from(tariff: PeakTariff) -> Self {
        tariff.rates
    }
}
