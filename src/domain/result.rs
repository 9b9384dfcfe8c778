use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::{PeakTariff, PowerMethod, SolveStatus};

/// Optimized charging plan and energy cost for one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSchedule {
    pub id: String,
    pub energy_cost: f64,
    pub total_charge_kwh: f64,
    /// kW per horizon hour; zero outside the parking window
    pub schedule: Vec<f64>,
}

/// Outcome of one optimization run. Built once by the extractor and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub run_id: Uuid,
    pub status: SolveStatus,
    pub start: DateTime<Utc>,
    pub power_method: PowerMethod,
    pub peak_tariff: PeakTariff,
    /// Rate caps had to be softened to reach a feasible plan
    pub relaxed: bool,
    pub total_cost: f64,
    pub total_energy_cost: f64,
    pub total_peak_cost: f64,
    pub exceeded_power: f64,
    pub peak_load_monthly: BTreeMap<u32, f64>,
    pub peak_cost_monthly: BTreeMap<u32, f64>,
    pub vehicles: Vec<VehicleSchedule>,
    pub total_load_profile: Vec<f64>,
    pub monthly_energy_charge: BTreeMap<u32, f64>,
    pub monthly_energy_cost: BTreeMap<u32, f64>,
}

impl OptimizationResult {
    pub fn n_hours(&self) -> usize {
        self.total_load_profile.len()
    }

    pub fn vehicle(&self, id: &str) -> Option<&VehicleSchedule> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    pub fn vehicle_energy_costs(&self) -> Vec<f64> {
        self.vehicles.iter().map(|v| v.energy_cost).collect()
    }

    /// Highest fleet load over the whole horizon
    pub fn max_load_kw(&self) -> f64 {
        self.total_load_profile.iter().copied().fold(0.0, f64::max)
    }
}
