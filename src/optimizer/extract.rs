use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::{
    HourlyPrices, OptimizationResult, PeakTariff, PowerMethod, SolveStatus, Vehicle,
    VehicleSchedule,
};
use crate::error::SchedulerError;
use crate::optimizer::aggregate::{aggregate_monthly, peak_costs};
use crate::optimizer::horizon::Horizon;
use crate::optimizer::model::ChargingModel;

/// Run metadata stamped onto the result
#[derive(Debug, Clone, Copy)]
pub struct RunStamp {
    pub run_id: Uuid,
    pub start: DateTime<Utc>,
    pub power_method: PowerMethod,
}

/// Reads an optimal solution back into an [`OptimizationResult`]
pub struct ResultExtractor<'a> {
    pub vehicles: &'a [Vehicle],
    pub prices: &'a HourlyPrices,
    pub horizon: &'a Horizon,
    pub tariff: &'a PeakTariff,
}

impl ResultExtractor<'_> {
    pub fn extract(
        &self,
        model: &ChargingModel,
        values: &[f64],
        stamp: RunStamp,
    ) -> Result<OptimizationResult, SchedulerError> {
        let n_hours = self.horizon.n_hours();
        if values.len() != model.program().num_vars() {
            return Err(SchedulerError::Solver {
                status: SolveStatus::Other,
                reason: format!(
                    "solution has {} values for {} variables",
                    values.len(),
                    model.program().num_vars()
                ),
            });
        }

        let mut total_load_profile = vec![0.0; n_hours];
        let vehicles: Vec<VehicleSchedule> = self
            .vehicles
            .iter()
            .zip(model.charge_vars())
            .map(|(vehicle, vars)| {
                let mut schedule = vec![0.0; n_hours];
                for (t, var) in vars.hours() {
                    schedule[t] = values[var.0];
                    total_load_profile[t] += values[var.0];
                }
                let energy_cost = schedule
                    .iter()
                    .zip(self.prices.as_slice())
                    .map(|(kw, price)| kw * price)
                    .sum();
                VehicleSchedule {
                    id: vehicle.id().to_string(),
                    energy_cost,
                    total_charge_kwh: schedule.iter().sum(),
                    schedule,
                }
            })
            .collect();

        let peak_load_monthly: BTreeMap<u32, f64> = model
            .peak_vars()
            .iter()
            .map(|(&m, var)| (m, values[var.0]))
            .collect();
        let peak_cost_monthly = peak_costs(&peak_load_monthly, |m| {
            self.tariff.rate(m).unwrap_or_default()
        });

        let total_energy_cost: f64 = vehicles.iter().map(|v| v.energy_cost).sum();
        let total_peak_cost: f64 = peak_cost_monthly.values().sum();
        let exceeded_power = model.slack_vars().iter().map(|s| values[s.0]).sum();

        let monthly = aggregate_monthly(self.horizon.aggregation_hours().map(|(t, month)| {
            let load = total_load_profile[t];
            (month, load, load * self.prices.at(t))
        }));

        Ok(OptimizationResult {
            run_id: stamp.run_id,
            status: SolveStatus::Optimal,
            start: stamp.start,
            power_method: stamp.power_method,
            peak_tariff: self.tariff.clone(),
            relaxed: model.is_relaxed(),
            total_cost: total_energy_cost + total_peak_cost,
            total_energy_cost,
            total_peak_cost,
            exceeded_power,
            peak_load_monthly,
            peak_cost_monthly,
            vehicles,
            total_load_profile,
            monthly_energy_charge: monthly.iter().map(|(&m, t)| (m, t.energy_kwh)).collect(),
            monthly_energy_cost: monthly.iter().map(|(&m, t)| (m, t.energy_cost)).collect(),
        })
    }
}
