//! Cost of the observed, non-optimized charging history
//!
//! The historical readings are moved in time so that they begin at the chosen
//! simulation start, priced against the same spot series as the optimizer and
//! rolled up per month with the same aggregation.

pub mod comparison;

pub use comparison::*;

use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::domain::{
    floor_to_hour, month_of, whole_hours_between, ChargeReading, PeakTariff, PriceSeries,
    TimedSession,
};
use crate::error::{SchedulerError, ValidationError};
use crate::optimizer::aggregate::aggregate_monthly;

/// One clock hour of the shifted historical load
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyLoad {
    pub hour: DateTime<Utc>,
    pub energy_kwh: f64,
    pub energy_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCost {
    pub peak_load_kw: f64,
    pub peak_cost: f64,
    pub energy_kwh: f64,
    pub energy_cost: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineResult {
    pub start: DateTime<Utc>,
    pub shift_hours: i64,
    pub total_cost: f64,
    pub total_energy_cost: f64,
    pub total_peak_cost: f64,
    pub monthly: BTreeMap<u32, MonthlyCost>,
    pub hourly_load: Vec<HourlyLoad>,
    pub session_costs: BTreeMap<String, f64>,
    pub sessions: Vec<TimedSession>,
}

/// Whole hours to move the history so its first hour lands on `start`
pub fn shift_hours(start: DateTime<Utc>, readings: &[ChargeReading]) -> Option<i64> {
    readings
        .iter()
        .map(|r| r.timestamp)
        .min()
        .map(|first| whole_hours_between(floor_to_hour(first), start))
}

pub struct BaselineCostEngine<'a> {
    prices: &'a PriceSeries,
    tariff: &'a PeakTariff,
}

impl<'a> BaselineCostEngine<'a> {
    pub fn new(prices: &'a PriceSeries, tariff: &'a PeakTariff) -> Self {
        Self { prices, tariff }
    }

    pub fn evaluate(
        &self,
        start: DateTime<Utc>,
        sessions: &[TimedSession],
        readings: &[ChargeReading],
    ) -> Result<BaselineResult, SchedulerError> {
        let shift = shift_hours(start, readings)
            .ok_or_else(|| ValidationError::new("charge readings", "no readings to evaluate"))?;

        let sessions: Vec<TimedSession> = sessions.iter().map(|s| s.shifted(shift)).collect();

        // price join per reading: (session, hour, kWh, cost)
        let priced = readings
            .iter()
            .map(|r| -> Result<_, SchedulerError> {
                let hour = floor_to_hour(r.timestamp + TimeDelta::hours(shift));
                let price = self
                    .prices
                    .price_at(hour)
                    .ok_or(SchedulerError::DataGap { hour })?;
                let cost = price * r.charged_energy_kwh / 1000.0;
                Ok((r.session_id.as_str(), hour, r.charged_energy_kwh, cost))
            })
            .collect::<Result<Vec<_>, SchedulerError>>()?;

        let session_costs: BTreeMap<String, f64> = priced
            .iter()
            .map(|&(id, _, _, cost)| (id, cost))
            .into_grouping_map()
            .sum()
            .into_iter()
            .map(|(id, cost)| (id.to_string(), cost))
            .collect();

        let hourly_load: Vec<HourlyLoad> = priced
            .iter()
            .fold(BTreeMap::new(), |mut hours, &(_, hour, kwh, cost)| {
                let entry: &mut (f64, f64) = hours.entry(hour).or_default();
                entry.0 += kwh;
                entry.1 += cost;
                hours
            })
            .into_iter()
            .map(|(hour, (energy_kwh, energy_cost))| HourlyLoad {
                hour,
                energy_kwh,
                energy_cost,
            })
            .collect();

        let monthly = aggregate_monthly(
            hourly_load
                .iter()
                .map(|h| (month_of(h.hour), h.energy_kwh, h.energy_cost)),
        )
        .into_iter()
        .map(|(month, totals)| -> Result<_, SchedulerError> {
            let peak_cost = self.tariff.require(month)? * totals.peak_load_kw;
            Ok((
                month,
                MonthlyCost {
                    peak_load_kw: totals.peak_load_kw,
                    peak_cost,
                    energy_kwh: totals.energy_kwh,
                    energy_cost: totals.energy_cost,
                    total_cost: peak_cost + totals.energy_cost,
                },
            ))
        })
        .collect::<Result<BTreeMap<_, _>, SchedulerError>>()?;

        let total_energy_cost: f64 = monthly.values().map(|m| m.energy_cost).sum();
        let total_peak_cost: f64 = monthly.values().map(|m| m.peak_cost).sum();

        debug!(
            readings = readings.len(),
            hours = hourly_load.len(),
            months = monthly.len(),
            "baseline aggregated"
        );
        info!(
            %start,
            shift_hours = shift,
            total_cost = total_energy_cost + total_peak_cost,
            "baseline cost computed"
        );

        Ok(BaselineResult {
            start,
            shift_hours: shift,
            total_cost: total_energy_cost + total_peak_cost,
            total_energy_cost,
            total_peak_cost,
            monthly,
            hourly_load,
            session_costs,
            sessions,
        })
    }
}
