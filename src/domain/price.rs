use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::types::{floor_to_hour, is_hour_aligned};
use crate::error::{SchedulerError, ValidationError};

/// One hourly spot price as delivered by the price feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub price_per_mwh: f64,
}

/// Hourly spot prices keyed by the start of each hour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PricePoint>", into = "Vec<PricePoint>")]
pub struct PriceSeries {
    prices: BTreeMap<DateTime<Utc>, f64>,
}

impl PriceSeries {
    /// Build a series from feed points. Points are re-keyed to the start of
    /// their hour; a later point for the same hour replaces an earlier one.
    pub fn new(points: impl IntoIterator<Item = PricePoint>) -> Self {
        let prices = points
            .into_iter()
            .map(|p| (floor_to_hour(p.time), p.price_per_mwh))
            .collect();
        Self { prices }
    }

    /// Contiguous series starting at `start` with one price per hour
    pub fn from_hourly(start: DateTime<Utc>, prices_per_mwh: &[f64]) -> Self {
        let start = floor_to_hour(start);
        Self::new(prices_per_mwh.iter().enumerate().map(|(i, &p)| PricePoint {
            time: start + TimeDelta::hours(i as i64),
            price_per_mwh: p,
        }))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn first_hour(&self) -> Option<DateTime<Utc>> {
        self.prices.keys().next().copied()
    }

    pub fn last_hour(&self) -> Option<DateTime<Utc>> {
        self.prices.keys().next_back().copied()
    }

    /// Price for the hour containing `ts` (per MWh)
    pub fn price_at(&self, ts: DateTime<Utc>) -> Option<f64> {
        self.prices.get(&floor_to_hour(ts)).copied()
    }

    pub fn points(&self) -> impl Iterator<Item = PricePoint> + '_ {
        self.prices.iter().map(|(&time, &price_per_mwh)| PricePoint {
            time,
            price_per_mwh,
        })
    }

    /// Per-kWh prices for `n_hours` consecutive hours from `start`.
    ///
    /// The start hour itself must be present, and every hour after it up to
    /// the horizon length; the first missing hour is reported.
    pub fn window(&self, start: DateTime<Utc>, n_hours: usize) -> Result<HourlyPrices, SchedulerError> {
        if !is_hour_aligned(start) {
            return Err(ValidationError::new(
                "simulation start",
                format!("{start} is not aligned to the hour"),
            )
            .into());
        }
        if !self.prices.contains_key(&start) {
            return Err(SchedulerError::DataGap { hour: start });
        }

        let per_kwh = (0..n_hours)
            .map(|t| {
                let hour = start + TimeDelta::hours(t as i64);
                self.prices
                    .get(&hour)
                    .map(|p| p / 1000.0)
                    .ok_or(SchedulerError::DataGap { hour })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(HourlyPrices { start, per_kwh })
    }
}

impl From<Vec<PricePoint>> for PriceSeries {
    fn from(points: Vec<PricePoint>) -> Self {
        Self::new(points)
    }
}

impl From<PriceSeries> for Vec<PricePoint> {
    fn from(series: PriceSeries) -> Self {
        series.points().collect()
    }
}

/// Contiguous per-kWh prices aligned to horizon hour indices
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyPrices {
    start: DateTime<Utc>,
    per_kwh: Vec<f64>,
}

impl HourlyPrices {
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn len(&self) -> usize {
        self.per_kwh.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_kwh.is_empty()
    }

    /// Price per kWh at horizon hour `t`
    pub fn at(&self, t: usize) -> f64 {
        self.per_kwh[t]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.per_kwh
    }
}
