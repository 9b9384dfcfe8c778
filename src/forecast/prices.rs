//! Synthetic spot price years for studies beyond the published price history.
//!
//! Every month is drawn hour by hour from a normal distribution with its own
//! mean and spread. Each month uses its own fixed seed, so a given year and
//! profile table always produce the same series.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::{PricePoint, PriceSeries};
use crate::error::ValidationError;

/// Price distribution of one calendar month, per MWh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPriceProfile {
    pub mean: f64,
    pub std_dev: f64,
}

impl MonthlyPriceProfile {
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }
}

/// Outlook for a future year with high winter and low summer prices
pub fn default_profiles() -> BTreeMap<u32, MonthlyPriceProfile> {
    [
        (960.0, 140.0),
        (970.0, 130.0),
        (930.0, 110.0),
        (760.0, 190.0),
        (650.0, 270.0),
        (600.0, 300.0),
        (620.0, 280.0),
        (660.0, 250.0),
        (760.0, 190.0),
        (810.0, 140.0),
        (900.0, 100.0),
        (960.0, 140.0),
    ]
    .into_iter()
    .zip(1u32..)
    .map(|((mean, std_dev), month)| (month, MonthlyPriceProfile::new(mean, std_dev)))
    .collect()
}

fn month_start(year: i32, month: u32) -> Result<DateTime<Utc>, ValidationError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .ok_or_else(|| ValidationError::new("year", format!("{year}-{month:02} is not a valid month")))
}

/// Hourly prices for every month of `year` that has a profile
pub fn synthetic_year(
    year: i32,
    profiles: &BTreeMap<u32, MonthlyPriceProfile>,
) -> Result<PriceSeries, ValidationError> {
    let mut points = Vec::new();

    for (&month, profile) in profiles {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::new("price profile", format!("month {month} out of range")));
        }
        let normal = Normal::new(profile.mean, profile.std_dev).map_err(|e| {
            ValidationError::new(format!("price profile for month {month}"), e.to_string())
        })?;

        let first = month_start(year, month)?;
        let next = if month == 12 {
            month_start(year + 1, 1)?
        } else {
            month_start(year, month + 1)?
        };
        let hours = (next - first).num_hours();

        let mut rng = rand::rngs::StdRng::seed_from_u64(u64::from(month) + 1);
        points.extend((0..hours).map(|h| PricePoint {
            time: first + chrono::TimeDelta::hours(h),
            price_per_mwh: normal.sample(&mut rng),
        }));

        debug!(year, month = first.month(), hours, mean = profile.mean, "synthetic prices drawn");
    }

    Ok(PriceSeries::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_year_is_hourly_and_complete() {
        let series = synthetic_year(2030, &default_profiles()).unwrap();
        assert_eq!(series.len(), 8760);
        assert_eq!(series.first_hour(), Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(series.last_hour(), Some(Utc.with_ymd_and_hms(2030, 12, 31, 23, 0, 0).unwrap()));

        let leap = synthetic_year(2028, &default_profiles()).unwrap();
        assert_eq!(leap.len(), 8784);
    }

    #[test]
    fn test_seeded_per_month() {
        let a = synthetic_year(2030, &default_profiles()).unwrap();
        let b = synthetic_year(2030, &default_profiles()).unwrap();
        assert_eq!(a, b);

        // a month's draws do not depend on which other months are present
        let june_only: BTreeMap<_, _> = default_profiles().into_iter().filter(|(m, _)| *m == 6).collect();
        let june = synthetic_year(2030, &june_only).unwrap();
        let first = Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(june.price_at(first), a.price_at(first));
    }

    #[test]
    fn test_sample_mean_tracks_profile() {
        let profiles = BTreeMap::from([(1, MonthlyPriceProfile::new(960.0, 140.0))]);
        let series = synthetic_year(2030, &profiles).unwrap();
        let mean = series.points().map(|p| p.price_per_mwh).sum::<f64>() / series.len() as f64;
        assert!((mean - 960.0).abs() < 20.0, "mean {mean}");
    }

    #[test]
    fn test_rejects_bad_profiles() {
        let negative_spread = BTreeMap::from([(1, MonthlyPriceProfile::new(500.0, -1.0))]);
        assert!(synthetic_year(2030, &negative_spread).is_err());

        let bad_month = BTreeMap::from([(13, MonthlyPriceProfile::new(500.0, 10.0))]);
        assert!(synthetic_year(2030, &bad_month).is_err());
    }
}
