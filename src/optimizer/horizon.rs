use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeSet;

use crate::domain::{is_hour_aligned, month_of, Vehicle};
use crate::error::{SchedulerError, ValidationError};

/// Discretized hourly range of one run.
///
/// Holds `n_hours + 1` timestamps: hours `0..n_hours` carry decisions and the
/// last entry is the boundary at the latest departure.
#[derive(Debug, Clone, PartialEq)]
pub struct Horizon {
    start: DateTime<Utc>,
    n_hours: usize,
    all_dates: Vec<DateTime<Utc>>,
    hour_to_month: Vec<u32>,
}

impl Horizon {
    pub fn new(start: DateTime<Utc>, n_hours: usize) -> Result<Self, ValidationError> {
        if !is_hour_aligned(start) {
            return Err(ValidationError::new(
                "simulation start",
                format!("{start} is not aligned to the hour"),
            ));
        }

        let all_dates: Vec<_> = (0..=n_hours)
            .map(|t| start + TimeDelta::hours(t as i64))
            .collect();
        let hour_to_month = all_dates.iter().map(|&d| month_of(d)).collect();

        Ok(Self {
            start,
            n_hours,
            all_dates,
            hour_to_month,
        })
    }

    /// Decision hours needed to reach the latest departure of the fleet
    pub fn fleet_hours(vehicles: &[Vehicle]) -> Result<usize, SchedulerError> {
        vehicles
            .iter()
            .map(Vehicle::departure_hour)
            .max()
            .ok_or_else(|| ValidationError::new("fleet", "no vehicles to schedule").into())
    }

    /// Horizon reaching the latest departure of the fleet
    pub fn for_fleet(start: DateTime<Utc>, vehicles: &[Vehicle]) -> Result<Self, SchedulerError> {
        Ok(Self::new(start, Self::fleet_hours(vehicles)?)?)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Number of decision hours
    pub fn n_hours(&self) -> usize {
        self.n_hours
    }

    pub fn all_dates(&self) -> &[DateTime<Utc>] {
        &self.all_dates
    }

    pub fn timestamp(&self, t: usize) -> DateTime<Utc> {
        self.all_dates[t]
    }

    pub fn month_of_hour(&self, t: usize) -> u32 {
        self.hour_to_month[t]
    }

    /// Month mapping including the boundary entry
    pub fn hour_to_month(&self) -> &[u32] {
        &self.hour_to_month
    }

    /// Every month touched by the horizon, boundary included, ascending
    pub fn months(&self) -> BTreeSet<u32> {
        self.hour_to_month.iter().copied().collect()
    }

    /// Hours that feed monthly aggregation: the boundary hour has no
    /// successor and is left out.
    pub fn aggregation_hours(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.hour_to_month[..self.n_hours].iter().copied().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_horizon_spans_boundary_hour() {
        let start = Utc.with_ymd_and_hms(2023, 1, 31, 22, 0, 0).unwrap();
        let h = Horizon::new(start, 4).unwrap();
        assert_eq!(h.all_dates().len(), 5);
        assert_eq!(h.hour_to_month(), &[1, 1, 2, 2, 2]);
        assert_eq!(h.months().into_iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(h.aggregation_hours().count(), 4);
        assert_eq!(h.timestamp(2), Utc.with_ymd_and_hms(2023, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_boundary_can_introduce_a_month() {
        let start = Utc.with_ymd_and_hms(2023, 3, 31, 21, 0, 0).unwrap();
        let h = Horizon::new(start, 3).unwrap();
        assert!(h.months().contains(&4));
        assert!(h.aggregation_hours().all(|(_, m)| m == 3));
    }

    #[test]
    fn test_for_fleet_uses_latest_departure() {
        let start = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        let fleet = vec![
            Vehicle::new("a", 0, 5, 10.0, 11.0).unwrap(),
            Vehicle::new("b", 3, 9, 10.0, 11.0).unwrap(),
        ];
        assert_eq!(Horizon::for_fleet(start, &fleet).unwrap().n_hours(), 9);
    }

    #[test]
    fn test_empty_fleet_rejected() {
        let start = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            Horizon::for_fleet(start, &[]),
            Err(SchedulerError::Validation(_))
        ));
    }

    #[test]
    fn test_unaligned_start_rejected() {
        let start = Utc.with_ymd_and_hms(2023, 6, 1, 0, 30, 0).unwrap();
        assert!(Horizon::new(start, 2).is_err());
    }
}
