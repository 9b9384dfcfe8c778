//! Month-level rollups shared by the optimized result and the baseline path

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Energy, energy cost and highest hourly load of one calendar month
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotals {
    pub energy_kwh: f64,
    pub energy_cost: f64,
    pub peak_load_kw: f64,
}

/// Fold hourly `(month, energy_kwh, cost)` entries into per-month totals.
///
/// Each entry is one hour, so its energy doubles as the hour's average load.
pub fn aggregate_monthly(hours: impl IntoIterator<Item = (u32, f64, f64)>) -> BTreeMap<u32, MonthlyTotals> {
    hours
        .into_iter()
        .fold(BTreeMap::new(), |mut months, (month, energy, cost)| {
            let totals: &mut MonthlyTotals = months.entry(month).or_default();
            totals.energy_kwh += energy;
            totals.energy_cost += cost;
            totals.peak_load_kw = totals.peak_load_kw.max(energy);
            months
        })
}

/// `tariff[m] * peak[m]` for every month with a peak value
pub fn peak_costs(peaks: &BTreeMap<u32, f64>, rate: impl Fn(u32) -> f64) -> BTreeMap<u32, f64> {
    peaks.iter().map(|(&m, &kw)| (m, rate(m) * kw)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_monthly() {
        let months = aggregate_monthly(vec![(1, 10.0, 5.0), (1, 30.0, 9.0), (2, 4.0, 1.0)]);
        assert_eq!(months.len(), 2);
        assert_eq!(months[&1].energy_kwh, 40.0);
        assert_eq!(months[&1].energy_cost, 14.0);
        assert_eq!(months[&1].peak_load_kw, 30.0);
        assert_eq!(months[&2].peak_load_kw, 4.0);
    }

    #[test]
    fn test_peak_costs() {
        let peaks = BTreeMap::from([(1, 10.0), (7, 2.0)]);
        let costs = peak_costs(&peaks, |m| if m == 1 { 100.0 } else { 50.0 });
        assert_eq!(costs[&1], 1000.0);
        assert_eq!(costs[&7], 100.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate_monthly(Vec::new()).is_empty());
    }
}
