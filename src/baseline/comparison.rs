use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::baseline::BaselineResult;
use crate::domain::OptimizationResult;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyComparison {
    pub optimized_cost: f64,
    pub baseline_cost: f64,
    pub savings: f64,
}

/// Optimized schedule against the historical baseline over the same prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostComparison {
    pub optimized_total: f64,
    pub baseline_total: f64,
    pub savings: f64,
    /// `None` when the baseline cost nothing
    pub savings_percent: Option<f64>,
    pub peak_reduction_kw: f64,
    pub monthly: BTreeMap<u32, MonthlyComparison>,
}

pub fn compare(optimized: &OptimizationResult, baseline: &BaselineResult) -> CostComparison {
    let optimized_monthly = |m: u32| {
        optimized.peak_cost_monthly.get(&m).copied().unwrap_or_default()
            + optimized.monthly_energy_cost.get(&m).copied().unwrap_or_default()
    };
    let baseline_monthly = |m: u32| baseline.monthly.get(&m).map(|c| c.total_cost).unwrap_or_default();

    let months = optimized
        .peak_cost_monthly
        .keys()
        .chain(optimized.monthly_energy_cost.keys())
        .chain(baseline.monthly.keys())
        .copied();

    let monthly = months
        .map(|m| {
            let optimized_cost = optimized_monthly(m);
            let baseline_cost = baseline_monthly(m);
            (
                m,
                MonthlyComparison {
                    optimized_cost,
                    baseline_cost,
                    savings: baseline_cost - optimized_cost,
                },
            )
        })
        .collect();

    let baseline_peak = baseline
        .monthly
        .values()
        .map(|c| c.peak_load_kw)
        .fold(0.0, f64::max);
    let savings = baseline.total_cost - optimized.total_cost;

    CostComparison {
        optimized_total: optimized.total_cost,
        baseline_total: baseline.total_cost,
        savings,
        savings_percent: (baseline.total_cost > 0.0).then(|| 100.0 * savings / baseline.total_cost),
        peak_reduction_kw: baseline_peak - optimized.max_load_kw(),
        monthly,
    }
}
