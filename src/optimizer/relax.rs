use tracing::{debug, warn};

use crate::optimizer::lp::{LinearProgram, Relation, VarId};
use crate::optimizer::model::ChargingModel;

pub const DEFAULT_PENALTY_WEIGHT: f64 = 0.1;

/// Relative slack on the phase-one optimum when it becomes a bound
const VIOLATION_TOLERANCE: f64 = 1e-9;

/// Turns hard per-vehicle rate caps into elastic ones.
///
/// Each cap `charge <= limit` becomes `charge - slack <= limit` with a
/// non-negative slack priced at `penalty_weight` in the objective. Energy
/// commitment, peak linkage and site capacity rows are left untouched.
///
/// Relaxed models are solved in two phases. [`violation_program`] finds the
/// least total overshoot that restores feasibility; [`bound_violation`] then
/// caps the overshoot at that amount before cost is minimized, so only the
/// vehicles that cannot fit their caps exceed them.
///
/// [`violation_program`]: ConstraintRelaxer::violation_program
/// [`bound_violation`]: ConstraintRelaxer::bound_violation
#[derive(Debug, Clone, Copy)]
pub struct ConstraintRelaxer {
    penalty_weight: f64,
}

impl Default for ConstraintRelaxer {
    fn default() -> Self {
        Self {
            penalty_weight: DEFAULT_PENALTY_WEIGHT,
        }
    }
}

impl ConstraintRelaxer {
    pub fn new(penalty_weight: f64) -> Self {
        Self { penalty_weight }
    }

    pub fn penalty_weight(&self) -> f64 {
        self.penalty_weight
    }

    /// Relaxed copy of `model`; the hard model stays intact
    pub fn relax(&self, model: &ChargingModel) -> ChargingModel {
        let mut relaxed = model.clone();

        for cap in &model.rate_caps {
            relaxed.program.set_upper(cap.var, f64::INFINITY);
            let slack = relaxed.program.add_var(
                format!("slack_{}_{}", cap.vehicle, cap.hour),
                0.0,
                f64::INFINITY,
                self.penalty_weight,
            );
            relaxed.program.add_constraint(
                format!("max_charge_rate_per_vehicle_{}_{}", cap.vehicle, cap.hour),
                vec![(cap.var, 1.0), (slack, -1.0)],
                Relation::Le,
                cap.limit_kw,
            );
            relaxed.slack.push(slack);
        }

        warn!(
            relaxed_caps = relaxed.slack.len(),
            penalty_weight = self.penalty_weight,
            "rate caps relaxed after infeasible solve"
        );

        relaxed
    }

    /// Phase one: same rows as `relaxed`, objective is total slack only
    pub fn violation_program(&self, relaxed: &ChargingModel) -> LinearProgram {
        let mut program = relaxed.program.clone();
        for id in 0..program.num_vars() {
            program.set_cost(VarId(id), 0.0);
        }
        for &slack in &relaxed.slack {
            program.set_cost(slack, 1.0);
        }
        program
    }

    /// Phase two: `relaxed` with total slack capped at the phase-one optimum
    pub fn bound_violation(&self, mut relaxed: ChargingModel, least: f64) -> ChargingModel {
        let bound = least + VIOLATION_TOLERANCE * least.abs().max(1.0);
        let terms = relaxed.slack.iter().map(|&s| (s, 1.0)).collect();
        relaxed
            .program
            .add_constraint("minimum_relaxation", terms, Relation::Le, bound);
        debug!(least_violation_kw = least, "relaxation bounded to its minimum");
        relaxed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PeakTariff, PriceSeries, Vehicle};
    use crate::optimizer::horizon::Horizon;
    use crate::optimizer::model::ModelBuilder;
    use chrono::{TimeZone, Utc};

    fn hard_model(vehicles: &[Vehicle]) -> ChargingModel {
        let start = Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap();
        let horizon = Horizon::for_fleet(start, vehicles).unwrap();
        let prices = PriceSeries::from_hourly(start, &[500.0; 2]).window(start, 2).unwrap();
        let tariff = PeakTariff::uniform(10.0).unwrap();
        ModelBuilder::new(vehicles, &prices, &horizon, &tariff).build().unwrap()
    }

    #[test]
    fn test_relax_adds_one_slack_per_cap() {
        let vehicles = vec![Vehicle::observed("spiky", 0, 2, 30.0, 10.0).unwrap()];
        let hard = hard_model(&vehicles);

        let relaxed = ConstraintRelaxer::new(0.5).relax(&hard);

        assert!(relaxed.is_relaxed());
        assert!(!hard.is_relaxed());
        assert_eq!(relaxed.slack_vars().len(), 2);
        assert_eq!(
            relaxed.program().num_constraints(),
            hard.program().num_constraints() + 2
        );
        for cap in relaxed.rate_caps() {
            assert!(relaxed.program().variable(cap.var).upper.is_infinite());
            assert_eq!(hard.program().variable(cap.var).upper, 10.0);
        }
        for &s in relaxed.slack_vars() {
            assert_eq!(relaxed.program().variable(s).cost, 0.5);
        }
        // energy rows unchanged
        let energy = |m: &ChargingModel| {
            m.program()
                .constraints()
                .iter()
                .filter(|c| c.name.starts_with("charge_constraint"))
                .cloned()
                .collect::<Vec<_>>()
        };
        assert_eq!(energy(&hard), energy(&relaxed));
    }

    #[test]
    fn test_violation_program_prices_only_slack() {
        let vehicles = vec![
            Vehicle::observed("spiky", 0, 2, 30.0, 10.0).unwrap(),
            Vehicle::observed("fine", 0, 2, 15.0, 10.0).unwrap(),
        ];
        let relaxer = ConstraintRelaxer::new(0.1);
        let relaxed = relaxer.relax(&hard_model(&vehicles));
        let phase_one = relaxer.violation_program(&relaxed);

        assert_eq!(phase_one.num_constraints(), relaxed.program().num_constraints());
        for (id, var) in phase_one.variables().iter().enumerate() {
            let expected = if relaxed.slack_vars().contains(&VarId(id)) { 1.0 } else { 0.0 };
            assert_eq!(var.cost, expected, "{}", var.name);
        }
    }

    #[test]
    fn test_bound_violation_caps_total_slack() {
        let vehicles = vec![Vehicle::observed("spiky", 0, 2, 30.0, 10.0).unwrap()];
        let relaxer = ConstraintRelaxer::new(0.1);
        let relaxed = relaxer.relax(&hard_model(&vehicles));
        let rows = relaxed.program().num_constraints();

        let bounded = relaxer.bound_violation(relaxed, 10.0);

        assert_eq!(bounded.program().num_constraints(), rows + 1);
        let row = bounded.program().constraints().last().unwrap();
        assert_eq!(row.name, "minimum_relaxation");
        assert_eq!(row.relation, Relation::Le);
        assert_eq!(row.terms.len(), 2);
        assert!((row.rhs - 10.0).abs() < 1e-6);
    }
}
