//! Charging LP formulation
//!
//! Objective: minimize spot energy cost plus monthly peak demand charges.
//!
//! Constraints:
//! - energy commitment: each vehicle receives exactly its required energy
//! - window confinement: rate variables only exist for parked hours
//! - rate cap: charge[v,t] <= max rate (variable bound, relaxable)
//! - peak linkage: fleet load in hour t <= peak of month(t)
//! - global capacity: fleet load in hour t <= site limit

use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::{HourlyPrices, PeakTariff, Vehicle};
use crate::error::{SchedulerError, ValidationError};
use crate::optimizer::horizon::Horizon;
use crate::optimizer::lp::{LinearProgram, Relation, VarId};

pub const DEFAULT_GLOBAL_CAPACITY_KW: f64 = 500.0;

/// Rate variables of one vehicle, `vars[k]` covering hour `arrival + k`
#[derive(Debug, Clone)]
pub struct VehicleVars {
    pub arrival_hour: usize,
    pub vars: Vec<VarId>,
}

impl VehicleVars {
    pub fn hours(&self) -> impl Iterator<Item = (usize, VarId)> + '_ {
        self.vars
            .iter()
            .enumerate()
            .map(move |(k, &v)| (self.arrival_hour + k, v))
    }
}

/// A per-vehicle rate cap eligible for relaxation
#[derive(Debug, Clone, Copy)]
pub struct RateCap {
    pub vehicle: usize,
    pub hour: usize,
    pub var: VarId,
    pub limit_kw: f64,
}

/// Built model plus the index maps needed to read a solution back
#[derive(Debug, Clone)]
pub struct ChargingModel {
    pub(crate) program: LinearProgram,
    pub(crate) charge: Vec<VehicleVars>,
    pub(crate) peak_month: BTreeMap<u32, VarId>,
    pub(crate) rate_caps: Vec<RateCap>,
    pub(crate) slack: Vec<VarId>,
}

impl ChargingModel {
    pub fn program(&self) -> &LinearProgram {
        &self.program
    }

    pub fn charge_vars(&self) -> &[VehicleVars] {
        &self.charge
    }

    pub fn peak_vars(&self) -> &BTreeMap<u32, VarId> {
        &self.peak_month
    }

    pub fn rate_caps(&self) -> &[RateCap] {
        &self.rate_caps
    }

    pub fn slack_vars(&self) -> &[VarId] {
        &self.slack
    }

    pub fn is_relaxed(&self) -> bool {
        !self.slack.is_empty()
    }
}

pub struct ModelBuilder<'a> {
    vehicles: &'a [Vehicle],
    prices: &'a HourlyPrices,
    horizon: &'a Horizon,
    tariff: &'a PeakTariff,
    global_capacity_kw: f64,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(
        vehicles: &'a [Vehicle],
        prices: &'a HourlyPrices,
        horizon: &'a Horizon,
        tariff: &'a PeakTariff,
    ) -> Self {
        Self {
            vehicles,
            prices,
            horizon,
            tariff,
            global_capacity_kw: DEFAULT_GLOBAL_CAPACITY_KW,
        }
    }

    pub fn global_capacity_kw(mut self, kw: f64) -> Self {
        self.global_capacity_kw = kw;
        self
    }

    /// Check everything the solver would otherwise trip over
    fn validate(&self) -> Result<BTreeMap<u32, f64>, SchedulerError> {
        let n_hours = self.horizon.n_hours();
        if self.prices.len() < n_hours {
            let hour = self.horizon.timestamp(self.prices.len());
            return Err(SchedulerError::DataGap { hour });
        }
        if let Some(v) = self.vehicles.iter().find(|v| v.departure_hour() > n_hours) {
            return Err(ValidationError::new(
                format!("vehicle {}", v.id()),
                format!("departs at hour {} after horizon end {n_hours}", v.departure_hour()),
            )
            .into());
        }

        self.horizon
            .months()
            .into_iter()
            .map(|m| self.tariff.require(m).map(|rate| (m, rate)))
            .collect()
    }

    pub fn build(self) -> Result<ChargingModel, SchedulerError> {
        let tariffs = self.validate()?;
        let n_hours = self.horizon.n_hours();
        let mut program = LinearProgram::new();

        let mut charge = Vec::with_capacity(self.vehicles.len());
        let mut rate_caps = Vec::new();
        let mut load_terms: Vec<Vec<(VarId, f64)>> = vec![Vec::new(); n_hours];

        for (v, vehicle) in self.vehicles.iter().enumerate() {
            let vars: Vec<VarId> = vehicle
                .window()
                .map(|t| {
                    let var = program.add_var(
                        format!("charge_rate_{v}_{t}"),
                        0.0,
                        vehicle.max_charge_rate_kw(),
                        self.prices.at(t),
                    );
                    rate_caps.push(RateCap {
                        vehicle: v,
                        hour: t,
                        var,
                        limit_kw: vehicle.max_charge_rate_kw(),
                    });
                    load_terms[t].push((var, 1.0));
                    var
                })
                .collect();

            program.add_constraint(
                format!("charge_constraint_{v}"),
                vars.iter().map(|&x| (x, 1.0)).collect(),
                Relation::Eq,
                vehicle.required_energy_kwh(),
            );

            charge.push(VehicleVars {
                arrival_hour: vehicle.arrival_hour(),
                vars,
            });
        }

        let peak_month: BTreeMap<u32, VarId> = tariffs
            .iter()
            .map(|(&m, &rate)| (m, program.add_var(format!("peak_load_monthly_{m}"), 0.0, f64::INFINITY, rate)))
            .collect();

        // hours with nobody parked constrain nothing
        for (t, terms) in load_terms.into_iter().enumerate().filter(|(_, terms)| !terms.is_empty()) {
            let peak = peak_month[&self.horizon.month_of_hour(t)];

            let mut linkage = terms.clone();
            linkage.push((peak, -1.0));
            program.add_constraint(format!("monthly_peak_{t}"), linkage, Relation::Le, 0.0);

            program.add_constraint(
                format!("capacity_limit_{t}"),
                terms,
                Relation::Le,
                self.global_capacity_kw,
            );
        }

        debug!(
            vehicles = self.vehicles.len(),
            n_hours,
            months = peak_month.len(),
            variables = program.num_vars(),
            constraints = program.num_constraints(),
            "charging model built"
        );

        Ok(ChargingModel {
            program,
            charge,
            peak_month,
            rate_caps,
            slack: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceSeries;
    use chrono::{TimeZone, Utc};

    fn fixture() -> (Vec<Vehicle>, HourlyPrices, Horizon, PeakTariff) {
        let start = Utc.with_ymd_and_hms(2023, 1, 31, 22, 0, 0).unwrap();
        let vehicles = vec![
            Vehicle::new("a", 0, 3, 10.0, 11.0).unwrap(),
            Vehicle::new("b", 2, 4, 5.0, 11.0).unwrap(),
        ];
        let horizon = Horizon::for_fleet(start, &vehicles).unwrap();
        let prices = PriceSeries::from_hourly(start, &[1000.0, 900.0, 800.0, 700.0])
            .window(start, horizon.n_hours())
            .unwrap();
        (vehicles, prices, horizon, PeakTariff::uniform(40.0).unwrap())
    }

    #[test]
    fn test_variables_only_inside_windows() {
        let (vehicles, prices, horizon, tariff) = fixture();
        let model = ModelBuilder::new(&vehicles, &prices, &horizon, &tariff).build().unwrap();

        assert_eq!(model.charge_vars()[0].vars.len(), 3);
        assert_eq!(model.charge_vars()[1].vars.len(), 2);
        assert_eq!(model.charge_vars()[1].hours().next().unwrap().0, 2);
        // 5 rate variables plus January and February peaks
        assert_eq!(model.program().num_vars(), 7);
        assert_eq!(model.peak_vars().keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(model.rate_caps().len(), 5);
        assert!(!model.is_relaxed());
    }

    #[test]
    fn test_objective_coefficients() {
        let (vehicles, prices, horizon, tariff) = fixture();
        let model = ModelBuilder::new(&vehicles, &prices, &horizon, &tariff).build().unwrap();
        let lp = model.program();
        let (_, b_first) = model.charge_vars()[1].hours().next().unwrap();
        assert_eq!(lp.variable(b_first).cost, 0.8);
        assert_eq!(lp.variable(b_first).upper, 11.0);
        assert_eq!(lp.variable(model.peak_vars()[&2]).cost, 40.0);
    }

    #[test]
    fn test_constraint_rows() {
        let (vehicles, prices, horizon, tariff) = fixture();
        let model = ModelBuilder::new(&vehicles, &prices, &horizon, &tariff)
            .global_capacity_kw(15.0)
            .build()
            .unwrap();
        let lp = model.program();
        // 2 energy rows + (linkage + capacity) for each of 4 occupied hours
        assert_eq!(lp.num_constraints(), 2 + 2 * 4);
        let cap = lp.constraints().iter().find(|c| c.name == "capacity_limit_2").unwrap();
        assert_eq!(cap.terms.len(), 2);
        assert_eq!(cap.rhs, 15.0);
        let energy = lp.constraints().iter().find(|c| c.name == "charge_constraint_1").unwrap();
        assert_eq!(energy.relation, Relation::Eq);
        assert_eq!(energy.rhs, 5.0);
    }

    #[test]
    fn test_missing_tariff_month() {
        let (vehicles, prices, horizon, _) = fixture();
        let tariff = PeakTariff::new(BTreeMap::from([(1, 40.0)])).unwrap();
        let err = ModelBuilder::new(&vehicles, &prices, &horizon, &tariff).build().unwrap_err();
        assert!(matches!(err, SchedulerError::MissingTariff { month: 2 }));
    }

    #[test]
    fn test_short_price_window_is_a_gap() {
        let (vehicles, _, horizon, tariff) = fixture();
        let start = horizon.start();
        let prices = PriceSeries::from_hourly(start, &[1.0, 1.0]).window(start, 2).unwrap();
        let err = ModelBuilder::new(&vehicles, &prices, &horizon, &tariff).build().unwrap_err();
        assert!(matches!(err, SchedulerError::DataGap { .. }));
    }
}
