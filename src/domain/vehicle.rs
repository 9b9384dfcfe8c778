use serde::Serialize;
use std::ops::Range;

use crate::error::ValidationError;

/// Relative tolerance when checking that a window can deliver the required energy
const DELIVERY_EPSILON: f64 = 1e-9;

/// Where a vehicle's max charge rate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Charger nameplate value; the rate cap is a physical limit
    Nameplate,
    /// Estimated from noisy historical samples; the rate cap may be softened
    Observed,
}

/// One parked vehicle with a fixed hourly window and energy obligation.
///
/// Fields are private so a `Vehicle` can only exist in a validated state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vehicle {
    id: String,
    arrival_hour: usize,
    departure_hour: usize,
    required_energy_kwh: f64,
    max_charge_rate_kw: f64,
    rate_source: RateSource,
}

impl Vehicle {
    /// Vehicle with a nameplate rate. Rejects windows that cannot deliver the
    /// required energy at that rate.
    pub fn new(
        id: impl Into<String>,
        arrival_hour: usize,
        departure_hour: usize,
        required_energy_kwh: f64,
        max_charge_rate_kw: f64,
    ) -> Result<Self, ValidationError> {
        let vehicle = Self::checked(
            id.into(),
            arrival_hour,
            departure_hour,
            required_energy_kwh,
            max_charge_rate_kw,
            RateSource::Nameplate,
        )?;

        if !vehicle.is_rate_feasible() {
            return Err(ValidationError::new(
                format!("vehicle {}", vehicle.id),
                format!(
                    "required {:.3} kWh exceeds {:.3} kW x {} h window",
                    vehicle.required_energy_kwh,
                    vehicle.max_charge_rate_kw,
                    vehicle.window_len()
                ),
            ));
        }

        Ok(vehicle)
    }

    /// Vehicle whose rate was observed from history. Only structural checks
    /// apply; a rate too low for the energy is left for relaxation to absorb.
    pub fn observed(
        id: impl Into<String>,
        arrival_hour: usize,
        departure_hour: usize,
        required_energy_kwh: f64,
        max_charge_rate_kw: f64,
    ) -> Result<Self, ValidationError> {
        Self::checked(
            id.into(),
            arrival_hour,
            departure_hour,
            required_energy_kwh,
            max_charge_rate_kw,
            RateSource::Observed,
        )
    }

    fn checked(
        id: String,
        arrival_hour: usize,
        departure_hour: usize,
        required_energy_kwh: f64,
        max_charge_rate_kw: f64,
        rate_source: RateSource,
    ) -> Result<Self, ValidationError> {
        let subject = format!("vehicle {id}");

        if departure_hour <= arrival_hour {
            return Err(ValidationError::new(
                subject,
                format!("departure hour {departure_hour} must be after arrival hour {arrival_hour}"),
            ));
        }
        if !required_energy_kwh.is_finite() || required_energy_kwh <= 0.0 {
            return Err(ValidationError::new(
                subject,
                format!("required energy must be positive, got {required_energy_kwh}"),
            ));
        }
        if !max_charge_rate_kw.is_finite() || max_charge_rate_kw <= 0.0 {
            return Err(ValidationError::new(
                subject,
                format!("max charge rate must be positive, got {max_charge_rate_kw}"),
            ));
        }

        Ok(Self {
            id,
            arrival_hour,
            departure_hour,
            required_energy_kwh,
            max_charge_rate_kw,
            rate_source,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn arrival_hour(&self) -> usize {
        self.arrival_hour
    }

    pub fn departure_hour(&self) -> usize {
        self.departure_hour
    }

    pub fn required_energy_kwh(&self) -> f64 {
        self.required_energy_kwh
    }

    pub fn max_charge_rate_kw(&self) -> f64 {
        self.max_charge_rate_kw
    }

    pub fn rate_source(&self) -> RateSource {
        self.rate_source
    }

    /// Hours the vehicle is parked, `[arrival, departure)`
    pub fn window(&self) -> Range<usize> {
        self.arrival_hour..self.departure_hour
    }

    pub fn window_len(&self) -> usize {
        self.departure_hour - self.arrival_hour
    }

    pub fn is_parked_at(&self, hour: usize) -> bool {
        self.window().contains(&hour)
    }

    /// Most energy the rate cap allows over the whole window
    pub fn max_deliverable_kwh(&self) -> f64 {
        self.max_charge_rate_kw * self.window_len() as f64
    }

    pub fn is_rate_feasible(&self) -> bool {
        self.required_energy_kwh <= self.max_deliverable_kwh() * (1.0 + DELIVERY_EPSILON)
    }
}
