use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::domain::types::{
    floor_to_hour, whole_hours_between, PowerMethod, NAMEPLATE_RATE_KW, READING_INTERVAL_HOURS,
};
use crate::domain::Vehicle;
use crate::error::ValidationError;

/// Hour-indexed parking session, hour 0 being the earliest arrival
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub start_hour: usize,
    pub end_hour: usize,
    pub energy_required_kwh: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_power_kw: Option<f64>,
}

impl Session {
    /// Turn the record into a solver-ready vehicle for the given power method
    pub fn to_vehicle(&self, method: PowerMethod) -> Result<Vehicle, ValidationError> {
        match method {
            PowerMethod::Flat => Vehicle::new(
                self.id.clone(),
                self.start_hour,
                self.end_hour,
                self.energy_required_kwh,
                NAMEPLATE_RATE_KW,
            ),
            PowerMethod::Observed => {
                let rate = self.max_power_kw.ok_or_else(|| {
                    ValidationError::new(
                        format!("vehicle {}", self.id),
                        "observed power method needs a max_power_kw value",
                    )
                })?;
                let vehicle = Vehicle::observed(
                    self.id.clone(),
                    self.start_hour,
                    self.end_hour,
                    self.energy_required_kwh,
                    rate,
                )?;
                if !vehicle.is_rate_feasible() {
                    warn!(
                        vehicle = %vehicle.id(),
                        required_kwh = vehicle.required_energy_kwh(),
                        deliverable_kwh = vehicle.max_deliverable_kwh(),
                        "observed rate cannot deliver required energy"
                    );
                }
                Ok(vehicle)
            }
        }
    }
}

/// Convert a whole session table, failing on the first invalid record
pub fn sessions_to_vehicles(
    sessions: &[Session],
    method: PowerMethod,
) -> Result<Vec<Vehicle>, ValidationError> {
    sessions.iter().map(|s| s.to_vehicle(method)).collect()
}

/// Parking session with wall-clock arrival and departure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSession {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub energy_kwh: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_power_kw: Option<f64>,
}

impl TimedSession {
    pub fn shifted(&self, hours: i64) -> Self {
        let delta = TimeDelta::hours(hours);
        Self {
            start: self.start + delta,
            end: self.end + delta,
            ..self.clone()
        }
    }
}

/// Cumulative-meter delta for one 15-minute interval of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeReading {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub charged_energy_kwh: f64,
}

impl ChargeReading {
    pub fn shifted(&self, hours: i64) -> Self {
        Self {
            timestamp: self.timestamp + TimeDelta::hours(hours),
            ..self.clone()
        }
    }
}

/// Index timestamped sessions by whole hours from the earliest arrival.
///
/// Arrival and departure are both floored to the hour so no charging is
/// planned after the vehicle has left. With `departure_cap_hours` set, stays
/// longer than the cap end at `arrival + cap`.
pub fn index_sessions(sessions: &[TimedSession], departure_cap_hours: Option<u32>) -> Vec<Session> {
    let Some(origin) = sessions.iter().map(|s| floor_to_hour(s.start)).min() else {
        return Vec::new();
    };

    sessions
        .iter()
        .map(|s| {
            let start = floor_to_hour(s.start);
            let mut end = floor_to_hour(s.end);
            if let Some(cap) = departure_cap_hours {
                end = end.min(start + TimeDelta::hours(i64::from(cap)));
            }
            let start_hour = whole_hours_between(origin, start).max(0) as usize;
            let end_hour = whole_hours_between(origin, end).max(0) as usize;
            Session {
                id: s.id.clone(),
                start_hour,
                end_hour,
                energy_required_kwh: s.energy_kwh,
                max_power_kw: s.max_power_kw,
            }
        })
        .collect()
}

/// Max charge rate per session, estimated from its largest 15-minute reading
/// and rounded up to 0.1 kW.
pub fn observed_max_power(readings: &[ChargeReading]) -> HashMap<String, f64> {
    readings
        .iter()
        .into_grouping_map_by(|r| r.session_id.clone())
        .fold(f64::NEG_INFINITY, |acc, _, r| acc.max(r.charged_energy_kwh))
        .into_iter()
        .map(|(id, max_kwh)| {
            let kw = (max_kwh / READING_INTERVAL_HOURS * 10.0).ceil() / 10.0;
            (id, kw)
        })
        .collect()
}

/// Fill in `max_power_kw` from readings wherever a session lacks one
pub fn attach_observed_power(sessions: &mut [TimedSession], readings: &[ChargeReading]) {
    let observed = observed_max_power(readings);
    for session in sessions.iter_mut().filter(|s| s.max_power_kw.is_none()) {
        session.max_power_kw = observed.get(&session.id).copied();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 5, 2, h, m, 0).unwrap()
    }

    fn timed(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> TimedSession {
        TimedSession {
            id: id.into(),
            start,
            end,
            energy_kwh: 12.0,
            max_power_kw: None,
        }
    }

    #[test]
    fn test_index_sessions_floors_and_offsets() {
        let sessions = vec![
            timed("a", at(8, 40), at(16, 10)),
            timed("b", at(7, 5), at(9, 59)),
        ];
        let indexed = index_sessions(&sessions, None);
        assert_eq!(indexed[0].start_hour, 1);
        assert_eq!(indexed[0].end_hour, 9);
        assert_eq!(indexed[1].start_hour, 0);
        assert_eq!(indexed[1].end_hour, 2);
    }

    #[test]
    fn test_index_sessions_caps_departure() {
        let sessions = vec![timed("a", at(0, 0), at(20, 0))];
        let indexed = index_sessions(&sessions, Some(6));
        assert_eq!(indexed[0].end_hour, 6);
    }

    #[test]
    fn test_index_empty() {
        assert!(index_sessions(&[], None).is_empty());
    }

    #[test]
    fn test_observed_max_power_rounds_up() {
        let readings = vec![
            ChargeReading { session_id: "a".into(), timestamp: at(8, 0), charged_energy_kwh: 2.0 },
            ChargeReading { session_id: "a".into(), timestamp: at(8, 15), charged_energy_kwh: 2.76 },
            ChargeReading { session_id: "b".into(), timestamp: at(8, 0), charged_energy_kwh: 1.0 },
        ];
        let power = observed_max_power(&readings);
        // 2.76 kWh in 15 min -> 11.04 kW -> 11.1 kW
        assert!((power["a"] - 11.1).abs() < 1e-9);
        assert!((power["b"] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_attach_observed_power_keeps_existing_values() {
        let mut sessions = vec![timed("a", at(8, 0), at(10, 0)), timed("b", at(8, 0), at(10, 0))];
        sessions[1].max_power_kw = Some(7.0);
        let readings = vec![
            ChargeReading { session_id: "a".into(), timestamp: at(8, 0), charged_energy_kwh: 1.5 },
            ChargeReading { session_id: "b".into(), timestamp: at(8, 0), charged_energy_kwh: 4.0 },
        ];
        attach_observed_power(&mut sessions, &readings);
        assert_eq!(sessions[0].max_power_kw, Some(6.0));
        assert_eq!(sessions[1].max_power_kw, Some(7.0));
    }

    #[test]
    fn test_flat_method_uses_nameplate_rate() {
        let session = Session {
            id: "s".into(),
            start_hour: 0,
            end_hour: 2,
            energy_required_kwh: 30.0,
            max_power_kw: Some(3.0),
        };
        let v = session.to_vehicle(PowerMethod::Flat).unwrap();
        assert_eq!(v.max_charge_rate_kw(), NAMEPLATE_RATE_KW);

        let v = session.to_vehicle(PowerMethod::Observed).unwrap();
        assert_eq!(v.max_charge_rate_kw(), 3.0);
        assert!(!v.is_rate_feasible());
    }

    #[test]
    fn test_observed_method_requires_power() {
        let session = Session {
            id: "s".into(),
            start_hour: 0,
            end_hour: 2,
            energy_required_kwh: 10.0,
            max_power_kw: None,
        };
        assert!(session.to_vehicle(PowerMethod::Observed).is_err());
        assert!(sessions_to_vehicles(&[session], PowerMethod::Flat).is_ok());
    }
}
