use chrono::{DateTime, Datelike, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ============================================================================
// Time Helpers
// ============================================================================

/// Nameplate charger rate used by the flat power method (kW)
pub const NAMEPLATE_RATE_KW: f64 = 22.1;

/// Length of one fine-grained meter reading interval in hours
pub const READING_INTERVAL_HOURS: f64 = 0.25;

/// Round a timestamp down to the start of its hour
pub fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    // duration_trunc only fails for out-of-range timestamps
    ts.duration_trunc(TimeDelta::hours(1)).unwrap_or(ts)
}

/// Whole hours from `from` to `to`, rounded towards negative infinity
pub fn whole_hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().div_euclid(3600)
}

/// Calendar month (1-12) of a timestamp
pub fn month_of(ts: DateTime<Utc>) -> u32 {
    ts.month()
}

pub fn is_hour_aligned(ts: DateTime<Utc>) -> bool {
    floor_to_hour(ts) == ts
}

// ============================================================================
// Run Enums
// ============================================================================

/// How the per-vehicle maximum charge rate is chosen
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum PowerMethod {
    /// Max rate estimated from the session's historical 15-minute readings
    #[serde(rename = "observed")]
    #[strum(serialize = "observed")]
    Observed,
    /// Every vehicle gets the 22.1 kW nameplate rate
    #[default]
    #[serde(rename = "flat_22.1kW")]
    #[strum(serialize = "flat_22.1kW")]
    Flat,
}

impl PowerMethod {
    /// Whether rate caps may be softened when the hard model is infeasible
    pub fn allows_relaxation(&self) -> bool {
        matches!(self, PowerMethod::Observed)
    }
}

/// Terminal status reported by the LP engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    #[test]
    fn test_floor_to_hour() {
        let ts = Utc.with_ymd_and_hms(2023, 3, 14, 10, 47, 12).unwrap();
        assert_eq!(
            floor_to_hour(ts),
            Utc.with_ymd_and_hms(2023, 3, 14, 10, 0, 0).unwrap()
        );
        assert!(is_hour_aligned(floor_to_hour(ts)));
        assert!(!is_hour_aligned(ts));
    }

    #[test]
    fn test_whole_hours_between_floors_negative_offsets() {
        let a = Utc.with_ymd_and_hms(2023, 1, 1, 10, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2023, 1, 1, 12, 30, 0).unwrap();
        assert_eq!(whole_hours_between(a, b), 2);
        assert_eq!(whole_hours_between(b, a), -3);
    }

    #[test]
    fn test_power_method_names() {
        assert_eq!(PowerMethod::Flat.to_string(), "flat_22.1kW");
        assert_eq!(
            PowerMethod::from_str("observed").unwrap(),
            PowerMethod::Observed
        );
        let json = serde_json::to_string(&PowerMethod::Flat).unwrap();
        assert_eq!(json, "\"flat_22.1kW\"");
        assert!(PowerMethod::Observed.allows_relaxation());
        assert!(!PowerMethod::Flat.allows_relaxation());
    }

    #[test]
    fn test_solve_status_display() {
        assert_eq!(SolveStatus::Infeasible.to_string(), "INFEASIBLE");
        assert_eq!(SolveStatus::Other.to_string(), "OTHER");
        assert_eq!(
            serde_json::to_string(&SolveStatus::Optimal).unwrap(),
            "\"OPTIMAL\""
        );
    }
}
