//! Cost-optimal charging schedules for a fleet of electric vehicles.
//!
//! Parked vehicles must receive a fixed amount of energy inside their parking
//! window. The optimizer minimizes spot-price energy cost plus monthly
//! peak-demand charges with a linear program, and the baseline engine prices
//! the historical, unoptimized charging for comparison.

pub mod api;
pub mod baseline;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod optimizer;
pub mod telemetry;
