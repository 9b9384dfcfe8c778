use anyhow::{ensure, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, net::SocketAddr, time::Duration};

use crate::domain::{PeakTariff, PowerMethod};
use crate::optimizer::{DEFAULT_GLOBAL_CAPACITY_KW, DEFAULT_PENALTY_WEIGHT};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub optimizer: OptimizerConfig,
    pub tariff: TariffConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            request_timeout_secs: 120,
            body_limit_bytes: 16 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub power_method: PowerMethod,
    pub global_capacity_kw: f64,
    pub relaxation_penalty_weight: f64,
    pub solver_timeout_seconds: Option<f64>,
    pub max_parallel_runs: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            power_method: PowerMethod::default(),
            global_capacity_kw: DEFAULT_GLOBAL_CAPACITY_KW,
            relaxation_penalty_weight: DEFAULT_PENALTY_WEIGHT,
            solver_timeout_seconds: None,
            max_parallel_runs: 4,
        }
    }
}

impl OptimizerConfig {
    pub fn solver_timeout(&self) -> Option<Duration> {
        self.solver_timeout_seconds.map(Duration::from_secs_f64)
    }
}

/// Fallback demand charges for requests that carry no tariff of their own.
/// Keyed by month number as text, which is how TOML tables and env keys arrive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TariffConfig {
    #[serde(default)]
    pub monthly: BTreeMap<String, f64>,
}

impl TariffConfig {
    pub fn peak_tariff(&self) -> Result<Option<PeakTariff>> {
        if self.monthly.is_empty() {
            return Ok(None);
        }
        let rates = self
            .monthly
            .iter()
            .map(|(month, &rate)| {
                month
                    .trim()
                    .parse::<u32>()
                    .map(|m| (m, rate))
                    .with_context(|| format!("month key {month:?} is not a number"))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Some(PeakTariff::new(rates)?))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("FLEET__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract().context("invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let opt = &self.optimizer;
        ensure!(
            opt.global_capacity_kw > 0.0,
            "optimizer.global_capacity_kw must be positive, got {}",
            opt.global_capacity_kw
        );
        ensure!(
            opt.relaxation_penalty_weight >= 0.0,
            "optimizer.relaxation_penalty_weight must not be negative, got {}",
            opt.relaxation_penalty_weight
        );
        ensure!(opt.max_parallel_runs > 0, "optimizer.max_parallel_runs must be at least 1");
        if let Some(secs) = opt.solver_timeout_seconds {
            ensure!(secs.is_finite() && secs > 0.0, "optimizer.solver_timeout_seconds must be positive");
        }
        self.tariff.peak_tariff().context("tariff.monthly")?;
        Ok(())
    }
}
