use std::collections::HashMap;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_addr: IpAddr,
    pub max_batch_size: usize,
    pub metrics: MetricsConfig,
}

/// Immutable settings threaded into every metrics computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsConfig {
    /// Annual risk-free rate as a fraction (0.04 = 4%).
    pub risk_free_rate: f64,
    pub pnl_mode: PnlMode,
    /// Drawdown fraction a trade must exceed to open an episode (0.01 = 1%).
    pub drawdown_threshold: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            pnl_mode: PnlMode::Gross,
            drawdown_threshold: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnlMode {
    /// Trade PnL is the exchange's closed PnL.
    Gross,
    /// Trade PnL is closed PnL minus fees.
    Net,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let bind_addr = env_map
            .get("BIND_ADDR")
            .map(|s| s.as_str())
            .unwrap_or("127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "BIND_ADDR".to_string(),
                    "must be an IP address".to_string(),
                )
            })?;

        let max_batch_size = env_map
            .get("MAX_BATCH_SIZE")
            .map(|s| s.as_str())
            .unwrap_or("100")
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "MAX_BATCH_SIZE".to_string(),
                    "must be an integer >= 1".to_string(),
                )
            })?;

        let risk_free_rate = env_map
            .get("RISK_FREE_RATE")
            .map(|s| s.as_str())
            .unwrap_or("0")
            .parse::<f64>()
            .ok()
            .filter(|r| r.is_finite() && (0.0..1.0).contains(r))
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "RISK_FREE_RATE".to_string(),
                    "must be an annual fraction in [0, 1)".to_string(),
                )
            })?;

        let pnl_mode = match env_map
            .get("PNL_MODE")
            .map(|s| s.as_str())
            .unwrap_or("gross")
        {
            "gross" => PnlMode::Gross,
            "net" => PnlMode::Net,
            other => {
                return Err(ConfigError::InvalidValue(
                    "PNL_MODE".to_string(),
                    format!("must be gross or net, got {}", other),
                ))
            }
        };

        let threshold_pct = env_map
            .get("DRAWDOWN_THRESHOLD_PCT")
            .map(|s| s.as_str())
            .unwrap_or("1")
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite() && *p > 0.0 && *p < 100.0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "DRAWDOWN_THRESHOLD_PCT".to_string(),
                    "must be a percentage in (0, 100)".to_string(),
                )
            })?;

        Ok(Config {
            port,
            bind_addr,
            max_batch_size,
            metrics: MetricsConfig {
                risk_free_rate,
                pnl_mode,
                drawdown_threshold: threshold_pct / 100.0,
            },
        })
    }
}
