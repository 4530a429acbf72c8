pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;

pub use config::{Config, MetricsConfig, PnlMode};
pub use domain::{
    AccountSnapshot, Address, AddressMetrics, Coin, DataQuality, Decimal, Fill, Side, TimeMs,
    TransferStats,
};
pub use engine::{compute_metrics, MetricsError};
pub use error::AppError;
