//! Domain types for Hyperliquid account histories.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: TimeMs, Address, Coin, Side
//! - Raw record decoding for fills, ledger updates, funding and account state
//! - Time ordering and deduplication helpers shared by the normalizer
//! - The AddressMetrics output record

pub mod decimal;
pub mod fill;
pub mod ledger;
pub mod metrics;
pub mod ordering;
pub mod parse;
pub mod primitives;
pub mod snapshot;

pub use decimal::Decimal;
pub use fill::Fill;
pub use ledger::{CashFlowKind, FundingRecord, LedgerDelta, LedgerEvent, LedgerUpdate};
pub use metrics::{AddressMetrics, DataQuality, TransferStats};
pub use ordering::Timed;
pub use parse::ParseError;
pub use primitives::{Address, AddressParseError, Coin, Side, TimeMs, MS_PER_DAY};
pub use snapshot::{AccountSnapshot, PositionSnapshot};
