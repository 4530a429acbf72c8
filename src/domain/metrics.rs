//! Output record and its supporting input/quality types.

use crate::domain::{Address, Decimal, TimeMs};
use serde::{Deserialize, Serialize};

/// Confidence of a capital-derived figure.
///
/// Ordered from least to most trustworthy so `min` picks the weaker tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    /// Conservative floor; the figure only guarantees a positive denominator.
    EstimatedFallback,
    /// Derived with at least one input missing or degraded.
    Estimated,
    /// Derived from the observed ledger and account state.
    Standard,
    /// Derived from caller-supplied pre-aggregated transfer statistics.
    Enhanced,
}

impl DataQuality {
    /// Cap this tag at `ceiling`.
    pub fn at_most(self, ceiling: DataQuality) -> DataQuality {
        self.min(ceiling)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataQuality::EstimatedFallback => "estimated_fallback",
            DataQuality::Estimated => "estimated",
            DataQuality::Standard => "standard",
            DataQuality::Enhanced => "enhanced",
        }
    }
}

impl std::fmt::Display for DataQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pre-aggregated cash-flow totals. All amounts are non-negative magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStats {
    #[serde(default)]
    pub total_deposits: Decimal,
    #[serde(default)]
    pub total_withdrawals: Decimal,
    #[serde(default)]
    pub total_transfers_in: Decimal,
    #[serde(default)]
    pub total_transfers_out: Decimal,
}

impl TransferStats {
    /// Deposits minus withdrawals, ignoring inter-account transfers.
    pub fn true_net_deposits(&self) -> Decimal {
        self.total_deposits.abs() - self.total_withdrawals.abs()
    }

    /// All capital in minus all capital out.
    pub fn net_deposits(&self) -> Decimal {
        self.true_net_deposits() + self.total_transfers_in.abs()
            - self.total_transfers_out.abs()
    }

    pub fn is_empty(&self) -> bool {
        self.total_deposits.is_zero()
            && self.total_withdrawals.is_zero()
            && self.total_transfers_in.is_zero()
            && self.total_transfers_out.is_zero()
    }
}

/// Performance metrics for one address.
///
/// Percentages are `f64` percent values (`12.5` means 12.5%); drawdowns are in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressMetrics {
    pub address: Address,

    // Trade activity
    pub total_trades: u64,
    pub closed_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub win_rate: f64,
    pub total_volume: Decimal,
    pub total_fees: Decimal,
    pub liquidation_count: u64,
    pub trading_days: u64,
    pub first_trade_ms: Option<TimeMs>,
    pub last_trade_ms: Option<TimeMs>,

    // PnL
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub funding_pnl: Decimal,
    pub total_pnl: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    pub profit_factor: f64,

    // Capital
    pub account_value: Decimal,
    pub estimated_initial_capital: Decimal,
    pub actual_initial_capital: Decimal,
    pub true_capital: Decimal,
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
    pub total_transfers_in: Decimal,
    pub total_transfers_out: Decimal,
    pub net_deposits: Decimal,

    // Returns
    pub roi: f64,
    pub true_capital_roi: f64,
    pub corrected_roi: f64,
    pub time_weighted_roi: f64,
    pub annualized_roi: f64,
    pub total_roi: f64,
    pub sharpe_ratio: f64,

    // Drawdown
    pub max_drawdown: f64,
    pub max_drawdown_legacy: f64,
    pub max_drawdown_with_unrealized: f64,
    pub drawdown_count: u64,
    pub largest_single_drawdown: f64,
    pub avg_drawdown: f64,
    pub avg_recovery_days: f64,
    pub current_in_drawdown: bool,
    pub current_drawdown: f64,
    pub bankruptcy_count: u32,

    // Data quality
    pub capital_quality: DataQuality,
    pub true_capital_quality: DataQuality,
    pub roi_quality: DataQuality,
}

impl AddressMetrics {
    /// All-zero record for an address with no trades.
    pub fn empty(address: Address) -> Self {
        Self {
            address,
            total_trades: 0,
            closed_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            total_volume: Decimal::zero(),
            total_fees: Decimal::zero(),
            liquidation_count: 0,
            trading_days: 0,
            first_trade_ms: None,
            last_trade_ms: None,
            realized_pnl: Decimal::zero(),
            unrealized_pnl: Decimal::zero(),
            funding_pnl: Decimal::zero(),
            total_pnl: Decimal::zero(),
            largest_win: Decimal::zero(),
            largest_loss: Decimal::zero(),
            profit_factor: 0.0,
            account_value: Decimal::zero(),
            estimated_initial_capital: Decimal::zero(),
            actual_initial_capital: Decimal::zero(),
            true_capital: Decimal::zero(),
            total_deposits: Decimal::zero(),
            total_withdrawals: Decimal::zero(),
            total_transfers_in: Decimal::zero(),
            total_transfers_out: Decimal::zero(),
            net_deposits: Decimal::zero(),
            roi: 0.0,
            true_capital_roi: 0.0,
            corrected_roi: 0.0,
            time_weighted_roi: 0.0,
            annualized_roi: 0.0,
            total_roi: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            max_drawdown_legacy: 0.0,
            max_drawdown_with_unrealized: 0.0,
            drawdown_count: 0,
            largest_single_drawdown: 0.0,
            avg_drawdown: 0.0,
            avg_recovery_days: 0.0,
            current_in_drawdown: false,
            current_drawdown: 0.0,
            bankruptcy_count: 0,
            capital_quality: DataQuality::Estimated,
            true_capital_quality: DataQuality::Estimated,
            roi_quality: DataQuality::Estimated,
        }
    }

    /// Every `f64` field, for invariant checks.
    pub fn percentages(&self) -> [(&'static str, f64); 17] {
        [
            ("win_rate", self.win_rate),
            ("profit_factor", self.profit_factor),
            ("roi", self.roi),
            ("true_capital_roi", self.true_capital_roi),
            ("corrected_roi", self.corrected_roi),
            ("time_weighted_roi", self.time_weighted_roi),
            ("annualized_roi", self.annualized_roi),
            ("total_roi", self.total_roi),
            ("sharpe_ratio", self.sharpe_ratio),
            ("max_drawdown", self.max_drawdown),
            ("max_drawdown_legacy", self.max_drawdown_legacy),
            ("max_drawdown_with_unrealized", self.max_drawdown_with_unrealized),
            ("largest_single_drawdown", self.largest_single_drawdown),
            ("avg_drawdown", self.avg_drawdown),
            ("avg_recovery_days", self.avg_recovery_days),
            ("current_drawdown", self.current_drawdown),
            ("bankruptcy_count", f64::from(self.bankruptcy_count)),
        ]
    }
}
