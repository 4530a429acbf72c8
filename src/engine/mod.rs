//! Pure computation engine: raw account history in, one metrics record out.
//!
//! Data flows one way through the stages:
//! normalizer -> capital -> drawdown/episodes -> returns -> [`AddressMetrics`].

use crate::config::MetricsConfig;
use crate::domain::{
    AccountSnapshot, Address, AddressMetrics, DataQuality, Decimal, Fill, TimeMs, TransferStats,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

pub mod capital;
pub mod drawdown;
pub mod episodes;
pub mod normalizer;
pub mod numeric;
pub mod returns;

pub use capital::{
    CapitalInputs, CapitalResolution, CapitalResolver, CashFlowSource, CashFlowTotals,
};
pub use drawdown::{EquityCurve, EquityPoint, EquityTracker};
pub use episodes::{analyze_episodes, DrawdownEpisode, EpisodeSummary};
pub use normalizer::{EventNormalizer, FillAggregates, NormalizationStats, NormalizedHistory};
pub use returns::{ReturnInputs, ReturnRates};

/// One entry of the unified timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergedEvent {
    pub time_ms: TimeMs,
    pub kind: MergedEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MergedEventKind {
    /// Trade PnL under the configured PnL mode.
    Trade { pnl: f64 },
    /// Signed cash movement relative to the target.
    CashFlow { amount: f64 },
}

impl MergedEvent {
    pub fn trade(time_ms: TimeMs, pnl: f64) -> Self {
        Self {
            time_ms,
            kind: MergedEventKind::Trade { pnl },
        }
    }

    pub fn cash_flow(time_ms: TimeMs, amount: f64) -> Self {
        Self {
            time_ms,
            kind: MergedEventKind::CashFlow { amount },
        }
    }

    pub fn is_trade(&self) -> bool {
        matches!(self.kind, MergedEventKind::Trade { .. })
    }

    /// Change in account equity caused by this event.
    pub fn delta(&self) -> f64 {
        match self.kind {
            MergedEventKind::Trade { pnl } => pnl,
            MergedEventKind::CashFlow { amount } => amount,
        }
    }
}

impl crate::domain::Timed for MergedEvent {
    fn time_ms(&self) -> TimeMs {
        self.time_ms
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

fn pct(fraction: f64) -> f64 {
    numeric::clamp_unit_pct(fraction * 100.0)
}

/// Compute every metric for one address.
///
/// `ledger` and `funding` are raw Hyperliquid records; malformed entries are skipped.
/// An empty fill list yields [`AddressMetrics::empty`].
pub fn compute_metrics(
    address: &str,
    fills: &[Fill],
    ledger: &[Value],
    funding: &[Value],
    snapshot: Option<&AccountSnapshot>,
    transfer_stats: Option<&TransferStats>,
    config: &MetricsConfig,
) -> Result<AddressMetrics, MetricsError> {
    let target =
        Address::parse(address).map_err(|e| MetricsError::InvalidAddress(e.to_string()))?;

    if fills.is_empty() {
        debug!(user = %target, "No fills; returning empty metrics");
        return Ok(AddressMetrics::empty(target));
    }

    let history = EventNormalizer::new(&target, config.pnl_mode).normalize(fills, ledger, funding);
    let agg = &history.aggregates;
    let has_ledger = !history.ledger.is_empty();

    let mut capital = CapitalResolver::new().resolve(&CapitalInputs {
        account_value: snapshot.map(|s| s.account_value),
        realized_pnl: agg.realized_pnl,
        funding_pnl: history.funding_pnl,
        totals: CashFlowTotals::select(transfer_stats, &history.ledger),
        has_ledger,
    });
    if history.stats.amounts_saturated {
        capital.cap_quality(DataQuality::Estimated);
    }
    let initial_capital = capital.actual_initial_capital.to_f64();

    let (curve, naive_drawdown) = if has_ledger {
        let curve = EquityTracker::cash_flow_aware().run(&history.merged);
        let naive = drawdown::naive_max_drawdown(&history.merged);
        (curve, naive)
    } else {
        let curve = EquityTracker::legacy(initial_capital).run(&history.merged);
        let max = curve.max_drawdown;
        (curve, max)
    };

    let unrealized_pnl = snapshot.map(|s| s.unrealized_pnl()).unwrap_or_default();
    let drawdown_unrealized = if unrealized_pnl.is_zero() {
        curve.max_drawdown
    } else {
        drawdown::drawdown_with_unrealized(&curve, unrealized_pnl.to_f64())
    };

    let episodes = analyze_episodes(&curve, config.drawdown_threshold);
    let bankruptcy_count = drawdown::count_bankruptcies(initial_capital, &history.merged);

    let last_event = history.merged.last().map(|e| e.time_ms);
    let as_of = snapshot
        .and_then(|s| s.time_ms)
        .unwrap_or_else(TimeMs::now)
        .max(last_event.unwrap_or(TimeMs::new(0)));

    let contributed = if capital.net_deposits.is_positive() {
        capital.net_deposits
    } else {
        capital.actual_initial_capital
    };
    let rates = returns::compute_return_rates(&ReturnInputs {
        events: &history.merged,
        seed_capital: if has_ledger { 0.0 } else { initial_capital },
        as_of,
        unrealized_pnl: unrealized_pnl.to_f64(),
        final_value: capital.account_value.to_f64(),
        contributed_capital: contributed.to_f64(),
        risk_free_rate: config.risk_free_rate,
    });

    let total_pnl: Decimal = agg.realized_pnl + unrealized_pnl + history.funding_pnl;

    info!(
        user = %target,
        trades = agg.total_trades,
        ledger = history.ledger.len(),
        realized_pnl = %agg.realized_pnl,
        capital_quality = %capital.capital_quality,
        max_drawdown = curve.max_drawdown,
        "Computed address metrics"
    );

    Ok(AddressMetrics {
        address: target,
        total_trades: agg.total_trades,
        closed_trades: agg.closed_trades,
        winning_trades: agg.winning_trades,
        losing_trades: agg.losing_trades,
        win_rate: capital::win_rate(agg.winning_trades, agg.losing_trades),
        total_volume: agg.total_volume,
        total_fees: agg.total_fees,
        liquidation_count: agg.liquidation_count,
        trading_days: agg.trading_days,
        first_trade_ms: agg.first_trade_ms,
        last_trade_ms: agg.last_trade_ms,
        realized_pnl: agg.realized_pnl,
        unrealized_pnl,
        funding_pnl: history.funding_pnl,
        total_pnl,
        largest_win: agg.largest_win,
        largest_loss: agg.largest_loss,
        profit_factor: capital::profit_factor(agg.gross_profit, agg.gross_loss),
        account_value: capital.account_value,
        estimated_initial_capital: capital.estimated_initial_capital,
        actual_initial_capital: capital.actual_initial_capital,
        true_capital: capital.true_capital,
        total_deposits: capital.stats.total_deposits,
        total_withdrawals: capital.stats.total_withdrawals,
        total_transfers_in: capital.stats.total_transfers_in,
        total_transfers_out: capital.stats.total_transfers_out,
        net_deposits: capital.net_deposits,
        roi: capital.roi,
        true_capital_roi: capital.true_capital_roi,
        corrected_roi: capital.corrected_roi,
        time_weighted_roi: rates.time_weighted_roi,
        annualized_roi: rates.annualized_roi,
        total_roi: rates.total_roi,
        sharpe_ratio: rates.sharpe_ratio,
        max_drawdown: pct(curve.max_drawdown),
        max_drawdown_legacy: pct(naive_drawdown),
        max_drawdown_with_unrealized: pct(drawdown_unrealized),
        drawdown_count: episodes.count(),
        largest_single_drawdown: pct(episodes.largest_depth),
        avg_drawdown: pct(episodes.average_depth),
        avg_recovery_days: episodes.avg_recovery_days.max(0.0),
        current_in_drawdown: episodes.current_in_drawdown,
        current_drawdown: pct(episodes.current_drawdown),
        bankruptcy_count,
        capital_quality: capital.capital_quality,
        true_capital_quality: capital.true_capital_quality,
        roi_quality: capital.roi_quality,
    })
}
