//! Capital base reconstruction and the ROI/win-rate figures derived from it.

use super::numeric::{clamp_pct, clamp_unit_pct, ratio_pct, MAX_RATIO_PCT};
use crate::domain::{CashFlowKind, DataQuality, Decimal, LedgerEvent, TransferStats};
use tracing::{debug, warn};

/// Where cash-flow totals came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashFlowSource {
    /// Caller-supplied pre-aggregated statistics.
    Supplied,
    /// Summed from the normalized ledger.
    Ledger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CashFlowTotals {
    pub stats: TransferStats,
    pub source: CashFlowSource,
}

impl CashFlowTotals {
    /// Supplied stats win; otherwise the ledger, if it has anything in it.
    pub fn select(supplied: Option<&TransferStats>, ledger: &[LedgerEvent]) -> Option<Self> {
        if let Some(stats) = supplied {
            return Some(Self {
                stats: *stats,
                source: CashFlowSource::Supplied,
            });
        }
        if ledger.is_empty() {
            return None;
        }
        Some(Self {
            stats: aggregate_ledger(ledger),
            source: CashFlowSource::Ledger,
        })
    }
}

/// Sum signed ledger events into magnitude totals per direction.
pub fn aggregate_ledger(ledger: &[LedgerEvent]) -> TransferStats {
    let mut stats = TransferStats::default();
    for event in ledger {
        let magnitude = event.amount.abs();
        match (event.kind, event.is_inflow()) {
            (CashFlowKind::Deposit, _) => stats.total_deposits += magnitude,
            (CashFlowKind::Withdraw, _) => stats.total_withdrawals += magnitude,
            (_, true) => stats.total_transfers_in += magnitude,
            (_, false) => stats.total_transfers_out += magnitude,
        }
    }
    stats
}

/// Initial capital cascade. The result is always positive.
///
/// 1. `account_value - realized_pnl - net_deposits` (standard)
/// 2. `account_value - realized_pnl` (estimated)
/// 3. `max(account_value * 1.1, |realized_pnl| * 0.5, 100)` (estimated fallback)
pub fn resolve_initial_capital(
    account_value: Decimal,
    realized_pnl: Decimal,
    net_deposits: Decimal,
) -> (Decimal, DataQuality) {
    let with_flows = account_value - realized_pnl - net_deposits;
    if with_flows.is_positive() {
        return (with_flows, DataQuality::Standard);
    }

    let without_flows = account_value - realized_pnl;
    if without_flows.is_positive() {
        warn!(
            %account_value,
            %realized_pnl,
            %net_deposits,
            "Initial capital non-positive after net deposits; ignoring cash flows"
        );
        return (without_flows, DataQuality::Estimated);
    }

    let floor = (account_value * Decimal::from_parts(11, 1))
        .max(realized_pnl.abs() * Decimal::from_parts(5, 1))
        .max(Decimal::from(100));
    debug!(%account_value, %realized_pnl, %floor, "Initial capital from fallback floor");
    (floor, DataQuality::EstimatedFallback)
}

/// Inputs to [`CapitalResolver::resolve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapitalInputs {
    /// Snapshot account value; `None` when no snapshot is available.
    pub account_value: Option<Decimal>,
    pub realized_pnl: Decimal,
    pub funding_pnl: Decimal,
    pub totals: Option<CashFlowTotals>,
    /// Whether dated cash flows exist for time weighting.
    pub has_ledger: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapitalResolution {
    pub account_value: Decimal,
    pub stats: TransferStats,
    pub net_deposits: Decimal,
    /// Legacy cascade, cash flows ignored.
    pub estimated_initial_capital: Decimal,
    pub actual_initial_capital: Decimal,
    pub capital_quality: DataQuality,
    pub true_capital: Decimal,
    pub true_capital_quality: DataQuality,
    pub roi: f64,
    pub true_capital_roi: f64,
    pub corrected_roi: f64,
    pub roi_quality: DataQuality,
}

impl CapitalResolution {
    /// Lower every quality tag to at most `ceiling`.
    pub fn cap_quality(&mut self, ceiling: DataQuality) {
        self.capital_quality = self.capital_quality.at_most(ceiling);
        self.true_capital_quality = self.true_capital_quality.at_most(ceiling);
        self.roi_quality = self.roi_quality.at_most(ceiling);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CapitalResolver;

impl CapitalResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, inputs: &CapitalInputs) -> CapitalResolution {
        let stats = inputs.totals.map(|t| t.stats).unwrap_or_default();
        let net_deposits = stats.net_deposits();

        let (account_value, ceiling) = match inputs.account_value {
            Some(value) => (value, DataQuality::Enhanced),
            None => {
                let estimate = (net_deposits + inputs.realized_pnl + inputs.funding_pnl)
                    .max(Decimal::zero());
                debug!(%estimate, "No account snapshot; estimating account value");
                (estimate, DataQuality::Estimated)
            }
        };

        let (estimated_initial_capital, legacy_quality) =
            resolve_initial_capital(account_value, inputs.realized_pnl, Decimal::zero());

        // An estimated account value already contains net deposits, so subtracting them
        // again would leave only funding PnL as the capital base.
        let cascade_flows = if inputs.account_value.is_some() {
            net_deposits
        } else {
            Decimal::zero()
        };
        let (actual_initial_capital, capital_quality) = match inputs.totals {
            Some(_) => resolve_initial_capital(account_value, inputs.realized_pnl, cascade_flows),
            None => (
                estimated_initial_capital,
                legacy_quality.at_most(DataQuality::Estimated),
            ),
        };
        let capital_quality = capital_quality.at_most(ceiling);

        let true_net = stats.true_net_deposits();
        let (true_capital, true_capital_quality) = match inputs.totals {
            Some(totals) if true_net.is_positive() => {
                let quality = match totals.source {
                    CashFlowSource::Supplied => DataQuality::Enhanced,
                    CashFlowSource::Ledger => DataQuality::Standard,
                };
                (true_net, quality)
            }
            _ => (actual_initial_capital, DataQuality::EstimatedFallback),
        };
        let true_capital_quality = true_capital_quality.at_most(ceiling);

        let mut roi_quality = capital_quality;
        if !inputs.has_ledger {
            roi_quality = roi_quality.at_most(DataQuality::Estimated);
        }

        let pnl = inputs.realized_pnl.to_f64();
        CapitalResolution {
            account_value,
            stats,
            net_deposits,
            estimated_initial_capital,
            actual_initial_capital,
            capital_quality,
            true_capital,
            true_capital_quality,
            roi: ratio_pct(pnl, estimated_initial_capital.to_f64()),
            true_capital_roi: ratio_pct(pnl, true_capital.to_f64()),
            corrected_roi: ratio_pct(pnl, actual_initial_capital.to_f64()),
            roi_quality,
        }
    }
}

/// Wins over decided trades, in percent. Zero-PnL fills are excluded upstream.
pub fn win_rate(winning: u64, losing: u64) -> f64 {
    let decided = winning + losing;
    if decided == 0 {
        return 0.0;
    }
    clamp_unit_pct(winning as f64 / decided as f64 * 100.0)
}

/// Gross profit over gross loss magnitude.
pub fn profit_factor(gross_profit: Decimal, gross_loss: Decimal) -> f64 {
    if !gross_loss.is_positive() {
        return if gross_profit.is_positive() {
            MAX_RATIO_PCT
        } else {
            0.0
        };
    }
    clamp_pct(gross_profit.to_f64() / gross_loss.to_f64())
}
