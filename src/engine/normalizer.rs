//! Event normalization: dedupe, sign, sort and merge one address's raw streams.

use super::MergedEvent;
use crate::config::PnlMode;
use crate::domain::ordering::{dedupe_and_sort, dedupe_stable, ensure_time_sorted};
use crate::domain::{Address, Decimal, Fill, FundingRecord, LedgerEvent, LedgerUpdate, TimeMs};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Counters describing what normalization dropped or repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NormalizationStats {
    pub fills_duplicate: usize,
    pub fills_resorted: bool,
    pub ledger_malformed: usize,
    /// Well-formed records that do not move the target's capital.
    pub ledger_ignored: usize,
    pub ledger_duplicate: usize,
    pub funding_malformed: usize,
    pub funding_duplicate: usize,
    /// An amount or running total hit the decimal range and was saturated.
    pub amounts_saturated: bool,
}

/// Everything downstream needs from the fill list, gathered in one pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FillAggregates {
    pub total_trades: u64,
    /// Fills with nonzero PnL; the win-rate denominator candidates.
    pub closed_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub total_volume: Decimal,
    pub total_fees: Decimal,
    pub realized_pnl: Decimal,
    pub gross_profit: Decimal,
    /// Magnitude of all losing PnL.
    pub gross_loss: Decimal,
    pub largest_win: Decimal,
    /// Most negative single PnL (zero when there are no losses).
    pub largest_loss: Decimal,
    pub liquidation_count: u64,
    pub trading_days: u64,
    pub first_trade_ms: Option<TimeMs>,
    pub last_trade_ms: Option<TimeMs>,
}

/// Output of [`EventNormalizer::normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedHistory {
    pub fills: Vec<Fill>,
    pub ledger: Vec<LedgerEvent>,
    pub funding: Vec<FundingRecord>,
    /// Trades and cash flows in time order; cash flows first on equal timestamps.
    pub merged: Vec<MergedEvent>,
    pub aggregates: FillAggregates,
    pub funding_pnl: Decimal,
    pub stats: NormalizationStats,
}

/// Normalizes raw streams relative to one target address.
pub struct EventNormalizer<'a> {
    target: &'a Address,
    pnl_mode: PnlMode,
}

impl<'a> EventNormalizer<'a> {
    pub fn new(target: &'a Address, pnl_mode: PnlMode) -> Self {
        Self { target, pnl_mode }
    }

    pub fn normalize(
        &self,
        fills: &[Fill],
        ledger: &[Value],
        funding: &[Value],
    ) -> NormalizedHistory {
        let mut stats = NormalizationStats::default();

        let (fills, fills_duplicate) = dedupe_fills(fills.to_vec(), &mut stats);
        stats.fills_duplicate = fills_duplicate;

        let ledger = self.normalize_ledger(ledger, &mut stats);
        let funding = normalize_funding(funding, &mut stats);
        let mut funding_pnl = Decimal::zero();
        for record in &funding {
            stats.amounts_saturated |= accumulate(&mut funding_pnl, record.amount);
        }

        let (aggregates, trades) = self.aggregate_fills(&fills, &mut stats);
        let merged = merge_events(&ledger, trades);

        debug!(
            user = %self.target,
            fills = fills.len(),
            ledger = ledger.len(),
            funding = funding.len(),
            merged = merged.len(),
            ?stats,
            "normalized event history"
        );

        NormalizedHistory {
            fills,
            ledger,
            funding,
            merged,
            aggregates,
            funding_pnl,
            stats,
        }
    }

    /// PnL a fill contributes under the configured mode.
    pub fn trade_pnl(&self, fill: &Fill) -> Decimal {
        match self.pnl_mode {
            PnlMode::Gross => fill.closed_pnl,
            PnlMode::Net => fill.closed_pnl - fill.fee,
        }
    }

    /// Decode, sign, dedupe and sort ledger records. Malformed records are skipped.
    pub fn normalize_ledger(
        &self,
        raw: &[Value],
        stats: &mut NormalizationStats,
    ) -> Vec<LedgerEvent> {
        let mut events = Vec::with_capacity(raw.len());
        for record in raw {
            match LedgerUpdate::from_json(record) {
                Ok(Some(update)) => match LedgerEvent::from_update(update, self.target) {
                    Some(event) => events.push(event),
                    None => stats.ledger_ignored += 1,
                },
                Ok(None) => {
                    stats.ledger_ignored += 1;
                    debug!(
                        user = %self.target,
                        kind = record.pointer("/delta/type").and_then(|v| v.as_str()).unwrap_or("?"),
                        "Ignoring non-capital ledger record"
                    );
                }
                Err(e) => {
                    stats.ledger_malformed += 1;
                    warn!(user = %self.target, error = %e, "Skipping malformed ledger record");
                }
            }
        }

        let (events, removed) = dedupe_and_sort(events, |e| e.event_key.clone());
        stats.ledger_duplicate = removed;
        events
    }

    /// Single pass over time-sorted fills.
    fn aggregate_fills(
        &self,
        fills: &[Fill],
        stats: &mut NormalizationStats,
    ) -> (FillAggregates, Vec<MergedEvent>) {
        let mut agg = FillAggregates::default();
        let mut days = HashSet::new();
        let mut trades = Vec::with_capacity(fills.len());
        let mut saturated = false;

        for fill in fills {
            let pnl = self.trade_pnl(fill);
            let notional = match fill.px.checked_mul(fill.sz) {
                Some(notional) => notional.abs(),
                None => {
                    saturated = true;
                    Decimal::max_value()
                }
            };

            agg.total_trades += 1;
            saturated |= accumulate(&mut agg.total_volume, notional);
            saturated |= accumulate(&mut agg.total_fees, fill.fee);
            saturated |= accumulate(&mut agg.realized_pnl, pnl);
            if fill.liquidation {
                agg.liquidation_count += 1;
            }

            // Opens and fee-only legs book no PnL and stay out of win/loss counts.
            if !fill.closed_pnl.is_zero() {
                agg.closed_trades += 1;
                if pnl.is_positive() {
                    agg.winning_trades += 1;
                    saturated |= accumulate(&mut agg.gross_profit, pnl);
                    agg.largest_win = agg.largest_win.max(pnl);
                } else if pnl.is_negative() {
                    agg.losing_trades += 1;
                    saturated |= accumulate(&mut agg.gross_loss, pnl.abs());
                    agg.largest_loss = agg.largest_loss.min(pnl);
                }
            }

            if let Some(date) = fill.time_ms.utc_date() {
                days.insert(date);
            }
            agg.first_trade_ms.get_or_insert(fill.time_ms);
            agg.last_trade_ms = Some(fill.time_ms);

            trades.push(MergedEvent::trade(fill.time_ms, pnl.to_f64()));
        }

        if saturated {
            warn!(user = %self.target, "Fill amounts exceed decimal range; totals saturated");
            stats.amounts_saturated = true;
        }
        agg.trading_days = days.len() as u64;
        (agg, trades)
    }
}

/// Add `value` into `total`, saturating at the decimal range. Returns true on overflow.
fn accumulate(total: &mut Decimal, value: Decimal) -> bool {
    match total.checked_add(value) {
        Some(sum) => {
            *total = sum;
            false
        }
        None => {
            *total += value;
            true
        }
    }
}

fn dedupe_fills(fills: Vec<Fill>, stats: &mut NormalizationStats) -> (Vec<Fill>, usize) {
    let (mut kept, removed) = dedupe_stable(fills, |f| f.fill_key.clone());
    stats.fills_resorted = ensure_time_sorted(&mut kept);
    (kept, removed)
}

/// Decode, dedupe on (time, coin) and sort funding records.
pub fn normalize_funding(raw: &[Value], stats: &mut NormalizationStats) -> Vec<FundingRecord> {
    let mut records = Vec::with_capacity(raw.len());
    for record in raw {
        match FundingRecord::from_json(record) {
            Ok(funding) => records.push(funding),
            Err(e) => {
                stats.funding_malformed += 1;
                warn!(error = %e, "Skipping malformed funding record");
            }
        }
    }

    let (records, removed) = dedupe_and_sort(records, FundingRecord::dedupe_key);
    stats.funding_duplicate = removed;
    records
}

/// Merge time-sorted cash flows and trades. Cash flows win ties.
pub fn merge_events(ledger: &[LedgerEvent], trades: Vec<MergedEvent>) -> Vec<MergedEvent> {
    let mut merged = Vec::with_capacity(ledger.len() + trades.len());
    let mut cash_flows = ledger
        .iter()
        .map(|e| MergedEvent::cash_flow(e.time_ms, e.amount.to_f64()))
        .peekable();

    for trade in trades {
        while let Some(flow) = cash_flows.next_if(|flow| flow.time_ms <= trade.time_ms) {
            merged.push(flow);
        }
        merged.push(trade);
    }
    merged.extend(cash_flows);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coin, Side};
    use serde_json::json;

    const TARGET: &str = "0x1111111111111111111111111111111111111111";

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn fill(time_ms: i64, tid: i64, closed_pnl: &str, fee: &str) -> Fill {
        Fill::new(
            TimeMs::new(time_ms),
            Coin::new("BTC".to_string()),
            Side::Sell,
            d("100"),
            d("2"),
            d(fee),
            d(closed_pnl),
            false,
            None,
            Some(tid),
        )
    }

    #[test]
    fn test_aggregates_single_pass() {
        let target = Address::parse(TARGET).unwrap();
        let normalizer = EventNormalizer::new(&target, PnlMode::Gross);
        let fills = vec![
            fill(1_000, 1, "0", "1"),
            fill(2_000, 2, "50", "1"),
            fill(86_400_000 + 5, 3, "-20", "1"),
            fill(86_400_000 + 6, 4, "30", "1"),
        ];

        let history = normalizer.normalize(&fills, &[], &[]);
        let agg = &history.aggregates;
        assert_eq!(agg.total_trades, 4);
        assert_eq!(agg.closed_trades, 3);
        assert_eq!(agg.winning_trades, 2);
        assert_eq!(agg.losing_trades, 1);
        assert_eq!(agg.realized_pnl, d("60"));
        assert_eq!(agg.total_volume, d("800"));
        assert_eq!(agg.total_fees, d("4"));
        assert_eq!(agg.largest_win, d("50"));
        assert_eq!(agg.largest_loss, d("-20"));
        assert_eq!(agg.gross_loss, d("20"));
        assert_eq!(agg.trading_days, 2);
        assert_eq!(agg.first_trade_ms, Some(TimeMs::new(1_000)));
        assert_eq!(history.merged.len(), 4);
    }

    #[test]
    fn test_net_mode_subtracts_fees() {
        let target = Address::parse(TARGET).unwrap();
        let normalizer = EventNormalizer::new(&target, PnlMode::Net);
        let fills = vec![fill(1, 1, "0", "1"), fill(2, 2, "5", "6")];

        let history = normalizer.normalize(&fills, &[], &[]);
        assert_eq!(history.aggregates.realized_pnl, d("-2"));
        // The close still counts, and after fees it is a loss.
        assert_eq!(history.aggregates.losing_trades, 1);
        assert_eq!(history.aggregates.winning_trades, 0);
    }

    #[test]
    fn test_fills_deduped_and_sorted() {
        let target = Address::parse(TARGET).unwrap();
        let normalizer = EventNormalizer::new(&target, PnlMode::Gross);
        let fills = vec![fill(3, 3, "1", "0"), fill(1, 1, "1", "0"), fill(3, 3, "1", "0")];

        let history = normalizer.normalize(&fills, &[], &[]);
        assert_eq!(history.stats.fills_duplicate, 1);
        assert!(history.stats.fills_resorted);
        let times: Vec<i64> = history.fills.iter().map(|f| f.time_ms.as_ms()).collect();
        assert_eq!(times, vec![1, 3]);
    }

    #[test]
    fn test_ledger_skips_malformed_and_dedupes() {
        let target = Address::parse(TARGET).unwrap();
        let normalizer = EventNormalizer::new(&target, PnlMode::Gross);
        let ledger = vec![
            json!({"time": 5, "hash": "0xa", "delta": {"type": "deposit", "usdc": "100"}}),
            json!({"time": 5, "hash": "0xa", "delta": {"type": "deposit", "usdc": "100"}}),
            json!({"hash": "0xb", "delta": {"type": "deposit", "usdc": "100"}}),
            json!({"time": 2, "hash": "0xc", "delta": {"type": "withdraw", "usdc": "40"}}),
            json!({"time": 3, "delta": {"type": "vaultCreate", "usdc": "1"}}),
        ];

        let mut stats = NormalizationStats::default();
        let events = normalizer.normalize_ledger(&ledger, &mut stats);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].amount, d("-40"));
        assert_eq!(events[1].amount, d("100"));
        assert_eq!(stats.ledger_duplicate, 1);
        assert_eq!(stats.ledger_malformed, 1);
        assert_eq!(stats.ledger_ignored, 1);
    }

    #[test]
    fn test_funding_dedupes_on_time_and_coin() {
        let funding = vec![
            json!({"time": 10, "coin": "BTC", "usdc": "-1"}),
            json!({"time": 10, "coin": "BTC", "usdc": "-1"}),
            json!({"time": 10, "coin": "ETH", "usdc": "2"}),
            json!({"time": 11, "coin": "ETH"}),
        ];
        let mut stats = NormalizationStats::default();
        let records = normalize_funding(&funding, &mut stats);
        assert_eq!(records.len(), 2);
        assert_eq!(stats.funding_duplicate, 1);
        assert_eq!(stats.funding_malformed, 1);
    }

    #[test]
    fn test_merge_puts_cash_flows_first_on_ties() {
        let ledger = vec![
            LedgerEvent::new(
                TimeMs::new(10),
                crate::domain::CashFlowKind::Deposit,
                d("100"),
                None,
                Some("0x1".to_string()),
            ),
            LedgerEvent::new(
                TimeMs::new(30),
                crate::domain::CashFlowKind::Withdraw,
                d("-10"),
                None,
                Some("0x2".to_string()),
            ),
        ];
        let trades = vec![
            MergedEvent::trade(TimeMs::new(5), 1.0),
            MergedEvent::trade(TimeMs::new(10), 2.0),
        ];

        let merged = merge_events(&ledger, trades);
        assert!(crate::domain::ordering::is_time_sorted(&merged));
        let shape: Vec<(i64, bool)> = merged
            .iter()
            .map(|e| (e.time_ms.as_ms(), e.is_trade()))
            .collect();
        assert_eq!(
            shape,
            vec![(5, true), (10, false), (10, true), (30, false)]
        );
    }

    #[test]
    fn test_aggregates_saturate_on_overflow() {
        let target = Address::parse(TARGET).unwrap();
        let huge = "79228162514264337593543950335";
        let mut big_notional = fill(3, 3, "0", "0");
        big_notional.px = d("100000000000000000000");
        big_notional.sz = d("100000000000000000000");
        let fills = vec![fill(1, 1, huge, "0"), fill(2, 2, huge, "0"), big_notional];

        let history = EventNormalizer::new(&target, PnlMode::Gross).normalize(&fills, &[], &[]);

        assert!(history.stats.amounts_saturated);
        assert_eq!(history.aggregates.total_trades, 3);
        assert_eq!(history.aggregates.realized_pnl, Decimal::max_value());
        assert_eq!(history.aggregates.total_volume, Decimal::max_value());
        assert!(history.merged.iter().all(|e| e.delta().is_finite()));
    }

    #[test]
    fn test_ordinary_amounts_do_not_saturate() {
        let target = Address::parse(TARGET).unwrap();
        let fills = vec![fill(1, 1, "10", "1"), fill(2, 2, "-4", "1")];
        let history = EventNormalizer::new(&target, PnlMode::Gross).normalize(&fills, &[], &[]);
        assert!(!history.stats.amounts_saturated);
    }
}
