//! Equity curve and drawdown under the legacy and cash-flow-aware policies.
//!
//! Drawdowns here are fractions in [0, 1]; conversion to percent happens at assembly.

use super::{MergedEvent, MergedEventKind};
use crate::domain::TimeMs;

/// One step of the equity curve, recorded after the event was applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub time_ms: TimeMs,
    pub kind: MergedEventKind,
    pub equity: f64,
    pub peak: f64,
    /// Distance below peak as a fraction. Reported for cash-flow steps too, but
    /// only trade steps feed the maximum.
    pub drawdown: f64,
}

impl EquityPoint {
    pub fn is_trade(&self) -> bool {
        matches!(self.kind, MergedEventKind::Trade { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EquityCurve {
    pub points: Vec<EquityPoint>,
    pub max_drawdown: f64,
    pub final_equity: f64,
    pub final_peak: f64,
}

/// Drawdown of `equity` against `peak`. Non-positive equity under a positive peak is total.
pub fn drawdown_fraction(peak: f64, equity: f64) -> f64 {
    if peak.is_nan() || peak <= 0.0 || equity >= peak {
        return 0.0;
    }
    if equity <= 0.0 {
        return 1.0;
    }
    ((peak - equity) / peak).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    Legacy,
    CashFlowAware,
}

/// Walks merged events and records the equity curve.
#[derive(Debug, Clone)]
pub struct EquityTracker {
    policy: Policy,
    equity: f64,
    peak: f64,
    max_drawdown: f64,
    points: Vec<EquityPoint>,
}

impl EquityTracker {
    /// Start at `initial_capital` and follow trades only.
    pub fn legacy(initial_capital: f64) -> Self {
        Self::with_policy(Policy::Legacy, initial_capital)
    }

    /// Start from zero; cash flows move equity and peak without registering drawdown.
    pub fn cash_flow_aware() -> Self {
        Self::with_policy(Policy::CashFlowAware, 0.0)
    }

    fn with_policy(policy: Policy, start: f64) -> Self {
        Self {
            policy,
            equity: start,
            peak: start,
            max_drawdown: 0.0,
            points: Vec::new(),
        }
    }

    pub fn apply(&mut self, event: &MergedEvent) {
        match event.kind {
            MergedEventKind::CashFlow { amount } => {
                if self.policy == Policy::Legacy {
                    return;
                }
                self.equity += amount;
                if amount > 0.0 {
                    self.peak += amount;
                } else {
                    // A withdrawal lowers the high-water mark with it.
                    self.peak = (self.peak + amount).max(self.equity);
                }
            }
            MergedEventKind::Trade { pnl } => {
                self.equity += pnl;
                if self.equity < self.peak {
                    let drawdown = drawdown_fraction(self.peak, self.equity);
                    self.max_drawdown = self.max_drawdown.max(drawdown);
                } else {
                    self.peak = self.equity;
                }
            }
        }

        self.points.push(EquityPoint {
            time_ms: event.time_ms,
            kind: event.kind,
            equity: self.equity,
            peak: self.peak,
            drawdown: drawdown_fraction(self.peak, self.equity),
        });
    }

    pub fn finish(self) -> EquityCurve {
        EquityCurve {
            points: self.points,
            max_drawdown: self.max_drawdown,
            final_equity: self.equity,
            final_peak: self.peak,
        }
    }

    /// Run a whole event sequence.
    pub fn run(mut self, events: &[MergedEvent]) -> EquityCurve {
        for event in events {
            self.apply(event);
        }
        self.finish()
    }
}

/// Account-value curve that treats every event alike: cash flows move equity, the peak is
/// the running maximum, and every step is evaluated.
pub fn naive_max_drawdown(events: &[MergedEvent]) -> f64 {
    let mut equity = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_drawdown = 0.0_f64;
    for event in events {
        equity += event.delta();
        peak = peak.max(equity);
        max_drawdown = max_drawdown.max(drawdown_fraction(peak, equity));
    }
    max_drawdown
}

/// Max drawdown with unrealized PnL marked onto the final equity.
pub fn drawdown_with_unrealized(curve: &EquityCurve, unrealized_pnl: f64) -> f64 {
    let marked = curve.final_equity + unrealized_pnl;
    curve
        .max_drawdown
        .max(drawdown_fraction(curve.final_peak, marked))
}

/// Trade-only walk from `initial_capital`; stops at the first non-positive capital.
pub fn count_bankruptcies(initial_capital: f64, events: &[MergedEvent]) -> u32 {
    let mut capital = initial_capital;
    for event in events {
        if let MergedEventKind::Trade { pnl } = event.kind {
            capital += pnl;
            if capital <= 0.0 {
                return 1;
            }
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(t: i64, amount: f64) -> MergedEvent {
        MergedEvent::cash_flow(TimeMs::new(t), amount)
    }

    fn trade(t: i64, pnl: f64) -> MergedEvent {
        MergedEvent::trade(TimeMs::new(t), pnl)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_withdrawal_after_peak_is_not_a_loss() {
        let events = vec![
            flow(1, 100_000.0),
            trade(2, 20_000.0),
            flow(3, -50_000.0),
            trade(4, -10_000.0),
        ];
        let curve = EquityTracker::cash_flow_aware().run(&events);
        assert!(approx(curve.max_drawdown, 10_000.0 / 70_000.0));
        assert!(approx(naive_max_drawdown(&events), 0.5));
        assert!(curve.max_drawdown <= naive_max_drawdown(&events));
    }

    #[test]
    fn test_deposits_raise_peak() {
        let events = vec![
            flow(1, 10_000.0),
            trade(2, -5_000.0),
            flow(3, 10_000.0),
            trade(4, -2_000.0),
        ];
        let curve = EquityTracker::cash_flow_aware().run(&events);
        assert!(approx(curve.max_drawdown, 0.5));
        assert!(approx(curve.final_peak, 20_000.0));
        assert!(approx(curve.final_equity, 13_000.0));
    }

    #[test]
    fn test_legacy_ignores_cash_flows() {
        let events = vec![trade(1, 500.0), flow(2, -900.0), trade(3, -300.0)];
        let curve = EquityTracker::legacy(1_000.0).run(&events);
        assert_eq!(curve.points.len(), 2);
        assert!(approx(curve.max_drawdown, 0.2));
    }

    #[test]
    fn test_wipeout_is_full_drawdown() {
        let curve = EquityTracker::legacy(1_000.0).run(&[trade(1, -1_500.0)]);
        assert_eq!(curve.max_drawdown, 1.0);
    }

    #[test]
    fn test_no_peak_no_drawdown() {
        let curve = EquityTracker::cash_flow_aware().run(&[trade(1, -10.0), trade(2, -5.0)]);
        assert_eq!(curve.max_drawdown, 0.0);
    }

    #[test]
    fn test_unrealized_drawdown_at_tail() {
        let curve = EquityTracker::legacy(1_000.0).run(&[trade(1, 100.0)]);
        assert_eq!(drawdown_with_unrealized(&curve, 50.0), 0.0);
        assert!(approx(drawdown_with_unrealized(&curve, -330.0), 0.3));
    }

    #[test]
    fn test_bankruptcy_counts_once() {
        let events = vec![trade(1, -600.0), trade(2, -600.0), trade(3, 2_000.0), trade(4, -5_000.0)];
        assert_eq!(count_bankruptcies(1_000.0, &events), 1);
        assert_eq!(count_bankruptcies(10_000.0, &events[..3]), 0);
    }
}
