//! Time-weighted, annualized and total return rates, plus the Sharpe ratio.

use super::numeric::{
    clamp_annualized_pct, clamp_pct, EXP_GUARD, MAX_ANNUALIZED_PCT, MIN_ANNUALIZED_PCT,
};
use super::{MergedEvent, MergedEventKind};
use crate::domain::TimeMs;
use chrono::NaiveDate;
use std::collections::BTreeMap;

const DAYS_PER_YEAR: f64 = 365.0;

/// Trading return and capital exposure accumulated over a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CapitalTime {
    pub total_return: f64,
    /// Integral of non-negative running capital over time, in capital-days.
    pub capital_days: f64,
}

/// Walk the merged timeline and integrate running capital up to `as_of`.
///
/// Cash flows move running capital only; trades move both capital and return.
pub fn accumulate_capital_time(
    events: &[MergedEvent],
    seed_capital: f64,
    as_of: TimeMs,
) -> CapitalTime {
    let mut acc = CapitalTime::default();
    let mut running = seed_capital;
    let mut last: Option<TimeMs> = None;

    for event in events {
        if let Some(prev) = last {
            acc.capital_days += running.max(0.0) * prev.days_until(event.time_ms).max(0.0);
        }
        last = Some(event.time_ms);
        match event.kind {
            MergedEventKind::CashFlow { amount } => running += amount,
            MergedEventKind::Trade { pnl } => {
                running += pnl;
                acc.total_return += pnl;
            }
        }
    }

    if let Some(prev) = last {
        acc.capital_days += running.max(0.0) * prev.days_until(as_of).max(0.0);
    }
    acc
}

/// `gain / (capital_days / 365) * 100`, or 0 without exposure.
pub fn normalized_return(gain: f64, capital_days: f64) -> f64 {
    let capital_years = capital_days / DAYS_PER_YEAR;
    if !capital_years.is_finite() || capital_years <= 0.0 || !gain.is_finite() {
        return 0.0;
    }
    clamp_pct(gain / capital_years * 100.0)
}

/// Compounded annual growth rate in percent, computed in log space.
pub fn annualized_roi(final_value: f64, contributed_capital: f64, years: f64) -> f64 {
    if !(years.is_finite() && contributed_capital.is_finite() && final_value.is_finite()) {
        return 0.0;
    }
    if years <= 0.0 || contributed_capital <= 0.0 {
        return 0.0;
    }
    let ratio = final_value / contributed_capital;
    if ratio <= 0.0 {
        return MIN_ANNUALIZED_PCT;
    }
    let exponent = ratio.ln() / years;
    if exponent > EXP_GUARD {
        return MAX_ANNUALIZED_PCT;
    }
    if exponent < -EXP_GUARD {
        return MIN_ANNUALIZED_PCT;
    }
    clamp_annualized_pct((exponent.exp() - 1.0) * 100.0)
}

/// Annualized Sharpe ratio of daily trade returns.
///
/// Each UTC day's trade PnL is divided by the running capital at that day's first trade.
/// Days starting with non-positive capital are skipped.
pub fn sharpe_ratio(events: &[MergedEvent], seed_capital: f64, risk_free_rate: f64) -> f64 {
    let mut days: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    let mut running = seed_capital;

    for event in events {
        if let MergedEventKind::Trade { pnl } = event.kind {
            if let Some(date) = event.time_ms.utc_date() {
                let bucket = days.entry(date).or_insert((running, 0.0));
                bucket.1 += pnl;
            }
        }
        running += event.delta();
    }

    let returns: Vec<f64> = days
        .values()
        .filter(|(base, _)| *base > 0.0)
        .map(|(base, pnl)| pnl / base)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();
    if !std_dev.is_finite() || std_dev < 1e-12 {
        return 0.0;
    }

    clamp_pct((mean - risk_free_rate / DAYS_PER_YEAR) / std_dev * DAYS_PER_YEAR.sqrt())
}

/// Everything the return-rate computer needs, already resolved upstream.
#[derive(Debug, Clone, Copy)]
pub struct ReturnInputs<'a> {
    pub events: &'a [MergedEvent],
    /// Running capital before the first event: initial capital without a ledger, else 0.
    pub seed_capital: f64,
    pub as_of: TimeMs,
    pub unrealized_pnl: f64,
    pub final_value: f64,
    pub contributed_capital: f64,
    pub risk_free_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReturnRates {
    pub time_weighted_roi: f64,
    pub annualized_roi: f64,
    pub total_roi: f64,
    pub sharpe_ratio: f64,
}

pub fn compute_return_rates(inputs: &ReturnInputs<'_>) -> ReturnRates {
    let exposure = accumulate_capital_time(inputs.events, inputs.seed_capital, inputs.as_of);

    let years = inputs
        .events
        .first()
        .map(|first| first.time_ms.days_until(inputs.as_of) / DAYS_PER_YEAR)
        .unwrap_or(0.0);

    ReturnRates {
        time_weighted_roi: normalized_return(exposure.total_return, exposure.capital_days),
        annualized_roi: annualized_roi(inputs.final_value, inputs.contributed_capital, years),
        total_roi: normalized_return(
            exposure.total_return + inputs.unrealized_pnl,
            exposure.capital_days,
        ),
        sharpe_ratio: sharpe_ratio(inputs.events, inputs.seed_capital, inputs.risk_free_rate),
    }
}
