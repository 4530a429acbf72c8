//! Clamp helpers that keep every emitted figure finite and inside its documented bound.

/// Bound for PnL-ratio percentages (ROI variants, ratios).
pub const MAX_RATIO_PCT: f64 = 999_999.99;
/// Upper bound for compounded annualized percentages.
pub const MAX_ANNUALIZED_PCT: f64 = 10_000.0;
/// Lower bound for compounded annualized percentages (total loss).
pub const MIN_ANNUALIZED_PCT: f64 = -99.99;
/// `exp(x)` overflows f64 just above 709.
pub const EXP_GUARD: f64 = 700.0;

/// Clamp into `[-MAX_RATIO_PCT, MAX_RATIO_PCT]`; NaN becomes 0, infinities their bound.
pub fn clamp_pct(value: f64) -> f64 {
    clamp_finite(value, -MAX_RATIO_PCT, MAX_RATIO_PCT)
}

/// Clamp into `[0, 100]` for win rates and drawdowns.
pub fn clamp_unit_pct(value: f64) -> f64 {
    clamp_finite(value, 0.0, 100.0)
}

/// Clamp into the annualized band.
pub fn clamp_annualized_pct(value: f64) -> f64 {
    clamp_finite(value, MIN_ANNUALIZED_PCT, MAX_ANNUALIZED_PCT)
}

/// `numerator / denominator * 100`, or 0 when the denominator is not a positive finite number.
pub fn ratio_pct(numerator: f64, denominator: f64) -> f64 {
    if !denominator.is_finite() || denominator <= 0.0 || !numerator.is_finite() {
        return 0.0;
    }
    clamp_pct(numerator / denominator * 100.0)
}

fn clamp_finite(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        0.0_f64.clamp(lo, hi)
    } else {
        value.clamp(lo, hi)
    }
}
