use malachite::num::basic::traits::Zero;
use malachite_q::Rational;

use super::rational_to_f64;
use crate::types::{CurrencyAmount, Price};

pub const SECONDS_PER_DAY: u64 = 86_400;
pub const MS_PER_DAY: u64 = SECONDS_PER_DAY * 1000;
pub const DAYS_PER_YEAR: u32 = 365;

/// Daily yields at or below this (in whole quote tokens) never break even.
pub const MIN_YIELD_PER_DAY: f64 = 1e-7;

/// `2 * sqrt(r) / (1 + r) - 1` for a price ratio `r`. Zero for degenerate
/// ratios.
pub fn impermanent_loss_for_ratio(ratio: f64) -> f64 {
    if !(ratio.is_finite() && ratio > 0.0) {
        return 0.0;
    }
    2.0 * ratio.sqrt() / (1.0 + ratio) - 1.0
}

/// Loss against holding if the price moves from `deposit` to `boundary`.
pub fn impermanent_loss(deposit: &Price, boundary: &Price) -> f64 {
    if deposit.raw <= Rational::ZERO || boundary.raw <= Rational::ZERO {
        return 0.0;
    }
    impermanent_loss_for_ratio(rational_to_f64(&(&boundary.raw / &deposit.raw)))
}

/// Days of yield needed to recover `impermanent_loss` on `deposited`. Both
/// values are in whole quote tokens.
pub fn break_even_days(impermanent_loss: f64, yield_per_day: f64, deposited: f64) -> f64 {
    if impermanent_loss >= 0.0 {
        return 0.0;
    }
    if yield_per_day <= MIN_YIELD_PER_DAY {
        return f64::INFINITY;
    }
    (deposited * impermanent_loss.abs() / yield_per_day).max(0.0)
}

/// Time a position has been open, never less than a day.
pub fn duration_held_ms(opened_ms: u64, closed_ms: Option<u64>, now_ms: u64) -> u64 {
    closed_ms
        .unwrap_or(now_ms)
        .saturating_sub(opened_ms)
        .max(MS_PER_DAY)
}

pub fn yield_per_day(total: &CurrencyAmount, duration_ms: u64) -> CurrencyAmount {
    let duration_ms = duration_ms.max(1);
    total.scale(&Rational::from_unsigneds(MS_PER_DAY, duration_ms))
}

/// `per_day / deposited * 365`. Zero for a dust deposit.
pub fn apr(per_day: &CurrencyAmount, deposited: &CurrencyAmount) -> Rational {
    if deposited.is_dust() {
        return Rational::ZERO;
    }
    &per_day.raw / &deposited.raw * Rational::from(DAYS_PER_YEAR)
}
