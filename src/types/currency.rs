use std::{
    fmt,
    ops::{Add, Sub}
};

use alloy_primitives::U256;
use malachite::{
    Integer, Natural,
    num::{
        arithmetic::traits::{Floor, Pow, UnsignedAbs},
        basic::traits::{One, Zero}
    }
};
use malachite_q::Rational;
use serde::{Deserialize, Serialize};

use super::{
    Token,
    math::{rational_to_f64, u256_to_natural},
    serde_utils::rational_string
};

pub(crate) fn decimal_scale(decimals: u8) -> Natural {
    Natural::from(10u32).pow(decimals as u64)
}

/// An exact, possibly fractional or negative, amount of a token in raw units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyAmount {
    pub token: Token,
    #[serde(with = "rational_string")]
    pub raw:   Rational
}

impl CurrencyAmount {
    pub fn new(token: Token, raw: impl Into<Rational>) -> Self {
        Self { token, raw: raw.into() }
    }

    pub fn zero(token: Token) -> Self {
        Self { token, raw: Rational::ZERO }
    }

    pub fn from_u256(token: Token, raw: U256) -> Self {
        Self { token, raw: Rational::from(u256_to_natural(raw)) }
    }

    pub fn from_integer(token: Token, raw: &Integer) -> Self {
        Self { token, raw: Rational::from(raw) }
    }

    pub fn is_zero(&self) -> bool {
        self.raw == Rational::ZERO
    }

    /// Below one raw unit. Ratios against such an amount are meaningless.
    pub fn is_dust(&self) -> bool {
        self.raw < Rational::ONE
    }

    pub fn scale(&self, factor: &Rational) -> Self {
        Self { token: self.token.clone(), raw: &self.raw * factor }
    }

    /// callers guard against a zero divisor
    pub fn divide(&self, divisor: &Rational) -> Self {
        Self { token: self.token.clone(), raw: &self.raw / divisor }
    }

    pub fn clamp_non_negative(self) -> Self {
        if self.raw < Rational::ZERO { Self::zero(self.token) } else { self }
    }

    /// floor of the raw amount
    pub fn quotient(&self) -> Integer {
        (&self.raw).floor()
    }

    /// decimal adjusted amount
    pub fn to_f64(&self) -> f64 {
        rational_to_f64(&(&self.raw / Rational::from(decimal_scale(self.token.decimals))))
    }

    /// decimal adjusted amount, truncated to the token's decimals
    pub fn to_exact(&self) -> String {
        let scaled = self.quotient();
        let negative = scaled < Integer::ZERO;
        let digits = scaled.unsigned_abs().to_string();
        let decimals = self.token.decimals as usize;

        let digits = format!("{digits:0>width$}", width = decimals + 1);
        let (int_part, frac_part) = digits.split_at(digits.len() - decimals);
        let frac_part = frac_part.trim_end_matches('0');

        let sign = if negative { "-" } else { "" };
        if frac_part.is_empty() {
            format!("{sign}{int_part}")
        } else {
            format!("{sign}{int_part}.{frac_part}")
        }
    }
}

impl Add<&CurrencyAmount> for &CurrencyAmount {
    type Output = CurrencyAmount;

    fn add(self, rhs: &CurrencyAmount) -> CurrencyAmount {
        debug_assert_eq!(self.token, rhs.token, "adding amounts of different tokens");
        CurrencyAmount { token: self.token.clone(), raw: &self.raw + &rhs.raw }
    }
}

impl Sub<&CurrencyAmount> for &CurrencyAmount {
    type Output = CurrencyAmount;

    fn sub(self, rhs: &CurrencyAmount) -> CurrencyAmount {
        debug_assert_eq!(self.token, rhs.token, "subtracting amounts of different tokens");
        CurrencyAmount { token: self.token.clone(), raw: &self.raw - &rhs.raw }
    }
}

impl fmt::Display for CurrencyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_exact(), self.token.symbol)
    }
}

/// `raw` is the amount of `quote` raw units one raw unit of `base` is worth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub base:  Token,
    pub quote: Token,
    #[serde(with = "rational_string")]
    pub raw:   Rational
}

impl Price {
    pub fn new(base: Token, quote: Token, raw: Rational) -> Self {
        Self { base, quote, raw }
    }

    /// `numerator / denominator` quote units per base unit
    pub fn from_ratio(base: Token, quote: Token, denominator: Natural, numerator: Natural) -> Self {
        Self { base, quote, raw: Rational::from_naturals(numerator, denominator) }
    }

    pub fn invert(&self) -> Self {
        let raw = if self.raw == Rational::ZERO {
            Rational::ZERO
        } else {
            Rational::ONE / &self.raw
        };
        Self { base: self.quote.clone(), quote: self.base.clone(), raw }
    }

    /// Price in whole tokens rather than raw units.
    pub fn adjusted(&self) -> Rational {
        &self.raw * Rational::from_naturals(
            decimal_scale(self.base.decimals),
            decimal_scale(self.quote.decimals)
        )
    }

    pub fn to_f64(&self) -> f64 {
        rational_to_f64(&self.adjusted())
    }

    pub fn to_significant(&self, digits: usize) -> String {
        let value = self.to_f64();
        if value == 0.0 || !value.is_finite() {
            return value.to_string();
        }

        let magnitude = value.abs().log10().floor() as i64;
        let decimals = (digits as i64 - 1 - magnitude).max(0) as usize;
        format!("{value:.decimals$}")
    }

    /// Converts an amount of the base token into the quote token.
    pub fn quote(&self, amount: &CurrencyAmount) -> CurrencyAmount {
        debug_assert_eq!(amount.token, self.base, "quoting an amount of the wrong token");
        CurrencyAmount { token: self.quote.clone(), raw: &amount.raw * &self.raw }
    }

    /// Sums a pair of amounts in the quote token, converting the base side.
    /// `None` when an amount is in neither token.
    pub fn value_in_quote(&self, amounts: &[CurrencyAmount; 2]) -> Option<CurrencyAmount> {
        let mut total = CurrencyAmount::zero(self.quote.clone());
        for amount in amounts {
            let converted = if amount.token == self.quote {
                amount.clone()
            } else if amount.token == self.base {
                self.quote(amount)
            } else {
                return None;
            };
            total = &total + &converted;
        }
        Some(total)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.to_significant(6), self.quote.symbol, self.base.symbol)
    }
}
