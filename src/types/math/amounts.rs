use alloy_primitives::U160;
use malachite::{Natural, num::basic::traits::Zero};
use malachite_q::Rational;

use super::{get_sqrt_ratio_at_tick, q96, u160_to_natural};
use crate::types::{CurrencyAmount, Token, errors::PositionStatsError};

/// Token amounts backing `liquidity` over `[tick_lower, tick_upper]` at the
/// given pool price. The price is clamped to the range, so an out of range
/// position is entirely one token.
pub fn current_amounts(
    liquidity: u128,
    sqrt_price_x96: U160,
    tick_lower: i32,
    tick_upper: i32,
    token0: &Token,
    token1: &Token
) -> Result<[CurrencyAmount; 2], PositionStatsError> {
    let sqrt_a = u160_to_natural(get_sqrt_ratio_at_tick(tick_lower)?);
    let sqrt_b = u160_to_natural(get_sqrt_ratio_at_tick(tick_upper)?);
    let (sqrt_lower, sqrt_upper) =
        if sqrt_a <= sqrt_b { (sqrt_a, sqrt_b) } else { (sqrt_b, sqrt_a) };
    let sqrt_current =
        u160_to_natural(sqrt_price_x96).clamp(sqrt_lower.clone(), sqrt_upper.clone());

    let liquidity = Natural::from(liquidity);

    let amount0 = Rational::from_naturals(
        &liquidity * (&sqrt_upper - &sqrt_current) * q96(),
        &sqrt_current * &sqrt_upper
    );
    let amount1 = Rational::from_naturals(liquidity * (sqrt_current - sqrt_lower), q96());

    Ok([CurrencyAmount::new(token0.clone(), amount0), CurrencyAmount::new(token1.clone(), amount1)])
}

fn div_rounding(numerator: Natural, denominator: &Natural, round_up: bool) -> Natural {
    let quotient = &numerator / denominator;
    if round_up && &quotient * denominator != numerator {
        quotient + Natural::from(1u32)
    } else {
        quotient
    }
}

fn ordered<'a>(a: &'a Natural, b: &'a Natural) -> (&'a Natural, &'a Natural) {
    if a <= b { (a, b) } else { (b, a) }
}

/// `amount0 * sqrtA * sqrtB / (2^96 * (sqrtB - sqrtA))`
pub fn liquidity_for_amount0(
    sqrt_a: &Natural,
    sqrt_b: &Natural,
    amount0: &Natural,
    round_up: bool
) -> Natural {
    let (sqrt_a, sqrt_b) = ordered(sqrt_a, sqrt_b);
    if sqrt_a == sqrt_b {
        return Natural::ZERO;
    }

    let numerator = amount0 * sqrt_a * sqrt_b;
    let denominator = q96() * (sqrt_b - sqrt_a);
    div_rounding(numerator, &denominator, round_up)
}

/// `amount1 * 2^96 / (sqrtB - sqrtA)`
pub fn liquidity_for_amount1(
    sqrt_a: &Natural,
    sqrt_b: &Natural,
    amount1: &Natural,
    round_up: bool
) -> Natural {
    let (sqrt_a, sqrt_b) = ordered(sqrt_a, sqrt_b);
    if sqrt_a == sqrt_b {
        return Natural::ZERO;
    }

    div_rounding(amount1 * q96(), &(sqrt_b - sqrt_a), round_up)
}

/// Largest liquidity the given amounts could provide over `[sqrt_a, sqrt_b]`
/// at `sqrt_price`. Below the range only token0 counts, above it only token1,
/// inside it the scarcer side.
pub fn liquidity_for_amounts(
    sqrt_price: &Natural,
    sqrt_a: &Natural,
    sqrt_b: &Natural,
    amount0: &Natural,
    amount1: &Natural,
    round_up: bool
) -> Natural {
    let (sqrt_a, sqrt_b) = ordered(sqrt_a, sqrt_b);

    if sqrt_price <= sqrt_a {
        liquidity_for_amount0(sqrt_a, sqrt_b, amount0, round_up)
    } else if sqrt_price < sqrt_b {
        let liquidity0 = liquidity_for_amount0(sqrt_price, sqrt_b, amount0, round_up);
        let liquidity1 = liquidity_for_amount1(sqrt_a, sqrt_price, amount1, round_up);
        liquidity0.min(liquidity1)
    } else {
        liquidity_for_amount1(sqrt_a, sqrt_b, amount1, round_up)
    }
}
