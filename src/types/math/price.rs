use alloy_primitives::U160;
use malachite::{
    Natural,
    num::{
        arithmetic::traits::FloorSqrt,
        basic::traits::{One, Zero}
    }
};
use malachite_q::Rational;

use super::{
    get_sqrt_ratio_at_tick, get_tick_at_sqrt_ratio, natural_to_u160, q192, u160_to_natural
};
use crate::types::{Price, Token, errors::PositionStatsError};

/// Price of `base` in `quote` for a pool at `sqrt_price_x96`. The pool price is
/// token1 per token0, so it is inverted when `base` is token1.
pub fn sqrt_price_to_price(sqrt_price_x96: U160, base: &Token, quote: &Token) -> Price {
    price_from_sqrt_ratio(&Rational::from(u160_to_natural(sqrt_price_x96)), base, quote)
}

/// Same as [`sqrt_price_to_price`] for a non-integral sqrt price, such as a
/// liquidity-weighted average.
pub fn price_from_sqrt_ratio(sqrt_price_x96: &Rational, base: &Token, quote: &Token) -> Price {
    let ratio_x192 = sqrt_price_x96 * sqrt_price_x96;
    let raw = ratio_x192 / Rational::from(q192());

    let raw = if base.sorts_before(quote) || raw == Rational::ZERO {
        raw
    } else {
        Rational::ONE / raw
    };
    Price::new(base.clone(), quote.clone(), raw)
}

pub fn tick_to_price(base: &Token, quote: &Token, tick: i32) -> Result<Price, PositionStatsError> {
    let sqrt_ratio_x96 = u160_to_natural(get_sqrt_ratio_at_tick(tick)?);
    let ratio_x192 = &sqrt_ratio_x96 * &sqrt_ratio_x96;

    Ok(if base.sorts_before(quote) {
        Price::from_ratio(base.clone(), quote.clone(), q192(), ratio_x192)
    } else {
        Price::from_ratio(base.clone(), quote.clone(), ratio_x192, q192())
    })
}

/// `floor(sqrt(numerator * 2^192 / denominator))`, the sqrt price of a
/// token1/token0 ratio.
pub fn encode_sqrt_ratio_x96(
    numerator: &Natural,
    denominator: &Natural
) -> Result<U160, PositionStatsError> {
    let ratio_x192 = (numerator * q192()) / denominator;
    let sqrt = (&ratio_x192).floor_sqrt();
    natural_to_u160(&sqrt).ok_or(PositionStatsError::SqrtPriceOverflow)
}

/// The tick whose price is closest below `price`.
pub fn price_to_closest_tick(price: &Price) -> Result<i32, PositionStatsError> {
    let sorted = price.base.sorts_before(&price.quote);
    let (numerator, denominator) = (price.raw.numerator_ref(), price.raw.denominator_ref());

    let sqrt_ratio_x96 = if sorted {
        encode_sqrt_ratio_x96(numerator, denominator)?
    } else {
        encode_sqrt_ratio_x96(denominator, numerator)?
    };

    let tick = get_tick_at_sqrt_ratio(sqrt_ratio_x96)?;
    let next_tick_price = tick_to_price(&price.base, &price.quote, tick + 1)?;

    let reached_next = if sorted {
        price.raw >= next_tick_price.raw
    } else {
        price.raw <= next_tick_price.raw
    };
    Ok(if reached_next { tick + 1 } else { tick })
}
