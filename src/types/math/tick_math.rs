use alloy_primitives::{U160, U256};
pub use uniswap_v3_math::tick_math::{MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK};

use crate::types::errors::PositionStatsError;

/// `sqrt(1.0001^tick) * 2^96` as the pool contracts compute it.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Result<U160, PositionStatsError> {
    let ratio = uniswap_v3_math::tick_math::get_sqrt_ratio_at_tick(tick)
        .map_err(|_| PositionStatsError::InvalidTick(tick))?;

    U160::checked_from_limbs_slice(ratio.as_limbs()).ok_or(PositionStatsError::InvalidTick(tick))
}

/// Greatest tick whose sqrt ratio is at or below `sqrt_price_x96`.
pub fn get_tick_at_sqrt_ratio(sqrt_price_x96: U160) -> Result<i32, PositionStatsError> {
    uniswap_v3_math::tick_math::get_tick_at_sqrt_ratio(U256::from(sqrt_price_x96))
        .map_err(|_| PositionStatsError::SqrtPriceOutOfRange(sqrt_price_x96))
}

/// Whether both ticks are in range and strictly ordered.
pub fn is_valid_tick_range(tick_lower: i32, tick_upper: i32) -> bool {
    MIN_TICK <= tick_lower && tick_lower < tick_upper && tick_upper <= MAX_TICK
}
