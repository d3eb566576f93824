mod amounts;
pub use amounts::*;

mod metrics;
pub use metrics::*;

mod price;
pub use price::*;

mod tick_math;
pub use tick_math::*;

use alloy_primitives::{U160, U256};
use malachite::{
    Natural,
    num::{arithmetic::traits::PowerOf2, conversion::traits::RoundingFrom},
    rounding_modes::RoundingMode
};
use malachite_q::Rational;

/// 2^96, the fixed point scale of `sqrtPriceX96`.
pub fn q96() -> Natural {
    Natural::power_of_2(96)
}

/// 2^192, the scale of a squared `sqrtPriceX96`.
pub fn q192() -> Natural {
    Natural::power_of_2(192)
}

pub fn u256_to_natural(value: U256) -> Natural {
    Natural::from_limbs_asc(value.as_limbs())
}

pub fn u160_to_natural(value: U160) -> Natural {
    Natural::from_limbs_asc(value.as_limbs())
}

pub fn natural_to_u256(value: &Natural) -> Option<U256> {
    U256::checked_from_limbs_slice(&value.to_limbs_asc())
}

pub fn natural_to_u160(value: &Natural) -> Option<U160> {
    U160::checked_from_limbs_slice(&value.to_limbs_asc())
}

/// lossy, nearest-rounded. only used for display and the float based metrics
pub fn rational_to_f64(value: &Rational) -> f64 {
    f64::rounding_from(value, RoundingMode::Nearest).0
}
