use alloy_primitives::U256;
use malachite_q::Rational;
use serde::{Deserialize, Serialize};

use super::{
    CurrencyAmount, Price,
    serde_utils::{extended_f64, rational_pair}
};

/// Everything derived about one position at one point in time. Pairs are
/// always `[token0, token1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSnapshot {
    pub position_id:            U256,
    pub chain_id:               u64,
    pub lower_tick_price:       Price,
    pub upper_tick_price:       Price,
    pub current_price:          Price,
    pub uncollected:            [CurrencyAmount; 2],
    pub current:                [CurrencyAmount; 2],
    pub deposited:              [CurrencyAmount; 2],
    pub avg_deposit_price:      Price,
    pub withdrawn:              [CurrencyAmount; 2],
    pub avg_withdrawn_price:    Option<Price>,
    /// fees only, withdrawn principal is netted out
    pub collected:              [CurrencyAmount; 2],
    pub avg_collected_price:    Option<Price>,
    pub total_yield:            [CurrencyAmount; 2],
    pub avg_yield_price:        Price,
    /// ms since the epoch
    pub date_opened:            u64,
    pub date_closed:            Option<u64>,
    pub duration_held_ms:       u64,
    pub yield_per_day:          [CurrencyAmount; 2],
    #[serde(with = "rational_pair")]
    pub apr:                    [Rational; 2],
    pub impermanent_loss_lower: f64,
    pub impermanent_loss_upper: f64,
    #[serde(with = "extended_f64")]
    pub break_even_days_lower:  f64,
    #[serde(with = "extended_f64")]
    pub break_even_days_upper:  f64,
    pub daily_collected:        [CurrencyAmount; 2],
    #[serde(with = "rational_pair")]
    pub daily_apr:              [Rational; 2]
}

/// A snapshot as stored by the cache, stamped with when it was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSnapshot {
    pub snapshot:        PositionSnapshot,
    pub cached_at_block: u64,
    pub cached_at_ms:    u64
}
