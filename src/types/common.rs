use std::hash::{Hash, Hasher};

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

pub fn sort_tokens(token0: Address, token1: Address) -> (Address, Address) {
    if token0 < token1 { (token0, token1) } else { (token1, token0) }
}

/// An ERC20 on a given chain. Identity is `(chain_id, address)`; decimals and
/// symbol are metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub chain_id: u64,
    pub address:  Address,
    pub decimals: u8,
    pub symbol:   String
}

impl Token {
    pub fn new(chain_id: u64, address: Address, decimals: u8, symbol: impl ToString) -> Self {
        Self { chain_id, address, decimals, symbol: symbol.to_string() }
    }

    pub fn sorts_before(&self, other: &Token) -> bool {
        self.address < other.address
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id && self.address == other.address
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chain_id.hash(state);
        self.address.hash(state);
    }
}

/// The position manager's view of a position NFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionInfo {
    pub token0:     Address,
    pub token1:     Address,
    pub fee:        u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity:  u128
}

/// Fees owed to a position that have not been collected yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UncollectedFees {
    pub amount0: U256,
    pub amount1: U256
}
