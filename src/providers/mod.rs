mod eth;
pub use eth::EthRpcProvider;

pub(crate) mod utils;

use alloy_primitives::{Address, U160, U256};
use alloy_rpc_types::{Filter, Log};

use crate::types::{PositionInfo, Token, UncollectedFees};

/// Raw chain access: heads, block times and logs.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait ChainReader: Send + Sync {
    async fn block_number(&self) -> eyre::Result<u64>;

    /// unix seconds
    async fn block_timestamp(&self, block_number: u64) -> eyre::Result<u64>;

    async fn logs(&self, filter: &Filter) -> eyre::Result<Vec<Log>>;
}

/// The position manager contract.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait PositionSource: Send + Sync {
    /// fails for burned or never minted positions
    async fn owner_of(&self, position_id: U256) -> eyre::Result<Address>;

    async fn position(&self, position_id: U256) -> eyre::Result<PositionInfo>;

    /// Simulates collecting everything owed, as `owner`, without sending a
    /// transaction.
    async fn uncollected_fees(
        &self,
        position_id: U256,
        owner: Address
    ) -> eyre::Result<UncollectedFees>;
}

#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait PoolSource: Send + Sync {
    /// `Address::ZERO` when no such pool was deployed
    async fn pool_address(&self, token0: Address, token1: Address, fee: u32)
    -> eyre::Result<Address>;

    /// pool price at `block_number`, or at the head
    async fn slot0_sqrt_price(&self, pool: Address, block_number: Option<u64>)
    -> eyre::Result<U160>;
}

#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait TokenSource: Send + Sync {
    async fn token(&self, address: Address) -> eyre::Result<Token>;
}

/// Everything the stats pipeline reads from a chain.
pub trait PositionDataProvider: ChainReader + PositionSource + PoolSource + TokenSource {}

impl<T> PositionDataProvider for T where T: ChainReader + PositionSource + PoolSource + TokenSource {}
