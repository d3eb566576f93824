use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{Address, U160, U256, aliases::U24};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::{Filter, Log};

use super::{ChainReader, PoolSource, PositionSource, TokenSource, utils::view_call};
use crate::types::{
    ChainConfig, PositionInfo, Token, UncollectedFees,
    contracts::{IERC20Metadata, INonfungiblePositionManager, IUniswapV3Factory, IUniswapV3Pool},
    errors::PositionStatsError
};

/// Reads positions, pools and tokens of one deployment over JSON-RPC.
#[derive(Debug, Clone)]
pub struct EthRpcProvider<P = RootProvider> {
    provider: P,
    config:   ChainConfig
}

impl EthRpcProvider<RootProvider> {
    pub async fn connect(config: ChainConfig) -> eyre::Result<Self> {
        let provider = RootProvider::builder().connect(&config.rpc_url).await?;
        Ok(Self { provider, config })
    }
}

impl<P: Provider + Clone> EthRpcProvider<P> {
    pub fn new(provider: P, config: ChainConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl<P: Provider + Clone> ChainReader for EthRpcProvider<P> {
    async fn block_number(&self) -> eyre::Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn block_timestamp(&self, block_number: u64) -> eyre::Result<u64> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block_number))
            .await?
            .ok_or(PositionStatsError::MissingBlock(block_number))?;
        Ok(block.header.inner.timestamp)
    }

    async fn logs(&self, filter: &Filter) -> eyre::Result<Vec<Log>> {
        Ok(self.provider.get_logs(filter).await?)
    }
}

#[async_trait::async_trait]
impl<P: Provider + Clone> PositionSource for EthRpcProvider<P> {
    async fn owner_of(&self, position_id: U256) -> eyre::Result<Address> {
        view_call(
            &self.provider,
            None,
            None,
            self.config.position_manager_address,
            INonfungiblePositionManager::ownerOfCall { tokenId: position_id }
        )
        .await
    }

    async fn position(&self, position_id: U256) -> eyre::Result<PositionInfo> {
        let position = view_call(
            &self.provider,
            None,
            None,
            self.config.position_manager_address,
            INonfungiblePositionManager::positionsCall { tokenId: position_id }
        )
        .await?;

        Ok(PositionInfo {
            token0:     position.token0,
            token1:     position.token1,
            fee:        position.fee.to::<u32>(),
            tick_lower: position.tickLower.as_i32(),
            tick_upper: position.tickUpper.as_i32(),
            liquidity:  position.liquidity
        })
    }

    async fn uncollected_fees(
        &self,
        position_id: U256,
        owner: Address
    ) -> eyre::Result<UncollectedFees> {
        let collected = view_call(
            &self.provider,
            None,
            Some(owner),
            self.config.position_manager_address,
            INonfungiblePositionManager::collectCall {
                params: INonfungiblePositionManager::CollectParams {
                    tokenId:    position_id,
                    recipient:  owner,
                    amount0Max: u128::MAX,
                    amount1Max: u128::MAX
                }
            }
        )
        .await?;

        Ok(UncollectedFees { amount0: collected.amount0, amount1: collected.amount1 })
    }
}

#[async_trait::async_trait]
impl<P: Provider + Clone> PoolSource for EthRpcProvider<P> {
    async fn pool_address(
        &self,
        token0: Address,
        token1: Address,
        fee: u32
    ) -> eyre::Result<Address> {
        view_call(
            &self.provider,
            None,
            None,
            self.config.pool_factory_address,
            IUniswapV3Factory::getPoolCall { tokenA: token0, tokenB: token1, fee: U24::from(fee) }
        )
        .await
    }

    async fn slot0_sqrt_price(
        &self,
        pool: Address,
        block_number: Option<u64>
    ) -> eyre::Result<U160> {
        let slot0 =
            view_call(&self.provider, block_number, None, pool, IUniswapV3Pool::slot0Call {})
                .await?;
        Ok(slot0.sqrtPriceX96)
    }
}

#[async_trait::async_trait]
impl<P: Provider + Clone> TokenSource for EthRpcProvider<P> {
    async fn token(&self, address: Address) -> eyre::Result<Token> {
        let (decimals, symbol) = tokio::try_join!(
            view_call(&self.provider, None, None, address, IERC20Metadata::decimalsCall {}),
            view_call(&self.provider, None, None, address, IERC20Metadata::symbolCall {})
        )?;

        Ok(Token::new(self.config.chain_id, address, decimals, symbol))
    }
}
