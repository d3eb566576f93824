pub mod apis;
pub mod cache;
pub mod providers;
#[cfg(test)]
pub mod test_utils;
pub mod types;

use std::sync::Arc;

pub use apis::StatsEngine;
pub use cache::{CacheShim, CachedStatsEngine};
pub use providers::EthRpcProvider;
pub use types::{
    CacheConfig, ChainConfig, CurrencyAmount, PositionSnapshot, Price, Token,
    errors::PositionStatsError
};

/// Connects to `chain` over JSON-RPC and wraps the stats pipeline in a cache
/// built from `cache_config`.
pub async fn connect(
    chain: ChainConfig,
    cache_config: CacheConfig
) -> eyre::Result<CachedStatsEngine<EthRpcProvider>> {
    let provider = EthRpcProvider::connect(chain.clone()).await?;
    let cache = Arc::new(CacheShim::new(&cache_config));

    Ok(CachedStatsEngine::new(StatsEngine::new(provider, chain), cache, cache_config))
}
