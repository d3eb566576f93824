use std::sync::Arc;

use alloy_primitives::U256;
use tracing::{debug, info, warn};

use super::CacheShim;
use crate::{
    apis::{StatsEngine, stats::unix_now_ms},
    providers::{ChainReader, PositionDataProvider, utils::position_activity_filters},
    types::{CacheConfig, CachedSnapshot, PositionSnapshot, errors::PositionStatsError}
};

/// [`StatsEngine`] behind a [`CacheShim`]. A cached snapshot is served until
/// the position emits an event, its ttl runs out, or too many blocks pass
/// without a check.
#[derive(Debug, Clone)]
pub struct CachedStatsEngine<P> {
    engine: StatsEngine<P>,
    cache:  Arc<CacheShim>,
    config: CacheConfig
}

impl<P: PositionDataProvider> CachedStatsEngine<P> {
    pub fn new(engine: StatsEngine<P>, cache: Arc<CacheShim>, config: CacheConfig) -> Self {
        Self { engine, cache, config }
    }

    pub fn engine(&self) -> &StatsEngine<P> {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<CacheShim> {
        &self.cache
    }

    pub async fn position_stats(
        &self,
        position_id: U256
    ) -> Result<PositionSnapshot, PositionStatsError> {
        self.position_stats_at(position_id, unix_now_ms()).await
    }

    pub async fn position_stats_at(
        &self,
        position_id: U256,
        now_ms: u64
    ) -> Result<PositionSnapshot, PositionStatsError> {
        let chain = self.engine.config().name.as_str();
        let key = CacheShim::fingerprint(chain, position_id);

        let current_block = match self.engine.provider().block_number().await {
            Ok(block_number) => block_number,
            Err(err) => {
                warn!(%position_id, %chain, %err, "could not read the chain head");
                0
            }
        };

        if let Some(cached) = self.cache.get::<CachedSnapshot>(&key).await {
            if !self
                .has_position_updates(&key, position_id, current_block)
                .await
            {
                debug!(%position_id, %chain, cached_at_block = cached.cached_at_block, "cache hit");
                return Ok(cached.snapshot);
            }
        }

        let snapshot = self.engine.position_stats_at(position_id, now_ms).await?;
        let cached = CachedSnapshot {
            snapshot:        snapshot.clone(),
            cached_at_block: current_block,
            cached_at_ms:    now_ms
        };
        self.cache.set(&key, &cached, self.config.ttl()).await;
        self.cache.record_checked(&key, current_block, now_ms);

        info!(%position_id, %chain, current_block, "cached fresh position stats");
        Ok(snapshot)
    }

    /// Drops the cached snapshot and its last-checked record.
    pub async fn invalidate(&self, position_id: U256) {
        let key = CacheShim::fingerprint(&self.engine.config().name, position_id);
        self.cache.delete(&key).await;
        self.cache.forget_checked(&key);
    }

    /// Whether the position may have changed since it was last checked. Any
    /// doubt counts as a change.
    pub async fn has_position_updates(
        &self,
        key: &str,
        position_id: U256,
        current_block: u64
    ) -> bool {
        let chain = self.engine.config().name.as_str();
        let Some(last_checked) = self
            .cache
            .last_checked(key)
            .filter(|checked| checked.block_number != 0)
        else {
            return true;
        };
        // head unreadable or reorged below the last check
        if current_block < last_checked.block_number {
            return true;
        }
        if current_block - last_checked.block_number > self.config.max_blocks_without_recheck {
            return true;
        }

        let [lifecycle, transfers] = position_activity_filters(
            self.engine.config().position_manager_address,
            position_id,
            last_checked.block_number,
            current_block
        );
        let provider = self.engine.provider();
        match tokio::try_join!(provider.logs(&lifecycle), provider.logs(&transfers)) {
            Ok((lifecycle, transfers)) => {
                let events = lifecycle.len() + transfers.len();
                if events > 0 {
                    debug!(
                        %position_id,
                        %chain,
                        since = last_checked.block_number,
                        events,
                        "position changed since last check"
                    );
                }
                events > 0
            }
            Err(err) => {
                warn!(%position_id, %chain, %err, "could not check for position activity");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;
    use malachite_q::Rational;
    use serde_json::Value;

    use super::*;
    use crate::{
        cache::{CacheStore, MemoryCacheStore},
        test_utils::{MockChain, TestPosition}
    };

    const NOW_MS: u64 = 1_700_000_000_000;

    fn cached_engine(mock: MockChain, cache: Arc<CacheShim>) -> CachedStatsEngine<Arc<MockChain>> {
        let config = mock.config.clone();
        let engine = StatsEngine::new(Arc::new(mock), config);
        CachedStatsEngine::new(engine, cache, CacheConfig::default())
    }

    fn seeded_mock() -> MockChain {
        let mock = MockChain::with_test_position();
        mock.push_increase(100, 0, TestPosition::LIQUIDITY, U256::from(1_000u32), U256::from(1_000u32));
        mock.set_uncollected(TestPosition::ID, U256::from(10u8), U256::from(10u8));
        mock
    }

    fn key() -> String {
        CacheShim::fingerprint("testnet", TestPosition::ID)
    }

    #[tokio::test]
    async fn test_hit_without_updates() {
        let engine = cached_engine(seeded_mock(), Arc::new(CacheShim::default()));

        let first = engine
            .position_stats_at(TestPosition::ID, NOW_MS)
            .await
            .unwrap();
        let slot0_calls = engine.engine().provider().slot0_calls();

        engine.engine().provider().set_block_number(1_005);
        let second = engine
            .position_stats_at(TestPosition::ID, NOW_MS + 60_000)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.engine().provider().slot0_calls(), slot0_calls);

        let stored = engine
            .cache()
            .get::<CachedSnapshot>(&key())
            .await
            .unwrap();
        assert_eq!(stored.cached_at_block, 1_000);
        assert_eq!(stored.cached_at_ms, NOW_MS);
    }

    #[tokio::test]
    async fn test_recomputes_after_new_events() {
        let engine = cached_engine(seeded_mock(), Arc::new(CacheShim::default()));
        let first = engine
            .position_stats_at(TestPosition::ID, NOW_MS)
            .await
            .unwrap();

        let mock = engine.engine().provider();
        mock.set_block_number(1_010);
        mock.push_collect(1_008, 0, U256::from(4u8), U256::from(4u8));

        let second = engine
            .position_stats_at(TestPosition::ID, NOW_MS)
            .await
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(second.collected[0].raw, Rational::from(4u32));
        assert_eq!(engine.cache().last_checked(&key()).map(|c| c.block_number), Some(1_010));
    }

    #[tokio::test]
    async fn test_transfer_invalidates() {
        let engine = cached_engine(seeded_mock(), Arc::new(CacheShim::default()));
        engine
            .position_stats_at(TestPosition::ID, NOW_MS)
            .await
            .unwrap();

        let mock = engine.engine().provider();
        mock.set_block_number(1_002);
        assert!(!engine.has_position_updates(&key(), TestPosition::ID, 1_002).await);

        mock.push_transfer(1_001, TestPosition::OWNER, Address::with_last_byte(0xb2));
        assert!(engine.has_position_updates(&key(), TestPosition::ID, 1_002).await);
    }

    #[tokio::test]
    async fn test_recheck_policy() {
        let engine = cached_engine(seeded_mock(), Arc::new(CacheShim::default()));

        // never checked
        assert!(engine.has_position_updates(&key(), TestPosition::ID, 1_000).await);

        engine.cache().record_checked(&key(), 1_000, NOW_MS);
        assert!(!engine.has_position_updates(&key(), TestPosition::ID, 1_000).await);
        assert!(engine.has_position_updates(&key(), TestPosition::ID, 11_001).await);

        engine.engine().provider().set_fail_logs(true);
        assert!(engine.has_position_updates(&key(), TestPosition::ID, 1_000).await);
    }

    #[tokio::test]
    async fn test_head_behind_last_check_counts_as_update() {
        let engine = cached_engine(seeded_mock(), Arc::new(CacheShim::default()));
        engine.cache().record_checked(&key(), 1_000, NOW_MS);
        let log_calls = engine.engine().provider().log_calls();

        assert!(engine.has_position_updates(&key(), TestPosition::ID, 0).await);
        assert!(engine.has_position_updates(&key(), TestPosition::ID, 999).await);
        // decided without querying logs over an inverted range
        assert_eq!(engine.engine().provider().log_calls(), log_calls);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let engine = cached_engine(seeded_mock(), Arc::new(CacheShim::default()));
        engine
            .position_stats_at(TestPosition::ID, NOW_MS)
            .await
            .unwrap();

        engine.invalidate(TestPosition::ID).await;

        assert_eq!(engine.cache().get::<CachedSnapshot>(&key()).await, None);
        assert_eq!(engine.cache().last_checked(&key()), None);
    }

    #[tokio::test]
    async fn test_persisted_snapshot_survives_restart() {
        let persistent = Arc::new(MemoryCacheStore::new());
        let cache = Arc::new(CacheShim::default().with_persistent_store(persistent.clone()));
        let engine = cached_engine(seeded_mock(), cache);
        let first = engine
            .position_stats_at(TestPosition::ID, NOW_MS)
            .await
            .unwrap();

        let stored: Value = persistent.get(&key()).await.unwrap().unwrap();
        assert_eq!(stored["cachedAtBlock"], 1_000);

        // a fresh shim has no last-checked record, so it recomputes but reads
        // the persisted entry first
        let restarted = Arc::new(CacheShim::default().with_persistent_store(persistent));
        assert!(restarted.get::<CachedSnapshot>(&key()).await.is_some());
        let engine = cached_engine(seeded_mock(), restarted);
        let second = engine
            .position_stats_at(TestPosition::ID, NOW_MS)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_chain_head_failure_still_computes() {
        let mock = seeded_mock();
        mock.set_fail_block_number(true);
        let engine = cached_engine(mock, Arc::new(CacheShim::default()));

        let snapshot = engine
            .position_stats_at(TestPosition::ID, NOW_MS)
            .await
            .unwrap();
        assert_eq!(snapshot.position_id, TestPosition::ID);

        // recorded at block 0, which never counts as checked
        assert_eq!(engine.cache().last_checked(&key()).map(|c| c.block_number), Some(0));
        assert!(engine.has_position_updates(&key(), TestPosition::ID, 0).await);
    }
}
