mod engine;
pub use engine::CachedStatsEngine;

mod shim;
pub use shim::{CacheShim, LastChecked};

mod store;
pub use store::{FileCacheStore, MemoryCacheStore};

use std::time::Duration;

use serde_json::Value;

/// A key/value tier holding JSON values with an expiry.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait CacheStore: Send + Sync {
    /// `None` for missing or expired keys
    async fn get(&self, key: &str) -> eyre::Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> eyre::Result<()>;

    async fn delete(&self, key: &str) -> eyre::Result<()>;

    async fn clear(&self) -> eyre::Result<()>;

    /// Drops every expired entry, returning how many were removed.
    async fn purge_expired(&self) -> eyre::Result<usize>;
}
