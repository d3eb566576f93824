use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use alloy_primitives::U256;
use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::{CacheStore, FileCacheStore, MemoryCacheStore};
use crate::types::CacheConfig;

/// When a position was last checked for new activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastChecked {
    pub block_number: u64,
    pub timestamp_ms: u64
}

/// In-memory tier in front of an optional persistent store. Persistent
/// failures are logged and read as misses.
pub struct CacheShim {
    memory:       MemoryCacheStore,
    persistent:   Option<Arc<dyn CacheStore>>,
    default_ttl:  Duration,
    last_checked: RwLock<HashMap<String, LastChecked>>
}

impl fmt::Debug for CacheShim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheShim")
            .field("memory_entries", &self.memory.len())
            .field("persistent", &self.persistent.is_some())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl Default for CacheShim {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl CacheShim {
    /// Memory only, unless `config` names a directory for the file store.
    pub fn new(config: &CacheConfig) -> Self {
        let persistent = config
            .persistent_dir
            .as_ref()
            .map(|dir| Arc::new(FileCacheStore::new(dir)) as Arc<dyn CacheStore>);

        Self {
            memory: MemoryCacheStore::new(),
            persistent,
            default_ttl: config.ttl(),
            last_checked: RwLock::new(HashMap::new())
        }
    }

    pub fn with_persistent_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.persistent = Some(store);
        self
    }

    pub fn fingerprint(chain: &str, position_id: U256) -> String {
        format!("position_{chain}_{position_id}")
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if let Some(value) = self.memory.get_value(key) {
            match serde_json::from_value(value) {
                Ok(decoded) => return Some(decoded),
                Err(err) => warn!(key, %err, "dropping undecodable memory cache entry")
            }
        }

        let store = self.persistent.as_ref()?;
        let value = match store.get(key).await {
            Ok(value) => value?,
            Err(err) => {
                warn!(key, %err, "persistent cache read failed");
                return None;
            }
        };

        match serde_json::from_value(value.clone()) {
            Ok(decoded) => {
                debug!(key, "re-warming memory cache from persistent tier");
                self.memory.set_value(key, value, self.default_ttl);
                Some(decoded)
            }
            Err(err) => {
                warn!(key, %err, "dropping undecodable persistent cache entry");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, %err, "cache value does not serialize");
                return;
            }
        };

        if let Some(store) = &self.persistent {
            if let Err(err) = store.set(key, value.clone(), ttl).await {
                warn!(key, %err, "persistent cache write failed");
            }
        }
        self.memory.set_value(key, value, ttl);
    }

    pub async fn delete(&self, key: &str) {
        self.memory.remove(key);
        if let Some(store) = &self.persistent {
            if let Err(err) = store.delete(key).await {
                warn!(key, %err, "persistent cache delete failed");
            }
        }
    }

    pub async fn clear(&self) {
        self.memory.clear_all();
        self.last_checked.write().clear();
        if let Some(store) = &self.persistent {
            if let Err(err) = store.clear().await {
                warn!(%err, "persistent cache clear failed");
            }
        }
    }

    /// Purges expired entries from both tiers. Returns the number of memory
    /// entries removed.
    pub async fn cleanup(&self) -> usize {
        let purged = self.memory.purge_expired_values();
        if let Some(store) = &self.persistent {
            match store.purge_expired().await {
                Ok(persisted) => debug!(purged, persisted, "purged expired cache entries"),
                Err(err) => warn!(%err, "persistent cache cleanup failed")
            }
        }
        purged
    }

    pub fn last_checked(&self, key: &str) -> Option<LastChecked> {
        self.last_checked.read().get(key).copied()
    }

    pub fn record_checked(&self, key: &str, block_number: u64, timestamp_ms: u64) {
        self.last_checked
            .write()
            .insert(key.to_string(), LastChecked { block_number, timestamp_ms });
    }

    pub fn forget_checked(&self, key: &str) {
        self.last_checked.write().remove(key);
    }
}
