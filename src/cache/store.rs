use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Duration, Instant}
};

use alloy_primitives::hex;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CacheStore;
use crate::apis::stats::unix_now_ms;

/// `None` expiry never lapses.
type MemoryEntry = (Value, Option<Instant>);

fn is_live(expires_at: &Option<Instant>, now: Instant) -> bool {
    expires_at.is_none_or(|expires_at| expires_at > now)
}

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, MemoryEntry>>
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// live and not yet purged entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some((value, expires_at)) if is_live(expires_at, Instant::now()) => {
                    return Some(value.clone());
                }
                Some(_) => {}
                None => return None
            }
        }

        self.entries.write().remove(key);
        None
    }

    pub fn set_value(&self, key: &str, value: Value, ttl: Duration) {
        self.entries
            .write()
            .insert(key.to_string(), (value, Instant::now().checked_add(ttl)));
    }

    pub fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }

    pub fn clear_all(&self) {
        self.entries.write().clear();
    }

    /// Drops expired entries, returning how many went.
    pub fn purge_expired_values(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| is_live(expires_at, now));
        before - entries.len()
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> eyre::Result<Option<Value>> {
        Ok(self.get_value(key))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> eyre::Result<()> {
        self.set_value(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> eyre::Result<()> {
        self.remove(key);
        Ok(())
    }

    async fn clear(&self) -> eyre::Result<()> {
        self.clear_all();
        Ok(())
    }

    async fn purge_expired(&self) -> eyre::Result<usize> {
        Ok(self.purge_expired_values())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry {
    expires_at_ms: u64,
    value:         Value
}

/// One JSON file per key under `dir`, named by the hex encoded key.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(key)))
    }

    async fn json_files(&self) -> eyre::Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into())
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }
}

fn expiry_ms(ttl: Duration) -> u64 {
    let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    unix_now_ms().saturating_add(ttl_ms)
}

async fn remove_if_present(path: &Path) -> eyre::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
        _ => Ok(())
    }
}

#[async_trait::async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &str) -> eyre::Result<Option<Value>> {
        let path = self.path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into())
        };

        let entry: FileEntry = serde_json::from_slice(&bytes)?;
        if entry.expires_at_ms <= unix_now_ms() {
            remove_if_present(&path).await?;
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> eyre::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let entry = FileEntry { expires_at_ms: expiry_ms(ttl), value };
        tokio::fs::write(self.path(key), serde_json::to_vec(&entry)?).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> eyre::Result<()> {
        remove_if_present(&self.path(key)).await
    }

    async fn clear(&self) -> eyre::Result<()> {
        for path in self.json_files().await? {
            remove_if_present(&path).await?;
        }
        Ok(())
    }

    /// Undecodable files count as expired.
    async fn purge_expired(&self) -> eyre::Result<usize> {
        let now_ms = unix_now_ms();
        let mut purged = 0;
        for path in self.json_files().await? {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into())
            };
            let expired = serde_json::from_slice::<FileEntry>(&bytes)
                .map_or(true, |entry| entry.expires_at_ms <= now_ms);
            if expired {
                remove_if_present(&path).await?;
                purged += 1;
            }
        }
        Ok(purged)
    }
}
