use std::{path::PathBuf, time::Duration};

use alloy_primitives::{Address, address};

pub const ETHEREUM_POOL_FACTORY_ADDRESS: Address =
    address!("1F98431c8aD98523631AE4a59f267346ea31F984");
pub const ETHEREUM_POSITION_MANAGER_ADDRESS: Address =
    address!("C36442b4a4522E871399CD717aBDD847Ab11FE88");
pub const ETHEREUM_DEPLOYMENT_BLOCK: u64 = 12369621;

pub const BASE_POOL_FACTORY_ADDRESS: Address =
    address!("33128a8fC17869897dcE68Ed026d694621f6FDfD");
pub const BASE_POSITION_MANAGER_ADDRESS: Address =
    address!("03a520b32C04BF3bEEf7BEb72E919cf822Ed34f1");
pub const BASE_DEPLOYMENT_BLOCK: u64 = 1371680;

pub const DEFAULT_CHAIN: &str = "ethereum";

/// Where a deployment of the AMM lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub name:                     String,
    pub chain_id:                 u64,
    pub rpc_url:                  String,
    pub pool_factory_address:     Address,
    pub position_manager_address: Address,
    /// no position manager logs exist before this block
    pub deployment_block:         u64,
    /// max block span per `eth_getLogs` request, `None` for a single request
    pub log_chunk_size:           Option<u64>
}

impl ChainConfig {
    pub fn new(
        name: impl ToString,
        chain_id: u64,
        rpc_url: impl ToString,
        pool_factory_address: Address,
        position_manager_address: Address
    ) -> Self {
        Self {
            name: name.to_string(),
            chain_id,
            rpc_url: rpc_url.to_string(),
            pool_factory_address,
            position_manager_address,
            deployment_block: 0,
            log_chunk_size: None
        }
    }

    pub fn ethereum() -> Self {
        Self::new(
            "ethereum",
            1,
            "https://ethereum-rpc.publicnode.com",
            ETHEREUM_POOL_FACTORY_ADDRESS,
            ETHEREUM_POSITION_MANAGER_ADDRESS
        )
        .with_deployment_block(ETHEREUM_DEPLOYMENT_BLOCK)
    }

    pub fn base() -> Self {
        Self::new(
            "base",
            8453,
            "https://mainnet.base.org",
            BASE_POOL_FACTORY_ADDRESS,
            BASE_POSITION_MANAGER_ADDRESS
        )
        .with_deployment_block(BASE_DEPLOYMENT_BLOCK)
    }

    /// Built-in deployment by chain name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ethereum" | "mainnet" => Some(Self::ethereum()),
            "base" => Some(Self::base()),
            _ => None
        }
    }

    /// Built-in deployment with `<NAME>_RPC_URL`, `<NAME>_POOL_FACTORY_ADDRESS`,
    /// `<NAME>_POSITION_MANAGER_ADDRESS` and `<NAME>_LOG_CHUNK_SIZE` overrides
    /// read from the environment (and `.env`).
    pub fn from_env(name: &str) -> eyre::Result<Self> {
        dotenv::dotenv().ok();

        let mut config =
            Self::by_name(name).ok_or_else(|| eyre::eyre!("unknown chain {name:?}"))?;
        let prefix = name.to_ascii_uppercase();
        let var = |suffix: &str| std::env::var(format!("{prefix}_{suffix}")).ok();

        if let Some(rpc_url) = var("RPC_URL") {
            config.rpc_url = rpc_url;
        }
        if let Some(factory) = var("POOL_FACTORY_ADDRESS") {
            config.pool_factory_address = factory.parse()?;
        }
        if let Some(manager) = var("POSITION_MANAGER_ADDRESS") {
            config.position_manager_address = manager.parse()?;
        }
        if let Some(chunk) = var("LOG_CHUNK_SIZE") {
            config.log_chunk_size = Some(chunk.parse()?);
        }

        Ok(config)
    }

    pub fn with_rpc_url(mut self, rpc_url: impl ToString) -> Self {
        self.rpc_url = rpc_url.to_string();
        self
    }

    pub fn with_deployment_block(mut self, block: u64) -> Self {
        self.deployment_block = block;
        self
    }

    pub fn with_log_chunk_size(mut self, chunk_size: u64) -> Self {
        self.log_chunk_size = Some(chunk_size.max(1));
        self
    }
}

/// Tuning for [`crate::cache::CacheShim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl_secs:                   u64,
    /// a cached entry older than this many blocks is recomputed without
    /// scanning for position logs
    pub max_blocks_without_recheck: u64,
    pub persistent_dir:             Option<PathBuf>
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600, max_blocks_without_recheck: 10_000, persistent_dir: None }
    }
}

impl CacheConfig {
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn with_max_blocks_without_recheck(mut self, blocks: u64) -> Self {
        self.max_blocks_without_recheck = blocks;
        self
    }

    pub fn with_persistent_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persistent_dir = Some(dir.into());
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
