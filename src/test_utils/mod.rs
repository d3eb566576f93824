use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicUsize, Ordering}
};

use alloy_primitives::{Address, U160, U256, address, uint};
use alloy_rpc_types::{Filter, Log};
use alloy_sol_types::SolEvent;
use parking_lot::RwLock;

use crate::{
    providers::{ChainReader, PoolSource, PositionSource, TokenSource},
    types::{
        ChainConfig, PositionInfo, Token, UncollectedFees,
        contracts::INonfungiblePositionManager::{
            Collect, DecreaseLiquidity, IncreaseLiquidity, Transfer
        },
        math::get_sqrt_ratio_at_tick
    }
};

pub const GENESIS_TIMESTAMP: u64 = 1_600_000_000;
pub const BLOCK_TIME: u64 = 12;

/// Fixture ids for the position [`MockChain::with_test_position`] seeds.
pub struct TestPosition;

impl TestPosition {
    pub const ID: U256 = uint!(4242_U256);
    pub const OWNER: Address = address!("00000000000000000000000000000000000000a1");
    pub const TOKEN0: Address = address!("000000000000000000000000000000000000000a");
    pub const TOKEN1: Address = address!("000000000000000000000000000000000000000b");
    pub const POOL: Address = address!("00000000000000000000000000000000000000c0");
    pub const FACTORY: Address = address!("00000000000000000000000000000000000000f0");
    pub const POSITION_MANAGER: Address = address!("00000000000000000000000000000000000000e0");
    pub const FEE: u32 = 3000;
    pub const TICK_LOWER: i32 = -600;
    pub const TICK_UPPER: i32 = 600;
    pub const LIQUIDITY: u128 = 1_000_000_000_000_000_000;
}

pub fn sqrt_price_at_tick(tick: i32) -> U160 {
    get_sqrt_ratio_at_tick(tick).unwrap()
}

pub fn rpc_log<E: SolEvent>(address: Address, event: &E, block_number: u64, log_index: u64) -> Log {
    Log {
        inner:             alloy_primitives::Log { address, data: event.encode_log_data() },
        block_hash:        None,
        block_number:      Some(block_number),
        block_timestamp:   None,
        transaction_hash:  None,
        transaction_index: None,
        log_index:         Some(log_index),
        removed:           false
    }
}

fn filter_matches(filter: &Filter, log: &Log) -> bool {
    let block = log.block_number.unwrap_or_default();

    filter.get_from_block().is_none_or(|from| block >= from)
        && filter.get_to_block().is_none_or(|to| block <= to)
        && filter.address.matches(&log.address())
        && filter
            .topics
            .iter()
            .enumerate()
            .all(|(i, topic)| {
                topic.is_empty() || log.topics().get(i).is_some_and(|t| topic.matches(t))
            })
}

#[derive(Debug, Default)]
struct MockState {
    block_number:     u64,
    logs:             Vec<Log>,
    block_timestamps: HashMap<u64, u64>,
    positions:        HashMap<U256, PositionInfo>,
    owners:           HashMap<U256, Address>,
    uncollected:      HashMap<U256, UncollectedFees>,
    pools:            HashMap<(Address, Address, u32), Address>,
    /// price in effect from the keyed block onwards
    sqrt_prices:      BTreeMap<u64, U160>,
    tokens:           HashMap<Address, Token>,
    fail_logs:        bool,
    fail_head:        bool
}

/// In-memory chain implementing every collaborator trait. Logs are real
/// ABI-encoded position manager events, filtered the way a node would.
#[derive(Debug)]
pub struct MockChain {
    pub config:      ChainConfig,
    state:           RwLock<MockState>,
    slot0_calls:     AtomicUsize,
    log_calls:       AtomicUsize,
    timestamp_calls: AtomicUsize
}

impl MockChain {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            state: RwLock::new(MockState::default()),
            slot0_calls: AtomicUsize::new(0),
            log_calls: AtomicUsize::new(0),
            timestamp_calls: AtomicUsize::new(0)
        }
    }

    /// Two 18 decimal tokens, a pool priced at tick 0 and an open position
    /// over `[-600, 600]`, with no history yet.
    pub fn with_test_position() -> Self {
        let config = ChainConfig::new(
            "testnet",
            31337,
            "http://localhost:8545",
            TestPosition::FACTORY,
            TestPosition::POSITION_MANAGER
        );
        let mock = Self::new(config);

        mock.set_block_number(1_000);
        mock.add_token(Token::new(31337, TestPosition::TOKEN0, 18, "TKA"));
        mock.add_token(Token::new(31337, TestPosition::TOKEN1, 18, "TKB"));
        mock.add_pool(TestPosition::TOKEN0, TestPosition::TOKEN1, TestPosition::FEE, TestPosition::POOL);
        mock.set_sqrt_price_from(0, sqrt_price_at_tick(0));
        mock.add_position(
            TestPosition::ID,
            TestPosition::OWNER,
            PositionInfo {
                token0:     TestPosition::TOKEN0,
                token1:     TestPosition::TOKEN1,
                fee:        TestPosition::FEE,
                tick_lower: TestPosition::TICK_LOWER,
                tick_upper: TestPosition::TICK_UPPER,
                liquidity:  TestPosition::LIQUIDITY
            }
        );
        mock
    }

    pub fn set_block_number(&self, block_number: u64) {
        self.state.write().block_number = block_number;
    }

    pub fn set_block_timestamp(&self, block_number: u64, timestamp: u64) {
        self.state.write().block_timestamps.insert(block_number, timestamp);
    }

    pub fn set_sqrt_price_from(&self, block_number: u64, sqrt_price_x96: U160) {
        self.state.write().sqrt_prices.insert(block_number, sqrt_price_x96);
    }

    pub fn set_uncollected(&self, position_id: U256, amount0: U256, amount1: U256) {
        self.state
            .write()
            .uncollected
            .insert(position_id, UncollectedFees { amount0, amount1 });
    }

    pub fn set_fail_logs(&self, fail: bool) {
        self.state.write().fail_logs = fail;
    }

    pub fn set_fail_block_number(&self, fail: bool) {
        self.state.write().fail_head = fail;
    }

    pub fn set_position_liquidity(&self, position_id: U256, liquidity: u128) {
        if let Some(position) = self.state.write().positions.get_mut(&position_id) {
            position.liquidity = liquidity;
        }
    }

    pub fn add_token(&self, token: Token) {
        self.state.write().tokens.insert(token.address, token);
    }

    pub fn add_pool(&self, token0: Address, token1: Address, fee: u32, pool: Address) {
        self.state.write().pools.insert((token0, token1, fee), pool);
    }

    pub fn add_position(&self, position_id: U256, owner: Address, position: PositionInfo) {
        let mut state = self.state.write();
        state.positions.insert(position_id, position);
        state.owners.insert(position_id, owner);
    }

    pub fn push_log<E: SolEvent>(&self, event: &E, block_number: u64, log_index: u64) {
        let log = rpc_log(self.config.position_manager_address, event, block_number, log_index);
        self.state.write().logs.push(log);
    }

    pub fn push_increase(
        &self,
        block_number: u64,
        log_index: u64,
        liquidity: u128,
        amount0: U256,
        amount1: U256
    ) {
        let event = IncreaseLiquidity { tokenId: TestPosition::ID, liquidity, amount0, amount1 };
        self.push_log(&event, block_number, log_index);
    }

    pub fn push_increase_for(
        &self,
        position_id: U256,
        block_number: u64,
        log_index: u64,
        liquidity: u128
    ) {
        let event = IncreaseLiquidity {
            tokenId: position_id,
            liquidity,
            amount0: U256::from(1u8),
            amount1: U256::from(1u8)
        };
        self.push_log(&event, block_number, log_index);
    }

    pub fn push_decrease(
        &self,
        block_number: u64,
        log_index: u64,
        liquidity: u128,
        amount0: U256,
        amount1: U256
    ) {
        let event = DecreaseLiquidity { tokenId: TestPosition::ID, liquidity, amount0, amount1 };
        self.push_log(&event, block_number, log_index);
    }

    pub fn push_collect(&self, block_number: u64, log_index: u64, amount0: U256, amount1: U256) {
        let event =
            Collect { tokenId: TestPosition::ID, recipient: TestPosition::OWNER, amount0, amount1 };
        self.push_log(&event, block_number, log_index);
    }

    pub fn push_transfer(&self, block_number: u64, from: Address, to: Address) {
        let event = Transfer { from, to, tokenId: TestPosition::ID };
        self.push_log(&event, block_number, 0);
    }

    pub fn slot0_calls(&self) -> usize {
        self.slot0_calls.load(Ordering::SeqCst)
    }

    pub fn log_calls(&self) -> usize {
        self.log_calls.load(Ordering::SeqCst)
    }

    pub fn timestamp_calls(&self) -> usize {
        self.timestamp_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ChainReader for MockChain {
    async fn block_number(&self) -> eyre::Result<u64> {
        let state = self.state.read();
        if state.fail_head {
            eyre::bail!("eth_blockNumber: upstream unavailable");
        }
        Ok(state.block_number)
    }

    async fn block_timestamp(&self, block_number: u64) -> eyre::Result<u64> {
        self.timestamp_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read();
        if block_number > state.block_number {
            eyre::bail!("block {block_number} is in the future");
        }
        Ok(state
            .block_timestamps
            .get(&block_number)
            .copied()
            .unwrap_or(GENESIS_TIMESTAMP + block_number * BLOCK_TIME))
    }

    async fn logs(&self, filter: &Filter) -> eyre::Result<Vec<Log>> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read();
        if state.fail_logs {
            eyre::bail!("eth_getLogs: upstream unavailable");
        }
        Ok(state
            .logs
            .iter()
            .filter(|log| filter_matches(filter, log))
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl PositionSource for MockChain {
    async fn owner_of(&self, position_id: U256) -> eyre::Result<Address> {
        self.state
            .read()
            .owners
            .get(&position_id)
            .copied()
            .ok_or_else(|| eyre::eyre!("ERC721: invalid token ID"))
    }

    async fn position(&self, position_id: U256) -> eyre::Result<PositionInfo> {
        self.state
            .read()
            .positions
            .get(&position_id)
            .copied()
            .ok_or_else(|| eyre::eyre!("Invalid token ID"))
    }

    async fn uncollected_fees(
        &self,
        position_id: U256,
        owner: Address
    ) -> eyre::Result<UncollectedFees> {
        let state = self.state.read();
        if state.owners.get(&position_id) != Some(&owner) {
            eyre::bail!("Not approved");
        }
        Ok(state
            .uncollected
            .get(&position_id)
            .copied()
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl PoolSource for MockChain {
    async fn pool_address(
        &self,
        token0: Address,
        token1: Address,
        fee: u32
    ) -> eyre::Result<Address> {
        Ok(self
            .state
            .read()
            .pools
            .get(&(token0, token1, fee))
            .copied()
            .unwrap_or(Address::ZERO))
    }

    async fn slot0_sqrt_price(
        &self,
        pool: Address,
        block_number: Option<u64>
    ) -> eyre::Result<U160> {
        self.slot0_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read();
        if !state.pools.values().any(|p| *p == pool) {
            eyre::bail!("no contract at {pool:?}");
        }

        let block_number = block_number.unwrap_or(state.block_number);
        state
            .sqrt_prices
            .range(..=block_number)
            .next_back()
            .map(|(_, price)| *price)
            .ok_or_else(|| eyre::eyre!("pool not initialized at block {block_number}"))
    }
}

#[async_trait::async_trait]
impl TokenSource for MockChain {
    async fn token(&self, address: Address) -> eyre::Result<Token> {
        self.state
            .read()
            .tokens
            .get(&address)
            .cloned()
            .ok_or_else(|| eyre::eyre!("no token at {address:?}"))
    }
}
