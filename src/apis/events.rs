use std::{collections::HashMap, sync::Arc};

use alloy_primitives::{Address, U160, U256};
use malachite::{
    Integer, Natural,
    num::basic::traits::{One, Zero}
};
use malachite_q::Rational;
use parking_lot::{Mutex, RwLock};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
    providers::{ChainReader, PoolSource, utils::position_event_filters},
    types::{
        ChainConfig, CurrencyAmount, PositionEvent, PositionEventKind, Token,
        errors::PositionStatsError,
        math::{get_sqrt_ratio_at_tick, liquidity_for_amounts, u160_to_natural, u256_to_natural}
    }
};

/// Block timestamps keyed by `(chain_id, block_number)`. Blocks are final once
/// seen, so entries never expire and the table can be shared by every engine.
#[derive(Debug, Default)]
pub struct BlockTimestamps {
    inner: RwLock<HashMap<(u64, u64), u64>>
}

impl BlockTimestamps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chain_id: u64, block_number: u64) -> Option<u64> {
        self.inner.read().get(&(chain_id, block_number)).copied()
    }

    pub fn insert(&self, chain_id: u64, block_number: u64, timestamp: u64) {
        self.inner.write().insert((chain_id, block_number), timestamp);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn timestamp<C: ChainReader + ?Sized>(
        &self,
        chain: &C,
        chain_id: u64,
        block_number: u64
    ) -> eyre::Result<u64> {
        if let Some(timestamp) = self.get(chain_id, block_number) {
            return Ok(timestamp);
        }

        let timestamp = chain.block_timestamp(block_number).await?;
        self.insert(chain_id, block_number, timestamp);
        Ok(timestamp)
    }
}

/// `slot0` of one pool by block, fetched at most once per block. Lives for a
/// single stats computation.
pub struct PoolPriceHistory<'a, S: ?Sized> {
    source: &'a S,
    pool:   Address,
    prices: Mutex<HashMap<u64, Arc<OnceCell<U160>>>>
}

impl<'a, S: PoolSource + ?Sized> PoolPriceHistory<'a, S> {
    pub fn new(source: &'a S, pool: Address) -> Self {
        Self { source, pool, prices: Mutex::new(HashMap::new()) }
    }

    pub async fn sqrt_price_at(&self, block_number: u64) -> eyre::Result<U160> {
        let cell = self.prices.lock().entry(block_number).or_default().clone();

        cell.get_or_try_init(|| self.source.slot0_sqrt_price(self.pool, Some(block_number)))
            .await
            .copied()
    }

    /// number of distinct blocks looked up so far
    pub fn len(&self) -> usize {
        self.prices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Running sums over one class of position events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTotals {
    pub kind:                PositionEventKind,
    pub amount0:             Integer,
    pub amount1:             Integer,
    pub liquidity:           Integer,
    /// sum of `sqrtPriceX96 * liquidity` per event
    pub weighted_sqrt_price: Integer,
    pub first_block:         Option<u64>,
    pub last_block:          Option<u64>,
    /// unix seconds
    pub first_timestamp:     Option<u64>,
    pub last_timestamp:      Option<u64>,
    pub event_count:         usize
}

impl EventTotals {
    pub fn empty(kind: PositionEventKind) -> Self {
        Self {
            kind,
            amount0: Integer::ZERO,
            amount1: Integer::ZERO,
            liquidity: Integer::ZERO,
            weighted_sqrt_price: Integer::ZERO,
            first_block: None,
            last_block: None,
            first_timestamp: None,
            last_timestamp: None,
            event_count: 0
        }
    }

    /// Liquidity-weighted average sqrt price. `None` without positive
    /// liquidity.
    pub fn avg_sqrt_price_x96(&self) -> Option<Rational> {
        (self.liquidity > Integer::ZERO).then(|| {
            Rational::from_integers(self.weighted_sqrt_price.clone(), self.liquidity.clone())
        })
    }

    pub fn amounts(&self, token0: &Token, token1: &Token) -> [CurrencyAmount; 2] {
        [
            CurrencyAmount::from_integer(token0.clone(), &self.amount0),
            CurrencyAmount::from_integer(token1.clone(), &self.amount1)
        ]
    }

    fn accumulate(
        &mut self,
        sign: &Integer,
        (amount0, amount1): (U256, U256),
        liquidity: Natural,
        sqrt_price_x96: U160
    ) {
        let liquidity = Integer::from(liquidity) * sign;

        self.amount0 += Integer::from(u256_to_natural(amount0)) * sign;
        self.amount1 += Integer::from(u256_to_natural(amount1)) * sign;
        self.weighted_sqrt_price += Integer::from(u160_to_natural(sqrt_price_x96)) * &liquidity;
        self.liquidity += liquidity;
    }

    fn record_bounds(&mut self, events: &[PositionEvent]) {
        self.first_block = events.first().map(PositionEvent::block_number);
        self.last_block = events.last().map(PositionEvent::block_number);
        self.event_count = events.len();
    }
}

/// Replays the history of one position from position manager logs.
pub struct EventAggregator<'a, C: ?Sized> {
    chain:            &'a C,
    config:           &'a ChainConfig,
    position_id:      U256,
    block_timestamps: &'a BlockTimestamps
}

impl<'a, C: ChainReader + ?Sized> EventAggregator<'a, C> {
    pub fn new(
        chain: &'a C,
        config: &'a ChainConfig,
        position_id: U256,
        block_timestamps: &'a BlockTimestamps
    ) -> Self {
        Self { chain, config, position_id, block_timestamps }
    }

    /// All events of `kind` for the position, oldest first.
    pub async fn fetch_events(
        &self,
        kind: PositionEventKind,
        to_block: Option<u64>
    ) -> Result<Vec<PositionEvent>, PositionStatsError> {
        let filters = position_event_filters(
            self.config.position_manager_address,
            kind,
            self.position_id,
            self.config.deployment_block,
            to_block,
            self.config.log_chunk_size
        );

        let logs = futures::future::try_join_all(
            filters
                .iter()
                .map(async |filter| self.chain.logs(filter).await)
        )
        .await?;

        let mut events = logs
            .iter()
            .flatten()
            .map(PositionEvent::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        PositionEvent::sort(&mut events);

        debug!(
            position_id = %self.position_id,
            chain = %self.config.name,
            ?kind,
            count = events.len(),
            "fetched position events"
        );
        Ok(events)
    }

    /// unix seconds of the event's block
    pub async fn timestamp_of(&self, event: &PositionEvent) -> eyre::Result<u64> {
        let chain_id = self.config.chain_id;
        if let Some(timestamp) = event.block_timestamp() {
            self.block_timestamps
                .insert(chain_id, event.block_number(), timestamp);
            return Ok(timestamp);
        }
        self.block_timestamps
            .timestamp(self.chain, chain_id, event.block_number())
            .await
    }

    async fn record_timestamps(
        &self,
        totals: &mut EventTotals,
        events: &[PositionEvent]
    ) -> eyre::Result<()> {
        if let (Some(first), Some(last)) = (events.first(), events.last()) {
            totals.first_timestamp = Some(self.timestamp_of(first).await?);
            totals.last_timestamp = Some(self.timestamp_of(last).await?);
        }
        Ok(())
    }

    /// Sums increases or decreases, weighting the pool price at each event's
    /// block by the liquidity it moved.
    pub async fn aggregate<S: PoolSource + ?Sized>(
        &self,
        kind: PositionEventKind,
        events: &[PositionEvent],
        prices: &PoolPriceHistory<'_, S>
    ) -> Result<EventTotals, PositionStatsError> {
        let mut totals = EventTotals::empty(kind);
        let plus = Integer::ONE;

        for event in events {
            let sqrt_price_x96 = prices.sqrt_price_at(event.block_number()).await?;
            let liquidity = Natural::from(event.liquidity().unwrap_or_default());
            totals.accumulate(&plus, event.amounts(), liquidity, sqrt_price_x96);
        }

        totals.record_bounds(events);
        self.record_timestamps(&mut totals, events).await?;
        Ok(totals)
    }

    /// The fee ledger. Collects pay out fees and withdrawn principal together,
    /// so each collect is weighted by the liquidity its amounts would provide
    /// in the position's range, then every decrease is taken back out.
    pub async fn aggregate_collected<S: PoolSource + ?Sized>(
        &self,
        collects: &[PositionEvent],
        decreases: &[PositionEvent],
        tick_lower: i32,
        tick_upper: i32,
        prices: &PoolPriceHistory<'_, S>
    ) -> Result<EventTotals, PositionStatsError> {
        let sqrt_lower = u160_to_natural(get_sqrt_ratio_at_tick(tick_lower)?);
        let sqrt_upper = u160_to_natural(get_sqrt_ratio_at_tick(tick_upper)?);

        let mut totals = EventTotals::empty(PositionEventKind::Collect);
        let (plus, minus) = (Integer::ONE, -Integer::ONE);

        for event in collects {
            let sqrt_price_x96 = prices.sqrt_price_at(event.block_number()).await?;
            let (amount0, amount1) = event.amounts();
            let liquidity = liquidity_for_amounts(
                &u160_to_natural(sqrt_price_x96),
                &sqrt_lower,
                &sqrt_upper,
                &u256_to_natural(amount0),
                &u256_to_natural(amount1),
                true
            );
            totals.accumulate(&plus, event.amounts(), liquidity, sqrt_price_x96);
        }

        for event in decreases {
            let sqrt_price_x96 = prices.sqrt_price_at(event.block_number()).await?;
            let liquidity = Natural::from(event.liquidity().unwrap_or_default());
            totals.accumulate(&minus, event.amounts(), liquidity, sqrt_price_x96);
        }

        totals.record_bounds(collects);
        self.record_timestamps(&mut totals, collects).await?;
        Ok(totals)
    }

    /// Fees taken out since `since` (unix seconds): collects within the window
    /// minus decreases within it, clamped at zero per token.
    pub async fn collected_since(
        &self,
        collects: &[PositionEvent],
        decreases: &[PositionEvent],
        since: u64
    ) -> Result<[Integer; 2], PositionStatsError> {
        let mut sums = [Integer::ZERO, Integer::ZERO];

        for (events, sign) in [(collects, Integer::ONE), (decreases, -Integer::ONE)] {
            // newest first, stop at the first event outside the window
            for event in events.iter().rev() {
                if self.timestamp_of(event).await? < since {
                    break;
                }
                let (amount0, amount1) = event.amounts();
                sums[0] += Integer::from(u256_to_natural(amount0)) * &sign;
                sums[1] += Integer::from(u256_to_natural(amount1)) * &sign;
            }
        }

        Ok(sums.map(|sum| if sum < Integer::ZERO { Integer::ZERO } else { sum }))
    }
}
