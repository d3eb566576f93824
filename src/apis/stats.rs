use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH}
};

use alloy_primitives::{Address, U256};
use malachite::num::basic::traits::Zero;
use malachite_q::Rational;
use tracing::{debug, info};

use super::events::{BlockTimestamps, EventAggregator, EventTotals, PoolPriceHistory};
use crate::{
    providers::PositionDataProvider,
    types::{
        ChainConfig, CurrencyAmount, PositionEventKind, PositionInfo, PositionSnapshot, Price,
        Token,
        errors::PositionStatsError,
        math::{
            SECONDS_PER_DAY, apr, break_even_days, current_amounts, duration_held_ms,
            impermanent_loss, is_valid_tick_range, price_from_sqrt_ratio, sqrt_price_to_price,
            tick_to_price, yield_per_day
        }
    }
};

pub(crate) fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Derives a [`PositionSnapshot`] for positions of one deployment.
#[derive(Debug, Clone)]
pub struct StatsEngine<P> {
    provider:         P,
    config:           ChainConfig,
    block_timestamps: Arc<BlockTimestamps>
}

impl<P: PositionDataProvider> StatsEngine<P> {
    pub fn new(provider: P, config: ChainConfig) -> Self {
        Self { provider, config, block_timestamps: Arc::new(BlockTimestamps::new()) }
    }

    /// Shares a timestamp table with other engines.
    pub fn with_block_timestamps(mut self, block_timestamps: Arc<BlockTimestamps>) -> Self {
        self.block_timestamps = block_timestamps;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn block_timestamps(&self) -> &Arc<BlockTimestamps> {
        &self.block_timestamps
    }

    pub async fn position_stats(
        &self,
        position_id: U256
    ) -> Result<PositionSnapshot, PositionStatsError> {
        self.position_stats_at(position_id, unix_now_ms()).await
    }

    /// Snapshot as of `now_ms` (ms since the epoch). Chain state is always
    /// read at the head, `now_ms` only drives durations and the daily window.
    pub async fn position_stats_at(
        &self,
        position_id: U256,
        now_ms: u64
    ) -> Result<PositionSnapshot, PositionStatsError> {
        let chain = self.config.name.as_str();
        info!(%position_id, %chain, "computing position stats");

        let (owner, position) = self.load_position(position_id).await?;
        let (token0, token1) = tokio::try_join!(
            self.provider.token(position.token0),
            self.provider.token(position.token1)
        )?;

        let lower_tick_price = tick_to_price(&token0, &token1, position.tick_lower)?;
        let upper_tick_price = tick_to_price(&token0, &token1, position.tick_upper)?;

        let pool = self.pool_address(position_id, &position).await?;
        let sqrt_price_x96 = self.provider.slot0_sqrt_price(pool, None).await?;
        let current_price = sqrt_price_to_price(sqrt_price_x96, &token0, &token1);
        let current = current_amounts(
            position.liquidity,
            sqrt_price_x96,
            position.tick_lower,
            position.tick_upper,
            &token0,
            &token1
        )?;

        let fees = self.provider.uncollected_fees(position_id, owner).await?;
        let uncollected = [
            CurrencyAmount::from_u256(token0.clone(), fees.amount0),
            CurrencyAmount::from_u256(token1.clone(), fees.amount1)
        ];
        debug!(%position_id, %chain, %pool, %current_price, "loaded pool state");

        let to_block = match self.config.log_chunk_size {
            Some(_) => Some(self.provider.block_number().await?),
            None => None
        };
        let aggregator = EventAggregator::new(
            &self.provider,
            &self.config,
            position_id,
            self.block_timestamps.as_ref()
        );
        let (increases, decreases, collects) = tokio::try_join!(
            aggregator.fetch_events(PositionEventKind::Increase, to_block),
            aggregator.fetch_events(PositionEventKind::Decrease, to_block),
            aggregator.fetch_events(PositionEventKind::Collect, to_block)
        )?;

        let prices = PoolPriceHistory::new(&self.provider, pool);
        let (deposits, withdrawals, fee_ledger) = tokio::try_join!(
            aggregator.aggregate(PositionEventKind::Increase, &increases, &prices),
            aggregator.aggregate(PositionEventKind::Decrease, &decreases, &prices),
            aggregator.aggregate_collected(
                &collects,
                &decreases,
                position.tick_lower,
                position.tick_upper,
                &prices
            )
        )?;
        debug!(
            %position_id,
            %chain,
            increases = increases.len(),
            decreases = decreases.len(),
            collects = collects.len(),
            price_lookups = prices.len(),
            "aggregated position history"
        );

        let (avg_deposit_sqrt_price, Some(opened_secs)) =
            (deposits.avg_sqrt_price_x96(), deposits.first_timestamp)
        else {
            return Err(PositionStatsError::position_data(chain, position_id, "no deposit history"));
        };
        let Some(avg_deposit_sqrt_price) = avg_deposit_sqrt_price else {
            return Err(PositionStatsError::position_data(
                chain,
                position_id,
                "deposited liquidity is zero"
            ));
        };

        let deposited = deposits.amounts(&token0, &token1);
        let avg_deposit_price = price_from_sqrt_ratio(&avg_deposit_sqrt_price, &token0, &token1);
        let withdrawn = withdrawals.amounts(&token0, &token1);
        let avg_withdrawn_price = average_price(&withdrawals, &token0, &token1);
        let collected = fee_ledger.amounts(&token0, &token1);
        let avg_collected_price = average_price(&fee_ledger, &token0, &token1);

        let total_yield = [&collected[0] + &uncollected[0], &collected[1] + &uncollected[1]];
        let avg_yield_price = blend_yield_price(
            &current_price,
            avg_collected_price.as_ref(),
            &collected,
            &uncollected
        );

        let date_opened = opened_secs * 1000;
        let date_closed = withdrawals.last_timestamp.map(|secs| secs * 1000);
        let duration_held_ms = duration_held_ms(date_opened, date_closed, now_ms);
        let yield_per_day = total_yield
            .each_ref()
            .map(|total| yield_per_day(total, duration_held_ms));
        let yearly = [apr(&yield_per_day[0], &deposited[0]), apr(&yield_per_day[1], &deposited[1])];

        let impermanent_loss_lower = impermanent_loss(&avg_deposit_price, &lower_tick_price);
        let impermanent_loss_upper = impermanent_loss(&avg_deposit_price, &upper_tick_price);
        let deposited_value = quote_value(&avg_deposit_price, &deposited);
        let yield_value = quote_value(&avg_yield_price, &yield_per_day);
        let break_even_days_lower =
            break_even_days(impermanent_loss_lower, yield_value, deposited_value);
        let break_even_days_upper =
            break_even_days(impermanent_loss_upper, yield_value, deposited_value);

        let since = (now_ms / 1000).saturating_sub(SECONDS_PER_DAY);
        let [daily0, daily1] = aggregator
            .collected_since(&collects, &decreases, since)
            .await?;
        let daily_collected = [
            CurrencyAmount::from_integer(token0.clone(), &daily0),
            CurrencyAmount::from_integer(token1.clone(), &daily1)
        ];
        let daily_apr = [
            apr(&daily_collected[0], &deposited[0]),
            apr(&daily_collected[1], &deposited[1])
        ];

        info!(
            %position_id,
            %chain,
            duration_held_ms,
            impermanent_loss_lower,
            impermanent_loss_upper,
            "computed position stats"
        );

        Ok(PositionSnapshot {
            position_id,
            chain_id: self.config.chain_id,
            lower_tick_price,
            upper_tick_price,
            current_price,
            uncollected,
            current,
            deposited,
            avg_deposit_price,
            withdrawn,
            avg_withdrawn_price,
            collected,
            avg_collected_price,
            total_yield,
            avg_yield_price,
            date_opened,
            date_closed,
            duration_held_ms,
            yield_per_day,
            apr: yearly,
            impermanent_loss_lower,
            impermanent_loss_upper,
            break_even_days_lower,
            break_even_days_upper,
            daily_collected,
            daily_apr
        })
    }

    async fn load_position(
        &self,
        position_id: U256
    ) -> Result<(Address, PositionInfo), PositionStatsError> {
        let chain = self.config.name.as_str();

        let owner = self.provider.owner_of(position_id).await.map_err(|err| {
            debug!(%position_id, %chain, %err, "owner lookup failed");
            PositionStatsError::position_not_found(chain, position_id)
        })?;
        let position = self
            .provider
            .position(position_id)
            .await
            .map_err(|err| PositionStatsError::position_data(chain, position_id, err))?;

        if !is_valid_tick_range(position.tick_lower, position.tick_upper) {
            debug!(
                %position_id,
                %chain,
                tick_lower = position.tick_lower,
                tick_upper = position.tick_upper,
                "position has an invalid tick range"
            );
            return Err(PositionStatsError::position_data(chain, position_id, "invalid tick range"));
        }

        Ok((owner, position))
    }

    async fn pool_address(
        &self,
        position_id: U256,
        position: &PositionInfo
    ) -> Result<Address, PositionStatsError> {
        let pool = self
            .provider
            .pool_address(position.token0, position.token1, position.fee)
            .await?;

        if pool == Address::ZERO {
            debug!(%position_id, chain = %self.config.name, "position pool not deployed");
            return Err(PositionStatsError::PoolNotFound {
                chain:  self.config.name.clone(),
                token0: position.token0,
                token1: position.token1,
                fee:    position.fee
            });
        }
        Ok(pool)
    }
}

fn average_price(totals: &EventTotals, token0: &Token, token1: &Token) -> Option<Price> {
    totals
        .avg_sqrt_price_x96()
        .map(|sqrt_price| price_from_sqrt_ratio(&sqrt_price, token0, token1))
}

/// whole quote tokens, `0.0` when the amounts are in neither token
fn quote_value(price: &Price, amounts: &[CurrencyAmount; 2]) -> f64 {
    price
        .value_in_quote(amounts)
        .map(|value| value.to_f64())
        .unwrap_or_default()
}

/// Collected fees valued at their average price, fees still owed at the
/// current one.
fn blend_yield_price(
    current: &Price,
    avg_collected: Option<&Price>,
    collected: &[CurrencyAmount; 2],
    uncollected: &[CurrencyAmount; 2]
) -> Price {
    let Some(avg_collected) = avg_collected else { return current.clone() };
    let (Some(collected_weight), Some(uncollected_weight)) =
        (avg_collected.value_in_quote(collected), current.value_in_quote(uncollected))
    else {
        return current.clone();
    };

    let collected_weight = collected_weight.clamp_non_negative().raw;
    let uncollected_weight = uncollected_weight.clamp_non_negative().raw;
    let total = &collected_weight + &uncollected_weight;
    if total <= Rational::ZERO {
        return current.clone();
    }

    let raw = (&avg_collected.raw * collected_weight + &current.raw * uncollected_weight) / total;
    Price::new(current.base.clone(), current.quote.clone(), raw)
}
