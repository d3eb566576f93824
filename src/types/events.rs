use alloy_primitives::{Address, B256, U256};
use alloy_rpc_types::Log;
use alloy_sol_types::SolEvent;
use serde::{Deserialize, Serialize};

use super::{
    contracts::INonfungiblePositionManager::{Collect, DecreaseLiquidity, IncreaseLiquidity},
    errors::PositionStatsError
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionEventKind {
    Increase,
    Decrease,
    Collect
}

impl PositionEventKind {
    pub fn signature_hash(&self) -> B256 {
        match self {
            Self::Increase => IncreaseLiquidity::SIGNATURE_HASH,
            Self::Decrease => DecreaseLiquidity::SIGNATURE_HASH,
            Self::Collect => Collect::SIGNATURE_HASH
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityChange {
    pub block_number:    u64,
    pub log_index:       u64,
    pub block_timestamp: Option<u64>,
    pub liquidity:       u128,
    pub amount0:         U256,
    pub amount1:         U256
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeCollect {
    pub block_number:    u64,
    pub log_index:       u64,
    pub block_timestamp: Option<u64>,
    pub recipient:       Address,
    pub amount0:         U256,
    pub amount1:         U256
}

/// A position manager log for a single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionEvent {
    Increase(LiquidityChange),
    Decrease(LiquidityChange),
    Collect(FeeCollect)
}

impl PositionEvent {
    pub fn kind(&self) -> PositionEventKind {
        match self {
            Self::Increase(_) => PositionEventKind::Increase,
            Self::Decrease(_) => PositionEventKind::Decrease,
            Self::Collect(_) => PositionEventKind::Collect
        }
    }

    pub fn block_number(&self) -> u64 {
        match self {
            Self::Increase(e) | Self::Decrease(e) => e.block_number,
            Self::Collect(e) => e.block_number
        }
    }

    pub fn log_index(&self) -> u64 {
        match self {
            Self::Increase(e) | Self::Decrease(e) => e.log_index,
            Self::Collect(e) => e.log_index
        }
    }

    /// set when the node includes it in the log
    pub fn block_timestamp(&self) -> Option<u64> {
        match self {
            Self::Increase(e) | Self::Decrease(e) => e.block_timestamp,
            Self::Collect(e) => e.block_timestamp
        }
    }

    pub fn amounts(&self) -> (U256, U256) {
        match self {
            Self::Increase(e) | Self::Decrease(e) => (e.amount0, e.amount1),
            Self::Collect(e) => (e.amount0, e.amount1)
        }
    }

    /// `None` for collects, which carry no liquidity of their own
    pub fn liquidity(&self) -> Option<u128> {
        match self {
            Self::Increase(e) | Self::Decrease(e) => Some(e.liquidity),
            Self::Collect(_) => None
        }
    }

    fn ordering_key(&self) -> (u64, u64) {
        (self.block_number(), self.log_index())
    }

    pub fn sort(events: &mut [PositionEvent]) {
        events.sort_by_key(|event| event.ordering_key());
    }
}

impl TryFrom<&Log> for PositionEvent {
    type Error = PositionStatsError;

    fn try_from(log: &Log) -> Result<Self, Self::Error> {
        let block_number = log
            .block_number
            .ok_or_else(|| PositionStatsError::UnexpectedLog("log without a block number".into()))?;
        let log_index = log.log_index.unwrap_or_default();
        let block_timestamp = log.block_timestamp;

        let topic0 = log
            .topics()
            .first()
            .copied()
            .ok_or_else(|| PositionStatsError::UnexpectedLog("log without topics".into()))?;

        if topic0 == IncreaseLiquidity::SIGNATURE_HASH {
            let event = IncreaseLiquidity::decode_log_data(log.data())?;
            Ok(Self::Increase(LiquidityChange {
                block_number,
                log_index,
                block_timestamp,
                liquidity: event.liquidity,
                amount0: event.amount0,
                amount1: event.amount1
            }))
        } else if topic0 == DecreaseLiquidity::SIGNATURE_HASH {
            let event = DecreaseLiquidity::decode_log_data(log.data())?;
            Ok(Self::Decrease(LiquidityChange {
                block_number,
                log_index,
                block_timestamp,
                liquidity: event.liquidity,
                amount0: event.amount0,
                amount1: event.amount1
            }))
        } else if topic0 == Collect::SIGNATURE_HASH {
            let event = Collect::decode_log_data(log.data())?;
            Ok(Self::Collect(FeeCollect {
                block_number,
                log_index,
                block_timestamp,
                recipient: event.recipient,
                amount0: event.amount0,
                amount1: event.amount1
            }))
        } else {
            Err(PositionStatsError::UnexpectedLog(format!("unknown event signature {topic0:?}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;
    use crate::test_utils::rpc_log;

    #[test]
    fn test_parse_increase() {
        let event = IncreaseLiquidity {
            tokenId:   U256::from(7u8),
            liquidity: 1_000,
            amount0:   U256::from(10u8),
            amount1:   U256::from(20u8)
        };
        let log = rpc_log(Address::ZERO, &event, 100, 3);

        let parsed = PositionEvent::try_from(&log).unwrap();
        assert_eq!(parsed.kind(), PositionEventKind::Increase);
        assert_eq!(parsed.block_number(), 100);
        assert_eq!(parsed.log_index(), 3);
        assert_eq!(parsed.liquidity(), Some(1_000));
        assert_eq!(parsed.amounts(), (U256::from(10u8), U256::from(20u8)));
    }

    #[test]
    fn test_parse_collect() {
        let recipient = address!("00000000000000000000000000000000000000aa");
        let event = Collect {
            tokenId: U256::from(7u8),
            recipient,
            amount0: U256::from(1u8),
            amount1: U256::ZERO
        };

        let parsed = PositionEvent::try_from(&rpc_log(Address::ZERO, &event, 5, 0)).unwrap();
        assert!(matches!(
            parsed,
            PositionEvent::Collect(FeeCollect { recipient: r, .. }) if r == recipient
        ));
        assert_eq!(parsed.liquidity(), None);
    }

    #[test]
    fn test_rejects_foreign_and_pending_logs() {
        use crate::types::contracts::INonfungiblePositionManager::Transfer;

        let transfer =
            Transfer { from: Address::ZERO, to: Address::ZERO, tokenId: U256::from(1u8) };
        let log = rpc_log(Address::ZERO, &transfer, 1, 0);
        assert!(matches!(
            PositionEvent::try_from(&log),
            Err(PositionStatsError::UnexpectedLog(_))
        ));

        let decrease = DecreaseLiquidity {
            tokenId:   U256::from(1u8),
            liquidity: 1,
            amount0:   U256::ZERO,
            amount1:   U256::ZERO
        };
        let mut pending = rpc_log(Address::ZERO, &decrease, 1, 0);
        pending.block_number = None;
        assert!(PositionEvent::try_from(&pending).is_err());
    }

    #[test]
    fn test_sort_by_block_then_index() {
        let change = |block_number, log_index| {
            PositionEvent::Increase(LiquidityChange {
                block_number,
                log_index,
                block_timestamp: None,
                liquidity: 1,
                amount0: U256::ZERO,
                amount1: U256::ZERO
            })
        };

        let mut events = vec![change(9, 0), change(3, 5), change(3, 1)];
        PositionEvent::sort(&mut events);
        let keys: Vec<_> = events.iter().map(|e| (e.block_number(), e.log_index())).collect();
        assert_eq!(keys, vec![(3, 1), (3, 5), (9, 0)]);
    }
}
