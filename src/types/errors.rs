use alloy_primitives::{Address, U160, U256};

#[derive(Debug, thiserror::Error)]
pub enum PositionStatsError {
    #[error("position {position_id} not found on {chain}")]
    PositionNotFound { chain: String, position_id: U256 },
    #[error("position {position_id} on {chain} could not be loaded: {reason}")]
    PositionDataError { chain: String, position_id: U256, reason: String },
    #[error("no pool for {token0:?}/{token1:?} at fee {fee} on {chain}")]
    PoolNotFound { chain: String, token0: Address, token1: Address, fee: u32 },
    #[error("tick {0} is outside the supported range")]
    InvalidTick(i32),
    #[error("sqrt price {0} is outside the supported range")]
    SqrtPriceOutOfRange(U160),
    #[error("sqrt price does not fit in 160 bits")]
    SqrtPriceOverflow,
    #[error("log decoding error: {0:?}")]
    LogDecode(#[from] alloy_sol_types::Error),
    #[error("unexpected log: {0}")]
    UnexpectedLog(String),
    #[error("block {0} not found")]
    MissingBlock(u64),
    #[error("chain error: {0:?}")]
    Chain(#[from] eyre::Report)
}

impl PositionStatsError {
    pub fn position_not_found(chain: &str, position_id: U256) -> Self {
        Self::PositionNotFound { chain: chain.to_string(), position_id }
    }

    pub fn position_data(chain: &str, position_id: U256, reason: impl ToString) -> Self {
        Self::PositionDataError { chain: chain.to_string(), position_id, reason: reason.to_string() }
    }

    /// Stable identifier for callers that map errors onto their own codes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PositionNotFound { .. } => "POSITION_NOT_FOUND",
            Self::PositionDataError { .. } => "POSITION_DATA_ERROR",
            Self::PoolNotFound { .. } => "POOL_NOT_FOUND",
            Self::InvalidTick(_) | Self::SqrtPriceOutOfRange(_) | Self::SqrtPriceOverflow => {
                "INVALID_PRICE"
            }
            Self::LogDecode(_) | Self::UnexpectedLog(_) => "LOG_DECODE_ERROR",
            Self::MissingBlock(_) | Self::Chain(_) => "CHAIN_ERROR"
        }
    }
}
