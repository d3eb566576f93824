use alloy_eips::{BlockId, BlockNumberOrTag};
use alloy_primitives::{Address, B256, TxKind, U256};
use alloy_provider::Provider;
use alloy_rpc_types::{Filter, TransactionInput, TransactionRequest};
use alloy_sol_types::{SolCall, SolEvent};

use crate::types::{PositionEventKind, contracts::INonfungiblePositionManager::Transfer};

pub(crate) async fn view_call<P, IC>(
    provider: &P,
    block_number: Option<u64>,
    from: Option<Address>,
    contract: Address,
    call: IC
) -> eyre::Result<IC::Return>
where
    P: Provider,
    IC: SolCall + Send
{
    let tx = TransactionRequest {
        from,
        to: Some(TxKind::Call(contract)),
        input: TransactionInput::both(call.abi_encode().into()),
        ..Default::default()
    };

    let data = provider
        .call(tx)
        .block(block_number.map(Into::into).unwrap_or(BlockId::latest()))
        .await?;
    Ok(IC::abi_decode_returns(&data)?)
}

/// Splits `[start_block, end_block]` into inclusive ranges of at most
/// `chunk_size` blocks. Without an end block (or a chunk size) the whole range
/// up to the chain head is a single request.
pub(crate) fn chunk_blocks(
    start_block: u64,
    end_block: Option<u64>,
    chunk_size: Option<u64>
) -> Vec<(BlockNumberOrTag, BlockNumberOrTag)> {
    let Some(end_block) = end_block else {
        return vec![(start_block.into(), BlockNumberOrTag::Latest)];
    };
    let Some(chunk_size) = chunk_size.map(|size| size.max(1)) else {
        return vec![(start_block.into(), end_block.into())];
    };

    let mut tags = Vec::new();
    let mut start_block = start_block;
    while end_block.saturating_sub(start_block) >= chunk_size {
        tags.push((start_block.into(), (start_block + chunk_size - 1).into()));
        start_block += chunk_size;
    }
    if start_block <= end_block {
        tags.push((start_block.into(), end_block.into()));
    }
    tags
}

/// Filters for one event kind of one position, chunked per [`chunk_blocks`].
pub(crate) fn position_event_filters(
    position_manager: Address,
    kind: PositionEventKind,
    position_id: U256,
    start_block: u64,
    end_block: Option<u64>,
    chunk_size: Option<u64>
) -> Vec<Filter> {
    chunk_blocks(start_block, end_block, chunk_size)
        .into_iter()
        .map(|(s, e)| {
            Filter::new()
                .event_signature(kind.signature_hash())
                .address(position_manager)
                .topic1(B256::from(position_id))
                .from_block(s)
                .to_block(e)
        })
        .collect()
}

/// Any position manager log touching `position_id` in `[start_block,
/// end_block]`: liquidity changes and collects index it as topic1, transfers as
/// topic3.
pub(crate) fn position_activity_filters(
    position_manager: Address,
    position_id: U256,
    start_block: u64,
    end_block: u64
) -> [Filter; 2] {
    let lifecycle = Filter::new()
        .address(position_manager)
        .event_signature(vec![
            PositionEventKind::Increase.signature_hash(),
            PositionEventKind::Decrease.signature_hash(),
            PositionEventKind::Collect.signature_hash()
        ])
        .topic1(B256::from(position_id))
        .from_block(start_block)
        .to_block(end_block);

    let transfers = Filter::new()
        .address(position_manager)
        .event_signature(Transfer::SIGNATURE_HASH)
        .topic3(B256::from(position_id))
        .from_block(start_block)
        .to_block(end_block);

    [lifecycle, transfers]
}
