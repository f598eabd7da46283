//! Treasury handlers: payment streams and split wallets.

use alloy_primitives::Address;
use daoscan_storage::{SplitWalletPatch, StreamPatch};
use error_stack::{Result, ResultExt};
use tracing::debug;

use super::{HandlerContext, HandlerError};

/// Streams are indexed only when the sender is a known DAO; anyone can
/// use the Sablier deployment.
pub(super) fn stream_created(
    ctx: &mut HandlerContext<'_>,
    stream_id: u64,
    sender: Address,
    recipient: Address,
    token: Address,
) -> Result<(), HandlerError> {
    let dao = ctx.dao_key(sender);
    if ctx
        .store
        .find_dao(&dao)
        .change_context(HandlerError::Store)?
        .is_none()
    {
        debug!(sender = %sender, stream_id, "stream sender is not an indexed dao");
        return Ok(());
    }

    let insert = StreamPatch {
        recipient: Some(recipient),
        token: Some(token),
        created_at: Some(ctx.block_timestamp),
    };
    let update = StreamPatch {
        recipient: Some(recipient),
        token: Some(token),
        ..Default::default()
    };
    ctx.store
        .upsert_stream(ctx.chain_id, stream_id, &dao, &insert, &update)
        .change_context(HandlerError::Store)
}

pub(super) fn split_created(
    ctx: &mut HandlerContext<'_>,
    split: Address,
    controller: Address,
) -> Result<(), HandlerError> {
    // Back-reference the controller when it is an indexed DAO.
    let dao_address = ctx
        .store
        .find_dao(&ctx.dao_key(controller))
        .change_context(HandlerError::Store)?
        .map(|row| row.key.address);

    let insert = SplitWalletPatch {
        controller: Some(controller),
        dao_address,
        created_at: Some(ctx.block_timestamp),
    };
    let update = SplitWalletPatch {
        controller: Some(controller),
        dao_address,
        ..Default::default()
    };
    ctx.store
        .upsert_split_wallet(ctx.chain_id, &split, &insert, &update)
        .change_context(HandlerError::Store)
}
