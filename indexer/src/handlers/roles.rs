//! Hats protocol handlers: role rows keyed by hat id.

use alloy_primitives::U256;
use daoscan_chain::reads;
use daoscan_storage::RolePatch;
use error_stack::{Result, ResultExt};
use tracing::debug;

use super::{registry::hat_tree_id, HandlerContext, HandlerError};

pub(super) async fn hat_created(
    ctx: &mut HandlerContext<'_>,
    hat_id: U256,
    details: String,
) -> Result<(), HandlerError> {
    let tree_id = hat_tree_id(hat_id);
    let Some(dao) = ctx
        .store
        .find_dao_by_tree_id(ctx.chain_id, tree_id)
        .change_context(HandlerError::Store)?
    else {
        debug!(tree_id, "hat created for a tree owned by no indexed dao");
        return Ok(());
    };

    // Hats can be revoked between emission and indexing; a role that no
    // longer exists on-chain must not survive as a row.
    let active = reads::is_active_hat(ctx.reader, ctx.log_address, hat_id)
        .await
        .change_context(HandlerError::ChainRead)?;
    if !active {
        ctx.store
            .delete_role(&dao.key, &hat_id)
            .change_context(HandlerError::Store)?;
        return Ok(());
    }

    let insert = RolePatch {
        details_cid: Some(details.clone()),
        created_at: Some(ctx.block_timestamp),
        ..Default::default()
    };
    let update = RolePatch {
        details_cid: Some(details),
        ..Default::default()
    };
    ctx.store
        .upsert_role(&dao.key, &hat_id, &insert, &update)
        .change_context(HandlerError::Store)
}
