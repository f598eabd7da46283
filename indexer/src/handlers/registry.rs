//! FractalRegistry and KeyValuePairs handlers: DAO registration and
//! metadata.

use alloy_primitives::{Address, U256};
use daoscan_chain::reads;
use daoscan_storage::DaoPatch;
use error_stack::{Result, ResultExt};
use tracing::{debug, warn};

use super::{HandlerContext, HandlerError};

/// Create or rename a DAO. The row is written first and validated
/// after: if the address does not answer `getThreshold()` like a Safe,
/// the row is deleted again.
pub(super) async fn dao_name_updated(
    ctx: &mut HandlerContext<'_>,
    dao: Address,
    name: String,
) -> Result<(), HandlerError> {
    let key = ctx.dao_key(dao);
    let now = ctx.block_timestamp;
    let insert = DaoPatch {
        name: Some(name.clone()),
        created_at: Some(now),
        updated_at: Some(now),
        ..Default::default()
    };
    let update = DaoPatch {
        name: Some(name),
        updated_at: Some(now),
        ..Default::default()
    };
    ctx.store
        .upsert_dao(&key, &insert, &update)
        .change_context(HandlerError::Store)?;

    if !reads::is_safe(ctx.reader, dao).await {
        warn!(dao = %key, "registered address is not a safe, removing dao");
        ctx.store
            .delete_dao(&key)
            .change_context(HandlerError::Store)?;
    }
    Ok(())
}

/// Weak parent back-reference; the parent DAO may not be indexed yet and
/// that is fine.
pub(super) fn sub_dao_declared(
    ctx: &mut HandlerContext<'_>,
    parent: Address,
    child: Address,
) -> Result<(), HandlerError> {
    let key = ctx.dao_key(child);
    let now = ctx.block_timestamp;
    let insert = DaoPatch {
        sub_dao_of: Some(parent),
        created_at: Some(now),
        updated_at: Some(now),
        ..Default::default()
    };
    let update = DaoPatch {
        sub_dao_of: Some(parent),
        updated_at: Some(now),
        ..Default::default()
    };
    ctx.store
        .upsert_dao(&key, &insert, &update)
        .change_context(HandlerError::Store)
}

pub(super) fn dao_value_updated(
    ctx: &mut HandlerContext<'_>,
    dao: Address,
    key: &str,
    value: &str,
) -> Result<(), HandlerError> {
    let mut patch = DaoPatch {
        updated_at: Some(ctx.block_timestamp),
        ..Default::default()
    };
    match key {
        "proposalTemplates" => patch.proposal_templates_cid = Some(value.to_string()),
        "snapshotENS" => patch.snapshot_ens = Some(value.to_string()),
        "topHatId" => {
            let hat_id: U256 = value
                .parse::<U256>()
                .change_context(HandlerError::InvalidPayload)
                .attach_printable("topHatId is not an integer")?;
            patch.top_hat_id = Some(hat_id);
            patch.tree_id = Some(hat_tree_id(hat_id));
        }
        "hatsTreeId" => {
            patch.tree_id = Some(
                value
                    .parse::<u64>()
                    .change_context(HandlerError::InvalidPayload)
                    .attach_printable("hatsTreeId is not an integer")?,
            );
        }
        "erc20Address" => {
            patch.erc20_address = Some(
                value
                    .parse::<Address>()
                    .change_context(HandlerError::InvalidPayload)
                    .attach_printable("erc20Address is not an address")?,
            );
        }
        "gaslessVotingEnabled" => patch.gas_tank_enabled = Some(value == "true"),
        "gasTankAddress" => {
            patch.gas_tank_address = Some(
                value
                    .parse::<Address>()
                    .change_context(HandlerError::InvalidPayload)
                    .attach_printable("gasTankAddress is not an address")?,
            );
        }
        _ => {
            debug!(key, "ignoring unknown key-value pair");
            return Ok(());
        }
    }

    let dao_key = ctx.dao_key(dao);
    let mut insert = patch.clone();
    insert.created_at = Some(ctx.block_timestamp);
    ctx.store
        .upsert_dao(&dao_key, &insert, &patch)
        .change_context(HandlerError::Store)
}

/// The hat tree id is the top 32 bits of a hat id.
pub(super) fn hat_tree_id(hat_id: U256) -> u64 {
    (hat_id >> 224usize).to::<u64>()
}
