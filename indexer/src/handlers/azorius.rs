//! Azorius module handlers: proposals and module period updates.

use alloy_primitives::Address;
use daoscan_storage::{GovernanceModulePatch, ModuleType, ProposalPatch, ProposalTransaction};
use error_stack::{Result, ResultExt};
use tracing::debug;

use super::{HandlerContext, HandlerError};

pub(super) async fn proposal_created(
    ctx: &mut HandlerContext<'_>,
    proposal_id: u64,
    proposer: Address,
    strategy: Address,
    transactions: Vec<ProposalTransaction>,
    metadata: &str,
) -> Result<(), HandlerError> {
    let module = ctx.log_address;
    let dao = ctx.module_dao(module).await?;
    // Strategy events in the same transaction look the proposal up here.
    ctx.correlation.remember_proposal(proposal_id, dao);

    if is_executed(ctx, &dao, proposal_id)? {
        debug!(dao = %dao, proposal_id, "proposal already executed, ignoring replayed creation");
        return Ok(());
    }

    let (title, description) = parse_metadata(metadata);
    let patch = ProposalPatch {
        proposer: Some(proposer),
        voting_strategy_address: Some(strategy),
        transactions: Some(transactions),
        title,
        description,
        created_at: Some(ctx.block_timestamp),
        proposed_tx_hash: Some(ctx.transaction_hash),
        ..Default::default()
    };
    ctx.store
        .upsert_proposal(&dao, proposal_id, &patch, &patch)
        .change_context(HandlerError::Store)
}

pub(super) async fn proposal_executed(
    ctx: &mut HandlerContext<'_>,
    proposal_id: u64,
) -> Result<(), HandlerError> {
    let module = ctx.log_address;
    let dao = ctx.module_dao(module).await?;

    if is_executed(ctx, &dao, proposal_id)? {
        return Ok(());
    }

    let patch = ProposalPatch {
        executed_tx_hash: Some(ctx.transaction_hash),
        ..Default::default()
    };
    ctx.store
        .upsert_proposal(&dao, proposal_id, &patch, &patch)
        .change_context(HandlerError::Store)
}

pub(super) async fn timelock_period_updated(
    ctx: &mut HandlerContext<'_>,
    timelock_period: u64,
) -> Result<(), HandlerError> {
    let patch = GovernanceModulePatch {
        timelock_period: Some(timelock_period),
        updated_at: Some(ctx.block_timestamp),
        ..Default::default()
    };
    patch_module(ctx, patch).await
}

pub(super) async fn execution_period_updated(
    ctx: &mut HandlerContext<'_>,
    execution_period: u64,
) -> Result<(), HandlerError> {
    let patch = GovernanceModulePatch {
        execution_period: Some(execution_period),
        updated_at: Some(ctx.block_timestamp),
        ..Default::default()
    };
    patch_module(ctx, patch).await
}

async fn patch_module(
    ctx: &mut HandlerContext<'_>,
    patch: GovernanceModulePatch,
) -> Result<(), HandlerError> {
    let module = ctx.log_address;
    // Prefer the indexed owner; fall back to an avatar read when the
    // period update arrives before the factory event was processed.
    let dao = match ctx
        .store
        .find_governance_module(&module)
        .change_context(HandlerError::Store)?
    {
        Some(row) => row.dao,
        None => ctx.module_dao(module).await?,
    };
    let mut insert = patch.clone();
    insert.created_at = Some(ctx.block_timestamp);
    ctx.store
        .upsert_governance_module(&module, &dao, ModuleType::Azorius, &insert, &patch)
        .change_context(HandlerError::Store)
}

fn is_executed(
    ctx: &HandlerContext<'_>,
    dao: &daoscan_common::DaoKey,
    proposal_id: u64,
) -> Result<bool, HandlerError> {
    Ok(ctx
        .store
        .find_proposal(dao, proposal_id)
        .change_context(HandlerError::Store)?
        .map(|row| row.is_executed())
        .unwrap_or(false))
}

/// Proposal metadata is a JSON document `{"title": …, "description": …}`
/// submitted by the proposer; anything unparseable leaves both unset.
fn parse_metadata(metadata: &str) -> (Option<String>, Option<String>) {
    match serde_json::from_str::<serde_json::Value>(metadata) {
        Ok(value) => (
            value
                .get("title")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            value
                .get("description")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        ),
        Err(_) => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_metadata;

    #[test]
    fn metadata_parses_title_and_description() {
        let (title, description) =
            parse_metadata(r#"{"title":"Fund grants","description":"Q3 budget"}"#);
        assert_eq!(title.as_deref(), Some("Fund grants"));
        assert_eq!(description.as_deref(), Some("Q3 budget"));
    }

    #[test]
    fn malformed_metadata_leaves_fields_unset() {
        assert_eq!(parse_metadata("not json"), (None, None));
        assert_eq!(parse_metadata("[1,2]"), (None, None));
    }
}
