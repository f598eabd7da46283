//! Freeze guard, freeze voting, and Safe execution handlers.

use alloy_primitives::{Address, B256};
use daoscan_chain::reads;
use daoscan_storage::{
    DaoPatch, FreezeVotingStrategyPatch, GovernanceGuardPatch, GovernanceGuardRow,
    SafeProposalExecutionPatch,
};
use error_stack::{Report, Result, ResultExt};

use super::{HandlerContext, HandlerError};

/// Attach a freeze guard to its child DAO and point the DAO row at it.
/// DAOs rotate guards; the newest setup wins through `updated_at`.
pub(super) async fn freeze_guard_setup(
    ctx: &mut HandlerContext<'_>,
    child_safe: Address,
) -> Result<(), HandlerError> {
    let guard = ctx.log_address;
    let dao = ctx.dao_key(child_safe);
    let (timelock_period, execution_period) =
        reads::guard_periods(ctx.reader, guard, Some(ctx.block_number))
            .await
            .change_context(HandlerError::ChainRead)
            .attach_printable("failed to read guard periods")?;

    let now = ctx.block_timestamp;
    let insert = GovernanceGuardPatch {
        timelock_period: Some(timelock_period),
        execution_period: Some(execution_period),
        created_at: Some(now),
        updated_at: Some(now),
    };
    let update = GovernanceGuardPatch {
        timelock_period: Some(timelock_period),
        execution_period: Some(execution_period),
        updated_at: Some(now),
        ..Default::default()
    };
    ctx.store
        .upsert_governance_guard(&dao, &guard, &insert, &update)
        .change_context(HandlerError::Store)?;

    let dao_insert = DaoPatch {
        guard_address: Some(guard),
        created_at: Some(now),
        updated_at: Some(now),
        ..Default::default()
    };
    let dao_update = DaoPatch {
        guard_address: Some(guard),
        updated_at: Some(now),
        ..Default::default()
    };
    ctx.store
        .upsert_dao(&dao, &dao_insert, &dao_update)
        .change_context(HandlerError::Store)
}

/// Apply one period update to the guard emitting the event. The guard
/// must already be indexed: without its setup event there is no DAO to
/// key the row by.
pub(super) fn patch_guard(
    ctx: &mut HandlerContext<'_>,
    set: impl FnOnce(&mut GovernanceGuardPatch),
) -> Result<(), HandlerError> {
    let guard = known_guard(ctx)?;
    let mut patch = GovernanceGuardPatch {
        updated_at: Some(ctx.block_timestamp),
        ..Default::default()
    };
    set(&mut patch);
    ctx.store
        .upsert_governance_guard(&guard.dao, &guard.address, &patch, &patch)
        .change_context(HandlerError::Store)
}

/// A guarded Safe transaction entered its timelock.
pub(super) fn transaction_timelocked(
    ctx: &mut HandlerContext<'_>,
    safe_tx_hash: B256,
) -> Result<(), HandlerError> {
    let guard = known_guard(ctx)?;
    let patch = SafeProposalExecutionPatch {
        timelocked_block: Some(ctx.block_number),
        ..Default::default()
    };
    ctx.store
        .upsert_safe_proposal_execution(&guard.dao, &safe_tx_hash, &patch, &patch)
        .change_context(HandlerError::Store)
}

/// Apply one field update to the freeze voting strategy emitting the
/// event. Requires the indexed row for its vote type.
pub(super) fn patch_freeze_voting(
    ctx: &mut HandlerContext<'_>,
    set: impl FnOnce(&mut FreezeVotingStrategyPatch),
) -> Result<(), HandlerError> {
    let strategy = ctx.log_address;
    let row = ctx
        .store
        .find_freeze_voting_strategy(&strategy)
        .change_context(HandlerError::Store)?
        .ok_or_else(|| {
            Report::new(HandlerError::MissingDependency)
                .attach_printable(format!("freeze voting strategy {strategy:#x} is not indexed"))
        })?;
    let mut patch = FreezeVotingStrategyPatch {
        updated_at: Some(ctx.block_timestamp),
        ..Default::default()
    };
    set(&mut patch);
    ctx.store
        .upsert_freeze_voting_strategy(&strategy, row.freeze_vote_type, &patch, &patch)
        .change_context(HandlerError::Store)
}

/// A Safe executed a transaction. The emitting address is the Safe, which
/// is the DAO key; the multisig proposal row (written by the API layer)
/// correlates by `safe_tx_hash`.
pub(super) fn safe_execution_success(
    ctx: &mut HandlerContext<'_>,
    safe_tx_hash: B256,
) -> Result<(), HandlerError> {
    let dao = ctx.dao_key(ctx.log_address);
    let patch = SafeProposalExecutionPatch {
        executed_tx_hash: Some(ctx.transaction_hash),
        executed_block: Some(ctx.block_number),
        ..Default::default()
    };
    ctx.store
        .upsert_safe_proposal_execution(&dao, &safe_tx_hash, &patch, &patch)
        .change_context(HandlerError::Store)
}

fn known_guard(ctx: &HandlerContext<'_>) -> Result<GovernanceGuardRow, HandlerError> {
    let guard = ctx.log_address;
    ctx.store
        .find_guard_by_address(ctx.chain_id, &guard)
        .change_context(HandlerError::Store)?
        .ok_or_else(|| {
            Report::new(HandlerError::MissingDependency)
                .attach_printable(format!("guard {guard:#x} is not indexed"))
        })
}
