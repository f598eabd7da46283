//! Voting strategy handlers: proposal voting windows, parameter updates,
//! and token registration.

use alloy_primitives::{Address, U256};
use daoscan_chain::reads;
use daoscan_storage::{ProposalPatch, TokenType, VotingStrategyPatch, VotingTokenPatch};
use error_stack::{Result, ResultExt};

use super::{HandlerContext, HandlerError};

/// Record the voting end block of a freshly created proposal.
///
/// Emitted in the same transaction as `Azorius::ProposalCreated`, so the
/// owning DAO usually comes from the correlation context. The fallback
/// is the two-hop read strategy → module → avatar.
pub(super) async fn proposal_initialized(
    ctx: &mut HandlerContext<'_>,
    proposal_id: u64,
    voting_end_block: u64,
) -> Result<(), HandlerError> {
    let dao = match ctx.correlation.proposal_dao(proposal_id) {
        Some(dao) => dao,
        None => {
            let module = owning_module(ctx, ctx.log_address).await?;
            ctx.module_dao(module).await?
        }
    };
    let patch = ProposalPatch {
        voting_end_block: Some(voting_end_block),
        ..Default::default()
    };
    ctx.store
        .upsert_proposal(&dao, proposal_id, &patch, &patch)
        .change_context(HandlerError::Store)
}

/// Apply one field update to the strategy emitting the event.
pub(super) async fn patch_strategy(
    ctx: &mut HandlerContext<'_>,
    set: impl FnOnce(&mut VotingStrategyPatch),
) -> Result<(), HandlerError> {
    let strategy = ctx.log_address;
    let module = owning_module(ctx, strategy).await?;
    let mut patch = VotingStrategyPatch {
        updated_at: Some(ctx.block_timestamp),
        ..Default::default()
    };
    set(&mut patch);
    let mut insert = patch.clone();
    insert.created_at = Some(ctx.block_timestamp);
    ctx.store
        .upsert_voting_strategy(&strategy, &module, &insert, &patch)
        .change_context(HandlerError::Store)
}

pub(super) fn governance_token_added(
    ctx: &mut HandlerContext<'_>,
    token: Address,
    weight: U256,
    token_type: TokenType,
) -> Result<(), HandlerError> {
    let patch = VotingTokenPatch {
        weight: Some(weight),
    };
    ctx.store
        .upsert_voting_token(&token, &ctx.log_address, token_type, &patch, &patch)
        .change_context(HandlerError::Store)
}

pub(super) fn governance_token_removed(
    ctx: &mut HandlerContext<'_>,
    token: Address,
) -> Result<(), HandlerError> {
    ctx.store
        .delete_voting_token(&token, &ctx.log_address)
        .change_context(HandlerError::Store)
}

/// Owner module of a strategy, from the indexed row or an
/// `azoriusModule()` read.
async fn owning_module(
    ctx: &mut HandlerContext<'_>,
    strategy: Address,
) -> Result<Address, HandlerError> {
    if let Some(row) = ctx
        .store
        .find_voting_strategy(&strategy)
        .change_context(HandlerError::Store)?
    {
        return Ok(row.governance_module_address);
    }
    reads::strategy_azorius_module(ctx.reader, strategy, Some(ctx.block_number))
        .await
        .change_context(HandlerError::ChainRead)
        .attach_printable("failed to resolve owning module for strategy")
}
