//! Factory child classification: probe the deployed proxy and create the
//! matching entity.

use alloy_primitives::{Address, U256};
use daoscan_chain::{
    probe::{probe_contract, ProbedContract},
    reads,
};
use daoscan_storage::{
    FreezeVoteType, FreezeVotingStrategyPatch, GovernanceModulePatch, ModuleType, TokenType,
    VotingStrategyPatch, VotingTokenPatch,
};
use error_stack::{Result, ResultExt};
use tracing::{debug, info};

use super::{HandlerContext, HandlerError};

pub(super) async fn module_proxy_created(
    ctx: &mut HandlerContext<'_>,
    proxy: Address,
) -> Result<(), HandlerError> {
    let probed = probe_contract(ctx.reader, proxy, Some(ctx.block_number))
        .await
        .change_context(HandlerError::ChainRead)
        .attach_printable("failed to probe factory child")?;
    debug!(address = %proxy, ?probed, "classified factory child");

    match probed {
        ProbedContract::Azorius => azorius_module(ctx, proxy).await,
        ProbedContract::FractalModule => fractal_module(ctx, proxy).await,
        ProbedContract::LinearErc20Voting => voting_strategy(ctx, proxy, true).await,
        ProbedContract::LinearErc721Voting => voting_strategy(ctx, proxy, false).await,
        ProbedContract::FreezeVotingMultisig => {
            freeze_voting(ctx, proxy, FreezeVoteType::Multisig).await
        }
        ProbedContract::FreezeVotingErc20 => freeze_voting(ctx, proxy, FreezeVoteType::Erc20).await,
        ProbedContract::FreezeVotingErc721 => {
            freeze_voting(ctx, proxy, FreezeVoteType::Erc721).await
        }
        ProbedContract::Unknown => {
            // Stays in the watchlist; later events may still identify it.
            debug!(address = %proxy, "factory child matches no known abi");
            Ok(())
        }
    }
}

async fn azorius_module(ctx: &mut HandlerContext<'_>, proxy: Address) -> Result<(), HandlerError> {
    let dao = ctx.module_dao(proxy).await?;
    let (timelock_period, execution_period) =
        reads::azorius_periods(ctx.reader, proxy, Some(ctx.block_number))
            .await
            .change_context(HandlerError::ChainRead)?;
    let now = ctx.block_timestamp;
    let insert = GovernanceModulePatch {
        timelock_period: Some(timelock_period),
        execution_period: Some(execution_period),
        created_at: Some(now),
        updated_at: Some(now),
    };
    let update = GovernanceModulePatch {
        timelock_period: Some(timelock_period),
        execution_period: Some(execution_period),
        updated_at: Some(now),
        ..Default::default()
    };
    info!(module = %proxy, dao = %dao, "indexed azorius module");
    ctx.store
        .upsert_governance_module(&proxy, &dao, ModuleType::Azorius, &insert, &update)
        .change_context(HandlerError::Store)
}

async fn fractal_module(ctx: &mut HandlerContext<'_>, proxy: Address) -> Result<(), HandlerError> {
    let dao = ctx.module_dao(proxy).await?;
    let now = ctx.block_timestamp;
    let insert = GovernanceModulePatch {
        created_at: Some(now),
        updated_at: Some(now),
        ..Default::default()
    };
    let update = GovernanceModulePatch {
        updated_at: Some(now),
        ..Default::default()
    };
    ctx.store
        .upsert_governance_module(&proxy, &dao, ModuleType::Fractal, &insert, &update)
        .change_context(HandlerError::Store)
}

async fn voting_strategy(
    ctx: &mut HandlerContext<'_>,
    proxy: Address,
    erc20: bool,
) -> Result<(), HandlerError> {
    let module = reads::strategy_azorius_module(ctx.reader, proxy, Some(ctx.block_number))
        .await
        .change_context(HandlerError::ChainRead)
        .attach_printable("failed to resolve owning module for strategy")?;
    let (voting_period, required_proposer_weight) =
        reads::strategy_params(ctx.reader, proxy, Some(ctx.block_number))
            .await
            .change_context(HandlerError::ChainRead)?;

    let now = ctx.block_timestamp;
    let insert = VotingStrategyPatch {
        voting_period: Some(voting_period),
        required_proposer_weight: Some(required_proposer_weight),
        created_at: Some(now),
        updated_at: Some(now),
        ..Default::default()
    };
    let update = VotingStrategyPatch {
        voting_period: Some(voting_period),
        required_proposer_weight: Some(required_proposer_weight),
        updated_at: Some(now),
        ..Default::default()
    };
    ctx.store
        .upsert_voting_strategy(&proxy, &module, &insert, &update)
        .change_context(HandlerError::Store)?;

    // An ERC20 strategy has exactly one token, readable at deploy time.
    // ERC721 strategies register theirs through GovernanceTokenAdded.
    if erc20 {
        let token = reads::strategy_governance_token(ctx.reader, proxy, Some(ctx.block_number))
            .await
            .change_context(HandlerError::ChainRead)?;
        let weight = VotingTokenPatch {
            weight: Some(U256::from(1)),
        };
        ctx.store
            .upsert_voting_token(&token, &proxy, TokenType::Erc20, &weight, &weight)
            .change_context(HandlerError::Store)?;
    }
    Ok(())
}

async fn freeze_voting(
    ctx: &mut HandlerContext<'_>,
    proxy: Address,
    vote_type: FreezeVoteType,
) -> Result<(), HandlerError> {
    let module = reads::freeze_voting_owner(ctx.reader, proxy, Some(ctx.block_number))
        .await
        .change_context(HandlerError::ChainRead)
        .attach_printable("failed to resolve owning module for freeze voting")?;
    let (freeze_period, freeze_proposal_period, freeze_votes_threshold) =
        reads::freeze_voting_params(ctx.reader, proxy, Some(ctx.block_number))
            .await
            .change_context(HandlerError::ChainRead)?;
    let now = ctx.block_timestamp;
    let insert = FreezeVotingStrategyPatch {
        governance_module_address: Some(module),
        freeze_period: Some(freeze_period),
        freeze_proposal_period: Some(freeze_proposal_period),
        freeze_votes_threshold: Some(freeze_votes_threshold),
        created_at: Some(now),
        updated_at: Some(now),
    };
    let update = FreezeVotingStrategyPatch {
        governance_module_address: Some(module),
        freeze_period: Some(freeze_period),
        freeze_proposal_period: Some(freeze_proposal_period),
        freeze_votes_threshold: Some(freeze_votes_threshold),
        updated_at: Some(now),
        ..Default::default()
    };
    ctx.store
        .upsert_freeze_voting_strategy(&proxy, vote_type, &insert, &update)
        .change_context(HandlerError::Store)
}
