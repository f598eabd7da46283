//! Per-event handlers.
//!
//! One handler per typed event. Handlers only read the chain, upsert
//! entities, and record correlation facts; the dispatcher isolates their
//! failures so one bad event never poisons the batch.

mod azorius;
mod guard;
mod modules;
mod registry;
mod roles;
mod strategy;
mod treasury;

use std::fmt;

use alloy_primitives::{Address, B256};
use daoscan_chain::{reads, ChainReader};
use daoscan_common::{ChainId, DaoKey};
use daoscan_storage::EntityStore;
use error_stack::{Result, ResultExt};

use crate::{correlation::TxCorrelation, events::ContractEvent};

#[derive(Debug)]
pub enum HandlerError {
    /// A chain read the handler depends on failed.
    ChainRead,
    /// A store operation failed.
    Store,
    /// The event payload is structurally valid JSON but semantically
    /// unusable.
    InvalidPayload,
    /// The handler needs an entity row that was never indexed.
    MissingDependency,
}

impl error_stack::Context for HandlerError {}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::ChainRead => f.write_str("chain read failed"),
            HandlerError::Store => f.write_str("store operation failed"),
            HandlerError::InvalidPayload => f.write_str("invalid event payload"),
            HandlerError::MissingDependency => f.write_str("missing dependency row"),
        }
    }
}

/// Everything a handler may touch while applying one event.
pub struct HandlerContext<'a> {
    pub reader: &'a dyn ChainReader,
    pub store: &'a EntityStore,
    pub correlation: &'a mut TxCorrelation,
    pub chain_id: ChainId,
    pub log_address: Address,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: B256,
}

impl HandlerContext<'_> {
    fn dao_key(&self, address: Address) -> DaoKey {
        DaoKey::new(self.chain_id, address)
    }

    /// Owning DAO of a Zodiac module, from the correlation context or an
    /// `avatar()` read at the event block. A failed read aborts the
    /// handler: a row with an unverifiable owner is worse than no row.
    async fn module_dao(&mut self, module: Address) -> Result<DaoKey, HandlerError> {
        if let Some(dao) = self.correlation.module_dao(&module) {
            return Ok(dao);
        }
        let avatar = reads::module_avatar(self.reader, module, Some(self.block_number))
            .await
            .change_context(HandlerError::ChainRead)
            .attach_printable("failed to resolve owning dao for module")?;
        let dao = self.dao_key(avatar);
        self.correlation.remember_module(module, dao);
        Ok(dao)
    }
}

/// Route one typed event to its handler.
pub async fn dispatch(
    ctx: &mut HandlerContext<'_>,
    event: ContractEvent,
) -> Result<(), HandlerError> {
    match event {
        ContractEvent::DaoNameUpdated { dao, name } => {
            registry::dao_name_updated(ctx, dao, name).await
        }
        ContractEvent::SubDaoDeclared { parent, child } => {
            registry::sub_dao_declared(ctx, parent, child)
        }
        ContractEvent::DaoValueUpdated { dao, key, value } => {
            registry::dao_value_updated(ctx, dao, &key, &value)
        }
        ContractEvent::ModuleProxyCreated { proxy } => {
            modules::module_proxy_created(ctx, proxy).await
        }
        ContractEvent::AzoriusProposalCreated {
            proposal_id,
            proposer,
            strategy,
            transactions,
            metadata,
        } => {
            azorius::proposal_created(ctx, proposal_id, proposer, strategy, transactions, &metadata)
                .await
        }
        ContractEvent::AzoriusProposalExecuted { proposal_id } => {
            azorius::proposal_executed(ctx, proposal_id).await
        }
        ContractEvent::ModuleTimelockPeriodUpdated { timelock_period } => {
            azorius::timelock_period_updated(ctx, timelock_period).await
        }
        ContractEvent::ModuleExecutionPeriodUpdated { execution_period } => {
            azorius::execution_period_updated(ctx, execution_period).await
        }
        ContractEvent::ProposalInitialized {
            proposal_id,
            voting_end_block,
        } => strategy::proposal_initialized(ctx, proposal_id, voting_end_block).await,
        ContractEvent::VotingPeriodUpdated { voting_period } => {
            strategy::patch_strategy(ctx, |patch| patch.voting_period = Some(voting_period)).await
        }
        ContractEvent::QuorumNumeratorUpdated { quorum_numerator } => {
            strategy::patch_strategy(ctx, |patch| patch.quorum_numerator = Some(quorum_numerator))
                .await
        }
        ContractEvent::BasisNumeratorUpdated { basis_numerator } => {
            strategy::patch_strategy(ctx, |patch| patch.basis_numerator = Some(basis_numerator))
                .await
        }
        ContractEvent::RequiredProposerWeightUpdated { weight } => {
            strategy::patch_strategy(ctx, |patch| patch.required_proposer_weight = Some(weight))
                .await
        }
        ContractEvent::GovernanceTokenAdded {
            token,
            weight,
            token_type,
        } => strategy::governance_token_added(ctx, token, weight, token_type),
        ContractEvent::GovernanceTokenRemoved { token } => {
            strategy::governance_token_removed(ctx, token)
        }
        ContractEvent::FreezeGuardSetup { child_safe } => {
            guard::freeze_guard_setup(ctx, child_safe).await
        }
        ContractEvent::GuardTimelockPeriodUpdated { timelock_period } => {
            guard::patch_guard(ctx, |patch| patch.timelock_period = Some(timelock_period))
        }
        ContractEvent::GuardExecutionPeriodUpdated { execution_period } => {
            guard::patch_guard(ctx, |patch| patch.execution_period = Some(execution_period))
        }
        ContractEvent::TransactionTimelocked { safe_tx_hash } => {
            guard::transaction_timelocked(ctx, safe_tx_hash)
        }
        ContractEvent::FreezeProposalPeriodUpdated {
            freeze_proposal_period,
        } => guard::patch_freeze_voting(ctx, |patch| {
            patch.freeze_proposal_period = Some(freeze_proposal_period)
        }),
        ContractEvent::FreezePeriodUpdated { freeze_period } => {
            guard::patch_freeze_voting(ctx, |patch| patch.freeze_period = Some(freeze_period))
        }
        ContractEvent::FreezeVotesThresholdUpdated { threshold } => {
            guard::patch_freeze_voting(ctx, |patch| patch.freeze_votes_threshold = Some(threshold))
        }
        ContractEvent::SafeExecutionSuccess { safe_tx_hash } => {
            guard::safe_execution_success(ctx, safe_tx_hash)
        }
        ContractEvent::HatCreated { hat_id, details } => {
            roles::hat_created(ctx, hat_id, details).await
        }
        // The deployed module is registered in the watchlist by the
        // dispatcher; there is no entity to write yet.
        ContractEvent::HatsModuleDeployed { .. } => Ok(()),
        ContractEvent::StreamCreated {
            stream_id,
            sender,
            recipient,
            token,
        } => treasury::stream_created(ctx, stream_id, sender, recipient, token),
        ContractEvent::SplitCreated { split, controller } => {
            treasury::split_created(ctx, split, controller)
        }
    }
}
