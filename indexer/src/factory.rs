use alloy_primitives::Address;

use crate::{
    events::ContractEvent,
    watchlist::CandidateAbi,
};

/// A child contract announced by a factory event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChild {
    pub address: Address,
    pub candidates: Vec<CandidateAbi>,
    pub start_block: u64,
}

/// Maps factory events to the child addresses they deploy.
///
/// Resolution only says "this address is now interesting and may speak
/// one of these ABIs"; the capability probe decides which, if any.
pub struct FactoryResolver;

impl FactoryResolver {
    pub fn resolve(event: &ContractEvent, block_number: u64) -> Option<ResolvedChild> {
        match event {
            ContractEvent::ModuleProxyCreated { proxy } => Some(ResolvedChild {
                address: *proxy,
                candidates: vec![
                    CandidateAbi::GovernanceModule,
                    CandidateAbi::VotingStrategy,
                    CandidateAbi::FreezeVoting,
                ],
                start_block: block_number,
            }),
            ContractEvent::SplitCreated { split, .. } => Some(ResolvedChild {
                address: *split,
                candidates: vec![CandidateAbi::SplitWallet],
                start_block: block_number,
            }),
            ContractEvent::HatsModuleDeployed { instance, .. } => Some(ResolvedChild {
                address: *instance,
                candidates: vec![CandidateAbi::HatsModule],
                start_block: block_number,
            }),
            _ => None,
        }
    }
}
