//! Capability probing for factory-deployed proxies.
//!
//! The module proxy factory deploys Azorius modules, Fractal modules,
//! voting strategies, and freeze voting strategies through the same
//! event, so the deployed address is classified by which view calls
//! respond, not by the factory payload.

use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use error_stack::Result;

use crate::{
    reader::{CallRequest, ChainReader},
    reads, ChainReaderError,
};

/// Outcome of probing a freshly deployed proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbedContract {
    Azorius,
    FractalModule,
    LinearErc20Voting,
    LinearErc721Voting,
    FreezeVotingMultisig,
    FreezeVotingErc20,
    FreezeVotingErc721,
    Unknown,
}

fn probe_call<C: SolCall>(to: Address, call: C) -> CallRequest {
    CallRequest {
        to,
        data: call.abi_encode(),
    }
}

/// Classify a contract by issuing all discriminating reads in one
/// multicall at the deployment block.
pub async fn probe_contract(
    reader: &dyn ChainReader,
    address: Address,
    at_block: Option<u64>,
) -> Result<ProbedContract, ChainReaderError> {
    use reads::{IAzorius, IFreezeVoting, IVotingStrategy};

    let calls = vec![
        probe_call(address, IAzorius::timelockPeriodCall {}),
        probe_call(address, IAzorius::avatarCall {}),
        probe_call(address, IVotingStrategy::votingPeriodCall {}),
        probe_call(address, IVotingStrategy::azoriusModuleCall {}),
        probe_call(address, IFreezeVoting::freezeVotesThresholdCall {}),
        probe_call(address, IFreezeVoting::freezeProposalPeriodCall {}),
        probe_call(address, IVotingStrategy::governanceTokenCall {}),
        probe_call(address, IFreezeVoting::parentGnosisSafeCall {}),
    ];

    let results = reader.multicall(calls, at_block).await?;
    let hit = |idx: usize| results.get(idx).map(|r| r.returned_data()).unwrap_or(false);

    let timelock_period = hit(0);
    let avatar = hit(1);
    let voting_period = hit(2);
    let azorius_module = hit(3);
    let freeze_threshold = hit(4);
    let freeze_proposal_period = hit(5);
    let governance_token = hit(6);
    let parent_safe = hit(7);

    let probed = if voting_period && azorius_module {
        if governance_token {
            ProbedContract::LinearErc20Voting
        } else {
            ProbedContract::LinearErc721Voting
        }
    } else if freeze_threshold && freeze_proposal_period {
        if parent_safe {
            ProbedContract::FreezeVotingMultisig
        } else if governance_token {
            ProbedContract::FreezeVotingErc20
        } else {
            ProbedContract::FreezeVotingErc721
        }
    } else if timelock_period && avatar {
        ProbedContract::Azorius
    } else if avatar {
        ProbedContract::FractalModule
    } else {
        ProbedContract::Unknown
    };

    Ok(probed)
}
