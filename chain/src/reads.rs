//! Typed contract reads built on [`ChainReader::multicall`].
//!
//! Governance contracts are probed and read through a small set of view
//! functions; every helper here issues one multicall and decodes the
//! result, returning `CallFailed` when the target reverts or has no code.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};
use error_stack::{Report, Result, ResultExt};

use crate::{
    reader::{CallRequest, CallResult, ChainReader},
    ChainReaderError,
};

sol! {
    struct Call3 {
        address target;
        bool allowFailure;
        bytes callData;
    }

    struct MulticallResult {
        bool success;
        bytes returnData;
    }

    function aggregate3(Call3[] calldata calls) external payable returns (MulticallResult[] memory returnData);

    interface IGnosisSafe {
        function nonce() external view returns (uint256);
        function getThreshold() external view returns (uint256);
    }

    interface IAzorius {
        function avatar() external view returns (address);
        function timelockPeriod() external view returns (uint32);
        function executionPeriod() external view returns (uint32);
        function proposalState(uint32 proposalId) external view returns (uint8);
    }

    interface IVotingStrategy {
        function azoriusModule() external view returns (address);
        function votingPeriod() external view returns (uint32);
        function requiredProposerWeight() external view returns (uint256);
        function governanceToken() external view returns (address);
    }

    interface IFreezeVoting {
        function freezePeriod() external view returns (uint32);
        function freezeProposalPeriod() external view returns (uint32);
        function freezeVotesThreshold() external view returns (uint256);
        function parentGnosisSafe() external view returns (address);
        function owner() external view returns (address);
    }

    interface IHats {
        function isActiveHat(uint256 hatId) external view returns (bool);
    }
}

sol! {
    interface IFreezeGuard {
        function timelockPeriod() external view returns (uint32);
        function executionPeriod() external view returns (uint32);
    }
}

pub(crate) fn encode_aggregate3(calls: &[CallRequest]) -> Vec<u8> {
    let calls = calls
        .iter()
        .map(|call| Call3 {
            target: call.to,
            allowFailure: true,
            callData: call.data.clone().into(),
        })
        .collect::<Vec<_>>();
    aggregate3Call { calls }.abi_encode()
}

pub(crate) fn decode_aggregate3(data: &[u8]) -> Result<Vec<CallResult>, ChainReaderError> {
    let decoded = aggregate3Call::abi_decode_returns(data, true)
        .change_context(ChainReaderError::Decode)
        .attach_printable("failed to decode multicall result")?;
    Ok(decoded
        .returnData
        .into_iter()
        .map(|result| CallResult {
            success: result.success,
            data: result.returnData.to_vec(),
        })
        .collect())
}

fn request<C: SolCall>(to: Address, call: C) -> CallRequest {
    CallRequest {
        to,
        data: call.abi_encode(),
    }
}

fn decode_one<C: SolCall>(result: &CallResult) -> Result<C::Return, ChainReaderError> {
    if !result.returned_data() {
        return Err(Report::new(ChainReaderError::CallFailed));
    }
    C::abi_decode_returns(&result.data, true).change_context(ChainReaderError::Decode)
}

async fn call_one<C: SolCall>(
    reader: &dyn ChainReader,
    to: Address,
    call: C,
    at_block: Option<u64>,
) -> Result<C::Return, ChainReaderError> {
    let results = reader.multicall(vec![request(to, call)], at_block).await?;
    let result = results
        .first()
        .ok_or_else(|| Report::new(ChainReaderError::Decode))?;
    decode_one::<C>(result)
}

/// Current transaction nonce of a Safe.
pub async fn safe_nonce(
    reader: &dyn ChainReader,
    safe: Address,
) -> Result<u64, ChainReaderError> {
    let returned = call_one(reader, safe, IGnosisSafe::nonceCall {}, None).await?;
    Ok(returned._0.to::<u64>())
}

/// Number of owner signatures a Safe requires.
pub async fn safe_threshold(
    reader: &dyn ChainReader,
    safe: Address,
) -> Result<u64, ChainReaderError> {
    let returned = call_one(reader, safe, IGnosisSafe::getThresholdCall {}, None).await?;
    Ok(returned._0.to::<u64>())
}

/// Whether the address is a deployed Safe. Used as the validation
/// predicate for new DAO rows.
pub async fn is_safe(reader: &dyn ChainReader, address: Address) -> bool {
    matches!(safe_threshold(reader, address).await, Ok(threshold) if threshold > 0)
}

/// The DAO (avatar) a Zodiac module executes through, read at the given
/// block height.
pub async fn module_avatar(
    reader: &dyn ChainReader,
    module: Address,
    at_block: Option<u64>,
) -> Result<Address, ChainReaderError> {
    let returned = call_one(reader, module, IAzorius::avatarCall {}, at_block).await?;
    Ok(returned._0)
}

/// Timelock and execution periods of an Azorius module.
pub async fn azorius_periods(
    reader: &dyn ChainReader,
    module: Address,
    at_block: Option<u64>,
) -> Result<(u64, u64), ChainReaderError> {
    let results = reader
        .multicall(
            vec![
                request(module, IAzorius::timelockPeriodCall {}),
                request(module, IAzorius::executionPeriodCall {}),
            ],
            at_block,
        )
        .await?;
    let [timelock, execution] = results.as_slice() else {
        return Err(Report::new(ChainReaderError::Decode));
    };
    let timelock = decode_one::<IAzorius::timelockPeriodCall>(timelock)?._0;
    let execution = decode_one::<IAzorius::executionPeriodCall>(execution)?._0;
    Ok((timelock as u64, execution as u64))
}

/// The Azorius module a voting strategy reports to.
pub async fn strategy_azorius_module(
    reader: &dyn ChainReader,
    strategy: Address,
    at_block: Option<u64>,
) -> Result<Address, ChainReaderError> {
    let returned = call_one(reader, strategy, IVotingStrategy::azoriusModuleCall {}, at_block).await?;
    Ok(returned._0)
}

/// Voting period and required proposer weight of a strategy.
pub async fn strategy_params(
    reader: &dyn ChainReader,
    strategy: Address,
    at_block: Option<u64>,
) -> Result<(u64, U256), ChainReaderError> {
    let results = reader
        .multicall(
            vec![
                request(strategy, IVotingStrategy::votingPeriodCall {}),
                request(strategy, IVotingStrategy::requiredProposerWeightCall {}),
            ],
            at_block,
        )
        .await?;
    let [period, weight] = results.as_slice() else {
        return Err(Report::new(ChainReaderError::Decode));
    };
    let period = decode_one::<IVotingStrategy::votingPeriodCall>(period)?._0;
    let weight = decode_one::<IVotingStrategy::requiredProposerWeightCall>(weight)?._0;
    Ok((period as u64, weight))
}

/// The single governance token of an ERC20 strategy.
pub async fn strategy_governance_token(
    reader: &dyn ChainReader,
    strategy: Address,
    at_block: Option<u64>,
) -> Result<Address, ChainReaderError> {
    let returned =
        call_one(reader, strategy, IVotingStrategy::governanceTokenCall {}, at_block).await?;
    Ok(returned._0)
}

/// Freeze voting parameters: freeze period, freeze proposal period, and
/// the vote threshold.
pub async fn freeze_voting_params(
    reader: &dyn ChainReader,
    strategy: Address,
    at_block: Option<u64>,
) -> Result<(u64, u64, U256), ChainReaderError> {
    let results = reader
        .multicall(
            vec![
                request(strategy, IFreezeVoting::freezePeriodCall {}),
                request(strategy, IFreezeVoting::freezeProposalPeriodCall {}),
                request(strategy, IFreezeVoting::freezeVotesThresholdCall {}),
            ],
            at_block,
        )
        .await?;
    let [freeze, proposal, threshold] = results.as_slice() else {
        return Err(Report::new(ChainReaderError::Decode));
    };
    let freeze = decode_one::<IFreezeVoting::freezePeriodCall>(freeze)?._0;
    let proposal = decode_one::<IFreezeVoting::freezeProposalPeriodCall>(proposal)?._0;
    let threshold = decode_one::<IFreezeVoting::freezeVotesThresholdCall>(threshold)?._0;
    Ok((freeze as u64, proposal as u64, threshold))
}

/// The governance module that owns a freeze voting strategy. Freeze
/// voting contracts are Ownable proxies; ownership is transferred to the
/// parent's module at setup.
pub async fn freeze_voting_owner(
    reader: &dyn ChainReader,
    strategy: Address,
    at_block: Option<u64>,
) -> Result<Address, ChainReaderError> {
    let returned = call_one(reader, strategy, IFreezeVoting::ownerCall {}, at_block).await?;
    Ok(returned._0)
}

/// Timelock and execution periods of a freeze guard.
pub async fn guard_periods(
    reader: &dyn ChainReader,
    guard: Address,
    at_block: Option<u64>,
) -> Result<(u64, u64), ChainReaderError> {
    let results = reader
        .multicall(
            vec![
                request(guard, IFreezeGuard::timelockPeriodCall {}),
                request(guard, IFreezeGuard::executionPeriodCall {}),
            ],
            at_block,
        )
        .await?;
    let [timelock, execution] = results.as_slice() else {
        return Err(Report::new(ChainReaderError::Decode));
    };
    let timelock = decode_one::<IFreezeGuard::timelockPeriodCall>(timelock)?._0;
    let execution = decode_one::<IFreezeGuard::executionPeriodCall>(execution)?._0;
    Ok((timelock as u64, execution as u64))
}

/// Batched `proposalState` read with per-call failure tolerance: a failed
/// call yields `None` instead of failing the batch.
pub async fn azorius_proposal_states(
    reader: &dyn ChainReader,
    module: Address,
    proposal_ids: &[u64],
) -> Result<Vec<Option<u8>>, ChainReaderError> {
    let calls = proposal_ids
        .iter()
        .map(|id| {
            request(
                module,
                IAzorius::proposalStateCall {
                    proposalId: *id as u32,
                },
            )
        })
        .collect();

    let results = reader.multicall(calls, None).await?;
    Ok(results
        .iter()
        .map(|result| decode_one::<IAzorius::proposalStateCall>(result).ok().map(|r| r._0))
        .collect())
}

/// Whether a hat still exists and is active.
pub async fn is_active_hat(
    reader: &dyn ChainReader,
    hats: Address,
    hat_id: U256,
) -> Result<bool, ChainReaderError> {
    let returned = call_one(reader, hats, IHats::isActiveHatCall { hatId: hat_id }, None).await?;
    Ok(returned._0)
}
