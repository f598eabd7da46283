//! Typed decoding of event envelopes.
//!
//! Each supported (contract, event) pair maps to one [`ContractEvent`]
//! variant. Decoding is strict: a missing or malformed argument fails
//! the event, and the dispatcher logs and skips it without touching the
//! rest of the batch.

use std::fmt;

use alloy_primitives::{Address, B256, U256};
use daoscan_storage::{ProposalTransaction, TokenType};
use error_stack::{Report, Result, ResultExt};
use serde_json::{Map, Value};

use crate::envelope::EventEnvelope;

/// Error context for envelope decoding.
#[derive(Debug)]
pub struct DecodeError;

impl error_stack::Context for DecodeError {}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode event")
    }
}

/// One governance event, fully typed.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractEvent {
    DaoNameUpdated {
        dao: Address,
        name: String,
    },
    SubDaoDeclared {
        parent: Address,
        child: Address,
    },
    DaoValueUpdated {
        dao: Address,
        key: String,
        value: String,
    },
    ModuleProxyCreated {
        proxy: Address,
    },
    AzoriusProposalCreated {
        proposal_id: u64,
        proposer: Address,
        strategy: Address,
        transactions: Vec<ProposalTransaction>,
        metadata: String,
    },
    AzoriusProposalExecuted {
        proposal_id: u64,
    },
    ModuleTimelockPeriodUpdated {
        timelock_period: u64,
    },
    ModuleExecutionPeriodUpdated {
        execution_period: u64,
    },
    ProposalInitialized {
        proposal_id: u64,
        voting_end_block: u64,
    },
    VotingPeriodUpdated {
        voting_period: u64,
    },
    QuorumNumeratorUpdated {
        quorum_numerator: u64,
    },
    BasisNumeratorUpdated {
        basis_numerator: u64,
    },
    RequiredProposerWeightUpdated {
        weight: U256,
    },
    GovernanceTokenAdded {
        token: Address,
        weight: U256,
        token_type: TokenType,
    },
    GovernanceTokenRemoved {
        token: Address,
    },
    FreezeGuardSetup {
        child_safe: Address,
    },
    GuardTimelockPeriodUpdated {
        timelock_period: u64,
    },
    GuardExecutionPeriodUpdated {
        execution_period: u64,
    },
    TransactionTimelocked {
        safe_tx_hash: B256,
    },
    FreezeProposalPeriodUpdated {
        freeze_proposal_period: u64,
    },
    FreezePeriodUpdated {
        freeze_period: u64,
    },
    FreezeVotesThresholdUpdated {
        threshold: U256,
    },
    SafeExecutionSuccess {
        safe_tx_hash: B256,
    },
    HatCreated {
        hat_id: U256,
        details: String,
    },
    HatsModuleDeployed {
        instance: Address,
        hat_id: U256,
    },
    StreamCreated {
        stream_id: u64,
        sender: Address,
        recipient: Address,
        token: Address,
    },
    SplitCreated {
        split: Address,
        controller: Address,
    },
}

/// Decode one envelope into a typed event.
pub fn decode_event(envelope: &EventEnvelope) -> Result<ContractEvent, DecodeError> {
    let args = &envelope.args;
    let event = match (
        envelope.contract_name.as_str(),
        envelope.event_name.as_str(),
    ) {
        ("FractalRegistry", "FractalNameUpdated") => ContractEvent::DaoNameUpdated {
            dao: addr_arg(args, "daoAddress")?,
            name: string_arg(args, "daoName")?,
        },
        ("FractalRegistry", "FractalSubDAODeclared") => ContractEvent::SubDaoDeclared {
            parent: addr_arg(args, "parentDAOAddress")?,
            child: addr_arg(args, "subDAOAddress")?,
        },
        ("KeyValuePairs", "ValueUpdated") => ContractEvent::DaoValueUpdated {
            dao: addr_arg(args, "theAddress")?,
            key: string_arg(args, "key")?,
            value: string_arg(args, "value")?,
        },
        ("ModuleProxyFactory", "ModuleProxyCreation") => ContractEvent::ModuleProxyCreated {
            proxy: addr_arg(args, "proxy")?,
        },
        ("Azorius", "ProposalCreated") => ContractEvent::AzoriusProposalCreated {
            proposal_id: u64_arg(args, "proposalId")?,
            proposer: addr_arg(args, "proposer")?,
            strategy: addr_arg(args, "strategy")?,
            transactions: transactions_arg(args, "transactions")?,
            metadata: string_arg(args, "metadata")?,
        },
        ("Azorius", "ProposalExecuted") => ContractEvent::AzoriusProposalExecuted {
            proposal_id: u64_arg(args, "proposalId")?,
        },
        ("Azorius", "TimelockPeriodUpdated") => ContractEvent::ModuleTimelockPeriodUpdated {
            timelock_period: u64_arg(args, "timelockPeriod")?,
        },
        ("Azorius", "ExecutionPeriodUpdated") => ContractEvent::ModuleExecutionPeriodUpdated {
            execution_period: u64_arg(args, "executionPeriod")?,
        },
        ("LinearERC20Voting" | "LinearERC721Voting", "ProposalInitialized") => {
            ContractEvent::ProposalInitialized {
                proposal_id: u64_arg(args, "proposalId")?,
                voting_end_block: u64_arg(args, "votingEndBlock")?,
            }
        }
        ("LinearERC20Voting" | "LinearERC721Voting", "VotingPeriodUpdated") => {
            ContractEvent::VotingPeriodUpdated {
                voting_period: u64_arg(args, "votingPeriod")?,
            }
        }
        ("LinearERC20Voting" | "LinearERC721Voting", "QuorumNumeratorUpdated") => {
            ContractEvent::QuorumNumeratorUpdated {
                quorum_numerator: u64_arg(args, "quorumNumerator")?,
            }
        }
        ("LinearERC20Voting" | "LinearERC721Voting", "BasisNumeratorUpdated") => {
            ContractEvent::BasisNumeratorUpdated {
                basis_numerator: u64_arg(args, "basisNumerator")?,
            }
        }
        ("LinearERC20Voting" | "LinearERC721Voting", "RequiredProposerWeightUpdated") => {
            ContractEvent::RequiredProposerWeightUpdated {
                weight: u256_arg(args, "requiredProposerWeight")?,
            }
        }
        (contract @ ("LinearERC20Voting" | "LinearERC721Voting"), "GovernanceTokenAdded") => {
            ContractEvent::GovernanceTokenAdded {
                token: addr_arg(args, "token")?,
                weight: u256_arg(args, "weight")?,
                token_type: if contract == "LinearERC721Voting" {
                    TokenType::Erc721
                } else {
                    TokenType::Erc20
                },
            }
        }
        ("LinearERC20Voting" | "LinearERC721Voting", "GovernanceTokenRemoved") => {
            ContractEvent::GovernanceTokenRemoved {
                token: addr_arg(args, "token")?,
            }
        }
        ("MultisigFreezeGuard", "MultisigFreezeGuardSetup") => ContractEvent::FreezeGuardSetup {
            child_safe: addr_arg(args, "childGnosisSafe")?,
        },
        ("MultisigFreezeGuard", "TimelockPeriodUpdated") => {
            ContractEvent::GuardTimelockPeriodUpdated {
                timelock_period: u64_arg(args, "timelockPeriod")?,
            }
        }
        ("MultisigFreezeGuard", "ExecutionPeriodUpdated") => {
            ContractEvent::GuardExecutionPeriodUpdated {
                execution_period: u64_arg(args, "executionPeriod")?,
            }
        }
        ("MultisigFreezeGuard", "TransactionTimelocked") => ContractEvent::TransactionTimelocked {
            safe_tx_hash: hash_arg(args, "transactionHash")?,
        },
        ("FreezeVoting", "FreezeProposalPeriodUpdated") => {
            ContractEvent::FreezeProposalPeriodUpdated {
                freeze_proposal_period: u64_arg(args, "freezeProposalPeriod")?,
            }
        }
        ("FreezeVoting", "FreezePeriodUpdated") => ContractEvent::FreezePeriodUpdated {
            freeze_period: u64_arg(args, "freezePeriod")?,
        },
        ("FreezeVoting", "FreezeVotesThresholdUpdated") => {
            ContractEvent::FreezeVotesThresholdUpdated {
                threshold: u256_arg(args, "freezeVotesThreshold")?,
            }
        }
        ("GnosisSafe", "ExecutionSuccess") => ContractEvent::SafeExecutionSuccess {
            safe_tx_hash: hash_arg(args, "txHash")?,
        },
        ("Hats", "HatCreated") => ContractEvent::HatCreated {
            hat_id: u256_arg(args, "id")?,
            details: string_arg(args, "details")?,
        },
        ("HatsModuleFactory", "HatsModuleFactory_ModuleDeployed") => {
            ContractEvent::HatsModuleDeployed {
                instance: addr_arg(args, "instance")?,
                hat_id: u256_arg(args, "hatId")?,
            }
        }
        ("SablierV2LockupLinear", "CreateLockupLinearStream") => ContractEvent::StreamCreated {
            stream_id: u64_arg(args, "streamId")?,
            sender: addr_arg(args, "sender")?,
            recipient: addr_arg(args, "recipient")?,
            token: addr_arg(args, "asset")?,
        },
        ("SplitMain", "CreateSplit") => ContractEvent::SplitCreated {
            split: addr_arg(args, "split")?,
            controller: addr_arg(args, "controller")?,
        },
        (contract, event) => {
            return Err(Report::new(DecodeError)
                .attach_printable(format!("unknown event {contract}::{event}")))
        }
    };
    Ok(event)
}

fn arg<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a Value, DecodeError> {
    args.get(key)
        .ok_or_else(|| Report::new(DecodeError).attach_printable(format!("missing argument {key}")))
}

fn string_arg(args: &Map<String, Value>, key: &str) -> Result<String, DecodeError> {
    arg(args, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            Report::new(DecodeError).attach_printable(format!("argument {key} is not a string"))
        })
}

fn addr_arg(args: &Map<String, Value>, key: &str) -> Result<Address, DecodeError> {
    string_arg(args, key)?
        .parse::<Address>()
        .change_context(DecodeError)
        .attach_printable(format!("argument {key} is not an address"))
}

fn hash_arg(args: &Map<String, Value>, key: &str) -> Result<B256, DecodeError> {
    string_arg(args, key)?
        .parse::<B256>()
        .change_context(DecodeError)
        .attach_printable(format!("argument {key} is not a 32-byte hash"))
}

/// Numeric arguments arrive either as JSON numbers or as decimal or
/// 0x-prefixed strings, depending on the upstream decoder.
fn u256_arg(args: &Map<String, Value>, key: &str) -> Result<U256, DecodeError> {
    let value = arg(args, key)?;
    if let Some(number) = value.as_u64() {
        return Ok(U256::from(number));
    }
    value
        .as_str()
        .ok_or_else(|| {
            Report::new(DecodeError).attach_printable(format!("argument {key} is not numeric"))
        })?
        .parse::<U256>()
        .change_context(DecodeError)
        .attach_printable(format!("argument {key} is not a valid integer"))
}

fn u64_arg(args: &Map<String, Value>, key: &str) -> Result<u64, DecodeError> {
    let value = u256_arg(args, key)?;
    if value > U256::from(u64::MAX) {
        return Err(
            Report::new(DecodeError).attach_printable(format!("argument {key} overflows u64"))
        );
    }
    Ok(value.to::<u64>())
}

fn transactions_arg(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Vec<ProposalTransaction>, DecodeError> {
    serde_json::from_value(arg(args, key)?.clone())
        .change_context(DecodeError)
        .attach_printable(format!("argument {key} is not a transaction list"))
}
