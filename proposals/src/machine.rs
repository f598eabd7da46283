use std::sync::Arc;

use alloy_primitives::{Address, B256};
use daoscan_chain::{reads, BlockTimestampCache, ChainReader};
use daoscan_common::DaoKey;
use daoscan_storage::{EntityStore, GovernanceGuardRow, SafeProposalRow};
use error_stack::{Report, Result, ResultExt};
use futures_util::{
    future::{join_all, select, Either},
    pin_mut,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    source::SafeTransactionSource,
    state::FractalProposalState,
    ProposalStateError,
};

/// Derived state of one multisig proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedProposalState {
    pub safe_tx_hash: B256,
    pub safe_nonce: u64,
    pub state: FractalProposalState,
}

/// Derived state of one Azorius proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AzoriusProposalState {
    pub proposal_id: u64,
    pub state: FractalProposalState,
}

/// Derives proposal lifecycle states from indexed rows plus live chain
/// and Safe service data.
///
/// Derivation is read-only and best-effort per proposal: one failed
/// auxiliary read degrades that proposal to its conservative state
/// instead of failing the batch.
pub struct ProposalStateMachine {
    reader: Arc<dyn ChainReader>,
    store: EntityStore,
    timestamps: Arc<BlockTimestampCache>,
    source: Arc<dyn SafeTransactionSource>,
}

impl ProposalStateMachine {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        store: EntityStore,
        timestamps: Arc<BlockTimestampCache>,
        source: Arc<dyn SafeTransactionSource>,
    ) -> Self {
        Self {
            reader,
            store,
            timestamps,
            source,
        }
    }

    /// Derive the state of every multisig proposal of a DAO.
    ///
    /// Proposals are partitioned against the Safe's live nonce: anything
    /// below it is settled (`Executed` with a matching execution row,
    /// `Rejected` otherwise), anything at or above it is live and judged
    /// by signatures, guard presence, and timelock windows. The result
    /// covers every proposal exactly once, sorted by nonce descending.
    ///
    /// Cancelling the token discards in-flight work; nothing is
    /// persisted either way.
    pub async fn derive_multisig(
        &self,
        dao: &DaoKey,
        now: u64,
        cancellation: &CancellationToken,
    ) -> Result<Vec<DerivedProposalState>, ProposalStateError> {
        if cancellation.is_cancelled() {
            return Err(Report::new(ProposalStateError::Cancelled));
        }

        let proposals = self
            .store
            .safe_proposals_for_dao(dao)
            .change_context(ProposalStateError::Store)?;
        if proposals.is_empty() {
            return Ok(Vec::new());
        }

        let live_nonce = reads::safe_nonce(self.reader.as_ref(), dao.address)
            .await
            .change_context(ProposalStateError::ChainRead)
            .attach_printable("failed to read live safe nonce")?;
        let guard = self
            .store
            .latest_guard_for_dao(dao)
            .change_context(ProposalStateError::Store)?;

        let (live, settled): (Vec<SafeProposalRow>, Vec<SafeProposalRow>) = proposals
            .into_iter()
            .partition(|proposal| proposal.safe_nonce >= live_nonce);

        let mut states = Vec::with_capacity(live.len() + settled.len());

        for proposal in settled {
            let executed = self
                .store
                .find_safe_proposal_execution(dao, &proposal.safe_tx_hash)
                .change_context(ProposalStateError::Store)?
                .map(|row| row.executed_tx_hash.is_some())
                .unwrap_or(false);
            states.push(DerivedProposalState {
                safe_tx_hash: proposal.safe_tx_hash,
                safe_nonce: proposal.safe_nonce,
                state: if executed {
                    FractalProposalState::Executed
                } else {
                    FractalProposalState::Rejected
                },
            });
        }

        // Confirmations only matter for live proposals; refresh them all
        // at once and race the join against cancellation.
        let infos = {
            let fetches = join_all(
                live.iter()
                    .map(|proposal| self.source.transaction_info(dao, &proposal.safe_tx_hash)),
            );
            let cancelled = cancellation.cancelled();
            pin_mut!(fetches);
            pin_mut!(cancelled);
            match select(fetches, cancelled).await {
                Either::Left((infos, _)) => infos,
                Either::Right(_) => return Err(Report::new(ProposalStateError::Cancelled)),
            }
        };

        for (proposal, info) in live.iter().zip(infos) {
            let (confirmations, required) = match info {
                Ok(Some(info)) => (info.confirmations, info.confirmations_required),
                Ok(None) => stored_confirmations(proposal),
                Err(err) => {
                    warn!(
                        safe_tx_hash = %proposal.safe_tx_hash,
                        error = ?err,
                        "confirmation refresh failed, using stored signatures"
                    );
                    stored_confirmations(proposal)
                }
            };

            // Timelocks only exist through a guard; without one the
            // lookup is skipped and signatures alone decide.
            let timelocked_ts = if guard.is_some() {
                let timelocked_block = self
                    .store
                    .find_safe_proposal_execution(dao, &proposal.safe_tx_hash)
                    .change_context(ProposalStateError::Store)?
                    .and_then(|row| row.timelocked_block);
                match timelocked_block {
                    None => None,
                    Some(block) => match self.timestamps.resolve(block).await {
                        Ok(timestamp) => Some(timestamp),
                        Err(err) => {
                            warn!(
                                safe_tx_hash = %proposal.safe_tx_hash,
                                block,
                                error = ?err,
                                "timestamp resolution failed, keeping proposal timelocked"
                            );
                            states.push(DerivedProposalState {
                                safe_tx_hash: proposal.safe_tx_hash,
                                safe_nonce: proposal.safe_nonce,
                                state: FractalProposalState::Timelocked,
                            });
                            continue;
                        }
                    },
                }
            } else {
                None
            };

            states.push(DerivedProposalState {
                safe_tx_hash: proposal.safe_tx_hash,
                safe_nonce: proposal.safe_nonce,
                state: assign_live_state(
                    confirmations,
                    required,
                    proposal.safe_nonce,
                    live_nonce,
                    guard.as_ref(),
                    timelocked_ts,
                    now,
                ),
            });
        }

        states.sort_by(|a, b| b.safe_nonce.cmp(&a.safe_nonce));
        Ok(states)
    }

    /// Derive the state of Azorius proposals from one batched
    /// `proposalState` multicall. Passing `None` covers every proposal
    /// the store holds for the DAO.
    pub async fn derive_azorius(
        &self,
        dao: &DaoKey,
        module: Address,
        proposal_ids: Option<&[u64]>,
    ) -> Result<Vec<AzoriusProposalState>, ProposalStateError> {
        let ids = match proposal_ids {
            Some(ids) => ids.to_vec(),
            None => self
                .store
                .proposals_for_dao(dao)
                .change_context(ProposalStateError::Store)?
                .iter()
                .map(|proposal| proposal.id)
                .collect(),
        };
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw = reads::azorius_proposal_states(self.reader.as_ref(), module, &ids)
            .await
            .change_context(ProposalStateError::ChainRead)?;

        Ok(ids
            .into_iter()
            .zip(raw)
            .map(|(proposal_id, raw)| AzoriusProposalState {
                proposal_id,
                // A failed or out-of-range read degrades to Active, the
                // conservative choice for an on-chain proposal.
                state: raw
                    .and_then(FractalProposalState::from_azorius_state)
                    .unwrap_or(FractalProposalState::Active),
            })
            .collect())
    }
}

/// Pure state assignment for one live multisig proposal (nonce at or
/// above the Safe's current nonce).
///
/// Without a guard a fully signed proposal at the current nonce is
/// immediately `Executable`. With a guard it must pass through the
/// timelock: `Timelockable` once fully signed, then `Timelocked`,
/// `Executable`, and `Expired` as `now` crosses the window boundaries
/// measured from the timelock timestamp.
pub fn assign_live_state(
    confirmations: u64,
    required: u64,
    safe_nonce: u64,
    live_nonce: u64,
    guard: Option<&GovernanceGuardRow>,
    timelocked_ts: Option<u64>,
    now: u64,
) -> FractalProposalState {
    let fully_signed = confirmations >= required;

    let Some(guard) = guard else {
        return if fully_signed && safe_nonce == live_nonce {
            FractalProposalState::Executable
        } else {
            FractalProposalState::Active
        };
    };

    let Some(timelocked_ts) = timelocked_ts else {
        return if fully_signed {
            FractalProposalState::Timelockable
        } else {
            FractalProposalState::Active
        };
    };

    // The timelock is inclusive of its end instant; the execution
    // window is not. Saturating: an absurd period pins the window open
    // instead of wrapping past it.
    let timelock_end = timelocked_ts.saturating_add(guard.timelock_period.unwrap_or(0));
    if now <= timelock_end {
        FractalProposalState::Timelocked
    } else if now < timelock_end.saturating_add(guard.execution_period.unwrap_or(0)) {
        FractalProposalState::Executable
    } else {
        FractalProposalState::Expired
    }
}

fn stored_confirmations(proposal: &SafeProposalRow) -> (u64, u64) {
    (
        proposal.confirmations.len() as u64,
        // An unknown threshold must never make a proposal executable.
        proposal.confirmations_required.unwrap_or(u64::MAX),
    )
}
