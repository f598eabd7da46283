use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use daoscan_chain::{
    reads, BlockHeader, BlockTimestampCache, BlockTimestampCacheOptions, CallRequest, CallResult,
    ChainReader, ChainReaderError, LogFilter, RawLog,
};
use daoscan_common::{ChainId, DaoKey};
use daoscan_proposals::{
    assign_live_state, FractalProposalState, ProposalStateError, ProposalStateMachine,
    SafeTransactionSource, SafeTxInfo, SourceError,
};
use daoscan_storage::{
    BlockTimestampPatch, EntityStore, GovernanceGuardPatch, GovernanceGuardRow, ProposalPatch,
    SafeConfirmation, SafeProposalExecutionPatch, SafeProposalPatch,
};
use error_stack::{Report, Result};
use tokio_util::sync::CancellationToken;

const NOW: u64 = 1_700_000_000;

/// Answers multicalls from a fixed (address, calldata) → return data
/// table; anything absent fails the individual call.
#[derive(Default)]
struct StubReader {
    responses: Mutex<HashMap<(Address, Vec<u8>), Vec<u8>>>,
    fail_blocks: bool,
}

impl StubReader {
    fn respond<C: SolCall>(&self, to: Address, call: C, data: Vec<u8>) {
        self.responses
            .lock()
            .unwrap()
            .insert((to, call.abi_encode()), data);
    }
}

#[async_trait::async_trait]
impl ChainReader for StubReader {
    fn chain_id(&self) -> ChainId {
        ChainId::MAINNET
    }

    async fn multicall(
        &self,
        calls: Vec<CallRequest>,
        _at_block: Option<u64>,
    ) -> Result<Vec<CallResult>, ChainReaderError> {
        let responses = self.responses.lock().unwrap();
        Ok(calls
            .iter()
            .map(|call| match responses.get(&(call.to, call.data.clone())) {
                Some(data) => CallResult {
                    success: true,
                    data: data.clone(),
                },
                None => CallResult {
                    success: false,
                    data: Vec::new(),
                },
            })
            .collect())
    }

    async fn get_block(&self, _number: Option<u64>) -> Result<BlockHeader, ChainReaderError> {
        if self.fail_blocks {
            return Err(Report::new(ChainReaderError::Request));
        }
        Ok(BlockHeader {
            number: 1_000,
            timestamp: NOW,
        })
    }

    async fn get_storage_at(
        &self,
        _address: Address,
        _slot: B256,
    ) -> Result<B256, ChainReaderError> {
        Err(Report::new(ChainReaderError::NotFound))
    }

    async fn get_logs(&self, _filter: &LogFilter) -> Result<Vec<RawLog>, ChainReaderError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct StubSource {
    infos: Mutex<HashMap<B256, SafeTxInfo>>,
    failing: Mutex<HashSet<B256>>,
}

impl StubSource {
    fn with_info(self, hash: B256, confirmations: u64, required: u64) -> Self {
        self.infos.lock().unwrap().insert(
            hash,
            SafeTxInfo {
                confirmations,
                confirmations_required: required,
            },
        );
        self
    }

    fn failing_for(self, hash: B256) -> Self {
        self.failing.lock().unwrap().insert(hash);
        self
    }
}

#[async_trait::async_trait]
impl SafeTransactionSource for StubSource {
    async fn transaction_info(
        &self,
        _dao: &DaoKey,
        safe_tx_hash: &B256,
    ) -> Result<Option<SafeTxInfo>, SourceError> {
        if self.failing.lock().unwrap().contains(safe_tx_hash) {
            return Err(Report::new(SourceError));
        }
        Ok(self.infos.lock().unwrap().get(safe_tx_hash).copied())
    }
}

fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

fn hash(byte: u8) -> B256 {
    B256::repeat_byte(byte)
}

fn dao_key() -> DaoKey {
    DaoKey::new(ChainId::MAINNET, addr(0xda))
}

fn machine(
    reader: Arc<StubReader>,
    store: &EntityStore,
    source: StubSource,
) -> ProposalStateMachine {
    let timestamps = Arc::new(BlockTimestampCache::new(
        reader.clone(),
        store.clone(),
        BlockTimestampCacheOptions::default(),
    ));
    ProposalStateMachine::new(reader, store.clone(), timestamps, Arc::new(source))
}

fn respond_nonce(reader: &StubReader, safe: Address, nonce: u64) {
    reader.respond(
        safe,
        reads::IGnosisSafe::nonceCall {},
        U256::from(nonce).to_be_bytes::<32>().to_vec(),
    );
}

fn seed_safe_proposal(store: &EntityStore, dao: &DaoKey, safe_tx_hash: B256, safe_nonce: u64) {
    let patch = SafeProposalPatch {
        safe_nonce: Some(safe_nonce),
        ..Default::default()
    };
    store
        .upsert_safe_proposal(dao, &safe_tx_hash, &patch, &patch)
        .unwrap();
}

fn seed_guard(store: &EntityStore, dao: &DaoKey, timelock_period: u64, execution_period: u64) {
    let patch = GovernanceGuardPatch {
        timelock_period: Some(timelock_period),
        execution_period: Some(execution_period),
        created_at: Some(NOW),
        updated_at: Some(NOW),
    };
    store
        .upsert_governance_guard(dao, &addr(0x99), &patch, &patch)
        .unwrap();
}

fn seed_timelock(store: &EntityStore, dao: &DaoKey, safe_tx_hash: B256, block: u64, timestamp: u64) {
    let execution = SafeProposalExecutionPatch {
        timelocked_block: Some(block),
        ..Default::default()
    };
    store
        .upsert_safe_proposal_execution(dao, &safe_tx_hash, &execution, &execution)
        .unwrap();
    let row = BlockTimestampPatch {
        timestamp: Some(timestamp),
        future: Some(false),
        updated_at: Some(NOW),
    };
    store
        .upsert_block_timestamp(ChainId::MAINNET, block, &row, &row)
        .unwrap();
}

fn state_of(states: &[daoscan_proposals::DerivedProposalState], h: B256) -> FractalProposalState {
    states
        .iter()
        .find(|s| s.safe_tx_hash == h)
        .expect("proposal missing from derivation")
        .state
}

#[tokio::test]
async fn nonce_partition_settles_old_and_judges_live_proposals() {
    let store = EntityStore::in_memory().unwrap();
    let dao = dao_key();
    let reader = Arc::new(StubReader::default());
    respond_nonce(&reader, dao.address, 5);

    // Two settled proposals at nonce 3: one executed, one displaced.
    seed_safe_proposal(&store, &dao, hash(0xa1), 3);
    seed_safe_proposal(&store, &dao, hash(0xa2), 3);
    let executed = SafeProposalExecutionPatch {
        executed_tx_hash: Some(hash(0xee)),
        executed_block: Some(90),
        ..Default::default()
    };
    store
        .upsert_safe_proposal_execution(&dao, &hash(0xa1), &executed, &executed)
        .unwrap();

    // Fully signed at the live nonce, and a queued successor.
    seed_safe_proposal(&store, &dao, hash(0xa3), 5);
    seed_safe_proposal(&store, &dao, hash(0xa4), 6);
    let source = StubSource::default()
        .with_info(hash(0xa3), 2, 2)
        .with_info(hash(0xa4), 1, 2);

    let states = machine(reader, &store, source)
        .derive_multisig(&dao, NOW, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(states.len(), 4);
    assert_eq!(state_of(&states, hash(0xa1)), FractalProposalState::Executed);
    assert_eq!(state_of(&states, hash(0xa2)), FractalProposalState::Rejected);
    assert_eq!(
        state_of(&states, hash(0xa3)),
        FractalProposalState::Executable
    );
    assert_eq!(state_of(&states, hash(0xa4)), FractalProposalState::Active);

    // Sorted by nonce descending, every proposal exactly once.
    let nonces = states.iter().map(|s| s.safe_nonce).collect::<Vec<_>>();
    assert_eq!(nonces, vec![6, 5, 3, 3]);
    let unique = states
        .iter()
        .map(|s| s.safe_tx_hash)
        .collect::<HashSet<_>>();
    assert_eq!(unique.len(), 4);
}

#[tokio::test]
async fn guard_gates_fully_signed_proposals_behind_the_timelock() {
    let store = EntityStore::in_memory().unwrap();
    let dao = dao_key();
    let reader = Arc::new(StubReader::default());
    respond_nonce(&reader, dao.address, 7);
    seed_guard(&store, &dao, 100, 200);

    seed_safe_proposal(&store, &dao, hash(0xb1), 7);
    seed_safe_proposal(&store, &dao, hash(0xb2), 8);
    let source = StubSource::default()
        .with_info(hash(0xb1), 3, 3)
        .with_info(hash(0xb2), 1, 3);

    let states = machine(reader, &store, source)
        .derive_multisig(&dao, NOW, &CancellationToken::new())
        .await
        .unwrap();

    // Fully signed but not executable: the guard demands a timelock.
    assert_eq!(
        state_of(&states, hash(0xb1)),
        FractalProposalState::Timelockable
    );
    assert_eq!(state_of(&states, hash(0xb2)), FractalProposalState::Active);
}

#[tokio::test]
async fn timelocked_proposal_moves_monotonically_through_the_windows() {
    let store = EntityStore::in_memory().unwrap();
    let dao = dao_key();
    let reader = Arc::new(StubReader::default());
    respond_nonce(&reader, dao.address, 2);
    seed_guard(&store, &dao, 100, 200);

    seed_safe_proposal(&store, &dao, hash(0xc1), 2);
    seed_timelock(&store, &dao, hash(0xc1), 80, NOW);
    let source = StubSource::default().with_info(hash(0xc1), 2, 2);
    let machine = machine(reader, &store, source);

    let mut seen = Vec::new();
    // Inside the timelock, inside the execution window, after expiry.
    for now in [NOW + 50, NOW + 150, NOW + 350] {
        let states = machine
            .derive_multisig(&dao, now, &CancellationToken::new())
            .await
            .unwrap();
        seen.push(state_of(&states, hash(0xc1)));
    }
    assert_eq!(
        seen,
        vec![
            FractalProposalState::Timelocked,
            FractalProposalState::Executable,
            FractalProposalState::Expired,
        ]
    );
}

#[tokio::test]
async fn timelock_record_without_a_guard_does_not_gate_execution() {
    let store = EntityStore::in_memory().unwrap();
    let dao = dao_key();
    // Block reads fail, so any attempted timestamp resolution errors.
    let reader = Arc::new(StubReader {
        fail_blocks: true,
        ..Default::default()
    });
    respond_nonce(&reader, dao.address, 5);

    // A stray timelock record with no guard installed: the guard was
    // removed after timelocking. Signatures alone must decide.
    seed_safe_proposal(&store, &dao, hash(0xc7), 5);
    let execution = SafeProposalExecutionPatch {
        timelocked_block: Some(80),
        ..Default::default()
    };
    store
        .upsert_safe_proposal_execution(&dao, &hash(0xc7), &execution, &execution)
        .unwrap();

    let source = StubSource::default().with_info(hash(0xc7), 2, 2);
    let states = machine(reader, &store, source)
        .derive_multisig(&dao, NOW, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        state_of(&states, hash(0xc7)),
        FractalProposalState::Executable
    );
}

#[test]
fn extreme_guard_periods_saturate_instead_of_wrapping() {
    let guard = GovernanceGuardRow {
        dao: dao_key(),
        address: addr(0x99),
        timelock_period: Some(u64::MAX),
        execution_period: Some(u64::MAX),
        created_at: None,
        updated_at: None,
    };
    // A pathological period must pin the window open, not wrap around
    // and expire the proposal.
    let state = assign_live_state(2, 2, 5, 5, Some(&guard), Some(NOW), u64::MAX);
    assert_eq!(state, FractalProposalState::Timelocked);
}

#[tokio::test]
async fn settled_states_are_stable_across_rederivation() {
    let store = EntityStore::in_memory().unwrap();
    let dao = dao_key();
    let reader = Arc::new(StubReader::default());
    respond_nonce(&reader, dao.address, 4);

    seed_safe_proposal(&store, &dao, hash(0xd1), 1);
    let executed = SafeProposalExecutionPatch {
        executed_tx_hash: Some(hash(0xee)),
        ..Default::default()
    };
    store
        .upsert_safe_proposal_execution(&dao, &hash(0xd1), &executed, &executed)
        .unwrap();

    let machine = machine(reader, &store, StubSource::default());
    for now in [NOW, NOW + 1_000_000] {
        let states = machine
            .derive_multisig(&dao, now, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(state_of(&states, hash(0xd1)), FractalProposalState::Executed);
    }
}

#[tokio::test]
async fn failed_confirmation_read_degrades_to_stored_signatures() {
    let store = EntityStore::in_memory().unwrap();
    let dao = dao_key();
    let reader = Arc::new(StubReader::default());
    respond_nonce(&reader, dao.address, 3);

    // Stored row carries enough signatures; the live source fails.
    let confirmations = vec![
        SafeConfirmation {
            owner: addr(0x01),
            signature: None,
            submission_date: None,
        },
        SafeConfirmation {
            owner: addr(0x02),
            signature: None,
            submission_date: None,
        },
    ];
    let patch = SafeProposalPatch {
        safe_nonce: Some(3),
        confirmations: Some(confirmations),
        confirmations_required: Some(2),
        ..Default::default()
    };
    store
        .upsert_safe_proposal(&dao, &hash(0xe1), &patch, &patch)
        .unwrap();

    // A second proposal with no stored threshold must stay Active.
    seed_safe_proposal(&store, &dao, hash(0xe2), 4);

    let source = StubSource::default()
        .failing_for(hash(0xe1))
        .failing_for(hash(0xe2));
    let states = machine(reader, &store, source)
        .derive_multisig(&dao, NOW, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        state_of(&states, hash(0xe1)),
        FractalProposalState::Executable
    );
    assert_eq!(state_of(&states, hash(0xe2)), FractalProposalState::Active);
}

#[tokio::test]
async fn cancelled_derivation_returns_without_results() {
    let store = EntityStore::in_memory().unwrap();
    let dao = dao_key();
    let reader = Arc::new(StubReader::default());
    respond_nonce(&reader, dao.address, 1);
    seed_safe_proposal(&store, &dao, hash(0xf1), 1);

    let token = CancellationToken::new();
    token.cancel();
    let err = machine(reader, &store, StubSource::default())
        .derive_multisig(&dao, NOW, &token)
        .await
        .unwrap_err();
    assert!(matches!(
        err.current_context(),
        ProposalStateError::Cancelled
    ));
}

#[tokio::test]
async fn azorius_states_come_from_one_batched_read() {
    let store = EntityStore::in_memory().unwrap();
    let dao = dao_key();
    let module = addr(0x77);
    let reader = Arc::new(StubReader::default());

    for id in 0..3u64 {
        let patch = ProposalPatch {
            created_at: Some(NOW),
            ..Default::default()
        };
        store.upsert_proposal(&dao, id, &patch, &patch).unwrap();
    }
    let word = |value: u64| U256::from(value).to_be_bytes::<32>().to_vec();
    reader.respond(
        module,
        reads::IAzorius::proposalStateCall { proposalId: 0 },
        word(3),
    );
    reader.respond(
        module,
        reads::IAzorius::proposalStateCall { proposalId: 1 },
        word(2),
    );
    // Proposal 2 has no response: the failed call degrades to Active.

    let states = machine(reader, &store, StubSource::default())
        .derive_azorius(&dao, module, None)
        .await
        .unwrap();

    // proposals_for_dao lists newest first.
    assert_eq!(states.len(), 3);
    let by_id = |id: u64| states.iter().find(|s| s.proposal_id == id).unwrap().state;
    assert_eq!(by_id(0), FractalProposalState::Executed);
    assert_eq!(by_id(1), FractalProposalState::Executable);
    assert_eq!(by_id(2), FractalProposalState::Active);
}

#[tokio::test]
async fn azorius_derivation_can_target_a_subset_of_ids() {
    let store = EntityStore::in_memory().unwrap();
    let dao = dao_key();
    let module = addr(0x78);
    let reader = Arc::new(StubReader::default());

    for id in 0..3u64 {
        let patch = ProposalPatch {
            created_at: Some(NOW),
            ..Default::default()
        };
        store.upsert_proposal(&dao, id, &patch, &patch).unwrap();
    }
    reader.respond(
        module,
        reads::IAzorius::proposalStateCall { proposalId: 1 },
        U256::from(2u64).to_be_bytes::<32>().to_vec(),
    );

    let states = machine(reader, &store, StubSource::default())
        .derive_azorius(&dao, module, Some(&[1]))
        .await
        .unwrap();

    // Only the requested id is read and reported.
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].proposal_id, 1);
    assert_eq!(states[0].state, FractalProposalState::Executable);
}
