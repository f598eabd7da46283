use std::{collections::HashMap, sync::Arc, sync::Mutex};

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use daoscan_chain::{
    reads, BlockHeader, CallRequest, CallResult, ChainReader, ChainReaderError, LogFilter, RawLog,
};
use daoscan_common::{ChainId, DaoKey};
use daoscan_indexer::{EventDispatcher, EventEnvelope, Watchlist};
use daoscan_storage::{EntityStore, FreezeVoteType, ModuleType, TokenType};
use error_stack::{Report, Result};
use serde_json::json;

/// Answers multicalls from a fixed (address, selector) → return data
/// table; anything absent fails the individual call, like an EOA or a
/// reverting contract would.
#[derive(Default)]
struct StubReader {
    responses: Mutex<HashMap<(Address, [u8; 4]), Vec<u8>>>,
}

impl StubReader {
    fn respond<C: SolCall>(&self, to: Address, data: Vec<u8>) {
        self.responses
            .lock()
            .unwrap()
            .insert((to, C::SELECTOR), data);
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
            .map(|call| {
                let selector: [u8; 4] = call.data[..4].try_into().unwrap();
                match responses.get(&(call.to, selector)) {
                    Some(data) => CallResult {
                        success: true,
                        data: data.clone(),
                    },
                    None => CallResult {
                        success: false,
                        data: Vec::new(),
                    },
                }
            })
            .collect())
    }

    async fn get_block(&self, _number: Option<u64>) -> Result<BlockHeader, ChainReaderError> {
        Ok(BlockHeader {
            number: 100,
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

const NOW: u64 = 1_700_000_000;

fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

fn word_u64(value: u64) -> Vec<u8> {
    U256::from(value).to_be_bytes::<32>().to_vec()
}

fn word_addr(address: Address) -> Vec<u8> {
    let mut word = vec![0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

fn word_bool(value: bool) -> Vec<u8> {
    word_u64(value as u64)
}

fn envelope(
    contract: &str,
    event: &str,
    log_address: Address,
    tx: u8,
    args: serde_json::Value,
) -> EventEnvelope {
    EventEnvelope {
        chain_id: ChainId::MAINNET,
        contract_name: contract.to_string(),
        event_name: event.to_string(),
        log_address,
        block_number: 100,
        block_timestamp: NOW,
        log_index: 0,
        transaction_hash: B256::repeat_byte(tx),
        transaction_from: None,
        args: args.as_object().cloned().unwrap_or_default(),
    }
}

fn dispatcher(store: &EntityStore) -> EventDispatcher {
    EventDispatcher::new(store.clone(), Arc::new(Watchlist::new()))
}

fn name_update(dao: Address, name: &str, tx: u8) -> EventEnvelope {
    envelope(
        "FractalRegistry",
        "FractalNameUpdated",
        addr(0xee),
        tx,
        json!({ "daoAddress": format!("{dao:#x}"), "daoName": name }),
    )
}

#[tokio::test]
async fn registered_dao_is_kept_when_it_answers_like_a_safe() {
    let store = EntityStore::in_memory().unwrap();
    let reader = StubReader::default();
    let dao = addr(0x11);
    reader.respond::<reads::IGnosisSafe::getThresholdCall>(dao, word_u64(2));

    dispatcher(&store)
        .apply(&reader, &[name_update(dao, "Treasury DAO", 1)])
        .await;

    let row = store
        .find_dao(&DaoKey::new(ChainId::MAINNET, dao))
        .unwrap()
        .unwrap();
    assert_eq!(row.name.as_deref(), Some("Treasury DAO"));
    assert_eq!(row.created_at, Some(NOW));
}

#[tokio::test]
async fn dao_failing_safe_validation_is_removed() {
    let store = EntityStore::in_memory().unwrap();
    let reader = StubReader::default();
    let dao = addr(0x12);

    dispatcher(&store)
        .apply(&reader, &[name_update(dao, "Not a Safe", 1)])
        .await;

    assert!(store
        .find_dao(&DaoKey::new(ChainId::MAINNET, dao))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn malformed_event_does_not_halt_the_batch() {
    let store = EntityStore::in_memory().unwrap();
    let reader = StubReader::default();
    let dao = addr(0x13);
    reader.respond::<reads::IGnosisSafe::getThresholdCall>(dao, word_u64(1));

    let bad = envelope("MysteryContract", "MysteryEvent", addr(0xaa), 1, json!({}));
    let missing_args = envelope("FractalRegistry", "FractalNameUpdated", addr(0xee), 1, json!({}));

    dispatcher(&store)
        .apply(&reader, &[bad, missing_args, name_update(dao, "Survivor", 1)])
        .await;

    let row = store
        .find_dao(&DaoKey::new(ChainId::MAINNET, dao))
        .unwrap()
        .unwrap();
    assert_eq!(row.name.as_deref(), Some("Survivor"));
}

#[tokio::test]
async fn factory_child_is_probed_and_indexed_as_azorius_module() {
    let store = EntityStore::in_memory().unwrap();
    let reader = StubReader::default();
    let proxy = addr(0x21);
    let dao = addr(0x22);
    reader.respond::<reads::IAzorius::timelockPeriodCall>(proxy, word_u64(300));
    reader.respond::<reads::IAzorius::executionPeriodCall>(proxy, word_u64(600));
    reader.respond::<reads::IAzorius::avatarCall>(proxy, word_addr(dao));

    let watchlist = Arc::new(Watchlist::new());
    let dispatcher = EventDispatcher::new(store.clone(), watchlist.clone());
    dispatcher
        .apply(
            &reader,
            &[envelope(
                "ModuleProxyFactory",
                "ModuleProxyCreation",
                addr(0xfa),
                1,
                json!({ "proxy": format!("{proxy:#x}"), "masterCopy": format!("{:#x}", addr(0xfb)) }),
            )],
        )
        .await;

    assert!(watchlist.contains(ChainId::MAINNET, &proxy));

    let row = store.find_governance_module(&proxy).unwrap().unwrap();
    assert_eq!(row.dao, DaoKey::new(ChainId::MAINNET, dao));
    assert_eq!(row.module_type, ModuleType::Azorius);
    assert_eq!(row.timelock_period, Some(300));
    assert_eq!(row.execution_period, Some(600));
}

#[tokio::test]
async fn freeze_voting_child_records_its_owning_module() {
    let store = EntityStore::in_memory().unwrap();
    let reader = StubReader::default();
    let proxy = addr(0x25);
    let module = addr(0x26);
    reader.respond::<reads::IFreezeVoting::freezeVotesThresholdCall>(proxy, word_u64(5));
    reader.respond::<reads::IFreezeVoting::freezeProposalPeriodCall>(proxy, word_u64(60));
    reader.respond::<reads::IFreezeVoting::freezePeriodCall>(proxy, word_u64(600));
    reader.respond::<reads::IFreezeVoting::parentGnosisSafeCall>(proxy, word_addr(addr(0x27)));
    reader.respond::<reads::IFreezeVoting::ownerCall>(proxy, word_addr(module));

    dispatcher(&store)
        .apply(
            &reader,
            &[envelope(
                "ModuleProxyFactory",
                "ModuleProxyCreation",
                addr(0xfa),
                1,
                json!({ "proxy": format!("{proxy:#x}"), "masterCopy": format!("{:#x}", addr(0xfb)) }),
            )],
        )
        .await;

    let row = store.find_freeze_voting_strategy(&proxy).unwrap().unwrap();
    assert_eq!(row.freeze_vote_type, FreezeVoteType::Multisig);
    assert_eq!(row.governance_module_address, Some(module));
    assert_eq!(row.freeze_period, Some(600));
    assert_eq!(row.freeze_proposal_period, Some(60));
}

#[tokio::test]
async fn unverifiable_owner_writes_no_proposal_row() {
    let store = EntityStore::in_memory().unwrap();
    let reader = StubReader::default();
    let module = addr(0x31);
    // No avatar() response: the owning DAO cannot be resolved.

    dispatcher(&store)
        .apply(
            &reader,
            &[envelope(
                "Azorius",
                "ProposalCreated",
                module,
                1,
                json!({
                    "proposalId": 0,
                    "proposer": format!("{:#x}", addr(0x32)),
                    "strategy": format!("{:#x}", addr(0x33)),
                    "transactions": [],
                    "metadata": "{}",
                }),
            )],
        )
        .await;

    // The handler aborted; nothing was written under any plausible key.
    assert!(store
        .find_proposal(&DaoKey::new(ChainId::MAINNET, module), 0)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn correlation_bridges_proposal_created_to_strategy_events() {
    let store = EntityStore::in_memory().unwrap();
    let reader = StubReader::default();
    let module = addr(0x41);
    let strategy = addr(0x42);
    let dao = addr(0x43);
    // Only the module can resolve the DAO; the strategy deliberately has
    // no azoriusModule() response, so the bridge must come from the
    // correlation context.
    reader.respond::<reads::IAzorius::avatarCall>(module, word_addr(dao));

    let created = envelope(
        "Azorius",
        "ProposalCreated",
        module,
        7,
        json!({
            "proposalId": 4,
            "proposer": format!("{:#x}", addr(0x44)),
            "strategy": format!("{strategy:#x}"),
            "transactions": [
                { "to": format!("{:#x}", addr(0x45)), "value": "0x0", "data": "0x", "operation": 0 }
            ],
            "metadata": r#"{"title":"Fund grants","description":"Q3 budget"}"#,
        }),
    );
    let initialized = envelope(
        "LinearERC20Voting",
        "ProposalInitialized",
        strategy,
        7,
        json!({ "proposalId": 4, "votingEndBlock": 1234 }),
    );

    dispatcher(&store).apply(&reader, &[created, initialized]).await;

    let key = DaoKey::new(ChainId::MAINNET, dao);
    let row = store.find_proposal(&key, 4).unwrap().unwrap();
    assert_eq!(row.title.as_deref(), Some("Fund grants"));
    assert_eq!(row.voting_end_block, Some(1234));
    assert_eq!(row.transactions.len(), 1);
    assert_eq!(row.proposed_tx_hash, Some(B256::repeat_byte(7)));
}

#[tokio::test]
async fn replaying_a_batch_converges_on_the_same_rows() {
    let store = EntityStore::in_memory().unwrap();
    let reader = StubReader::default();
    let dao = addr(0x51);
    reader.respond::<reads::IGnosisSafe::getThresholdCall>(dao, word_u64(3));

    let batch = [name_update(dao, "Replayed", 1)];
    let dispatcher = dispatcher(&store);
    dispatcher.apply(&reader, &batch).await;
    let first = store
        .find_dao(&DaoKey::new(ChainId::MAINNET, dao))
        .unwrap()
        .unwrap();

    dispatcher.apply(&reader, &batch).await;
    let second = store
        .find_dao(&DaoKey::new(ChainId::MAINNET, dao))
        .unwrap()
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn erc721_strategy_tokens_register_and_remove() {
    let store = EntityStore::in_memory().unwrap();
    let reader = StubReader::default();
    let strategy = addr(0x61);
    let token = addr(0x62);

    let added = envelope(
        "LinearERC721Voting",
        "GovernanceTokenAdded",
        strategy,
        1,
        json!({ "token": format!("{token:#x}"), "weight": 2 }),
    );
    let removed = envelope(
        "LinearERC721Voting",
        "GovernanceTokenRemoved",
        strategy,
        2,
        json!({ "token": format!("{token:#x}") }),
    );

    let dispatcher = dispatcher(&store);
    dispatcher.apply(&reader, &[added]).await;
    let tokens = store.voting_tokens_for_strategy(&strategy).unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].token_type, TokenType::Erc721);
    assert_eq!(tokens[0].weight, Some(U256::from(2)));

    dispatcher.apply(&reader, &[removed]).await;
    assert!(store.voting_tokens_for_strategy(&strategy).unwrap().is_empty());
}

#[tokio::test]
async fn timelock_and_execution_correlate_by_safe_tx_hash() {
    let store = EntityStore::in_memory().unwrap();
    let reader = StubReader::default();
    let guard = addr(0x71);
    let safe = addr(0x72);
    let safe_tx_hash = B256::repeat_byte(0x73);
    reader.respond::<reads::IFreezeGuard::timelockPeriodCall>(guard, word_u64(120));
    reader.respond::<reads::IFreezeGuard::executionPeriodCall>(guard, word_u64(240));

    let setup = envelope(
        "MultisigFreezeGuard",
        "MultisigFreezeGuardSetup",
        guard,
        1,
        json!({ "childGnosisSafe": format!("{safe:#x}"), "owner": format!("{:#x}", addr(0x74)) }),
    );
    let timelocked = envelope(
        "MultisigFreezeGuard",
        "TransactionTimelocked",
        guard,
        2,
        json!({ "transactionHash": format!("{safe_tx_hash:#x}") }),
    );
    let executed = envelope(
        "GnosisSafe",
        "ExecutionSuccess",
        safe,
        3,
        json!({ "txHash": format!("{safe_tx_hash:#x}"), "payment": 0 }),
    );

    dispatcher(&store)
        .apply(&reader, &[setup, timelocked, executed])
        .await;

    let dao = DaoKey::new(ChainId::MAINNET, safe);
    let guard_row = store.latest_guard_for_dao(&dao).unwrap().unwrap();
    assert_eq!(guard_row.address, guard);
    assert_eq!(guard_row.timelock_period, Some(120));

    let dao_row = store.find_dao(&dao).unwrap().unwrap();
    assert_eq!(dao_row.guard_address, Some(guard));

    let execution = store
        .find_safe_proposal_execution(&dao, &safe_tx_hash)
        .unwrap()
        .unwrap();
    assert_eq!(execution.timelocked_block, Some(100));
    assert_eq!(execution.executed_block, Some(100));
    assert_eq!(execution.executed_tx_hash, Some(B256::repeat_byte(3)));
}

#[tokio::test]
async fn hat_that_fails_the_existence_read_leaves_no_role() {
    let store = EntityStore::in_memory().unwrap();
    let reader = StubReader::default();
    let hats = addr(0x81);
    let dao = addr(0x82);
    let dao_key = DaoKey::new(ChainId::MAINNET, dao);
    reader.respond::<reads::IGnosisSafe::getThresholdCall>(dao, word_u64(1));

    // Tree id 5 lives in the top 32 bits of the hat id.
    let hat_id = U256::from(5) << 224;
    let tree_update = envelope(
        "KeyValuePairs",
        "ValueUpdated",
        addr(0xee),
        1,
        json!({ "theAddress": format!("{dao:#x}"), "key": "hatsTreeId", "value": "5" }),
    );
    let active_hat = envelope(
        "Hats",
        "HatCreated",
        hats,
        2,
        json!({ "id": format!("{hat_id}"), "details": "ipfs://role-cid" }),
    );

    let dispatcher = dispatcher(&store);

    // Active hat: role row is written.
    reader.respond::<reads::IHats::isActiveHatCall>(hats, word_bool(true));
    dispatcher
        .apply(&reader, &[name_update(dao, "Roles DAO", 1), tree_update, active_hat.clone()])
        .await;
    let role = store.find_role(&dao_key, &hat_id).unwrap().unwrap();
    assert_eq!(role.details_cid.as_deref(), Some("ipfs://role-cid"));

    // The hat is revoked on-chain: replaying the creation removes the row.
    reader.respond::<reads::IHats::isActiveHatCall>(hats, word_bool(false));
    dispatcher.apply(&reader, &[active_hat]).await;
    assert!(store.find_role(&dao_key, &hat_id).unwrap().is_none());
}

#[tokio::test]
async fn streams_are_indexed_only_for_known_daos() {
    let store = EntityStore::in_memory().unwrap();
    let reader = StubReader::default();
    let dao = addr(0x91);
    let stranger = addr(0x92);
    reader.respond::<reads::IGnosisSafe::getThresholdCall>(dao, word_u64(1));

    let stream = |id: u64, sender: Address| {
        envelope(
            "SablierV2LockupLinear",
            "CreateLockupLinearStream",
            addr(0x93),
            1,
            json!({
                "streamId": id,
                "sender": format!("{sender:#x}"),
                "recipient": format!("{:#x}", addr(0x94)),
                "asset": format!("{:#x}", addr(0x95)),
            }),
        )
    };

    dispatcher(&store)
        .apply(
            &reader,
            &[name_update(dao, "Streaming DAO", 1), stream(7, dao), stream(8, stranger)],
        )
        .await;

    assert!(store.find_stream(ChainId::MAINNET, 7).unwrap().is_some());
    assert!(store.find_stream(ChainId::MAINNET, 8).unwrap().is_none());
}
