use alloy_primitives::{Address, B256};
use daoscan_common::ChainId;
use serde::{Deserialize, Serialize};

/// A decoded log, one per (transaction, log index), delivered in
/// per-chain block and log order.
///
/// `args` carries the event payload as loosely typed JSON; the typed
/// decoding step in [`crate::events`] turns the (contract, event) pair
/// plus args into a [`crate::ContractEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub chain_id: ChainId,
    pub contract_name: String,
    pub event_name: String,
    pub log_address: Address,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub log_index: u64,
    pub transaction_hash: B256,
    #[serde(default)]
    pub transaction_from: Option<Address>,
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}
