use alloy_primitives::{Address, B256};
use daoscan_common::ChainId;
use error_stack::Result;

use crate::ChainReaderError;

/// A single call in a multicall batch.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub to: Address,
    pub data: Vec<u8>,
}

/// Result of one call in a multicall batch. `success` is false when the
/// call reverted; `data` may be empty even on success (no code at the
/// target).
#[derive(Debug, Clone)]
pub struct CallResult {
    pub success: bool,
    pub data: Vec<u8>,
}

impl CallResult {
    /// Whether the call succeeded and actually returned data.
    pub fn returned_data(&self) -> bool {
        self.success && !self.data.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub timestamp: u64,
}

/// Log range query, one address and up to four topics.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub address: Option<Address>,
    pub topics: Vec<Option<B256>>,
    pub from_block: u64,
    pub to_block: u64,
}

#[derive(Debug, Clone)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub transaction_hash: B256,
    pub log_index: u64,
}

/// Read-only access to one chain.
///
/// A reader is bound to a single chain; cross-chain callers hold one
/// reader per chain. All methods are safe to issue concurrently.
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    fn chain_id(&self) -> ChainId;

    /// Execute a batch of calls in one request with per-call failure
    /// tolerance. `at_block` pins the calls to a historical block; `None`
    /// reads the latest state.
    async fn multicall(
        &self,
        calls: Vec<CallRequest>,
        at_block: Option<u64>,
    ) -> Result<Vec<CallResult>, ChainReaderError>;

    /// Header of the given block, or of the latest block when `None`.
    async fn get_block(&self, number: Option<u64>) -> Result<BlockHeader, ChainReaderError>;

    async fn get_storage_at(
        &self,
        address: Address,
        slot: B256,
    ) -> Result<B256, ChainReaderError>;

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, ChainReaderError>;
}
