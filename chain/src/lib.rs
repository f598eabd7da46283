//! Read-only chain access.
//!
//! Everything the indexer and the proposal state machine learn from a
//! live chain goes through the [`ChainReader`] trait: batched multicalls,
//! block lookups, storage slots, and log range queries. The JSON-RPC
//! implementation lives in [`jsonrpc`]; typed contract reads built on top
//! of `multicall` live in [`reads`].

mod block_time;
mod jsonrpc;
pub mod probe;
pub mod reads;
mod reader;

use std::fmt;

pub use self::block_time::{BlockTimestampCache, BlockTimestampCacheOptions};
pub use self::jsonrpc::{JsonRpcChainReader, JsonRpcChainReaderOptions};
pub use self::reader::{BlockHeader, CallRequest, CallResult, ChainReader, LogFilter, RawLog};

#[derive(Debug)]
pub enum ChainReaderError {
    /// The RPC request failed to send or the node returned an error.
    Request,
    /// The request timed out.
    Timeout,
    /// The requested block or entity does not exist.
    NotFound,
    /// A contract call reverted or returned no data.
    CallFailed,
    /// The response could not be decoded.
    Decode,
    /// Invalid reader configuration.
    Configuration,
}

impl error_stack::Context for ChainReaderError {}

impl fmt::Display for ChainReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainReaderError::Request => f.write_str("failed to send request"),
            ChainReaderError::Timeout => f.write_str("request timed out"),
            ChainReaderError::NotFound => f.write_str("not found"),
            ChainReaderError::CallFailed => f.write_str("contract call failed"),
            ChainReaderError::Decode => f.write_str("failed to decode response"),
            ChainReaderError::Configuration => f.write_str("configuration error"),
        }
    }
}
