use std::fmt;

use alloy_primitives::B256;
use async_trait::async_trait;
use daoscan_common::DaoKey;
use error_stack::Result;

/// Error context for transaction source lookups.
#[derive(Debug)]
pub struct SourceError;

impl error_stack::Context for SourceError {}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("safe transaction source error")
    }
}

/// Live signature state of one Safe transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeTxInfo {
    pub confirmations: u64,
    pub confirmations_required: u64,
}

/// Source of live Safe transaction data.
///
/// Confirmations accumulate off-chain between indexed events, so state
/// derivation refreshes them per proposal instead of trusting the stored
/// row. Implemented against the Safe transaction service in production
/// and stubbed in tests.
#[async_trait]
pub trait SafeTransactionSource: Send + Sync {
    async fn transaction_info(
        &self,
        dao: &DaoKey,
        safe_tx_hash: &B256,
    ) -> Result<Option<SafeTxInfo>, SourceError>;
}
