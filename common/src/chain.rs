use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};

/// EIP-155 chain identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ChainId(pub u64);

/// The canonical Multicall3 deployment, shared across all supported chains.
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

impl ChainId {
    pub const MAINNET: ChainId = ChainId(1);
    pub const OPTIMISM: ChainId = ChainId(10);
    pub const POLYGON: ChainId = ChainId(137);
    pub const BASE: ChainId = ChainId(8453);
    pub const SEPOLIA: ChainId = ChainId(11155111);

    /// Fallback average block time in seconds, used when sampling the
    /// live average fails.
    pub fn default_block_time(&self) -> u64 {
        match *self {
            ChainId::MAINNET | ChainId::SEPOLIA => 12,
            ChainId::OPTIMISM | ChainId::BASE => 2,
            ChainId::POLYGON => 2,
            _ => 12,
        }
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(value: u64) -> Self {
        ChainId(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_block_time_falls_back_for_unknown_chains() {
        assert_eq!(ChainId(424242).default_block_time(), 12);
        assert_eq!(ChainId::BASE.default_block_time(), 2);
    }
}
