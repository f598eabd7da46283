//! Core types shared by the daoscan crates.

mod chain;

pub use self::chain::{ChainId, MULTICALL3_ADDRESS};

pub use alloy_primitives::{Address, B256, U256};

/// Identifies a DAO across all chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DaoKey {
    pub chain_id: ChainId,
    pub address: Address,
}

impl DaoKey {
    pub fn new(chain_id: ChainId, address: Address) -> Self {
        Self { chain_id, address }
    }
}

impl std::fmt::Display for DaoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.chain_id, self.address)
    }
}
