use std::{
    collections::HashMap,
    sync::RwLock,
};

use alloy_primitives::Address;
use daoscan_common::ChainId;

/// ABI families a factory-deployed child may implement. The factory
/// event does not say which; probing disambiguates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateAbi {
    GovernanceModule,
    VotingStrategy,
    FreezeVoting,
    SplitWallet,
    HatsModule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedContract {
    pub candidates: Vec<CandidateAbi>,
    /// Block the contract was deployed at; log backfills start here.
    pub start_block: u64,
}

/// Per-chain set of addresses whose events the indexer cares about,
/// grown at runtime as factories announce children.
#[derive(Debug, Default)]
pub struct Watchlist {
    inner: RwLock<HashMap<ChainId, HashMap<Address, WatchedContract>>>,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory child. The first registration wins so a replay
    /// never moves the start block forward.
    pub fn register(&self, chain_id: ChainId, address: Address, watched: WatchedContract) {
        let mut inner = self.inner.write().unwrap_or_else(|err| err.into_inner());
        inner
            .entry(chain_id)
            .or_default()
            .entry(address)
            .or_insert(watched);
    }

    pub fn get(&self, chain_id: ChainId, address: &Address) -> Option<WatchedContract> {
        let inner = self.inner.read().unwrap_or_else(|err| err.into_inner());
        inner.get(&chain_id)?.get(address).cloned()
    }

    pub fn contains(&self, chain_id: ChainId, address: &Address) -> bool {
        let inner = self.inner.read().unwrap_or_else(|err| err.into_inner());
        inner
            .get(&chain_id)
            .map(|watched| watched.contains_key(address))
            .unwrap_or(false)
    }

    /// All watched addresses on a chain, for building log filters.
    pub fn addresses(&self, chain_id: ChainId) -> Vec<Address> {
        let inner = self.inner.read().unwrap_or_else(|err| err.into_inner());
        inner
            .get(&chain_id)
            .map(|watched| watched.keys().copied().collect())
            .unwrap_or_default()
    }
}
