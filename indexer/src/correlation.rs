use std::collections::HashMap;

use alloy_primitives::Address;
use daoscan_common::DaoKey;

/// Correlation state scoped to one transaction's events.
///
/// A DAO deployment emits module, strategy, and proposal events in a
/// single transaction; the first event that resolves the owning DAO
/// through a chain read records it here so later events in the same
/// transaction skip the read. Reset at every transaction boundary, so
/// its size is bounded by the largest transaction seen.
#[derive(Debug, Default)]
pub struct TxCorrelation {
    module_dao: HashMap<Address, DaoKey>,
    proposal_dao: HashMap<u64, DaoKey>,
}

impl TxCorrelation {
    pub fn remember_module(&mut self, module: Address, dao: DaoKey) {
        self.module_dao.insert(module, dao);
    }

    pub fn module_dao(&self, module: &Address) -> Option<DaoKey> {
        self.module_dao.get(module).copied()
    }

    pub fn remember_proposal(&mut self, proposal_id: u64, dao: DaoKey) {
        self.proposal_dao.insert(proposal_id, dao);
    }

    pub fn proposal_dao(&self, proposal_id: u64) -> Option<DaoKey> {
        self.proposal_dao.get(&proposal_id).copied()
    }

    pub fn reset(&mut self) {
        self.module_dao.clear();
        self.proposal_dao.clear();
    }
}
