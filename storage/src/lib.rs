//! Relational store for indexed governance entities.
//!
//! All writes go through composite-key upserts: insert the row if the key
//! is new, otherwise apply only the fields carried by the update patch.
//! Replaying the same event therefore converges on the same row, which is
//! what makes the indexer safe to restart mid-stream.

mod entities;
mod sql;
mod upsert;

use std::{
    fmt,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use error_stack::{Result, ResultExt};
use rusqlite::Connection;
use tracing::debug;

pub use self::entities::block_timestamp::{BlockTimestampPatch, BlockTimestampRow};
pub use self::entities::dao::{DaoPatch, DaoRow};
pub use self::entities::governance::{
    GovernanceModulePatch, GovernanceModuleRow, ModuleType, TokenType, VotingStrategyPatch,
    VotingStrategyRow, VotingTokenPatch, VotingTokenRow,
};
pub use self::entities::guard::{
    FreezeVoteType, FreezeVotingStrategyPatch, FreezeVotingStrategyRow, GovernanceGuardPatch,
    GovernanceGuardRow,
};
pub use self::entities::proposal::{ProposalPatch, ProposalRow, ProposalTransaction};
pub use self::entities::roles::{RolePatch, RoleRow};
pub use self::entities::safe::{
    SafeConfirmation, SafeProposalExecutionPatch, SafeProposalExecutionRow, SafeProposalPatch,
    SafeProposalRow,
};
pub use self::entities::treasury::{
    SplitWalletPatch, SplitWalletRow, StreamPatch, StreamRow,
};

/// Error context for all store operations.
#[derive(Debug)]
pub struct StoreError;

impl error_stack::Context for StoreError {}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("entity store error")
    }
}

const MIGRATIONS: &[&str] = &[r#"
    CREATE TABLE IF NOT EXISTS daos (
        chain_id INTEGER NOT NULL,
        address TEXT NOT NULL,
        name TEXT,
        proposal_templates_cid TEXT,
        snapshot_ens TEXT,
        sub_dao_of TEXT,
        top_hat_id TEXT,
        tree_id INTEGER,
        gas_tank_enabled INTEGER,
        gas_tank_address TEXT,
        erc20_address TEXT,
        guard_address TEXT,
        created_at INTEGER,
        updated_at INTEGER,
        PRIMARY KEY (chain_id, address)
    );

    CREATE TABLE IF NOT EXISTS governance_modules (
        address TEXT NOT NULL PRIMARY KEY,
        dao_chain_id INTEGER NOT NULL,
        dao_address TEXT NOT NULL,
        module_type TEXT NOT NULL,
        execution_period INTEGER,
        timelock_period INTEGER,
        created_at INTEGER,
        updated_at INTEGER
    );

    CREATE TABLE IF NOT EXISTS voting_strategies (
        address TEXT NOT NULL PRIMARY KEY,
        governance_module_address TEXT NOT NULL,
        voting_period INTEGER,
        basis_numerator INTEGER,
        quorum_numerator INTEGER,
        required_proposer_weight TEXT,
        created_at INTEGER,
        updated_at INTEGER
    );

    CREATE TABLE IF NOT EXISTS voting_tokens (
        address TEXT NOT NULL,
        voting_strategy_address TEXT NOT NULL,
        token_type TEXT NOT NULL,
        weight TEXT,
        PRIMARY KEY (address, voting_strategy_address)
    );

    CREATE TABLE IF NOT EXISTS freeze_voting_strategies (
        address TEXT NOT NULL PRIMARY KEY,
        governance_module_address TEXT,
        freeze_vote_type TEXT NOT NULL,
        freeze_period INTEGER,
        freeze_proposal_period INTEGER,
        freeze_votes_threshold TEXT,
        created_at INTEGER,
        updated_at INTEGER
    );

    CREATE TABLE IF NOT EXISTS governance_guards (
        dao_chain_id INTEGER NOT NULL,
        dao_address TEXT NOT NULL,
        address TEXT NOT NULL,
        timelock_period INTEGER,
        execution_period INTEGER,
        created_at INTEGER,
        updated_at INTEGER,
        PRIMARY KEY (dao_chain_id, dao_address, address)
    );

    CREATE TABLE IF NOT EXISTS proposals (
        dao_chain_id INTEGER NOT NULL,
        dao_address TEXT NOT NULL,
        id INTEGER NOT NULL,
        proposer TEXT,
        voting_strategy_address TEXT,
        transactions TEXT,
        title TEXT,
        description TEXT,
        voting_end_block INTEGER,
        created_at INTEGER,
        proposed_tx_hash TEXT,
        executed_tx_hash TEXT,
        PRIMARY KEY (dao_chain_id, dao_address, id)
    );

    CREATE TABLE IF NOT EXISTS safe_proposals (
        dao_chain_id INTEGER NOT NULL,
        dao_address TEXT NOT NULL,
        safe_tx_hash TEXT NOT NULL,
        safe_nonce INTEGER NOT NULL,
        proposer TEXT,
        metadata_cid TEXT,
        data_decoded TEXT,
        submission_date INTEGER,
        tx_to TEXT,
        tx_value TEXT,
        tx_data TEXT,
        confirmations TEXT,
        confirmations_required INTEGER,
        PRIMARY KEY (dao_chain_id, dao_address, safe_tx_hash)
    );

    CREATE TABLE IF NOT EXISTS safe_proposal_executions (
        dao_chain_id INTEGER NOT NULL,
        dao_address TEXT NOT NULL,
        safe_tx_hash TEXT NOT NULL,
        executed_tx_hash TEXT,
        executed_block INTEGER,
        timelocked_block INTEGER,
        PRIMARY KEY (dao_chain_id, dao_address, safe_tx_hash)
    );

    CREATE TABLE IF NOT EXISTS roles (
        dao_chain_id INTEGER NOT NULL,
        dao_address TEXT NOT NULL,
        hat_id TEXT NOT NULL,
        wearer TEXT,
        details_cid TEXT,
        created_at INTEGER,
        PRIMARY KEY (dao_chain_id, dao_address, hat_id)
    );

    CREATE TABLE IF NOT EXISTS streams (
        chain_id INTEGER NOT NULL,
        stream_id INTEGER NOT NULL,
        dao_address TEXT NOT NULL,
        recipient TEXT,
        token TEXT,
        created_at INTEGER,
        PRIMARY KEY (chain_id, stream_id)
    );

    CREATE TABLE IF NOT EXISTS split_wallets (
        chain_id INTEGER NOT NULL,
        address TEXT NOT NULL,
        controller TEXT,
        dao_address TEXT,
        created_at INTEGER,
        PRIMARY KEY (chain_id, address)
    );

    CREATE TABLE IF NOT EXISTS block_timestamps (
        chain_id INTEGER NOT NULL,
        block_number INTEGER NOT NULL,
        timestamp INTEGER,
        future INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (chain_id, block_number)
    );
    "#];

/// Shared handle to the relational store.
///
/// Cloning is cheap; all clones share one connection. Every upsert runs as
/// a single SQL statement, so concurrent chain streams never observe a
/// half-applied patch.
#[derive(Clone)]
pub struct EntityStore {
    conn: Arc<Mutex<Connection>>,
}

impl EntityStore {
    pub fn with_connection(connection: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(connection)),
        }
    }

    /// Open a store backed by a database file, applying migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let connection = Connection::open(path)
            .change_context(StoreError)
            .attach_printable("failed to open database file")?;
        let store = Self::with_connection(connection);
        store.initialize()?;
        Ok(store)
    }

    /// Open an in-memory store, applying migrations. Used by tests and
    /// ephemeral deployments.
    pub fn in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory()
            .change_context(StoreError)
            .attach_printable("failed to open in-memory database")?;
        let store = Self::with_connection(connection);
        store.initialize()?;
        Ok(store)
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        let conn = self.conn();
        for migration in MIGRATIONS {
            conn.execute_batch(migration)
                .change_context(StoreError)
                .attach_printable("failed to apply migration to database")?;
        }
        debug!(migrations = MIGRATIONS.len(), "database schema up to date");
        Ok(())
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-query;
        // the connection itself is still usable.
        self.conn.lock().unwrap_or_else(|err| err.into_inner())
    }
}
