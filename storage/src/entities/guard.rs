use alloy_primitives::{Address, U256};
use daoscan_common::{ChainId, DaoKey};
use error_stack::{Result, ResultExt};
use rusqlite::OptionalExtension;

use crate::{
    sql::{addr_value, col_addr, col_addr_opt, col_u256_opt, col_u64, col_u64_opt, u256_value, u64_value},
    upsert::{PatchColumns, Upsert},
    EntityStore, StoreError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeVoteType {
    Multisig,
    Erc20,
    Erc721,
}

impl FreezeVoteType {
    fn as_str(&self) -> &'static str {
        match self {
            FreezeVoteType::Multisig => "MULTISIG",
            FreezeVoteType::Erc20 => "ERC20",
            FreezeVoteType::Erc721 => "ERC721",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "MULTISIG" => Some(FreezeVoteType::Multisig),
            "ERC20" => Some(FreezeVoteType::Erc20),
            "ERC721" => Some(FreezeVoteType::Erc721),
            _ => None,
        }
    }
}

/// A freeze guard attached to a DAO. DAOs rotate guards over time, so the
/// guard address is part of the key and the DAO row points at the current
/// one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernanceGuardRow {
    pub dao: DaoKey,
    pub address: Address,
    pub timelock_period: Option<u64>,
    pub execution_period: Option<u64>,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct GovernanceGuardPatch {
    pub timelock_period: Option<u64>,
    pub execution_period: Option<u64>,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
}

impl GovernanceGuardPatch {
    fn columns(&self) -> Vec<(&'static str, rusqlite::types::Value)> {
        let mut columns = PatchColumns::new();
        columns
            .set("timelock_period", self.timelock_period.map(u64_value))
            .set("execution_period", self.execution_period.map(u64_value))
            .set("created_at", self.created_at.map(u64_value))
            .set("updated_at", self.updated_at.map(u64_value));
        columns.into_columns()
    }
}

const GUARD_COLUMNS: &str = "dao_chain_id, dao_address, address, timelock_period, \
     execution_period, created_at, updated_at";

fn guard_from_sql(row: &rusqlite::Row) -> rusqlite::Result<GovernanceGuardRow> {
    Ok(GovernanceGuardRow {
        dao: DaoKey::new(col_u64(row, 0)?.into(), col_addr(row, 1)?),
        address: col_addr(row, 2)?,
        timelock_period: col_u64_opt(row, 3)?,
        execution_period: col_u64_opt(row, 4)?,
        created_at: col_u64_opt(row, 5)?,
        updated_at: col_u64_opt(row, 6)?,
    })
}

/// A freeze voting strategy contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreezeVotingStrategyRow {
    pub address: Address,
    pub governance_module_address: Option<Address>,
    pub freeze_vote_type: FreezeVoteType,
    pub freeze_period: Option<u64>,
    pub freeze_proposal_period: Option<u64>,
    pub freeze_votes_threshold: Option<U256>,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct FreezeVotingStrategyPatch {
    pub governance_module_address: Option<Address>,
    pub freeze_period: Option<u64>,
    pub freeze_proposal_period: Option<u64>,
    pub freeze_votes_threshold: Option<U256>,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
}

impl FreezeVotingStrategyPatch {
    fn columns(&self) -> Vec<(&'static str, rusqlite::types::Value)> {
        let mut columns = PatchColumns::new();
        columns
            .set(
                "governance_module_address",
                self.governance_module_address.as_ref().map(addr_value),
            )
            .set("freeze_period", self.freeze_period.map(u64_value))
            .set(
                "freeze_proposal_period",
                self.freeze_proposal_period.map(u64_value),
            )
            .set(
                "freeze_votes_threshold",
                self.freeze_votes_threshold.as_ref().map(u256_value),
            )
            .set("created_at", self.created_at.map(u64_value))
            .set("updated_at", self.updated_at.map(u64_value));
        columns.into_columns()
    }
}

const FREEZE_COLUMNS: &str = "address, governance_module_address, freeze_vote_type, \
     freeze_period, freeze_proposal_period, freeze_votes_threshold, created_at, updated_at";

fn freeze_from_sql(row: &rusqlite::Row) -> rusqlite::Result<FreezeVotingStrategyRow> {
    let type_text: String = row.get(2)?;
    let freeze_vote_type = FreezeVoteType::parse(&type_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown freeze vote type: {type_text}").into(),
        )
    })?;
    Ok(FreezeVotingStrategyRow {
        address: col_addr(row, 0)?,
        governance_module_address: col_addr_opt(row, 1)?,
        freeze_vote_type,
        freeze_period: col_u64_opt(row, 3)?,
        freeze_proposal_period: col_u64_opt(row, 4)?,
        freeze_votes_threshold: col_u256_opt(row, 5)?,
        created_at: col_u64_opt(row, 6)?,
        updated_at: col_u64_opt(row, 7)?,
    })
}

impl EntityStore {
    pub fn upsert_governance_guard(
        &self,
        dao: &DaoKey,
        address: &Address,
        insert: &GovernanceGuardPatch,
        update: &GovernanceGuardPatch,
    ) -> Result<(), StoreError> {
        Upsert::new("governance_guards")
            .key("dao_chain_id", dao.chain_id.0 as i64)
            .key("dao_address", addr_value(&dao.address))
            .key("address", addr_value(address))
            .insert_columns(insert.columns())
            .update_columns(update.columns())
            .execute(&self.conn())
            .change_context(StoreError)
            .attach_printable("failed to upsert governance guard")
    }

    pub fn find_governance_guard(
        &self,
        dao: &DaoKey,
        address: &Address,
    ) -> Result<Option<GovernanceGuardRow>, StoreError> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {GUARD_COLUMNS} FROM governance_guards \
                     WHERE dao_chain_id = ?1 AND dao_address = ?2 AND address = ?3"
                ),
                (
                    dao.chain_id.0 as i64,
                    format!("{:#x}", dao.address),
                    format!("{address:#x}"),
                ),
                guard_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query governance guard")
    }

    /// The guard a timelock event came from: guards are deployed one per
    /// DAO, so the emitting address identifies the row.
    pub fn find_guard_by_address(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<GovernanceGuardRow>, StoreError> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {GUARD_COLUMNS} FROM governance_guards \
                     WHERE dao_chain_id = ?1 AND address = ?2"
                ),
                (chain_id.0 as i64, format!("{address:#x}")),
                guard_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query guard by address")
    }

    /// The most recently written guard for a DAO; latest write wins.
    pub fn latest_guard_for_dao(
        &self,
        dao: &DaoKey,
    ) -> Result<Option<GovernanceGuardRow>, StoreError> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {GUARD_COLUMNS} FROM governance_guards \
                     WHERE dao_chain_id = ?1 AND dao_address = ?2 \
                     ORDER BY updated_at DESC, created_at DESC LIMIT 1"
                ),
                (dao.chain_id.0 as i64, format!("{:#x}", dao.address)),
                guard_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query latest guard for dao")
    }

    pub fn upsert_freeze_voting_strategy(
        &self,
        address: &Address,
        freeze_vote_type: FreezeVoteType,
        insert: &FreezeVotingStrategyPatch,
        update: &FreezeVotingStrategyPatch,
    ) -> Result<(), StoreError> {
        Upsert::new("freeze_voting_strategies")
            .key("address", addr_value(address))
            .insert_columns(vec![(
                "freeze_vote_type",
                freeze_vote_type.as_str().to_string().into(),
            )])
            .insert_columns(insert.columns())
            .update_columns(update.columns())
            .execute(&self.conn())
            .change_context(StoreError)
            .attach_printable("failed to upsert freeze voting strategy")
    }

    pub fn find_freeze_voting_strategy(
        &self,
        address: &Address,
    ) -> Result<Option<FreezeVotingStrategyRow>, StoreError> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {FREEZE_COLUMNS} FROM freeze_voting_strategies WHERE address = ?1"
                ),
                [format!("{address:#x}")],
                freeze_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query freeze voting strategy")
    }
}
