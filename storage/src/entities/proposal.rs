use alloy_primitives::{Address, B256, U256};
use daoscan_common::DaoKey;
use error_stack::{Result, ResultExt};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use crate::{
    sql::{addr_value, col_addr, col_addr_opt, col_hash_opt, col_u64, col_u64_opt, hash_value, u64_value},
    upsert::{PatchColumns, Upsert},
    EntityStore, StoreError,
};

/// One transaction in an Azorius proposal payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalTransaction {
    pub to: Address,
    pub value: U256,
    /// 0x-prefixed calldata.
    pub data: String,
    pub operation: u8,
}

/// An on-chain Azorius proposal, keyed by its on-chain proposal index.
/// Immutable once executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRow {
    pub dao: DaoKey,
    pub id: u64,
    pub proposer: Option<Address>,
    pub voting_strategy_address: Option<Address>,
    pub transactions: Vec<ProposalTransaction>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub voting_end_block: Option<u64>,
    pub created_at: Option<u64>,
    pub proposed_tx_hash: Option<B256>,
    pub executed_tx_hash: Option<B256>,
}

impl ProposalRow {
    pub fn is_executed(&self) -> bool {
        self.executed_tx_hash.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProposalPatch {
    pub proposer: Option<Address>,
    pub voting_strategy_address: Option<Address>,
    pub transactions: Option<Vec<ProposalTransaction>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub voting_end_block: Option<u64>,
    pub created_at: Option<u64>,
    pub proposed_tx_hash: Option<B256>,
    pub executed_tx_hash: Option<B256>,
}

impl ProposalPatch {
    fn columns(&self) -> Vec<(&'static str, rusqlite::types::Value)> {
        let transactions = self.transactions.as_ref().map(|txs| {
            // Serializing plain structs to a JSON array cannot fail.
            serde_json::to_string(txs).unwrap_or_else(|_| "[]".to_string())
        });

        let mut columns = PatchColumns::new();
        columns
            .set("proposer", self.proposer.as_ref().map(addr_value))
            .set(
                "voting_strategy_address",
                self.voting_strategy_address.as_ref().map(addr_value),
            )
            .set("transactions", transactions.map(Into::into))
            .set("title", self.title.clone().map(Into::into))
            .set("description", self.description.clone().map(Into::into))
            .set("voting_end_block", self.voting_end_block.map(u64_value))
            .set("created_at", self.created_at.map(u64_value))
            .set(
                "proposed_tx_hash",
                self.proposed_tx_hash.as_ref().map(hash_value),
            )
            .set(
                "executed_tx_hash",
                self.executed_tx_hash.as_ref().map(hash_value),
            );
        columns.into_columns()
    }
}

const PROPOSAL_COLUMNS: &str = "dao_chain_id, dao_address, id, proposer, \
     voting_strategy_address, transactions, title, description, voting_end_block, \
     created_at, proposed_tx_hash, executed_tx_hash";

fn proposal_from_sql(row: &rusqlite::Row) -> rusqlite::Result<ProposalRow> {
    let transactions: Option<String> = row.get(5)?;
    let transactions = transactions
        .map(|text| {
            serde_json::from_str(&text).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    Box::new(err),
                )
            })
        })
        .transpose()?
        .unwrap_or_default();

    Ok(ProposalRow {
        dao: DaoKey::new(col_u64(row, 0)?.into(), col_addr(row, 1)?),
        id: col_u64(row, 2)?,
        proposer: col_addr_opt(row, 3)?,
        voting_strategy_address: col_addr_opt(row, 4)?,
        transactions,
        title: row.get(6)?,
        description: row.get(7)?,
        voting_end_block: col_u64_opt(row, 8)?,
        created_at: col_u64_opt(row, 9)?,
        proposed_tx_hash: col_hash_opt(row, 10)?,
        executed_tx_hash: col_hash_opt(row, 11)?,
    })
}

impl EntityStore {
    pub fn upsert_proposal(
        &self,
        dao: &DaoKey,
        id: u64,
        insert: &ProposalPatch,
        update: &ProposalPatch,
    ) -> Result<(), StoreError> {
        Upsert::new("proposals")
            .key("dao_chain_id", dao.chain_id.0 as i64)
            .key("dao_address", addr_value(&dao.address))
            .key("id", id as i64)
            .insert_columns(insert.columns())
            .update_columns(update.columns())
            .execute(&self.conn())
            .change_context(StoreError)
            .attach_printable("failed to upsert proposal")
    }

    pub fn find_proposal(&self, dao: &DaoKey, id: u64) -> Result<Option<ProposalRow>, StoreError> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {PROPOSAL_COLUMNS} FROM proposals \
                     WHERE dao_chain_id = ?1 AND dao_address = ?2 AND id = ?3"
                ),
                (
                    dao.chain_id.0 as i64,
                    format!("{:#x}", dao.address),
                    id as i64,
                ),
                proposal_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query proposal")
    }

    pub fn proposals_for_dao(&self, dao: &DaoKey) -> Result<Vec<ProposalRow>, StoreError> {
        let conn = self.conn();
        let mut statement = conn
            .prepare(&format!(
                "SELECT {PROPOSAL_COLUMNS} FROM proposals \
                 WHERE dao_chain_id = ?1 AND dao_address = ?2 ORDER BY id DESC"
            ))
            .change_context(StoreError)?;
        let rows = statement
            .query_map(
                (dao.chain_id.0 as i64, format!("{:#x}", dao.address)),
                proposal_from_sql,
            )
            .change_context(StoreError)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .change_context(StoreError)
            .attach_printable("failed to query proposals for dao")?;
        Ok(rows)
    }
}
