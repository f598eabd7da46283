use alloy_primitives::{Address, B256, U256};
use daoscan_common::DaoKey;
use error_stack::{Result, ResultExt};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use crate::{
    sql::{
        addr_value, col_addr, col_addr_opt, col_hash, col_hash_opt, col_json_opt, col_u256_opt,
        col_u64, col_u64_opt, hash_value, json_value, u256_value, u64_value,
    },
    upsert::{PatchColumns, Upsert},
    EntityStore, StoreError,
};

/// A signature collected for an off-chain Safe proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeConfirmation {
    pub owner: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_date: Option<u64>,
}

/// An off-chain multisig proposal, keyed by its Safe transaction hash.
/// Rows are written by the API layer; the indexer only correlates
/// executions and timelocks to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeProposalRow {
    pub dao: DaoKey,
    pub safe_tx_hash: B256,
    pub safe_nonce: u64,
    pub proposer: Option<Address>,
    pub metadata_cid: Option<String>,
    pub data_decoded: Option<serde_json::Value>,
    pub submission_date: Option<u64>,
    pub tx_to: Option<Address>,
    pub tx_value: Option<U256>,
    pub tx_data: Option<String>,
    pub confirmations: Vec<SafeConfirmation>,
    pub confirmations_required: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct SafeProposalPatch {
    pub safe_nonce: Option<u64>,
    pub proposer: Option<Address>,
    pub metadata_cid: Option<String>,
    pub data_decoded: Option<serde_json::Value>,
    pub submission_date: Option<u64>,
    pub tx_to: Option<Address>,
    pub tx_value: Option<U256>,
    pub tx_data: Option<String>,
    pub confirmations: Option<Vec<SafeConfirmation>>,
    pub confirmations_required: Option<u64>,
}

impl SafeProposalPatch {
    fn columns(&self) -> Vec<(&'static str, rusqlite::types::Value)> {
        let confirmations = self
            .confirmations
            .as_ref()
            .map(|c| serde_json::to_string(c).unwrap_or_else(|_| "[]".to_string()));

        let mut columns = PatchColumns::new();
        columns
            .set("safe_nonce", self.safe_nonce.map(u64_value))
            .set("proposer", self.proposer.as_ref().map(addr_value))
            .set("metadata_cid", self.metadata_cid.clone().map(Into::into))
            .set("data_decoded", self.data_decoded.as_ref().map(json_value))
            .set("submission_date", self.submission_date.map(u64_value))
            .set("tx_to", self.tx_to.as_ref().map(addr_value))
            .set("tx_value", self.tx_value.as_ref().map(u256_value))
            .set("tx_data", self.tx_data.clone().map(Into::into))
            .set("confirmations", confirmations.map(Into::into))
            .set(
                "confirmations_required",
                self.confirmations_required.map(u64_value),
            );
        columns.into_columns()
    }
}

const SAFE_PROPOSAL_COLUMNS: &str = "dao_chain_id, dao_address, safe_tx_hash, safe_nonce, \
     proposer, metadata_cid, data_decoded, submission_date, tx_to, tx_value, tx_data, \
     confirmations, confirmations_required";

fn safe_proposal_from_sql(row: &rusqlite::Row) -> rusqlite::Result<SafeProposalRow> {
    let confirmations: Option<String> = row.get(11)?;
    let confirmations = confirmations
        .map(|text| {
            serde_json::from_str(&text).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    11,
                    rusqlite::types::Type::Text,
                    Box::new(err),
                )
            })
        })
        .transpose()?
        .unwrap_or_default();

    Ok(SafeProposalRow {
        dao: DaoKey::new(col_u64(row, 0)?.into(), col_addr(row, 1)?),
        safe_tx_hash: col_hash(row, 2)?,
        safe_nonce: col_u64(row, 3)?,
        proposer: col_addr_opt(row, 4)?,
        metadata_cid: row.get(5)?,
        data_decoded: col_json_opt(row, 6)?,
        submission_date: col_u64_opt(row, 7)?,
        tx_to: col_addr_opt(row, 8)?,
        tx_value: col_u256_opt(row, 9)?,
        tx_data: row.get(10)?,
        confirmations,
        confirmations_required: col_u64_opt(row, 12)?,
    })
}

/// Append-only record of what happened to a Safe transaction hash on
/// chain: timelocked by a guard, executed, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeProposalExecutionRow {
    pub dao: DaoKey,
    pub safe_tx_hash: B256,
    pub executed_tx_hash: Option<B256>,
    pub executed_block: Option<u64>,
    pub timelocked_block: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct SafeProposalExecutionPatch {
    pub executed_tx_hash: Option<B256>,
    pub executed_block: Option<u64>,
    pub timelocked_block: Option<u64>,
}

impl SafeProposalExecutionPatch {
    fn columns(&self) -> Vec<(&'static str, rusqlite::types::Value)> {
        let mut columns = PatchColumns::new();
        columns
            .set(
                "executed_tx_hash",
                self.executed_tx_hash.as_ref().map(hash_value),
            )
            .set("executed_block", self.executed_block.map(u64_value))
            .set("timelocked_block", self.timelocked_block.map(u64_value));
        columns.into_columns()
    }
}

fn execution_from_sql(row: &rusqlite::Row) -> rusqlite::Result<SafeProposalExecutionRow> {
    Ok(SafeProposalExecutionRow {
        dao: DaoKey::new(col_u64(row, 0)?.into(), col_addr(row, 1)?),
        safe_tx_hash: col_hash(row, 2)?,
        executed_tx_hash: col_hash_opt(row, 3)?,
        executed_block: col_u64_opt(row, 4)?,
        timelocked_block: col_u64_opt(row, 5)?,
    })
}

impl EntityStore {
    pub fn upsert_safe_proposal(
        &self,
        dao: &DaoKey,
        safe_tx_hash: &B256,
        insert: &SafeProposalPatch,
        update: &SafeProposalPatch,
    ) -> Result<(), StoreError> {
        Upsert::new("safe_proposals")
            .key("dao_chain_id", dao.chain_id.0 as i64)
            .key("dao_address", addr_value(&dao.address))
            .key("safe_tx_hash", hash_value(safe_tx_hash))
            .insert_columns(insert.columns())
            .update_columns(update.columns())
            .execute(&self.conn())
            .change_context(StoreError)
            .attach_printable("failed to upsert safe proposal")
    }

    pub fn find_safe_proposal(
        &self,
        dao: &DaoKey,
        safe_tx_hash: &B256,
    ) -> Result<Option<SafeProposalRow>, StoreError> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {SAFE_PROPOSAL_COLUMNS} FROM safe_proposals \
                     WHERE dao_chain_id = ?1 AND dao_address = ?2 AND safe_tx_hash = ?3"
                ),
                (
                    dao.chain_id.0 as i64,
                    format!("{:#x}", dao.address),
                    format!("{safe_tx_hash:#x}"),
                ),
                safe_proposal_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query safe proposal")
    }

    pub fn safe_proposals_for_dao(
        &self,
        dao: &DaoKey,
    ) -> Result<Vec<SafeProposalRow>, StoreError> {
        let conn = self.conn();
        let mut statement = conn
            .prepare(&format!(
                "SELECT {SAFE_PROPOSAL_COLUMNS} FROM safe_proposals \
                 WHERE dao_chain_id = ?1 AND dao_address = ?2 ORDER BY safe_nonce DESC"
            ))
            .change_context(StoreError)?;
        let rows = statement
            .query_map(
                (dao.chain_id.0 as i64, format!("{:#x}", dao.address)),
                safe_proposal_from_sql,
            )
            .change_context(StoreError)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .change_context(StoreError)
            .attach_printable("failed to query safe proposals for dao")?;
        Ok(rows)
    }

    pub fn upsert_safe_proposal_execution(
        &self,
        dao: &DaoKey,
        safe_tx_hash: &B256,
        insert: &SafeProposalExecutionPatch,
        update: &SafeProposalExecutionPatch,
    ) -> Result<(), StoreError> {
        Upsert::new("safe_proposal_executions")
            .key("dao_chain_id", dao.chain_id.0 as i64)
            .key("dao_address", addr_value(&dao.address))
            .key("safe_tx_hash", hash_value(safe_tx_hash))
            .insert_columns(insert.columns())
            .update_columns(update.columns())
            .execute(&self.conn())
            .change_context(StoreError)
            .attach_printable("failed to upsert safe proposal execution")
    }

    pub fn find_safe_proposal_execution(
        &self,
        dao: &DaoKey,
        safe_tx_hash: &B256,
    ) -> Result<Option<SafeProposalExecutionRow>, StoreError> {
        self.conn()
            .query_row(
                "SELECT dao_chain_id, dao_address, safe_tx_hash, executed_tx_hash, \
                 executed_block, timelocked_block FROM safe_proposal_executions \
                 WHERE dao_chain_id = ?1 AND dao_address = ?2 AND safe_tx_hash = ?3",
                (
                    dao.chain_id.0 as i64,
                    format!("{:#x}", dao.address),
                    format!("{safe_tx_hash:#x}"),
                ),
                execution_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query safe proposal execution")
    }
}
