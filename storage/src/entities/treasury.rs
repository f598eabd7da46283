use alloy_primitives::Address;
use daoscan_common::{ChainId, DaoKey};
use error_stack::{Result, ResultExt};
use rusqlite::OptionalExtension;

use crate::{
    sql::{addr_value, col_addr, col_addr_opt, col_u64, col_u64_opt, u64_value},
    upsert::{PatchColumns, Upsert},
    EntityStore, StoreError,
};

/// A payment stream funded by a DAO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRow {
    pub chain_id: ChainId,
    pub stream_id: u64,
    pub dao_address: Address,
    pub recipient: Option<Address>,
    pub token: Option<Address>,
    pub created_at: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct StreamPatch {
    pub recipient: Option<Address>,
    pub token: Option<Address>,
    pub created_at: Option<u64>,
}

impl StreamPatch {
    fn columns(&self) -> Vec<(&'static str, rusqlite::types::Value)> {
        let mut columns = PatchColumns::new();
        columns
            .set("recipient", self.recipient.as_ref().map(addr_value))
            .set("token", self.token.as_ref().map(addr_value))
            .set("created_at", self.created_at.map(u64_value));
        columns.into_columns()
    }
}

fn stream_from_sql(row: &rusqlite::Row) -> rusqlite::Result<StreamRow> {
    Ok(StreamRow {
        chain_id: col_u64(row, 0)?.into(),
        stream_id: col_u64(row, 1)?,
        dao_address: col_addr(row, 2)?,
        recipient: col_addr_opt(row, 3)?,
        token: col_addr_opt(row, 4)?,
        created_at: col_u64_opt(row, 5)?,
    })
}

/// A split wallet controlled by a DAO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitWalletRow {
    pub chain_id: ChainId,
    pub address: Address,
    pub controller: Option<Address>,
    pub dao_address: Option<Address>,
    pub created_at: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct SplitWalletPatch {
    pub controller: Option<Address>,
    pub dao_address: Option<Address>,
    pub created_at: Option<u64>,
}

impl SplitWalletPatch {
    fn columns(&self) -> Vec<(&'static str, rusqlite::types::Value)> {
        let mut columns = PatchColumns::new();
        columns
            .set("controller", self.controller.as_ref().map(addr_value))
            .set("dao_address", self.dao_address.as_ref().map(addr_value))
            .set("created_at", self.created_at.map(u64_value));
        columns.into_columns()
    }
}

fn split_from_sql(row: &rusqlite::Row) -> rusqlite::Result<SplitWalletRow> {
    Ok(SplitWalletRow {
        chain_id: col_u64(row, 0)?.into(),
        address: col_addr(row, 1)?,
        controller: col_addr_opt(row, 2)?,
        dao_address: col_addr_opt(row, 3)?,
        created_at: col_u64_opt(row, 4)?,
    })
}

impl EntityStore {
    pub fn upsert_stream(
        &self,
        chain_id: ChainId,
        stream_id: u64,
        dao: &DaoKey,
        insert: &StreamPatch,
        update: &StreamPatch,
    ) -> Result<(), StoreError> {
        Upsert::new("streams")
            .key("chain_id", chain_id.0 as i64)
            .key("stream_id", stream_id as i64)
            .insert_columns(vec![("dao_address", addr_value(&dao.address))])
            .insert_columns(insert.columns())
            .update_columns(update.columns())
            .execute(&self.conn())
            .change_context(StoreError)
            .attach_printable("failed to upsert stream")
    }

    pub fn find_stream(
        &self,
        chain_id: ChainId,
        stream_id: u64,
    ) -> Result<Option<StreamRow>, StoreError> {
        self.conn()
            .query_row(
                "SELECT chain_id, stream_id, dao_address, recipient, token, created_at \
                 FROM streams WHERE chain_id = ?1 AND stream_id = ?2",
                (chain_id.0 as i64, stream_id as i64),
                stream_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query stream")
    }

    pub fn upsert_split_wallet(
        &self,
        chain_id: ChainId,
        address: &Address,
        insert: &SplitWalletPatch,
        update: &SplitWalletPatch,
    ) -> Result<(), StoreError> {
        Upsert::new("split_wallets")
            .key("chain_id", chain_id.0 as i64)
            .key("address", addr_value(address))
            .insert_columns(insert.columns())
            .update_columns(update.columns())
            .execute(&self.conn())
            .change_context(StoreError)
            .attach_printable("failed to upsert split wallet")
    }

    pub fn find_split_wallet(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<SplitWalletRow>, StoreError> {
        self.conn()
            .query_row(
                "SELECT chain_id, address, controller, dao_address, created_at \
                 FROM split_wallets WHERE chain_id = ?1 AND address = ?2",
                (chain_id.0 as i64, format!("{address:#x}")),
                split_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query split wallet")
    }
}
