use daoscan_common::ChainId;
use error_stack::{Result, ResultExt};
use rusqlite::OptionalExtension;

use crate::{
    sql::{bool_value, col_u64, col_u64_opt, u64_value},
    upsert::{PatchColumns, Upsert},
    EntityStore, StoreError,
};

/// Persisted (chain, block) → timestamp mapping. Exact entries are
/// permanent; `future` entries are estimates and go stale after a TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTimestampRow {
    pub chain_id: ChainId,
    pub block_number: u64,
    pub timestamp: Option<u64>,
    pub future: bool,
    pub updated_at: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlockTimestampPatch {
    pub timestamp: Option<u64>,
    pub future: Option<bool>,
    pub updated_at: Option<u64>,
}

impl BlockTimestampPatch {
    fn columns(&self) -> Vec<(&'static str, rusqlite::types::Value)> {
        let mut columns = PatchColumns::new();
        columns
            .set("timestamp", self.timestamp.map(u64_value))
            .set("future", self.future.map(bool_value))
            .set("updated_at", self.updated_at.map(u64_value));
        columns.into_columns()
    }
}

fn row_from_sql(row: &rusqlite::Row) -> rusqlite::Result<BlockTimestampRow> {
    let future: i64 = row.get(3)?;
    Ok(BlockTimestampRow {
        chain_id: col_u64(row, 0)?.into(),
        block_number: col_u64(row, 1)?,
        timestamp: col_u64_opt(row, 2)?,
        future: future != 0,
        updated_at: col_u64(row, 4)?,
    })
}

impl EntityStore {
    pub fn upsert_block_timestamp(
        &self,
        chain_id: ChainId,
        block_number: u64,
        insert: &BlockTimestampPatch,
        update: &BlockTimestampPatch,
    ) -> Result<(), StoreError> {
        Upsert::new("block_timestamps")
            .key("chain_id", chain_id.0 as i64)
            .key("block_number", block_number as i64)
            .insert_columns(insert.columns())
            .update_columns(update.columns())
            .execute(&self.conn())
            .change_context(StoreError)
            .attach_printable("failed to upsert block timestamp")
    }

    pub fn find_block_timestamp(
        &self,
        chain_id: ChainId,
        block_number: u64,
    ) -> Result<Option<BlockTimestampRow>, StoreError> {
        self.conn()
            .query_row(
                "SELECT chain_id, block_number, timestamp, future, updated_at \
                 FROM block_timestamps WHERE chain_id = ?1 AND block_number = ?2",
                (chain_id.0 as i64, block_number as i64),
                row_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query block timestamp")
    }
}
