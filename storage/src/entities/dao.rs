use alloy_primitives::{Address, U256};
use daoscan_common::DaoKey;
use error_stack::{Result, ResultExt};
use rusqlite::OptionalExtension;

use crate::{
    sql::{
        addr_value, bool_value, col_addr, col_addr_opt, col_bool_opt, col_u256_opt, col_u64_opt,
        u256_value, u64_value,
    },
    upsert::{PatchColumns, Upsert},
    EntityStore, StoreError,
};

/// A registered DAO. The row is provisional until the address passes the
/// Safe validation probe; a failed probe deletes it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaoRow {
    pub key: DaoKey,
    pub name: Option<String>,
    pub proposal_templates_cid: Option<String>,
    pub snapshot_ens: Option<String>,
    pub sub_dao_of: Option<Address>,
    pub top_hat_id: Option<U256>,
    pub tree_id: Option<u64>,
    pub gas_tank_enabled: Option<bool>,
    pub gas_tank_address: Option<Address>,
    pub erc20_address: Option<Address>,
    pub guard_address: Option<Address>,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct DaoPatch {
    pub name: Option<String>,
    pub proposal_templates_cid: Option<String>,
    pub snapshot_ens: Option<String>,
    pub sub_dao_of: Option<Address>,
    pub top_hat_id: Option<U256>,
    pub tree_id: Option<u64>,
    pub gas_tank_enabled: Option<bool>,
    pub gas_tank_address: Option<Address>,
    pub erc20_address: Option<Address>,
    pub guard_address: Option<Address>,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
}

impl DaoPatch {
    fn columns(&self) -> Vec<(&'static str, rusqlite::types::Value)> {
        let mut columns = PatchColumns::new();
        columns
            .set("name", self.name.clone().map(Into::into))
            .set(
                "proposal_templates_cid",
                self.proposal_templates_cid.clone().map(Into::into),
            )
            .set("snapshot_ens", self.snapshot_ens.clone().map(Into::into))
            .set("sub_dao_of", self.sub_dao_of.as_ref().map(addr_value))
            .set("top_hat_id", self.top_hat_id.as_ref().map(u256_value))
            .set("tree_id", self.tree_id.map(u64_value))
            .set("gas_tank_enabled", self.gas_tank_enabled.map(bool_value))
            .set(
                "gas_tank_address",
                self.gas_tank_address.as_ref().map(addr_value),
            )
            .set("erc20_address", self.erc20_address.as_ref().map(addr_value))
            .set("guard_address", self.guard_address.as_ref().map(addr_value))
            .set("created_at", self.created_at.map(u64_value))
            .set("updated_at", self.updated_at.map(u64_value));
        columns.into_columns()
    }
}

const DAO_COLUMNS: &str = "chain_id, address, name, proposal_templates_cid, snapshot_ens, \
     sub_dao_of, top_hat_id, tree_id, gas_tank_enabled, gas_tank_address, erc20_address, \
     guard_address, created_at, updated_at";

fn row_from_sql(row: &rusqlite::Row) -> rusqlite::Result<DaoRow> {
    Ok(DaoRow {
        key: DaoKey::new(crate::sql::col_u64(row, 0)?.into(), col_addr(row, 1)?),
        name: row.get(2)?,
        proposal_templates_cid: row.get(3)?,
        snapshot_ens: row.get(4)?,
        sub_dao_of: col_addr_opt(row, 5)?,
        top_hat_id: col_u256_opt(row, 6)?,
        tree_id: col_u64_opt(row, 7)?,
        gas_tank_enabled: col_bool_opt(row, 8)?,
        gas_tank_address: col_addr_opt(row, 9)?,
        erc20_address: col_addr_opt(row, 10)?,
        guard_address: col_addr_opt(row, 11)?,
        created_at: col_u64_opt(row, 12)?,
        updated_at: col_u64_opt(row, 13)?,
    })
}

impl EntityStore {
    pub fn upsert_dao(
        &self,
        key: &DaoKey,
        insert: &DaoPatch,
        update: &DaoPatch,
    ) -> Result<(), StoreError> {
        Upsert::new("daos")
            .key("chain_id", key.chain_id.0 as i64)
            .key("address", addr_value(&key.address))
            .insert_columns(insert.columns())
            .update_columns(update.columns())
            .execute(&self.conn())
            .change_context(StoreError)
            .attach_printable("failed to upsert dao")
    }

    pub fn find_dao(&self, key: &DaoKey) -> Result<Option<DaoRow>, StoreError> {
        self.conn()
            .query_row(
                &format!("SELECT {DAO_COLUMNS} FROM daos WHERE chain_id = ?1 AND address = ?2"),
                (key.chain_id.0 as i64, format!("{:#x}", key.address)),
                row_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query dao")
    }

    pub fn find_dao_by_tree_id(
        &self,
        chain_id: daoscan_common::ChainId,
        tree_id: u64,
    ) -> Result<Option<DaoRow>, StoreError> {
        self.conn()
            .query_row(
                &format!("SELECT {DAO_COLUMNS} FROM daos WHERE chain_id = ?1 AND tree_id = ?2"),
                (chain_id.0 as i64, tree_id as i64),
                row_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query dao by tree id")
    }

    /// Compensating action: remove a DAO row whose address failed the
    /// Safe validation probe after insertion.
    pub fn delete_dao(&self, key: &DaoKey) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "DELETE FROM daos WHERE chain_id = ?1 AND address = ?2",
                (key.chain_id.0 as i64, format!("{:#x}", key.address)),
            )
            .change_context(StoreError)
            .attach_printable("failed to delete dao")?;
        Ok(())
    }
}
