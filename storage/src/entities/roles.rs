use alloy_primitives::{Address, U256};
use daoscan_common::DaoKey;
use error_stack::{Result, ResultExt};
use rusqlite::OptionalExtension;

use crate::{
    sql::{addr_value, col_addr, col_addr_opt, col_u64, col_u64_opt, u256_value, u64_value},
    upsert::{PatchColumns, Upsert},
    EntityStore, StoreError,
};

/// A hat-based role in a DAO's tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRow {
    pub dao: DaoKey,
    pub hat_id: U256,
    pub wearer: Option<Address>,
    pub details_cid: Option<String>,
    pub created_at: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct RolePatch {
    pub wearer: Option<Address>,
    pub details_cid: Option<String>,
    pub created_at: Option<u64>,
}

impl RolePatch {
    fn columns(&self) -> Vec<(&'static str, rusqlite::types::Value)> {
        let mut columns = PatchColumns::new();
        columns
            .set("wearer", self.wearer.as_ref().map(addr_value))
            .set("details_cid", self.details_cid.clone().map(Into::into))
            .set("created_at", self.created_at.map(u64_value));
        columns.into_columns()
    }
}

fn role_from_sql(row: &rusqlite::Row) -> rusqlite::Result<RoleRow> {
    let hat_id: String = row.get(2)?;
    let hat_id = hat_id.parse().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(err))
    })?;
    Ok(RoleRow {
        dao: DaoKey::new(col_u64(row, 0)?.into(), col_addr(row, 1)?),
        hat_id,
        wearer: col_addr_opt(row, 3)?,
        details_cid: row.get(4)?,
        created_at: col_u64_opt(row, 5)?,
    })
}

impl EntityStore {
    pub fn upsert_role(
        &self,
        dao: &DaoKey,
        hat_id: &U256,
        insert: &RolePatch,
        update: &RolePatch,
    ) -> Result<(), StoreError> {
        Upsert::new("roles")
            .key("dao_chain_id", dao.chain_id.0 as i64)
            .key("dao_address", addr_value(&dao.address))
            .key("hat_id", u256_value(hat_id))
            .insert_columns(insert.columns())
            .update_columns(update.columns())
            .execute(&self.conn())
            .change_context(StoreError)
            .attach_printable("failed to upsert role")
    }

    pub fn find_role(&self, dao: &DaoKey, hat_id: &U256) -> Result<Option<RoleRow>, StoreError> {
        self.conn()
            .query_row(
                "SELECT dao_chain_id, dao_address, hat_id, wearer, details_cid, created_at \
                 FROM roles WHERE dao_chain_id = ?1 AND dao_address = ?2 AND hat_id = ?3",
                (
                    dao.chain_id.0 as i64,
                    format!("{:#x}", dao.address),
                    hat_id.to_string(),
                ),
                role_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query role")
    }

    /// Remove a role whose hat failed the on-chain existence check.
    pub fn delete_role(&self, dao: &DaoKey, hat_id: &U256) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "DELETE FROM roles WHERE dao_chain_id = ?1 AND dao_address = ?2 AND hat_id = ?3",
                (
                    dao.chain_id.0 as i64,
                    format!("{:#x}", dao.address),
                    hat_id.to_string(),
                ),
            )
            .change_context(StoreError)
            .attach_printable("failed to delete role")?;
        Ok(())
    }
}
