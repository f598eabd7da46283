use alloy_primitives::{Address, U256};
use daoscan_common::DaoKey;
use error_stack::{Result, ResultExt};
use rusqlite::OptionalExtension;

use crate::{
    sql::{addr_value, col_addr, col_u256_opt, col_u64, col_u64_opt, u256_value, u64_value},
    upsert::{PatchColumns, Upsert},
    EntityStore, StoreError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
    Azorius,
    Fractal,
}

impl ModuleType {
    fn as_str(&self) -> &'static str {
        match self {
            ModuleType::Azorius => "AZORIUS",
            ModuleType::Fractal => "FRACTAL",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "AZORIUS" => Some(ModuleType::Azorius),
            "FRACTAL" => Some(ModuleType::Fractal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Erc20,
    Erc721,
    Erc1155,
}

impl TokenType {
    fn as_str(&self) -> &'static str {
        match self {
            TokenType::Erc20 => "ERC20",
            TokenType::Erc721 => "ERC721",
            TokenType::Erc1155 => "ERC1155",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "ERC20" => Some(TokenType::Erc20),
            "ERC721" => Some(TokenType::Erc721),
            "ERC1155" => Some(TokenType::Erc1155),
            _ => None,
        }
    }
}

fn enum_error(idx: usize, text: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unknown enum value: {text}").into(),
    )
}

/// A governance module contract, exclusively owned by one DAO. Module
/// addresses are globally unique per deployment, so the address alone is
/// the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernanceModuleRow {
    pub address: Address,
    pub dao: DaoKey,
    pub module_type: ModuleType,
    pub execution_period: Option<u64>,
    pub timelock_period: Option<u64>,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct GovernanceModulePatch {
    pub execution_period: Option<u64>,
    pub timelock_period: Option<u64>,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
}

impl GovernanceModulePatch {
    fn columns(&self) -> Vec<(&'static str, rusqlite::types::Value)> {
        let mut columns = PatchColumns::new();
        columns
            .set("execution_period", self.execution_period.map(u64_value))
            .set("timelock_period", self.timelock_period.map(u64_value))
            .set("created_at", self.created_at.map(u64_value))
            .set("updated_at", self.updated_at.map(u64_value));
        columns.into_columns()
    }
}

const MODULE_COLUMNS: &str = "address, dao_chain_id, dao_address, module_type, \
     execution_period, timelock_period, created_at, updated_at";

fn module_from_sql(row: &rusqlite::Row) -> rusqlite::Result<GovernanceModuleRow> {
    let type_text: String = row.get(3)?;
    Ok(GovernanceModuleRow {
        address: col_addr(row, 0)?,
        dao: DaoKey::new(col_u64(row, 1)?.into(), col_addr(row, 2)?),
        module_type: ModuleType::parse(&type_text).ok_or_else(|| enum_error(3, type_text))?,
        execution_period: col_u64_opt(row, 4)?,
        timelock_period: col_u64_opt(row, 5)?,
        created_at: col_u64_opt(row, 6)?,
        updated_at: col_u64_opt(row, 7)?,
    })
}

/// A voting strategy attached to an Azorius module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VotingStrategyRow {
    pub address: Address,
    pub governance_module_address: Address,
    pub voting_period: Option<u64>,
    pub basis_numerator: Option<u64>,
    pub quorum_numerator: Option<u64>,
    pub required_proposer_weight: Option<U256>,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct VotingStrategyPatch {
    pub voting_period: Option<u64>,
    pub basis_numerator: Option<u64>,
    pub quorum_numerator: Option<u64>,
    pub required_proposer_weight: Option<U256>,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
}

impl VotingStrategyPatch {
    fn columns(&self) -> Vec<(&'static str, rusqlite::types::Value)> {
        let mut columns = PatchColumns::new();
        columns
            .set("voting_period", self.voting_period.map(u64_value))
            .set("basis_numerator", self.basis_numerator.map(u64_value))
            .set("quorum_numerator", self.quorum_numerator.map(u64_value))
            .set(
                "required_proposer_weight",
                self.required_proposer_weight.as_ref().map(u256_value),
            )
            .set("created_at", self.created_at.map(u64_value))
            .set("updated_at", self.updated_at.map(u64_value));
        columns.into_columns()
    }
}

const STRATEGY_COLUMNS: &str = "address, governance_module_address, voting_period, \
     basis_numerator, quorum_numerator, required_proposer_weight, created_at, updated_at";

fn strategy_from_sql(row: &rusqlite::Row) -> rusqlite::Result<VotingStrategyRow> {
    Ok(VotingStrategyRow {
        address: col_addr(row, 0)?,
        governance_module_address: col_addr(row, 1)?,
        voting_period: col_u64_opt(row, 2)?,
        basis_numerator: col_u64_opt(row, 3)?,
        quorum_numerator: col_u64_opt(row, 4)?,
        required_proposer_weight: col_u256_opt(row, 5)?,
        created_at: col_u64_opt(row, 6)?,
        updated_at: col_u64_opt(row, 7)?,
    })
}

/// A governance token registered with a voting strategy. ERC721 strategies
/// register several tokens, so the key is (token, strategy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VotingTokenRow {
    pub address: Address,
    pub voting_strategy_address: Address,
    pub token_type: TokenType,
    pub weight: Option<U256>,
}

#[derive(Debug, Clone, Default)]
pub struct VotingTokenPatch {
    pub weight: Option<U256>,
}

impl VotingTokenPatch {
    fn columns(&self) -> Vec<(&'static str, rusqlite::types::Value)> {
        let mut columns = PatchColumns::new();
        columns.set("weight", self.weight.as_ref().map(u256_value));
        columns.into_columns()
    }
}

fn token_from_sql(row: &rusqlite::Row) -> rusqlite::Result<VotingTokenRow> {
    let type_text: String = row.get(2)?;
    Ok(VotingTokenRow {
        address: col_addr(row, 0)?,
        voting_strategy_address: col_addr(row, 1)?,
        token_type: TokenType::parse(&type_text).ok_or_else(|| enum_error(2, type_text))?,
        weight: col_u256_opt(row, 3)?,
    })
}

impl EntityStore {
    pub fn upsert_governance_module(
        &self,
        address: &Address,
        dao: &DaoKey,
        module_type: ModuleType,
        insert: &GovernanceModulePatch,
        update: &GovernanceModulePatch,
    ) -> Result<(), StoreError> {
        Upsert::new("governance_modules")
            .key("address", addr_value(address))
            .insert_columns(vec![
                ("dao_chain_id", (dao.chain_id.0 as i64).into()),
                ("dao_address", addr_value(&dao.address)),
                ("module_type", module_type.as_str().to_string().into()),
            ])
            .insert_columns(insert.columns())
            .update_columns(update.columns())
            .execute(&self.conn())
            .change_context(StoreError)
            .attach_printable("failed to upsert governance module")
    }

    pub fn find_governance_module(
        &self,
        address: &Address,
    ) -> Result<Option<GovernanceModuleRow>, StoreError> {
        self.conn()
            .query_row(
                &format!("SELECT {MODULE_COLUMNS} FROM governance_modules WHERE address = ?1"),
                [format!("{address:#x}")],
                module_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query governance module")
    }

    pub fn governance_modules_for_dao(
        &self,
        dao: &DaoKey,
    ) -> Result<Vec<GovernanceModuleRow>, StoreError> {
        let conn = self.conn();
        let mut statement = conn
            .prepare(&format!(
                "SELECT {MODULE_COLUMNS} FROM governance_modules \
                 WHERE dao_chain_id = ?1 AND dao_address = ?2"
            ))
            .change_context(StoreError)?;
        let rows = statement
            .query_map(
                (dao.chain_id.0 as i64, format!("{:#x}", dao.address)),
                module_from_sql,
            )
            .change_context(StoreError)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .change_context(StoreError)
            .attach_printable("failed to query governance modules for dao")?;
        Ok(rows)
    }

    pub fn upsert_voting_strategy(
        &self,
        address: &Address,
        governance_module_address: &Address,
        insert: &VotingStrategyPatch,
        update: &VotingStrategyPatch,
    ) -> Result<(), StoreError> {
        Upsert::new("voting_strategies")
            .key("address", addr_value(address))
            .insert_columns(vec![(
                "governance_module_address",
                addr_value(governance_module_address),
            )])
            .insert_columns(insert.columns())
            .update_columns(update.columns())
            .execute(&self.conn())
            .change_context(StoreError)
            .attach_printable("failed to upsert voting strategy")
    }

    pub fn find_voting_strategy(
        &self,
        address: &Address,
    ) -> Result<Option<VotingStrategyRow>, StoreError> {
        self.conn()
            .query_row(
                &format!("SELECT {STRATEGY_COLUMNS} FROM voting_strategies WHERE address = ?1"),
                [format!("{address:#x}")],
                strategy_from_sql,
            )
            .optional()
            .change_context(StoreError)
            .attach_printable("failed to query voting strategy")
    }

    pub fn upsert_voting_token(
        &self,
        address: &Address,
        voting_strategy_address: &Address,
        token_type: TokenType,
        insert: &VotingTokenPatch,
        update: &VotingTokenPatch,
    ) -> Result<(), StoreError> {
        Upsert::new("voting_tokens")
            .key("address", addr_value(address))
            .key("voting_strategy_address", addr_value(voting_strategy_address))
            .insert_columns(vec![(
                "token_type",
                token_type.as_str().to_string().into(),
            )])
            .insert_columns(insert.columns())
            .update_columns(update.columns())
            .execute(&self.conn())
            .change_context(StoreError)
            .attach_printable("failed to upsert voting token")
    }

    pub fn voting_tokens_for_strategy(
        &self,
        voting_strategy_address: &Address,
    ) -> Result<Vec<VotingTokenRow>, StoreError> {
        let conn = self.conn();
        let mut statement = conn
            .prepare(
                "SELECT address, voting_strategy_address, token_type, weight \
                 FROM voting_tokens WHERE voting_strategy_address = ?1",
            )
            .change_context(StoreError)?;
        let rows = statement
            .query_map([format!("{voting_strategy_address:#x}")], token_from_sql)
            .change_context(StoreError)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .change_context(StoreError)
            .attach_printable("failed to query voting tokens")?;
        Ok(rows)
    }

    pub fn delete_voting_token(
        &self,
        address: &Address,
        voting_strategy_address: &Address,
    ) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "DELETE FROM voting_tokens WHERE address = ?1 AND voting_strategy_address = ?2",
                (
                    format!("{address:#x}"),
                    format!("{voting_strategy_address:#x}"),
                ),
            )
            .change_context(StoreError)
            .attach_printable("failed to delete voting token")?;
        Ok(())
    }
}
