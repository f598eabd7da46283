//! Conversions between domain types and SQLite column values.
//!
//! Addresses and hashes are stored as 0x-prefixed lowercase hex text,
//! unsigned 256-bit integers as decimal text (no precision loss), block
//! numbers and timestamps as integers.

use alloy_primitives::{Address, B256, U256};
use rusqlite::{
    types::{Type, Value},
    Row,
};

pub(crate) fn addr_value(address: &Address) -> Value {
    Value::Text(format!("{address:#x}"))
}

pub(crate) fn hash_value(hash: &B256) -> Value {
    Value::Text(format!("{hash:#x}"))
}

pub(crate) fn u256_value(value: &U256) -> Value {
    Value::Text(value.to_string())
}

pub(crate) fn u64_value(value: u64) -> Value {
    Value::Integer(value as i64)
}

pub(crate) fn bool_value(value: bool) -> Value {
    Value::Integer(value as i64)
}

pub(crate) fn json_value(value: &serde_json::Value) -> Value {
    Value::Text(value.to_string())
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn col_addr(row: &Row, idx: usize) -> rusqlite::Result<Address> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|err| conversion_error(idx, err))
}

pub(crate) fn col_addr_opt(row: &Row, idx: usize) -> rusqlite::Result<Option<Address>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|text| text.parse().map_err(|err| conversion_error(idx, err)))
        .transpose()
}

pub(crate) fn col_hash(row: &Row, idx: usize) -> rusqlite::Result<B256> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|err| conversion_error(idx, err))
}

pub(crate) fn col_hash_opt(row: &Row, idx: usize) -> rusqlite::Result<Option<B256>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|text| text.parse().map_err(|err| conversion_error(idx, err)))
        .transpose()
}

pub(crate) fn col_u256_opt(row: &Row, idx: usize) -> rusqlite::Result<Option<U256>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|text| text.parse().map_err(|err| conversion_error(idx, err)))
        .transpose()
}

pub(crate) fn col_u64(row: &Row, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    Ok(value as u64)
}

pub(crate) fn col_u64_opt(row: &Row, idx: usize) -> rusqlite::Result<Option<u64>> {
    let value: Option<i64> = row.get(idx)?;
    Ok(value.map(|value| value as u64))
}

pub(crate) fn col_bool_opt(row: &Row, idx: usize) -> rusqlite::Result<Option<bool>> {
    let value: Option<i64> = row.get(idx)?;
    Ok(value.map(|value| value != 0))
}

pub(crate) fn col_json_opt(row: &Row, idx: usize) -> rusqlite::Result<Option<serde_json::Value>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|text| serde_json::from_str(&text).map_err(|err| conversion_error(idx, err)))
        .transpose()
}
