//! Single-statement composite-key upserts.
//!
//! The builder renders `INSERT … ON CONFLICT (keys) DO UPDATE SET …` where
//! the update clause names only the columns carried by the patch. Columns
//! absent from the patch keep whatever value an earlier event wrote.

use rusqlite::{params_from_iter, types::Value, Connection};

pub(crate) struct Upsert {
    table: &'static str,
    keys: Vec<(&'static str, Value)>,
    insert: Vec<(&'static str, Value)>,
    update: Vec<(&'static str, Value)>,
}

impl Upsert {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            keys: Vec::new(),
            insert: Vec::new(),
            update: Vec::new(),
        }
    }

    pub fn key(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.keys.push((column, value.into()));
        self
    }

    pub fn insert_columns(mut self, columns: Vec<(&'static str, Value)>) -> Self {
        self.insert.extend(columns);
        self
    }

    pub fn update_columns(mut self, columns: Vec<(&'static str, Value)>) -> Self {
        self.update.extend(columns);
        self
    }

    pub fn execute(self, conn: &Connection) -> rusqlite::Result<()> {
        let mut columns = Vec::with_capacity(self.keys.len() + self.insert.len());
        let mut params = Vec::new();

        for (name, value) in &self.keys {
            columns.push(*name);
            params.push(value.clone());
        }
        for (name, value) in &self.insert {
            columns.push(*name);
            params.push(value.clone());
        }

        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let key_columns = self
            .keys
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");

        let conflict = if self.update.is_empty() {
            "DO NOTHING".to_string()
        } else {
            let assignments = self
                .update
                .iter()
                .enumerate()
                .map(|(i, (name, _))| format!("{} = ?{}", name, columns.len() + i + 1))
                .collect::<Vec<_>>()
                .join(", ");
            for (_, value) in &self.update {
                params.push(value.clone());
            }
            format!("DO UPDATE SET {assignments}")
        };

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
            self.table,
            columns.join(", "),
            placeholders,
            key_columns,
            conflict,
        );

        conn.execute(&sql, params_from_iter(params))?;
        Ok(())
    }
}

/// Collects `(column, value)` pairs from a patch, skipping unset fields.
pub(crate) struct PatchColumns {
    columns: Vec<(&'static str, Value)>,
}

impl PatchColumns {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    pub fn set(&mut self, column: &'static str, value: Option<Value>) -> &mut Self {
        if let Some(value) = value {
            self.columns.push((column, value));
        }
        self
    }

    pub fn into_columns(self) -> Vec<(&'static str, Value)> {
        self.columns
    }
}
