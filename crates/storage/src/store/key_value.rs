#![forbid(unsafe_code)]

use super::{JobStore, StoreError};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde_json::Value;
use std::collections::BTreeMap;

/// Connection-level read so callers inside a transaction can reuse it
/// (`Transaction` derefs to `Connection`).
pub(crate) fn get_key_value(
    conn: &Connection,
    key_name: &str,
) -> Result<Option<Value>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM key_value_store WHERE key_name = ?1",
            params![key_name],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

impl JobStore {
    /// Absence means "unset", never zero or null.
    pub fn get_key_value_pair(&self, key_name: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.pool().checkout()?;
        get_key_value(&conn, key_name)
    }

    pub fn set_key_value_pair(&self, key_name: &str, value: &Value) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(value)?;
        let mut conn = self.pool().checkout()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "REPLACE INTO key_value_store (key_name, value_json) VALUES (?1, ?2)",
            params![key_name, encoded],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Returns whether a pair was actually removed.
    pub fn del_key_value_pair(&self, key_name: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool().checkout()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let affected =
            tx.execute("DELETE FROM key_value_store WHERE key_name = ?1", params![key_name])?;
        tx.commit()?;
        Ok(affected > 0)
    }

    pub fn get_all_key_value_pairs(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        let conn = self.pool().checkout()?;
        let mut stmt = conn.prepare("SELECT key_name, value_json FROM key_value_store")?;
        let mut rows = stmt.query([])?;
        let mut pairs = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let raw: String = row.get(1)?;
            pairs.insert(key, serde_json::from_str(&raw)?);
        }
        Ok(pairs)
    }
}
