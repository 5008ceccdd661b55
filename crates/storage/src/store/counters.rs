#![forbid(unsafe_code)]

use super::{JobStore, StoreError};
use rusqlite::{OptionalExtension, Transaction, TransactionBehavior, params};

/// Post-increment within the caller's transaction: returns the current
/// value and advances the stored one. A counter that has never been seen
/// reads as 0 and is created holding 1.
pub(crate) fn get_and_increment_counter_tx(
    tx: &Transaction<'_>,
    counter_name: &str,
) -> Result<i64, StoreError> {
    let current: Option<i64> = tx
        .query_row(
            "SELECT counter_value FROM counter WHERE counter_name = ?1",
            params![counter_name],
            |row| row.get(0),
        )
        .optional()?;
    match current {
        Some(value) => {
            tx.execute(
                "UPDATE counter SET counter_value = counter_value + 1 WHERE counter_name = ?1",
                params![counter_name],
            )?;
            Ok(value)
        }
        None => {
            tx.execute(
                "INSERT INTO counter (counter_name, counter_value) VALUES (?1, ?2)",
                params![counter_name, 1i64],
            )?;
            Ok(0)
        }
    }
}

impl JobStore {
    /// Values handed out for one name are dense and strictly increasing;
    /// the immediate transaction serializes concurrent callers.
    pub fn get_and_increment_counter(&self, counter_name: &str) -> Result<i64, StoreError> {
        let mut conn = self.pool().checkout()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = get_and_increment_counter_tx(&tx, counter_name)?;
        tx.commit()?;
        Ok(value)
    }
}
