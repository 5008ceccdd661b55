#![forbid(unsafe_code)]

mod counters;
mod error;
mod jobs;
mod key_value;
mod retention;

pub use error::StoreError;
pub use jobs::{JobOrdering, JobQuery, OrderColumn, SortDirection};
pub use retention::{RetentionPolicy, RetentionSweep};

use crate::pool::ConnectionPool;
use rusqlite::Connection;
use std::path::Path;

/// Name of the counter that hands out replication sequence numbers.
pub const REPLICATION_COUNTER: &str = "REPLICATION_COUNTER";

/// Key under which the replication layer records the highest sequence
/// number confirmed durable downstream. Absent until the first
/// confirmation.
pub const REPLICATION_LAST_SUCCESSFUL_SEQ_NUMBER: &str = "REPLICATION_LAST_SUCCESSFUL_SEQ_NUMBER";

/// Durable record of job executions, counters and key-value state, backed
/// by a single SQLite database owned by the agent process.
pub struct JobStore {
    pool: ConnectionPool,
}

impl JobStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let pool = ConnectionPool::new(db_path);
        {
            let conn = pool.checkout()?;
            install_schema(&conn)?;
        }
        Ok(Self { pool })
    }

    pub(crate) fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS job (
             job_id INTEGER PRIMARY KEY AUTOINCREMENT,
             job_uuid TEXT NOT NULL UNIQUE,
             job_name TEXT NOT NULL,
             job_args_json TEXT NOT NULL,
             job_user TEXT NOT NULL,
             job_host TEXT NOT NULL,
             job_tags_json TEXT NOT NULL,
             job_status_code INTEGER,
             job_start_time_utc_epoch_seconds REAL NOT NULL,
             job_end_time_utc_epoch_seconds REAL,
             created_time_utc_epoch_seconds REAL NOT NULL,
             last_updated_time_utc_epoch_seconds REAL NOT NULL,
             last_updated_sequence_number INTEGER NOT NULL,
             CHECK ((job_end_time_utc_epoch_seconds IS NULL) = (job_status_code IS NULL))
         );
         CREATE INDEX IF NOT EXISTS idx_job_start_time
             ON job(job_start_time_utc_epoch_seconds);
         CREATE INDEX IF NOT EXISTS idx_job_end_time
             ON job(job_end_time_utc_epoch_seconds);
         CREATE INDEX IF NOT EXISTS idx_job_sequence
             ON job(last_updated_sequence_number);
         CREATE TABLE IF NOT EXISTS counter (
             counter_name TEXT PRIMARY KEY,
             counter_value INTEGER NOT NULL
         );
         CREATE TABLE IF NOT EXISTS key_value_store (
             key_name TEXT PRIMARY KEY,
             value_json TEXT NOT NULL
         );",
    )?;
    Ok(())
}
