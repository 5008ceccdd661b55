#![forbid(unsafe_code)]

use crate::store::StoreError;
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Hands out SQLite connections under a one-handle-one-worker contract: a
/// checked-out connection belongs exclusively to the caller until the token
/// drops, so a handle is never touched from two threads at once.
pub struct ConnectionPool {
    db_path: PathBuf,
    idle: Mutex<Vec<Connection>>,
}

impl ConnectionPool {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self { db_path: db_path.as_ref().to_path_buf(), idle: Mutex::new(Vec::new()) }
    }

    /// Reuses an idle connection or opens a fresh one.
    pub fn checkout(&self) -> Result<PooledConnection<'_>, StoreError> {
        let reused = match self.idle.lock() {
            Ok(mut idle) => idle.pop(),
            Err(poisoned) => poisoned.into_inner().pop(),
        };
        let conn = match reused {
            Some(conn) => conn,
            None => open_connection(&self.db_path)?,
        };
        Ok(PooledConnection { pool: self, conn: Some(conn) })
    }

    fn checkin(&self, conn: Connection) {
        match self.idle.lock() {
            Ok(mut idle) => idle.push(conn),
            Err(poisoned) => poisoned.into_inner().push(conn),
        }
    }
}

fn open_connection(db_path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;\n\
         PRAGMA synchronous=NORMAL;\n\
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(conn)
}

/// Ownership token for one checked-out connection; returns the handle to
/// the pool on drop.
pub struct PooledConnection<'pool> {
    pool: &'pool ConnectionPool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match &self.conn {
            Some(conn) => conn,
            // The slot is only vacated by drop.
            None => unreachable!("connection taken before drop"),
        }
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        match &mut self.conn {
            Some(conn) => conn,
            None => unreachable!("connection taken before drop"),
        }
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.checkin(conn);
        }
    }
}
