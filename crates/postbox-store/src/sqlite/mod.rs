//! Relational backend: one SQLite connection, one `BEGIN IMMEDIATE`
//! transaction per atomic unit.

pub mod migrations;
mod queries;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

use crate::backend::{Backend, Txn};
use crate::error::{StoreError, StoreResult};

use queries::SqliteTxn;

pub struct SqliteBackend {
    conn: Mutex<Connection>,
    lock_timeout: Duration,
}

impl SqliteBackend {
    pub fn open(path: &Path, lock_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL so external readers don't block the writer
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let backend = Self::from_connection(conn, lock_timeout)?;
        info!("SQLite store opened at {}", path.display());
        Ok(backend)
    }

    pub fn open_in_memory(lock_timeout: Duration) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, lock_timeout)
    }

    fn from_connection(conn: Connection, lock_timeout: Duration) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(lock_timeout)?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            lock_timeout,
        })
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn transact<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn Txn) -> StoreResult<T>,
    {
        let mut conn = self.conn.try_lock_for(self.lock_timeout).ok_or_else(|| {
            StoreError::Busy(format!(
                "SQLite connection not acquired within {}ms",
                self.lock_timeout.as_millis()
            ))
        })?;

        // Dropping `tx` without commit rolls back.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = {
            let mut txn = SqliteTxn::new(&tx);
            f(&mut txn)?
        };
        tx.commit()?;
        Ok(out)
    }
}
