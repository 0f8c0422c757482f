//! SQLite database wrapper
//!
//! One connection, configured once, with closure-scoped transactions: `read`
//! runs under a deferred transaction for a consistent snapshot, `write` under
//! an immediate one so concurrent writers serialise on the database lock.

use anyhow::{Context, Result};
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use super::schema;
use super::store::SqlStore;
use crate::error::ServiceResult;

/// Default time a writer waits on a locked database
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// SQLite database holding records, master data and links
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Open or create a SQLite database file and ensure the schema exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .context("Failed to enable WAL journal")?;

        Self::configure(conn, busy_timeout)
    }

    /// Create an in-memory database for testing
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        Self::configure(conn, DEFAULT_BUSY_TIMEOUT)
    }

    fn configure(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.busy_timeout(busy_timeout)
            .context("Failed to set busy timeout")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        rusqlite::vtab::array::load_module(&conn).context("Failed to load rarray module")?;
        schema::init(&conn).context("Failed to initialize schema")?;

        Ok(Self { conn })
    }

    /// Run `f` inside a deferred (read) transaction
    pub fn read<T, F>(&mut self, f: F) -> ServiceResult<T>
    where
        F: FnOnce(&SqlStore<'_>) -> ServiceResult<T>,
    {
        self.scoped(TransactionBehavior::Deferred, f)
    }

    /// Run `f` inside an immediate (write) transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn write<T, F>(&mut self, f: F) -> ServiceResult<T>
    where
        F: FnOnce(&SqlStore<'_>) -> ServiceResult<T>,
    {
        self.scoped(TransactionBehavior::Immediate, f)
    }

    fn scoped<T, F>(&mut self, behavior: TransactionBehavior, f: F) -> ServiceResult<T>
    where
        F: FnOnce(&SqlStore<'_>) -> ServiceResult<T>,
    {
        let tx = self.conn.transaction_with_behavior(behavior)?;
        let value = f(&SqlStore::new(&tx))?;
        tx.commit()?;
        Ok(value)
    }

    /// Get backend name
    pub fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Get reference to underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
