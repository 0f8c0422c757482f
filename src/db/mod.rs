//! Database layer for skillsheet
//!
//! Embedded SQLite holding personnel records, reference master data and the
//! link tables the reconciliation engine synchronises.
//!
//! # Example
//! ```no_run
//! use skillsheet::db::SqliteDatabase;
//!
//! let mut db = SqliteDatabase::open("skillsheet.db")?;
//! let stages = db.read(|store| skillsheet::records::masters::list_processes(store.conn()))?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use config::DatabaseConfig;
pub use sqlite::SqliteDatabase;
pub use store::SqlStore;
