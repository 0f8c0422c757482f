//! skillsheet: personnel skill-sheet records with link reconciliation
//!
//! The library holds everything the binary wires together: storage, the
//! reconciliation engine, record CRUD and the HTTP surface.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod paths;
pub mod reconcile;
pub mod records;
pub mod server;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::SqliteDatabase;
pub use error::{ServiceError, ServiceResult};
