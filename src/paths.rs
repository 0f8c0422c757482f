//! Filesystem layout for skillsheet.
//!
//! This module defines WHERE data lives. It has no I/O and no validation.
//!
//! ```text
//! ~/.skillsheet/
//! ├── config.toml              # Application config
//! └── data/
//!     └── skillsheet.db        # SQLite database
//! ```

use std::path::PathBuf;

/// Home directory: `~/.skillsheet/`
pub fn skillsheet_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".skillsheet")
}

/// Default config file: `~/.skillsheet/config.toml`
pub fn config_path() -> PathBuf {
    skillsheet_home().join("config.toml")
}

/// Data directory: `~/.skillsheet/data/`
pub fn data_dir() -> PathBuf {
    skillsheet_home().join("data")
}

/// Default database: `~/.skillsheet/data/skillsheet.db`
pub fn default_database_path() -> PathBuf {
    data_dir().join("skillsheet.db")
}
