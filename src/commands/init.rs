//! `skillsheet init`: create the schema and default process stages

use anyhow::{Context, Result};

use skillsheet::records::masters;
use skillsheet::AppConfig;

/// Open (and thereby initialise) the configured database. Idempotent.
pub fn execute(config: &AppConfig) -> Result<()> {
    let mut db = config.database.open()?;
    let stages = db
        .read(|store| masters::list_processes(store.conn()))
        .context("Failed to read process stages")?;

    println!("✓ Database ready at {}", config.database.path);
    println!("  {} process stages available", stages.len());
    Ok(())
}
