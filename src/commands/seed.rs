//! `skillsheet seed <FILE>`: import reference master data

use anyhow::{Context, Result};
use std::path::Path;

use skillsheet::records::masters::MasterData;
use skillsheet::AppConfig;

pub fn execute(config: &AppConfig, file: &Path) -> Result<()> {
    let data = MasterData::load_from_file(file)?;
    let mut db = config.database.open()?;

    let summary = db
        .write(|store| data.import(store.conn()))
        .with_context(|| format!("Failed to import {}", file.display()))?;

    println!("✓ Imported master data from {}", file.display());
    println!("  categories:     {}", summary.categories);
    println!("  tags:           {}", summary.tags);
    println!("  skills:         {}", summary.skills);
    println!("  tag maps:       {}", summary.tag_maps);
    println!("  qualifications: {}", summary.qualifications);
    println!("  processes:      {}", summary.processes);
    Ok(())
}
