//! Shared fixtures for integration tests

#![allow(dead_code)]

use anyhow::Result;
use serde_json::json;
use skillsheet::records::engineers::{self, EngineerFields};
use skillsheet::records::masters::MasterData;
use skillsheet::SqliteDatabase;

pub const MASTER_DATA: &str = r#"
    [[categories]]
    id = "lang"
    label = "Languages"

    [[skills]]
    id = "a"
    label = "Alpha"
    category_id = "lang"

    [[skills]]
    id = "b"
    label = "Beta"
    category_id = "lang"

    [[skills]]
    id = "c"
    label = "Gamma"
    category_id = "lang"

    [[tags]]
    id = "web"
    label = "Web"

    [[tags]]
    id = "infra"
    label = "Infrastructure"

    [[tag_maps]]
    skill_id = "a"
    tag_id = "web"

    [[tag_maps]]
    skill_id = "b"
    tag_id = "web"

    [[qualifications]]
    id = "cert-1"
    name = "Certificate One"

    [[qualifications]]
    id = "cert-2"
    name = "Certificate Two"
    is_national = true

    [[processes]]
    id = 7
    name = "Retrospective"
"#;

/// In-memory database with master data imported
pub fn seeded() -> Result<SqliteDatabase> {
    let mut db = SqliteDatabase::open_in_memory()?;
    let data = MasterData::load_from_str(MASTER_DATA)?;
    db.write(|store| data.import(store.conn()))?;
    Ok(db)
}

/// Create an engineer and return its id
pub fn engineer(db: &mut SqliteDatabase, handle: &str) -> Result<String> {
    let fields = EngineerFields::from_json(
        &json!({
            "userIdentifier": handle,
            "name": handle,
            "email": format!("{handle}@example.com"),
        }),
        true,
        "",
    )?;
    let created = db.write(|store| engineers::create(store.conn(), fields))?;
    Ok(created.id)
}
