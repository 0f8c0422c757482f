//! Table definitions for personnel records, master data and link tables
//!
//! Link tables use a composite primary key on (principal, reference), so a pair
//! can only ever be linked once, and cascade on delete of either side.

use rusqlite::{params, Connection};

/// Process stages every fresh database starts with
pub const DEFAULT_PROCESS_STAGES: [(i64, &str); 6] = [
    (1, "Requirements definition"),
    (2, "Basic design"),
    (3, "Detailed design"),
    (4, "Implementation"),
    (5, "Testing"),
    (6, "Maintenance and operations"),
];

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS skill_categories (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS skills (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    description TEXT,
    devicon_id TEXT,
    category_id TEXT NOT NULL REFERENCES skill_categories(id)
);

CREATE TABLE IF NOT EXISTS skill_tags (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS skill_tag_maps (
    skill_id TEXT NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
    tag_id TEXT NOT NULL REFERENCES skill_tags(id) ON DELETE CASCADE,
    PRIMARY KEY (skill_id, tag_id)
);

CREATE TABLE IF NOT EXISTS qualifications (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    is_national INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS process_stages (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS engineers (
    id TEXT PRIMARY KEY,
    user_identifier TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    name_kana TEXT,
    email TEXT NOT NULL UNIQUE,
    birth_date TEXT,
    gender TEXT,
    status TEXT NOT NULL DEFAULT 'available',
    affiliation TEXT,
    specialty TEXT,
    mbti_type TEXT,
    joined_at TEXT,
    retired_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS career_histories (
    id TEXT PRIMARY KEY,
    engineer_id TEXT NOT NULL REFERENCES engineers(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    started_at TEXT,
    ended_at TEXT,
    description TEXT,
    role TEXT,
    scale TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_career_histories_engineer ON career_histories(engineer_id);

CREATE TABLE IF NOT EXISTS engineer_skills (
    engineer_id TEXT NOT NULL REFERENCES engineers(id) ON DELETE CASCADE,
    skill_id TEXT NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
    version TEXT,
    PRIMARY KEY (engineer_id, skill_id)
);

CREATE TABLE IF NOT EXISTS engineer_qualifications (
    engineer_id TEXT NOT NULL REFERENCES engineers(id) ON DELETE CASCADE,
    qualification_id TEXT NOT NULL REFERENCES qualifications(id) ON DELETE CASCADE,
    acquired_at TEXT,
    PRIMARY KEY (engineer_id, qualification_id)
);

CREATE TABLE IF NOT EXISTS career_skills (
    career_id TEXT NOT NULL REFERENCES career_histories(id) ON DELETE CASCADE,
    skill_id TEXT NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
    version TEXT,
    PRIMARY KEY (career_id, skill_id)
);

CREATE TABLE IF NOT EXISTS career_processes (
    career_id TEXT NOT NULL REFERENCES career_histories(id) ON DELETE CASCADE,
    process_id INTEGER NOT NULL REFERENCES process_stages(id) ON DELETE CASCADE,
    PRIMARY KEY (career_id, process_id)
);
";

/// Create all tables (idempotent) and the default process stages
pub fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;

    let mut stmt = conn.prepare(
        "INSERT INTO process_stages (id, name) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING",
    )?;
    for (id, name) in DEFAULT_PROCESS_STAGES {
        stmt.execute(params![id, name])?;
    }
    Ok(())
}
