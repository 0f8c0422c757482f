//! Reference master data: skill categories, tags, skills, qualifications,
//! process stages
//!
//! Read-only over HTTP. `MasterData` imports a TOML file (the `seed` command),
//! upserting every entry by id.

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::vtab::array::Array;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::db::store::id_array;
use crate::error::ServiceResult;
use crate::reconcile::relation::{RefId, ReferenceKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct SkillCategory {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillTag {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Skill-to-tag pairing as written in master data files
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SkillTagPair {
    pub skill_id: String,
    pub tag_id: String,
}

/// Skill fields embedded under a tag or tag map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillSummary {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub devicon_id: Option<String>,
    pub category_id: String,
}

/// A tag with the skills carrying it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagDetail {
    #[serde(flatten)]
    pub tag: SkillTag,
    pub skills: Vec<SkillSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillTagMap {
    pub skill_id: String,
    pub tag_id: String,
    pub skill: SkillSummary,
    pub tag: SkillTag,
}

/// Optional `skillId` / `tagId` filter on tag maps; `skill` wins when both are set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMapFilter {
    pub skill: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Skill {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub devicon_id: Option<String>,
    pub category_id: String,
    /// Filled on reads, ignored on import
    #[serde(skip_deserializing)]
    pub category: Option<SkillCategory>,
    #[serde(skip_deserializing)]
    pub tags: Vec<SkillTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Qualification {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_national: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStage {
    pub id: i64,
    pub name: String,
}

/// Any entity a link can point at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReferenceEntity {
    Skill(Skill),
    Qualification(Qualification),
    Process(ProcessStage),
}

impl ReferenceEntity {
    pub fn id(&self) -> RefId {
        match self {
            Self::Skill(skill) => RefId::Code(skill.id.clone()),
            Self::Qualification(qualification) => RefId::Code(qualification.id.clone()),
            Self::Process(stage) => RefId::Seq(stage.id),
        }
    }
}

const CATEGORY_COLUMNS: &str = "id, label, description";
const TAG_COLUMNS: &str = "id, label, description";
const SUMMARY_COLUMNS: &str = "s.id, s.label, s.description, s.devicon_id, s.category_id";
const SKILL_COLUMNS: &str = "s.id, s.label, s.description, s.devicon_id, s.category_id, \
                             c.id, c.label, c.description";
const QUALIFICATION_COLUMNS: &str = "id, name, description, is_national";

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<SkillCategory> {
    Ok(SkillCategory {
        id: row.get(0)?,
        label: row.get(1)?,
        description: row.get(2)?,
    })
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<SkillTag> {
    Ok(SkillTag {
        id: row.get(0)?,
        label: row.get(1)?,
        description: row.get(2)?,
    })
}

/// `SUMMARY_COLUMNS` starting at `first`
fn summary_from_row(row: &Row<'_>, first: usize) -> rusqlite::Result<SkillSummary> {
    Ok(SkillSummary {
        id: row.get(first)?,
        label: row.get(first + 1)?,
        description: row.get(first + 2)?,
        devicon_id: row.get(first + 3)?,
        category_id: row.get(first + 4)?,
    })
}

fn skill_from_row(row: &Row<'_>) -> rusqlite::Result<Skill> {
    Ok(Skill {
        id: row.get(0)?,
        label: row.get(1)?,
        description: row.get(2)?,
        devicon_id: row.get(3)?,
        category_id: row.get(4)?,
        category: Some(SkillCategory {
            id: row.get(5)?,
            label: row.get(6)?,
            description: row.get(7)?,
        }),
        tags: Vec::new(),
    })
}

fn qualification_from_row(row: &Row<'_>) -> rusqlite::Result<Qualification> {
    Ok(Qualification {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_national: row.get(3)?,
    })
}

fn stage_from_row(row: &Row<'_>) -> rusqlite::Result<ProcessStage> {
    Ok(ProcessStage {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

/// Run `base` with an optional `WHERE <column> IN rarray(?1)` filter and an ORDER BY
fn select<T, F>(
    conn: &Connection,
    base: &str,
    filter: Option<(&str, Array)>,
    order: &str,
    map: F,
) -> ServiceResult<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let (sql, ids) = match filter {
        Some((_, ids)) if ids.is_empty() => return Ok(Vec::new()),
        Some((column, ids)) => (
            format!("{base} WHERE {column} IN rarray(?1) ORDER BY {order}"),
            Some(ids),
        ),
        None => (format!("{base} ORDER BY {order}"), None),
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = match ids {
        Some(ids) => stmt.query_map([ids], map)?.collect::<Result<Vec<_>, _>>()?,
        None => stmt.query_map([], map)?.collect::<Result<Vec<_>, _>>()?,
    };
    Ok(rows)
}

fn skills_query() -> String {
    format!("SELECT {SKILL_COLUMNS} FROM skills s JOIN skill_categories c ON c.id = s.category_id")
}

pub fn list_categories(conn: &Connection) -> ServiceResult<Vec<SkillCategory>> {
    let base = format!("SELECT {CATEGORY_COLUMNS} FROM skill_categories");
    select(conn, &base, None, "id", category_from_row)
}

pub fn categories_by_ids(conn: &Connection, ids: &[String]) -> ServiceResult<Vec<SkillCategory>> {
    let base = format!("SELECT {CATEGORY_COLUMNS} FROM skill_categories");
    select(conn, &base, Some(("id", id_array(ids))), "id", category_from_row)
}

/// Tags of the given skills, keyed by skill id, each list ordered by tag id
fn tags_of(conn: &Connection, skill_ids: Array) -> ServiceResult<HashMap<String, Vec<SkillTag>>> {
    let mut stmt = conn.prepare(
        "SELECT m.skill_id, t.id, t.label, t.description
         FROM skill_tag_maps m JOIN skill_tags t ON t.id = m.tag_id
         WHERE m.skill_id IN rarray(?1)
         ORDER BY m.skill_id, t.id",
    )?;
    let rows = stmt.query_map([skill_ids], |row| {
        Ok((
            row.get::<_, String>(0)?,
            SkillTag {
                id: row.get(1)?,
                label: row.get(2)?,
                description: row.get(3)?,
            },
        ))
    })?;

    let mut tags: HashMap<String, Vec<SkillTag>> = HashMap::new();
    for row in rows {
        let (skill_id, tag) = row?;
        tags.entry(skill_id).or_default().push(tag);
    }
    Ok(tags)
}

fn with_tags(conn: &Connection, mut skills: Vec<Skill>) -> ServiceResult<Vec<Skill>> {
    if skills.is_empty() {
        return Ok(skills);
    }
    let ids: Vec<String> = skills.iter().map(|skill| skill.id.clone()).collect();
    let mut tags = tags_of(conn, id_array(&ids))?;
    for skill in &mut skills {
        skill.tags = tags.remove(&skill.id).unwrap_or_default();
    }
    Ok(skills)
}

/// All skills with category and tags, ordered by category then label
pub fn list_skills(conn: &Connection) -> ServiceResult<Vec<Skill>> {
    let skills = select(conn, &skills_query(), None, "s.category_id, s.label", skill_from_row)?;
    with_tags(conn, skills)
}

pub fn skills_by_ids<P: Clone + Into<Value>>(
    conn: &Connection,
    ids: &[P],
) -> ServiceResult<Vec<Skill>> {
    let skills = select(
        conn,
        &skills_query(),
        Some(("s.id", id_array(ids))),
        "s.category_id, s.label",
        skill_from_row,
    )?;
    with_tags(conn, skills)
}

/// Attach the skills carrying each tag
fn tag_details(conn: &Connection, tags: Vec<SkillTag>) -> ServiceResult<Vec<TagDetail>> {
    if tags.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = tags.iter().map(|tag| tag.id.clone()).collect();
    let mut stmt = conn.prepare(&format!(
        "SELECT m.tag_id, {SUMMARY_COLUMNS}
         FROM skill_tag_maps m JOIN skills s ON s.id = m.skill_id
         WHERE m.tag_id IN rarray(?1)
         ORDER BY m.tag_id, s.id"
    ))?;
    let rows = stmt.query_map([id_array(&ids)], |row| {
        Ok((row.get::<_, String>(0)?, summary_from_row(row, 1)?))
    })?;

    let mut skills: HashMap<String, Vec<SkillSummary>> = HashMap::new();
    for row in rows {
        let (tag_id, skill) = row?;
        skills.entry(tag_id).or_default().push(skill);
    }

    Ok(tags
        .into_iter()
        .map(|tag| TagDetail {
            skills: skills.remove(&tag.id).unwrap_or_default(),
            tag,
        })
        .collect())
}

/// All tags by id, each with its skills
pub fn list_tags(conn: &Connection) -> ServiceResult<Vec<TagDetail>> {
    let base = format!("SELECT {TAG_COLUMNS} FROM skill_tags");
    let tags = select(conn, &base, None, "id", tag_from_row)?;
    tag_details(conn, tags)
}

pub fn tags_by_ids(conn: &Connection, ids: &[String]) -> ServiceResult<Vec<TagDetail>> {
    let base = format!("SELECT {TAG_COLUMNS} FROM skill_tags");
    let tags = select(conn, &base, Some(("id", id_array(ids))), "id", tag_from_row)?;
    tag_details(conn, tags)
}

/// Skill/tag pairings with both sides embedded, ordered by skill then tag
pub fn tag_maps(conn: &Connection, filter: &TagMapFilter) -> ServiceResult<Vec<SkillTagMap>> {
    let base = format!(
        "SELECT {SUMMARY_COLUMNS}, t.id, t.label, t.description
         FROM skill_tag_maps m
         JOIN skills s ON s.id = m.skill_id
         JOIN skill_tags t ON t.id = m.tag_id"
    );
    let map = |row: &Row<'_>| -> rusqlite::Result<SkillTagMap> {
        let skill = summary_from_row(row, 0)?;
        let tag = SkillTag {
            id: row.get(5)?,
            label: row.get(6)?,
            description: row.get(7)?,
        };
        Ok(SkillTagMap {
            skill_id: skill.id.clone(),
            tag_id: tag.id.clone(),
            skill,
            tag,
        })
    };

    let filter = match (&filter.skill, &filter.tag) {
        (Some(skill), _) => Some(("m.skill_id", id_array(std::slice::from_ref(skill)))),
        (None, Some(tag)) => Some(("m.tag_id", id_array(std::slice::from_ref(tag)))),
        (None, None) => None,
    };
    select(conn, &base, filter, "m.skill_id, m.tag_id", map)
}

/// All qualifications, national certifications first, then by name
pub fn list_qualifications(conn: &Connection) -> ServiceResult<Vec<Qualification>> {
    let base = format!("SELECT {QUALIFICATION_COLUMNS} FROM qualifications");
    select(conn, &base, None, "is_national DESC, name", qualification_from_row)
}

pub fn qualifications_by_ids<P: Clone + Into<Value>>(
    conn: &Connection,
    ids: &[P],
) -> ServiceResult<Vec<Qualification>> {
    let base = format!("SELECT {QUALIFICATION_COLUMNS} FROM qualifications");
    select(
        conn,
        &base,
        Some(("id", id_array(ids))),
        "is_national DESC, name",
        qualification_from_row,
    )
}

pub fn list_processes(conn: &Connection) -> ServiceResult<Vec<ProcessStage>> {
    select(conn, "SELECT id, name FROM process_stages", None, "id", stage_from_row)
}

pub fn processes_by_ids<P: Clone + Into<Value>>(
    conn: &Connection,
    ids: &[P],
) -> ServiceResult<Vec<ProcessStage>> {
    select(
        conn,
        "SELECT id, name FROM process_stages",
        Some(("id", id_array(ids))),
        "id",
        stage_from_row,
    )
}

/// Entities for link projections, in catalogue order
pub fn describe(
    conn: &Connection,
    kind: ReferenceKind,
    ids: &[RefId],
) -> ServiceResult<Vec<ReferenceEntity>> {
    let entities = match kind {
        ReferenceKind::Skill => skills_by_ids(conn, ids)?
            .into_iter()
            .map(ReferenceEntity::Skill)
            .collect(),
        ReferenceKind::Qualification => qualifications_by_ids(conn, ids)?
            .into_iter()
            .map(ReferenceEntity::Qualification)
            .collect(),
        ReferenceKind::ProcessStage => processes_by_ids(conn, ids)?
            .into_iter()
            .map(ReferenceEntity::Process)
            .collect(),
    };
    Ok(entities)
}

/// Master data file contents
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MasterData {
    pub categories: Vec<SkillCategory>,
    pub tags: Vec<SkillTag>,
    pub skills: Vec<Skill>,
    pub tag_maps: Vec<SkillTagPair>,
    pub qualifications: Vec<Qualification>,
    pub processes: Vec<ProcessStage>,
}

/// Rows written by an import, per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub categories: usize,
    pub tags: usize,
    pub skills: usize,
    pub tag_maps: usize,
    pub qualifications: usize,
    pub processes: usize,
}

impl MasterData {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read master data file: {:?}", path.as_ref()))?;
        Self::load_from_str(&content)
    }

    pub fn load_from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse master data")
    }

    /// Upsert every entry. Categories and tags go first so skills and tag
    /// maps can reference them.
    pub fn import(&self, conn: &Connection) -> ServiceResult<ImportSummary> {
        let mut summary = ImportSummary::default();

        let mut stmt = conn.prepare(
            "INSERT INTO skill_categories (id, label, description) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET label = excluded.label,
                 description = excluded.description",
        )?;
        for category in &self.categories {
            summary.categories +=
                stmt.execute(params![category.id, category.label, category.description])?;
        }

        let mut stmt = conn.prepare(
            "INSERT INTO skill_tags (id, label, description) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET label = excluded.label,
                 description = excluded.description",
        )?;
        for tag in &self.tags {
            summary.tags += stmt.execute(params![tag.id, tag.label, tag.description])?;
        }

        let mut stmt = conn.prepare(
            "INSERT INTO skills (id, label, description, devicon_id, category_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET label = excluded.label,
                 description = excluded.description,
                 devicon_id = excluded.devicon_id,
                 category_id = excluded.category_id",
        )?;
        for skill in &self.skills {
            summary.skills += stmt.execute(params![
                skill.id,
                skill.label,
                skill.description,
                skill.devicon_id,
                skill.category_id
            ])?;
        }

        let mut stmt = conn.prepare(
            "INSERT INTO skill_tag_maps (skill_id, tag_id) VALUES (?1, ?2)
             ON CONFLICT(skill_id, tag_id) DO UPDATE SET tag_id = excluded.tag_id",
        )?;
        for pair in &self.tag_maps {
            summary.tag_maps += stmt.execute(params![pair.skill_id, pair.tag_id])?;
        }

        let mut stmt = conn.prepare(
            "INSERT INTO qualifications (id, name, description, is_national) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name,
                 description = excluded.description,
                 is_national = excluded.is_national",
        )?;
        for qualification in &self.qualifications {
            summary.qualifications += stmt.execute(params![
                qualification.id,
                qualification.name,
                qualification.description,
                qualification.is_national
            ])?;
        }

        let mut stmt = conn.prepare(
            "INSERT INTO process_stages (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )?;
        for stage in &self.processes {
            summary.processes += stmt.execute(params![stage.id, stage.name])?;
        }

        tracing::info!(
            categories = summary.categories,
            tags = summary.tags,
            skills = summary.skills,
            tag_maps = summary.tag_maps,
            qualifications = summary.qualifications,
            processes = summary.processes,
            "imported master data"
        );
        Ok(summary)
    }
}
