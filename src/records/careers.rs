//! Career records
//!
//! A career record belongs to one engineer and is itself a principal: skills
//! and process stages link to it. Detail reads embed both link sets.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{normalize_date_field, now_timestamp, parse_body, require_existing, require_text};
use crate::db::store::{id_array, placeholders};
use crate::db::SqlStore;
use crate::error::{FieldIssue, ServiceError, ServiceResult};
use crate::reconcile::{self, gate, LinkView, PrincipalKind, Relation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerRecord {
    pub id: String,
    pub engineer_id: String,
    pub title: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub description: Option<String>,
    pub role: Option<String>,
    pub scale: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A career record with its linked skills and process stages
#[derive(Debug, Clone, Serialize)]
pub struct CareerDetail {
    #[serde(flatten)]
    pub record: CareerRecord,
    pub skills: Vec<LinkView>,
    pub processes: Vec<LinkView>,
}

/// Writable career fields. Absent fields are left untouched on update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerFields {
    pub title: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub description: Option<String>,
    pub role: Option<String>,
    pub scale: Option<String>,
}

impl CareerFields {
    pub fn from_json(body: &Value, creating: bool, prefix: &str) -> ServiceResult<Self> {
        let mut fields: Self = parse_body(body, prefix)?;
        let mut issues = Vec::new();
        let at = |field: &str| format!("{prefix}{field}");

        if creating {
            require_text(&fields.title, &at("title"), &mut issues);
        } else if fields.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            issues.push(FieldIssue::new(at("title"), "Must not be empty"));
        }

        normalize_date_field(&mut fields.started_at, &at("startedAt"), &mut issues);
        normalize_date_field(&mut fields.ended_at, &at("endedAt"), &mut issues);

        // Normalised dates compare correctly as text
        if let (Some(start), Some(end)) = (&fields.started_at, &fields.ended_at) {
            if end < start {
                issues.push(FieldIssue::new(at("endedAt"), "Must not be before startedAt"));
            }
        }

        if issues.is_empty() {
            Ok(fields)
        } else {
            Err(ServiceError::Validation(issues))
        }
    }

    fn apply(self, record: &mut CareerRecord) {
        if let Some(title) = self.title {
            record.title = title.trim().to_string();
        }
        for (target, value) in [
            (&mut record.started_at, self.started_at),
            (&mut record.ended_at, self.ended_at),
            (&mut record.description, self.description),
            (&mut record.role, self.role),
            (&mut record.scale, self.scale),
        ] {
            if value.is_some() {
                *target = value;
            }
        }
    }
}

/// Drafts for a create request: one object, or a list under `careerHistories`
pub fn parse_drafts(body: &Value) -> ServiceResult<Vec<CareerFields>> {
    match body.get("careerHistories") {
        Some(Value::Array(list)) if list.is_empty() => Err(ServiceError::validation(
            "careerHistories",
            "At least one career history is required",
        )),
        Some(Value::Array(list)) => {
            let mut drafts = Vec::with_capacity(list.len());
            let mut issues = Vec::new();
            for (i, item) in list.iter().enumerate() {
                match CareerFields::from_json(item, true, &format!("careerHistories[{i}].")) {
                    Ok(draft) => drafts.push(draft),
                    Err(ServiceError::Validation(found)) => issues.extend(found),
                    Err(other) => return Err(other),
                }
            }
            if issues.is_empty() {
                Ok(drafts)
            } else {
                Err(ServiceError::Validation(issues))
            }
        }
        Some(_) => Err(ServiceError::validation("careerHistories", "Expected an array")),
        None => Ok(vec![CareerFields::from_json(body, true, "")?]),
    }
}

const COLUMNS: &str = "id, engineer_id, title, started_at, ended_at, description, role, scale, \
                       created_at, updated_at";

/// Newest engagement first; undated records last
const ORDER: &str = "started_at IS NULL, started_at DESC, created_at DESC";

fn from_row(row: &Row<'_>) -> rusqlite::Result<CareerRecord> {
    Ok(CareerRecord {
        id: row.get(0)?,
        engineer_id: row.get(1)?,
        title: row.get(2)?,
        started_at: row.get(3)?,
        ended_at: row.get(4)?,
        description: row.get(5)?,
        role: row.get(6)?,
        scale: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Create career records for an engineer, all or nothing
pub fn create_many(
    store: &SqlStore<'_>,
    engineer_id: &str,
    drafts: Vec<CareerFields>,
) -> ServiceResult<Vec<CareerRecord>> {
    let engineer = gate::verify(store, PrincipalKind::Engineer, engineer_id)?;
    let conn = store.conn();
    let sql = format!("INSERT INTO career_histories ({COLUMNS}) VALUES ({})", placeholders(1, 10));

    let mut created = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let now = now_timestamp();
        let mut record = CareerRecord {
            id: uuid::Uuid::new_v4().to_string(),
            engineer_id: engineer.id().to_string(),
            title: String::new(),
            started_at: None,
            ended_at: None,
            description: None,
            role: None,
            scale: None,
            created_at: now.clone(),
            updated_at: now,
        };
        draft.apply(&mut record);

        conn.execute(
            &sql,
            params![
                record.id,
                record.engineer_id,
                record.title,
                record.started_at,
                record.ended_at,
                record.description,
                record.role,
                record.scale,
                record.created_at,
                record.updated_at,
            ],
        )?;
        created.push(record);
    }

    tracing::info!(engineer = engineer.id(), count = created.len(), "created career histories");
    Ok(created)
}

/// Career records of one engineer, gated on the engineer's existence
pub fn list_for_engineer(
    store: &SqlStore<'_>,
    engineer_id: &str,
) -> ServiceResult<Vec<CareerRecord>> {
    let engineer = gate::verify(store, PrincipalKind::Engineer, engineer_id)?;
    let sql =
        format!("SELECT {COLUMNS} FROM career_histories WHERE engineer_id = ?1 ORDER BY {ORDER}");
    let mut stmt = store.conn().prepare(&sql)?;
    let records = stmt
        .query_map([engineer.id()], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

pub fn by_ids(conn: &Connection, ids: &[String]) -> ServiceResult<Vec<CareerRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql =
        format!("SELECT {COLUMNS} FROM career_histories WHERE id IN rarray(?1) ORDER BY {ORDER}");
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map([id_array(ids)], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Attach link projections to each record
pub fn details(
    store: &SqlStore<'_>,
    records: Vec<CareerRecord>,
) -> ServiceResult<Vec<CareerDetail>> {
    records
        .into_iter()
        .map(|record| {
            let skills = reconcile::project(store, Relation::CareerSkills, &record.id)?;
            let processes = reconcile::project(store, Relation::CareerProcesses, &record.id)?;
            Ok(CareerDetail {
                record,
                skills,
                processes,
            })
        })
        .collect()
}

fn get(conn: &Connection, id: &str) -> ServiceResult<CareerRecord> {
    let sql = format!("SELECT {COLUMNS} FROM career_histories WHERE id = ?1");
    conn.query_row(&sql, [id], from_row)
        .optional()?
        .ok_or_else(|| ServiceError::PrincipalNotFound {
            kind: PrincipalKind::CareerRecord,
            id: id.to_string(),
        })
}

pub fn update(conn: &Connection, id: &str, fields: CareerFields) -> ServiceResult<CareerRecord> {
    let mut record = get(conn, id)?;
    fields.apply(&mut record);
    record.updated_at = now_timestamp();

    if let (Some(start), Some(end)) = (&record.started_at, &record.ended_at) {
        if end < start {
            return Err(ServiceError::validation("endedAt", "Must not be before startedAt"));
        }
    }

    conn.execute(
        "UPDATE career_histories SET title = ?2, started_at = ?3, ended_at = ?4,
             description = ?5, role = ?6, scale = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            record.id,
            record.title,
            record.started_at,
            record.ended_at,
            record.description,
            record.role,
            record.scale,
            record.updated_at,
        ],
    )?;
    Ok(record)
}

/// Update several records, pairing ids with field sets by position
pub fn update_many(
    conn: &Connection,
    ids: &[String],
    fields: Vec<CareerFields>,
) -> ServiceResult<Vec<CareerRecord>> {
    require_existing(conn, PrincipalKind::CareerRecord, ids)?;
    ids.iter()
        .zip(fields)
        .map(|(id, fields)| update(conn, id, fields))
        .collect()
}

/// Delete career records; all ids must exist or nothing is deleted
pub fn delete_many(conn: &Connection, ids: &[String]) -> ServiceResult<usize> {
    require_existing(conn, PrincipalKind::CareerRecord, ids)?;
    let removed = conn.execute(
        "DELETE FROM career_histories WHERE id IN rarray(?1)",
        [id_array(ids)],
    )?;
    tracing::info!(removed, "deleted career histories");
    Ok(removed)
}
