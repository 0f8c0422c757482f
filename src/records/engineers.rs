//! Engineer records
//!
//! `userIdentifier` and `email` are unique across engineers; collisions are
//! reported as `DuplicateConflict` before anything is written. Deleting an
//! engineer cascades to its links and career records.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{normalize_date_field, now_timestamp, parse_body, require_existing, require_text};
use crate::db::store::{id_array, placeholders};
use crate::error::{FieldIssue, ServiceError, ServiceResult};
use crate::reconcile::relation::PrincipalKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineerStatus {
    InProject,
    Available,
    OnLeave,
    Retired,
}

impl EngineerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProject => "inProject",
            Self::Available => "available",
            Self::OnLeave => "onLeave",
            Self::Retired => "retired",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        [Self::InProject, Self::Available, Self::OnLeave, Self::Retired]
            .into_iter()
            .find(|status| status.as_str() == raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        [Self::Male, Self::Female, Self::Other]
            .into_iter()
            .find(|gender| gender.as_str() == raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Engineer {
    pub id: String,
    pub user_identifier: String,
    pub name: String,
    pub name_kana: Option<String>,
    pub email: String,
    pub birth_date: Option<String>,
    pub gender: Option<Gender>,
    pub status: EngineerStatus,
    pub affiliation: Option<String>,
    pub specialty: Option<String>,
    pub mbti_type: Option<String>,
    pub joined_at: Option<String>,
    pub retired_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Writable engineer fields as sent by callers. Absent fields are left
/// untouched on update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineerFields {
    pub user_identifier: Option<String>,
    pub name: Option<String>,
    pub name_kana: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    pub status: Option<String>,
    pub affiliation: Option<String>,
    pub specialty: Option<String>,
    pub mbti_type: Option<String>,
    pub joined_at: Option<String>,
    pub retired_at: Option<String>,
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

impl EngineerFields {
    /// Parse and validate a request body. `prefix` scopes issue paths when
    /// the body is one element of an array.
    pub fn from_json(body: &Value, creating: bool, prefix: &str) -> ServiceResult<Self> {
        let mut fields: Self = parse_body(body, prefix)?;
        let mut issues = Vec::new();
        let at = |field: &str| format!("{prefix}{field}");

        if creating {
            require_text(&fields.user_identifier, &at("userIdentifier"), &mut issues);
            require_text(&fields.name, &at("name"), &mut issues);
            require_text(&fields.email, &at("email"), &mut issues);
        } else {
            for (value, field) in [
                (&fields.user_identifier, "userIdentifier"),
                (&fields.name, "name"),
                (&fields.email, "email"),
            ] {
                if value.as_deref().is_some_and(|text| text.trim().is_empty()) {
                    issues.push(FieldIssue::new(at(field), "Must not be empty"));
                }
            }
        }

        if let Some(email) = fields.email.as_deref() {
            if !email.trim().is_empty() && !looks_like_email(email) {
                issues.push(FieldIssue::new(at("email"), "Invalid email address"));
            }
        }
        if let Some(gender) = fields.gender.as_deref() {
            if Gender::parse(gender).is_none() {
                issues.push(FieldIssue::new(at("gender"), "Expected male, female or other"));
            }
        }
        if let Some(status) = fields.status.as_deref() {
            if EngineerStatus::parse(status).is_none() {
                issues.push(FieldIssue::new(
                    at("status"),
                    "Expected inProject, available, onLeave or retired",
                ));
            }
        }

        normalize_date_field(&mut fields.birth_date, &at("birthDate"), &mut issues);
        normalize_date_field(&mut fields.joined_at, &at("joinedAt"), &mut issues);
        normalize_date_field(&mut fields.retired_at, &at("retiredAt"), &mut issues);

        if issues.is_empty() {
            Ok(fields)
        } else {
            Err(ServiceError::Validation(issues))
        }
    }

    /// Overlay the provided fields onto an engineer
    fn apply(self, engineer: &mut Engineer) {
        fn set(target: &mut String, value: Option<String>) {
            if let Some(value) = value {
                *target = value.trim().to_string();
            }
        }
        fn set_opt(target: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *target = value;
            }
        }

        set(&mut engineer.user_identifier, self.user_identifier);
        set(&mut engineer.name, self.name);
        set(&mut engineer.email, self.email);
        set_opt(&mut engineer.name_kana, self.name_kana);
        set_opt(&mut engineer.birth_date, self.birth_date);
        set_opt(&mut engineer.affiliation, self.affiliation);
        set_opt(&mut engineer.specialty, self.specialty);
        set_opt(&mut engineer.mbti_type, self.mbti_type);
        set_opt(&mut engineer.joined_at, self.joined_at);
        set_opt(&mut engineer.retired_at, self.retired_at);
        if let Some(gender) = self.gender.as_deref().and_then(Gender::parse) {
            engineer.gender = Some(gender);
        }
        if let Some(status) = self.status.as_deref().and_then(EngineerStatus::parse) {
            engineer.status = status;
        }
    }
}

const COLUMNS: &str = "id, user_identifier, name, name_kana, email, birth_date, gender, status, \
                       affiliation, specialty, mbti_type, joined_at, retired_at, \
                       created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Engineer> {
    let gender: Option<String> = row.get(6)?;
    let status: String = row.get(7)?;
    Ok(Engineer {
        id: row.get(0)?,
        user_identifier: row.get(1)?,
        name: row.get(2)?,
        name_kana: row.get(3)?,
        email: row.get(4)?,
        birth_date: row.get(5)?,
        gender: gender.as_deref().and_then(Gender::parse),
        status: EngineerStatus::parse(&status).unwrap_or(EngineerStatus::Available),
        affiliation: row.get(8)?,
        specialty: row.get(9)?,
        mbti_type: row.get(10)?,
        joined_at: row.get(11)?,
        retired_at: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

/// Reject identifiers or emails already used by another engineer
fn ensure_unique(
    conn: &Connection,
    user_identifier: &str,
    email: &str,
    exclude: Option<&str>,
) -> ServiceResult<()> {
    let taken: Option<String> = conn
        .query_row(
            "SELECT id FROM engineers
             WHERE (user_identifier = ?1 OR email = ?2) AND id IS NOT ?3
             LIMIT 1",
            params![user_identifier, email, exclude],
            |row| row.get(0),
        )
        .optional()?;

    match taken {
        Some(_) => Err(ServiceError::DuplicateConflict(
            "Engineer with this identifier or email already exists".to_string(),
        )),
        None => Ok(()),
    }
}

/// All engineers, newest first
pub fn list(conn: &Connection) -> ServiceResult<Vec<Engineer>> {
    let sql = format!("SELECT {COLUMNS} FROM engineers ORDER BY created_at DESC, id");
    let mut stmt = conn.prepare(&sql)?;
    let engineers = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(engineers)
}

pub fn by_ids(conn: &Connection, ids: &[String]) -> ServiceResult<Vec<Engineer>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {COLUMNS} FROM engineers WHERE id IN rarray(?1) ORDER BY created_at DESC, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let engineers = stmt
        .query_map([id_array(ids)], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(engineers)
}

fn get(conn: &Connection, id: &str) -> ServiceResult<Engineer> {
    let sql = format!("SELECT {COLUMNS} FROM engineers WHERE id = ?1");
    conn.query_row(&sql, [id], from_row)
        .optional()?
        .ok_or_else(|| ServiceError::PrincipalNotFound {
            kind: PrincipalKind::Engineer,
            id: id.to_string(),
        })
}

/// Create an engineer from validated fields
pub fn create(conn: &Connection, fields: EngineerFields) -> ServiceResult<Engineer> {
    let now = now_timestamp();
    let mut engineer = Engineer {
        id: uuid::Uuid::new_v4().to_string(),
        user_identifier: String::new(),
        name: String::new(),
        name_kana: None,
        email: String::new(),
        birth_date: None,
        gender: None,
        status: EngineerStatus::Available,
        affiliation: None,
        specialty: None,
        mbti_type: None,
        joined_at: None,
        retired_at: None,
        created_at: now.clone(),
        updated_at: now,
    };
    fields.apply(&mut engineer);

    ensure_unique(conn, &engineer.user_identifier, &engineer.email, None)?;
    write(conn, &engineer, true)?;
    tracing::info!(id = %engineer.id, "created engineer");
    Ok(engineer)
}

/// Update one engineer; uniqueness is re-checked excluding the engineer itself
pub fn update(conn: &Connection, id: &str, fields: EngineerFields) -> ServiceResult<Engineer> {
    let mut engineer = get(conn, id)?;
    fields.apply(&mut engineer);
    engineer.updated_at = now_timestamp();

    ensure_unique(conn, &engineer.user_identifier, &engineer.email, Some(id))?;
    write(conn, &engineer, false)?;
    Ok(engineer)
}

/// Update several engineers, pairing ids with field sets by position
pub fn update_many(
    conn: &Connection,
    ids: &[String],
    fields: Vec<EngineerFields>,
) -> ServiceResult<Vec<Engineer>> {
    require_existing(conn, PrincipalKind::Engineer, ids)?;
    ids.iter()
        .zip(fields)
        .map(|(id, fields)| update(conn, id, fields))
        .collect()
}

fn write(conn: &Connection, engineer: &Engineer, insert: bool) -> ServiceResult<()> {
    let sql = if insert {
        format!("INSERT INTO engineers ({COLUMNS}) VALUES ({})", placeholders(1, 15))
    } else {
        "UPDATE engineers SET user_identifier = ?2, name = ?3, name_kana = ?4, email = ?5,
             birth_date = ?6, gender = ?7, status = ?8, affiliation = ?9, specialty = ?10,
             mbti_type = ?11, joined_at = ?12, retired_at = ?13, created_at = ?14,
             updated_at = ?15
         WHERE id = ?1"
            .to_string()
    };

    let gender = engineer.gender.map(Gender::as_str);
    let status = engineer.status.as_str();
    conn.execute(
        &sql,
        params![
            engineer.id,
            engineer.user_identifier,
            engineer.name,
            engineer.name_kana,
            engineer.email,
            engineer.birth_date,
            gender,
            status,
            engineer.affiliation,
            engineer.specialty,
            engineer.mbti_type,
            engineer.joined_at,
            engineer.retired_at,
            engineer.created_at,
            engineer.updated_at,
        ],
    )?;
    Ok(())
}

/// Delete engineers; all ids must exist or nothing is deleted
pub fn delete_many(conn: &Connection, ids: &[String]) -> ServiceResult<usize> {
    require_existing(conn, PrincipalKind::Engineer, ids)?;
    let removed = conn.execute(
        "DELETE FROM engineers WHERE id IN rarray(?1)",
        [id_array(ids)],
    )?;
    tracing::info!(removed, "deleted engineers");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteDatabase;
    use anyhow::Result;
    use serde_json::json;

    fn fields(body: Value) -> EngineerFields {
        EngineerFields::from_json(&body, true, "").unwrap()
    }

    fn alice() -> EngineerFields {
        fields(json!({
            "userIdentifier": "alice",
            "name": "Alice",
            "email": "alice@example.com",
            "gender": "female",
            "joinedAt": "2020-04-01T00:00:00Z"
        }))
    }

    #[test]
    fn test_create_defaults_and_normalizes() -> Result<()> {
        let mut db = SqliteDatabase::open_in_memory()?;
        let engineer = db.write(|store| create(store.conn(), alice()))?;

        assert_eq!(engineer.status, EngineerStatus::Available);
        assert_eq!(engineer.gender, Some(Gender::Female));
        assert_eq!(engineer.joined_at.as_deref(), Some("2020-04-01"));
        assert_eq!(engineer.id.len(), 36);
        Ok(())
    }

    #[test]
    fn test_duplicate_identifier_or_email_conflicts() -> Result<()> {
        let mut db = SqliteDatabase::open_in_memory()?;
        db.write(|store| create(store.conn(), alice()))?;

        let same_email = fields(json!({
            "userIdentifier": "alice2",
            "name": "Alice Two",
            "email": "alice@example.com"
        }));
        let err = db.write(|store| create(store.conn(), same_email)).unwrap_err();
        assert_eq!(err.status(), 409);
        Ok(())
    }

    #[test]
    fn test_update_rechecks_uniqueness_excluding_self() -> Result<()> {
        let mut db = SqliteDatabase::open_in_memory()?;
        let a = db.write(|store| create(store.conn(), alice()))?;
        db.write(|store| {
            create(
                store.conn(),
                fields(json!({"userIdentifier": "bob", "name": "Bob", "email": "bob@example.com"})),
            )
        })?;

        let rename = EngineerFields::from_json(
            &json!({"name": "Alice A.", "email": "alice@example.com"}),
            false,
            "",
        )?;
        let updated = db.write(|store| update(store.conn(), &a.id, rename))?;
        assert_eq!(updated.name, "Alice A.");

        let steal = EngineerFields::from_json(&json!({"userIdentifier": "bob"}), false, "")?;
        let err = db.write(|store| update(store.conn(), &a.id, steal)).unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateConflict(_)));
        Ok(())
    }

    #[test]
    fn test_validation_collects_issues() {
        let err = EngineerFields::from_json(
            &json!({"name": "", "email": "not-an-email", "status": "busy", "birthDate": "soon"}),
            true,
            "",
        )
        .unwrap_err();

        match err {
            ServiceError::Validation(issues) => {
                let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
                assert_eq!(paths, vec!["userIdentifier", "name", "email", "status", "birthDate"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_json_type_is_validation_error() {
        let err = EngineerFields::from_json(&json!({"name": 42}), false, "[0].").unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_delete_many_is_all_or_nothing() -> Result<()> {
        let mut db = SqliteDatabase::open_in_memory()?;
        let a = db.write(|store| create(store.conn(), alice()))?;

        let err = db
            .write(|store| delete_many(store.conn(), &[a.id.clone(), "ghost".to_string()]))
            .unwrap_err();
        assert!(matches!(err, ServiceError::RecordsNotFound { .. }));
        assert_eq!(db.read(|store| list(store.conn()))?.len(), 1);

        let removed = db.write(|store| delete_many(store.conn(), &[a.id.clone()]))?;
        assert_eq!(removed, 1);
        assert!(db.read(|store| list(store.conn()))?.is_empty());
        Ok(())
    }
}
