//! Personnel records and master data
//!
//! Engineers and career records are the principals links hang off; their
//! single-entity CRUD lives here, outside the reconciliation engine.

pub mod careers;
pub mod engineers;
pub mod masters;

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use std::collections::HashSet;

use crate::db::store::id_array;
use crate::error::{FieldIssue, ServiceError, ServiceResult};
use crate::reconcile::ids::{distinct, missing};
use crate::reconcile::relation::PrincipalKind;
use crate::reconcile::request::normalize_date;

/// Creation/update timestamp, RFC 3339 with microseconds
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Fail unless every id names an existing principal of `kind`.
///
/// A single id reports as `PrincipalNotFound`; several report every missing id.
pub(crate) fn require_existing(
    conn: &Connection,
    kind: PrincipalKind,
    ids: &[String],
) -> ServiceResult<()> {
    let wanted = distinct(ids);
    if wanted.is_empty() {
        return Ok(());
    }

    let sql = format!("SELECT id FROM {} WHERE id IN rarray(?1)", kind.table());
    let mut stmt = conn.prepare(&sql)?;
    let found = stmt
        .query_map([id_array(&wanted)], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;

    let not_found = missing(&wanted, &found);
    match not_found.as_slice() {
        [] => Ok(()),
        [only] if wanted.len() == 1 => Err(ServiceError::PrincipalNotFound {
            kind,
            id: only.clone(),
        }),
        _ => Err(ServiceError::RecordsNotFound {
            what: kind.plural(),
            missing: not_found,
        }),
    }
}

/// Normalise an optional date field in place, recording an issue if invalid
pub(crate) fn normalize_date_field(
    value: &mut Option<String>,
    path: &str,
    issues: &mut Vec<FieldIssue>,
) {
    let Some(raw) = value.as_deref() else {
        return;
    };
    if raw.trim().is_empty() {
        *value = None;
        return;
    }
    match normalize_date(raw) {
        Some(date) => *value = Some(date),
        None => issues.push(FieldIssue::new(path, "Invalid date, expected YYYY-MM-DD")),
    }
}

/// Record an issue unless `value` holds non-blank text
pub(crate) fn require_text(value: &Option<String>, path: &str, issues: &mut Vec<FieldIssue>) {
    if value.as_deref().map_or(true, |text| text.trim().is_empty()) {
        issues.push(FieldIssue::new(path, "Required"));
    }
}

/// Parse a JSON body into a typed draft, turning serde errors into validation issues
pub(crate) fn parse_body<T: serde::de::DeserializeOwned>(
    body: &serde_json::Value,
    path: &str,
) -> ServiceResult<T> {
    serde_json::from_value(body.clone()).map_err(|e| ServiceError::validation(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteDatabase;

    #[test]
    fn test_require_existing_shapes() -> anyhow::Result<()> {
        let db = SqliteDatabase::open_in_memory()?;
        let conn = db.connection();
        conn.execute_batch(
            "INSERT INTO engineers (id, user_identifier, name, email, created_at, updated_at)
             VALUES ('e-1', 'u1', 'A', 'a@example.com', 'now', 'now');",
        )?;

        require_existing(conn, PrincipalKind::Engineer, &["e-1".into(), "e-1".into()])?;

        let err = require_existing(conn, PrincipalKind::Engineer, &["e-9".into()]).unwrap_err();
        assert!(matches!(err, ServiceError::PrincipalNotFound { .. }));

        let err = require_existing(
            conn,
            PrincipalKind::Engineer,
            &["e-1".into(), "e-8".into(), "e-9".into()],
        )
        .unwrap_err();
        match err {
            ServiceError::RecordsNotFound { missing, .. } => {
                assert_eq!(missing, vec!["e-8", "e-9"])
            }
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_normalize_date_field() {
        let mut issues = Vec::new();
        let mut value = Some("2020-04-01T00:00:00+09:00".to_string());
        normalize_date_field(&mut value, "joinedAt", &mut issues);
        assert_eq!(value.as_deref(), Some("2020-04-01"));

        let mut blank = Some(" ".to_string());
        normalize_date_field(&mut blank, "joinedAt", &mut issues);
        assert_eq!(blank, None);

        let mut bad = Some("April".to_string());
        normalize_date_field(&mut bad, "retiredAt", &mut issues);
        assert_eq!(issues, vec![FieldIssue::new("retiredAt", "Invalid date, expected YYYY-MM-DD")]);
    }
}
