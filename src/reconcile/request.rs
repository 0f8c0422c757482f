//! Request-body validation for link operations
//!
//! Bodies arrive as loose JSON. Each parser collects every field-level issue
//! before failing, so a caller sees all problems in one round trip. Both the
//! relation-specific field names (`skillId`, `processIds`) and the generic ones
//! (`referenceId`, `referenceIds`) are accepted.

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};

use super::relation::{AttrKind, Attribute, IdShape, RefId, ReferenceKind, Relation};
use super::strategy::LinkItem;
use crate::error::{FieldIssue, ServiceError, ServiceResult};

const GENERIC_ID: &str = "referenceId";
const GENERIC_IDS: &str = "referenceIds";
const GENERIC_ITEMS: &str = "items";

/// Normalise a calendar date given as `YYYY-MM-DD` or an RFC 3339 timestamp
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.date_naive().format("%Y-%m-%d").to_string())
}

fn as_object(body: &Value) -> ServiceResult<&Map<String, Value>> {
    body.as_object()
        .ok_or_else(|| ServiceError::validation("", "Request body must be a JSON object"))
}

/// First key present in the object, with the key that matched
fn pick<'a>(object: &'a Map<String, Value>, keys: &[&'a str]) -> Option<(&'a str, &'a Value)> {
    keys.iter()
        .find_map(|key| object.get(*key).map(|value| (*key, value)))
}

fn parse_ref_id(
    kind: ReferenceKind,
    value: &Value,
    path: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<RefId> {
    match kind.id_shape() {
        IdShape::Code => match value.as_str().map(str::trim) {
            Some(code) if !code.is_empty() => Some(RefId::Code(code.to_string())),
            _ => {
                issues.push(FieldIssue::new(path, "Expected a non-empty string id"));
                None
            }
        },
        IdShape::Sequence => match value.as_i64() {
            Some(n) if n > 0 => Some(RefId::Seq(n)),
            _ => {
                issues.push(FieldIssue::new(path, "Expected a positive integer id"));
                None
            }
        },
    }
}

fn parse_attribute(
    attribute: Attribute,
    object: &Map<String, Value>,
    prefix: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<String> {
    let path = format!("{prefix}{}", attribute.field);
    match object.get(attribute.field) {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => match attribute.kind {
            AttrKind::Text => Some(raw.clone()),
            AttrKind::Date => match normalize_date(raw) {
                Some(date) => Some(date),
                None => {
                    issues.push(FieldIssue::new(path, "Invalid date, expected YYYY-MM-DD"));
                    None
                }
            },
        },
        Some(_) => {
            issues.push(FieldIssue::new(path, "Expected a string or null"));
            None
        }
    }
}

fn parse_tuple(
    relation: Relation,
    value: &Value,
    prefix: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<LinkItem> {
    let Some(object) = value.as_object() else {
        issues.push(FieldIssue::new(prefix.trim_end_matches('.'), "Expected an object"));
        return None;
    };

    let kind = relation.reference();
    let reference_id = match pick(object, &[kind.id_field(), GENERIC_ID]) {
        Some((key, value)) => parse_ref_id(kind, value, &format!("{prefix}{key}"), issues),
        None => {
            issues.push(FieldIssue::new(format!("{prefix}{}", kind.id_field()), "Required"));
            None
        }
    };

    let attribute = relation
        .attribute()
        .and_then(|attribute| parse_attribute(attribute, object, prefix, issues));

    reference_id.map(|reference_id| LinkItem {
        reference_id,
        attribute,
    })
}

/// Tuples for a merge: a single tuple object, or a list under the relation's
/// plural key (`skills`, `qualifications`) or `items`
pub fn merge_items(relation: Relation, body: &Value) -> ServiceResult<Vec<LinkItem>> {
    let object = as_object(body)?;
    let mut issues = Vec::new();

    let items = match pick(object, &[relation.reference().plural(), GENERIC_ITEMS]) {
        Some((key, Value::Array(list))) => {
            if list.is_empty() {
                issues.push(FieldIssue::new(key, "At least one item is required"));
            }
            list.iter()
                .enumerate()
                .filter_map(|(i, value)| {
                    parse_tuple(relation, value, &format!("{key}[{i}]."), &mut issues)
                })
                .collect()
        }
        Some((key, _)) => {
            issues.push(FieldIssue::new(key, "Expected an array"));
            Vec::new()
        }
        None => parse_tuple(relation, body, "", &mut issues)
            .into_iter()
            .collect(),
    };

    if issues.is_empty() {
        Ok(items)
    } else {
        Err(ServiceError::Validation(issues))
    }
}

/// Non-empty id list under the relation's ids key (`processIds`, `skillIds`)
/// or `referenceIds`
pub fn id_list(relation: Relation, body: &Value) -> ServiceResult<Vec<RefId>> {
    let object = as_object(body)?;
    let kind = relation.reference();

    let Some((key, value)) = pick(object, &[kind.ids_field(), GENERIC_IDS]) else {
        return Err(ServiceError::validation(kind.ids_field(), "Required"));
    };
    let Some(list) = value.as_array() else {
        return Err(ServiceError::validation(key, "Expected an array"));
    };
    if list.is_empty() {
        return Err(ServiceError::validation(key, "At least one id is required"));
    }

    let mut issues = Vec::new();
    let ids: Vec<RefId> = list
        .iter()
        .enumerate()
        .filter_map(|(i, value)| parse_ref_id(kind, value, &format!("{key}[{i}]"), &mut issues))
        .collect();

    if issues.is_empty() {
        Ok(ids)
    } else {
        Err(ServiceError::Validation(issues))
    }
}

/// Tuples for a replace: the complete desired id set
pub fn replace_items(relation: Relation, body: &Value) -> ServiceResult<Vec<LinkItem>> {
    Ok(id_list(relation, body)?
        .into_iter()
        .map(|reference_id| LinkItem {
            reference_id,
            attribute: None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue_paths(err: ServiceError) -> Vec<String> {
        match err {
            ServiceError::Validation(issues) => issues.into_iter().map(|i| i.path).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_normalize_date_formats() {
        assert_eq!(normalize_date("2023-06-15").as_deref(), Some("2023-06-15"));
        assert_eq!(
            normalize_date("2023-06-15T09:30:00Z").as_deref(),
            Some("2023-06-15")
        );
        assert_eq!(normalize_date("15/06/2023"), None);
        assert_eq!(normalize_date("2023-02-30"), None);
    }

    #[test]
    fn test_single_tuple_with_relation_field_names() -> ServiceResult<()> {
        let body = json!({"qualificationId": "cert-1", "acquiredAt": "2023-06-15T00:00:00Z"});
        let items = merge_items(Relation::EngineerQualifications, &body)?;
        assert_eq!(items, vec![LinkItem::new("cert-1", Some("2023-06-15"))]);
        Ok(())
    }

    #[test]
    fn test_generic_field_names() -> ServiceResult<()> {
        let body = json!({"items": [
            {"referenceId": "rust", "version": "1.80"},
            {"referenceId": "go"}
        ]});
        let items = merge_items(Relation::EngineerSkills, &body)?;
        assert_eq!(
            items,
            vec![LinkItem::new("rust", Some("1.80")), LinkItem::bare("go")]
        );
        Ok(())
    }

    #[test]
    fn test_bulk_tuples_collect_every_issue() {
        let body = json!({"skills": [{"skillId": ""}, {"version": 3}, "rust"]});
        let paths = issue_paths(merge_items(Relation::CareerSkills, &body).unwrap_err());
        assert_eq!(
            paths,
            vec!["skills[0].skillId", "skills[1].skillId", "skills[1].version", "skills[2]"]
        );
    }

    #[test]
    fn test_invalid_date_is_validation_error() {
        let body = json!({"qualificationId": "cert-1", "acquiredAt": "yesterday"});
        let paths = issue_paths(merge_items(Relation::EngineerQualifications, &body).unwrap_err());
        assert_eq!(paths, vec!["acquiredAt"]);
    }

    #[test]
    fn test_empty_item_list_is_rejected() {
        let body = json!({"qualifications": []});
        let paths = issue_paths(merge_items(Relation::EngineerQualifications, &body).unwrap_err());
        assert_eq!(paths, vec!["qualifications"]);
    }

    #[test]
    fn test_replace_requires_positive_integers() -> ServiceResult<()> {
        let items = replace_items(Relation::CareerProcesses, &json!({"processIds": [2, 4]}))?;
        assert_eq!(items, vec![LinkItem::bare(2), LinkItem::bare(4)]);

        let items = replace_items(Relation::CareerProcesses, &json!({"referenceIds": [1]}))?;
        assert_eq!(items.len(), 1);

        let paths = issue_paths(
            replace_items(Relation::CareerProcesses, &json!({"processIds": [0, "3", 1.5]}))
                .unwrap_err(),
        );
        assert_eq!(paths, vec!["processIds[0]", "processIds[1]", "processIds[2]"]);

        let err = replace_items(Relation::CareerProcesses, &json!({"processIds": []})).unwrap_err();
        let paths = issue_paths(err);
        assert_eq!(paths, vec!["processIds"]);
        Ok(())
    }

    #[test]
    fn test_id_list_requires_key_and_object() {
        let paths = issue_paths(id_list(Relation::EngineerSkills, &json!({})).unwrap_err());
        assert_eq!(paths, vec!["skillIds"]);

        let paths = issue_paths(id_list(Relation::EngineerSkills, &json!([1, 2])).unwrap_err());
        assert_eq!(paths, vec![""]);
    }
}
