//! Request handlers
//!
//! Each handler validates its body, runs one read or write transaction and
//! shapes the envelope. Nothing here touches transport types.

use serde::Serialize;
use serde_json::Value;

use crate::db::SqliteDatabase;
use crate::error::{ServiceError, ServiceResult};
use crate::reconcile::relation::{IdShape, RefId};
use crate::reconcile::{self, request, Envelope, IdentifierSet, PrincipalKind, Relation, Strategy};
use crate::records::careers::{self, CareerDetail, CareerFields};
use crate::records::engineers::{self, Engineer, EngineerFields};
use crate::records::masters::{
    self, ProcessStage, Qualification, Skill, SkillCategory, TagDetail, TagMapFilter,
};

/// Status code and envelope, or the failure to report
pub type Reply = ServiceResult<(u16, Envelope)>;

// === Links ===

pub fn list_links(db: &mut SqliteDatabase, relation: Relation, principal_id: &str) -> Reply {
    let views = db.read(|store| reconcile::links(store, relation, principal_id))?;
    Ok((200, Envelope::list(&views)?))
}

/// POST (and PUT on merge relations)
pub fn apply_links(
    db: &mut SqliteDatabase,
    relation: Relation,
    principal_id: &str,
    body: &Value,
) -> Reply {
    let items = match relation.strategy() {
        Strategy::Merge => request::merge_items(relation, body)?,
        Strategy::Replace => request::replace_items(relation, body)?,
    };
    let done = db.write(|store| reconcile::reconcile(store, relation, principal_id, &items))?;
    Ok((201, Envelope::bulk(&done.outcome, &done.views)?))
}

pub fn delete_links(
    db: &mut SqliteDatabase,
    relation: Relation,
    principal_id: &str,
    body: &Value,
) -> Reply {
    let ids = request::id_list(relation, body)?;
    let removed = db.write(|store| reconcile::remove(store, relation, principal_id, &ids))?;
    Ok((
        200,
        Envelope::deleted(removed, format!("{removed} {relation} deleted")),
    ))
}

// === Principals ===

pub fn list_engineers(db: &mut SqliteDatabase) -> Reply {
    let all = db.read(|store| engineers::list(store.conn()))?;
    Ok((200, Envelope::list(&all)?))
}

pub fn create_engineer(db: &mut SqliteDatabase, body: &Value) -> Reply {
    let fields = EngineerFields::from_json(body, true, "")?;
    let engineer = db.write(|store| engineers::create(store.conn(), fields))?;
    Ok((201, Envelope::ok(&engineer)?.with_message("Engineer created")))
}

pub fn list_careers(db: &mut SqliteDatabase, engineer_id: &str) -> Reply {
    let details = db.read(|store| {
        let records = careers::list_for_engineer(store, engineer_id)?;
        careers::details(store, records)
    })?;
    Ok((200, Envelope::list(&details)?))
}

/// One draft answers with the bare record, `careerHistories` with a list
pub fn create_careers(db: &mut SqliteDatabase, engineer_id: &str, body: &Value) -> Reply {
    let drafts = careers::parse_drafts(body)?;
    let batch = body.get("careerHistories").is_some();
    let created = db.write(|store| careers::create_many(store, engineer_id, drafts))?;

    let envelope = if batch {
        Envelope::list(&created)?
            .with_message(format!("{} career histories created", created.len()))
    } else {
        Envelope::ok(created.first())?.with_message("Career history created")
    };
    Ok((201, envelope))
}

pub fn get_records(db: &mut SqliteDatabase, kind: PrincipalKind, ids: &IdentifierSet) -> Reply {
    db.read(|store| match kind {
        PrincipalKind::Engineer => {
            let found = engineers::by_ids(store.conn(), ids.as_slice())?;
            Envelope::lookup(
                ids,
                found,
                |e: &Engineer| e.id.clone(),
                IdShape::Code,
                kind.label(),
                kind.plural(),
            )
        }
        PrincipalKind::CareerRecord => {
            let found = careers::details(store, careers::by_ids(store.conn(), ids.as_slice())?)?;
            Envelope::lookup(
                ids,
                found,
                |d: &CareerDetail| d.record.id.clone(),
                IdShape::Code,
                kind.label(),
                kind.plural(),
            )
        }
    })
}

/// One id takes an object; several ids take an array of equal length
fn field_sets<T>(
    ids: &IdentifierSet,
    body: &Value,
    parse: impl Fn(&Value, &str) -> ServiceResult<T>,
) -> ServiceResult<Vec<T>> {
    if ids.is_single() {
        return Ok(vec![parse(body, "")?]);
    }

    let Some(list) = body.as_array() else {
        return Err(ServiceError::validation(
            "body",
            "Expected an array with one entry per id",
        ));
    };
    if list.len() != ids.len() {
        return Err(ServiceError::validation(
            "body",
            format!("Expected {} entries, got {}", ids.len(), list.len()),
        ));
    }

    let mut sets = Vec::with_capacity(list.len());
    let mut issues = Vec::new();
    for (i, value) in list.iter().enumerate() {
        match parse(value, &format!("[{i}].")) {
            Ok(set) => sets.push(set),
            Err(ServiceError::Validation(found)) => issues.extend(found),
            Err(other) => return Err(other),
        }
    }

    if issues.is_empty() {
        Ok(sets)
    } else {
        Err(ServiceError::Validation(issues))
    }
}

/// Bare object for one id, array otherwise
fn shaped<T: Serialize>(ids: &IdentifierSet, records: &[T]) -> ServiceResult<Envelope> {
    if ids.is_single() {
        Envelope::ok(records.first())
    } else {
        Envelope::list(records)
    }
}

pub fn update_records(
    db: &mut SqliteDatabase,
    kind: PrincipalKind,
    ids: &IdentifierSet,
    body: &Value,
) -> Reply {
    let envelope = match kind {
        PrincipalKind::Engineer => {
            let fields = field_sets(ids, body, |value, prefix| {
                EngineerFields::from_json(value, false, prefix)
            })?;
            let updated =
                db.write(|store| engineers::update_many(store.conn(), ids.as_slice(), fields))?;
            shaped(ids, &updated)?
        }
        PrincipalKind::CareerRecord => {
            let fields = field_sets(ids, body, |value, prefix| {
                CareerFields::from_json(value, false, prefix)
            })?;
            let updated =
                db.write(|store| careers::update_many(store.conn(), ids.as_slice(), fields))?;
            shaped(ids, &updated)?
        }
    };
    Ok((200, envelope))
}

pub fn delete_records(db: &mut SqliteDatabase, kind: PrincipalKind, ids: &IdentifierSet) -> Reply {
    let removed = db.write(|store| match kind {
        PrincipalKind::Engineer => engineers::delete_many(store.conn(), ids.as_slice()),
        PrincipalKind::CareerRecord => careers::delete_many(store.conn(), ids.as_slice()),
    })?;
    Ok((
        200,
        Envelope::deleted(removed, format!("{removed} {} deleted", kind.plural())),
    ))
}

// === Master data ===

/// Read-only reference collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Master {
    Categories,
    Tags,
    Skills,
    Qualifications,
    Processes,
}

pub fn list_master(db: &mut SqliteDatabase, master: Master) -> Reply {
    let envelope = db.read(|store| {
        let conn = store.conn();
        match master {
            Master::Categories => Envelope::list(&masters::list_categories(conn)?),
            Master::Tags => Envelope::list(&masters::list_tags(conn)?),
            Master::Skills => Envelope::list(&masters::list_skills(conn)?),
            Master::Qualifications => Envelope::list(&masters::list_qualifications(conn)?),
            Master::Processes => Envelope::list(&masters::list_processes(conn)?),
        }
    })?;
    Ok((200, envelope))
}

pub fn get_master(db: &mut SqliteDatabase, master: Master, ids: &IdentifierSet) -> Reply {
    db.read(|store| {
        let conn = store.conn();
        match master {
            Master::Categories => Envelope::lookup(
                ids,
                masters::categories_by_ids(conn, ids.as_slice())?,
                |c: &SkillCategory| c.id.clone(),
                IdShape::Code,
                "Skill category",
                "skill categories",
            ),
            Master::Tags => Envelope::lookup(
                ids,
                masters::tags_by_ids(conn, ids.as_slice())?,
                |t: &TagDetail| t.tag.id.clone(),
                IdShape::Code,
                "Skill tag",
                "tags",
            ),
            Master::Skills => Envelope::lookup(
                ids,
                masters::skills_by_ids(conn, ids.as_slice())?,
                |s: &Skill| s.id.clone(),
                IdShape::Code,
                "Skill",
                "skills",
            ),
            Master::Qualifications => Envelope::lookup(
                ids,
                masters::qualifications_by_ids(conn, ids.as_slice())?,
                |q: &Qualification| q.id.clone(),
                IdShape::Code,
                "Qualification",
                "qualifications",
            ),
            Master::Processes => {
                let parsed: Vec<RefId> = ids
                    .as_slice()
                    .iter()
                    .map(|id| RefId::parse(IdShape::Sequence, id))
                    .collect();
                Envelope::lookup(
                    ids,
                    masters::processes_by_ids(conn, &parsed)?,
                    |p: &ProcessStage| p.id.to_string(),
                    IdShape::Sequence,
                    "Process",
                    "processes",
                )
            }
        }
    })
}

pub fn list_tag_maps(db: &mut SqliteDatabase, filter: &TagMapFilter) -> Reply {
    let maps = db.read(|store| masters::tag_maps(store.conn(), filter))?;
    Ok((200, Envelope::list(&maps)?))
}
