//! SQLite implementation of the reconciliation store traits
//!
//! Table and column names come from `Relation`/`ReferenceKind`, never from
//! request input, so building SQL with `format!` here is safe.

use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::vtab::array::Array;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use std::collections::HashSet;
use std::rc::Rc;

use crate::error::ServiceResult;
use crate::reconcile::relation::{IdShape, PrincipalKind, RefId, ReferenceKind, Relation};
use crate::reconcile::store::{AssociationLink, LinkStore, PrincipalDirectory, ReferenceCatalog};
use crate::records::masters::{self, ReferenceEntity};

impl ToSql for RefId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            RefId::Code(code) => code.to_sql(),
            RefId::Seq(n) => n.to_sql(),
        }
    }
}

impl From<RefId> for Value {
    fn from(id: RefId) -> Self {
        match id {
            RefId::Code(code) => Value::Text(code),
            RefId::Seq(n) => Value::Integer(n),
        }
    }
}

/// Read a reference id column according to its shape
pub(crate) fn read_ref_id(row: &Row<'_>, idx: usize, shape: IdShape) -> rusqlite::Result<RefId> {
    match shape {
        IdShape::Code => row.get::<_, String>(idx).map(RefId::Code),
        IdShape::Sequence => row.get::<_, i64>(idx).map(RefId::Seq),
    }
}

/// An id list bound as one parameter, for `... IN rarray(?N)`.
///
/// SQLite caps the number of bind variables per statement; a single array
/// parameter keeps id lists of any length to one statement.
pub(crate) fn id_array<T: Clone + Into<Value>>(ids: &[T]) -> Array {
    Rc::new(ids.iter().cloned().map(Into::into).collect())
}

/// `?1, ?2, ...` starting at `first`
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Store view over one open transaction
pub struct SqlStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqlStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &'c Connection {
        self.conn
    }
}

impl PrincipalDirectory for SqlStore<'_> {
    fn principal_exists(&self, kind: PrincipalKind, id: &str) -> ServiceResult<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", kind.table());
        let exists = self.conn.query_row(&sql, [id], |row| row.get(0))?;
        Ok(exists)
    }
}

impl ReferenceCatalog for SqlStore<'_> {
    fn existing_references(
        &self,
        kind: ReferenceKind,
        ids: &[RefId],
    ) -> ServiceResult<HashSet<RefId>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let sql = format!("SELECT id FROM {} WHERE id IN rarray(?1)", kind.table());
        let mut stmt = self.conn.prepare(&sql)?;
        let shape = kind.id_shape();
        let found = stmt
            .query_map([id_array(ids)], |row| read_ref_id(row, 0, shape))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(found)
    }

    fn describe_references(
        &self,
        kind: ReferenceKind,
        ids: &[RefId],
    ) -> ServiceResult<Vec<ReferenceEntity>> {
        masters::describe(self.conn, kind, ids)
    }
}

/// `version` / `acquired_at`, or a NULL literal for attribute-less relations
fn attribute_column(relation: Relation) -> &'static str {
    relation
        .attribute()
        .map(|attribute| attribute.column)
        .unwrap_or("NULL")
}

impl LinkStore for SqlStore<'_> {
    fn find_link(
        &self,
        relation: Relation,
        principal_id: &str,
        reference_id: &RefId,
    ) -> ServiceResult<Option<AssociationLink>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 AND {} = ?2",
            attribute_column(relation),
            relation.table(),
            relation.principal_column(),
            relation.reference_column()
        );
        let attribute: Option<Option<String>> = self
            .conn
            .query_row(&sql, params![principal_id, reference_id], |row| row.get(0))
            .optional()?;

        Ok(attribute
            .map(|attribute| AssociationLink::new(principal_id, reference_id.clone(), attribute)))
    }

    fn insert_link(&self, relation: Relation, link: &AssociationLink) -> ServiceResult<()> {
        match relation.attribute() {
            Some(attribute) => {
                let sql = format!(
                    "INSERT INTO {} ({}, {}, {}) VALUES (?1, ?2, ?3)",
                    relation.table(),
                    relation.principal_column(),
                    relation.reference_column(),
                    attribute.column
                );
                self.conn.execute(
                    &sql,
                    params![link.principal_id, link.reference_id, link.attribute],
                )?;
            }
            None => {
                let sql = format!(
                    "INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
                    relation.table(),
                    relation.principal_column(),
                    relation.reference_column()
                );
                self.conn
                    .execute(&sql, params![link.principal_id, link.reference_id])?;
            }
        }
        Ok(())
    }

    fn update_link(&self, relation: Relation, link: &AssociationLink) -> ServiceResult<()> {
        // Nothing to overwrite on attribute-less relations
        let Some(attribute) = relation.attribute() else {
            return Ok(());
        };

        let sql = format!(
            "UPDATE {} SET {} = ?3 WHERE {} = ?1 AND {} = ?2",
            relation.table(),
            attribute.column,
            relation.principal_column(),
            relation.reference_column()
        );
        self.conn.execute(
            &sql,
            params![link.principal_id, link.reference_id, link.attribute],
        )?;
        Ok(())
    }

    fn delete_links(
        &self,
        relation: Relation,
        principal_id: &str,
        reference_ids: &[RefId],
    ) -> ServiceResult<usize> {
        if reference_ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1 AND {} IN rarray(?2)",
            relation.table(),
            relation.principal_column(),
            relation.reference_column()
        );
        let removed = self
            .conn
            .execute(&sql, params![principal_id, id_array(reference_ids)])?;
        Ok(removed)
    }

    fn clear_links(&self, relation: Relation, principal_id: &str) -> ServiceResult<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            relation.table(),
            relation.principal_column()
        );
        let removed = self.conn.execute(&sql, [principal_id])?;
        Ok(removed)
    }

    fn links_of(
        &self,
        relation: Relation,
        principal_id: &str,
    ) -> ServiceResult<Vec<AssociationLink>> {
        let sql = format!(
            "SELECT {}, {} FROM {} WHERE {} = ?1 ORDER BY {}",
            relation.reference_column(),
            attribute_column(relation),
            relation.table(),
            relation.principal_column(),
            relation.reference_column()
        );
        let shape = relation.reference().id_shape();
        let mut stmt = self.conn.prepare(&sql)?;
        let links = stmt
            .query_map([principal_id], |row| {
                Ok(AssociationLink::new(
                    principal_id,
                    read_ref_id(row, 0, shape)?,
                    row.get(1)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteDatabase;
    use anyhow::Result;

    fn seeded() -> Result<SqliteDatabase> {
        let db = SqliteDatabase::open_in_memory()?;
        db.connection().execute_batch(
            "INSERT INTO skill_categories (id, label) VALUES ('lang', 'Languages');
             INSERT INTO skills (id, label, category_id) VALUES ('rust', 'Rust', 'lang');
             INSERT INTO engineers (id, user_identifier, name, email, created_at, updated_at)
             VALUES ('e-1', 'u1', 'A', 'a@example.com', 'now', 'now');
             INSERT INTO career_histories (id, engineer_id, title, created_at, updated_at)
             VALUES ('c-1', 'e-1', 'Project', 'now', 'now');",
        )?;
        Ok(db)
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1, 3), "?1, ?2, ?3");
        assert_eq!(placeholders(2, 1), "?2");
    }

    #[test]
    fn test_existing_references_by_shape() -> Result<()> {
        let mut db = seeded()?;
        db.read(|store| {
            let found = store.existing_references(
                ReferenceKind::ProcessStage,
                &[RefId::Seq(2), RefId::Seq(99), RefId::from("two")],
            )?;
            assert_eq!(found, HashSet::from([RefId::Seq(2)]));

            let found = store.existing_references(
                ReferenceKind::Skill,
                &[RefId::from("rust"), RefId::from("zig")],
            )?;
            assert_eq!(found, HashSet::from([RefId::from("rust")]));
            Ok(())
        })?;
        Ok(())
    }

    #[test]
    fn test_link_primitives() -> Result<()> {
        let mut db = seeded()?;
        db.write(|store| {
            let relation = Relation::EngineerSkills;
            let link = AssociationLink::new("e-1", RefId::from("rust"), Some("1.80".into()));

            assert_eq!(store.find_link(relation, "e-1", &link.reference_id)?, None);
            store.insert_link(relation, &link)?;
            assert_eq!(
                store.find_link(relation, "e-1", &link.reference_id)?,
                Some(link.clone())
            );

            let cleared = AssociationLink::new("e-1", RefId::from("rust"), None);
            store.update_link(relation, &cleared)?;
            assert_eq!(store.links_of(relation, "e-1")?, vec![cleared]);

            let removed =
                store.delete_links(relation, "e-1", &[RefId::from("rust"), RefId::from("zig")])?;
            assert_eq!(removed, 1);
            assert!(store.links_of(relation, "e-1")?.is_empty());
            Ok(())
        })?;
        Ok(())
    }

    #[test]
    fn test_attribute_less_relation() -> Result<()> {
        let mut db = seeded()?;
        db.write(|store| {
            let relation = Relation::CareerProcesses;
            for n in [3, 1] {
                store.insert_link(relation, &AssociationLink::new("c-1", RefId::Seq(n), None))?;
            }

            let found = store.find_link(relation, "c-1", &RefId::Seq(3))?;
            assert_eq!(found.map(|link| link.attribute), Some(None));

            let ids: Vec<_> = store
                .links_of(relation, "c-1")?
                .into_iter()
                .map(|link| link.reference_id)
                .collect();
            assert_eq!(ids, vec![RefId::Seq(1), RefId::Seq(3)]);

            assert_eq!(store.clear_links(relation, "c-1")?, 2);
            Ok(())
        })?;
        Ok(())
    }

    #[test]
    fn test_id_lists_beyond_bind_limit() -> Result<()> {
        let mut db = seeded()?;
        let mut ids: Vec<RefId> = (0..40_000).map(|n| RefId::Code(format!("s-{n}"))).collect();
        ids.push(RefId::from("rust"));

        db.write(|store| {
            let found = store.existing_references(ReferenceKind::Skill, &ids)?;
            assert_eq!(found, HashSet::from([RefId::from("rust")]));

            let relation = Relation::EngineerSkills;
            store.insert_link(relation, &AssociationLink::new("e-1", RefId::from("rust"), None))?;
            assert_eq!(store.delete_links(relation, "e-1", &ids)?, 1);
            Ok(())
        })?;
        Ok(())
    }

    #[test]
    fn test_principal_lookup_per_kind() -> Result<()> {
        let mut db = seeded()?;
        db.read(|store| {
            assert!(store.principal_exists(PrincipalKind::Engineer, "e-1")?);
            assert!(!store.principal_exists(PrincipalKind::CareerRecord, "e-1")?);
            assert!(store.principal_exists(PrincipalKind::CareerRecord, "c-1")?);
            Ok(())
        })?;
        Ok(())
    }
}
