//! Collaborator interfaces the engine reads and writes through
//!
//! The engine never issues queries itself. It asks three narrow questions of
//! its store: does this principal exist, which of these references exist, and
//! what links does this principal have. `db::store::SqlStore` answers them from
//! SQLite; tests answer them from memory.

use std::collections::HashSet;

use super::relation::{PrincipalKind, RefId, ReferenceKind, Relation};
use crate::error::ServiceResult;
use crate::records::masters::ReferenceEntity;

/// A junction record keyed by (principal id, reference id)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationLink {
    pub principal_id: String,
    pub reference_id: RefId,
    /// The relation's single optional attribute, already normalised
    pub attribute: Option<String>,
}

impl AssociationLink {
    pub fn new(principal_id: &str, reference_id: RefId, attribute: Option<String>) -> Self {
        Self {
            principal_id: principal_id.to_string(),
            reference_id,
            attribute,
        }
    }
}

/// Principal lookup keyed by id
pub trait PrincipalDirectory {
    fn principal_exists(&self, kind: PrincipalKind, id: &str) -> ServiceResult<bool>;
}

/// Batched reference-entity lookup keyed by id set
pub trait ReferenceCatalog {
    /// The subset of `ids` that exist, fetched in one lookup
    fn existing_references(
        &self,
        kind: ReferenceKind,
        ids: &[RefId],
    ) -> ServiceResult<HashSet<RefId>>;

    /// Full entities for `ids`, in catalogue display order
    fn describe_references(
        &self,
        kind: ReferenceKind,
        ids: &[RefId],
    ) -> ServiceResult<Vec<ReferenceEntity>>;
}

/// Create, update and delete primitives over one relation's junction table
pub trait LinkStore {
    fn find_link(
        &self,
        relation: Relation,
        principal_id: &str,
        reference_id: &RefId,
    ) -> ServiceResult<Option<AssociationLink>>;

    fn insert_link(&self, relation: Relation, link: &AssociationLink) -> ServiceResult<()>;

    fn update_link(&self, relation: Relation, link: &AssociationLink) -> ServiceResult<()>;

    /// Remove the named links; returns how many actually existed
    fn delete_links(
        &self,
        relation: Relation,
        principal_id: &str,
        reference_ids: &[RefId],
    ) -> ServiceResult<usize>;

    /// Remove every link the principal has in this relation
    fn clear_links(&self, relation: Relation, principal_id: &str) -> ServiceResult<usize>;

    fn links_of(&self, relation: Relation, principal_id: &str)
        -> ServiceResult<Vec<AssociationLink>>;
}

/// Everything a reconciliation needs from its store
pub trait AssociationStore: PrincipalDirectory + ReferenceCatalog + LinkStore {}

impl<T: PrincipalDirectory + ReferenceCatalog + LinkStore + ?Sized> AssociationStore for T {}
