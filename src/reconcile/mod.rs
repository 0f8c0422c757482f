//! Association reconciliation engine
//!
//! Synchronises many-to-many links between a principal (engineer or career
//! record) and reference master data (skills, qualifications, process stages).
//!
//! Flow for every mutation:
//! identifiers -> principal gate -> reference validation -> strategy -> aggregation.
//!
//! The entry points here are generic over `AssociationStore`; callers decide the
//! transaction. `db::SqliteDatabase::write` runs them under one immediate
//! transaction so a failed replace never leaves an emptied link set behind.
//!
//! # Example
//! ```no_run
//! use skillsheet::db::SqliteDatabase;
//! use skillsheet::reconcile::{self, LinkItem, Relation};
//!
//! let mut db = SqliteDatabase::open_in_memory()?;
//! let items = vec![LinkItem::new("rust", Some("1.80"))];
//! let relation = Relation::EngineerSkills;
//! let done = db.write(|store| reconcile::reconcile(store, relation, "e-1", &items))?;
//! println!("{}", done.outcome.message());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod gate;
pub mod ids;
pub mod outcome;
pub mod relation;
pub mod request;
pub mod store;
pub mod strategy;
pub mod validate;

pub use ids::IdentifierSet;
pub use outcome::{BulkOutcome, Envelope, LinkChange, LinkView, ViewOrder};
pub use relation::{PrincipalKind, RefId, ReferenceKind, Relation};
pub use store::{AssociationLink, AssociationStore};
pub use strategy::{LinkItem, Strategy};

use crate::error::ServiceResult;

/// A finished merge or replace with its projected links
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub outcome: BulkOutcome,
    /// One view per processed tuple, in request order
    pub views: Vec<LinkView>,
}

/// Apply the relation's strategy to `items` for one principal
pub fn reconcile<S: AssociationStore + ?Sized>(
    store: &S,
    relation: Relation,
    principal_id: &str,
    items: &[LinkItem],
) -> ServiceResult<Reconciled> {
    let principal = gate::verify(store, relation.principal(), principal_id)?;
    let outcome = relation.strategy().apply(store, &principal, relation, items)?;

    let views: Vec<LinkView> = outcome
        .items
        .iter()
        .map(|item| LinkView::from_item(relation, principal.id(), item))
        .collect();
    let ids: Vec<RefId> = outcome.items.iter().map(|item| item.reference_id.clone()).collect();
    let entities = store.describe_references(relation.reference(), &ids)?;

    Ok(Reconciled {
        views: outcome::compose(views, entities, ViewOrder::Request),
        outcome,
    })
}

/// Delete the named links of one principal; returns how many existed
pub fn remove<S: AssociationStore + ?Sized>(
    store: &S,
    relation: Relation,
    principal_id: &str,
    reference_ids: &[RefId],
) -> ServiceResult<usize> {
    let principal = gate::verify(store, relation.principal(), principal_id)?;
    strategy::bulk_delete(store, &principal, relation, reference_ids)
}

/// Current links of a principal, gated on its existence
pub fn links<S: AssociationStore + ?Sized>(
    store: &S,
    relation: Relation,
    principal_id: &str,
) -> ServiceResult<Vec<LinkView>> {
    let principal = gate::verify(store, relation.principal(), principal_id)?;
    project(store, relation, principal.id())
}

/// Current links of a principal already known to exist, in catalogue order
pub fn project<S: AssociationStore + ?Sized>(
    store: &S,
    relation: Relation,
    principal_id: &str,
) -> ServiceResult<Vec<LinkView>> {
    let links = store.links_of(relation, principal_id)?;
    if links.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<RefId> = links.iter().map(|link| link.reference_id.clone()).collect();
    let views = links
        .into_iter()
        .map(|link| LinkView::new(relation, principal_id, link.reference_id, link.attribute))
        .collect();
    let entities = store.describe_references(relation.reference(), &ids)?;

    Ok(outcome::compose(views, entities, ViewOrder::Catalog))
}
