//! Merge and replace reconciliation, plus bulk delete
//!
//! Both strategies share one interface: a verified principal and an ordered
//! list of `(reference id, attribute)` tuples. References are validated in one
//! batch before anything is written; callers run the whole call inside one
//! store transaction so a failure leaves the link set untouched.

use std::collections::HashMap;

use super::gate::VerifiedPrincipal;
use super::ids::distinct;
use super::outcome::{Aggregator, BulkOutcome, LinkChange};
use super::relation::{RefId, Relation};
use super::store::{AssociationLink, AssociationStore};
use super::validate;
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Upsert each tuple; links not mentioned stay as they are
    Merge,
    /// The tuples are the complete desired set; links not mentioned are dropped
    Replace,
}

/// One requested link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkItem {
    pub reference_id: RefId,
    pub attribute: Option<String>,
}

impl LinkItem {
    pub fn new(reference_id: impl Into<RefId>, attribute: Option<&str>) -> Self {
        Self {
            reference_id: reference_id.into(),
            attribute: attribute.map(str::to_string),
        }
    }

    pub fn bare(reference_id: impl Into<RefId>) -> Self {
        Self::new(reference_id, None)
    }
}

impl Strategy {
    pub fn apply<S: AssociationStore + ?Sized>(
        self,
        store: &S,
        principal: &VerifiedPrincipal,
        relation: Relation,
        items: &[LinkItem],
    ) -> ServiceResult<BulkOutcome> {
        debug_assert_eq!(principal.kind(), relation.principal());
        if items.is_empty() {
            return Err(ServiceError::validation(
                relation.reference().plural(),
                "At least one item is required",
            ));
        }

        let ids: Vec<RefId> = items.iter().map(|item| item.reference_id.clone()).collect();
        validate::require_all(store, relation.reference(), &ids)?;

        let outcome = match self {
            Self::Merge => merge(store, principal, relation, items)?,
            Self::Replace => replace(store, principal, relation, items)?,
        };

        let tally = outcome.tally();
        tracing::debug!(
            relation = %relation,
            principal = principal.id(),
            created = tally.created,
            updated = tally.updated,
            unchanged = tally.unchanged,
            removed = outcome.removed,
            "reconciled links"
        );
        Ok(outcome)
    }
}

/// Upsert every tuple in order. A repeated id sees the write of its earlier
/// occurrence, so the last attribute wins.
fn merge<S: AssociationStore + ?Sized>(
    store: &S,
    principal: &VerifiedPrincipal,
    relation: Relation,
    items: &[LinkItem],
) -> ServiceResult<BulkOutcome> {
    let mut aggregator = Aggregator::new(relation, Strategy::Merge, principal);

    for item in items {
        let link = AssociationLink::new(
            principal.id(),
            item.reference_id.clone(),
            item.attribute.clone(),
        );

        let change = match store.find_link(relation, principal.id(), &item.reference_id)? {
            None => {
                store.insert_link(relation, &link)?;
                LinkChange::Created
            }
            Some(existing) if existing.attribute == link.attribute => LinkChange::Unchanged,
            Some(_) => {
                store.update_link(relation, &link)?;
                LinkChange::Updated
            }
        };

        aggregator.record(link.reference_id, link.attribute, change);
    }

    Ok(aggregator.finish())
}

/// Clear the principal's links, then recreate the requested set. Each distinct
/// id is linked once, at its first position, with its last attribute.
fn replace<S: AssociationStore + ?Sized>(
    store: &S,
    principal: &VerifiedPrincipal,
    relation: Relation,
    items: &[LinkItem],
) -> ServiceResult<BulkOutcome> {
    let mut aggregator = Aggregator::new(relation, Strategy::Replace, principal);

    let previous: HashMap<RefId, Option<String>> = store
        .links_of(relation, principal.id())?
        .into_iter()
        .map(|link| (link.reference_id, link.attribute))
        .collect();

    let mut latest: HashMap<&RefId, &Option<String>> = HashMap::new();
    for item in items {
        latest.insert(&item.reference_id, &item.attribute);
    }

    let ids: Vec<RefId> = items.iter().map(|item| item.reference_id.clone()).collect();
    let desired = distinct(&ids);

    store.clear_links(relation, principal.id())?;

    for reference_id in desired {
        let attribute = latest.get(&reference_id).and_then(|attr| (*attr).clone());
        let change = match previous.get(&reference_id) {
            None => LinkChange::Created,
            Some(before) if *before == attribute => LinkChange::Unchanged,
            Some(_) => LinkChange::Updated,
        };

        store.insert_link(
            relation,
            &AssociationLink::new(principal.id(), reference_id.clone(), attribute.clone()),
        )?;
        aggregator.record(reference_id, attribute, change);
    }

    let kept = kept_count(&previous, items);
    aggregator.record_removed(previous.len() - kept);

    Ok(aggregator.finish())
}

/// How many of the previous links the new set keeps
fn kept_count(previous: &HashMap<RefId, Option<String>>, items: &[LinkItem]) -> usize {
    let ids: Vec<&RefId> = items.iter().map(|item| &item.reference_id).collect();
    distinct(&ids)
        .into_iter()
        .filter(|id| previous.contains_key(*id))
        .count()
}

/// Remove the named links for a verified principal.
///
/// Ids the principal is not linked to are ignored. Reference ids are never
/// validated here, so deleting a link to a retired master entry still works.
pub fn bulk_delete<S: AssociationStore + ?Sized>(
    store: &S,
    principal: &VerifiedPrincipal,
    relation: Relation,
    reference_ids: &[RefId],
) -> ServiceResult<usize> {
    debug_assert_eq!(principal.kind(), relation.principal());
    if reference_ids.is_empty() {
        return Err(ServiceError::validation(
            relation.reference().ids_field(),
            "At least one id is required",
        ));
    }

    let ids = distinct(reference_ids);
    let removed = store.delete_links(relation, principal.id(), &ids)?;
    tracing::debug!(
        relation = %relation,
        principal = principal.id(),
        requested = ids.len(),
        removed,
        "deleted links"
    );
    Ok(removed)
}
