//! Reference existence validation
//!
//! One batched catalogue lookup per request. Any miss aborts the whole bulk
//! operation; there is no partial application.

use super::ids::{distinct, missing};
use super::relation::{RefId, ReferenceKind};
use super::store::ReferenceCatalog;
use crate::error::{ServiceError, ServiceResult};

/// Requested reference ids split by existence, each side distinct and in
/// request order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub found: Vec<RefId>,
    pub not_found: Vec<RefId>,
}

impl Partition {
    pub fn is_complete(&self) -> bool {
        self.not_found.is_empty()
    }
}

pub fn partition<S: ReferenceCatalog + ?Sized>(
    store: &S,
    kind: ReferenceKind,
    ids: &[RefId],
) -> ServiceResult<Partition> {
    let wanted = distinct(ids);
    if wanted.is_empty() {
        return Ok(Partition::default());
    }

    let existing = store.existing_references(kind, &wanted)?;
    let not_found = missing(&wanted, &existing);
    let found = wanted
        .into_iter()
        .filter(|id| existing.contains(id))
        .collect();

    Ok(Partition { found, not_found })
}

/// Fail with `ReferenceNotFound` unless every id exists
pub fn require_all<S: ReferenceCatalog + ?Sized>(
    store: &S,
    kind: ReferenceKind,
    ids: &[RefId],
) -> ServiceResult<()> {
    let partition = partition(store, kind, ids)?;
    tracing::debug!(
        kind = kind.plural(),
        found = partition.found.len(),
        missing = partition.not_found.len(),
        "validated references"
    );

    if partition.is_complete() {
        Ok(())
    } else {
        Err(ServiceError::ReferenceNotFound {
            kind,
            missing: partition.not_found,
        })
    }
}
