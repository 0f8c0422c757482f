//! Bulk result aggregation and the uniform response envelope
//!
//! Strategies report one `ItemResult` per processed tuple into an
//! `Aggregator`. The finished `BulkOutcome` is then projected into `LinkView`s
//! (link joined with its reference entity) and wrapped in an `Envelope`, the
//! single JSON shape every endpoint answers with.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use super::gate::VerifiedPrincipal;
use super::ids::{distinct, IdentifierSet};
use super::relation::{IdShape, RefId, Relation};
use super::strategy::Strategy;
use crate::error::{FieldIssue, ServiceError, ServiceResult};
use crate::records::masters::ReferenceEntity;

/// What happened to one link
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkChange {
    Created,
    Updated,
    /// The link already carried exactly the requested attribute
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    pub reference_id: RefId,
    pub attribute: Option<String>,
    pub change: LinkChange,
}

/// Counts per change class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    pub relation: Relation,
    pub strategy: Strategy,
    pub principal_id: String,
    pub items: Vec<ItemResult>,
    /// Links dropped by a replace because the new set omitted them
    pub removed: usize,
}

impl BulkOutcome {
    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn tally(&self) -> Tally {
        self.items.iter().fold(Tally::default(), |mut tally, item| {
            match item.change {
                LinkChange::Created => tally.created += 1,
                LinkChange::Updated => tally.updated += 1,
                LinkChange::Unchanged => tally.unchanged += 1,
            }
            tally
        })
    }

    pub fn message(&self) -> String {
        match self.strategy {
            Strategy::Merge => format!("{} {} processed", self.count(), self.relation),
            Strategy::Replace => format!("{} {} set", self.count(), self.relation),
        }
    }
}

/// Collects per-item results while a strategy runs
#[derive(Debug)]
pub struct Aggregator {
    relation: Relation,
    strategy: Strategy,
    principal_id: String,
    items: Vec<ItemResult>,
    removed: usize,
}

impl Aggregator {
    pub fn new(relation: Relation, strategy: Strategy, principal: &VerifiedPrincipal) -> Self {
        Self {
            relation,
            strategy,
            principal_id: principal.id().to_string(),
            items: Vec::new(),
            removed: 0,
        }
    }

    pub fn record(&mut self, reference_id: RefId, attribute: Option<String>, change: LinkChange) {
        self.items.push(ItemResult {
            reference_id,
            attribute,
            change,
        });
    }

    pub fn record_removed(&mut self, count: usize) {
        self.removed += count;
    }

    pub fn finish(self) -> BulkOutcome {
        BulkOutcome {
            relation: self.relation,
            strategy: self.strategy,
            principal_id: self.principal_id,
            items: self.items,
            removed: self.removed,
        }
    }
}

/// One link joined with its reference entity, as returned to callers
#[derive(Debug, Clone, PartialEq)]
pub struct LinkView {
    pub relation: Relation,
    pub principal_id: String,
    pub reference_id: RefId,
    pub attribute: Option<String>,
    pub entity: Option<ReferenceEntity>,
    pub outcome: Option<LinkChange>,
}

impl LinkView {
    pub fn new(
        relation: Relation,
        principal_id: &str,
        reference_id: RefId,
        attribute: Option<String>,
    ) -> Self {
        Self {
            relation,
            principal_id: principal_id.to_string(),
            reference_id,
            attribute,
            entity: None,
            outcome: None,
        }
    }

    pub fn from_item(relation: Relation, principal_id: &str, item: &ItemResult) -> Self {
        Self {
            outcome: Some(item.change),
            ..Self::new(relation, principal_id, item.reference_id.clone(), item.attribute.clone())
        }
    }
}

impl Serialize for LinkView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(self.relation.principal().id_field(), &self.principal_id)?;
        map.serialize_entry(self.relation.reference().id_field(), &self.reference_id)?;
        if let Some(attribute) = self.relation.attribute() {
            map.serialize_entry(attribute.field, &self.attribute)?;
        }
        map.serialize_entry(self.relation.reference().noun(), &self.entity)?;
        if let Some(outcome) = self.outcome {
            map.serialize_entry("outcome", &outcome)?;
        }
        map.end()
    }
}

/// Order in which composed views are returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOrder {
    /// Keep the order the views were given in (mutation responses)
    Request,
    /// Reorder by the catalogue order of `entities` (reads)
    Catalog,
}

/// Attach reference entities to views
pub fn compose(
    mut views: Vec<LinkView>,
    entities: Vec<ReferenceEntity>,
    order: ViewOrder,
) -> Vec<LinkView> {
    let rank: HashMap<RefId, usize> = entities
        .iter()
        .enumerate()
        .map(|(i, entity)| (entity.id(), i))
        .collect();
    let by_id: HashMap<RefId, ReferenceEntity> = entities
        .into_iter()
        .map(|entity| (entity.id(), entity))
        .collect();

    for view in &mut views {
        view.entity = by_id.get(&view.reference_id).cloned();
    }

    if order == ViewOrder::Catalog {
        views.sort_by_key(|view| rank.get(&view.reference_id).copied().unwrap_or(usize::MAX));
    }
    views
}

/// Uniform response body: `{success, data, count, message, error, notFoundIds, ...}`
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_found_ids: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldIssue>>,
    /// Relation-specific keys such as `notFoundSkills`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    pub fn ok(data: impl Serialize) -> ServiceResult<Self> {
        Ok(Self {
            success: true,
            data: Some(serde_json::to_value(data)?),
            ..Self::default()
        })
    }

    /// Successful list response with its length
    pub fn list<T: Serialize>(data: &[T]) -> ServiceResult<Self> {
        Ok(Self {
            count: Some(data.len()),
            ..Self::ok(data)?
        })
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Response for a finished merge or replace
    pub fn bulk(outcome: &BulkOutcome, views: &[LinkView]) -> ServiceResult<Self> {
        Ok(Self {
            count: Some(outcome.count()),
            ..Self::ok(views)?.with_message(outcome.message())
        })
    }

    pub fn deleted(count: usize, message: impl Into<String>) -> Self {
        Self {
            success: true,
            deleted_count: Some(count),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Status code and body for a failed operation.
    ///
    /// Internal failures are reduced to a generic message; callers log the
    /// full error before calling this.
    pub fn from_error(err: &ServiceError) -> (u16, Self) {
        let mut envelope = if err.is_internal() {
            Self::failure("Internal server error")
        } else {
            Self::failure(err.to_string())
        };

        match err {
            ServiceError::Validation(issues) => {
                envelope.details = Some(issues.clone());
            }
            ServiceError::PrincipalNotFound { id, .. } => {
                envelope.not_found_ids = Some(vec![Value::String(id.clone())]);
            }
            ServiceError::ReferenceNotFound { kind, missing } => {
                let ids: Vec<Value> = missing.iter().map(RefId::to_json).collect();
                envelope
                    .extra
                    .insert(kind.not_found_field().to_string(), Value::Array(ids.clone()));
                envelope.not_found_ids = Some(ids);
            }
            ServiceError::RecordsNotFound { missing, .. } => {
                envelope.not_found_ids =
                    Some(missing.iter().cloned().map(Value::String).collect());
            }
            ServiceError::DuplicateConflict(_)
            | ServiceError::Storage(_)
            | ServiceError::Serialization(_) => {}
        }

        (err.status(), envelope)
    }

    /// Response for a multi-id read.
    ///
    /// One requested id answers with the bare object (or 404). Several ids
    /// answer with an array of what was found; any miss turns the response into
    /// a 404 that still carries the partial data plus `notFoundIds`.
    ///
    /// Requested tokens are read as ids of `shape` before matching, so `02`
    /// finds the record keyed `2`; misses are reported as the caller wrote them.
    pub fn lookup<T, F>(
        ids: &IdentifierSet,
        found: Vec<T>,
        key_of: F,
        shape: IdShape,
        label: &str,
        plural: &str,
    ) -> ServiceResult<(u16, Self)>
    where
        T: Serialize,
        F: Fn(&T) -> String,
    {
        let canonical = |token: &str| RefId::parse(shape, token).to_string();

        if let Some(only) = ids.single() {
            let wanted = canonical(only);
            return match found.into_iter().find(|item| key_of(item) == wanted) {
                Some(item) => Ok((200, Self::ok(item)?)),
                None => Ok((
                    404,
                    Self {
                        not_found_ids: Some(vec![Value::String(only.to_string())]),
                        ..Self::failure(format!("{label} not found"))
                    },
                )),
            };
        }

        let keys: HashSet<String> = found.iter().map(&key_of).collect();
        let not_found: Vec<String> = distinct(ids.as_slice())
            .into_iter()
            .filter(|token| !keys.contains(&canonical(token)))
            .collect();
        let mut envelope = Self::list(&found)?;

        if not_found.is_empty() {
            return Ok((200, envelope));
        }

        envelope.success = false;
        envelope.error = Some(format!("Some {plural} not found"));
        envelope.not_found_ids = Some(not_found.into_iter().map(Value::String).collect());
        Ok((404, envelope))
    }
}
