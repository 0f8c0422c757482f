//! Identifier-set resolution for multi-id path segments
//!
//! `/skills/a` names one id, `/skills/a,b,c` names several. The catch-all part of
//! the path is re-joined with `/` first, so an id may itself contain a slash when
//! no comma is present.

use std::collections::HashSet;
use std::hash::Hash;

use crate::error::{FieldIssue, ServiceError, ServiceResult};

/// Ordered identifiers parsed from a path, duplicates kept in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierSet {
    ids: Vec<String>,
}

impl IdentifierSet {
    /// Resolve the catch-all path segments into identifiers.
    ///
    /// Any empty identifier (after trimming) fails validation; nothing is
    /// de-duplicated here.
    pub fn parse<S: AsRef<str>>(segments: &[S]) -> ServiceResult<Self> {
        let joined = segments
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("/");

        let ids: Vec<String> = if joined.contains(',') {
            joined.split(',').map(|id| id.trim().to_string()).collect()
        } else {
            vec![joined.trim().to_string()]
        };

        let issues: Vec<FieldIssue> = ids
            .iter()
            .enumerate()
            .filter(|(_, id)| id.is_empty())
            .map(|(i, _)| FieldIssue::new(format!("ids[{i}]"), "Identifier must not be empty"))
            .collect();

        if !issues.is_empty() {
            return Err(ServiceError::Validation(issues));
        }

        Ok(Self { ids })
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// True when the caller asked for exactly one id; such responses unwrap to
    /// a bare object instead of an array
    pub fn is_single(&self) -> bool {
        self.ids.len() == 1
    }

    /// The one id of a single-id request
    pub fn single(&self) -> Option<&str> {
        match self.ids.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }
}

/// Distinct values in first-seen order
pub fn distinct<T: Clone + Eq + Hash>(values: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(values.len());
    values
        .iter()
        .filter(|value| seen.insert((*value).clone()))
        .cloned()
        .collect()
}

/// Requested values absent from `found`, distinct and in request order
pub fn missing<T: Clone + Eq + Hash>(requested: &[T], found: &HashSet<T>) -> Vec<T> {
    distinct(requested)
        .into_iter()
        .filter(|value| !found.contains(value))
        .collect()
}
