//! Error taxonomy for link reconciliation and record operations
//!
//! Every failure a caller can see falls into one of these classes:
//! - `Validation` - malformed request shape (400)
//! - `PrincipalNotFound` - the owning engineer or career record is missing (404)
//! - `ReferenceNotFound` - one or more linked master-data ids are missing (404)
//! - `RecordsNotFound` - a multi-id record operation named missing ids (404)
//! - `DuplicateConflict` - a unique identifier is already taken (409)
//! - `Storage` / `Serialization` - internal failures (500, never shown verbatim)

use serde::Serialize;

use crate::reconcile::relation::{PrincipalKind, RefId, ReferenceKind};

/// Result alias used across the library
pub type ServiceResult<T> = Result<T, ServiceError>;

/// One field-level problem found while validating a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    /// Dotted path to the offending field (`items[1].acquiredAt`), empty for the whole body
    pub path: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Request body or path failed shape validation
    #[error("Validation failed")]
    Validation(Vec<FieldIssue>),

    /// The principal that owns the links does not exist
    #[error("{} not found", .kind.label())]
    PrincipalNotFound { kind: PrincipalKind, id: String },

    /// Some referenced master-data entities do not exist
    #[error("Some {} not found", .kind.plural())]
    ReferenceNotFound {
        kind: ReferenceKind,
        missing: Vec<RefId>,
    },

    /// Some records named by a multi-id operation do not exist
    #[error("Some {what} not found")]
    RecordsNotFound {
        what: &'static str,
        missing: Vec<String>,
    },

    /// A unique identifier is already used by another record
    #[error("{0}")]
    DuplicateConflict(String),

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    /// Single-issue validation failure
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldIssue::new(path, message)])
    }

    /// HTTP status code for this failure class
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::PrincipalNotFound { .. }
            | Self::ReferenceNotFound { .. }
            | Self::RecordsNotFound { .. } => 404,
            Self::DuplicateConflict(_) => 409,
            Self::Storage(_) | Self::Serialization(_) => 500,
        }
    }

    /// Internal failures are logged in full but never exposed to callers
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Serialization(_))
    }
}
