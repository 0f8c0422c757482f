//! Principal existence gate
//!
//! Every mutating or detail-reading link operation passes through `verify`
//! first. Strategies only accept a `VerifiedPrincipal`, which can only be built
//! here, so a request naming a missing principal never reaches reference
//! validation or the link store.

use super::relation::PrincipalKind;
use super::store::PrincipalDirectory;
use crate::error::{ServiceError, ServiceResult};

/// Proof that a principal existed inside the current transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPrincipal {
    kind: PrincipalKind,
    id: String,
}

impl VerifiedPrincipal {
    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

pub fn verify<S: PrincipalDirectory + ?Sized>(
    store: &S,
    kind: PrincipalKind,
    id: &str,
) -> ServiceResult<VerifiedPrincipal> {
    if store.principal_exists(kind, id)? {
        Ok(VerifiedPrincipal {
            kind,
            id: id.to_string(),
        })
    } else {
        tracing::debug!(principal = %kind, id, "principal gate rejected");
        Err(ServiceError::PrincipalNotFound {
            kind,
            id: id.to_string(),
        })
    }
}
