//! Crate-wide error types.
//!
//! Three failure classes exist, matching how they surface to callers:
//!
//! - **Validation**: rejected before any store mutation; the store is never
//!   touched.
//! - **NotFound**: the target row does not exist (or is gone by the time the
//!   operation ran).
//! - **Store**: the backend failed mid-operation; for single-item operations
//!   the lifecycle state is unchanged and no audit entry was written.

use crate::store::StoreError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before any store mutation.
    #[error("{0}")]
    Validation(String),

    /// The requested row does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The record store reported a failure. Retryable from the caller's
    /// point of view; no partial state was committed for single-item calls.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether this error is user-correctable input rejection.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<&str> = errors.errors().keys().copied().collect();
        fields.sort_unstable();
        Error::Validation(format!("invalid fields: {}", fields.join(", ")))
    }
}
