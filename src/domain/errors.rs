//! Domain errors for the dossier enrichment system.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the dossier system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Organization not found: {0}")]
    OrganizationNotFound(Uuid),

    #[error("Contact not found: {0}")]
    ContactNotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Unknown enrichment layer: {0}")]
    UnknownLayer(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Enrichment run failed: {0}")]
    RunFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<crate::domain::ports::DatabaseError> for DomainError {
    fn from(err: crate::domain::ports::DatabaseError) -> Self {
        match err {
            crate::domain::ports::DatabaseError::OrganizationNotFound(id) => {
                DomainError::OrganizationNotFound(id)
            }
            other => DomainError::DatabaseError(other.to_string()),
        }
    }
}
