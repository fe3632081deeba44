//! Domain layer for the dossier enrichment system
//!
//! This module contains core business logic and domain models.

pub mod errors;
pub mod models;
pub mod normalize;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{DomainError, DomainResult};
