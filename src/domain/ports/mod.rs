//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that infrastructure adapters implement:
//! - Repositories: `SQLite` persistence for each aggregate
//! - `SourceLayer`: one external enrichment source
//!
//! These contracts keep the domain independent of any specific
//! driver or vendor.

pub mod contact_repository;
pub mod domain_intel_repository;
pub mod enrichment_repository;
pub mod errors;
pub mod organization_repository;
pub mod review_repository;
pub mod source_layer;

pub use contact_repository::ContactRepository;
pub use domain_intel_repository::DomainIntelRepository;
pub use enrichment_repository::EnrichmentRepository;
pub use errors::DatabaseError;
pub use organization_repository::OrganizationRepository;
pub use review_repository::ReviewRepository;
pub use source_layer::{SourceError, SourceErrorKind, SourceLayer};
