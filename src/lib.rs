//! Dossier - Decision-Maker Enrichment Pipeline
//!
//! Dossier converges organization records from unreliable external
//! sources into golden records: verified decision-maker contacts,
//! domain intelligence, and a per-source completion ledger that makes
//! re-runs cheap and concurrent workers safe.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure business logic and domain models
//! - **Service Layer** (`services`): Claiming, orchestration, merging, resolution
//! - **Infrastructure Layer** (`infrastructure`): SQLite persistence and source adapters
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use dossier::services::EnrichmentPipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Wire repositories and run a batch
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Config, ContactFact, DatabaseConfig, DecisionMaker, DomainIntelligence, EnrichmentState,
    EnrichmentStatus, Layer, LayerFindings, LayerSet, LoggingConfig, OrgStatus, OrgStub,
    Organization, RetryConfig, RunConfig,
};
pub use domain::ports::{
    ContactRepository, DomainIntelRepository, EnrichmentRepository, OrganizationRepository,
    ReviewRepository, SourceError, SourceLayer,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    EnrichmentPipeline, EntityResolver, LayerOrchestrator, MergeEngine, RunSummary, WorkClaimer,
};
