pub mod config;
pub mod contact;
pub mod domain_intel;
pub mod enrichment;
pub mod findings;
pub mod layer;
pub mod organization;
pub mod review;

pub use config::{
    Config, DatabaseConfig, GuardConfig, LoggingConfig, ResolverConfig, RetryConfig, RunConfig,
    SourceGuardConfig, SourcesConfig,
};
pub use contact::{ContactKey, DecisionMaker};
pub use domain_intel::DomainIntelligence;
pub use enrichment::{EnrichmentState, EnrichmentStatus};
pub use findings::{ContactFact, DomainFact, LayerFindings, OrgStub};
pub use layer::{Layer, LayerSet};
pub use organization::{OrgStatus, Organization};
pub use review::ReviewFlag;
