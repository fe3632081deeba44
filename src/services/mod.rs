pub mod batch_writer;
pub mod claimer;
pub mod entity_resolver;
pub mod merge_engine;
pub mod orchestrator;
pub mod pipeline;
pub mod source_guard;

pub use batch_writer::{BatchWriter, FlushStats, OrgOutcome};
pub use claimer::{ClaimedOrg, WorkClaimer};
pub use entity_resolver::{EntityResolver, IngestOutcome, MatchSignal, Resolution};
pub use merge_engine::{ContactMerge, MergeEngine};
pub use orchestrator::{LayerOrchestrator, LayerOutcome, OrgRunReport, RunOptions, SkipReason};
pub use pipeline::{EnrichmentPipeline, LayerTally, PipelineOptions, RunSummary};
pub use source_guard::{CircuitState, SourceGuard, SourceGuardRegistry};
