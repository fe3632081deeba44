//! The batch enrichment run.
//!
//! A run is a loop: claim a batch, enrich every claimed organization
//! with bounded concurrency, fold findings into golden records, ingest
//! discovered stubs through entity resolution, and hand the results to
//! the batch writer. The loop ends when the limit is hit or no
//! claimable work remains. Dry runs peek instead of claim, process a
//! single batch, and discard every write.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::config::RunConfig;
use crate::domain::models::{
    DecisionMaker, DomainIntelligence, EnrichmentStatus, Layer, OrgStatus, OrgStub,
};
use crate::domain::ports::{
    ContactRepository, DomainIntelRepository, EnrichmentRepository, OrganizationRepository,
};
use crate::services::batch_writer::{BatchWriter, OrgOutcome};
use crate::services::claimer::{ClaimedOrg, WorkClaimer};
use crate::services::entity_resolver::{EntityResolver, IngestOutcome, Resolution};
use crate::services::merge_engine::MergeEngine;
use crate::services::orchestrator::{LayerOrchestrator, LayerOutcome, RunOptions};

/// What one run should do.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub run: RunOptions,
    /// Stop after this many organizations.
    pub limit: Option<usize>,
    /// Peek instead of claim, and write nothing.
    pub dry_run: bool,
}

/// Per-layer outcome counts across a run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LayerTally {
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Everything a finished run can report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub orgs_processed: usize,
    pub orgs_complete: usize,
    pub orgs_no_results: usize,
    pub contacts_written: u64,
    pub intel_written: u64,
    pub states_written: u64,
    pub stubs_found: usize,
    pub stubs_merged: usize,
    pub stubs_inserted: usize,
    pub stubs_flagged: usize,
    pub layers: BTreeMap<Layer, LayerTally>,
    pub layer_failures: u64,
    pub duration_ms: u64,
}

impl RunSummary {
    /// True when every attempted layer call succeeded or was skipped.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.layer_failures == 0
    }
}

struct ProcessedOrg {
    outcome: OrgOutcome,
    stubs: Vec<OrgStub>,
    outcomes: BTreeMap<Layer, LayerOutcome>,
    final_status: EnrichmentStatus,
}

/// Drives enrichment runs end to end.
pub struct EnrichmentPipeline {
    claimer: WorkClaimer,
    orchestrator: LayerOrchestrator,
    merge: MergeEngine,
    resolver: EntityResolver,
    orgs: Arc<dyn OrganizationRepository>,
    contacts: Arc<dyn ContactRepository>,
    intel: Arc<dyn DomainIntelRepository>,
    enrichment: Arc<dyn EnrichmentRepository>,
    config: RunConfig,
}

impl EnrichmentPipeline {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        claimer: WorkClaimer,
        orchestrator: LayerOrchestrator,
        resolver: EntityResolver,
        orgs: Arc<dyn OrganizationRepository>,
        contacts: Arc<dyn ContactRepository>,
        intel: Arc<dyn DomainIntelRepository>,
        enrichment: Arc<dyn EnrichmentRepository>,
        config: RunConfig,
    ) -> Self {
        Self {
            claimer,
            orchestrator,
            merge: MergeEngine::new(),
            resolver,
            orgs,
            contacts,
            intel,
            enrichment,
            config,
        }
    }

    /// Run until the queue is empty or the limit is reached.
    pub async fn run(&self, options: PipelineOptions) -> DomainResult<RunSummary> {
        let timer = Instant::now();
        let mut writer = BatchWriter::new(
            Arc::clone(&self.orgs),
            Arc::clone(&self.contacts),
            Arc::clone(&self.intel),
            Arc::clone(&self.enrichment),
            self.config.buffer_threshold,
            options.dry_run,
        );
        let mut summary = RunSummary { dry_run: options.dry_run, ..RunSummary::default() };
        let mut remaining = options.limit;
        let mut batch_no = 0u32;

        loop {
            let batch_limit = match remaining {
                Some(0) => break,
                Some(n) => n.min(self.config.batch_size),
                None => self.config.batch_size,
            };
            let claimed = if options.dry_run {
                self.claimer.peek(batch_limit).await?
            } else {
                self.claimer.claim(batch_limit).await?
            };
            if claimed.is_empty() {
                break;
            }
            batch_no += 1;
            if let Some(n) = remaining.as_mut() {
                *n = n.saturating_sub(claimed.len());
            }
            info!(batch = batch_no, orgs = claimed.len(), "processing claimed batch");

            let mut by_org = self.prefetch_contacts(&claimed).await?;
            let mut in_flight = stream::iter(claimed.into_iter().map(|claimed_org| {
                let existing = by_org.remove(&claimed_org.org.id).unwrap_or_default();
                self.process_org(claimed_org, existing, options.run)
            }))
            .buffer_unordered(self.config.max_in_flight.max(1));

            while let Some(processed) = in_flight.next().await {
                self.settle(processed, &mut writer, &mut summary, options.dry_run).await?;
            }

            // A peek would return the same rows forever.
            if options.dry_run {
                break;
            }
        }

        let stats = writer.finish().await?;
        summary.contacts_written = stats.contacts_written;
        summary.intel_written = stats.intel_written;
        summary.states_written = stats.states_written;
        summary.duration_ms = timer.elapsed().as_millis() as u64;
        info!(
            orgs = summary.orgs_processed,
            complete = summary.orgs_complete,
            no_results = summary.orgs_no_results,
            contacts = summary.contacts_written,
            failures = summary.layer_failures,
            dry_run = summary.dry_run,
            "enrichment run finished"
        );
        Ok(summary)
    }

    async fn prefetch_contacts(
        &self,
        claimed: &[ClaimedOrg],
    ) -> DomainResult<HashMap<Uuid, Vec<DecisionMaker>>> {
        let org_ids: Vec<Uuid> = claimed.iter().map(|c| c.org.id).collect();
        let existing = self.contacts.fetch_for_orgs(&org_ids).await?;
        let mut by_org: HashMap<Uuid, Vec<DecisionMaker>> = HashMap::new();
        for contact in existing {
            by_org.entry(contact.org_id).or_default().push(contact);
        }
        Ok(by_org)
    }

    async fn process_org(
        &self,
        claimed: ClaimedOrg,
        existing: Vec<DecisionMaker>,
        options: RunOptions,
    ) -> ProcessedOrg {
        let ClaimedOrg { org, mut state } = claimed;
        let known = existing.len();
        let mut report = self.orchestrator.enrich(&org, &state, known, options).await;

        let merge = self.merge.fold_contacts(org.id, existing, &report.findings.contacts);
        state.record_attempt(report.succeeded_layers(), report.failed_layers(), Utc::now());
        let final_status = state.finalize(merge.total > 0);

        let intel = org.domain.as_ref().and_then(|domain| {
            report
                .findings
                .domain
                .as_ref()
                .filter(|fact| !fact.is_empty())
                .map(|fact| DomainIntelligence::from_fact(domain.clone(), fact, report.started_at))
        });
        let stubs = std::mem::take(&mut report.findings.org_stubs);
        debug!(
            org_id = %org.id,
            status = final_status.as_str(),
            upserts = merge.upserts.len(),
            stubs = stubs.len(),
            duration_ms = report.duration_ms,
            "organization processed"
        );

        ProcessedOrg {
            outcome: OrgOutcome {
                org_id: org.id,
                status: OrgStatus::Enriched,
                state,
                contacts: merge.upserts,
                intel,
            },
            stubs,
            outcomes: report.outcomes,
            final_status,
        }
    }

    async fn settle(
        &self,
        processed: ProcessedOrg,
        writer: &mut BatchWriter,
        summary: &mut RunSummary,
        dry_run: bool,
    ) -> DomainResult<()> {
        summary.orgs_processed += 1;
        match processed.final_status {
            EnrichmentStatus::Complete => summary.orgs_complete += 1,
            EnrichmentStatus::NoResults => summary.orgs_no_results += 1,
            EnrichmentStatus::NotStarted | EnrichmentStatus::InProgress => {}
        }
        for (layer, outcome) in &processed.outcomes {
            let tally = summary.layers.entry(*layer).or_default();
            match outcome {
                LayerOutcome::Succeeded => tally.succeeded += 1,
                LayerOutcome::Failed { .. } => {
                    tally.failed += 1;
                    summary.layer_failures += 1;
                }
                LayerOutcome::Skipped { .. } => tally.skipped += 1,
            }
        }

        summary.stubs_found += processed.stubs.len();
        for stub in processed.stubs {
            self.ingest_stub(stub, summary, dry_run).await?;
        }
        writer.push(processed.outcome).await
    }

    async fn ingest_stub(
        &self,
        stub: OrgStub,
        summary: &mut RunSummary,
        dry_run: bool,
    ) -> DomainResult<()> {
        if dry_run {
            match self.resolver.resolve(&stub).await? {
                Resolution::Merge { .. } => summary.stubs_merged += 1,
                Resolution::Review { .. } => {
                    summary.stubs_inserted += 1;
                    summary.stubs_flagged += 1;
                }
                Resolution::Distinct => summary.stubs_inserted += 1,
            }
            return Ok(());
        }
        match self.resolver.ingest(&stub).await {
            Ok(IngestOutcome::MergedInto(_)) => summary.stubs_merged += 1,
            Ok(IngestOutcome::InsertedWithFlag { .. }) => {
                summary.stubs_inserted += 1;
                summary.stubs_flagged += 1;
            }
            Ok(IngestOutcome::Inserted(_)) => summary.stubs_inserted += 1,
            Err(DomainError::ValidationFailed(reason)) => {
                debug!(reason = %reason, "dropping unusable stub");
            }
            Err(err) => {
                warn!(error = %err, "stub ingestion failed");
                return Err(err);
            }
        }
        Ok(())
    }
}
