//! Buffered persistence for enrichment results.
//!
//! Results accumulate in memory and land in bulk once the buffer
//! crosses its threshold. Every write is a non-destructive upsert, so
//! replaying a batch after a crash converges on the same rows. Flush
//! order is deliberate: contacts and domain intelligence first, then
//! organization status, then enrichment state. State rows are written
//! last so a completed bit never points at facts that were lost
//! mid-flush; a half-written batch is re-claimed after the stale
//! window and re-run.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    DecisionMaker, DomainIntelligence, EnrichmentState, OrgStatus,
};
use crate::domain::ports::{
    ContactRepository, DomainIntelRepository, EnrichmentRepository, OrganizationRepository,
};

/// Everything one organization's enrichment attempt wants persisted.
#[derive(Debug)]
pub struct OrgOutcome {
    pub org_id: Uuid,
    /// Status the organization moves to after this attempt.
    pub status: OrgStatus,
    /// Finalized state, written last.
    pub state: EnrichmentState,
    /// New or changed decision maker records only.
    pub contacts: Vec<DecisionMaker>,
    /// Domain intelligence, when the organization has a domain.
    pub intel: Option<DomainIntelligence>,
}

/// Cumulative write counters for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlushStats {
    pub orgs: usize,
    pub contacts_written: u64,
    pub intel_written: u64,
    pub states_written: u64,
    pub flushes: u32,
}

/// Buffers [`OrgOutcome`]s and writes them in batches.
pub struct BatchWriter {
    orgs: Arc<dyn OrganizationRepository>,
    contacts: Arc<dyn ContactRepository>,
    intel: Arc<dyn DomainIntelRepository>,
    enrichment: Arc<dyn EnrichmentRepository>,
    threshold: usize,
    dry_run: bool,
    buffer: Vec<OrgOutcome>,
    stats: FlushStats,
}

impl BatchWriter {
    #[must_use]
    pub fn new(
        orgs: Arc<dyn OrganizationRepository>,
        contacts: Arc<dyn ContactRepository>,
        intel: Arc<dyn DomainIntelRepository>,
        enrichment: Arc<dyn EnrichmentRepository>,
        threshold: usize,
        dry_run: bool,
    ) -> Self {
        Self {
            orgs,
            contacts,
            intel,
            enrichment,
            threshold: threshold.max(1),
            dry_run,
            buffer: Vec::new(),
            stats: FlushStats::default(),
        }
    }

    /// Outcomes waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Buffer one outcome, flushing if the threshold is reached.
    pub async fn push(&mut self, outcome: OrgOutcome) -> DomainResult<()> {
        self.buffer.push(outcome);
        if self.buffer.len() >= self.threshold {
            self.flush().await?;
        }
        Ok(())
    }

    /// Write everything buffered so far.
    pub async fn flush(&mut self) -> DomainResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.buffer);
        let batch_len = batch.len();

        let mut contact_rows: Vec<DecisionMaker> = Vec::new();
        let mut intel_rows: Vec<DomainIntelligence> = Vec::new();
        let mut status_updates: Vec<(Uuid, OrgStatus)> = Vec::new();
        let mut states: Vec<EnrichmentState> = Vec::new();
        for outcome in batch {
            contact_rows.extend(outcome.contacts);
            if let Some(intel) = outcome.intel {
                intel_rows.push(intel);
            }
            status_updates.push((outcome.org_id, outcome.status));
            states.push(outcome.state);
        }

        if self.dry_run {
            debug!(
                orgs = batch_len,
                contacts = contact_rows.len(),
                intel = intel_rows.len(),
                "dry run, discarding batch"
            );
            self.stats.orgs += batch_len;
            self.stats.flushes += 1;
            return Ok(());
        }

        let contacts_written = if contact_rows.is_empty() {
            0
        } else {
            self.contacts.upsert_batch(&contact_rows).await?
        };
        let intel_written = if intel_rows.is_empty() {
            0
        } else {
            self.intel.upsert_batch(&intel_rows).await?
        };
        for (org_id, status) in &status_updates {
            self.orgs.update_status(*org_id, *status).await?;
        }
        let states_written = self.enrichment.update_batch(&states).await?;

        self.stats.orgs += batch_len;
        self.stats.contacts_written += contacts_written;
        self.stats.intel_written += intel_written;
        self.stats.states_written += states_written;
        self.stats.flushes += 1;
        info!(
            orgs = batch_len,
            contacts = contacts_written,
            intel = intel_written,
            "flushed enrichment batch"
        );
        Ok(())
    }

    /// Flush the remainder and return the run's write counters.
    pub async fn finish(&mut self) -> DomainResult<FlushStats> {
        self.flush().await?;
        Ok(self.stats)
    }
}
