//! Work claiming for concurrent enrichment runs.
//!
//! Claims move enrichment state rows to `in_progress` under this
//! worker's id before any source is called, so two processes pointed
//! at the same database never enrich the same organization twice.
//! Claims left behind by a crashed worker age out and become
//! claimable again after the stale window.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{EnrichmentState, Organization};
use crate::domain::ports::{EnrichmentRepository, OrganizationRepository};

/// An organization paired with the enrichment state claimed for it.
#[derive(Debug)]
pub struct ClaimedOrg {
    pub org: Organization,
    pub state: EnrichmentState,
}

/// Claims batches of organizations for one worker.
pub struct WorkClaimer {
    orgs: Arc<dyn OrganizationRepository>,
    enrichment: Arc<dyn EnrichmentRepository>,
    worker_id: String,
    stale_after_secs: u64,
}

impl WorkClaimer {
    #[must_use]
    pub fn new(
        orgs: Arc<dyn OrganizationRepository>,
        enrichment: Arc<dyn EnrichmentRepository>,
        worker_id: String,
        stale_after_secs: u64,
    ) -> Self {
        Self { orgs, enrichment, worker_id, stale_after_secs }
    }

    #[must_use]
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Claim up to `limit` organizations for this worker.
    ///
    /// Returns claims that are disjoint from every other worker's.
    /// An empty result means there is no claimable work right now.
    pub async fn claim(&self, limit: usize) -> DomainResult<Vec<ClaimedOrg>> {
        let states = self
            .enrichment
            .claim_batch(&self.worker_id, limit, self.stale_after_secs)
            .await?;
        let claimed = self.pair(states).await?;
        debug!(
            worker = %self.worker_id,
            count = claimed.len(),
            "claimed enrichment batch"
        );
        Ok(claimed)
    }

    /// Read-only view of what a claim would pick up, for dry runs.
    pub async fn peek(&self, limit: usize) -> DomainResult<Vec<ClaimedOrg>> {
        let states = self.enrichment.peek_claimable(limit, self.stale_after_secs).await?;
        self.pair(states).await
    }

    async fn pair(&self, states: Vec<EnrichmentState>) -> DomainResult<Vec<ClaimedOrg>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = states.iter().map(|state| state.org_id).collect();
        let orgs = self.orgs.fetch_many(&ids).await?;
        let mut by_id: HashMap<Uuid, Organization> =
            orgs.into_iter().map(|org| (org.id, org)).collect();

        let mut claimed = Vec::with_capacity(states.len());
        for state in states {
            if let Some(org) = by_id.remove(&state.org_id) {
                claimed.push(ClaimedOrg { org, state });
            } else {
                // State row survived an organization delete somehow.
                warn!(org_id = %state.org_id, "claimed state has no organization row, dropping");
            }
        }
        Ok(claimed)
    }
}
