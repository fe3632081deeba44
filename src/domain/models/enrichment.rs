//! Per-organization enrichment progress.
//!
//! One state row per organization tracks which layers have ever
//! completed (a monotonically growing bitmask) and which failed on
//! the most recent attempt (replaced wholesale each run).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::layer::{Layer, LayerSet};

/// Fine-grained enrichment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    /// Never attempted, or re-queued for another pass.
    NotStarted,
    /// Claimed by a worker; an attempt is underway.
    InProgress,
    /// Finished with at least one decision maker on file.
    Complete,
    /// Finished with no decision makers found.
    NoResults,
}

impl Default for EnrichmentStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl EnrichmentStatus {
    /// Stable string form used in the database and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::NoResults => "no_results",
        }
    }

    /// Parse a status from its string form.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(Self::NotStarted),
            "in_progress" => Some(Self::InProgress),
            "complete" => Some(Self::Complete),
            "no_results" => Some(Self::NoResults),
            _ => None,
        }
    }

    /// Whether the status marks a finished attempt.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::NoResults)
    }

    /// Statuses this one may legally move to.
    #[must_use]
    pub fn valid_transitions(self) -> Vec<Self> {
        match self {
            Self::NotStarted => vec![Self::InProgress],
            // A stale claim may be re-taken by another worker.
            Self::InProgress => {
                vec![Self::InProgress, Self::Complete, Self::NoResults, Self::NotStarted]
            }
            Self::Complete | Self::NoResults => vec![Self::NotStarted],
        }
    }

    /// Whether a transition to `target` is allowed.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        self.valid_transitions().contains(&target)
    }
}

/// The enrichment progress row for one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentState {
    pub org_id: Uuid,
    pub status: EnrichmentStatus,
    /// Every layer that has ever completed for this organization.
    /// Only ever grows.
    pub layers_completed: LayerSet,
    /// Layers that failed on the most recent attempt. Replaced each
    /// run, never accumulated.
    pub layers_failed: LayerSet,
    pub last_attempt: Option<DateTime<Utc>>,
    /// Worker holding the claim while in progress.
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl EnrichmentState {
    #[must_use]
    pub fn new(org_id: Uuid) -> Self {
        Self {
            org_id,
            status: EnrichmentStatus::NotStarted,
            layers_completed: LayerSet::EMPTY,
            layers_failed: LayerSet::EMPTY,
            last_attempt: None,
            claimed_by: None,
            claimed_at: None,
        }
    }

    /// Mark the row claimed by `worker_id`.
    pub fn claim(&mut self, worker_id: &str, now: DateTime<Utc>) {
        self.status = EnrichmentStatus::InProgress;
        self.claimed_by = Some(worker_id.to_string());
        self.claimed_at = Some(now);
    }

    /// Whether an in-progress claim is older than `stale_after`.
    ///
    /// Stale claims are treated as crashed workers and may be
    /// re-claimed. A claim without a timestamp counts as stale.
    #[must_use]
    pub fn is_claim_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        if self.status != EnrichmentStatus::InProgress {
            return false;
        }
        self.claimed_at.is_none_or(|at| now - at > stale_after)
    }

    /// Record the layer outcomes of one attempt.
    ///
    /// Completed layers OR into the mask so re-runs can only add
    /// information; the failed mask is replaced by this attempt's
    /// failures.
    pub fn record_attempt(&mut self, succeeded: LayerSet, failed: LayerSet, now: DateTime<Utc>) {
        self.layers_completed = self.layers_completed.union(succeeded);
        self.layers_failed = failed;
        self.last_attempt = Some(now);
    }

    /// Close out an attempt and release the claim.
    ///
    /// `has_contacts` reflects whether any decision maker is on file
    /// for the organization after merging, not just this attempt's
    /// findings.
    pub fn finalize(&mut self, has_contacts: bool) -> EnrichmentStatus {
        self.status = if has_contacts {
            EnrichmentStatus::Complete
        } else {
            EnrichmentStatus::NoResults
        };
        self.claimed_by = None;
        self.claimed_at = None;
        self.status
    }

    /// Re-queue the row for another enrichment pass.
    pub fn requeue(&mut self) {
        self.status = EnrichmentStatus::NotStarted;
        self.claimed_by = None;
        self.claimed_at = None;
    }

    /// Clear a layer's completed bit so it runs again on the next pass.
    pub fn reset_layer(&mut self, layer: Layer) {
        self.layers_completed.remove(layer);
    }

    /// Whether a layer still needs to run.
    #[must_use]
    pub fn missing(&self, layer: Layer) -> bool {
        !self.layers_completed.contains(layer)
    }
}
