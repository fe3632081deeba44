//! Per-organization layer orchestration.
//!
//! Phase one fans every runnable layer out concurrently, each call
//! wrapped in retry-with-backoff, a wall-clock budget, and the
//! layer's source guard. Phase two (mailbox verification) runs after
//! phase one settles, and only when there is at least one contact to
//! verify. One slow or failing source never blocks the others; it
//! just records a failed outcome.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::domain::models::config::RetryConfig;
use crate::domain::models::{EnrichmentState, Layer, LayerFindings, LayerSet, Organization};
use crate::domain::ports::{SourceError, SourceErrorKind, SourceLayer};
use crate::services::source_guard::{SourceGuard, SourceGuardRegistry};

/// Per-run options from the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Re-run layers whose completed bit is already set.
    pub force_refresh: bool,
    /// Restrict the run to a single layer.
    pub only_layer: Option<Layer>,
}

impl RunOptions {
    fn selects(self, layer: Layer) -> bool {
        self.only_layer.is_none_or(|only| only == layer)
    }
}

/// Why a layer did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Completed bit already set and no refresh requested.
    AlreadyCompleted,
    /// Layer disabled in config, or no adapter registered for it.
    SourceDisabled,
    /// Phase two with no contact on file and none found in phase one.
    NoContactCandidates,
}

impl SkipReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyCompleted => "already_completed",
            Self::SourceDisabled => "source_disabled",
            Self::NoContactCandidates => "no_contact_candidates",
        }
    }
}

/// Outcome of one layer within one organization's run.
#[derive(Debug, Clone)]
pub enum LayerOutcome {
    Succeeded,
    Failed { kind: SourceErrorKind, message: String },
    Skipped { reason: SkipReason },
}

impl LayerOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Everything one enrichment attempt produced for one organization.
#[derive(Debug)]
pub struct OrgRunReport {
    pub org_id: uuid::Uuid,
    /// Per-layer outcome for every layer that was part of the run.
    pub outcomes: BTreeMap<Layer, LayerOutcome>,
    /// Accumulated findings across all succeeded layers.
    pub findings: LayerFindings,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl OrgRunReport {
    /// Layers that completed in this attempt.
    #[must_use]
    pub fn succeeded_layers(&self) -> LayerSet {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_success())
            .map(|(layer, _)| *layer)
            .collect()
    }

    /// Layers that failed in this attempt.
    #[must_use]
    pub fn failed_layers(&self) -> LayerSet {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_failure())
            .map(|(layer, _)| *layer)
            .collect()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed_layers().is_empty()
    }
}

enum Plan {
    Run(Arc<dyn SourceLayer>),
    Skip(SkipReason),
}

/// Runs the layer fan-out for one organization at a time.
pub struct LayerOrchestrator {
    adapters: HashMap<Layer, Arc<dyn SourceLayer>>,
    guards: Arc<SourceGuardRegistry>,
    disabled: HashSet<Layer>,
    layer_budget: Duration,
    retry: RetryConfig,
}

impl LayerOrchestrator {
    #[must_use]
    pub fn new(
        adapters: Vec<Arc<dyn SourceLayer>>,
        guards: Arc<SourceGuardRegistry>,
        layer_timeout_secs: u64,
        retry: RetryConfig,
    ) -> Self {
        let mut table: HashMap<Layer, Arc<dyn SourceLayer>> = HashMap::new();
        for adapter in adapters {
            let layer = adapter.layer();
            if table.insert(layer, adapter).is_some() {
                warn!(layer = %layer, "duplicate adapter registered, last one wins");
            }
        }
        Self {
            adapters: table,
            guards,
            disabled: HashSet::new(),
            layer_budget: Duration::from_secs(layer_timeout_secs),
            retry,
        }
    }

    /// Disable layers by id. Unknown names are ignored by the caller.
    #[must_use]
    pub fn with_disabled(mut self, disabled: HashSet<Layer>) -> Self {
        self.disabled = disabled;
        self
    }

    /// Run one enrichment attempt for one organization.
    ///
    /// `known_contacts` is the number of decision makers already on
    /// file, used to gate phase two.
    pub async fn enrich(
        &self,
        org: &Organization,
        state: &EnrichmentState,
        known_contacts: usize,
        options: RunOptions,
    ) -> OrgRunReport {
        let started_at = Utc::now();
        let timer = Instant::now();
        let mut outcomes: BTreeMap<Layer, LayerOutcome> = BTreeMap::new();
        let mut findings = LayerFindings::default();

        let mut handles: Vec<(Layer, JoinHandle<Result<LayerFindings, SourceError>>)> =
            Vec::new();
        for layer in Layer::phase_one() {
            if !options.selects(layer) {
                continue;
            }
            match self.plan(layer, state, options) {
                Plan::Skip(reason) => {
                    outcomes.insert(layer, LayerOutcome::Skipped { reason });
                }
                Plan::Run(adapter) => {
                    handles.push((
                        layer,
                        tokio::spawn(run_layer(
                            layer,
                            adapter,
                            self.guards.guard(layer),
                            org.clone(),
                            self.layer_budget,
                            self.retry.clone(),
                        )),
                    ));
                }
            }
        }
        for (layer, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => Err(SourceError::transient(format!("layer task panicked: {err}"))),
            };
            record_outcome(&mut outcomes, &mut findings, org, layer, result);
        }

        let verify = Layer::EmailVerify;
        if options.selects(verify) {
            match self.plan(verify, state, options) {
                Plan::Skip(reason) => {
                    outcomes.insert(verify, LayerOutcome::Skipped { reason });
                }
                Plan::Run(adapter) => {
                    if known_contacts == 0 && findings.contacts.is_empty() {
                        debug!(org_id = %org.id, "skipping mailbox verification, nothing to verify");
                        outcomes.insert(
                            verify,
                            LayerOutcome::Skipped { reason: SkipReason::NoContactCandidates },
                        );
                    } else {
                        let result = run_layer(
                            verify,
                            adapter,
                            self.guards.guard(verify),
                            org.clone(),
                            self.layer_budget,
                            self.retry.clone(),
                        )
                        .await;
                        record_outcome(&mut outcomes, &mut findings, org, verify, result);
                    }
                }
            }
        }

        OrgRunReport {
            org_id: org.id,
            outcomes,
            findings,
            started_at,
            duration_ms: timer.elapsed().as_millis() as u64,
        }
    }

    fn plan(&self, layer: Layer, state: &EnrichmentState, options: RunOptions) -> Plan {
        if self.disabled.contains(&layer) {
            return Plan::Skip(SkipReason::SourceDisabled);
        }
        let Some(adapter) = self.adapters.get(&layer) else {
            return Plan::Skip(SkipReason::SourceDisabled);
        };
        if !options.force_refresh && state.layers_completed.contains(layer) {
            return Plan::Skip(SkipReason::AlreadyCompleted);
        }
        Plan::Run(Arc::clone(adapter))
    }
}

fn record_outcome(
    outcomes: &mut BTreeMap<Layer, LayerOutcome>,
    findings: &mut LayerFindings,
    org: &Organization,
    layer: Layer,
    result: Result<LayerFindings, SourceError>,
) {
    match result {
        Ok(layer_findings) => {
            debug!(
                org_id = %org.id,
                layer = %layer,
                contacts = layer_findings.contacts.len(),
                stubs = layer_findings.org_stubs.len(),
                "layer succeeded"
            );
            findings.absorb(layer_findings);
            outcomes.insert(layer, LayerOutcome::Succeeded);
        }
        Err(err) => {
            warn!(org_id = %org.id, layer = %layer, error = %err, "layer failed");
            outcomes.insert(
                layer,
                LayerOutcome::Failed { kind: err.kind(), message: err.to_string() },
            );
        }
    }
}

/// One guarded, retried, budgeted layer call.
async fn run_layer(
    layer: Layer,
    adapter: Arc<dyn SourceLayer>,
    guard: Arc<SourceGuard>,
    org: Organization,
    budget: Duration,
    retry: RetryConfig,
) -> Result<LayerFindings, SourceError> {
    let policy = retry_policy(&retry, budget);
    let operation = || {
        let adapter = Arc::clone(&adapter);
        let guard = Arc::clone(&guard);
        let org = org.clone();
        async move {
            guard
                .run(|| async { adapter.run(&org).await })
                .await
                .map_err(|err| match err {
                    SourceError::RateLimited { retry_after_secs: Some(secs) } => {
                        backoff::Error::retry_after(
                            SourceError::RateLimited { retry_after_secs: Some(secs) },
                            Duration::from_secs(secs),
                        )
                    }
                    err if err.is_retryable() => backoff::Error::transient(err),
                    err => backoff::Error::permanent(err),
                })
        }
    };

    match timeout(budget, backoff::future::retry(policy, operation)).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::transient(format!(
            "{layer} timed out after {}s",
            budget.as_secs()
        ))),
    }
}

fn retry_policy(retry: &RetryConfig, budget: Duration) -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(retry.initial_backoff_ms))
        .with_max_interval(Duration::from_millis(retry.max_backoff_ms))
        .with_max_elapsed_time(Some(Duration::from_secs(retry.max_elapsed_secs).min(budget)))
        .build()
}
