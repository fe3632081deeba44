use crate::domain::models::{EnrichmentState, EnrichmentStatus, Layer, LayerSet};
use crate::domain::ports::errors::DatabaseError;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository port for enrichment state persistence and work claiming
#[async_trait]
pub trait EnrichmentRepository: Send + Sync {
    /// Atomically claim up to `limit` organizations for `worker_id`.
    ///
    /// Eligible rows are `not_started`, plus `in_progress` rows whose
    /// claim is older than `stale_after_secs` (a crashed worker).
    /// Implementations must guarantee two concurrent claimers never
    /// receive the same organization. State rows are created on the
    /// fly for queued organizations that lack one.
    async fn claim_batch(
        &self,
        worker_id: &str,
        limit: usize,
        stale_after_secs: u64,
    ) -> Result<Vec<EnrichmentState>, DatabaseError>;

    /// The rows `claim_batch` would take, without claiming them.
    async fn peek_claimable(
        &self,
        limit: usize,
        stale_after_secs: u64,
    ) -> Result<Vec<EnrichmentState>, DatabaseError>;

    /// Get the state row for one organization
    async fn get(&self, org_id: Uuid) -> Result<Option<EnrichmentState>, DatabaseError>;

    /// Upsert a batch of state rows in one statement.
    ///
    /// `layers_completed` must OR into the stored mask so concurrent
    /// writers can only add completed layers. Returns rows written.
    async fn update_batch(&self, states: &[EnrichmentState]) -> Result<u64, DatabaseError>;

    /// Re-queue organizations missing a layer's completed bit.
    /// Returns the number of rows re-queued.
    async fn requeue_missing_layer(&self, layer: Layer, limit: i64)
        -> Result<u64, DatabaseError>;

    /// Re-queue organizations whose last attempt had failures.
    /// Returns the number of rows re-queued.
    async fn requeue_failed(&self, limit: i64) -> Result<u64, DatabaseError>;

    /// Clear a layer's completed bit and re-queue the affected rows so
    /// the layer runs again. Returns the number of rows touched.
    async fn reset_layer(&self, layer: Layer, limit: i64) -> Result<u64, DatabaseError>;

    /// Clear several layers' bits across all rows without re-queueing
    async fn clear_layers(&self, layers: LayerSet) -> Result<u64, DatabaseError>;

    /// Row counts per enrichment status
    async fn counts_by_status(&self) -> Result<Vec<(EnrichmentStatus, i64)>, DatabaseError>;

    /// Per-layer counts of organizations with the completed bit set
    async fn layer_coverage(&self) -> Result<Vec<(Layer, i64)>, DatabaseError>;
}
