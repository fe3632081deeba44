//! SQLite implementation of the enrichment state repository.
//!
//! Claiming uses guarded updates so concurrent workers never hold the
//! same organization: each candidate row is flipped to `in_progress`
//! with a WHERE clause that re-checks claimability, and only rows where
//! `rows_affected() == 1` are returned to the caller.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{QueryBuilder, SqlitePool};
use uuid::Uuid;

use super::utils::parse_datetime;
use crate::domain::models::{EnrichmentState, EnrichmentStatus, Layer, LayerSet};
use crate::domain::ports::{DatabaseError, EnrichmentRepository};

const STATE_COLUMNS: &str =
    "org_id, status, layers_completed, layers_failed, last_attempt, claimed_by, claimed_at";

/// `SQLite` implementation of `EnrichmentRepository`
pub struct EnrichmentRepositoryImpl {
    pool: SqlitePool,
}

impl EnrichmentRepositoryImpl {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn stale_cutoff(stale_after_secs: u64) -> String {
    let secs = i64::try_from(stale_after_secs).unwrap_or(i64::MAX);
    (Utc::now() - Duration::seconds(secs)).to_rfc3339()
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl EnrichmentRepository for EnrichmentRepositoryImpl {
    async fn claim_batch(
        &self,
        worker_id: &str,
        limit: usize,
        stale_after_secs: u64,
    ) -> Result<Vec<EnrichmentState>, DatabaseError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let cutoff = stale_cutoff(stale_after_secs);
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        // Lazily materialize state rows for newly queued organizations.
        sqlx::query(
            "INSERT OR IGNORE INTO enrichment_state (org_id, status, layers_completed, layers_failed) \
             SELECT id, 'not_started', 0, 0 FROM organizations WHERE status = 'pending_enrichment'",
        )
        .execute(&mut *tx)
        .await?;

        // Never-attempted rows first, then oldest attempts.
        let candidates: Vec<(String,)> = sqlx::query_as(
            "SELECT org_id FROM enrichment_state \
             WHERE status = 'not_started' \
                OR (status = 'in_progress' AND (claimed_at IS NULL OR claimed_at < ?)) \
             ORDER BY last_attempt IS NOT NULL, last_attempt ASC \
             LIMIT ?",
        )
        .bind(&cutoff)
        .bind(sql_limit(limit))
        .fetch_all(&mut *tx)
        .await?;

        let mut won = Vec::with_capacity(candidates.len());
        for (org_id,) in candidates {
            let result = sqlx::query(
                "UPDATE enrichment_state \
                 SET status = 'in_progress', claimed_by = ?, claimed_at = ? \
                 WHERE org_id = ? \
                   AND (status = 'not_started' \
                        OR (status = 'in_progress' AND (claimed_at IS NULL OR claimed_at < ?)))",
            )
            .bind(worker_id)
            .bind(&now)
            .bind(&org_id)
            .bind(&cutoff)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 1 {
                won.push(org_id);
            }
        }

        let mut claimed = Vec::with_capacity(won.len());
        if !won.is_empty() {
            let mut qb = QueryBuilder::new(format!(
                "SELECT {STATE_COLUMNS} FROM enrichment_state WHERE org_id IN ("
            ));
            let mut separated = qb.separated(", ");
            for org_id in &won {
                separated.push_bind(org_id);
            }
            qb.push(")");

            let rows: Vec<StateRow> = qb.build_query_as().fetch_all(&mut *tx).await?;
            for row in rows {
                claimed.push(row.try_into()?);
            }
        }

        tx.commit().await?;
        Ok(claimed)
    }

    async fn peek_claimable(
        &self,
        limit: usize,
        stale_after_secs: u64,
    ) -> Result<Vec<EnrichmentState>, DatabaseError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let cutoff = stale_cutoff(stale_after_secs);

        // Left join so queued organizations without a state row yet are
        // visible. Those synthesize a fresh state in memory, no writes.
        let rows: Vec<PeekRow> = sqlx::query_as(
            "SELECT o.id AS org_id, s.status, s.layers_completed, s.layers_failed, \
                    s.last_attempt, s.claimed_by, s.claimed_at \
             FROM organizations o \
             LEFT JOIN enrichment_state s ON s.org_id = o.id \
             WHERE (s.org_id IS NULL AND o.status = 'pending_enrichment') \
                OR s.status = 'not_started' \
                OR (s.status = 'in_progress' AND (s.claimed_at IS NULL OR s.claimed_at < ?)) \
             ORDER BY s.last_attempt IS NOT NULL, s.last_attempt ASC \
             LIMIT ?",
        )
        .bind(&cutoff)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get(&self, org_id: Uuid) -> Result<Option<EnrichmentState>, DatabaseError> {
        let row: Option<StateRow> = sqlx::query_as(&format!(
            "SELECT {STATE_COLUMNS} FROM enrichment_state WHERE org_id = ?"
        ))
        .bind(org_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update_batch(&self, states: &[EnrichmentState]) -> Result<u64, DatabaseError> {
        if states.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::new(
            "INSERT INTO enrichment_state \
             (org_id, status, layers_completed, layers_failed, last_attempt, claimed_by, \
              claimed_at) ",
        );
        qb.push_values(states, |mut b, state| {
            b.push_bind(state.org_id.to_string())
                .push_bind(state.status.as_str())
                .push_bind(i64::from(state.layers_completed.bits()))
                .push_bind(i64::from(state.layers_failed.bits()))
                .push_bind(state.last_attempt.map(|t| t.to_rfc3339()))
                .push_bind(&state.claimed_by)
                .push_bind(state.claimed_at.map(|t| t.to_rfc3339()));
        });
        // Completed bits only ever accumulate, failed bits reflect the
        // latest attempt.
        qb.push(
            " ON CONFLICT(org_id) DO UPDATE SET \
             status = excluded.status, \
             layers_completed = layers_completed | excluded.layers_completed, \
             layers_failed = excluded.layers_failed, \
             last_attempt = excluded.last_attempt, \
             claimed_by = excluded.claimed_by, \
             claimed_at = excluded.claimed_at",
        );

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn requeue_missing_layer(&self, layer: Layer, limit: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE enrichment_state \
             SET status = 'not_started', claimed_by = NULL, claimed_at = NULL \
             WHERE org_id IN (\
                 SELECT org_id FROM enrichment_state \
                 WHERE (layers_completed & ?) = 0 AND status IN ('complete', 'no_results') \
                 LIMIT ?)",
        )
        .bind(i64::from(layer.bit()))
        .bind(limit)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn requeue_failed(&self, limit: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE enrichment_state \
             SET status = 'not_started', claimed_by = NULL, claimed_at = NULL \
             WHERE org_id IN (\
                 SELECT org_id FROM enrichment_state \
                 WHERE layers_failed != 0 AND status IN ('complete', 'no_results') \
                 LIMIT ?)",
        )
        .bind(limit)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn reset_layer(&self, layer: Layer, limit: i64) -> Result<u64, DatabaseError> {
        let bit = i64::from(layer.bit());
        let result = sqlx::query(
            "UPDATE enrichment_state \
             SET layers_completed = layers_completed & ~?, status = 'not_started', \
                 claimed_by = NULL, claimed_at = NULL \
             WHERE org_id IN (\
                 SELECT org_id FROM enrichment_state \
                 WHERE (layers_completed & ?) != 0 AND status != 'in_progress' \
                 LIMIT ?)",
        )
        .bind(bit)
        .bind(bit)
        .bind(limit)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn clear_layers(&self, layers: LayerSet) -> Result<u64, DatabaseError> {
        let mask = i64::from(layers.bits());
        let result = sqlx::query(
            "UPDATE enrichment_state SET layers_completed = layers_completed & ~? \
             WHERE (layers_completed & ?) != 0",
        )
        .bind(mask)
        .bind(mask)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn counts_by_status(&self) -> Result<Vec<(EnrichmentStatus, i64)>, DatabaseError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM enrichment_state GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for (status_str, count) in rows {
            if let Some(status) = EnrichmentStatus::from_str(&status_str) {
                counts.push((status, count));
            }
        }
        Ok(counts)
    }

    async fn layer_coverage(&self) -> Result<Vec<(Layer, i64)>, DatabaseError> {
        let mut coverage = Vec::with_capacity(Layer::ALL.len());
        for layer in Layer::ALL {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM enrichment_state WHERE (layers_completed & ?) != 0",
            )
            .bind(i64::from(layer.bit()))
            .fetch_one(&self.pool)
            .await?;
            coverage.push((layer, count));
        }
        Ok(coverage)
    }
}

fn mask_from_column(column: &str, value: i64) -> Result<LayerSet, DatabaseError> {
    let bits = u16::try_from(value).map_err(|_| DatabaseError::InvalidColumn {
        column: column.to_string(),
        reason: format!("mask {value} out of range"),
    })?;
    Ok(LayerSet::from_bits(bits))
}

fn timestamp_from_column(value: Option<String>) -> Result<Option<chrono::DateTime<Utc>>, DatabaseError> {
    value.as_deref().map(parse_datetime).transpose().map_err(Into::into)
}

#[derive(sqlx::FromRow)]
struct StateRow {
    org_id: String,
    status: String,
    layers_completed: i64,
    layers_failed: i64,
    last_attempt: Option<String>,
    claimed_by: Option<String>,
    claimed_at: Option<String>,
}

impl TryFrom<StateRow> for EnrichmentState {
    type Error = DatabaseError;

    fn try_from(row: StateRow) -> Result<Self, Self::Error> {
        let status = EnrichmentStatus::from_str(&row.status).ok_or_else(|| {
            DatabaseError::InvalidColumn {
                column: "status".to_string(),
                reason: format!("unknown value '{}'", row.status),
            }
        })?;

        Ok(EnrichmentState {
            org_id: Uuid::parse_str(&row.org_id)?,
            status,
            layers_completed: mask_from_column("layers_completed", row.layers_completed)?,
            layers_failed: mask_from_column("layers_failed", row.layers_failed)?,
            last_attempt: timestamp_from_column(row.last_attempt)?,
            claimed_by: row.claimed_by,
            claimed_at: timestamp_from_column(row.claimed_at)?,
        })
    }
}

// Peek rows come from a LEFT JOIN, so the state side may be all NULL.
#[derive(sqlx::FromRow)]
struct PeekRow {
    org_id: String,
    status: Option<String>,
    layers_completed: Option<i64>,
    layers_failed: Option<i64>,
    last_attempt: Option<String>,
    claimed_by: Option<String>,
    claimed_at: Option<String>,
}

impl TryFrom<PeekRow> for EnrichmentState {
    type Error = DatabaseError;

    fn try_from(row: PeekRow) -> Result<Self, Self::Error> {
        let org_id = Uuid::parse_str(&row.org_id)?;
        let Some(status_str) = row.status else {
            return Ok(EnrichmentState::new(org_id));
        };

        StateRow {
            org_id: row.org_id,
            status: status_str,
            layers_completed: row.layers_completed.unwrap_or(0),
            layers_failed: row.layers_failed.unwrap_or(0),
            last_attempt: row.last_attempt,
            claimed_by: row.claimed_by,
            claimed_at: row.claimed_at,
        }
        .try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{OrgStatus, Organization};
    use crate::domain::ports::OrganizationRepository;
    use crate::infrastructure::database::connection::create_test_pool;
    use crate::infrastructure::database::migrations::{all_embedded_migrations, Migrator};
    use crate::infrastructure::database::organization_repo::OrganizationRepositoryImpl;

    struct Setup {
        repo: EnrichmentRepositoryImpl,
        orgs: OrganizationRepositoryImpl,
    }

    async fn setup() -> Setup {
        let pool = create_test_pool().await.expect("test pool");
        let migrator = Migrator::new(pool.clone());
        migrator
            .run_embedded_migrations(all_embedded_migrations())
            .await
            .expect("migrations");
        Setup {
            repo: EnrichmentRepositoryImpl::new(pool.clone()),
            orgs: OrganizationRepositoryImpl::new(pool),
        }
    }

    async fn seed_pending(setup: &Setup, name: &str) -> Uuid {
        let org = Organization::new(name).with_status(OrgStatus::PendingEnrichment);
        setup.orgs.insert(&org).await.expect("seed org");
        org.id
    }

    #[tokio::test]
    async fn test_claim_creates_state_rows_for_pending_orgs() {
        let setup = setup().await;
        let org_id = seed_pending(&setup, "Hotel A").await;

        let claimed = setup.repo.claim_batch("worker-1", 10, 1800).await.expect("claim");

        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].org_id, org_id);
        assert_eq!(claimed[0].status, EnrichmentStatus::InProgress);
        assert_eq!(claimed[0].claimed_by.as_deref(), Some("worker-1"));
        assert!(claimed[0].claimed_at.is_some());
    }

    #[tokio::test]
    async fn test_claimed_rows_are_not_reclaimed_while_fresh() {
        let setup = setup().await;
        seed_pending(&setup, "Hotel A").await;

        let first = setup.repo.claim_batch("worker-1", 10, 1800).await.expect("claim");
        assert_eq!(first.len(), 1);

        let second = setup.repo.claim_batch("worker-2", 10, 1800).await.expect("claim");
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_stale_claims_are_reclaimed() {
        let setup = setup().await;
        seed_pending(&setup, "Hotel A").await;

        let first = setup.repo.claim_batch("worker-1", 10, 1800).await.expect("claim");
        assert_eq!(first.len(), 1);

        // Zero staleness treats every held claim as abandoned.
        let second = setup.repo.claim_batch("worker-2", 10, 0).await.expect("claim");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].claimed_by.as_deref(), Some("worker-2"));
    }

    #[tokio::test]
    async fn test_claim_respects_limit() {
        let setup = setup().await;
        seed_pending(&setup, "Hotel A").await;
        seed_pending(&setup, "Hotel B").await;
        seed_pending(&setup, "Hotel C").await;

        let claimed = setup.repo.claim_batch("worker-1", 2, 1800).await.expect("claim");
        assert_eq!(claimed.len(), 2);

        let rest = setup.repo.claim_batch("worker-1", 10, 1800).await.expect("claim");
        assert_eq!(rest.len(), 1);

        let none = setup.repo.claim_batch("worker-1", 0, 1800).await.expect("claim");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_peek_does_not_claim() {
        let setup = setup().await;
        let org_id = seed_pending(&setup, "Hotel A").await;

        let peeked = setup.repo.peek_claimable(10, 1800).await.expect("peek");
        assert_eq!(peeked.len(), 1);
        assert_eq!(peeked[0].org_id, org_id);
        assert_eq!(peeked[0].status, EnrichmentStatus::NotStarted);

        // Still claimable afterwards.
        let claimed = setup.repo.claim_batch("worker-1", 10, 1800).await.expect("claim");
        assert_eq!(claimed.len(), 1);
    }

    #[tokio::test]
    async fn test_update_batch_accumulates_completed_bits() {
        let setup = setup().await;
        seed_pending(&setup, "Hotel A").await;
        let mut state = setup
            .repo
            .claim_batch("worker-1", 10, 1800)
            .await
            .expect("claim")
            .remove(0);

        state.record_attempt(
            LayerSet::from_iter([Layer::Whois, Layer::Dns]),
            LayerSet::from_iter([Layer::Reviews]),
            Utc::now(),
        );
        state.finalize(true);
        setup.repo.update_batch(&[state.clone()]).await.expect("update");

        // A later attempt completes a different layer. The stored mask
        // keeps the earlier bits even though this state lost them.
        let mut second = EnrichmentState::new(state.org_id);
        second.record_attempt(LayerSet::from_iter([Layer::Reviews]), LayerSet::EMPTY, Utc::now());
        second.finalize(true);
        setup.repo.update_batch(&[second]).await.expect("update");

        let stored = setup.repo.get(state.org_id).await.expect("get").expect("present");
        assert!(stored.layers_completed.contains(Layer::Whois));
        assert!(stored.layers_completed.contains(Layer::Dns));
        assert!(stored.layers_completed.contains(Layer::Reviews));
        assert_eq!(stored.layers_failed, LayerSet::EMPTY);
        assert_eq!(stored.status, EnrichmentStatus::Complete);
        assert!(stored.claimed_by.is_none());
    }

    #[tokio::test]
    async fn test_requeue_failed() {
        let setup = setup().await;
        seed_pending(&setup, "Hotel A").await;
        let mut state = setup
            .repo
            .claim_batch("worker-1", 10, 1800)
            .await
            .expect("claim")
            .remove(0);
        state.record_attempt(
            LayerSet::from_iter([Layer::Whois]),
            LayerSet::from_iter([Layer::Dns]),
            Utc::now(),
        );
        state.finalize(false);
        setup.repo.update_batch(&[state.clone()]).await.expect("update");

        let requeued = setup.repo.requeue_failed(-1).await.expect("requeue");
        assert_eq!(requeued, 1);

        let stored = setup.repo.get(state.org_id).await.expect("get").expect("present");
        assert_eq!(stored.status, EnrichmentStatus::NotStarted);
        assert!(stored.layers_completed.contains(Layer::Whois));
    }

    #[tokio::test]
    async fn test_requeue_missing_layer_skips_covered_orgs() {
        let setup = setup().await;
        seed_pending(&setup, "Hotel A").await;
        let mut state = setup
            .repo
            .claim_batch("worker-1", 10, 1800)
            .await
            .expect("claim")
            .remove(0);
        state.record_attempt(LayerSet::from_iter([Layer::Whois]), LayerSet::EMPTY, Utc::now());
        state.finalize(true);
        setup.repo.update_batch(&[state]).await.expect("update");

        let noop = setup.repo.requeue_missing_layer(Layer::Whois, -1).await.expect("requeue");
        assert_eq!(noop, 0);

        let requeued = setup.repo.requeue_missing_layer(Layer::Dns, -1).await.expect("requeue");
        assert_eq!(requeued, 1);
    }

    #[tokio::test]
    async fn test_reset_layer_clears_bit_and_requeues() {
        let setup = setup().await;
        seed_pending(&setup, "Hotel A").await;
        let mut state = setup
            .repo
            .claim_batch("worker-1", 10, 1800)
            .await
            .expect("claim")
            .remove(0);
        state.record_attempt(
            LayerSet::from_iter([Layer::Whois, Layer::Dns]),
            LayerSet::EMPTY,
            Utc::now(),
        );
        state.finalize(true);
        setup.repo.update_batch(&[state.clone()]).await.expect("update");

        let reset = setup.repo.reset_layer(Layer::Whois, -1).await.expect("reset");
        assert_eq!(reset, 1);

        let stored = setup.repo.get(state.org_id).await.expect("get").expect("present");
        assert!(!stored.layers_completed.contains(Layer::Whois));
        assert!(stored.layers_completed.contains(Layer::Dns));
        assert_eq!(stored.status, EnrichmentStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_counts_and_coverage() {
        let setup = setup().await;
        seed_pending(&setup, "Hotel A").await;
        seed_pending(&setup, "Hotel B").await;
        let mut claimed = setup.repo.claim_batch("worker-1", 1, 1800).await.expect("claim");
        let mut state = claimed.remove(0);
        state.record_attempt(LayerSet::from_iter([Layer::Whois]), LayerSet::EMPTY, Utc::now());
        state.finalize(true);
        setup.repo.update_batch(&[state]).await.expect("update");

        let counts = setup.repo.counts_by_status().await.expect("counts");
        let complete = counts
            .iter()
            .find(|(status, _)| *status == EnrichmentStatus::Complete)
            .map(|(_, n)| *n);
        assert_eq!(complete, Some(1));

        let coverage = setup.repo.layer_coverage().await.expect("coverage");
        let whois = coverage
            .iter()
            .find(|(layer, _)| *layer == Layer::Whois)
            .map(|(_, n)| *n);
        assert_eq!(whois, Some(1));
    }
}
