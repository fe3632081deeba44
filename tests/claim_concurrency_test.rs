//! Concurrent claiming against one shared database file.
//!
//! Two workers pointed at the same database must never hold the same
//! organization, whatever the interleaving. These tests use a
//! file-backed database so each worker gets its own connection pool,
//! like separate processes would.

mod common;

use std::collections::HashSet;

use uuid::Uuid;

use dossier::domain::models::EnrichmentStatus;
use dossier::domain::ports::EnrichmentRepository;
use dossier::infrastructure::database::EnrichmentRepositoryImpl;

use common::{open_file_db, queued_org, seed_orgs, setup_file_db};

const STALE_SECS: u64 = 1800;

#[tokio::test]
async fn test_racing_claimers_get_disjoint_batches() {
    let (_dir, path, pool_a) = setup_file_db().await;
    let pool_b = open_file_db(&path).await;

    let orgs = seed_orgs(&pool_a, (0..20).map(|i| queued_org(&format!("Hotel {i}"))).collect())
        .await;

    let repo_a = EnrichmentRepositoryImpl::new(pool_a.clone());
    let repo_b = EnrichmentRepositoryImpl::new(pool_b.clone());

    let (claimed_a, claimed_b) = tokio::join!(
        repo_a.claim_batch("worker-a", 12, STALE_SECS),
        repo_b.claim_batch("worker-b", 12, STALE_SECS),
    );
    let claimed_a = claimed_a.expect("worker-a claim failed");
    let claimed_b = claimed_b.expect("worker-b claim failed");

    let ids_a: HashSet<Uuid> = claimed_a.iter().map(|s| s.org_id).collect();
    let ids_b: HashSet<Uuid> = claimed_b.iter().map(|s| s.org_id).collect();

    assert!(ids_a.is_disjoint(&ids_b), "two workers claimed the same organization");
    assert!(ids_a.len() + ids_b.len() <= orgs.len());
    assert!(!ids_a.is_empty() || !ids_b.is_empty());

    for state in claimed_a.iter().chain(claimed_b.iter()) {
        assert_eq!(state.status, EnrichmentStatus::InProgress);
        assert!(state.claimed_at.is_some());
    }
    for state in &claimed_a {
        assert_eq!(state.claimed_by.as_deref(), Some("worker-a"));
    }
    for state in &claimed_b {
        assert_eq!(state.claimed_by.as_deref(), Some("worker-b"));
    }
}

#[tokio::test]
async fn test_claimed_work_is_not_claimable_again() {
    let (_dir, path, pool_a) = setup_file_db().await;
    let pool_b = open_file_db(&path).await;

    seed_orgs(&pool_a, vec![queued_org("Hotel Sonne"), queued_org("Gasthof Adler")]).await;

    let repo_a = EnrichmentRepositoryImpl::new(pool_a.clone());
    let repo_b = EnrichmentRepositoryImpl::new(pool_b.clone());

    let first = repo_a.claim_batch("worker-a", 10, STALE_SECS).await.expect("claim failed");
    assert_eq!(first.len(), 2);

    let second = repo_b.claim_batch("worker-b", 10, STALE_SECS).await.expect("claim failed");
    assert!(second.is_empty(), "fresh claims must not be reclaimable");
}

#[tokio::test]
async fn test_stale_claims_are_reclaimed() {
    let (_dir, path, pool_a) = setup_file_db().await;
    let pool_b = open_file_db(&path).await;

    seed_orgs(&pool_a, vec![queued_org("Hotel Sonne")]).await;

    let repo_a = EnrichmentRepositoryImpl::new(pool_a.clone());
    let repo_b = EnrichmentRepositoryImpl::new(pool_b.clone());

    let first = repo_a.claim_batch("worker-a", 10, STALE_SECS).await.expect("claim failed");
    assert_eq!(first.len(), 1);

    // With a zero stale window the claim has already aged out, as if
    // worker-a crashed without finishing.
    let reclaimed = repo_b.claim_batch("worker-b", 10, 0).await.expect("claim failed");
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].org_id, first[0].org_id);
    assert_eq!(reclaimed[0].claimed_by.as_deref(), Some("worker-b"));
}

#[tokio::test]
async fn test_sequential_claims_drain_the_queue() {
    let (_dir, _path, pool) = setup_file_db().await;
    seed_orgs(&pool, (0..5).map(|i| queued_org(&format!("Hotel {i}"))).collect()).await;

    let repo = EnrichmentRepositoryImpl::new(pool.clone());

    let mut seen: HashSet<Uuid> = HashSet::new();
    for _ in 0..3 {
        for state in repo.claim_batch("worker-a", 2, STALE_SECS).await.expect("claim failed") {
            assert!(seen.insert(state.org_id), "organization claimed twice");
        }
    }
    assert_eq!(seen.len(), 5);
    assert!(
        repo.claim_batch("worker-a", 2, STALE_SECS).await.expect("claim failed").is_empty(),
        "queue should be drained"
    );
}
