//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

use std::path::PathBuf;
use std::sync::Arc;

use sqlx::SqlitePool;
use tempfile::TempDir;

use dossier::domain::models::{Layer, OrgStatus, Organization};
use dossier::domain::ports::{OrganizationRepository, SourceLayer};
use dossier::infrastructure::database::{
    create_migrated_test_pool, initialize_database, OrganizationRepositoryImpl,
};
use dossier::infrastructure::sources::ScriptedLayer;

/// Create an in-memory SQLite database with migrations applied.
///
/// Single connection, so every query sees the migrated schema. Each
/// call creates a completely isolated database instance.
pub async fn setup_test_db() -> SqlitePool {
    create_migrated_test_pool()
        .await
        .expect("failed to create test database")
}

/// Create a file-backed, migrated database in a temporary directory.
///
/// Use this when a test needs several connections to the same data,
/// e.g. concurrent claim races. Keep the `TempDir` alive for the
/// duration of the test.
#[allow(dead_code)]
pub async fn setup_file_db() -> (TempDir, PathBuf, SqlitePool) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("test.db");
    let pool = initialize_database(&format!("sqlite:{}", path.display()))
        .await
        .expect("failed to initialize test database");
    (dir, path, pool)
}

/// Open another pool onto an existing file-backed database.
#[allow(dead_code)]
pub async fn open_file_db(path: &std::path::Path) -> SqlitePool {
    initialize_database(&format!("sqlite:{}", path.display()))
        .await
        .expect("failed to open test database")
}

/// An organization already queued for enrichment.
#[allow(dead_code)]
pub fn queued_org(name: &str) -> Organization {
    Organization::new(name).with_status(OrgStatus::PendingEnrichment)
}

/// Insert organizations and return them with their ids.
#[allow(dead_code)]
pub async fn seed_orgs(pool: &SqlitePool, orgs: Vec<Organization>) -> Vec<Organization> {
    let repo = OrganizationRepositoryImpl::new(pool.clone());
    for org in &orgs {
        repo.insert(org).await.expect("failed to seed organization");
    }
    orgs
}

/// One scripted adapter per layer, all replying with empty findings.
/// Tests override individual layers with their own scripts.
#[allow(dead_code)]
pub fn empty_scripted_layers() -> Vec<Arc<ScriptedLayer>> {
    Layer::ALL
        .iter()
        .map(|&layer| Arc::new(ScriptedLayer::new(layer)))
        .collect()
}

/// Coerce concrete scripted layers into the adapter set a pipeline
/// takes.
#[allow(dead_code)]
pub fn as_adapters(layers: &[Arc<ScriptedLayer>]) -> Vec<Arc<dyn SourceLayer>> {
    layers
        .iter()
        .map(|layer| Arc::clone(layer) as Arc<dyn SourceLayer>)
        .collect()
}
