//! SQLite persistence: pool management, embedded migrations, and the
//! repository implementations behind the domain ports.

pub mod connection;
pub mod contact_repo;
pub mod domain_intel_repo;
pub mod enrichment_repo;
pub mod migrations;
pub mod organization_repo;
pub mod review_repo;
pub mod utils;

pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use contact_repo::ContactRepositoryImpl;
pub use domain_intel_repo::DomainIntelRepositoryImpl;
pub use enrichment_repo::EnrichmentRepositoryImpl;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use organization_repo::OrganizationRepositoryImpl;
pub use review_repo::ReviewRepositoryImpl;

use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

/// Open (creating if needed) a database and bring its schema current.
pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, SetupError> {
    let pool = create_pool(database_url, None).await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, SetupError> {
    let pool = create_test_pool().await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}
