//! CLI command implementations.

pub mod init;
pub mod retry;
pub mod run;
pub mod seed;
pub mod status;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::domain::models::Config;
use crate::infrastructure::database::initialize_database;

/// Open the configured database, applying migrations if needed.
pub(crate) async fn open_database(config: &Config) -> Result<SqlitePool> {
    let url = format!("sqlite:{}", config.database.path);
    initialize_database(&url)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))
}
