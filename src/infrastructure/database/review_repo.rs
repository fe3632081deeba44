//! SQLite implementation of the entity review queue.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::utils::parse_datetime;
use crate::domain::models::ReviewFlag;
use crate::domain::ports::{DatabaseError, ReviewRepository};

/// `SQLite` implementation of `ReviewRepository`
pub struct ReviewRepositoryImpl {
    pool: SqlitePool,
}

impl ReviewRepositoryImpl {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewRepository for ReviewRepositoryImpl {
    async fn insert(&self, flag: &ReviewFlag) -> Result<(), DatabaseError> {
        let stub_json = serde_json::to_string(&flag.stub)?;

        sqlx::query(
            "INSERT INTO entity_review (id, org_id, stub, score, signal, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(flag.id.to_string())
        .bind(flag.org_id.to_string())
        .bind(&stub_json)
        .bind(flag.score)
        .bind(&flag.signal)
        .bind(flag.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, limit: i64) -> Result<Vec<ReviewFlag>, DatabaseError> {
        let rows: Vec<ReviewRow> = sqlx::query_as(
            "SELECT id, org_id, stub, score, signal, created_at FROM entity_review \
             ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count(&self) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entity_review")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: String,
    org_id: String,
    stub: String,
    score: f64,
    signal: String,
    created_at: String,
}

impl TryFrom<ReviewRow> for ReviewFlag {
    type Error = DatabaseError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        Ok(ReviewFlag {
            id: Uuid::parse_str(&row.id)?,
            org_id: Uuid::parse_str(&row.org_id)?,
            stub: serde_json::from_str(&row.stub)?,
            score: row.score,
            signal: row.signal,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
