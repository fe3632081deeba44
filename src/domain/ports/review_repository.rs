use crate::domain::models::ReviewFlag;
use crate::domain::ports::errors::DatabaseError;
use async_trait::async_trait;

/// Repository port for entity-review flags
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Record a candidate duplicate pair
    async fn insert(&self, flag: &ReviewFlag) -> Result<(), DatabaseError>;

    /// Most recent flags, newest first
    async fn list(&self, limit: i64) -> Result<Vec<ReviewFlag>, DatabaseError>;

    /// Total number of open flags
    async fn count(&self) -> Result<i64, DatabaseError>;
}
