use crate::domain::models::DomainIntelligence;
use crate::domain::ports::errors::DatabaseError;
use async_trait::async_trait;

/// Repository port for domain intelligence persistence
#[async_trait]
pub trait DomainIntelRepository: Send + Sync {
    /// Upsert a batch of domain records in one statement, COALESCE
    /// style: incoming non-null fields win, nulls never erase.
    /// Returns the number of rows written.
    async fn upsert_batch(&self, records: &[DomainIntelligence]) -> Result<u64, DatabaseError>;

    /// Get one domain record
    async fn get(&self, domain: &str) -> Result<Option<DomainIntelligence>, DatabaseError>;

    /// Fetch several domain records at once
    async fn fetch_many(&self, domains: &[String])
        -> Result<Vec<DomainIntelligence>, DatabaseError>;

    /// Total number of domains on file
    async fn count(&self) -> Result<i64, DatabaseError>;
}
