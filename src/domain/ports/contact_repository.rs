use crate::domain::models::DecisionMaker;
use crate::domain::ports::errors::DatabaseError;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository port for decision-maker persistence
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Upsert a batch of merged records in one statement.
    ///
    /// Conflict target is the identity key (org, normalized name,
    /// normalized title); scalar fields must be written with
    /// COALESCE/OR/MAX semantics so the statement never erases data.
    /// Returns the number of rows written.
    async fn upsert_batch(&self, contacts: &[DecisionMaker]) -> Result<u64, DatabaseError>;

    /// All contacts belonging to any of the given organizations
    async fn fetch_for_orgs(&self, org_ids: &[Uuid]) -> Result<Vec<DecisionMaker>, DatabaseError>;

    /// Contacts of one organization
    async fn list_for_org(&self, org_id: Uuid) -> Result<Vec<DecisionMaker>, DatabaseError>;

    /// Total number of decision makers on file
    async fn count(&self) -> Result<i64, DatabaseError>;
}
