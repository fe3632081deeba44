use crate::domain::models::{OrgStatus, Organization};
use crate::domain::ports::errors::DatabaseError;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository port for organization persistence
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// Insert a new organization
    async fn insert(&self, org: &Organization) -> Result<(), DatabaseError>;

    /// Get an organization by ID
    async fn get(&self, id: Uuid) -> Result<Option<Organization>, DatabaseError>;

    /// Fetch several organizations by ID
    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<Organization>, DatabaseError>;

    /// Update an existing organization
    async fn update(&self, org: &Organization) -> Result<(), DatabaseError>;

    /// Update just the lifecycle status
    async fn update_status(&self, id: Uuid, status: OrgStatus) -> Result<(), DatabaseError>;

    /// Organizations carrying this external registry id
    async fn find_by_external_id(&self, external_id: &str)
        -> Result<Vec<Organization>, DatabaseError>;

    /// Organizations on this canonical domain
    async fn find_by_domain(&self, domain: &str) -> Result<Vec<Organization>, DatabaseError>;

    /// Organizations whose phone collapses to these digits
    async fn find_by_phone_digits(&self, digits: &str)
        -> Result<Vec<Organization>, DatabaseError>;

    /// Organizations in this city (exact stored value)
    async fn find_by_city(&self, city: &str) -> Result<Vec<Organization>, DatabaseError>;

    /// List organizations in a lifecycle status
    async fn list_by_status(
        &self,
        status: OrgStatus,
        limit: i64,
    ) -> Result<Vec<Organization>, DatabaseError>;

    /// Row counts per lifecycle status
    async fn count_by_status(&self) -> Result<Vec<(OrgStatus, i64)>, DatabaseError>;
}
