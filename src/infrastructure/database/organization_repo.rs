//! SQLite implementation of the organization repository.

use async_trait::async_trait;
use sqlx::{QueryBuilder, SqlitePool};
use uuid::Uuid;

use super::utils::parse_datetime;
use crate::domain::models::{OrgStatus, Organization};
use crate::domain::normalize::phone_digits;
use crate::domain::ports::{DatabaseError, OrganizationRepository};

const ORG_COLUMNS: &str = "id, external_id, name, domain, phone, address, city, region, \
                           country, status, source_tags, created_at, updated_at";

/// `SQLite` implementation of `OrganizationRepository`
pub struct OrganizationRepositoryImpl {
    pool: SqlitePool,
}

impl OrganizationRepositoryImpl {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// The phone_digits column is derived from phone on every write so
// lookups can ignore formatting. It never round-trips into the model.
fn digits_column(org: &Organization) -> Option<String> {
    org.phone
        .as_deref()
        .map(phone_digits)
        .filter(|digits| !digits.is_empty())
}

#[async_trait]
impl OrganizationRepository for OrganizationRepositoryImpl {
    async fn insert(&self, org: &Organization) -> Result<(), DatabaseError> {
        let tags_json = serde_json::to_string(&org.source_tags)?;

        sqlx::query(
            "INSERT INTO organizations \
             (id, external_id, name, domain, phone, phone_digits, address, city, region, \
              country, status, source_tags, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(org.id.to_string())
        .bind(&org.external_id)
        .bind(&org.name)
        .bind(&org.domain)
        .bind(&org.phone)
        .bind(digits_column(org))
        .bind(&org.address)
        .bind(&org.city)
        .bind(&org.region)
        .bind(&org.country)
        .bind(org.status.as_str())
        .bind(&tags_json)
        .bind(org.created_at.to_rfc3339())
        .bind(org.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Organization>, DatabaseError> {
        let row: Option<OrgRow> = sqlx::query_as(&format!(
            "SELECT {ORG_COLUMNS} FROM organizations WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<Organization>, DatabaseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb =
            QueryBuilder::new(format!("SELECT {ORG_COLUMNS} FROM organizations WHERE id IN ("));
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.to_string());
        }
        qb.push(")");

        let rows: Vec<OrgRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(&self, org: &Organization) -> Result<(), DatabaseError> {
        let tags_json = serde_json::to_string(&org.source_tags)?;

        let result = sqlx::query(
            "UPDATE organizations \
             SET external_id = ?, name = ?, domain = ?, phone = ?, phone_digits = ?, \
                 address = ?, city = ?, region = ?, country = ?, status = ?, \
                 source_tags = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&org.external_id)
        .bind(&org.name)
        .bind(&org.domain)
        .bind(&org.phone)
        .bind(digits_column(org))
        .bind(&org.address)
        .bind(&org.city)
        .bind(&org.region)
        .bind(&org.country)
        .bind(org.status.as_str())
        .bind(&tags_json)
        .bind(org.updated_at.to_rfc3339())
        .bind(org.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::OrganizationNotFound(org.id));
        }
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: OrgStatus) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE organizations SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::OrganizationNotFound(id));
        }
        Ok(())
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Vec<Organization>, DatabaseError> {
        let rows: Vec<OrgRow> = sqlx::query_as(&format!(
            "SELECT {ORG_COLUMNS} FROM organizations WHERE external_id = ?"
        ))
        .bind(external_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Vec<Organization>, DatabaseError> {
        let rows: Vec<OrgRow> = sqlx::query_as(&format!(
            "SELECT {ORG_COLUMNS} FROM organizations WHERE domain = ?"
        ))
        .bind(domain)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_by_phone_digits(&self, digits: &str) -> Result<Vec<Organization>, DatabaseError> {
        let rows: Vec<OrgRow> = sqlx::query_as(&format!(
            "SELECT {ORG_COLUMNS} FROM organizations WHERE phone_digits = ?"
        ))
        .bind(digits)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_by_city(&self, city: &str) -> Result<Vec<Organization>, DatabaseError> {
        let rows: Vec<OrgRow> = sqlx::query_as(&format!(
            "SELECT {ORG_COLUMNS} FROM organizations WHERE city = ? COLLATE NOCASE"
        ))
        .bind(city)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_status(
        &self,
        status: OrgStatus,
        limit: i64,
    ) -> Result<Vec<Organization>, DatabaseError> {
        let rows: Vec<OrgRow> = sqlx::query_as(&format!(
            "SELECT {ORG_COLUMNS} FROM organizations WHERE status = ? \
             ORDER BY created_at ASC LIMIT ?"
        ))
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_by_status(&self) -> Result<Vec<(OrgStatus, i64)>, DatabaseError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM organizations GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for (status_str, count) in rows {
            if let Some(status) = OrgStatus::from_str(&status_str) {
                counts.push((status, count));
            }
        }
        Ok(counts)
    }
}

#[derive(sqlx::FromRow)]
struct OrgRow {
    id: String,
    external_id: Option<String>,
    name: String,
    domain: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    status: String,
    source_tags: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<OrgRow> for Organization {
    type Error = DatabaseError;

    fn try_from(row: OrgRow) -> Result<Self, Self::Error> {
        let status = OrgStatus::from_str(&row.status).ok_or_else(|| {
            DatabaseError::InvalidColumn {
                column: "status".to_string(),
                reason: format!("unknown value '{}'", row.status),
            }
        })?;

        let source_tags: Vec<String> = row
            .source_tags
            .map(|s| serde_json::from_str(&s))
            .transpose()?
            .unwrap_or_default();

        Ok(Organization {
            id: Uuid::parse_str(&row.id)?,
            external_id: row.external_id,
            name: row.name,
            domain: row.domain,
            phone: row.phone,
            address: row.address,
            city: row.city,
            region: row.region,
            country: row.country,
            status,
            source_tags,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
