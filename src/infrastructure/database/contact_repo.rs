//! SQLite implementation of the decision-maker contact repository.

use async_trait::async_trait;
use sqlx::{QueryBuilder, SqlitePool};
use uuid::Uuid;

use super::utils::parse_datetime;
use crate::domain::models::DecisionMaker;
use crate::domain::ports::{ContactRepository, DatabaseError};

const CONTACT_COLUMNS: &str = "id, org_id, full_name, normalized_name, title, normalized_title, \
                               email, phone, email_verified, sources, confidence, source_url, \
                               created_at, updated_at";

/// `SQLite` implementation of `ContactRepository`
pub struct ContactRepositoryImpl {
    pool: SqlitePool,
}

impl ContactRepositoryImpl {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactRepository for ContactRepositoryImpl {
    async fn upsert_batch(&self, contacts: &[DecisionMaker]) -> Result<u64, DatabaseError> {
        if contacts.is_empty() {
            return Ok(0);
        }

        let mut rows = Vec::with_capacity(contacts.len());
        for contact in contacts {
            rows.push((contact, serde_json::to_string(&contact.sources)?));
        }

        let mut qb = QueryBuilder::new(
            "INSERT INTO decision_makers \
             (id, org_id, full_name, normalized_name, title, normalized_title, email, phone, \
              email_verified, sources, confidence, source_url, created_at, updated_at) ",
        );
        qb.push_values(rows, |mut b, (contact, sources_json)| {
            b.push_bind(contact.id.to_string())
                .push_bind(contact.org_id.to_string())
                .push_bind(&contact.full_name)
                .push_bind(&contact.normalized_name)
                .push_bind(&contact.title)
                .push_bind(&contact.normalized_title)
                .push_bind(&contact.email)
                .push_bind(&contact.phone)
                .push_bind(i64::from(contact.email_verified))
                .push_bind(sources_json)
                .push_bind(contact.confidence)
                .push_bind(&contact.source_url)
                .push_bind(contact.created_at.to_rfc3339())
                .push_bind(contact.updated_at.to_rfc3339());
        });
        // Conflict targets the identity key. Empty fields never erase
        // stored values, verification and confidence only ratchet up,
        // and the first recorded source URL sticks.
        qb.push(
            " ON CONFLICT(org_id, normalized_name, normalized_title) DO UPDATE SET \
             full_name = excluded.full_name, \
             title = excluded.title, \
             email = COALESCE(excluded.email, email), \
             phone = COALESCE(excluded.phone, phone), \
             email_verified = MAX(email_verified, excluded.email_verified), \
             sources = excluded.sources, \
             confidence = MAX(confidence, excluded.confidence), \
             source_url = COALESCE(source_url, excluded.source_url), \
             updated_at = excluded.updated_at",
        );

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_for_orgs(&self, org_ids: &[Uuid]) -> Result<Vec<DecisionMaker>, DatabaseError> {
        if org_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::new(format!(
            "SELECT {CONTACT_COLUMNS} FROM decision_makers WHERE org_id IN ("
        ));
        let mut separated = qb.separated(", ");
        for org_id in org_ids {
            separated.push_bind(org_id.to_string());
        }
        qb.push(")");

        let rows: Vec<ContactRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_for_org(&self, org_id: Uuid) -> Result<Vec<DecisionMaker>, DatabaseError> {
        let rows: Vec<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLUMNS} FROM decision_makers WHERE org_id = ? \
             ORDER BY confidence DESC, created_at ASC"
        ))
        .bind(org_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count(&self) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM decision_makers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[derive(sqlx::FromRow)]
struct ContactRow {
    id: String,
    org_id: String,
    full_name: String,
    normalized_name: String,
    title: String,
    normalized_title: String,
    email: Option<String>,
    phone: Option<String>,
    email_verified: i64,
    sources: Option<String>,
    confidence: f64,
    source_url: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ContactRow> for DecisionMaker {
    type Error = DatabaseError;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        let sources: Vec<String> = row
            .sources
            .map(|s| serde_json::from_str(&s))
            .transpose()?
            .unwrap_or_default();

        Ok(DecisionMaker {
            id: Uuid::parse_str(&row.id)?,
            org_id: Uuid::parse_str(&row.org_id)?,
            full_name: row.full_name,
            normalized_name: row.normalized_name,
            title: row.title,
            normalized_title: row.normalized_title,
            email: row.email,
            phone: row.phone,
            email_verified: row.email_verified != 0,
            sources,
            confidence: row.confidence,
            source_url: row.source_url,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ContactFact, Layer, Organization};
    use crate::domain::ports::OrganizationRepository;
    use crate::infrastructure::database::connection::create_test_pool;
    use crate::infrastructure::database::migrations::{all_embedded_migrations, Migrator};
    use crate::infrastructure::database::organization_repo::OrganizationRepositoryImpl;

    async fn setup_test_repo() -> (ContactRepositoryImpl, Uuid) {
        let pool = create_test_pool().await.expect("test pool");
        let migrator = Migrator::new(pool.clone());
        migrator
            .run_embedded_migrations(all_embedded_migrations())
            .await
            .expect("migrations");

        let org = Organization::new("Hotel Sonne");
        OrganizationRepositoryImpl::new(pool.clone())
            .insert(&org)
            .await
            .expect("seed org");

        (ContactRepositoryImpl::new(pool), org.id)
    }

    fn fact(name: &str, title: &str, source: Layer) -> ContactFact {
        ContactFact::new(name, title, source)
    }

    #[tokio::test]
    async fn test_upsert_and_list_round_trip() {
        let (repo, org_id) = setup_test_repo().await;
        let contact = DecisionMaker::from_fact(
            org_id,
            &fact("Anna Gruber", "General Manager", Layer::PageScrape)
                .with_email("anna@hotel-sonne.example")
                .with_confidence(0.8),
        );

        repo.upsert_batch(&[contact.clone()]).await.expect("upsert");

        let listed = repo.list_for_org(org_id).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].full_name, "Anna Gruber");
        assert_eq!(listed[0].normalized_title, "general manager");
        assert_eq!(listed[0].email.as_deref(), Some("anna@hotel-sonne.example"));
        assert!((listed[0].confidence - 0.8).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_upsert_conflict_fills_empty_fields_only() {
        let (repo, org_id) = setup_test_repo().await;
        let first = DecisionMaker::from_fact(
            org_id,
            &fact("Anna Gruber", "General Manager", Layer::PageScrape)
                .with_email("anna@hotel-sonne.example")
                .with_source_url("https://hotel-sonne.example/team"),
        );
        repo.upsert_batch(&[first]).await.expect("first upsert");

        // Same identity, no email, but a phone the first pass lacked.
        let second = DecisionMaker::from_fact(
            org_id,
            &fact("Anna Gruber", "General Manager", Layer::GovRegistry)
                .with_phone("+41 81 252 11 44")
                .with_source_url("https://registry.example/HR-9"),
        );
        repo.upsert_batch(&[second]).await.expect("second upsert");

        let listed = repo.list_for_org(org_id).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].email.as_deref(), Some("anna@hotel-sonne.example"));
        assert_eq!(listed[0].phone.as_deref(), Some("+41 81 252 11 44"));
        assert_eq!(
            listed[0].source_url.as_deref(),
            Some("https://hotel-sonne.example/team")
        );
    }

    #[tokio::test]
    async fn test_upsert_verification_and_confidence_are_sticky() {
        let (repo, org_id) = setup_test_repo().await;
        let verified = DecisionMaker::from_fact(
            org_id,
            &fact("Anna Gruber", "General Manager", Layer::EmailVerify)
                .with_verified(true)
                .with_confidence(0.9),
        );
        repo.upsert_batch(&[verified]).await.expect("first upsert");

        let weaker = DecisionMaker::from_fact(
            org_id,
            &fact("Anna Gruber", "General Manager", Layer::Reviews).with_confidence(0.4),
        );
        repo.upsert_batch(&[weaker]).await.expect("second upsert");

        let listed = repo.list_for_org(org_id).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert!(listed[0].email_verified);
        assert!((listed[0].confidence - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_fetch_for_orgs_scopes_to_requested_ids() {
        let (repo, org_id) = setup_test_repo().await;
        let contact =
            DecisionMaker::from_fact(org_id, &fact("Anna Gruber", "Owner", Layer::GovRegistry));
        repo.upsert_batch(&[contact]).await.expect("upsert");

        let hits = repo.fetch_for_orgs(&[org_id]).await.expect("fetch");
        assert_eq!(hits.len(), 1);

        let misses = repo.fetch_for_orgs(&[Uuid::new_v4()]).await.expect("fetch");
        assert!(misses.is_empty());

        let empty = repo.fetch_for_orgs(&[]).await.expect("fetch empty");
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_count() {
        let (repo, org_id) = setup_test_repo().await;
        assert_eq!(repo.count().await.expect("count"), 0);

        let a = DecisionMaker::from_fact(org_id, &fact("Anna Gruber", "Owner", Layer::Whois));
        let b = DecisionMaker::from_fact(org_id, &fact("Beat Keller", "Director", Layer::Whois));
        repo.upsert_batch(&[a, b]).await.expect("upsert");

        assert_eq!(repo.count().await.expect("count"), 2);
    }
}
