//! SQLite implementation of the domain intelligence repository.

use async_trait::async_trait;
use sqlx::{QueryBuilder, SqlitePool};

use super::utils::parse_datetime;
use crate::domain::models::DomainIntelligence;
use crate::domain::ports::{DatabaseError, DomainIntelRepository};

const INTEL_COLUMNS: &str = "domain, registrant_name, registrant_org, registrar, name_servers, \
                             mail_provider, cert_org, queried_at";

/// `SQLite` implementation of `DomainIntelRepository`
pub struct DomainIntelRepositoryImpl {
    pool: SqlitePool,
}

impl DomainIntelRepositoryImpl {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DomainIntelRepository for DomainIntelRepositoryImpl {
    async fn upsert_batch(&self, records: &[DomainIntelligence]) -> Result<u64, DatabaseError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::new(
            "INSERT INTO domain_intelligence \
             (domain, registrant_name, registrant_org, registrar, name_servers, mail_provider, \
              cert_org, queried_at) ",
        );
        qb.push_values(records, |mut b, record| {
            b.push_bind(&record.domain)
                .push_bind(&record.registrant_name)
                .push_bind(&record.registrant_org)
                .push_bind(&record.registrar)
                .push_bind(&record.name_servers)
                .push_bind(&record.mail_provider)
                .push_bind(&record.cert_org)
                .push_bind(record.queried_at.to_rfc3339());
        });
        // Later lookups fill gaps without clobbering known values.
        // MAX on uniform RFC 3339 text keeps the newest query time.
        qb.push(
            " ON CONFLICT(domain) DO UPDATE SET \
             registrant_name = COALESCE(excluded.registrant_name, registrant_name), \
             registrant_org = COALESCE(excluded.registrant_org, registrant_org), \
             registrar = COALESCE(excluded.registrar, registrar), \
             name_servers = COALESCE(excluded.name_servers, name_servers), \
             mail_provider = COALESCE(excluded.mail_provider, mail_provider), \
             cert_org = COALESCE(excluded.cert_org, cert_org), \
             queried_at = MAX(queried_at, excluded.queried_at)",
        );

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn get(&self, domain: &str) -> Result<Option<DomainIntelligence>, DatabaseError> {
        let row: Option<IntelRow> = sqlx::query_as(&format!(
            "SELECT {INTEL_COLUMNS} FROM domain_intelligence WHERE domain = ?"
        ))
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn fetch_many(&self, domains: &[String]) -> Result<Vec<DomainIntelligence>, DatabaseError> {
        if domains.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::new(format!(
            "SELECT {INTEL_COLUMNS} FROM domain_intelligence WHERE domain IN ("
        ));
        let mut separated = qb.separated(", ");
        for domain in domains {
            separated.push_bind(domain);
        }
        qb.push(")");

        let rows: Vec<IntelRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count(&self) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM domain_intelligence")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[derive(sqlx::FromRow)]
struct IntelRow {
    domain: String,
    registrant_name: Option<String>,
    registrant_org: Option<String>,
    registrar: Option<String>,
    name_servers: Option<String>,
    mail_provider: Option<String>,
    cert_org: Option<String>,
    queried_at: String,
}

impl TryFrom<IntelRow> for DomainIntelligence {
    type Error = DatabaseError;

    fn try_from(row: IntelRow) -> Result<Self, Self::Error> {
        Ok(DomainIntelligence {
            domain: row.domain,
            registrant_name: row.registrant_name,
            registrant_org: row.registrant_org,
            registrar: row.registrar,
            name_servers: row.name_servers,
            mail_provider: row.mail_provider,
            cert_org: row.cert_org,
            queried_at: parse_datetime(&row.queried_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::infrastructure::database::connection::create_test_pool;
    use crate::infrastructure::database::migrations::{all_embedded_migrations, Migrator};

    async fn setup_test_repo() -> DomainIntelRepositoryImpl {
        let pool = create_test_pool().await.expect("test pool");
        let migrator = Migrator::new(pool.clone());
        migrator
            .run_embedded_migrations(all_embedded_migrations())
            .await
            .expect("migrations");
        DomainIntelRepositoryImpl::new(pool)
    }

    fn intel(domain: &str) -> DomainIntelligence {
        DomainIntelligence::new(domain)
    }

    #[tokio::test]
    async fn test_upsert_and_get_round_trip() {
        let repo = setup_test_repo().await;
        let mut record = intel("hotel-sonne.example");
        record.registrar = Some("Example Registrar AG".to_string());
        record.mail_provider = Some("google".to_string());

        repo.upsert_batch(&[record]).await.expect("upsert");

        let fetched = repo
            .get("hotel-sonne.example")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(fetched.registrar.as_deref(), Some("Example Registrar AG"));
        assert_eq!(fetched.mail_provider.as_deref(), Some("google"));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let repo = setup_test_repo().await;
        let fetched = repo.get("nowhere.example").await.expect("get");
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn test_upsert_conflict_fills_gaps_and_keeps_newest_query_time() {
        let repo = setup_test_repo().await;
        let earlier = Utc::now() - Duration::hours(2);

        let mut first = intel("hotel-sonne.example");
        first.registrant_name = Some("Anna Gruber".to_string());
        first.queried_at = Utc::now();
        repo.upsert_batch(&[first.clone()]).await.expect("first upsert");

        let mut second = intel("hotel-sonne.example");
        second.registrar = Some("Example Registrar AG".to_string());
        second.queried_at = earlier;
        repo.upsert_batch(&[second]).await.expect("second upsert");

        let fetched = repo
            .get("hotel-sonne.example")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(fetched.registrant_name.as_deref(), Some("Anna Gruber"));
        assert_eq!(fetched.registrar.as_deref(), Some("Example Registrar AG"));
        assert_eq!(fetched.queried_at.to_rfc3339(), first.queried_at.to_rfc3339());
    }

    #[tokio::test]
    async fn test_fetch_many_and_count() {
        let repo = setup_test_repo().await;
        repo.upsert_batch(&[intel("a.example"), intel("b.example")])
            .await
            .expect("upsert");

        let fetched = repo
            .fetch_many(&["a.example".to_string(), "missing.example".to_string()])
            .await
            .expect("fetch");
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].domain, "a.example");

        assert_eq!(repo.count().await.expect("count"), 2);
    }
}
