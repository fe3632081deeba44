//! Implementation of the `dossier status` command.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::commands::open_database;
use crate::cli::output::{output, CommandOutput};
use crate::cli::table::{format_enrichment_counts, format_layer_coverage, format_org_counts};
use crate::domain::models::{Config, EnrichmentStatus, Layer, OrgStatus};
use crate::domain::ports::{
    ContactRepository, DomainIntelRepository, EnrichmentRepository, OrganizationRepository,
    ReviewRepository,
};
use crate::infrastructure::database::{
    ContactRepositoryImpl, DomainIntelRepositoryImpl, EnrichmentRepositoryImpl,
    OrganizationRepositoryImpl, ReviewRepositoryImpl,
};

#[derive(Args, Debug)]
pub struct StatusArgs {}

#[derive(Debug, serde::Serialize)]
pub struct StatusOutput {
    pub org_counts: Vec<(OrgStatus, i64)>,
    pub state_counts: Vec<(EnrichmentStatus, i64)>,
    pub layer_coverage: Vec<(Layer, i64)>,
    pub tracked: i64,
    pub contacts: i64,
    pub domain_records: i64,
    pub review_flags: i64,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let mut sections = Vec::new();

        sections.push("Organizations".to_string());
        sections.push(format_org_counts(&self.org_counts));
        sections.push(String::new());
        sections.push("Enrichment queue".to_string());
        sections.push(format_enrichment_counts(&self.state_counts));
        sections.push(String::new());
        sections.push(format!("Layer coverage ({} tracked)", self.tracked));
        sections.push(format_layer_coverage(&self.layer_coverage, self.tracked));
        sections.push(String::new());
        sections.push(format!(
            "Contacts: {}  Domain records: {}  Awaiting review: {}",
            self.contacts, self.domain_records, self.review_flags,
        ));

        sections.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        let orgs: BTreeMap<&str, i64> = self
            .org_counts
            .iter()
            .map(|(status, count)| (status.as_str(), *count))
            .collect();
        let states: BTreeMap<&str, i64> = self
            .state_counts
            .iter()
            .map(|(status, count)| (status.as_str(), *count))
            .collect();
        let coverage: BTreeMap<&str, i64> = self
            .layer_coverage
            .iter()
            .map(|(layer, count)| (layer.as_str(), *count))
            .collect();

        serde_json::json!({
            "organizations": orgs,
            "enrichment": states,
            "layer_coverage": coverage,
            "tracked": self.tracked,
            "contacts": self.contacts,
            "domain_records": self.domain_records,
            "review_flags": self.review_flags,
        })
    }
}

pub async fn execute(_args: StatusArgs, config: &Config, json_mode: bool) -> Result<()> {
    let pool = open_database(config).await?;
    let orgs = Arc::new(OrganizationRepositoryImpl::new(pool.clone()));
    let contacts = Arc::new(ContactRepositoryImpl::new(pool.clone()));
    let intel = Arc::new(DomainIntelRepositoryImpl::new(pool.clone()));
    let enrichment = Arc::new(EnrichmentRepositoryImpl::new(pool.clone()));
    let reviews = Arc::new(ReviewRepositoryImpl::new(pool));

    let org_counts = orgs
        .count_by_status()
        .await
        .context("Failed to count organizations")?;
    let state_counts = enrichment
        .counts_by_status()
        .await
        .context("Failed to count enrichment states")?;
    let layer_coverage = enrichment
        .layer_coverage()
        .await
        .context("Failed to compute layer coverage")?;
    let tracked: i64 = state_counts.iter().map(|(_, count)| count).sum();

    let contacts = contacts.count().await.context("Failed to count contacts")?;
    let domain_records = intel.count().await.context("Failed to count domain records")?;
    let review_flags = reviews.count().await.context("Failed to count review flags")?;

    let out = StatusOutput {
        org_counts,
        state_counts,
        layer_coverage,
        tracked,
        contacts,
        domain_records,
        review_flags,
    };
    output(&out, json_mode);
    Ok(())
}
