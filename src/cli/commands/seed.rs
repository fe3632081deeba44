//! Implementation of the `dossier seed` command.
//!
//! Seed files are YAML lists of organization records. Each record runs
//! through entity resolution, so re-seeding the same file converges
//! instead of duplicating.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use tracing::warn;

use crate::cli::commands::open_database;
use crate::cli::output::{output, CommandOutput};
use crate::cli::progress::{create_spinner, ProgressBarExt};
use crate::domain::errors::DomainError;
use crate::domain::models::{Config, OrgStatus, OrgStub};
use crate::domain::ports::OrganizationRepository;
use crate::services::{EntityResolver, IngestOutcome};
use crate::infrastructure::database::{OrganizationRepositoryImpl, ReviewRepositoryImpl};

/// Tag recorded on organizations created by seeding.
const SEED_SOURCE: &str = "seed";

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// YAML file with organization records
    #[arg(short, long)]
    pub file: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    organizations: Vec<SeedOrg>,
}

#[derive(Debug, Deserialize)]
struct SeedOrg {
    name: String,
    #[serde(default)]
    external_id: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl SeedOrg {
    fn into_stub(self) -> OrgStub {
        OrgStub {
            external_id: self.external_id,
            name: self.name,
            domain: self.domain,
            phone: self.phone,
            address: self.address,
            city: self.city,
            region: self.region,
            country: self.country,
            source: SEED_SOURCE.to_string(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SeedOutput {
    pub file: PathBuf,
    pub total: usize,
    pub inserted: usize,
    pub merged: usize,
    pub flagged: usize,
    pub skipped: usize,
    pub queued: usize,
}

impl CommandOutput for SeedOutput {
    fn to_human(&self) -> String {
        vec![
            format!("Seeded {} organization(s) from {}", self.total, self.file.display()),
            format!("  inserted: {}", self.inserted),
            format!("  merged:   {}", self.merged),
            format!("  flagged:  {}", self.flagged),
            format!("  skipped:  {}", self.skipped),
            format!("  queued:   {}", self.queued),
        ]
        .join("\n")
    }
}

pub async fn execute(args: SeedArgs, config: &Config, json_mode: bool) -> Result<()> {
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read seed file {}", args.file.display()))?;
    let seed_file: SeedFile = serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse seed file {}", args.file.display()))?;

    let pool = open_database(config).await?;
    let orgs = Arc::new(OrganizationRepositoryImpl::new(pool.clone()));
    let reviews = Arc::new(ReviewRepositoryImpl::new(pool));
    let resolver = EntityResolver::new(
        orgs.clone(),
        reviews,
        config.resolver.fuzzy_similarity,
    );

    let total = seed_file.organizations.len();
    let spinner = create_spinner(format!("Seeding {total} organization(s)..."));

    let mut out = SeedOutput {
        file: args.file.clone(),
        total,
        inserted: 0,
        merged: 0,
        flagged: 0,
        skipped: 0,
        queued: 0,
    };

    for seed in seed_file.organizations {
        let name = seed.name.clone();
        let stub = seed.into_stub();
        match resolver.ingest(&stub).await {
            Ok(IngestOutcome::Inserted(id)) => {
                out.inserted += 1;
                orgs.update_status(id, OrgStatus::PendingEnrichment).await?;
                out.queued += 1;
            }
            Ok(IngestOutcome::InsertedWithFlag { new_org, .. }) => {
                out.inserted += 1;
                out.flagged += 1;
                orgs.update_status(new_org, OrgStatus::PendingEnrichment).await?;
                out.queued += 1;
            }
            Ok(IngestOutcome::MergedInto(id)) => {
                out.merged += 1;
                // Only lift never-queued organizations into the backlog;
                // enriched ones stay put unless retried explicitly.
                if let Some(existing) = orgs.get(id).await? {
                    if existing.status == OrgStatus::Discovered {
                        orgs.update_status(id, OrgStatus::PendingEnrichment).await?;
                        out.queued += 1;
                    }
                }
            }
            Err(DomainError::ValidationFailed(reason)) => {
                warn!(org = %name, %reason, "skipping invalid seed record");
                out.skipped += 1;
            }
            Err(err) => {
                spinner.finish_error("seeding failed");
                return Err(err).context(format!("Failed to ingest seed record '{name}'"));
            }
        }
    }

    spinner.finish_success(format!("{} queued for enrichment", out.queued));
    output(&out, json_mode);
    Ok(())
}
