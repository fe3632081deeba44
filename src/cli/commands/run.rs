//! Implementation of the `dossier run` command.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::cli::commands::open_database;
use crate::cli::output::{output, CommandOutput};
use crate::cli::progress::{create_spinner, ProgressBarExt};
use crate::cli::table::format_layer_summary;
use crate::domain::models::{Config, Layer};
use crate::infrastructure::database::{
    ContactRepositoryImpl, DomainIntelRepositoryImpl, EnrichmentRepositoryImpl,
    OrganizationRepositoryImpl, ReviewRepositoryImpl,
};
use crate::infrastructure::sources::build_source_layers;
use crate::services::{
    EnrichmentPipeline, EntityResolver, LayerOrchestrator, PipelineOptions, RunOptions,
    RunSummary, SourceGuardRegistry, WorkClaimer,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Stop after this many organizations
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Organizations claimed per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Run only this layer
    #[arg(long)]
    pub layer: Option<String>,

    /// Re-run layers that already completed
    #[arg(long)]
    pub force_refresh: bool,

    /// Peek at the queue and call sources, but write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Worker id recorded on claims (defaults to a per-process id)
    #[arg(long)]
    pub worker_id: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    pub summary: RunSummary,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let s = &self.summary;
        let mut lines = Vec::new();

        if s.dry_run {
            lines.push("Dry run: nothing was claimed or written.".to_string());
        }
        lines.push(format!(
            "Processed {} organization(s) in {:.1}s: {} complete, {} without results.",
            s.orgs_processed,
            s.duration_ms as f64 / 1000.0,
            s.orgs_complete,
            s.orgs_no_results,
        ));
        lines.push(format!(
            "Contacts written: {}  Domain records: {}  State rows: {}",
            s.contacts_written, s.intel_written, s.states_written,
        ));
        if s.stubs_found > 0 {
            lines.push(format!(
                "Discovered stubs: {} found, {} merged, {} inserted ({} flagged for review)",
                s.stubs_found, s.stubs_merged, s.stubs_inserted, s.stubs_flagged,
            ));
        }
        if !s.layers.is_empty() {
            lines.push(String::new());
            lines.push(format_layer_summary(&s.layers));
        }

        lines.join("\n")
    }
}

pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<()> {
    let mut run_config = config.run.clone();
    if let Some(batch_size) = args.batch_size {
        run_config.batch_size = batch_size;
    }
    if args.worker_id.is_some() {
        run_config.worker_id = args.worker_id.clone();
    }

    let only_layer = match &args.layer {
        Some(name) => Some(
            Layer::from_str(name)
                .with_context(|| format!("Unknown layer '{name}'"))?,
        ),
        None => None,
    };

    let pool = open_database(config).await?;
    let orgs = Arc::new(OrganizationRepositoryImpl::new(pool.clone()));
    let contacts = Arc::new(ContactRepositoryImpl::new(pool.clone()));
    let intel = Arc::new(DomainIntelRepositoryImpl::new(pool.clone()));
    let enrichment = Arc::new(EnrichmentRepositoryImpl::new(pool.clone()));
    let reviews = Arc::new(ReviewRepositoryImpl::new(pool));

    let adapters = build_source_layers(&config.sources)
        .context("Failed to build source layers")?;
    let disabled: HashSet<Layer> = config
        .sources
        .disabled
        .iter()
        .filter_map(|name| Layer::from_str(name))
        .collect();
    let guards = Arc::new(SourceGuardRegistry::new(&config.guard));

    let worker_id = run_config
        .worker_id
        .clone()
        .unwrap_or_else(|| format!("dossier-{}", std::process::id()));

    let claimer = WorkClaimer::new(
        orgs.clone(),
        enrichment.clone(),
        worker_id,
        run_config.claim_stale_secs,
    );
    let orchestrator = LayerOrchestrator::new(
        adapters,
        guards,
        run_config.layer_timeout_secs,
        config.retry.clone(),
    )
    .with_disabled(disabled);
    let resolver = EntityResolver::new(orgs.clone(), reviews, config.resolver.fuzzy_similarity);

    let pipeline = EnrichmentPipeline::new(
        claimer,
        orchestrator,
        resolver,
        orgs,
        contacts,
        intel,
        enrichment,
        run_config,
    );

    let options = PipelineOptions {
        run: RunOptions {
            force_refresh: args.force_refresh,
            only_layer,
        },
        limit: args.limit,
        dry_run: args.dry_run,
    };

    let spinner = create_spinner("Enriching organizations...");
    let summary = match pipeline.run(options).await {
        Ok(summary) => summary,
        Err(err) => {
            spinner.finish_error("enrichment run failed");
            return Err(err).context("Enrichment run failed");
        }
    };
    spinner.finish_success(format!("{} organization(s) processed", summary.orgs_processed));

    let clean = summary.is_clean();
    let failures = summary.layer_failures;
    output(&RunOutput { summary }, json_mode);

    if !clean {
        bail!("run recorded {failures} failed layer attempt(s)");
    }
    Ok(())
}
