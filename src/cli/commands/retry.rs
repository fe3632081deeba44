//! Implementation of the `dossier retry` command.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::cli::commands::open_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, Layer};
use crate::domain::ports::EnrichmentRepository;
use crate::infrastructure::database::EnrichmentRepositoryImpl;

#[derive(Args, Debug)]
pub struct RetryArgs {
    /// Re-queue organizations missing this layer's completed bit
    #[arg(long, value_name = "LAYER")]
    pub missing_layer: Option<String>,

    /// Re-queue organizations whose last attempt had failed layers
    #[arg(long)]
    pub failed: bool,

    /// Clear this layer's completed bit and re-queue the affected rows
    #[arg(long, value_name = "LAYER")]
    pub reset_layer: Option<String>,

    /// Touch at most this many organizations
    #[arg(short, long)]
    pub limit: Option<i64>,
}

#[derive(Debug, serde::Serialize)]
pub struct RetryOutput {
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    pub affected: u64,
}

impl CommandOutput for RetryOutput {
    fn to_human(&self) -> String {
        match (self.mode.as_str(), &self.layer) {
            ("missing_layer", Some(layer)) => format!(
                "Re-queued {} organization(s) missing layer '{layer}'",
                self.affected
            ),
            ("reset_layer", Some(layer)) => format!(
                "Reset layer '{layer}' on {} organization(s) and re-queued them",
                self.affected
            ),
            _ => format!(
                "Re-queued {} organization(s) with failed layers",
                self.affected
            ),
        }
    }
}

fn parse_layer(name: &str) -> Result<Layer> {
    Layer::from_str(name).with_context(|| format!("Unknown layer '{name}'"))
}

pub async fn execute(args: RetryArgs, config: &Config, json_mode: bool) -> Result<()> {
    let modes = usize::from(args.missing_layer.is_some())
        + usize::from(args.failed)
        + usize::from(args.reset_layer.is_some());
    if modes == 0 {
        bail!("Specify one of --missing-layer <LAYER>, --failed, or --reset-layer <LAYER>");
    }
    if modes > 1 {
        bail!("--missing-layer, --failed, and --reset-layer are mutually exclusive");
    }

    let limit = args.limit.unwrap_or(-1);
    let pool = open_database(config).await?;
    let enrichment = Arc::new(EnrichmentRepositoryImpl::new(pool));

    let out = if let Some(name) = &args.missing_layer {
        let layer = parse_layer(name)?;
        let affected = enrichment
            .requeue_missing_layer(layer, limit)
            .await
            .context("Failed to re-queue organizations")?;
        RetryOutput {
            mode: "missing_layer".to_string(),
            layer: Some(layer.as_str().to_string()),
            affected,
        }
    } else if let Some(name) = &args.reset_layer {
        let layer = parse_layer(name)?;
        let affected = enrichment
            .reset_layer(layer, limit)
            .await
            .context("Failed to reset layer")?;
        RetryOutput {
            mode: "reset_layer".to_string(),
            layer: Some(layer.as_str().to_string()),
            affected,
        }
    } else {
        let affected = enrichment
            .requeue_failed(limit)
            .await
            .context("Failed to re-queue organizations")?;
        RetryOutput {
            mode: "failed".to_string(),
            layer: None,
            affected,
        }
    };

    output(&out, json_mode);
    Ok(())
}
