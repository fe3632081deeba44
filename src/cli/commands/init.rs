//! Implementation of the `dossier init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::database::initialize_database;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force reinitialization even if already initialized
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub config_written: bool,
    pub database_initialized: bool,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.config_written {
            lines.push("Wrote default config to .dossier/config.yaml".to_string());
        }
        if self.database_initialized {
            lines.push("Database initialized at .dossier/dossier.db".to_string());
        }
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let dossier_dir = target_path.join(".dossier");

    if dossier_dir.exists() && !args.force {
        let out = InitOutput {
            success: false,
            message: "Already initialized. Use --force to reinitialize.".to_string(),
            initialized_path: target_path,
            config_written: false,
            database_initialized: false,
        };
        output(&out, json_mode);
        return Ok(());
    }

    if args.force && dossier_dir.exists() {
        fs::remove_dir_all(&dossier_dir)
            .await
            .context("Failed to remove existing .dossier directory")?;
    }

    fs::create_dir_all(&dossier_dir)
        .await
        .with_context(|| format!("Failed to create {}", dossier_dir.display()))?;

    // Written config mirrors the compiled-in defaults so operators have
    // something concrete to edit.
    let config_path = dossier_dir.join("config.yaml");
    let config_written = if config_path.exists() {
        false
    } else {
        let rendered = serde_yaml::to_string(&Config::default())
            .context("Failed to render default config")?;
        fs::write(&config_path, rendered)
            .await
            .context("Failed to write default config")?;
        true
    };

    let db_path = dossier_dir.join("dossier.db");
    let db_url = format!("sqlite:{}", db_path.display());
    initialize_database(&db_url)
        .await
        .context("Failed to initialize database")?;

    let out = InitOutput {
        success: true,
        message: if args.force {
            "Reinitialized successfully.".to_string()
        } else {
            "Initialized successfully.".to_string()
        },
        initialized_path: target_path,
        config_written,
        database_initialized: true,
    };
    output(&out, json_mode);
    Ok(())
}
