//! CLI surface: argument parsing, command dispatch and output.

pub mod commands;
pub mod output;
pub mod progress;
pub mod table;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dossier")]
#[command(about = "Dossier - decision-maker enrichment for organization records", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Path to a config file (default: .dossier/config.yaml hierarchy)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the .dossier directory, config and database
    Init(commands::init::InitArgs),

    /// Load organization seed records into the backlog
    Seed(commands::seed::SeedArgs),

    /// Claim queued organizations and run enrichment layers
    Run(commands::run::RunArgs),

    /// Show queue depth, layer coverage and review backlog
    Status(commands::status::StatusArgs),

    /// Requeue organizations for another enrichment pass
    Retry(commands::retry::RetryArgs),
}

/// Print a command failure and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
