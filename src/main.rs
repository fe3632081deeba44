//! Dossier CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dossier::cli::{handle_error, Cli, Commands};
use dossier::domain::models::LoggingConfig;
use dossier::infrastructure::config::ConfigLoader;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));
    if logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    init_tracing(&config.logging);

    let result = match cli.command {
        Commands::Init(args) => dossier::cli::commands::init::execute(args, cli.json).await,
        Commands::Seed(args) => dossier::cli::commands::seed::execute(args, &config, cli.json).await,
        Commands::Run(args) => dossier::cli::commands::run::execute(args, &config, cli.json).await,
        Commands::Status(args) => {
            dossier::cli::commands::status::execute(args, &config, cli.json).await
        }
        Commands::Retry(args) => {
            dossier::cli::commands::retry::execute(args, &config, cli.json).await
        }
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
