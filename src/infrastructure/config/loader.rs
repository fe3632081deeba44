use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::{Config, SourceGuardConfig};
use crate::domain::models::Layer;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid batch_size: {0}. Must be at least 1")]
    InvalidBatchSize(usize),

    #[error("Invalid buffer_threshold: {0}. Must be at least 1")]
    InvalidBufferThreshold(usize),

    #[error("Invalid layer_timeout_secs: {0}. Must be at least 1")]
    InvalidLayerTimeout(u64),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid fuzzy_similarity: {0}. Must be between 0.0 and 1.0")]
    InvalidSimilarity(f64),

    #[error("Unknown source layer: {0}")]
    UnknownSource(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .dossier/config.yaml (project config, created by init)
    /// 3. .dossier/local.yaml (project local overrides, optional)
    /// 4. Environment variables (`DOSSIER_*` prefix, highest priority)
    ///
    /// Configuration is always project-local (pwd/.dossier/) so
    /// several databases can live on one machine.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".dossier/config.yaml"))
            .merge(Yaml::file(".dossier/local.yaml"))
            .merge(Env::prefixed("DOSSIER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("DOSSIER_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.run.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(config.run.batch_size));
        }
        if config.run.buffer_threshold == 0 {
            return Err(ConfigError::InvalidBufferThreshold(
                config.run.buffer_threshold,
            ));
        }
        if config.run.layer_timeout_secs == 0 {
            return Err(ConfigError::InvalidLayerTimeout(
                config.run.layer_timeout_secs,
            ));
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        if !(0.0..=1.0).contains(&config.resolver.fuzzy_similarity) {
            return Err(ConfigError::InvalidSimilarity(
                config.resolver.fuzzy_similarity,
            ));
        }

        Self::validate_guard("defaults", &config.guard.defaults)?;
        for (name, guard) in &config.guard.overrides {
            if Layer::from_str(name).is_none() {
                return Err(ConfigError::UnknownSource(name.clone()));
            }
            Self::validate_guard(name, guard)?;
        }

        for name in &config.sources.disabled {
            if Layer::from_str(name).is_none() {
                return Err(ConfigError::UnknownSource(name.clone()));
            }
        }

        Ok(())
    }

    fn validate_guard(name: &str, guard: &SourceGuardConfig) -> Result<(), ConfigError> {
        if guard.max_concurrent == 0 {
            return Err(ConfigError::ValidationFailed(format!(
                "Guard '{name}': max_concurrent must be at least 1"
            )));
        }
        if guard.requests_per_second == 0 {
            return Err(ConfigError::ValidationFailed(format!(
                "Guard '{name}': requests_per_second must be at least 1"
            )));
        }
        if guard.burst_size == 0 {
            return Err(ConfigError::ValidationFailed(format!(
                "Guard '{name}': burst_size must be at least 1"
            )));
        }
        if guard.failure_threshold == 0 {
            return Err(ConfigError::ValidationFailed(format!(
                "Guard '{name}': failure_threshold must be at least 1"
            )));
        }
        Ok(())
    }
}
