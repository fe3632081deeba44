use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration structure for dossier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Enrichment run configuration
    #[serde(default)]
    pub run: RunConfig,

    /// Per-attempt retry policy for layer calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Source guard configuration (concurrency, rate, circuit breaker)
    #[serde(default)]
    pub guard: GuardConfig,

    /// Entity resolution configuration
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Source layer configuration
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".dossier/dossier.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Enrichment run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunConfig {
    /// Organizations claimed per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Organizations enriched concurrently within a batch
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Buffered organization outcomes per persistence flush
    #[serde(default = "default_buffer_threshold")]
    pub buffer_threshold: usize,

    /// Wall-clock budget per layer call, including retries, in seconds
    #[serde(default = "default_layer_timeout_secs")]
    pub layer_timeout_secs: u64,

    /// Age after which an in-progress claim counts as abandoned, in seconds
    #[serde(default = "default_claim_stale_secs")]
    pub claim_stale_secs: u64,

    /// Worker identifier; defaults to host and process id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
}

const fn default_batch_size() -> usize {
    25
}

const fn default_max_in_flight() -> usize {
    4
}

const fn default_buffer_threshold() -> usize {
    50
}

const fn default_layer_timeout_secs() -> u64 {
    20
}

const fn default_claim_stale_secs() -> u64 {
    1800
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_in_flight: default_max_in_flight(),
            buffer_threshold: default_buffer_threshold(),
            layer_timeout_secs: default_layer_timeout_secs(),
            claim_stale_secs: default_claim_stale_secs(),
            worker_id: None,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Total time spent retrying one layer call before giving up, in seconds
    #[serde(default = "default_max_elapsed_secs")]
    pub max_elapsed_secs: u64,
}

const fn default_initial_backoff_ms() -> u64 {
    250
}

const fn default_max_backoff_ms() -> u64 {
    4000
}

const fn default_max_elapsed_secs() -> u64 {
    15
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_elapsed_secs: default_max_elapsed_secs(),
        }
    }
}

/// Source guard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GuardConfig {
    /// Defaults applied to every source layer
    #[serde(default)]
    pub defaults: SourceGuardConfig,

    /// Per-layer overrides, keyed by layer id
    #[serde(default)]
    pub overrides: HashMap<String, SourceGuardConfig>,
}

/// Guard settings for one source layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceGuardConfig {
    /// Maximum concurrent calls to the source
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Steady request rate allowed against the source
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Burst size for the token bucket
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,

    /// Consecutive counted failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before a half-open trial
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

const fn default_max_concurrent() -> usize {
    4
}

const fn default_requests_per_second() -> u32 {
    5
}

const fn default_burst_size() -> u32 {
    10
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_cooldown_secs() -> u64 {
    60
}

impl Default for SourceGuardConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

/// Entity resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResolverConfig {
    /// Jaro-Winkler similarity required for a fuzzy name match
    #[serde(default = "default_fuzzy_similarity")]
    pub fuzzy_similarity: f64,
}

const fn default_fuzzy_similarity() -> f64 {
    0.87
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_similarity: default_fuzzy_similarity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Source layer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourcesConfig {
    /// Layer ids to skip entirely
    #[serde(default)]
    pub disabled: Vec<String>,

    /// Path to a scripted-findings fixture file; when set, every layer
    /// is served from the fixture instead of a live adapter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture_file: Option<String>,
}
