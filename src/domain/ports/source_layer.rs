use crate::domain::models::{Layer, LayerFindings, Organization};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes a source layer can report.
///
/// The class decides everything downstream: whether the call is
/// retried, whether it counts toward the source's circuit breaker,
/// and how it is recorded on the enrichment state.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Infrastructure trouble: timeouts, connection resets, 5xx.
    /// Retried with backoff; counts toward the breaker.
    #[error("Transient source failure: {message}")]
    Transient { message: String },

    /// The source asked us to slow down. Retried after the hinted
    /// delay; counts toward the breaker.
    #[error("Source rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The request can never succeed: 404, auth failure, gone.
    /// Not retried, does not count toward the breaker.
    #[error("Permanent source failure: {reason}")]
    Permanent { reason: String },

    /// The source answered but the payload was unusable.
    /// Not retried, does not count toward the breaker.
    #[error("Unparseable source response: {reason}")]
    Data { reason: String },

    /// Short-circuited by an open circuit; no call was attempted.
    #[error("Circuit open for {layer}, retry after {retry_at}")]
    CircuitOpen { layer: Layer, retry_at: DateTime<Utc> },
}

impl SourceError {
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient { message: message.into() }
    }

    #[must_use]
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::Permanent { reason: reason.into() }
    }

    #[must_use]
    pub fn data(reason: impl Into<String>) -> Self {
        Self::Data { reason: reason.into() }
    }

    /// The error's class, for persistence and tallies.
    #[must_use]
    pub const fn kind(&self) -> SourceErrorKind {
        match self {
            Self::Transient { .. } => SourceErrorKind::Transient,
            Self::RateLimited { .. } => SourceErrorKind::RateLimited,
            Self::Permanent { .. } => SourceErrorKind::Permanent,
            Self::Data { .. } => SourceErrorKind::Data,
            Self::CircuitOpen { .. } => SourceErrorKind::CircuitOpen,
        }
    }

    /// Whether another attempt could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RateLimited { .. })
    }

    /// Whether this failure counts toward opening the breaker.
    #[must_use]
    pub const fn counts_toward_breaker(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RateLimited { .. })
    }
}

/// Discriminant of [`SourceError`], used in reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    Transient,
    RateLimited,
    Permanent,
    Data,
    CircuitOpen,
}

impl SourceErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::RateLimited => "rate_limited",
            Self::Permanent => "permanent",
            Self::Data => "data",
            Self::CircuitOpen => "circuit_open",
        }
    }
}

/// Port implemented by every enrichment source adapter.
///
/// Adapters receive the organization being enriched and report raw
/// findings. They classify their own failures; they never retry,
/// rate-limit or breaker-guard themselves, the orchestrator's source
/// guard does that uniformly.
#[async_trait]
pub trait SourceLayer: Send + Sync {
    /// Which layer this adapter implements.
    fn layer(&self) -> Layer;

    /// Query the source for one organization.
    async fn run(&self, org: &Organization) -> Result<LayerFindings, SourceError>;
}
