//! Scripted source layer for demos and tests.
//!
//! Real lookups go out to registries, DNS and websites; this adapter
//! replays canned findings instead so runs are deterministic. Replies
//! are keyed by organization external id or name, with a configurable
//! default for everything else.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::models::{Layer, LayerFindings, Organization};
use crate::domain::ports::{SourceError, SourceLayer};

/// Scripted failure taxonomy, mirroring `SourceError` minus
/// `CircuitOpen` which only the guard may emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptedFailure {
    Transient {
        message: String,
    },
    RateLimited {
        #[serde(default)]
        retry_after_secs: Option<u64>,
    },
    Permanent {
        reason: String,
    },
    Data {
        reason: String,
    },
}

impl ScriptedFailure {
    fn to_source_error(&self) -> SourceError {
        match self {
            Self::Transient { message } => SourceError::transient(message.clone()),
            Self::RateLimited { retry_after_secs } => SourceError::RateLimited {
                retry_after_secs: *retry_after_secs,
            },
            Self::Permanent { reason } => SourceError::permanent(reason.clone()),
            Self::Data { reason } => SourceError::Data {
                reason: reason.clone(),
            },
        }
    }
}

/// What one scripted invocation should produce.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptedReply {
    #[serde(default)]
    pub findings: LayerFindings,
    /// When set, the invocation fails instead of returning findings.
    #[serde(default)]
    pub fail: Option<ScriptedFailure>,
}

impl ScriptedReply {
    #[must_use]
    pub fn success(findings: LayerFindings) -> Self {
        Self {
            findings,
            fail: None,
        }
    }

    #[must_use]
    pub fn failure(failure: ScriptedFailure) -> Self {
        Self {
            findings: LayerFindings::default(),
            fail: Some(failure),
        }
    }

    fn resolve(&self) -> Result<LayerFindings, SourceError> {
        match &self.fail {
            Some(failure) => Err(failure.to_source_error()),
            None => Ok(self.findings.clone()),
        }
    }
}

/// Deterministic `SourceLayer` driven by canned replies.
#[derive(Debug)]
pub struct ScriptedLayer {
    layer: Layer,
    default_reply: ScriptedReply,
    overrides: RwLock<HashMap<String, ScriptedReply>>,
    invocations: AtomicUsize,
}

impl ScriptedLayer {
    #[must_use]
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            default_reply: ScriptedReply::default(),
            overrides: RwLock::new(HashMap::new()),
            invocations: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_default_reply(mut self, reply: ScriptedReply) -> Self {
        self.default_reply = reply;
        self
    }

    #[must_use]
    pub fn with_replies(self, replies: HashMap<String, ScriptedReply>) -> Self {
        Self {
            overrides: RwLock::new(replies),
            ..self
        }
    }

    /// Set the reply for one organization, keyed by external id or name.
    pub async fn set_reply_for(&self, key: impl Into<String>, reply: ScriptedReply) {
        let mut overrides = self.overrides.write().await;
        overrides.insert(key.into(), reply);
    }

    /// How many times `run` was called, across all organizations.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::Relaxed)
    }

    async fn reply_for(&self, org: &Organization) -> ScriptedReply {
        let overrides = self.overrides.read().await;
        if let Some(external_id) = &org.external_id {
            if let Some(reply) = overrides.get(external_id) {
                return reply.clone();
            }
        }
        overrides
            .get(&org.name)
            .cloned()
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

#[async_trait]
impl SourceLayer for ScriptedLayer {
    fn layer(&self) -> Layer {
        self.layer
    }

    async fn run(&self, org: &Organization) -> Result<LayerFindings, SourceError> {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.reply_for(org).await.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ContactFact;

    fn findings_with_contact(name: &str) -> LayerFindings {
        LayerFindings {
            contacts: vec![ContactFact::new(name, "General Manager", Layer::PageScrape)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_default_reply_is_empty_success() {
        let layer = ScriptedLayer::new(Layer::Whois);
        let org = Organization::new("Hotel Sonne");

        let findings = layer.run(&org).await.unwrap();

        assert!(findings.is_empty());
        assert_eq!(layer.invocations(), 1);
    }

    #[tokio::test]
    async fn test_override_by_name_beats_default() {
        let layer = ScriptedLayer::new(Layer::PageScrape)
            .with_default_reply(ScriptedReply::success(findings_with_contact("Default Person")));
        layer
            .set_reply_for(
                "Hotel Sonne",
                ScriptedReply::success(findings_with_contact("Anna Gruber")),
            )
            .await;

        let matched = layer.run(&Organization::new("Hotel Sonne")).await.unwrap();
        assert_eq!(matched.contacts[0].full_name, "Anna Gruber");

        let unmatched = layer.run(&Organization::new("Hotel Post")).await.unwrap();
        assert_eq!(unmatched.contacts[0].full_name, "Default Person");
    }

    #[tokio::test]
    async fn test_override_by_external_id_beats_name() {
        let layer = ScriptedLayer::new(Layer::GovRegistry);
        layer
            .set_reply_for("CHE-123", ScriptedReply::success(findings_with_contact("By Id")))
            .await;
        layer
            .set_reply_for(
                "Hotel Sonne",
                ScriptedReply::success(findings_with_contact("By Name")),
            )
            .await;

        let org = Organization::new("Hotel Sonne").with_external_id("CHE-123");
        let findings = layer.run(&org).await.unwrap();

        assert_eq!(findings.contacts[0].full_name, "By Id");
    }

    #[tokio::test]
    async fn test_scripted_failure_maps_to_source_error() {
        let layer = ScriptedLayer::new(Layer::Dns).with_default_reply(ScriptedReply::failure(
            ScriptedFailure::RateLimited {
                retry_after_secs: Some(3),
            },
        ));

        let err = layer.run(&Organization::new("Hotel Sonne")).await.unwrap_err();

        assert!(matches!(
            err,
            SourceError::RateLimited {
                retry_after_secs: Some(3)
            }
        ));
    }
}
