//! YAML fixture loading for scripted source layers.
//!
//! A fixture file scripts any subset of the layers:
//!
//! ```yaml
//! layers:
//!   gov_registry:
//!     orgs:
//!       "Hotel Sonne":
//!         findings:
//!           contacts:
//!             - full_name: "Anna Gruber"
//!               title: "Managing Director"
//!               confidence: 0.75
//!               source: gov_registry
//!   dns:
//!     default:
//!       fail:
//!         kind: transient
//!         message: "resolver down"
//! ```
//!
//! Layers absent from the file reply with empty findings.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::scripted::{ScriptedLayer, ScriptedReply};
use crate::domain::models::Layer;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to read fixture file {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse fixture file {path}: {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unknown layer '{0}' in fixture file")]
    UnknownLayer(String),
}

/// Scripted replies for one layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerScript {
    /// Reply for organizations without an entry under `orgs`.
    #[serde(default)]
    pub default: Option<ScriptedReply>,
    /// Replies keyed by organization external id or name.
    #[serde(default)]
    pub orgs: HashMap<String, ScriptedReply>,
}

/// Parsed fixture file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureFile {
    #[serde(default)]
    pub layers: HashMap<String, LayerScript>,
}

impl FixtureFile {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let text = std::fs::read_to_string(path).map_err(|source| FixtureError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| FixtureError::ParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    /// Build one scripted adapter per layer. Layers the file does not
    /// mention reply with empty findings.
    pub fn into_layers(mut self) -> Result<Vec<Arc<ScriptedLayer>>, FixtureError> {
        for name in self.layers.keys() {
            if Layer::from_str(name).is_none() {
                return Err(FixtureError::UnknownLayer(name.clone()));
            }
        }

        let mut layers = Vec::with_capacity(Layer::ALL.len());
        for layer in Layer::ALL {
            let script = self.layers.remove(layer.as_str()).unwrap_or_default();
            let mut scripted = ScriptedLayer::new(layer).with_replies(script.orgs);
            if let Some(default) = script.default {
                scripted = scripted.with_default_reply(default);
            }
            layers.push(Arc::new(scripted));
        }
        Ok(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::domain::models::Organization;
    use crate::domain::ports::{SourceError, SourceLayer};

    fn write_fixture(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(yaml.as_bytes()).expect("write fixture");
        file
    }

    #[tokio::test]
    async fn test_load_and_script_layers() {
        let file = write_fixture(
            r#"
layers:
  gov_registry:
    orgs:
      "Hotel Sonne":
        findings:
          contacts:
            - full_name: "Anna Gruber"
              title: "Managing Director"
              confidence: 0.75
              source: gov_registry
  dns:
    default:
      fail:
        kind: transient
        message: "resolver down"
"#,
        );

        let fixture = FixtureFile::load(file.path()).expect("load");
        let layers = fixture.into_layers().expect("layers");
        assert_eq!(layers.len(), Layer::ALL.len());

        let registry = layers
            .iter()
            .find(|l| l.layer() == Layer::GovRegistry)
            .expect("registry layer");
        let findings = registry
            .run(&Organization::new("Hotel Sonne"))
            .await
            .expect("run");
        assert_eq!(findings.contacts.len(), 1);
        assert_eq!(findings.contacts[0].full_name, "Anna Gruber");

        let dns = layers
            .iter()
            .find(|l| l.layer() == Layer::Dns)
            .expect("dns layer");
        let err = dns.run(&Organization::new("Hotel Sonne")).await.unwrap_err();
        assert!(matches!(err, SourceError::Transient { .. }));

        // Unmentioned layers reply with empty findings.
        let whois = layers
            .iter()
            .find(|l| l.layer() == Layer::Whois)
            .expect("whois layer");
        let empty = whois
            .run(&Organization::new("Hotel Sonne"))
            .await
            .expect("run");
        assert!(empty.is_empty());
    }

    #[test]
    fn test_unknown_layer_rejected() {
        let file = write_fixture("layers:\n  astrology:\n    orgs: {}\n");
        let fixture = FixtureFile::load(file.path()).expect("load");
        let err = fixture.into_layers().unwrap_err();
        assert!(matches!(err, FixtureError::UnknownLayer(name) if name == "astrology"));
    }

    #[test]
    fn test_missing_file_errors() {
        let err = FixtureFile::load(Path::new("/does/not/exist.yaml")).unwrap_err();
        assert!(matches!(err, FixtureError::ReadFailed { .. }));
    }
}
