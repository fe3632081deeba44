//! Source layer adapters.
//!
//! The shipped adapters are scripted: they replay fixture findings so
//! runs stay deterministic and offline. Network-backed adapters plug in
//! through the same `SourceLayer` port.

pub mod fixture;
pub mod scripted;

use std::path::Path;
use std::sync::Arc;

use crate::domain::models::config::SourcesConfig;
use crate::domain::ports::SourceLayer;

pub use fixture::{FixtureError, FixtureFile, LayerScript};
pub use scripted::{ScriptedFailure, ScriptedLayer, ScriptedReply};

/// Build the adapter set for a run.
///
/// With a fixture file configured the layers replay its script;
/// otherwise every layer replies with empty findings, which still
/// exercises claiming, state transitions and persistence.
pub fn build_source_layers(
    sources: &SourcesConfig,
) -> Result<Vec<Arc<dyn SourceLayer>>, FixtureError> {
    let fixture = match &sources.fixture_file {
        Some(path) => FixtureFile::load(Path::new(path))?,
        None => FixtureFile::default(),
    };
    let layers = fixture.into_layers()?;
    Ok(layers.into_iter().map(|l| l as Arc<dyn SourceLayer>).collect())
}
