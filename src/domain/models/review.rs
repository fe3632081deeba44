//! Manual-review flags raised by entity resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::findings::OrgStub;

/// A candidate duplicate pair that scored inside the review band.
///
/// The stub was inserted as its own organization; this flag records
/// that it might be the same property as `org_id` so an operator can
/// merge or dismiss the pair later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFlag {
    pub id: Uuid,
    /// The existing organization the stub resembles.
    pub org_id: Uuid,
    /// The discovery stub as reported.
    pub stub: OrgStub,
    /// Match score in [0, 1].
    pub score: f64,
    /// Name of the signal that produced the score.
    pub signal: String,
    pub created_at: DateTime<Utc>,
}

impl ReviewFlag {
    #[must_use]
    pub fn new(org_id: Uuid, stub: OrgStub, score: f64, signal: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            org_id,
            stub,
            score,
            signal: signal.into(),
            created_at: Utc::now(),
        }
    }
}
