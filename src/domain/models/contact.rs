//! Decision-maker contact records and their identity key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::findings::ContactFact;
use crate::domain::normalize::{canonical_name, canonical_title};

/// Identity of a contact within one organization.
///
/// Two facts with the same key describe the same person and merge
/// into one record. The key uses normalized forms, so "GM" and
/// "General Manager" collide on purpose.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContactKey {
    pub org_id: Uuid,
    pub normalized_name: String,
    pub normalized_title: String,
}

impl ContactKey {
    #[must_use]
    pub fn new(org_id: Uuid, name: &str, title: &str) -> Self {
        Self {
            org_id,
            normalized_name: canonical_name(name),
            normalized_title: canonical_title(title),
        }
    }
}

/// A golden decision-maker record.
///
/// One row per (organization, person, role). Fields accumulate across
/// sources under the merge rules; nothing here is ever blanked out by
/// a later, emptier sighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionMaker {
    pub id: Uuid,
    pub org_id: Uuid,
    /// Name as first reported (display form).
    pub full_name: String,
    /// Folded name, part of the identity key.
    pub normalized_name: String,
    /// Title as first reported (display form).
    pub title: String,
    /// Folded, synonym-collapsed title, part of the identity key.
    pub normalized_title: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Sticky verification flag; once true it stays true.
    pub email_verified: bool,
    /// Sorted set of layer tags that contributed to this record.
    pub sources: Vec<String>,
    /// Highest confidence any contributing source reported.
    pub confidence: f64,
    /// Page or record of the first sighting; later URLs never displace it.
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DecisionMaker {
    /// Create a fresh record from a single fact.
    #[must_use]
    pub fn from_fact(org_id: Uuid, fact: &ContactFact) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            org_id,
            full_name: fact.full_name.trim().to_string(),
            normalized_name: canonical_name(&fact.full_name),
            title: fact.title.trim().to_string(),
            normalized_title: canonical_title(&fact.title),
            email: trimmed_non_empty(fact.email.as_deref()),
            phone: trimmed_non_empty(fact.phone.as_deref()),
            email_verified: fact.email_verified,
            sources: vec![fact.source.as_str().to_string()],
            confidence: fact.confidence.clamp(0.0, 1.0),
            source_url: trimmed_non_empty(fact.source_url.as_deref()),
            created_at: now,
            updated_at: now,
        }
    }

    /// The record's identity key.
    #[must_use]
    pub fn key(&self) -> ContactKey {
        ContactKey {
            org_id: self.org_id,
            normalized_name: self.normalized_name.clone(),
            normalized_title: self.normalized_title.clone(),
        }
    }

    /// Validate invariants before persisting.
    pub fn validate(&self) -> Result<(), String> {
        if self.normalized_name.is_empty() {
            return Err("contact name normalizes to empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence out of range: {}", self.confidence));
        }
        Ok(())
    }
}

fn trimmed_non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
