//! Golden organization records and their coarse lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::findings::OrgStub;
use crate::domain::normalize::canonicalize_domain;

/// Coarse lifecycle of an organization record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgStatus {
    /// Known to exist, not yet queued for enrichment.
    Discovered,
    /// Queued; the claim loop will pick it up.
    PendingEnrichment,
    /// At least one enrichment pass has finished.
    Enriched,
    /// Manually ruled out; never enriched again.
    Rejected,
}

impl Default for OrgStatus {
    fn default() -> Self {
        Self::Discovered
    }
}

impl OrgStatus {
    /// Stable string form used in the database and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::PendingEnrichment => "pending_enrichment",
            Self::Enriched => "enriched",
            Self::Rejected => "rejected",
        }
    }

    /// Parse a status from its string form.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(Self::Discovered),
            "pending_enrichment" => Some(Self::PendingEnrichment),
            "enriched" => Some(Self::Enriched),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Statuses this one may legally move to.
    #[must_use]
    pub fn valid_transitions(self) -> Vec<Self> {
        match self {
            Self::Discovered => vec![Self::PendingEnrichment, Self::Rejected],
            Self::PendingEnrichment => vec![Self::Enriched, Self::Rejected],
            Self::Enriched => vec![Self::PendingEnrichment, Self::Rejected],
            Self::Rejected => vec![],
        }
    }

    /// Whether a transition to `target` is allowed.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        self.valid_transitions().contains(&target)
    }
}

/// A golden organization record.
///
/// One row per real-world property. Identity fields (`external_id`,
/// `domain`, `phone`, name and address) feed entity resolution;
/// everything is filled non-destructively as sources report in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    /// Unique identifier.
    pub id: Uuid,
    /// Identifier in an authoritative external registry, if known.
    pub external_id: Option<String>,
    /// Display name as first reported.
    pub name: String,
    /// Canonical web domain (no scheme, no `www.`).
    pub domain: Option<String>,
    /// Phone number as reported; digits are compared, not formatting.
    pub phone: Option<String>,
    /// Street address.
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    /// Lifecycle status.
    pub status: OrgStatus,
    /// Union of every source tag that has contributed to this record.
    pub source_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// Create a new organization with just a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external_id: None,
            name: name.into(),
            domain: None,
            phone: None,
            address: None,
            city: None,
            region: None,
            country: None,
            status: OrgStatus::Discovered,
            source_tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build an organization from a discovery stub, queued for
    /// enrichment and tagged with the discovering source.
    #[must_use]
    pub fn from_stub(stub: &OrgStub) -> Self {
        let mut org = Self::new(stub.name.clone());
        org.external_id = non_empty(stub.external_id.as_deref());
        org.domain = stub.domain.as_deref().and_then(canonicalize_domain);
        org.phone = non_empty(stub.phone.as_deref());
        org.address = non_empty(stub.address.as_deref());
        org.city = non_empty(stub.city.as_deref());
        org.region = non_empty(stub.region.as_deref());
        org.country = non_empty(stub.country.as_deref());
        org.status = OrgStatus::PendingEnrichment;
        org.source_tags = vec![stub.source.clone()];
        org
    }

    /// Set the canonical domain, folding whatever form was supplied.
    #[must_use]
    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = canonicalize_domain(domain);
        self
    }

    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    #[must_use]
    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: OrgStatus) -> Self {
        self.status = status;
        self
    }

    /// Move to a new lifecycle status, enforcing legal transitions.
    pub fn transition_to(&mut self, target: OrgStatus) -> Result<(), String> {
        if self.status == target {
            return Ok(());
        }
        if !self.status.can_transition_to(target) {
            return Err(format!(
                "cannot transition organization from {} to {}",
                self.status.as_str(),
                target.as_str()
            ));
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Fold a matched stub into this record.
    ///
    /// Identity and address fields fill empty slots only; existing
    /// values are never overwritten. Source tags are set-unioned.
    /// Returns whether anything changed.
    pub fn absorb_stub(&mut self, stub: &OrgStub) -> bool {
        let mut changed = false;
        changed |= fill_empty(&mut self.external_id, stub.external_id.as_deref());
        if self.domain.is_none() {
            if let Some(domain) = stub.domain.as_deref().and_then(canonicalize_domain) {
                self.domain = Some(domain);
                changed = true;
            }
        }
        changed |= fill_empty(&mut self.phone, stub.phone.as_deref());
        changed |= fill_empty(&mut self.address, stub.address.as_deref());
        changed |= fill_empty(&mut self.city, stub.city.as_deref());
        changed |= fill_empty(&mut self.region, stub.region.as_deref());
        changed |= fill_empty(&mut self.country, stub.country.as_deref());
        if !self.source_tags.iter().any(|t| t == &stub.source) {
            self.source_tags.push(stub.source.clone());
            self.source_tags.sort();
            changed = true;
        }
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }

    /// Validate invariants before persisting.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("organization name cannot be empty".to_string());
        }
        if let Some(domain) = &self.domain {
            if canonicalize_domain(domain).as_deref() != Some(domain.as_str()) {
                return Err(format!("domain is not in canonical form: {domain}"));
            }
        }
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn fill_empty(slot: &mut Option<String>, incoming: Option<&str>) -> bool {
    if slot.is_none() {
        if let Some(value) = non_empty(incoming) {
            *slot = Some(value);
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stub() -> OrgStub {
        OrgStub {
            external_id: Some("HR-1122".to_string()),
            name: "Hotel Sonne".to_string(),
            domain: Some("https://www.hotel-sonne.example".to_string()),
            phone: Some("+41 81 555 12 34".to_string()),
            address: Some("Dorfstrasse 1".to_string()),
            city: Some("Chur".to_string()),
            region: None,
            country: Some("CH".to_string()),
            source: "gov_registry".to_string(),
        }
    }

    #[test]
    fn test_new_defaults() {
        let org = Organization::new("Hotel Sonne");
        assert_eq!(org.status, OrgStatus::Discovered);
        assert!(org.domain.is_none());
        assert!(org.source_tags.is_empty());
    }

    #[test]
    fn test_from_stub_canonicalizes_and_queues() {
        let org = Organization::from_stub(&sample_stub());
        assert_eq!(org.status, OrgStatus::PendingEnrichment);
        assert_eq!(org.domain.as_deref(), Some("hotel-sonne.example"));
        assert_eq!(org.source_tags, vec!["gov_registry".to_string()]);
    }

    #[test]
    fn test_status_transitions() {
        let mut org = Organization::new("Hotel Sonne");
        assert!(org.transition_to(OrgStatus::PendingEnrichment).is_ok());
        assert!(org.transition_to(OrgStatus::Enriched).is_ok());
        // Enriched records can be re-queued.
        assert!(org.transition_to(OrgStatus::PendingEnrichment).is_ok());
        org.status = OrgStatus::Rejected;
        assert!(org.transition_to(OrgStatus::PendingEnrichment).is_err());
    }

    #[test]
    fn test_transition_to_same_status_is_noop() {
        let mut org = Organization::new("Hotel Sonne");
        assert!(org.transition_to(OrgStatus::Discovered).is_ok());
    }

    #[test]
    fn test_absorb_stub_fills_empty_only() {
        let mut org = Organization::new("Hotel Sonne")
            .with_phone("+41 81 555 99 99")
            .with_status(OrgStatus::PendingEnrichment);
        let changed = org.absorb_stub(&sample_stub());
        assert!(changed);
        // Existing phone survives, empty fields fill in.
        assert_eq!(org.phone.as_deref(), Some("+41 81 555 99 99"));
        assert_eq!(org.city.as_deref(), Some("Chur"));
        assert_eq!(org.external_id.as_deref(), Some("HR-1122"));
        assert_eq!(org.domain.as_deref(), Some("hotel-sonne.example"));
    }

    #[test]
    fn test_absorb_stub_is_idempotent() {
        let mut org = Organization::from_stub(&sample_stub());
        assert!(!org.absorb_stub(&sample_stub()));
    }

    #[test]
    fn test_absorb_stub_unions_source_tags() {
        let mut org = Organization::from_stub(&sample_stub());
        let mut stub = sample_stub();
        stub.source = "reviews".to_string();
        assert!(org.absorb_stub(&stub));
        assert_eq!(org.source_tags, vec!["gov_registry".to_string(), "reviews".to_string()]);
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let org = Organization::new("   ");
        assert!(org.validate().is_err());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            OrgStatus::Discovered,
            OrgStatus::PendingEnrichment,
            OrgStatus::Enriched,
            OrgStatus::Rejected,
        ] {
            assert_eq!(OrgStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(OrgStatus::from_str("bogus"), None);
    }
}
