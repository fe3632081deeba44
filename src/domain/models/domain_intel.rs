//! Domain-level intelligence shared by every organization on a domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::findings::DomainFact;

/// Facts about a web domain, keyed by the canonical domain itself.
///
/// Refreshes are COALESCE-style: a new non-null value replaces the
/// stored one, a null never erases anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainIntelligence {
    /// Canonical domain, primary key.
    pub domain: String,
    pub registrant_name: Option<String>,
    pub registrant_org: Option<String>,
    pub registrar: Option<String>,
    pub name_servers: Option<String>,
    pub mail_provider: Option<String>,
    /// Organization name attested by certificate transparency.
    pub cert_org: Option<String>,
    /// When any source last reported on this domain.
    pub queried_at: DateTime<Utc>,
}

impl DomainIntelligence {
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            registrant_name: None,
            registrant_org: None,
            registrar: None,
            name_servers: None,
            mail_provider: None,
            cert_org: None,
            queried_at: Utc::now(),
        }
    }

    /// Build a record from a single fact observation.
    #[must_use]
    pub fn from_fact(domain: impl Into<String>, fact: &DomainFact, observed_at: DateTime<Utc>) -> Self {
        let mut record = Self::new(domain);
        record.queried_at = observed_at;
        record.apply_fact(fact, observed_at);
        record
    }

    /// Fold a new observation into this record.
    ///
    /// Non-null incoming fields replace stored values; null fields
    /// leave them alone. Returns whether anything changed.
    pub fn apply_fact(&mut self, fact: &DomainFact, observed_at: DateTime<Utc>) -> bool {
        let mut changed = false;
        changed |= replace_non_null(&mut self.registrant_name, fact.registrant_name.as_deref());
        changed |= replace_non_null(&mut self.registrant_org, fact.registrant_org.as_deref());
        changed |= replace_non_null(&mut self.registrar, fact.registrar.as_deref());
        changed |= replace_non_null(&mut self.name_servers, fact.name_servers.as_deref());
        changed |= replace_non_null(&mut self.mail_provider, fact.mail_provider.as_deref());
        changed |= replace_non_null(&mut self.cert_org, fact.cert_org.as_deref());
        if changed || observed_at > self.queried_at {
            self.queried_at = self.queried_at.max(observed_at);
        }
        changed
    }
}

fn replace_non_null(slot: &mut Option<String>, incoming: Option<&str>) -> bool {
    if let Some(value) = incoming {
        let trimmed = value.trim();
        if !trimmed.is_empty() && slot.as_deref() != Some(trimmed) {
            *slot = Some(trimmed.to_string());
            return true;
        }
    }
    false
}
