//! Raw facts emitted by source layers before merging.
//!
//! A layer reports what it saw; nothing here is deduplicated or
//! trusted yet. The merge engine and entity resolver turn these into
//! golden records.

use serde::{Deserialize, Serialize};

use crate::domain::models::layer::Layer;

/// A contact sighting reported by one layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactFact {
    /// Person's name as the source printed it.
    pub full_name: String,
    /// Job title as the source printed it.
    pub title: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Whether the source itself confirmed the mailbox exists.
    #[serde(default)]
    pub email_verified: bool,
    /// Source-assigned confidence in [0, 1].
    pub confidence: f64,
    /// The layer that produced this fact.
    pub source: Layer,
    /// Page or record the fact was taken from, if the source has one.
    #[serde(default)]
    pub source_url: Option<String>,
}

impl ContactFact {
    /// Convenience constructor for the common fields.
    #[must_use]
    pub fn new(full_name: impl Into<String>, title: impl Into<String>, source: Layer) -> Self {
        Self {
            full_name: full_name.into(),
            title: title.into(),
            email: None,
            phone: None,
            email_verified: false,
            confidence: 0.0,
            source,
            source_url: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    #[must_use]
    pub const fn with_verified(mut self, verified: bool) -> Self {
        self.email_verified = verified;
        self
    }

    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}

/// Domain-level facts reported by a layer. All fields optional; a
/// layer fills what it knows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainFact {
    #[serde(default)]
    pub registrant_name: Option<String>,
    #[serde(default)]
    pub registrant_org: Option<String>,
    #[serde(default)]
    pub registrar: Option<String>,
    #[serde(default)]
    pub name_servers: Option<String>,
    /// Inferred mail provider, e.g. "google" or "self-hosted".
    #[serde(default)]
    pub mail_provider: Option<String>,
    /// Organization name from certificate-transparency subjects.
    #[serde(default)]
    pub cert_org: Option<String>,
}

impl DomainFact {
    /// Fill empty fields of `self` from `other`. Existing values win.
    pub fn coalesce(&mut self, other: &Self) {
        coalesce_field(&mut self.registrant_name, other.registrant_name.as_deref());
        coalesce_field(&mut self.registrant_org, other.registrant_org.as_deref());
        coalesce_field(&mut self.registrar, other.registrar.as_deref());
        coalesce_field(&mut self.name_servers, other.name_servers.as_deref());
        coalesce_field(&mut self.mail_provider, other.mail_provider.as_deref());
        coalesce_field(&mut self.cert_org, other.cert_org.as_deref());
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.registrant_name.is_none()
            && self.registrant_org.is_none()
            && self.registrar.is_none()
            && self.name_servers.is_none()
            && self.mail_provider.is_none()
            && self.cert_org.is_none()
    }
}

/// A possibly-new organization discovered as a side effect of
/// enriching another one. Goes through entity resolution before it
/// may become a record of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgStub {
    #[serde(default)]
    pub external_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Tag of the source that discovered it, e.g. a layer id or "seed".
    pub source: String,
}

impl OrgStub {
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            external_id: None,
            name: name.into(),
            domain: None,
            phone: None,
            address: None,
            city: None,
            region: None,
            country: None,
            source: source.into(),
        }
    }
}

/// Everything one layer invocation produced for one organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerFindings {
    #[serde(default)]
    pub contacts: Vec<ContactFact>,
    #[serde(default)]
    pub domain: Option<DomainFact>,
    #[serde(default)]
    pub org_stubs: Vec<OrgStub>,
}

impl LayerFindings {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
            && self.org_stubs.is_empty()
            && self.domain.as_ref().is_none_or(DomainFact::is_empty)
    }

    /// Fold another layer's findings into this accumulator.
    ///
    /// Contacts and stubs concatenate; domain facts coalesce with the
    /// earlier layer's values winning on conflict.
    pub fn absorb(&mut self, other: Self) {
        self.contacts.extend(other.contacts);
        self.org_stubs.extend(other.org_stubs);
        if let Some(theirs) = other.domain {
            if let Some(mine) = &mut self.domain {
                mine.coalesce(&theirs);
            } else {
                self.domain = Some(theirs);
            }
        }
    }
}

fn coalesce_field(slot: &mut Option<String>, incoming: Option<&str>) {
    if slot.is_none() {
        if let Some(value) = incoming {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                *slot = Some(trimmed.to_string());
            }
        }
    }
}
