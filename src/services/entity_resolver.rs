//! Entity resolution for discovered organization stubs.
//!
//! Discovery layers report properties they saw near the one being
//! enriched. Before such a stub may become a record of its own it is
//! scored against existing organizations on a fixed signal ladder;
//! the best signal decides whether the stub merges, gets flagged for
//! manual review, or is inserted as genuinely new.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{OrgStub, Organization, ReviewFlag};
use crate::domain::normalize::{
    canonical_name, canonicalize_domain, fold_text, phone_digits, phones_match,
    strip_brand_noise, MIN_PHONE_SIGNAL_DIGITS,
};
use crate::domain::ports::errors::DatabaseError;
use crate::domain::ports::{OrganizationRepository, ReviewRepository};

/// Best-signal score at or above which a stub merges automatically.
pub const AUTO_MERGE_THRESHOLD: f64 = 0.8;

/// Best-signal score at or above which a near-miss is flagged for
/// manual review instead of being treated as distinct.
pub const REVIEW_THRESHOLD: f64 = 0.5;

/// The identity signals, strongest first. Each carries a fixed score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSignal {
    /// Same authoritative external registry id.
    ExternalId,
    /// Same canonical domain.
    Domain,
    /// Same phone number (digit comparison).
    Phone,
    /// Same brand-stripped name in the same city.
    NameCity,
    /// Same street address in the same city.
    AddressCity,
    /// Fuzzy name similarity in the same city.
    FuzzyNameCity,
}

impl MatchSignal {
    /// The fixed score this signal contributes.
    #[must_use]
    pub const fn score(self) -> f64 {
        match self {
            Self::ExternalId => 1.0,
            Self::Domain => 0.9,
            Self::Phone => 0.8,
            Self::NameCity => 0.7,
            Self::AddressCity => 0.6,
            Self::FuzzyNameCity => 0.5,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExternalId => "external_id",
            Self::Domain => "domain",
            Self::Phone => "phone",
            Self::NameCity => "name_city",
            Self::AddressCity => "address_city",
            Self::FuzzyNameCity => "fuzzy_name_city",
        }
    }
}

/// What should happen to a stub.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Strong match; fold the stub into this record.
    Merge {
        existing: Box<Organization>,
        signal: MatchSignal,
    },
    /// Ambiguous match; keep both and flag the pair.
    Review {
        existing_id: Uuid,
        signal: MatchSignal,
    },
    /// No credible match; the stub is a new organization.
    Distinct,
}

/// What `ingest` actually did with a stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Folded into an existing organization.
    MergedInto(Uuid),
    /// Inserted as new, with a review flag against a lookalike.
    InsertedWithFlag {
        new_org: Uuid,
        flagged_against: Uuid,
    },
    /// Inserted as a brand-new organization.
    Inserted(Uuid),
}

/// Scores stubs against existing organizations and applies the
/// merge / review / insert policy.
pub struct EntityResolver {
    orgs: Arc<dyn OrganizationRepository>,
    reviews: Arc<dyn ReviewRepository>,
    fuzzy_similarity: f64,
}

impl EntityResolver {
    #[must_use]
    pub fn new(
        orgs: Arc<dyn OrganizationRepository>,
        reviews: Arc<dyn ReviewRepository>,
        fuzzy_similarity: f64,
    ) -> Self {
        Self { orgs, reviews, fuzzy_similarity }
    }

    /// Score a stub against the candidate pool and decide its fate.
    pub async fn resolve(&self, stub: &OrgStub) -> Result<Resolution, DatabaseError> {
        let candidates = self.gather_candidates(stub).await?;
        let mut best: Option<(MatchSignal, &Organization)> = None;
        for candidate in &candidates {
            if let Some(signal) = score_pair(stub, candidate, self.fuzzy_similarity) {
                let stronger = best.is_none_or(|(held, _)| signal.score() > held.score());
                if stronger {
                    best = Some((signal, candidate));
                }
            }
        }
        Ok(match best {
            Some((signal, org)) if signal.score() >= AUTO_MERGE_THRESHOLD => Resolution::Merge {
                existing: Box::new(org.clone()),
                signal,
            },
            Some((signal, org)) => Resolution::Review { existing_id: org.id, signal },
            None => Resolution::Distinct,
        })
    }

    /// Resolve a stub and apply the outcome to storage.
    pub async fn ingest(&self, stub: &OrgStub) -> DomainResult<IngestOutcome> {
        if canonical_name(&stub.name).is_empty() {
            return Err(DomainError::ValidationFailed(
                "organization stub name normalizes to empty".to_string(),
            ));
        }
        match self.resolve(stub).await? {
            Resolution::Merge { existing, signal } => {
                let mut org = *existing;
                if org.absorb_stub(stub) {
                    self.orgs.update(&org).await?;
                }
                info!(
                    org_id = %org.id,
                    signal = signal.as_str(),
                    source = %stub.source,
                    "stub merged into existing organization"
                );
                Ok(IngestOutcome::MergedInto(org.id))
            }
            Resolution::Review { existing_id, signal } => {
                let org = Organization::from_stub(stub);
                self.orgs.insert(&org).await?;
                let flag =
                    ReviewFlag::new(existing_id, stub.clone(), signal.score(), signal.as_str());
                self.reviews.insert(&flag).await?;
                info!(
                    new_org = %org.id,
                    lookalike = %existing_id,
                    signal = signal.as_str(),
                    score = signal.score(),
                    "stub kept separate and flagged for review"
                );
                Ok(IngestOutcome::InsertedWithFlag {
                    new_org: org.id,
                    flagged_against: existing_id,
                })
            }
            Resolution::Distinct => {
                let org = Organization::from_stub(stub);
                self.orgs.insert(&org).await?;
                debug!(org_id = %org.id, source = %stub.source, "stub inserted as new organization");
                Ok(IngestOutcome::Inserted(org.id))
            }
        }
    }

    /// Pull every organization that shares an indexed identity field
    /// with the stub. Deduplicated by id.
    async fn gather_candidates(&self, stub: &OrgStub) -> Result<Vec<Organization>, DatabaseError> {
        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut out: Vec<Organization> = Vec::new();

        if let Some(external_id) = trimmed(stub.external_id.as_deref()) {
            dedup_into(&mut seen, self.orgs.find_by_external_id(external_id).await?, &mut out);
        }
        if let Some(domain) = stub.domain.as_deref().and_then(canonicalize_domain) {
            dedup_into(&mut seen, self.orgs.find_by_domain(&domain).await?, &mut out);
        }
        if let Some(phone) = stub.phone.as_deref() {
            let digits = phone_digits(phone);
            if digits.len() >= MIN_PHONE_SIGNAL_DIGITS {
                dedup_into(&mut seen, self.orgs.find_by_phone_digits(&digits).await?, &mut out);
            }
        }
        if let Some(city) = trimmed(stub.city.as_deref()) {
            dedup_into(&mut seen, self.orgs.find_by_city(city).await?, &mut out);
        }
        Ok(out)
    }
}

/// Score one stub/candidate pair. Returns the strongest signal that
/// fires, or `None` when nothing credible matches.
#[must_use]
pub fn score_pair(
    stub: &OrgStub,
    candidate: &Organization,
    fuzzy_similarity: f64,
) -> Option<MatchSignal> {
    if let (Some(a), Some(b)) = (
        trimmed(stub.external_id.as_deref()),
        trimmed(candidate.external_id.as_deref()),
    ) {
        if a == b {
            return Some(MatchSignal::ExternalId);
        }
    }

    if let (Some(a), Some(b)) = (
        stub.domain.as_deref().and_then(canonicalize_domain),
        candidate.domain.as_deref(),
    ) {
        if a == b {
            return Some(MatchSignal::Domain);
        }
    }

    if let (Some(a), Some(b)) = (stub.phone.as_deref(), candidate.phone.as_deref()) {
        if phones_match(a, b) {
            return Some(MatchSignal::Phone);
        }
    }

    let same_city = match (stub.city.as_deref(), candidate.city.as_deref()) {
        (Some(a), Some(b)) => {
            let fa = fold_text(a);
            !fa.is_empty() && fa == fold_text(b)
        }
        _ => false,
    };
    if !same_city {
        return None;
    }

    let stub_core = strip_brand_noise(&stub.name);
    let candidate_core = strip_brand_noise(&candidate.name);
    if !stub_core.is_empty() && stub_core == candidate_core {
        return Some(MatchSignal::NameCity);
    }

    if let (Some(a), Some(b)) = (stub.address.as_deref(), candidate.address.as_deref()) {
        let fa = fold_text(a);
        if !fa.is_empty() && fa == fold_text(b) {
            return Some(MatchSignal::AddressCity);
        }
    }

    if strsim::jaro_winkler(&stub_core, &candidate_core) >= fuzzy_similarity {
        return Some(MatchSignal::FuzzyNameCity);
    }

    None
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn dedup_into(seen: &mut HashSet<Uuid>, orgs: Vec<Organization>, out: &mut Vec<Organization>) {
    for org in orgs {
        if seen.insert(org.id) {
            out.push(org);
        }
    }
}
