//! Confidence-weighted merging of contact facts into golden records.
//!
//! The merge engine is pure: it takes the records already on file and
//! a batch of raw facts, and returns the records that need writing.
//! All rules are accumulate-only, so feeding the same facts twice
//! changes nothing.
//!
//! Field rules:
//! - email, phone: an incoming non-empty value replaces the stored
//!   one; an empty value never overwrites anything
//! - `email_verified`: sticky OR
//! - sources: set union, kept sorted
//! - confidence: maximum across contributing sources
//! - `source_url`: first reported URL wins
//! - display name and title: first reported form wins

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::domain::models::{ContactFact, ContactKey, DecisionMaker};
use crate::domain::normalize::canonical_name;

/// Result of folding a batch of facts into an organization's contacts.
#[derive(Debug, Clone)]
pub struct ContactMerge {
    /// New or changed records that need to be written.
    pub upserts: Vec<DecisionMaker>,
    /// Distinct contacts on file after the merge, including unchanged
    /// ones.
    pub total: usize,
}

/// Stateless merge engine for decision-maker records.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeEngine;

impl MergeEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Fold raw facts into the records already on file for one
    /// organization.
    ///
    /// Facts with a name that normalizes to empty are dropped. Facts
    /// sharing an identity key merge into one record; the rest become
    /// new records. Only new or changed records are returned for
    /// writing, ordered by identity key so batch statements are
    /// deterministic.
    #[must_use]
    pub fn fold_contacts(
        &self,
        org_id: Uuid,
        existing: Vec<DecisionMaker>,
        facts: &[ContactFact],
    ) -> ContactMerge {
        let mut records: HashMap<ContactKey, (DecisionMaker, bool)> = existing
            .into_iter()
            .map(|record| (record.key(), (record, false)))
            .collect();

        for fact in facts {
            if canonical_name(&fact.full_name).is_empty() {
                debug!(title = %fact.title, source = %fact.source, "dropping contact fact with empty name");
                continue;
            }
            let key = ContactKey::new(org_id, &fact.full_name, &fact.title);
            match records.get_mut(&key) {
                Some((record, dirty)) => {
                    *dirty |= Self::merge_fact(record, fact);
                }
                None => {
                    records.insert(key, (DecisionMaker::from_fact(org_id, fact), true));
                }
            }
        }

        let total = records.len();
        let mut upserts: Vec<DecisionMaker> = records
            .into_values()
            .filter_map(|(record, dirty)| dirty.then_some(record))
            .collect();
        upserts.sort_by(|a, b| {
            (a.normalized_name.as_str(), a.normalized_title.as_str())
                .cmp(&(b.normalized_name.as_str(), b.normalized_title.as_str()))
        });
        ContactMerge { upserts, total }
    }

    /// Merge one fact into an existing record. Returns whether the
    /// record changed.
    pub fn merge_fact(record: &mut DecisionMaker, fact: &ContactFact) -> bool {
        let mut changed = false;

        if let Some(email) = non_empty(fact.email.as_deref()) {
            if record.email.as_deref() != Some(email) {
                record.email = Some(email.to_string());
                changed = true;
            }
        }
        if let Some(phone) = non_empty(fact.phone.as_deref()) {
            if record.phone.as_deref() != Some(phone) {
                record.phone = Some(phone.to_string());
                changed = true;
            }
        }
        if fact.email_verified && !record.email_verified {
            record.email_verified = true;
            changed = true;
        }
        let tag = fact.source.as_str();
        if !record.sources.iter().any(|s| s == tag) {
            record.sources.push(tag.to_string());
            record.sources.sort();
            changed = true;
        }
        let confidence = fact.confidence.clamp(0.0, 1.0);
        if confidence > record.confidence {
            record.confidence = confidence;
            changed = true;
        }
        if record.source_url.is_none() {
            if let Some(url) = non_empty(fact.source_url.as_deref()) {
                record.source_url = Some(url.to_string());
                changed = true;
            }
        }
        if changed {
            record.updated_at = chrono::Utc::now();
        }
        changed
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Layer;

    fn registry_fact() -> ContactFact {
        ContactFact::new("John Smith", "Owner", Layer::GovRegistry).with_confidence(0.6)
    }

    fn page_scrape_fact() -> ContactFact {
        ContactFact::new("John Smith", "Owner", Layer::PageScrape)
            .with_email("john@hotel.example")
            .with_confidence(0.75)
    }

    #[test]
    fn test_two_sources_converge_on_one_record() {
        let engine = MergeEngine::new();
        let org_id = Uuid::new_v4();

        let merge = engine.fold_contacts(org_id, vec![], &[registry_fact(), page_scrape_fact()]);
        assert_eq!(merge.total, 1);
        assert_eq!(merge.upserts.len(), 1);

        let record = &merge.upserts[0];
        assert_eq!(record.email.as_deref(), Some("john@hotel.example"));
        assert!(!record.email_verified);
        assert!((record.confidence - 0.75).abs() < f64::EPSILON);
        assert_eq!(
            record.sources,
            vec!["gov_registry".to_string(), "page_scrape".to_string()]
        );
    }

    #[test]
    fn test_merge_across_separate_runs() {
        let engine = MergeEngine::new();
        let org_id = Uuid::new_v4();

        let first = engine.fold_contacts(org_id, vec![], &[registry_fact()]);
        let second = engine.fold_contacts(org_id, first.upserts, &[page_scrape_fact()]);
        assert_eq!(second.total, 1);

        let record = &second.upserts[0];
        assert_eq!(record.email.as_deref(), Some("john@hotel.example"));
        assert!((record.confidence - 0.75).abs() < f64::EPSILON);
        assert_eq!(
            record.sources,
            vec!["gov_registry".to_string(), "page_scrape".to_string()]
        );
    }

    #[test]
    fn test_idempotent_under_refeed() {
        let engine = MergeEngine::new();
        let org_id = Uuid::new_v4();
        let facts = [registry_fact(), page_scrape_fact()];

        let first = engine.fold_contacts(org_id, vec![], &facts);
        let again = engine.fold_contacts(org_id, first.upserts.clone(), &facts);
        assert_eq!(again.total, 1);
        assert!(again.upserts.is_empty(), "re-feeding identical facts must change nothing");
    }

    #[test]
    fn test_empty_never_overwrites() {
        let org_id = Uuid::new_v4();
        let mut record = DecisionMaker::from_fact(org_id, &page_scrape_fact());

        // A later sighting without email or phone leaves both alone.
        let changed = MergeEngine::merge_fact(&mut record, &registry_fact());
        assert!(changed, "source union and nothing else");
        assert_eq!(record.email.as_deref(), Some("john@hotel.example"));

        let blank =
            ContactFact::new("John Smith", "Owner", Layer::PageScrape).with_email("   ");
        let changed = MergeEngine::merge_fact(&mut record, &blank);
        assert!(!changed);
        assert_eq!(record.email.as_deref(), Some("john@hotel.example"));
    }

    #[test]
    fn test_incoming_non_empty_replaces() {
        let org_id = Uuid::new_v4();
        let mut record = DecisionMaker::from_fact(org_id, &page_scrape_fact());
        let corrected = ContactFact::new("John Smith", "Owner", Layer::EmailVerify)
            .with_email("j.smith@hotel.example");
        assert!(MergeEngine::merge_fact(&mut record, &corrected));
        assert_eq!(record.email.as_deref(), Some("j.smith@hotel.example"));
    }

    #[test]
    fn test_verified_flag_is_sticky() {
        let org_id = Uuid::new_v4();
        let mut record = DecisionMaker::from_fact(
            org_id,
            &page_scrape_fact().with_verified(true),
        );
        assert!(record.email_verified);

        // An unverified sighting later does not clear the flag.
        MergeEngine::merge_fact(&mut record, &page_scrape_fact());
        assert!(record.email_verified);
    }

    #[test]
    fn test_confidence_keeps_maximum() {
        let org_id = Uuid::new_v4();
        let mut record = DecisionMaker::from_fact(org_id, &page_scrape_fact());
        MergeEngine::merge_fact(
            &mut record,
            &ContactFact::new("John Smith", "Owner", Layer::Reviews).with_confidence(0.3),
        );
        assert!((record.confidence - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_source_url_first_reported_wins() {
        let org_id = Uuid::new_v4();
        let mut record = DecisionMaker::from_fact(
            org_id,
            &page_scrape_fact().with_source_url("https://hotel.example/team"),
        );

        let later = ContactFact::new("John Smith", "Owner", Layer::GovRegistry)
            .with_source_url("https://registry.example/HR-9");
        MergeEngine::merge_fact(&mut record, &later);
        assert_eq!(record.source_url.as_deref(), Some("https://hotel.example/team"));

        // A record that never had one picks it up.
        let mut bare = DecisionMaker::from_fact(org_id, &registry_fact());
        assert!(MergeEngine::merge_fact(&mut bare, &later));
        assert_eq!(bare.source_url.as_deref(), Some("https://registry.example/HR-9"));
    }

    #[test]
    fn test_title_synonyms_land_on_one_record() {
        let engine = MergeEngine::new();
        let org_id = Uuid::new_v4();
        let facts = [
            ContactFact::new("Jane Doe", "GM", Layer::PageScrape).with_confidence(0.5),
            ContactFact::new("Jane Doe", "General Manager", Layer::Reviews).with_confidence(0.4),
        ];
        let merge = engine.fold_contacts(org_id, vec![], &facts);
        assert_eq!(merge.total, 1);
        assert_eq!(merge.upserts[0].normalized_title, "general manager");
    }

    #[test]
    fn test_distinct_people_stay_distinct() {
        let engine = MergeEngine::new();
        let org_id = Uuid::new_v4();
        let facts = [
            ContactFact::new("John Smith", "Owner", Layer::GovRegistry).with_confidence(0.6),
            ContactFact::new("Jane Doe", "Owner", Layer::GovRegistry).with_confidence(0.6),
            ContactFact::new("John Smith", "Head Chef", Layer::PageScrape).with_confidence(0.5),
        ];
        let merge = engine.fold_contacts(org_id, vec![], &facts);
        assert_eq!(merge.total, 3);
    }

    #[test]
    fn test_unnamed_facts_are_dropped() {
        let engine = MergeEngine::new();
        let org_id = Uuid::new_v4();
        let facts = [ContactFact::new("  --  ", "Owner", Layer::Whois).with_confidence(0.9)];
        let merge = engine.fold_contacts(org_id, vec![], &facts);
        assert_eq!(merge.total, 0);
        assert!(merge.upserts.is_empty());
    }

    #[test]
    fn test_untouched_existing_records_are_not_rewritten() {
        let engine = MergeEngine::new();
        let org_id = Uuid::new_v4();
        let existing = engine.fold_contacts(org_id, vec![], &[registry_fact()]).upserts;

        let unrelated =
            ContactFact::new("Jane Doe", "GM", Layer::PageScrape).with_confidence(0.5);
        let merge = engine.fold_contacts(org_id, existing, &[unrelated]);
        assert_eq!(merge.total, 2);
        assert_eq!(merge.upserts.len(), 1, "only the new record needs writing");
        assert_eq!(merge.upserts[0].normalized_name, "jane doe");
    }
}
