//! The enrichment layer taxonomy and the bitmask set built on it.
//!
//! Layer ids are stable: each layer owns one bit in the persisted
//! `layers_completed` / `layers_failed` masks, so ids must never be
//! renumbered once data exists.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single enrichment source layer.
///
/// The discriminant is the layer's bit position in [`LayerSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum Layer {
    /// WHOIS registration lookup for the organization's domain.
    Whois = 0,
    /// DNS record inspection (MX, NS, mail provider inference).
    Dns = 1,
    /// Scrape of the organization's own web pages for named staff.
    PageScrape = 2,
    /// Review-platform listings; may also discover sibling properties.
    Reviews = 3,
    /// Government business registries; may also discover new organizations.
    GovRegistry = 4,
    /// Certificate transparency logs for the domain.
    CertLog = 5,
    /// Mailbox verification for contacts found in phase one.
    EmailVerify = 6,
}

impl Layer {
    /// Every layer, in bit order.
    pub const ALL: [Self; 7] = [
        Self::Whois,
        Self::Dns,
        Self::PageScrape,
        Self::Reviews,
        Self::GovRegistry,
        Self::CertLog,
        Self::EmailVerify,
    ];

    /// The layer's bit in a [`LayerSet`] mask.
    #[must_use]
    pub const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Stable string identifier used in config, CLI flags and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Whois => "whois",
            Self::Dns => "dns",
            Self::PageScrape => "page_scrape",
            Self::Reviews => "reviews",
            Self::GovRegistry => "gov_registry",
            Self::CertLog => "cert_log",
            Self::EmailVerify => "email_verify",
        }
    }

    /// Parse a layer from its string identifier.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "whois" => Some(Self::Whois),
            "dns" => Some(Self::Dns),
            "page_scrape" => Some(Self::PageScrape),
            "reviews" => Some(Self::Reviews),
            "gov_registry" => Some(Self::GovRegistry),
            "cert_log" => Some(Self::CertLog),
            "email_verify" => Some(Self::EmailVerify),
            _ => None,
        }
    }

    /// Layers that run concurrently in phase one.
    #[must_use]
    pub fn phase_one() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(|l| !l.is_phase_two())
    }

    /// Whether this layer runs in phase two, after phase one settles.
    #[must_use]
    pub const fn is_phase_two(self) -> bool {
        matches!(self, Self::EmailVerify)
    }

    /// Whether this layer can discover organizations beyond the one
    /// being enriched.
    #[must_use]
    pub const fn is_discovery(self) -> bool {
        matches!(self, Self::Reviews | Self::GovRegistry)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of layers stored as a bitmask.
///
/// This is the persisted representation of `layers_completed` and
/// `layers_failed`. Completed masks only ever grow (bitwise OR), which
/// keeps repeated enrichment attempts idempotent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerSet(u16);

impl LayerSet {
    /// Mask covering every defined layer bit.
    pub const VALID_MASK: u16 = 0b0111_1111;

    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Build a set from a raw persisted mask, dropping undefined bits.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & Self::VALID_MASK)
    }

    /// The raw mask, as stored in the database.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Add a layer to the set.
    pub fn insert(&mut self, layer: Layer) {
        self.0 |= layer.bit();
    }

    /// Remove a layer from the set.
    pub fn remove(&mut self, layer: Layer) {
        self.0 &= !layer.bit();
    }

    /// Whether the set contains a layer.
    #[must_use]
    pub const fn contains(self, layer: Layer) -> bool {
        self.0 & layer.bit() != 0
    }

    /// The union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of layers in the set.
    #[must_use]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate the contained layers in bit order.
    pub fn iter(self) -> impl Iterator<Item = Layer> {
        Layer::ALL.into_iter().filter(move |l| self.contains(*l))
    }
}

impl FromIterator<Layer> for LayerSet {
    fn from_iter<I: IntoIterator<Item = Layer>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for layer in iter {
            set.insert(layer);
        }
        set
    }
}

impl fmt::Display for LayerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        let names: Vec<&str> = self.iter().map(Layer::as_str).collect();
        f.write_str(&names.join("|"))
    }
}
