//! Text normalization used for identity keys and entity matching.
//!
//! Every comparison the merge engine and entity resolver perform goes
//! through these folds, so the rules here define what counts as "the
//! same" name, title, domain or phone number.

/// Minimum digit count before two phone numbers are considered
/// comparable. Shorter strings are too ambiguous to act as a signal.
pub const MIN_PHONE_SIGNAL_DIGITS: usize = 7;

/// Franchise and chain qualifiers stripped from the front of property
/// names before comparison. All entries are pre-folded.
const BRAND_PREFIXES: &[&str] = &[
    "best western",
    "holiday inn",
    "comfort",
    "quality",
    "super 8",
    "days inn",
    "travelodge",
    "ramada",
    "econo lodge",
    "la quinta",
];

/// Property-type suffixes stripped from the end of names before
/// comparison. Multi-word entries must appear before their substrings
/// would match, but matching is whole-suffix so order is not load
/// bearing here.
const PROPERTY_SUFFIXES: &[&str] = &[
    "bed and breakfast",
    "holiday park",
    "guest house",
    "guesthouse",
    "aparthotel",
    "apartments",
    "hostel",
    "suites",
    "resort",
    "lodge",
    "hotel",
    "motel",
    "inn",
];

/// Title synonym groups. The first element is the canonical form every
/// variant collapses to; variants are pre-folded.
const TITLE_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "owner",
        &["owner", "co owner", "proprietor", "proprietress", "innkeeper"],
    ),
    (
        "general manager",
        &[
            "general manager",
            "gm",
            "managing director",
            "hotel manager",
            "hotel director",
        ],
    ),
    (
        "front desk manager",
        &[
            "front desk manager",
            "front office manager",
            "reception manager",
            "front desk supervisor",
        ],
    ),
    (
        "sales manager",
        &["sales manager", "director of sales", "sales director", "head of sales"],
    ),
    ("ceo", &["ceo", "chief executive officer", "chief executive"]),
];

/// Lowercase, drop punctuation and collapse whitespace.
///
/// This is the base fold applied before any comparison. Unicode
/// letters survive; everything that is not alphanumeric becomes a
/// single space.
#[must_use]
pub fn fold_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Canonical identity key for a person's name.
#[must_use]
pub fn canonical_name(raw: &str) -> String {
    fold_text(raw)
}

/// Canonical identity key for a job title.
///
/// Folds the title and collapses known synonyms ("GM", "Managing
/// Director") onto one canonical form so the same person reported with
/// equivalent titles lands on a single record.
#[must_use]
pub fn canonical_title(raw: &str) -> String {
    let folded = fold_text(raw);
    for (canonical, variants) in TITLE_SYNONYMS {
        if variants.contains(&folded.as_str()) {
            return (*canonical).to_string();
        }
    }
    folded
}

/// Reduce a URL or host string to a bare lowercase domain.
///
/// Strips scheme, `www.`, path, query and port. Returns `None` when
/// nothing resembling a domain remains.
#[must_use]
pub fn canonicalize_domain(raw: &str) -> Option<String> {
    let mut s = raw.trim().to_ascii_lowercase();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = s.strip_prefix(scheme) {
            s = rest.to_string();
            break;
        }
    }
    if let Some(rest) = s.strip_prefix("www.") {
        s = rest.to_string();
    }
    let host = s.split(['/', '?', '#']).next().unwrap_or("");
    let host = host.split(':').next().unwrap_or("");
    let host = host.trim_matches('.');
    if host.is_empty() || !host.contains('.') {
        return None;
    }
    Some(host.to_string())
}

/// Keep only the digits of a phone number.
#[must_use]
pub fn phone_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Whether two raw phone strings denote the same number.
///
/// Comparison is on digits only and requires at least
/// [`MIN_PHONE_SIGNAL_DIGITS`] on both sides.
#[must_use]
pub fn phones_match(a: &str, b: &str) -> bool {
    let da = phone_digits(a);
    let db = phone_digits(b);
    da.len() >= MIN_PHONE_SIGNAL_DIGITS && da == db
}

/// Fold a property name and strip brand prefixes and property-type
/// suffixes for comparison.
///
/// "Best Western Lakeside Hotel" and "Lakeside" compare equal after
/// stripping. A name that consists only of brand noise is returned
/// folded but unstripped rather than empty.
#[must_use]
pub fn strip_brand_noise(name: &str) -> String {
    let folded = fold_text(name);
    let mut core = folded.as_str();
    let mut changed = true;
    while changed {
        changed = false;
        for prefix in BRAND_PREFIXES {
            if core == *prefix {
                continue;
            }
            if let Some(rest) = core.strip_prefix(prefix) {
                if let Some(rest) = rest.strip_prefix(' ') {
                    core = rest;
                    changed = true;
                }
            }
        }
        for suffix in PROPERTY_SUFFIXES {
            if core == *suffix {
                continue;
            }
            if let Some(rest) = core.strip_suffix(suffix) {
                if let Some(rest) = rest.strip_suffix(' ') {
                    core = rest;
                    changed = true;
                }
            }
        }
    }
    if core.is_empty() {
        folded
    } else {
        core.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_text_collapses_punctuation_and_case() {
        assert_eq!(fold_text("  John   SMITH "), "john smith");
        assert_eq!(fold_text("O'Brien, Pat"), "o brien pat");
        assert_eq!(fold_text("Café-Müller"), "café müller");
        assert_eq!(fold_text("--"), "");
    }

    #[test]
    fn test_canonical_title_synonyms() {
        assert_eq!(canonical_title("GM"), "general manager");
        assert_eq!(canonical_title("Managing Director"), "general manager");
        assert_eq!(canonical_title("General Manager"), "general manager");
        assert_eq!(canonical_title("Front-Office Manager"), "front desk manager");
        assert_eq!(canonical_title("Proprietor"), "owner");
        assert_eq!(canonical_title("Head Chef"), "head chef");
    }

    #[test]
    fn test_canonicalize_domain() {
        assert_eq!(
            canonicalize_domain("https://www.Hotel-Sonne.example/contact?x=1"),
            Some("hotel-sonne.example".to_string())
        );
        assert_eq!(
            canonicalize_domain("http://example.com:8080/about"),
            Some("example.com".to_string())
        );
        assert_eq!(canonicalize_domain("example.com"), Some("example.com".to_string()));
        assert_eq!(canonicalize_domain("localhost"), None);
        assert_eq!(canonicalize_domain("   "), None);
    }

    #[test]
    fn test_phone_digits_and_match() {
        assert_eq!(phone_digits("+1 (555) 123-4567"), "15551234567");
        assert!(phones_match("+1 (555) 123-4567", "1-555-123-4567"));
        assert!(!phones_match("555-1234", "555-1234"), "too few digits to be a signal");
        assert!(!phones_match("+1 555 123 4567", "+1 555 123 9999"));
    }

    #[test]
    fn test_strip_brand_noise() {
        assert_eq!(strip_brand_noise("Best Western Lakeside Hotel"), "lakeside");
        assert_eq!(strip_brand_noise("Lakeside Holiday Park"), "lakeside");
        assert_eq!(strip_brand_noise("The Grand Hotel"), "the grand");
        assert_eq!(strip_brand_noise("Lakeside"), "lakeside");
    }

    #[test]
    fn test_strip_brand_noise_never_returns_empty() {
        // A name that is nothing but brand noise keeps its folded form.
        assert_eq!(strip_brand_noise("Hotel"), "hotel");
        assert!(!strip_brand_noise("Best Western").is_empty());
    }
}
