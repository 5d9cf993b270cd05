// src/models/address.rs - Raw input records and parsed address components
use serde::{Deserialize, Serialize};
use std::fmt;

/// Province code used when a source does not say otherwise.
pub const DEFAULT_PROVINCE: &str = "ON";

/// Where a raw address record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Transaction,
    BrandLocation,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Transaction => "transaction",
            SourceKind::BrandLocation => "brand_location",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transaction" => Some(SourceKind::Transaction),
            "brand_location" => Some(SourceKind::BrandLocation),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An address exactly as captured by ingestion. Never mutated; every derived
/// value lives in a separate type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAddressRecord {
    pub source_id: String,
    pub source_kind: SourceKind,
    pub address_text: String,
    pub city_hint: Option<String>,
    pub postal_hint: Option<String>,
    pub province_hint: String,
}

impl RawAddressRecord {
    pub fn new(
        source_id: impl Into<String>,
        source_kind: SourceKind,
        address_text: impl Into<String>,
        city_hint: Option<String>,
        postal_hint: Option<String>,
        province_hint: Option<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_kind,
            address_text: address_text.into(),
            city_hint: non_blank(city_hint),
            postal_hint: non_blank(postal_hint),
            province_hint: non_blank(province_hint).unwrap_or_else(|| DEFAULT_PROVINCE.to_string()),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Postal hint after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostalHint {
    /// Six alphanumerics, rendered as `AAA BAA`.
    Canonical(String),
    /// Anything else, kept verbatim. Consumers treat it as absent.
    NonCanonical(String),
}

/// Structured components recovered from a free-text address.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedAddress {
    pub house_number_token: Option<String>,
    pub street_name: String,
    pub unit: Option<String>,
    pub city: Option<String>,
    pub suburb: Option<String>,
    pub postal: Option<PostalHint>,
}

impl ParsedAddress {
    /// The canonical postal code, if the hint normalized cleanly.
    pub fn postal_code(&self) -> Option<&str> {
        match &self.postal {
            Some(PostalHint::Canonical(code)) => Some(code.as_str()),
            _ => None,
        }
    }

    /// True when there is nothing to match against the reference.
    pub fn is_unparseable(&self) -> bool {
        self.street_name.is_empty() || self.house_number_token.is_none()
    }
}

/// Discrete house numbers derived from one house-number token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateNumbers {
    numbers: Vec<String>,
    truncated: bool,
}

impl CandidateNumbers {
    pub fn singleton(token: impl Into<String>) -> Self {
        Self {
            numbers: vec![token.into()],
            truncated: false,
        }
    }

    /// Builds from an ordered list, dropping repeats. Falls back to `fallback`
    /// when the list is empty so the sequence is never empty.
    pub(crate) fn from_ordered(numbers: Vec<String>, truncated: bool, fallback: &str) -> Self {
        let mut deduped: Vec<String> = Vec::with_capacity(numbers.len());
        for n in numbers {
            if !deduped.contains(&n) {
                deduped.push(n);
            }
        }
        if deduped.is_empty() {
            return Self::singleton(fallback);
        }
        Self {
            numbers: deduped,
            truncated,
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.numbers
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.numbers.iter()
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    /// Set when an oversized range was cut down to the configured span.
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_record_defaults_province_and_drops_blank_hints() {
        let raw = RawAddressRecord::new(
            "src-1",
            SourceKind::BrandLocation,
            "10 Main St",
            Some("  ".to_string()),
            None,
            None,
        );
        assert_eq!(raw.province_hint, "ON");
        assert!(raw.city_hint.is_none());
        assert!(raw.postal_hint.is_none());
    }

    #[test]
    fn test_non_canonical_postal_reads_as_absent() {
        let parsed = ParsedAddress {
            postal: Some(PostalHint::NonCanonical("L1N9L".to_string())),
            ..Default::default()
        };
        assert_eq!(parsed.postal_code(), None);
    }

    #[test]
    fn test_candidate_numbers_dedupe_and_never_empty() {
        let c = CandidateNumbers::from_ordered(
            vec!["8".into(), "14".into(), "8".into()],
            false,
            "8 & 14",
        );
        assert_eq!(c.as_slice(), &["8".to_string(), "14".to_string()]);

        let empty = CandidateNumbers::from_ordered(Vec::new(), false, "X");
        assert_eq!(empty.as_slice(), &["X".to_string()]);
    }

    #[test]
    fn test_source_kind_round_trip_names() {
        assert_eq!(SourceKind::from_str("Transaction"), Some(SourceKind::Transaction));
        assert_eq!(SourceKind::BrandLocation.as_str(), "brand_location");
        assert_eq!(SourceKind::from_str("scrape"), None);
    }
}
