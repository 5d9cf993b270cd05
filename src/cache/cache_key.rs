// src/cache/cache_key.rs - Composite validation-cache key
use sha2::{Digest, Sha256};

use crate::models::address::{PostalHint, RawAddressRecord};
use crate::parsing::address_parser::normalize_postal;

/// (normalized address text, city hint, normalized postal). Two records with
/// the same three parts share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub address: String,
    pub city: String,
    pub postal: String,
    digest: String,
}

fn collapse_upper(value: &str) -> String {
    value
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl CacheKey {
    pub fn new(address_text: &str, city_hint: Option<&str>, postal_hint: Option<&str>) -> Self {
        let address = collapse_upper(address_text);
        let city = city_hint.map(collapse_upper).unwrap_or_default();
        let postal = match postal_hint.and_then(normalize_postal) {
            Some(PostalHint::Canonical(code)) => code,
            Some(PostalHint::NonCanonical(raw)) => collapse_upper(&raw),
            None => String::new(),
        };

        let mut hasher = Sha256::new();
        hasher.update(address.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(city.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(postal.as_bytes());
        let digest = hex::encode(hasher.finalize());

        Self {
            address,
            city,
            postal,
            digest,
        }
    }

    pub fn from_record(raw: &RawAddressRecord) -> Self {
        Self::new(
            &raw.address_text,
            raw.city_hint.as_deref(),
            raw.postal_hint.as_deref(),
        )
    }

    /// Hex SHA-256 of the three parts; the primary key in Postgres.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_inputs_share_a_key() {
        let a = CacheKey::new("1521  Yonge Street", Some("toronto"), Some("m4t1z2"));
        let b = CacheKey::new("1521 YONGE STREET", Some("Toronto "), Some("M4T 1Z2"));
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn test_parts_do_not_bleed_into_each_other() {
        let a = CacheKey::new("1 MAIN", Some("ST"), None);
        let b = CacheKey::new("1 MAIN ST", None, None);
        assert_ne!(a.digest(), b.digest());
    }
}
