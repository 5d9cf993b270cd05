// src/matching/address_matcher.rs - Street-level lookup of candidate numbers
use log::debug;
use std::sync::Arc;

use crate::matching::reference_store::{ReferenceStore, ReferenceStoreError};
use crate::models::address::{CandidateNumbers, PostalHint};
use crate::models::resolution::{AddressMatch, MunicipalityResolution, EXACT_ADDRESS_CONFIDENCE};
use crate::parsing::address_parser::normalize_postal;

/// Cities resolved below this confidence are never queried at street level.
pub const DEFAULT_MIN_CITY_CONFIDENCE: u8 = 85;

/// Reference zipcodes are stored compact or spaced; only `AAA BAA` leaves here.
fn canonical_postal(raw: &str) -> Option<String> {
    match normalize_postal(raw) {
        Some(PostalHint::Canonical(code)) => Some(code),
        _ => None,
    }
}

pub struct AddressMatcher {
    store: Arc<dyn ReferenceStore>,
    min_city_confidence: u8,
}

impl AddressMatcher {
    pub fn new(store: Arc<dyn ReferenceStore>, min_city_confidence: u8) -> Self {
        Self {
            store,
            min_city_confidence,
        }
    }

    /// Tries each candidate in order; the first reference hit wins.
    pub async fn match_address(
        &self,
        candidates: &CandidateNumbers,
        street_name: &str,
        resolution: &MunicipalityResolution,
    ) -> Result<AddressMatch, ReferenceStoreError> {
        let city = match resolution.city.as_deref() {
            Some(city) if resolution.confidence >= self.min_city_confidence => city,
            _ => {
                debug!(
                    "Skipping street lookup: city {:?} at confidence {}",
                    resolution.city, resolution.confidence
                );
                return Ok(AddressMatch::not_found(resolution));
            }
        };
        if street_name.trim().is_empty() {
            return Ok(AddressMatch::not_found(resolution));
        }

        for number in candidates.iter() {
            if let Some(hit) = self.store.find_address(number, street_name, city).await? {
                debug!("🎯 {} {} found in {}", number, street_name, hit.city);
                return Ok(AddressMatch {
                    found: true,
                    matched_house_number: Some(number.clone()),
                    city: Some(hit.city.trim().to_uppercase()),
                    postal_code: hit.postal_code.as_deref().and_then(canonical_postal),
                    latitude: hit.latitude,
                    longitude: hit.longitude,
                    confidence: EXACT_ADDRESS_CONFIDENCE,
                    method: resolution.method,
                });
            }
        }
        Ok(AddressMatch::not_found(resolution))
    }
}
