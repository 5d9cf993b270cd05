// src/matching/municipality.rs - Confidence-ranked municipality cascade
use log::{debug, warn};
use std::sync::Arc;

use crate::matching::amalgamations::AmalgamationTable;
use crate::matching::city_index::CityIndex;
use crate::matching::geocoder::Geocoder;
use crate::matching::reference_store::{ReferenceStore, ReferenceStoreError};
use crate::models::address::ParsedAddress;
use crate::models::resolution::{MunicipalityResolution, ResolutionMethod};

/// Default minimum similarity for a fuzzy city match.
pub const DEFAULT_FUZZY_THRESHOLD: u8 = 85;

/// Runs postal -> exact -> amalgamation -> fuzzy -> geocode, stopping at the
/// first method that yields a city. Only reference store infrastructure
/// failures surface as errors.
pub struct MunicipalityResolver {
    store: Arc<dyn ReferenceStore>,
    cities: Arc<CityIndex>,
    amalgamations: Arc<AmalgamationTable>,
    geocoder: Option<Arc<dyn Geocoder>>,
    fuzzy_threshold: u8,
}

impl MunicipalityResolver {
    pub fn new(
        store: Arc<dyn ReferenceStore>,
        cities: Arc<CityIndex>,
        amalgamations: Arc<AmalgamationTable>,
        fuzzy_threshold: u8,
    ) -> Self {
        Self {
            store,
            cities,
            amalgamations,
            geocoder: None,
            fuzzy_threshold: fuzzy_threshold.min(100),
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub async fn resolve(
        &self,
        parsed: &ParsedAddress,
        address_text: &str,
        province: &str,
    ) -> Result<MunicipalityResolution, ReferenceStoreError> {
        if let Some(postal) = parsed.postal_code() {
            if let Some(city) = self.city_by_postal(postal).await? {
                debug!("📮 Postal {} -> {}", postal, city);
                return Ok(MunicipalityResolution::by_method(ResolutionMethod::PostalCode, city));
            }
        }

        if let Some(city_hint) = parsed.city.as_deref() {
            if let Some(city) = self.known_city(city_hint).await? {
                return Ok(MunicipalityResolution::by_method(ResolutionMethod::ExactMatch, city));
            }

            if let Some(target) = self.amalgamations.current_for(city_hint) {
                if let Some(city) = self.known_city(target).await? {
                    debug!("🏛️ Former municipality {} -> {}", city_hint, city);
                    return Ok(MunicipalityResolution::by_method(ResolutionMethod::Amalgamation, city));
                }
            }

            if let Some((city, score)) = self.cities.best_fuzzy(city_hint, self.fuzzy_threshold) {
                debug!("🔤 Fuzzy city {} -> {} ({})", city_hint, city, score);
                return Ok(MunicipalityResolution::fuzzy(city.to_uppercase(), score));
            }
        }

        if let Some(city) = self.city_by_geocoder(address_text, province).await {
            return Ok(MunicipalityResolution::by_method(ResolutionMethod::Geocode, city));
        }

        Ok(MunicipalityResolution::unresolved())
    }

    /// Majority city for a postal code; the first-seen city wins ties.
    async fn city_by_postal(&self, postal: &str) -> Result<Option<String>, ReferenceStoreError> {
        let counts = self.store.city_counts_for_postal(postal).await?;
        let mut best: Option<(String, i64)> = None;
        for (city, count) in counts {
            if city.trim().is_empty() {
                continue;
            }
            if best.as_ref().map_or(true, |(_, c)| count > *c) {
                best = Some((city, count));
            }
        }
        Ok(best.map(|(city, _)| city.trim().to_uppercase()))
    }

    /// Reference spelling of `city` if it exists. Uses the in-memory index
    /// when loaded, otherwise asks the store.
    async fn known_city(&self, city: &str) -> Result<Option<String>, ReferenceStoreError> {
        if !self.cities.is_empty() {
            return Ok(self.cities.lookup(city).map(str::to_uppercase));
        }
        if self.store.city_exists(city).await? {
            Ok(Some(city.trim().to_uppercase()))
        } else {
            Ok(None)
        }
    }

    async fn city_by_geocoder(&self, address_text: &str, province: &str) -> Option<String> {
        let geocoder = self.geocoder.as_ref()?;
        match geocoder.geocode(address_text, province).await {
            Ok(Some(hit)) => hit
                .city
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty()),
            Ok(None) => None,
            Err(e) => {
                warn!("⚠️ Geocoder failed for '{}': {}", address_text, e);
                None
            }
        }
    }
}
