// src/orchestrator/resolution.rs - Cache -> parse -> expand -> resolve -> match
use log::{debug, warn};
use std::sync::Arc;

use crate::cache::{CacheKey, ValidationCache};
use crate::matching::address_matcher::AddressMatcher;
use crate::matching::municipality::MunicipalityResolver;
use crate::matching::reference_store::ReferenceStoreError;
use crate::models::address::{ParsedAddress, RawAddressRecord};
use crate::models::resolution::AddressMatch;
use crate::parsing::address_parser::parse_record;
use crate::parsing::range_expander::expand_with_cap;

/// What the resolver produced for one raw record.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Absent on cache hits.
    pub parsed: Option<ParsedAddress>,
    pub result: AddressMatch,
    pub cache_hit: bool,
}

/// The pure resolution half of the pipeline. Never touches property rows.
pub struct AddressResolver {
    cache: Arc<dyn ValidationCache>,
    municipality: MunicipalityResolver,
    matcher: AddressMatcher,
    max_range_span: usize,
}

impl AddressResolver {
    pub fn new(
        cache: Arc<dyn ValidationCache>,
        municipality: MunicipalityResolver,
        matcher: AddressMatcher,
        max_range_span: usize,
    ) -> Self {
        Self {
            cache,
            municipality,
            matcher,
            max_range_span,
        }
    }

    /// Cache failures degrade to a miss (on read) or are skipped (on write).
    /// Only reference store failures are returned, and nothing is cached
    /// when one happens.
    pub async fn resolve(&self, raw: &RawAddressRecord) -> Result<Resolved, ReferenceStoreError> {
        let key = CacheKey::from_record(raw);
        match self.cache.get(&key).await {
            Ok(Some(result)) => {
                debug!("💾 Cache hit for '{}'", raw.address_text);
                return Ok(Resolved {
                    parsed: None,
                    result,
                    cache_hit: true,
                });
            }
            Ok(None) => {}
            Err(e) => warn!("⚠️ Cache read failed for '{}', resolving fresh: {:#}", raw.address_text, e),
        }

        let parsed = parse_record(raw);
        if parsed.is_unparseable() {
            debug!("Unparseable address '{}' for {}", raw.address_text, raw.source_id);
            return Ok(Resolved {
                parsed: Some(parsed),
                result: AddressMatch::unresolved(),
                cache_hit: false,
            });
        }

        let resolution = self
            .municipality
            .resolve(&parsed, &raw.address_text, &raw.province_hint)
            .await?;
        let result = match parsed.house_number_token.as_deref() {
            Some(token) => {
                let candidates = expand_with_cap(token, self.max_range_span);
                self.matcher
                    .match_address(&candidates, &parsed.street_name, &resolution)
                    .await?
            }
            None => AddressMatch::not_found(&resolution),
        };

        if let Err(e) = self.cache.put(&key, &result).await {
            warn!("⚠️ Cache write failed for '{}': {:#}", raw.address_text, e);
        }
        Ok(Resolved {
            parsed: Some(parsed),
            result,
            cache_hit: false,
        })
    }
}
