// src/orchestrator/update_policy.rs - Confidence-gated, non-destructive update decision
use crate::models::property::{PropertyRecord, PropertyUpdate, NAR_GEOCODE_SOURCE};
use crate::models::resolution::AddressMatch;

/// Minimum overall confidence before anything on the property may change.
pub const DEFAULT_UPDATE_THRESHOLD: u8 = 90;

/// Decides the delta to persist for `property` given a resolver result.
/// Below `threshold` the delta is always empty. At or above it the city is
/// written only when it differs, and postal code/coordinates only when the
/// address itself was found and they differ from what is stored.
pub fn decide(property: &PropertyRecord, result: &AddressMatch, threshold: u8) -> PropertyUpdate {
    let mut update = PropertyUpdate::empty(property.id.clone());
    if result.confidence < threshold {
        return update;
    }

    if let Some(city) = non_blank(result.city.as_deref()) {
        if non_blank(property.city.as_deref()) != Some(city) {
            update.city = Some(city.to_string());
        }
    }

    if result.found {
        if let Some(postal) = non_blank(result.postal_code.as_deref()) {
            if non_blank(property.postal_code.as_deref()) != Some(postal) {
                update.postal_code = Some(postal.to_string());
            }
        }
        if let Some((lat, lon)) = result.coordinates() {
            if property.latitude != Some(lat) || property.longitude != Some(lon) {
                update.coordinates = Some((lat, lon));
                update.geocode_source = Some(NAR_GEOCODE_SOURCE.to_string());
            }
        }
    }
    update
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
