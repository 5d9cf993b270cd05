// src/matching/geocoder.rs - Optional last-resort municipality source
use async_trait::async_trait;

/// What a geocoding provider said about an address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Provider integration lives outside this crate; the resolver only needs
/// a city back. Errors are treated as "no answer".
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address_text: &str, province: &str) -> anyhow::Result<Option<GeocodeHit>>;
}
