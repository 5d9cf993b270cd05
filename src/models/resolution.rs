// src/models/resolution.rs - Resolver-only results (never persisted as-is)
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a municipality was determined. The fixed confidence each method
/// carries is declared in `fixed_confidence` and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    PostalCode,
    ExactMatch,
    Amalgamation,
    Fuzzy,
    Geocode,
    None,
}

impl ResolutionMethod {
    /// Cascade order, first to last.
    pub const CASCADE: [ResolutionMethod; 6] = [
        ResolutionMethod::PostalCode,
        ResolutionMethod::ExactMatch,
        ResolutionMethod::Amalgamation,
        ResolutionMethod::Fuzzy,
        ResolutionMethod::Geocode,
        ResolutionMethod::None,
    ];

    /// Confidence table. `Fuzzy` has no fixed value: it carries its own
    /// similarity score, which must clear the fuzzy threshold.
    pub fn fixed_confidence(&self) -> Option<u8> {
        match self {
            ResolutionMethod::PostalCode => Some(95),
            ResolutionMethod::ExactMatch => Some(90),
            ResolutionMethod::Amalgamation => Some(85),
            ResolutionMethod::Fuzzy => None,
            ResolutionMethod::Geocode => Some(75),
            ResolutionMethod::None => Some(0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::PostalCode => "postal_code",
            ResolutionMethod::ExactMatch => "exact_match",
            ResolutionMethod::Amalgamation => "amalgamation",
            ResolutionMethod::Fuzzy => "fuzzy",
            ResolutionMethod::Geocode => "geocode",
            ResolutionMethod::None => "none",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::CASCADE.iter().copied().find(|m| m.as_str() == s)
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the municipality cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MunicipalityResolution {
    pub city: Option<String>,
    pub confidence: u8,
    pub method: ResolutionMethod,
}

impl MunicipalityResolution {
    pub fn unresolved() -> Self {
        Self {
            city: None,
            confidence: 0,
            method: ResolutionMethod::None,
        }
    }

    /// A resolution by one of the fixed-confidence methods.
    ///
    /// Passing `ResolutionMethod::Fuzzy` here is a programming error; use
    /// [`MunicipalityResolution::fuzzy`]. It degrades to `unresolved`.
    pub fn by_method(method: ResolutionMethod, city: impl Into<String>) -> Self {
        match method.fixed_confidence() {
            Some(confidence) if method != ResolutionMethod::None => Self {
                city: Some(city.into()),
                confidence,
                method,
            },
            _ => Self::unresolved(),
        }
    }

    pub fn fuzzy(city: impl Into<String>, score: u8) -> Self {
        Self {
            city: Some(city.into()),
            confidence: score.min(100),
            method: ResolutionMethod::Fuzzy,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.method != ResolutionMethod::None
    }
}

/// Confidence of a street-level hit against the reference.
pub const EXACT_ADDRESS_CONFIDENCE: u8 = 100;

/// Result of matching parsed components against the reference store.
/// This is what the validation cache stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressMatch {
    pub found: bool,
    pub matched_house_number: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub confidence: u8,
    pub method: ResolutionMethod,
}

impl AddressMatch {
    /// No street-level hit; keeps the municipality's city and confidence so
    /// a verified city can still be applied on its own.
    pub fn not_found(resolution: &MunicipalityResolution) -> Self {
        Self {
            found: false,
            matched_house_number: None,
            city: resolution.city.clone(),
            postal_code: None,
            latitude: None,
            longitude: None,
            confidence: resolution.confidence,
            method: resolution.method,
        }
    }

    /// Nothing usable at all (unparseable input).
    pub fn unresolved() -> Self {
        Self::not_found(&MunicipalityResolution::unresolved())
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}
