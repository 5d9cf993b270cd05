pub mod address_matcher;
pub mod amalgamations;
pub mod city_index;
pub mod geocoder;
pub mod municipality;
pub mod reference_store;

pub use address_matcher::AddressMatcher;
pub use amalgamations::AmalgamationTable;
pub use city_index::CityIndex;
pub use geocoder::{GeocodeHit, Geocoder};
pub use municipality::MunicipalityResolver;
pub use reference_store::{PgReferenceStore, ReferenceAddress, ReferenceStore, ReferenceStoreError};
