pub mod property_store;

pub use property_store::{PgPropertyStore, PropertyStore};
