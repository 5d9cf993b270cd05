pub mod export;

pub use export::{fetch_export_rows, write_csv, ExportRow, PersistedState, RawBefore, ResolverSuggestion};
