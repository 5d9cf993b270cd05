pub mod address;
pub mod property;
pub mod queue;
pub mod resolution;
pub mod stats_models;

pub use address::{CandidateNumbers, ParsedAddress, PostalHint, RawAddressRecord, SourceKind};
pub use property::{PropertyRecord, PropertyUpdate};
pub use queue::{CompletionRecord, QueueItem, QueueStatus, QueueStatusSummary, RecentResult, ResetRequest};
pub use resolution::{AddressMatch, MunicipalityResolution, ResolutionMethod};
pub use stats_models::{BatchStats, CacheStats, DailyStats, QueueHealth};
