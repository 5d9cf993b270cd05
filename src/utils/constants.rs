// src/utils/constants.rs

/// Reported to Postgres as `application_name`.
pub const APPLICATION_NAME: &str = "nar_validation_service";

/// Database used when neither `DATABASE_URL` nor `POSTGRES_DB` is set.
pub const DEFAULT_DATABASE_NAME: &str = "nar_validation";

/// Reference table holding the national address register rows.
pub const DEFAULT_REFERENCE_TABLE: &str = "public.nar_addresses";

/// Items claimed per batch when `BATCH_SIZE` is unset.
pub const DEFAULT_BATCH_SIZE: usize = 100;

pub const DEFAULT_ITEM_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// A `processing` item older than this is considered abandoned.
pub const DEFAULT_STALE_AFTER_MINUTES: u64 = 30;
