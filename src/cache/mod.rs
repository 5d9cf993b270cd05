// src/cache/mod.rs - Validation cache seam
use anyhow::Result;
use async_trait::async_trait;

use crate::models::resolution::AddressMatch;
use crate::models::stats_models::CacheStats;

pub mod cache_key;
pub mod layered;
pub mod memory_cache;
pub mod pg_cache;

pub use cache_key::CacheKey;
pub use layered::LayeredValidationCache;
pub use memory_cache::MemoryValidationCache;
pub use pg_cache::PgValidationCache;

/// Keyed store of resolver outcomes. `put` is an idempotent upsert: a repeat
/// write bumps the entry's lookup counter instead of failing.
#[async_trait]
pub trait ValidationCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<AddressMatch>>;
    async fn put(&self, key: &CacheKey, result: &AddressMatch) -> Result<()>;
    async fn stats(&self) -> Result<CacheStats>;
}
