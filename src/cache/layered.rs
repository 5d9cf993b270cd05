// src/cache/layered.rs - LRU front layer over a shared backing cache
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::cache::memory_cache::MemoryValidationCache;
use crate::cache::{CacheKey, ValidationCache};
use crate::models::resolution::AddressMatch;
use crate::models::stats_models::CacheStats;

/// Reads hit the in-process LRU first. Every write and every front-layer
/// miss reaches the backing cache; front-layer hits do not, so the backing
/// `lookup_count` only counts lookups this process could not answer itself.
pub struct LayeredValidationCache {
    front: MemoryValidationCache,
    back: Arc<dyn ValidationCache>,
}

impl LayeredValidationCache {
    pub fn new(front_capacity: usize, back: Arc<dyn ValidationCache>) -> Self {
        Self {
            front: MemoryValidationCache::new(front_capacity),
            back,
        }
    }
}

#[async_trait]
impl ValidationCache for LayeredValidationCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<AddressMatch>> {
        if let Some(result) = self.front.get(key).await? {
            return Ok(Some(result));
        }
        let found = self.back.get(key).await?;
        if let Some(result) = &found {
            self.front.remember(key, result).await;
        }
        Ok(found)
    }

    async fn put(&self, key: &CacheKey, result: &AddressMatch) -> Result<()> {
        self.front.remember(key, result).await;
        self.back.put(key, result).await
    }

    async fn stats(&self) -> Result<CacheStats> {
        self.back.stats().await
    }
}
