// src/cache/memory_cache.rs - In-process LRU validation cache
use anyhow::Result;
use async_trait::async_trait;
use log::info;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::cache::{CacheKey, ValidationCache};
use crate::models::resolution::AddressMatch;
use crate::models::stats_models::CacheStats;

pub const DEFAULT_MEMORY_CACHE_SIZE: usize = 20000;

#[derive(Debug, Clone)]
struct CachedEntry {
    result: AddressMatch,
    hit_count: i64,
}

pub struct MemoryValidationCache {
    entries: Mutex<LruCache<String, CachedEntry>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl MemoryValidationCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::new(DEFAULT_MEMORY_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN));
        info!("Initializing MemoryValidationCache with capacity: {}", capacity);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Inserts without counting a lookup. Used to warm the front layer from a
    /// slower cache.
    pub async fn remember(&self, key: &CacheKey, result: &AddressMatch) {
        let mut entries = self.entries.lock().await;
        if !entries.contains(key.digest()) {
            entries.put(
                key.digest().to_string(),
                CachedEntry {
                    result: result.clone(),
                    hit_count: 1,
                },
            );
        }
    }

    pub async fn hit_count(&self, key: &CacheKey) -> Option<i64> {
        let entries = self.entries.lock().await;
        entries.peek(key.digest()).map(|e| e.hit_count)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// (hits, misses) seen by `get` since creation.
    pub fn lookup_counts(&self) -> (usize, usize) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }
}

#[async_trait]
impl ValidationCache for MemoryValidationCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<AddressMatch>> {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key.digest()) {
            Some(entry) => {
                entry.hit_count += 1;
                let hits = self.hits.fetch_add(1, Ordering::Relaxed) + 1;
                if hits % 1000 == 0 {
                    let misses = self.misses.load(Ordering::Relaxed);
                    info!(
                        "MemoryValidationCache stats - hits: {}, misses: {}, hit rate: {:.2}%",
                        hits,
                        misses,
                        (hits as f64 / (hits + misses) as f64) * 100.0
                    );
                }
                Ok(Some(entry.result.clone()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &CacheKey, result: &AddressMatch) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key.digest()) {
            entry.hit_count += 1;
        } else {
            entries.put(
                key.digest().to_string(),
                CachedEntry {
                    result: result.clone(),
                    hit_count: 1,
                },
            );
        }
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        let entries = self.entries.lock().await;
        let total_entries = entries.len() as i64;
        let total_hits: i64 = entries.iter().map(|(_, e)| e.hit_count).sum();
        let max_hits = entries.iter().map(|(_, e)| e.hit_count).max().unwrap_or(0);
        let reused_entries = entries.iter().filter(|(_, e)| e.hit_count > 1).count() as i64;
        Ok(CacheStats {
            total_entries,
            total_hits,
            avg_hits: if total_entries > 0 {
                total_hits as f64 / total_entries as f64
            } else {
                0.0
            },
            max_hits,
            reused_entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resolution::MunicipalityResolution;
    use std::sync::Arc;

    fn key(n: u32) -> CacheKey {
        CacheKey::new(&format!("{} Main St", n), Some("Toronto"), None)
    }

    #[tokio::test]
    async fn test_duplicate_puts_merge_into_counter() {
        let cache = MemoryValidationCache::new(10);
        let result = AddressMatch::unresolved();
        cache.put(&key(1), &result).await.unwrap();
        cache.put(&key(1), &result).await.unwrap();
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.hit_count(&key(1)).await, Some(2));

        assert!(cache.get(&key(1)).await.unwrap().is_some());
        assert_eq!(cache.hit_count(&key(1)).await, Some(3));
        assert!(cache.get(&key(2)).await.unwrap().is_none());
        assert_eq!(cache.lookup_counts(), (1, 1));
    }

    #[tokio::test]
    async fn test_concurrent_puts_leave_one_entry() {
        let cache = Arc::new(MemoryValidationCache::new(10));
        let result = AddressMatch::not_found(&MunicipalityResolution::unresolved());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let result = result.clone();
                tokio::spawn(async move { cache.put(&key(7), &result).await })
            })
            .collect();
        for h in futures::future::join_all(handles).await {
            h.unwrap().unwrap();
        }
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.hit_count(&key(7)).await, Some(8));
    }

    #[tokio::test]
    async fn test_stats_and_eviction() {
        let cache = MemoryValidationCache::new(2);
        let result = AddressMatch::unresolved();
        cache.put(&key(1), &result).await.unwrap();
        cache.put(&key(1), &result).await.unwrap();
        cache.put(&key(2), &result).await.unwrap();
        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.total_hits, 3);
        assert_eq!(stats.max_hits, 2);
        assert_eq!(stats.reused_entries, 1);

        cache.put(&key(3), &result).await.unwrap();
        assert_eq!(cache.len().await, 2);
        assert!(cache.hit_count(&key(1)).await.is_none());
    }
}
