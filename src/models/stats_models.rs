// src/models/stats_models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::resolution::ResolutionMethod;

/// Counters for one drained batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub properties_updated: usize,
    pub cities_updated: usize,
    pub postal_codes_updated: usize,
    pub geocoding_updated: usize,
    pub addresses_found: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub by_method: HashMap<ResolutionMethod, usize>,
    pub processing_time: f64,
}

impl BatchStats {
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            (self.cache_hits as f64 / total as f64) * 100.0
        }
    }

    pub fn merge(&mut self, other: &BatchStats) {
        self.claimed += other.claimed;
        self.completed += other.completed;
        self.failed += other.failed;
        self.timed_out += other.timed_out;
        self.properties_updated += other.properties_updated;
        self.cities_updated += other.cities_updated;
        self.postal_codes_updated += other.postal_codes_updated;
        self.geocoding_updated += other.geocoding_updated;
        self.addresses_found += other.addresses_found;
        self.cache_hits += other.cache_hits;
        self.cache_misses += other.cache_misses;
        for (method, count) in &other.by_method {
            *self.by_method.entry(*method).or_insert(0) += count;
        }
        self.processing_time += other.processing_time;
    }
}

/// Aggregate view of the validation cache table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_entries: i64,
    pub total_hits: i64,
    pub avg_hits: f64,
    pub max_hits: i64,
    pub reused_entries: i64,
}

impl CacheStats {
    pub fn reuse_rate(&self) -> f64 {
        if self.total_entries > 0 {
            (self.reused_entries as f64 / self.total_entries as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// One row of `nar_validation_stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total_validated: i64,
    pub nar_found: i64,
    pub high_confidence: i64,
    pub cities_updated: i64,
    pub postal_codes_updated: i64,
    pub geocoding_updated: i64,
}

/// Queue-side health indicators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueHealth {
    pub stuck: i64,
    pub failed: i64,
    pub last_completed_at: Option<DateTime<Utc>>,
}
