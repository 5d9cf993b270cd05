// src/utils/progress_bars/logging.rs - Tagged logging helpers for the resolution service
use log::{debug, error, info, warn};
use std::time::Instant;

use crate::models::resolution::ResolutionMethod;
use crate::models::stats_models::{BatchStats, CacheStats};

#[derive(Clone)]
pub struct ResolutionLogger {
    component: &'static str,
    emoji: &'static str,
    start_time: Instant,
}

impl ResolutionLogger {
    pub fn new(component: &'static str, emoji: &'static str) -> Self {
        Self {
            component,
            emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, details: &str) {
        info!("[{}] {} 🚀 Starting {}", self.component, self.emoji, details);
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        let msg = if let Some(details) = details {
            format!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.component, self.emoji, phase, details, elapsed.as_secs_f32()
            )
        } else {
            format!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.component, self.emoji, phase, elapsed.as_secs_f32()
            )
        };
        info!("{}", msg);
    }

    pub fn log_data_loaded(&self, count: usize, data_type: &str) {
        info!(
            "[{}] {} 📊 Loaded {} {} from database",
            self.component, self.emoji, count, data_type
        );
    }

    pub fn log_batch_summary(&self, stats: &BatchStats) {
        info!(
            "[{}] {} ✅ Batch: {} claimed → {} completed, {} failed, {} timed out [{:.2}s]",
            self.component,
            self.emoji,
            stats.claimed,
            stats.completed,
            stats.failed,
            stats.timed_out,
            stats.processing_time
        );
        if stats.properties_updated > 0 {
            info!(
                "[{}] {} 📝 Updated {} properties: {} cities, {} postal codes, {} geocodes",
                self.component,
                self.emoji,
                stats.properties_updated,
                stats.cities_updated,
                stats.postal_codes_updated,
                stats.geocoding_updated
            );
        }
        debug!(
            "[{}] {} 💾 Cache: {} hits / {} misses ({:.1}% hit rate), {} addresses found",
            self.component,
            self.emoji,
            stats.cache_hits,
            stats.cache_misses,
            stats.cache_hit_rate(),
            stats.addresses_found
        );
    }

    pub fn log_service_totals(&self, totals: &BatchStats) {
        let elapsed = self.start_time.elapsed();
        info!(
            "[{}] {} 🏁 Stopped after {:.1}s: {} completed, {} failed, {} timed out, {} properties updated",
            self.component,
            self.emoji,
            elapsed.as_secs_f32(),
            totals.completed,
            totals.failed,
            totals.timed_out,
            totals.properties_updated
        );
        for method in ResolutionMethod::CASCADE.iter() {
            if let Some(count) = totals.by_method.get(method) {
                info!(
                    "[{}] {}    {:<14} {}",
                    self.component,
                    self.emoji,
                    method.as_str(),
                    count
                );
            }
        }
    }

    pub fn log_cache_stats(&self, stats: &CacheStats) {
        info!(
            "[{}] {} 💾 Cache: {} entries, {} total hits (avg {:.2}, max {}), {:.1}% reused",
            self.component,
            self.emoji,
            stats.total_entries,
            stats.total_hits,
            stats.avg_hits,
            stats.max_hits,
            stats.reuse_rate()
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.component, self.emoji, message);
    }

    pub fn log_error(&self, message: &str) {
        error!("[{}] {} ❌ {}", self.component, self.emoji, message);
    }

    pub fn log_debug(&self, message: &str) {
        debug!("[{}] {} 🔍 {}", self.component, self.emoji, message);
    }
}
