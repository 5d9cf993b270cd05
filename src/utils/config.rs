// src/utils/config.rs - Environment-driven resolver settings
use log::{info, warn};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::memory_cache::DEFAULT_MEMORY_CACHE_SIZE;
use crate::matching::address_matcher::DEFAULT_MIN_CITY_CONFIDENCE;
use crate::matching::municipality::DEFAULT_FUZZY_THRESHOLD;
use crate::models::address::DEFAULT_PROVINCE;
use crate::orchestrator::update_policy::DEFAULT_UPDATE_THRESHOLD;
use crate::parsing::range_expander::DEFAULT_MAX_RANGE_SPAN;
use crate::utils::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_ITEM_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_REFERENCE_TABLE, DEFAULT_STALE_AFTER_MINUTES,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    pub fuzzy_city_threshold: u8,
    pub max_range_span: usize,
    pub update_confidence_threshold: u8,
    pub match_min_city_confidence: u8,
    pub batch_size: usize,
    pub worker_count: usize,
    pub item_timeout: Duration,
    pub poll_interval: Duration,
    pub stale_after: Duration,
    pub auto_reset_stale: bool,
    pub memory_cache_size: usize,
    pub reference_table: String,
    pub default_province: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_city_threshold: DEFAULT_FUZZY_THRESHOLD,
            max_range_span: DEFAULT_MAX_RANGE_SPAN,
            update_confidence_threshold: DEFAULT_UPDATE_THRESHOLD,
            match_min_city_confidence: DEFAULT_MIN_CITY_CONFIDENCE,
            batch_size: DEFAULT_BATCH_SIZE,
            worker_count: num_cpus::get(),
            item_timeout: Duration::from_secs(DEFAULT_ITEM_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_MINUTES * 60),
            auto_reset_stale: false,
            memory_cache_size: DEFAULT_MEMORY_CACHE_SIZE,
            reference_table: DEFAULT_REFERENCE_TABLE.to_string(),
            default_province: DEFAULT_PROVINCE.to_string(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

/// Percent-scale settings are clamped to 0..=100.
fn env_percent(key: &str, default: u8) -> u8 {
    env_or::<u16>(key, default as u16).min(100) as u8
}

/// Like `env_percent`, but may only tighten `floor`, never loosen it.
fn env_percent_at_least(key: &str, floor: u8) -> u8 {
    let value = env_percent(key, floor);
    if value < floor {
        warn!("{}={} is below the minimum of {}; using {}", key, value, floor, floor);
    }
    value.max(floor)
}

impl ResolverConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fuzzy_city_threshold: env_percent("FUZZY_CITY_THRESHOLD", defaults.fuzzy_city_threshold),
            max_range_span: env_or("MAX_RANGE_SPAN", defaults.max_range_span).max(1),
            update_confidence_threshold: env_percent_at_least(
                "UPDATE_CONFIDENCE_THRESHOLD",
                DEFAULT_UPDATE_THRESHOLD,
            ),
            match_min_city_confidence: env_percent_at_least(
                "MATCH_MIN_CITY_CONFIDENCE",
                DEFAULT_MIN_CITY_CONFIDENCE,
            ),
            batch_size: env_or("BATCH_SIZE", defaults.batch_size).max(1),
            worker_count: env_or("WORKER_COUNT", defaults.worker_count).max(1),
            item_timeout: Duration::from_secs(env_or("ITEM_TIMEOUT_SECS", DEFAULT_ITEM_TIMEOUT_SECS)),
            poll_interval: Duration::from_secs(env_or("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)),
            stale_after: Duration::from_secs(
                env_or("STALE_AFTER_MINUTES", DEFAULT_STALE_AFTER_MINUTES) * 60,
            ),
            auto_reset_stale: env_or("AUTO_RESET_STALE", defaults.auto_reset_stale),
            memory_cache_size: env_or("MEMORY_CACHE_SIZE", defaults.memory_cache_size),
            reference_table: env::var("NAR_REFERENCE_TABLE").unwrap_or(defaults.reference_table),
            default_province: env::var("DEFAULT_PROVINCE")
                .map(|p| p.trim().to_uppercase())
                .unwrap_or(defaults.default_province),
        }
    }

    pub fn log_summary(&self) {
        info!("⚙️  Resolver configuration:");
        info!(
            "   Thresholds: fuzzy city {}, update {}, street match needs city >= {}",
            self.fuzzy_city_threshold, self.update_confidence_threshold, self.match_min_city_confidence
        );
        info!(
            "   Batch: {} items, {} workers, {:?} per item, poll every {:?}",
            self.batch_size, self.worker_count, self.item_timeout, self.poll_interval
        );
        info!(
            "   Queue: stale after {:?} (auto reset: {})",
            self.stale_after, self.auto_reset_stale
        );
        info!(
            "   Reference: {} ({}), range cap {}, memory cache {}",
            self.reference_table, self.default_province, self.max_range_span, self.memory_cache_size
        );
    }
}
