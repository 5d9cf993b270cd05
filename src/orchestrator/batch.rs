// src/orchestrator/batch.rs - Claim a batch, resolve it with a bounded worker pool
use anyhow::{Context, Result};
use futures::future::join_all;
use futures::FutureExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::models::queue::ResetRequest;
use crate::models::stats_models::BatchStats;
use crate::orchestrator::health::{HealthStatus, ServiceHealth};
use crate::orchestrator::{Outcome, ResolutionOrchestrator};
use crate::queue::WorkQueue;
use crate::utils::config::ResolverConfig;
use crate::utils::progress_bars::logging::ResolutionLogger;

/// Refresh `nar_validation_stats` after this many processed items.
const DAILY_STATS_EVERY: usize = 100;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub worker_count: usize,
    pub item_timeout: Duration,
    pub stale_after: Duration,
    pub auto_reset_stale: bool,
}

impl From<&ResolverConfig> for BatchConfig {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            worker_count: config.worker_count,
            item_timeout: config.item_timeout,
            stale_after: config.stale_after,
            auto_reset_stale: config.auto_reset_stale,
        }
    }
}

pub struct BatchProcessor {
    orchestrator: Arc<ResolutionOrchestrator>,
    queue: Arc<dyn WorkQueue>,
    config: BatchConfig,
}

fn tally(stats: &mut BatchStats, outcome: &Outcome) {
    match outcome {
        Outcome::Completed(details) => {
            stats.completed += 1;
            if details.cache_hit {
                stats.cache_hits += 1;
            } else {
                stats.cache_misses += 1;
            }
            if details.result.found {
                stats.addresses_found += 1;
            }
            *stats.by_method.entry(details.result.method).or_insert(0) += 1;
            if !details.update.is_empty() {
                stats.properties_updated += 1;
            }
            if details.update.city.is_some() {
                stats.cities_updated += 1;
            }
            if details.update.postal_code.is_some() {
                stats.postal_codes_updated += 1;
            }
            if details.update.updates_geocoding() {
                stats.geocoding_updated += 1;
            }
        }
        Outcome::Failed { .. } => stats.failed += 1,
    }
}

impl BatchProcessor {
    pub fn new(
        orchestrator: Arc<ResolutionOrchestrator>,
        queue: Arc<dyn WorkQueue>,
        config: BatchConfig,
    ) -> Self {
        Self {
            orchestrator,
            queue,
            config,
        }
    }

    /// Claims up to `batch_size` items and resolves them concurrently. Items
    /// that exceed `item_timeout` are abandoned in `processing`.
    pub async fn run_batch(&self, multi_progress: Option<&MultiProgress>) -> Result<BatchStats> {
        let start = Instant::now();

        if self.config.auto_reset_stale {
            let reset = self
                .queue
                .reset(&ResetRequest {
                    include_failed: false,
                    stale_after: Some(self.config.stale_after),
                    clear_attempts: false,
                })
                .await
                .context("Failed to reset stale queue items")?;
            if reset > 0 {
                warn!("⏰ Returned {} stale processing item(s) to pending", reset);
            }
        }

        let items = self
            .queue
            .claim_batch(self.config.batch_size)
            .await
            .context("Failed to claim queue batch")?;
        let mut stats = BatchStats {
            claimed: items.len(),
            ..Default::default()
        };
        if items.is_empty() {
            return Ok(stats);
        }
        info!("📦 Processing batch of {} properties...", items.len());

        let pb = multi_progress.map(|mp| {
            let pb = mp.add(ProgressBar::new(items.len() as u64));
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {spinner:.blue} [{elapsed_precise}] {bar:30.green/white} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▉▊▋▌▍▎▏  "),
            );
            pb.set_message("Resolving addresses...");
            pb
        });

        let semaphore = Arc::new(Semaphore::new(self.config.worker_count.max(1)));
        let mut tasks = Vec::with_capacity(items.len());
        for item in items {
            let orchestrator = self.orchestrator.clone();
            let semaphore = semaphore.clone();
            let item_timeout = self.config.item_timeout;
            let pb = pb.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = timeout(item_timeout, orchestrator.resolve_and_apply(&item.property_id)).await;
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
                (item.property_id, result)
            }));
        }

        for joined in join_all(tasks).await {
            match joined {
                Ok((_, Ok(outcome))) => tally(&mut stats, &outcome),
                Ok((property_id, Err(_))) => {
                    stats.timed_out += 1;
                    warn!(
                        "⏰ Property {} exceeded {:?}; left in processing for a later reset",
                        property_id, self.config.item_timeout
                    );
                }
                Err(e) => {
                    stats.failed += 1;
                    error!("Task panicked: {}", e);
                }
            }
        }

        stats.processing_time = start.elapsed().as_secs_f64();
        if let Some(pb) = &pb {
            pb.finish_with_message(format!(
                "Batch done: {} completed, {} failed, {} updated",
                stats.completed, stats.failed, stats.properties_updated
            ));
        }
        Ok(stats)
    }

    /// Polls the queue until `shutdown` resolves. A batch in flight always
    /// finishes first. Short polls sleep for `poll_interval`, and daily
    /// statistics refresh every hundred items.
    pub async fn run_service_loop<F>(
        &self,
        poll_interval: Duration,
        multi_progress: Option<MultiProgress>,
        shutdown: F,
    ) -> BatchStats
    where
        F: std::future::Future<Output = ()>,
    {
        let logger = ResolutionLogger::new("SERVICE", "🛰️");
        let mut health = ServiceHealth::new(Instant::now());
        let mut totals = BatchStats::default();
        let mut since_stats_refresh = 0usize;
        tokio::pin!(shutdown);

        loop {
            if shutdown.as_mut().now_or_never().is_some() {
                break;
            }

            let claimed = match self.run_batch(multi_progress.as_ref()).await {
                Ok(stats) => {
                    if stats.claimed > 0 {
                        health.record_success(Instant::now());
                        logger.log_batch_summary(&stats);
                        since_stats_refresh += stats.completed + stats.failed;
                    }
                    totals.merge(&stats);
                    stats.claimed
                }
                Err(e) => {
                    health.record_failure();
                    logger.log_error(&format!(
                        "Batch failed ({} in a row): {:#}",
                        health.consecutive_failures(),
                        e
                    ));
                    0
                }
            };

            if since_stats_refresh >= DAILY_STATS_EVERY {
                match self.queue.refresh_daily_stats().await {
                    Ok(()) => since_stats_refresh = 0,
                    Err(e) => logger.log_warning(&format!("Failed to update daily stats: {:#}", e)),
                }
            }

            match health.check(Instant::now()) {
                HealthStatus::Healthy => {}
                HealthStatus::Failing { consecutive_failures } => logger.log_error(&format!(
                    "🚨 Service has failed {} consecutive times",
                    consecutive_failures
                )),
                HealthStatus::Idle { idle_for } => logger.log_warning(&format!(
                    "💤 No successful batch for {:.1} hours",
                    idle_for.as_secs_f64() / 3600.0
                )),
            }

            if claimed < self.config.batch_size {
                if claimed == 0 {
                    logger.log_debug(&format!("Queue empty - waiting {:?}", poll_interval));
                }
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        }

        if since_stats_refresh > 0 {
            if let Err(e) = self.queue.refresh_daily_stats().await {
                logger.log_warning(&format!("Failed to update daily stats on shutdown: {:#}", e));
            }
        }
        logger.log_service_totals(&totals);
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::queue::QueueStatus;
    use crate::test_support::{Fixture, InMemoryReferenceStore};

    fn config() -> BatchConfig {
        BatchConfig {
            batch_size: 10,
            worker_count: 4,
            item_timeout: Duration::from_secs(5),
            stale_after: Duration::from_secs(30 * 60),
            auto_reset_stale: false,
        }
    }

    fn reference() -> InMemoryReferenceStore {
        InMemoryReferenceStore::new()
            .with_address("1521", "YONGE ST", "TORONTO", "M4T 1Z2", 43.6889, -79.3937)
            .with_address("2", "HEMLO DR", "MARATHON", "P0T 2E0", 48.7190, -86.3790)
    }

    #[tokio::test]
    async fn test_batch_processes_and_tallies() {
        let fx = Fixture::new(reference());
        fx.add_property("a", "1521 Yonge Street", Some("Toronto"), Some("M4T1Z2")).await;
        fx.add_property("b", "3 Peninsula Road", Some("Marathon"), Some("P0T2E0")).await;
        fx.add_property("c", "", None, None).await;
        for id in ["a", "b", "c"] {
            fx.queue.enqueue(id, 5).await.unwrap();
        }

        let processor = BatchProcessor::new(fx.orchestrator.clone(), fx.queue.clone(), config());
        let stats = processor.run_batch(None).await.unwrap();
        assert_eq!(stats.claimed, 3);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.addresses_found, 1);
        assert_eq!(stats.properties_updated, 2);
        assert_eq!(stats.cities_updated, 2);
        assert_eq!(stats.postal_codes_updated, 1);
        assert_eq!(stats.geocoding_updated, 1);
        for id in ["a", "b", "c"] {
            assert_eq!(fx.queue_item(id).await.status, QueueStatus::Completed);
        }

        let empty = processor.run_batch(None).await.unwrap();
        assert_eq!(empty.claimed, 0);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_batch() {
        let fx = Fixture::new(reference());
        fx.add_property("a", "1521 Yonge Street", Some("Toronto"), Some("M4T1Z2")).await;
        fx.queue.enqueue("a", 5).await.unwrap();
        fx.queue.enqueue("missing", 5).await.unwrap();

        let processor = BatchProcessor::new(fx.orchestrator.clone(), fx.queue.clone(), config());
        let stats = processor.run_batch(None).await.unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(fx.queue_item("missing").await.status, QueueStatus::Failed);
    }

    #[tokio::test]
    async fn test_timed_out_item_stays_processing() {
        let fx = Fixture::new(reference().with_delay(Duration::from_millis(500)));
        fx.add_property("slow", "1521 Yonge Street", Some("Toronto"), Some("M4T1Z2")).await;
        fx.queue.enqueue("slow", 5).await.unwrap();

        let mut cfg = config();
        cfg.item_timeout = Duration::from_millis(20);
        let processor = BatchProcessor::new(fx.orchestrator.clone(), fx.queue.clone(), cfg);
        let stats = processor.run_batch(None).await.unwrap();
        assert_eq!(stats.timed_out, 1);
        assert_eq!(fx.queue_item("slow").await.status, QueueStatus::Processing);
        assert_eq!(fx.property("slow").await.city.as_deref(), Some("Toronto"));
    }

    #[tokio::test]
    async fn test_auto_reset_reclaims_stale_items() {
        let fx = Fixture::new(reference());
        fx.add_property("a", "1521 Yonge Street", Some("Toronto"), Some("M4T1Z2")).await;
        fx.claim("a").await;
        fx.queue.backdate_attempt("a", chrono::Duration::minutes(45)).await;

        let mut cfg = config();
        cfg.auto_reset_stale = true;
        let processor = BatchProcessor::new(fx.orchestrator.clone(), fx.queue.clone(), cfg);
        let stats = processor.run_batch(None).await.unwrap();
        assert_eq!(stats.claimed, 1);
        assert_eq!(stats.completed, 1);
        let item = fx.queue_item("a").await;
        assert_eq!(item.status, QueueStatus::Completed);
        assert_eq!(item.attempts, 2);
    }

    #[tokio::test]
    async fn test_priority_order_when_batch_is_smaller_than_queue() {
        let fx = Fixture::new(reference());
        for (id, priority) in [("low", 9), ("high", 1), ("mid", 5)] {
            fx.add_property(id, "", None, None).await;
            fx.queue.enqueue(id, priority).await.unwrap();
        }
        let mut cfg = config();
        cfg.batch_size = 1;
        let processor = BatchProcessor::new(fx.orchestrator.clone(), fx.queue.clone(), cfg);
        processor.run_batch(None).await.unwrap();
        assert_eq!(fx.queue_item("high").await.status, QueueStatus::Completed);
        assert_eq!(fx.queue_item("mid").await.status, QueueStatus::Pending);
        assert_eq!(fx.queue_item("low").await.status, QueueStatus::Pending);
    }

    #[tokio::test]
    async fn test_service_loop_stops_on_shutdown() {
        let fx = Fixture::new(reference());
        fx.add_property("a", "1521 Yonge Street", Some("Toronto"), Some("M4T1Z2")).await;
        fx.queue.enqueue("a", 5).await.unwrap();
        let processor = BatchProcessor::new(fx.orchestrator.clone(), fx.queue.clone(), config());
        let totals = processor
            .run_service_loop(
                Duration::from_millis(10),
                None,
                tokio::time::sleep(Duration::from_millis(100)),
            )
            .await;
        assert_eq!(totals.completed, 1);
        assert_eq!(fx.queue.daily_stats_refreshes(), 1);
    }
}
