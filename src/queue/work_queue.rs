// src/queue/work_queue.rs - Persisted validation work queue (nar_validation_queue)
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::time::Duration;
use tokio_postgres::Row;

use crate::models::queue::{
    CompletionRecord, QueueItem, QueueStatus, QueueStatusSummary, RecentResult, ResetRequest,
};
use crate::models::resolution::ResolutionMethod;
use crate::models::stats_models::{DailyStats, QueueHealth};
use crate::utils::db_connect::PgPool;

/// One row per property. Transitions are status-guarded so a late writer can
/// never move an item out of a state it does not own.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Adds a property, or puts a completed/failed/stale item back to pending.
    /// A pending or actively processing item is left alone. Returns whether
    /// anything changed.
    async fn enqueue(&self, property_id: &str, priority: i32) -> Result<bool>;

    /// Enqueues every property that has never been queued.
    async fn enqueue_unvalidated(&self, priority: i32, limit: Option<i64>) -> Result<u64>;

    /// Moves up to `limit` pending items to processing, highest priority
    /// (lowest number) and oldest first.
    async fn claim_batch(&self, limit: usize) -> Result<Vec<QueueItem>>;

    async fn mark_completed(&self, record: &CompletionRecord) -> Result<bool>;

    async fn mark_failed(&self, property_id: &str, error: &str) -> Result<bool>;

    async fn status_summary(&self) -> Result<Vec<QueueStatusSummary>>;

    async fn recent_results(&self, limit: i64) -> Result<Vec<RecentResult>>;

    async fn reset(&self, request: &ResetRequest) -> Result<u64>;

    async fn health(&self) -> Result<QueueHealth>;

    async fn refresh_daily_stats(&self) -> Result<()>;

    async fn daily_stats(&self, days: i32) -> Result<Vec<DailyStats>>;
}

pub(crate) const QUEUE_COLUMNS: &str = "property_id, priority, status, attempts, confidence_score, found, method, \
     city_suggested, city_before, city_after, postal_before, postal_after, \
     geocoding_updated, last_error, queued_at, last_attempt_at, completed_at";

pub(crate) fn queue_item_from_row(row: &Row) -> QueueItem {
    let status_raw: String = row.get("status");
    let status = QueueStatus::from_str(&status_raw).unwrap_or_else(|| {
        warn!("Unknown queue status '{}'; reading as failed", status_raw);
        QueueStatus::Failed
    });
    let method: Option<String> = row.get("method");
    QueueItem {
        property_id: row.get("property_id"),
        priority: row.get("priority"),
        status,
        attempts: row.get("attempts"),
        confidence_score: row.get("confidence_score"),
        found: row.get("found"),
        method: method.as_deref().and_then(ResolutionMethod::from_str),
        city_suggested: row.get("city_suggested"),
        city_before: row.get("city_before"),
        city_after: row.get("city_after"),
        postal_before: row.get("postal_before"),
        postal_after: row.get("postal_after"),
        geocoding_updated: row.get::<_, Option<bool>>("geocoding_updated").unwrap_or(false),
        last_error: row.get("last_error"),
        queued_at: row.get("queued_at"),
        last_attempt_at: row.get("last_attempt_at"),
        completed_at: row.get("completed_at"),
    }
}

pub struct PgWorkQueue {
    pool: PgPool,
    stale_after: Duration,
}

impl PgWorkQueue {
    pub fn new(pool: PgPool, stale_after: Duration) -> Self {
        Self { pool, stale_after }
    }

    fn stale_secs(&self) -> f64 {
        self.stale_after.as_secs_f64()
    }
}

#[async_trait]
impl WorkQueue for PgWorkQueue {
    async fn enqueue(&self, property_id: &str, priority: i32) -> Result<bool> {
        let conn = self.pool.get().await.context("Queue: Failed to get DB connection")?;
        let stale_secs = self.stale_secs();
        let changed = conn
            .execute(
                "INSERT INTO nar_validation_queue (property_id, priority, status, attempts, queued_at)
                 VALUES ($1, $2, 'pending', 0, NOW())
                 ON CONFLICT (property_id) DO UPDATE SET
                    status = 'pending',
                    priority = EXCLUDED.priority,
                    queued_at = NOW(),
                    last_error = NULL,
                    completed_at = NULL
                 WHERE nar_validation_queue.status IN ('completed', 'failed')
                    OR (nar_validation_queue.status = 'processing'
                        AND nar_validation_queue.last_attempt_at < NOW() - make_interval(secs => $3))",
                &[&property_id, &priority, &stale_secs],
            )
            .await
            .with_context(|| format!("Queue: Failed to enqueue {}", property_id))?;
        debug!("Enqueue {} (priority {}): {} row(s) changed", property_id, priority, changed);
        Ok(changed > 0)
    }

    async fn enqueue_unvalidated(&self, priority: i32, limit: Option<i64>) -> Result<u64> {
        let conn = self.pool.get().await.context("Queue: Failed to get DB connection")?;
        let inserted = conn
            .execute(
                "INSERT INTO nar_validation_queue (property_id, priority, status, attempts, queued_at)
                 SELECT p.id, $1, 'pending', 0, NOW()
                 FROM properties p
                 WHERE p.address_line1 IS NOT NULL AND p.address_line1 <> ''
                   AND NOT EXISTS (
                       SELECT 1 FROM nar_validation_queue q WHERE q.property_id = p.id
                   )
                 ORDER BY p.id
                 LIMIT $2
                 ON CONFLICT (property_id) DO NOTHING",
                &[&priority, &limit],
            )
            .await
            .context("Queue: Failed to backfill unvalidated properties")?;
        info!("📥 Enqueued {} never-validated properties", inserted);
        Ok(inserted)
    }

    async fn claim_batch(&self, limit: usize) -> Result<Vec<QueueItem>> {
        let conn = self.pool.get().await.context("Queue: Failed to get DB connection")?;
        let limit = limit as i64;
        let sql = format!(
            "UPDATE nar_validation_queue
             SET status = 'processing',
                 attempts = attempts + 1,
                 last_attempt_at = NOW()
             WHERE property_id IN (
                 SELECT property_id FROM nar_validation_queue
                 WHERE status = 'pending'
                 ORDER BY priority ASC, queued_at ASC
                 LIMIT $1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {}",
            QUEUE_COLUMNS
        );
        let rows = conn
            .query(sql.as_str(), &[&limit])
            .await
            .context("Queue: Failed to claim batch")?;
        let mut items: Vec<QueueItem> = rows.iter().map(queue_item_from_row).collect();
        items.sort_by(|a, b| (a.priority, a.queued_at).cmp(&(b.priority, b.queued_at)));
        Ok(items)
    }

    async fn mark_completed(&self, record: &CompletionRecord) -> Result<bool> {
        let conn = self.pool.get().await.context("Queue: Failed to get DB connection")?;
        let method = record.method.as_str();
        let changed = conn
            .execute(
                "UPDATE nar_validation_queue SET
                    status = 'completed',
                    completed_at = NOW(),
                    found = $2,
                    confidence_score = $3,
                    method = $4,
                    city_suggested = $5,
                    city_before = $6,
                    city_after = $7,
                    postal_before = $8,
                    postal_after = $9,
                    geocoding_updated = $10,
                    last_error = NULL
                 WHERE property_id = $1 AND status = 'processing'",
                &[
                    &record.property_id,
                    &record.found,
                    &record.confidence_score,
                    &method,
                    &record.city_suggested,
                    &record.city_before,
                    &record.city_after,
                    &record.postal_before,
                    &record.postal_after,
                    &record.geocoding_updated,
                ],
            )
            .await
            .with_context(|| format!("Queue: Failed to complete {}", record.property_id))?;
        if changed == 0 {
            warn!("Queue item {} was not processing; completion ignored", record.property_id);
        }
        Ok(changed > 0)
    }

    async fn mark_failed(&self, property_id: &str, error: &str) -> Result<bool> {
        let conn = self.pool.get().await.context("Queue: Failed to get DB connection")?;
        let changed = conn
            .execute(
                "UPDATE nar_validation_queue
                 SET status = 'failed', last_error = $2
                 WHERE property_id = $1 AND status = 'processing'",
                &[&property_id, &error],
            )
            .await
            .with_context(|| format!("Queue: Failed to mark {} failed", property_id))?;
        Ok(changed > 0)
    }

    async fn status_summary(&self) -> Result<Vec<QueueStatusSummary>> {
        let conn = self.pool.get().await.context("Queue: Failed to get DB connection")?;
        let rows = conn
            .query(
                "SELECT status,
                        COUNT(*) AS count,
                        COALESCE(AVG(attempts), 0)::DOUBLE PRECISION AS avg_attempts,
                        MIN(queued_at) AS oldest,
                        MAX(queued_at) AS newest
                 FROM nar_validation_queue
                 GROUP BY status",
                &[],
            )
            .await
            .context("Queue: status query failed")?;
        let mut summary: Vec<QueueStatusSummary> = rows
            .iter()
            .filter_map(|row| {
                let status: String = row.get("status");
                QueueStatus::from_str(&status).map(|status| QueueStatusSummary {
                    status,
                    count: row.get("count"),
                    avg_attempts: row.get("avg_attempts"),
                    oldest_queued_at: row.get("oldest"),
                    newest_queued_at: row.get("newest"),
                })
            })
            .collect();
        summary.sort_by_key(|s| QueueStatus::ALL.iter().position(|st| *st == s.status));
        Ok(summary)
    }

    async fn recent_results(&self, limit: i64) -> Result<Vec<RecentResult>> {
        let conn = self.pool.get().await.context("Queue: Failed to get DB connection")?;
        let rows = conn
            .query(
                "SELECT q.property_id, p.address_line1, q.city_before, q.city_after,
                        q.confidence_score, q.found, q.completed_at
                 FROM nar_validation_queue q
                 LEFT JOIN properties p ON q.property_id = p.id
                 WHERE q.status = 'completed'
                 ORDER BY q.completed_at DESC
                 LIMIT $1",
                &[&limit],
            )
            .await
            .context("Queue: recent results query failed")?;
        Ok(rows
            .iter()
            .map(|row| RecentResult {
                property_id: row.get("property_id"),
                address_line1: row.get("address_line1"),
                city_before: row.get("city_before"),
                city_after: row.get("city_after"),
                confidence_score: row.get("confidence_score"),
                found: row.get("found"),
                completed_at: row.get("completed_at"),
            })
            .collect())
    }

    async fn reset(&self, request: &ResetRequest) -> Result<u64> {
        let conn = self.pool.get().await.context("Queue: Failed to get DB connection")?;
        let stale_secs: Option<f64> = request.stale_after.map(|d| d.as_secs_f64());
        let changed = conn
            .execute(
                "UPDATE nar_validation_queue SET
                    status = 'pending',
                    last_error = NULL,
                    attempts = CASE WHEN $3 THEN 0 ELSE attempts END
                 WHERE ($1 AND status = 'failed')
                    OR ($2::DOUBLE PRECISION IS NOT NULL
                        AND status = 'processing'
                        AND (last_attempt_at IS NULL
                             OR last_attempt_at < NOW() - make_interval(secs => $2::DOUBLE PRECISION)))",
                &[&request.include_failed, &stale_secs, &request.clear_attempts],
            )
            .await
            .context("Queue: reset failed")?;
        info!("🔄 Reset {} queue item(s) to pending", changed);
        Ok(changed)
    }

    async fn health(&self) -> Result<QueueHealth> {
        let conn = self.pool.get().await.context("Queue: Failed to get DB connection")?;
        let stale_secs = self.stale_secs();
        let row = conn
            .query_one(
                "SELECT
                    COUNT(*) FILTER (WHERE status = 'processing'
                        AND last_attempt_at < NOW() - make_interval(secs => $1)) AS stuck,
                    COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                    MAX(completed_at) FILTER (WHERE status = 'completed') AS last_completed
                 FROM nar_validation_queue",
                &[&stale_secs],
            )
            .await
            .context("Queue: health query failed")?;
        Ok(QueueHealth {
            stuck: row.get("stuck"),
            failed: row.get("failed"),
            last_completed_at: row.get("last_completed"),
        })
    }

    async fn refresh_daily_stats(&self) -> Result<()> {
        let conn = self.pool.get().await.context("Queue: Failed to get DB connection")?;
        conn.execute(
            "INSERT INTO nar_validation_stats (
                date, total_validated, nar_found, high_confidence,
                cities_updated, postal_codes_updated, geocoding_updated, updated_at
             )
             SELECT CURRENT_DATE,
                    COUNT(*),
                    COUNT(*) FILTER (WHERE found),
                    COUNT(*) FILTER (WHERE confidence_score >= 90),
                    COUNT(*) FILTER (WHERE city_after IS DISTINCT FROM city_before),
                    COUNT(*) FILTER (WHERE postal_after IS DISTINCT FROM postal_before),
                    COUNT(*) FILTER (WHERE geocoding_updated),
                    NOW()
             FROM nar_validation_queue
             WHERE status = 'completed' AND completed_at >= CURRENT_DATE
             ON CONFLICT (date) DO UPDATE SET
                total_validated = EXCLUDED.total_validated,
                nar_found = EXCLUDED.nar_found,
                high_confidence = EXCLUDED.high_confidence,
                cities_updated = EXCLUDED.cities_updated,
                postal_codes_updated = EXCLUDED.postal_codes_updated,
                geocoding_updated = EXCLUDED.geocoding_updated,
                updated_at = NOW()",
            &[],
        )
        .await
        .context("Queue: Failed to refresh daily stats")?;
        Ok(())
    }

    async fn daily_stats(&self, days: i32) -> Result<Vec<DailyStats>> {
        let conn = self.pool.get().await.context("Queue: Failed to get DB connection")?;
        let rows = conn
            .query(
                "SELECT date, total_validated, nar_found, high_confidence,
                        cities_updated, postal_codes_updated, geocoding_updated
                 FROM nar_validation_stats
                 WHERE date >= CURRENT_DATE - make_interval(days => $1)
                 ORDER BY date DESC",
                &[&days],
            )
            .await
            .context("Queue: daily stats query failed")?;
        Ok(rows
            .iter()
            .map(|row| DailyStats {
                date: row.get("date"),
                total_validated: row.get("total_validated"),
                nar_found: row.get("nar_found"),
                high_confidence: row.get("high_confidence"),
                cities_updated: row.get("cities_updated"),
                postal_codes_updated: row.get("postal_codes_updated"),
                geocoding_updated: row.get("geocoding_updated"),
            })
            .collect())
    }
}
