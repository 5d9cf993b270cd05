// src/cache/pg_cache.rs - Postgres-backed validation cache (nar_address_cache)
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::cache::{CacheKey, ValidationCache};
use crate::models::resolution::AddressMatch;
use crate::models::stats_models::CacheStats;
use crate::utils::db_connect::PgPool;

pub struct PgValidationCache {
    pool: PgPool,
}

impl PgValidationCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ValidationCache for PgValidationCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<AddressMatch>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Cache: Failed to get DB connection")?;
        let row_opt = conn
            .query_opt(
                "UPDATE nar_address_cache
                 SET lookup_count = lookup_count + 1,
                     last_lookup_at = NOW()
                 WHERE key_digest = $1
                 RETURNING result",
                &[&key.digest()],
            )
            .await
            .context("Cache: lookup failed")?;
        match row_opt {
            Some(row) => {
                let value: JsonValue = row.get("result");
                let result = serde_json::from_value(value)
                    .context("Cache: stored result does not deserialize")?;
                Ok(Some(result))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &CacheKey, result: &AddressMatch) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .context("Cache: Failed to get DB connection")?;
        let value = serde_json::to_value(result).context("Cache: Failed to serialize result")?;
        let confidence = result.confidence as i32;
        conn.execute(
            "INSERT INTO nar_address_cache (
                key_digest, address_normalized, city_hint, postal_code,
                result, nar_found, confidence_score,
                lookup_count, first_lookup_at, last_lookup_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, 1, NOW(), NOW())
             ON CONFLICT (key_digest) DO UPDATE SET
                lookup_count = nar_address_cache.lookup_count + 1,
                last_lookup_at = NOW()",
            &[
                &key.digest(),
                &key.address,
                &key.city,
                &key.postal,
                &value,
                &result.found,
                &confidence,
            ],
        )
        .await
        .context("Cache: upsert failed")?;
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        let conn = self
            .pool
            .get()
            .await
            .context("Cache: Failed to get DB connection")?;
        let row = conn
            .query_one(
                "SELECT
                    COUNT(*) AS total_entries,
                    COALESCE(SUM(lookup_count), 0)::BIGINT AS total_hits,
                    COALESCE(AVG(lookup_count), 0)::DOUBLE PRECISION AS avg_hits,
                    COALESCE(MAX(lookup_count), 0)::BIGINT AS max_hits,
                    COUNT(*) FILTER (WHERE lookup_count > 1) AS reused_entries
                 FROM nar_address_cache",
                &[],
            )
            .await
            .context("Cache: stats query failed")?;
        Ok(CacheStats {
            total_entries: row.get("total_entries"),
            total_hits: row.get("total_hits"),
            avg_hits: row.get("avg_hits"),
            max_hits: row.get("max_hits"),
            reused_entries: row.get("reused_entries"),
        })
    }
}
