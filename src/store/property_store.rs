// src/store/property_store.rs - Property reads and the single-statement mutation
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use tokio_postgres::Row;

use crate::models::address::SourceKind;
use crate::models::property::{PropertyRecord, PropertyUpdate};
use crate::utils::db_connect::PgPool;

#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn load(&self, property_id: &str) -> Result<Option<PropertyRecord>>;

    /// Persists `update` atomically and returns the record as stored. The
    /// first non-empty update snapshots `city`/`postal_code` into the backup
    /// columns; later updates never touch the backup.
    async fn apply_update(&self, update: &PropertyUpdate) -> Result<Option<PropertyRecord>>;
}

pub(crate) const PROPERTY_COLUMNS: &str = "id, source_kind, address_line1, city_raw, postal_code_raw, province, \
     city, postal_code, latitude, longitude, geocode_source, \
     city_backup, postal_code_backup, backup_taken_at";

pub(crate) fn property_from_row(row: &Row) -> PropertyRecord {
    let kind: Option<String> = row.get("source_kind");
    let source_kind = kind
        .as_deref()
        .and_then(SourceKind::from_str)
        .unwrap_or_else(|| {
            let id: String = row.get("id");
            warn!("Property {} has unknown source kind {:?}; treating as transaction", id, kind);
            SourceKind::Transaction
        });
    PropertyRecord {
        id: row.get("id"),
        source_kind,
        address_line1: row.get::<_, Option<String>>("address_line1").unwrap_or_default(),
        city_raw: row.get("city_raw"),
        postal_code_raw: row.get("postal_code_raw"),
        province: row.get("province"),
        city: row.get("city"),
        postal_code: row.get("postal_code"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        geocode_source: row.get("geocode_source"),
        city_backup: row.get("city_backup"),
        postal_code_backup: row.get("postal_code_backup"),
        backup_taken_at: row.get("backup_taken_at"),
    }
}

pub struct PgPropertyStore {
    pool: PgPool,
}

impl PgPropertyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PropertyStore for PgPropertyStore {
    async fn load(&self, property_id: &str) -> Result<Option<PropertyRecord>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Properties: Failed to get DB connection")?;
        let sql = format!("SELECT {} FROM properties WHERE id = $1", PROPERTY_COLUMNS);
        let row_opt = conn
            .query_opt(sql.as_str(), &[&property_id])
            .await
            .with_context(|| format!("Properties: Failed to load {}", property_id))?;
        Ok(row_opt.as_ref().map(property_from_row))
    }

    async fn apply_update(&self, update: &PropertyUpdate) -> Result<Option<PropertyRecord>> {
        if update.is_empty() {
            return self.load(&update.property_id).await;
        }
        let conn = self
            .pool
            .get()
            .await
            .context("Properties: Failed to get DB connection")?;

        let (lat, lon) = match update.coordinates {
            Some((lat, lon)) => (Some(lat), Some(lon)),
            None => (None, None),
        };
        // Right-hand sides see the pre-update row, so the backup captures the
        // values being replaced.
        let sql = format!(
            "UPDATE properties SET
                city_backup = CASE WHEN backup_taken_at IS NULL THEN city ELSE city_backup END,
                postal_code_backup = CASE WHEN backup_taken_at IS NULL THEN postal_code ELSE postal_code_backup END,
                backup_taken_at = COALESCE(backup_taken_at, NOW()),
                city = COALESCE($2, city),
                postal_code = COALESCE($3, postal_code),
                latitude = COALESCE($4, latitude),
                longitude = COALESCE($5, longitude),
                geocode_source = CASE WHEN $4::DOUBLE PRECISION IS NOT NULL THEN $6 ELSE geocode_source END,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            PROPERTY_COLUMNS
        );
        let row_opt = conn
            .query_opt(
                sql.as_str(),
                &[
                    &update.property_id,
                    &update.city,
                    &update.postal_code,
                    &lat,
                    &lon,
                    &update.geocode_source,
                ],
            )
            .await
            .with_context(|| format!("Properties: Failed to update {}", update.property_id))?;
        debug!(
            "Property {} updated (city: {:?}, postal: {:?}, coords: {})",
            update.property_id,
            update.city,
            update.postal_code,
            update.updates_geocoding()
        );
        Ok(row_opt.as_ref().map(property_from_row))
    }
}
