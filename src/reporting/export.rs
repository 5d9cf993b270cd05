// src/reporting/export.rs - Per-property audit export (raw / resolver / persisted)
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::io::Write;

use crate::models::property::PropertyRecord;
use crate::models::queue::{QueueItem, QueueStatus};
use crate::models::resolution::ResolutionMethod;
use crate::queue::work_queue::{queue_item_from_row, QUEUE_COLUMNS};
use crate::store::property_store::{property_from_row, PROPERTY_COLUMNS};
use crate::utils::db_connect::PgPool;

/// The inputs the resolver saw, as ingested. Never the mutated values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawBefore {
    pub address: String,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

impl RawBefore {
    pub fn from_property(property: &PropertyRecord) -> Self {
        let raw = property.raw_record();
        Self {
            address: raw.address_text,
            city: raw.city_hint,
            postal_code: raw.postal_hint,
        }
    }
}

/// What the resolver returned on the last completed run. A suggestion only:
/// it may never have been written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolverSuggestion {
    pub found: Option<bool>,
    pub method: Option<ResolutionMethod>,
    pub confidence: Option<i32>,
    pub city: Option<String>,
}

impl ResolverSuggestion {
    pub fn from_queue_item(item: &QueueItem) -> Self {
        Self {
            found: item.found,
            method: item.method,
            confidence: item.confidence_score,
            city: item.city_suggested.clone(),
        }
    }
}

/// The property as currently stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedState {
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geocode_source: Option<String>,
}

impl PersistedState {
    pub fn from_property(property: &PropertyRecord) -> Self {
        Self {
            city: property.city.clone(),
            postal_code: property.postal_code.clone(),
            latitude: property.latitude,
            longitude: property.longitude,
            geocode_source: property.geocode_source.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub property_id: String,
    pub source_kind: String,
    pub raw: RawBefore,
    pub resolver: ResolverSuggestion,
    pub persisted: PersistedState,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExportRow {
    pub fn new(property: &PropertyRecord, item: &QueueItem) -> Self {
        Self {
            property_id: property.id.clone(),
            source_kind: property.source_kind.as_str().to_string(),
            raw: RawBefore::from_property(property),
            resolver: ResolverSuggestion::from_queue_item(item),
            persisted: PersistedState::from_property(property),
            completed_at: item.completed_at,
        }
    }

    /// Whether the stored city differs from what was ingested.
    pub fn city_changed(&self) -> bool {
        self.raw.city != self.persisted.city
    }

    /// Whether the stored postal code differs from what was ingested.
    pub fn postal_changed(&self) -> bool {
        self.raw.postal_code != self.persisted.postal_code
    }
}

pub const CSV_HEADER: [&str; 17] = [
    "property_id",
    "source_kind",
    "raw_address",
    "raw_city",
    "raw_postal_code",
    "resolver_found",
    "resolver_method",
    "resolver_confidence",
    "resolver_city",
    "persisted_city",
    "persisted_postal_code",
    "persisted_latitude",
    "persisted_longitude",
    "persisted_geocode_source",
    "city_changed",
    "postal_changed",
    "completed_at",
];

fn csv_field(value: &str) -> String {
    if value.contains(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

impl ExportRow {
    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.property_id.clone(),
            self.source_kind.clone(),
            self.raw.address.clone(),
            opt(&self.raw.city),
            opt(&self.raw.postal_code),
            opt(&self.resolver.found),
            self.resolver.method.map(|m| m.as_str().to_string()).unwrap_or_default(),
            opt(&self.resolver.confidence),
            opt(&self.resolver.city),
            opt(&self.persisted.city),
            opt(&self.persisted.postal_code),
            opt(&self.persisted.latitude),
            opt(&self.persisted.longitude),
            opt(&self.persisted.geocode_source),
            self.city_changed().to_string(),
            self.postal_changed().to_string(),
            self.completed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ]
    }
}

/// Writes `rows` as RFC 4180 CSV with a header line.
pub fn write_csv<W: Write>(rows: &[ExportRow], mut writer: W) -> Result<()> {
    writeln!(writer, "{}", CSV_HEADER.join(",")).context("Export: Failed to write CSV header")?;
    for row in rows {
        let line: Vec<String> = row.csv_fields().iter().map(|f| csv_field(f)).collect();
        writeln!(writer, "{}", line.join(","))
            .with_context(|| format!("Export: Failed to write row for {}", row.property_id))?;
    }
    writer.flush().context("Export: Failed to flush CSV output")?;
    Ok(())
}

fn qualified(prefix: &str, columns: &str) -> String {
    columns
        .split(',')
        .map(|c| format!("{}.{}", prefix, c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Completed items joined with the current property rows, newest first.
pub async fn fetch_export_rows(
    pool: &PgPool,
    limit: Option<i64>,
    min_confidence: Option<i32>,
) -> Result<Vec<ExportRow>> {
    let conn = pool.get().await.context("Export: Failed to get DB connection")?;
    let sql = format!(
        "SELECT {}, {}
         FROM nar_validation_queue q
         JOIN properties p ON p.id = q.property_id
         WHERE q.status = $1
           AND ($2::INT IS NULL OR q.confidence_score >= $2::INT)
         ORDER BY q.completed_at DESC
         LIMIT $3",
        qualified("p", PROPERTY_COLUMNS),
        qualified("q", QUEUE_COLUMNS)
    );
    let status = QueueStatus::Completed.as_str();
    let rows = conn
        .query(sql.as_str(), &[&status, &min_confidence, &limit])
        .await
        .context("Export: query failed")?;
    let export: Vec<ExportRow> = rows
        .iter()
        .map(|row| ExportRow::new(&property_from_row(row), &queue_item_from_row(row)))
        .collect();
    info!("📤 Export: {} completed properties", export.len());
    Ok(export)
}
