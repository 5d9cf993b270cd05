// src/models/property.rs - The persistent property record and the delta applied to it
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::address::{RawAddressRecord, SourceKind, DEFAULT_PROVINCE};

/// Value written to `geocode_source` when coordinates come from the reference.
pub const NAR_GEOCODE_SOURCE: &str = "nar";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: String,
    pub source_kind: SourceKind,
    pub address_line1: String,
    pub city_raw: Option<String>,
    pub postal_code_raw: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geocode_source: Option<String>,
    pub city_backup: Option<String>,
    pub postal_code_backup: Option<String>,
    pub backup_taken_at: Option<DateTime<Utc>>,
}

impl PropertyRecord {
    /// Builds the resolver input. Hints come from the raw columns; for rows
    /// ingested before those existed, the backup snapshot stands in for the
    /// original value, so a property mutated by an earlier run resolves from
    /// the same inputs again.
    pub fn raw_record(&self) -> RawAddressRecord {
        let city_hint = self.city_raw.clone().or_else(|| self.pre_mutation_city());
        let postal_hint = self
            .postal_code_raw
            .clone()
            .or_else(|| self.pre_mutation_postal_code());
        RawAddressRecord::new(
            self.id.clone(),
            self.source_kind,
            self.address_line1.clone(),
            city_hint,
            postal_hint,
            self.province.clone().or_else(|| Some(DEFAULT_PROVINCE.to_string())),
        )
    }

    fn pre_mutation_city(&self) -> Option<String> {
        if self.backup_taken_at.is_some() {
            self.city_backup.clone()
        } else {
            self.city.clone()
        }
    }

    fn pre_mutation_postal_code(&self) -> Option<String> {
        if self.backup_taken_at.is_some() {
            self.postal_code_backup.clone()
        } else {
            self.postal_code.clone()
        }
    }

    /// The state the record has after `update` is persisted. Mirrors the
    /// single UPDATE statement the Postgres store issues.
    pub fn with_update(&self, update: &PropertyUpdate, at: DateTime<Utc>) -> PropertyRecord {
        let mut next = self.clone();
        if update.is_empty() {
            return next;
        }
        if next.backup_taken_at.is_none() {
            next.city_backup = self.city.clone();
            next.postal_code_backup = self.postal_code.clone();
            next.backup_taken_at = Some(at);
        }
        if let Some(city) = &update.city {
            next.city = Some(city.clone());
        }
        if let Some(postal) = &update.postal_code {
            next.postal_code = Some(postal.clone());
        }
        if let Some((lat, lon)) = update.coordinates {
            next.latitude = Some(lat);
            next.longitude = Some(lon);
            next.geocode_source = update.geocode_source.clone();
        }
        next
    }
}

/// The delta the update policy decided to persist. Written in one statement;
/// the backup snapshot is taken by the store, once, on the first non-empty
/// delta.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyUpdate {
    pub property_id: String,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub coordinates: Option<(f64, f64)>,
    pub geocode_source: Option<String>,
}

impl PropertyUpdate {
    pub fn empty(property_id: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.city.is_none() && self.postal_code.is_none() && self.coordinates.is_none()
    }

    pub fn updates_geocoding(&self) -> bool {
        self.coordinates.is_some()
    }
}
