// src/matching/reference_store.rs - Read-only access to the national address reference
use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::db_connect::{PgConn, PgPool};

/// Infrastructure failures only. "Not found" is never an error.
#[derive(Debug, Error)]
pub enum ReferenceStoreError {
    #[error("reference store unavailable: {0}")]
    Unavailable(String),
    #[error("reference query failed: {0}")]
    Query(String),
}

/// One reference row as returned by an address lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceAddress {
    pub house_number: String,
    pub street: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// `(city, count)` for every city sharing the postal code, most frequent
    /// first; equal counts keep first-seen order.
    async fn city_counts_for_postal(
        &self,
        postal_code: &str,
    ) -> Result<Vec<(String, i64)>, ReferenceStoreError>;

    async fn city_exists(&self, city: &str) -> Result<bool, ReferenceStoreError>;

    /// Exact house number, street containing `street_name`, city equal to
    /// `city` (all case-insensitive).
    async fn find_address(
        &self,
        house_number: &str,
        street_name: &str,
        city: &str,
    ) -> Result<Option<ReferenceAddress>, ReferenceStoreError>;

    async fn distinct_cities(&self) -> Result<Vec<String>, ReferenceStoreError>;
}

static TABLE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").expect("valid table regex")
});

/// Postgres-backed reference (`nar_addresses` by default).
pub struct PgReferenceStore {
    pool: PgPool,
    table: String,
    province: String,
}

impl PgReferenceStore {
    pub fn new(pool: PgPool, table: &str, province: &str) -> anyhow::Result<Self> {
        if !TABLE_NAME_RE.is_match(table) {
            anyhow::bail!("Invalid reference table name: '{}'", table);
        }
        Ok(Self {
            pool,
            table: table.to_string(),
            province: province.trim().to_uppercase(),
        })
    }

    async fn conn(&self) -> Result<PgConn<'_>, ReferenceStoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| ReferenceStoreError::Unavailable(e.to_string()))
    }
}

/// Escapes LIKE metacharacters so street names match literally.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn query_err(e: tokio_postgres::Error) -> ReferenceStoreError {
    ReferenceStoreError::Query(e.to_string())
}

#[async_trait]
impl ReferenceStore for PgReferenceStore {
    async fn city_counts_for_postal(
        &self,
        postal_code: &str,
    ) -> Result<Vec<(String, i64)>, ReferenceStoreError> {
        let compact = postal_code.replace(' ', "").to_uppercase();
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT city, COUNT(*) AS count
             FROM {}
             WHERE state = $1
               AND REPLACE(UPPER(zipcode), ' ', '') = $2
               AND city IS NOT NULL
             GROUP BY city
             ORDER BY count DESC, MIN(id) ASC",
            self.table
        );
        let rows = conn
            .query(sql.as_str(), &[&self.province, &compact])
            .await
            .map_err(query_err)?;
        debug!("Postal {} -> {} candidate cities", compact, rows.len());
        Ok(rows
            .iter()
            .map(|row| (row.get::<_, String>("city"), row.get::<_, i64>("count")))
            .collect())
    }

    async fn city_exists(&self, city: &str) -> Result<bool, ReferenceStoreError> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE state = $1 AND UPPER(city) = UPPER($2))",
            self.table
        );
        let row = conn
            .query_one(sql.as_str(), &[&self.province, &city])
            .await
            .map_err(query_err)?;
        Ok(row.get(0))
    }

    async fn find_address(
        &self,
        house_number: &str,
        street_name: &str,
        city: &str,
    ) -> Result<Option<ReferenceAddress>, ReferenceStoreError> {
        let conn = self.conn().await?;
        let street_pattern = format!("%{}%", escape_like(&street_name.to_uppercase()));
        let sql = format!(
            "SELECT CAST(number AS VARCHAR) AS number, street, city, zipcode, latitude, longitude
             FROM {}
             WHERE state = $1
               AND CAST(number AS VARCHAR) = $2
               AND UPPER(street) LIKE $3
               AND UPPER(city) = UPPER($4)
             ORDER BY id
             LIMIT 1",
            self.table
        );
        let row_opt = conn
            .query_opt(
                sql.as_str(),
                &[&self.province, &house_number, &street_pattern, &city],
            )
            .await
            .map_err(query_err)?;
        Ok(row_opt.map(|row| ReferenceAddress {
            house_number: row.get("number"),
            street: row.get("street"),
            city: row.get("city"),
            postal_code: row.get("zipcode"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
        }))
    }

    async fn distinct_cities(&self) -> Result<Vec<String>, ReferenceStoreError> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT DISTINCT city FROM {} WHERE state = $1 AND city IS NOT NULL ORDER BY city",
            self.table
        );
        let rows = conn
            .query(sql.as_str(), &[&self.province])
            .await
            .map_err(query_err)?;
        Ok(rows.iter().map(|row| row.get::<_, String>("city")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_metacharacters() {
        assert_eq!(escape_like("KING ST"), "KING ST");
        assert_eq!(escape_like("100%_A\\B"), "100\\%\\_A\\\\B");
    }

    #[test]
    fn test_table_name_validation() {
        assert!(TABLE_NAME_RE.is_match("public.nar_addresses"));
        assert!(TABLE_NAME_RE.is_match("nar_addresses"));
        assert!(!TABLE_NAME_RE.is_match("nar; DROP TABLE properties"));
        assert!(!TABLE_NAME_RE.is_match("a.b.c"));
    }
}
