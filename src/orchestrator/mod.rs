// src/orchestrator/mod.rs - Per-property resolve-and-apply
use log::{debug, error, info};
use std::sync::Arc;
use thiserror::Error;

use crate::matching::reference_store::ReferenceStoreError;
use crate::models::property::PropertyUpdate;
use crate::models::queue::CompletionRecord;
use crate::models::resolution::AddressMatch;
use crate::queue::WorkQueue;
use crate::store::PropertyStore;

pub mod batch;
pub mod health;
pub mod resolution;
pub mod update_policy;

pub use batch::{BatchConfig, BatchProcessor};
pub use health::{HealthStatus, ServiceHealth};
pub use resolution::{AddressResolver, Resolved};
pub use update_policy::{decide, DEFAULT_UPDATE_THRESHOLD};

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error(transparent)]
    ReferenceStore(#[from] ReferenceStoreError),
    #[error("property {0} not found")]
    PropertyNotFound(String),
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl ResolutionError {
    fn persistence(e: anyhow::Error) -> Self {
        ResolutionError::Persistence(format!("{:#}", e))
    }
}

/// Everything a completed item produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionDetails {
    pub record: CompletionRecord,
    pub result: AddressMatch,
    pub update: PropertyUpdate,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(CompletionDetails),
    Failed { property_id: String, error: String },
}

impl Outcome {
    pub fn property_id(&self) -> &str {
        match self {
            Outcome::Completed(details) => &details.record.property_id,
            Outcome::Failed { property_id, .. } => property_id,
        }
    }
}

pub struct ResolutionOrchestrator {
    resolver: AddressResolver,
    properties: Arc<dyn PropertyStore>,
    queue: Arc<dyn WorkQueue>,
    update_threshold: u8,
}

impl ResolutionOrchestrator {
    pub fn new(
        resolver: AddressResolver,
        properties: Arc<dyn PropertyStore>,
        queue: Arc<dyn WorkQueue>,
        update_threshold: u8,
    ) -> Self {
        Self {
            resolver,
            properties,
            queue,
            update_threshold,
        }
    }

    /// Resolves one claimed (processing) property, applies the update policy
    /// and records the queue outcome. Never panics and never returns an
    /// error: every failure ends as `Outcome::Failed` with the item marked
    /// failed.
    pub async fn resolve_and_apply(&self, property_id: &str) -> Outcome {
        let attempt = match self.apply(property_id).await {
            Ok(details) => match self.queue.mark_completed(&details.record).await {
                Ok(_) => Ok(details),
                Err(e) => Err(ResolutionError::persistence(e)),
            },
            Err(e) => Err(e),
        };

        match attempt {
            Ok(details) => {
                debug!(
                    "✅ {} completed: found={}, confidence={}, method={}",
                    property_id, details.record.found, details.record.confidence_score, details.record.method
                );
                Outcome::Completed(details)
            }
            Err(e) => {
                let message = e.to_string();
                error!("❌ Failed to resolve property {}: {}", property_id, message);
                if let Err(mark_err) = self.queue.mark_failed(property_id, &message).await {
                    error!("❌ Could not mark {} failed: {:#}", property_id, mark_err);
                }
                Outcome::Failed {
                    property_id: property_id.to_string(),
                    error: message,
                }
            }
        }
    }

    async fn apply(&self, property_id: &str) -> Result<CompletionDetails, ResolutionError> {
        let property = self
            .properties
            .load(property_id)
            .await
            .map_err(ResolutionError::persistence)?
            .ok_or_else(|| ResolutionError::PropertyNotFound(property_id.to_string()))?;

        let raw = property.raw_record();
        let resolved = self.resolver.resolve(&raw).await?;
        let update = update_policy::decide(&property, &resolved.result, self.update_threshold);

        let persisted = if update.is_empty() {
            property.clone()
        } else {
            let stored = self
                .properties
                .apply_update(&update)
                .await
                .map_err(ResolutionError::persistence)?
                .ok_or_else(|| ResolutionError::PropertyNotFound(property_id.to_string()))?;
            info!(
                "📝 Property {} updated: city {:?} -> {:?}, postal {:?} -> {:?}{}",
                property_id,
                property.city,
                stored.city,
                property.postal_code,
                stored.postal_code,
                if update.updates_geocoding() { ", coordinates set" } else { "" }
            );
            stored
        };

        let record = CompletionRecord {
            property_id: property.id.clone(),
            found: resolved.result.found,
            confidence_score: resolved.result.confidence as i32,
            method: resolved.result.method,
            city_suggested: resolved.result.city.clone(),
            city_before: property.city.clone(),
            city_after: persisted.city.clone(),
            postal_before: property.postal_code.clone(),
            postal_after: persisted.postal_code.clone(),
            geocoding_updated: update.updates_geocoding(),
        };
        Ok(CompletionDetails {
            record,
            result: resolved.result,
            update,
            cache_hit: resolved.cache_hit,
        })
    }
}
