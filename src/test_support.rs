// src/test_support.rs - In-memory stores and a wired-up pipeline for unit tests
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::MemoryValidationCache;
use crate::matching::address_matcher::{AddressMatcher, DEFAULT_MIN_CITY_CONFIDENCE};
use crate::matching::municipality::{MunicipalityResolver, DEFAULT_FUZZY_THRESHOLD};
use crate::matching::{
    AmalgamationTable, CityIndex, GeocodeHit, Geocoder, ReferenceAddress, ReferenceStore,
    ReferenceStoreError,
};
use crate::models::address::SourceKind;
use crate::models::property::{PropertyRecord, PropertyUpdate};
use crate::models::queue::{
    CompletionRecord, QueueItem, QueueStatus, QueueStatusSummary, RecentResult, ResetRequest,
    DEFAULT_PRIORITY,
};
use crate::models::stats_models::{DailyStats, QueueHealth};
use crate::orchestrator::{AddressResolver, ResolutionOrchestrator, DEFAULT_UPDATE_THRESHOLD};
use crate::parsing::range_expander::DEFAULT_MAX_RANGE_SPAN;
use crate::queue::WorkQueue;
use crate::store::PropertyStore;

#[derive(Default)]
pub(crate) struct InMemoryReferenceStore {
    rows: Vec<ReferenceAddress>,
    delay: Option<Duration>,
    unavailable: AtomicBool,
    find_calls: AtomicUsize,
    exists_calls: AtomicUsize,
    postal_calls: AtomicUsize,
    distinct_calls: AtomicUsize,
}

impl InMemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(
        mut self,
        number: &str,
        street: &str,
        city: &str,
        postal: &str,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        self.rows.push(ReferenceAddress {
            house_number: number.to_string(),
            street: street.to_string(),
            city: city.to_string(),
            postal_code: Some(postal.to_string()),
            latitude: Some(latitude),
            longitude: Some(longitude),
        });
        self
    }

    /// Every lookup sleeps this long first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Distinct cities without counting a store call.
    pub fn city_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rows.iter().map(|r| r.city.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.find_calls()
            + self.exists_calls()
            + self.postal_calls.load(Ordering::SeqCst)
            + self.distinct_calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, counter: &AtomicUsize) -> Result<(), ReferenceStoreError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ReferenceStoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReferenceStore for InMemoryReferenceStore {
    async fn city_counts_for_postal(
        &self,
        postal_code: &str,
    ) -> Result<Vec<(String, i64)>, ReferenceStoreError> {
        self.enter(&self.postal_calls).await?;
        let compact = postal_code.replace(' ', "").to_uppercase();
        let mut counts: Vec<(String, i64)> = Vec::new();
        for row in &self.rows {
            let row_postal = row.postal_code.as_deref().unwrap_or("").replace(' ', "").to_uppercase();
            if row_postal != compact {
                continue;
            }
            match counts.iter_mut().find(|(city, _)| *city == row.city) {
                Some((_, count)) => *count += 1,
                None => counts.push((row.city.clone(), 1)),
            }
        }
        // Stable: equal counts keep first-seen order.
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(counts)
    }

    async fn city_exists(&self, city: &str) -> Result<bool, ReferenceStoreError> {
        self.enter(&self.exists_calls).await?;
        Ok(self.rows.iter().any(|r| r.city.eq_ignore_ascii_case(city)))
    }

    async fn find_address(
        &self,
        house_number: &str,
        street_name: &str,
        city: &str,
    ) -> Result<Option<ReferenceAddress>, ReferenceStoreError> {
        self.enter(&self.find_calls).await?;
        let street = street_name.to_uppercase();
        Ok(self
            .rows
            .iter()
            .find(|r| {
                r.house_number == house_number
                    && r.street.to_uppercase().contains(&street)
                    && r.city.eq_ignore_ascii_case(city)
            })
            .cloned())
    }

    async fn distinct_cities(&self) -> Result<Vec<String>, ReferenceStoreError> {
        self.enter(&self.distinct_calls).await?;
        Ok(self.city_names())
    }
}

pub(crate) struct FakeGeocoder {
    city: Option<String>,
    fail: bool,
}

impl FakeGeocoder {
    pub fn returning(city: Option<&str>) -> Self {
        Self {
            city: city.map(String::from),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self { city: None, fail: true }
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, _address_text: &str, _province: &str) -> Result<Option<GeocodeHit>> {
        if self.fail {
            return Err(anyhow!("geocoding quota exceeded"));
        }
        Ok(self.city.as_ref().map(|city| GeocodeHit {
            city: Some(city.clone()),
            latitude: None,
            longitude: None,
        }))
    }
}

#[derive(Default)]
pub(crate) struct InMemoryPropertyStore {
    records: Mutex<HashMap<String, PropertyRecord>>,
    update_calls: AtomicUsize,
}

impl InMemoryPropertyStore {
    pub fn insert(&self, record: PropertyRecord) {
        self.records.lock().unwrap().insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<PropertyRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    pub fn ids_with_address(&self) -> Vec<String> {
        let records = self.records.lock().unwrap();
        let mut ids: Vec<String> = records
            .values()
            .filter(|r| !r.address_line1.is_empty())
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PropertyStore for InMemoryPropertyStore {
    async fn load(&self, property_id: &str) -> Result<Option<PropertyRecord>> {
        Ok(self.get(property_id))
    }

    async fn apply_update(&self, update: &PropertyUpdate) -> Result<Option<PropertyRecord>> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let Some(current) = records.get(&update.property_id) else {
            return Ok(None);
        };
        let next = current.with_update(update, Utc::now());
        records.insert(next.id.clone(), next.clone());
        Ok(Some(next))
    }
}

/// Same transitions as the Postgres queue, held in insertion order.
pub(crate) struct InMemoryWorkQueue {
    items: Mutex<Vec<QueueItem>>,
    stats: Mutex<Vec<DailyStats>>,
    properties: Option<Arc<InMemoryPropertyStore>>,
    stale_after: Duration,
    stats_refreshes: AtomicUsize,
}

impl InMemoryWorkQueue {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            stats: Mutex::new(Vec::new()),
            properties: None,
            stale_after,
            stats_refreshes: AtomicUsize::new(0),
        }
    }

    pub fn with_properties(mut self, properties: Arc<InMemoryPropertyStore>) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn item(&self, property_id: &str) -> Option<QueueItem> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.property_id == property_id)
            .cloned()
    }

    /// Claims one specific pending item regardless of its priority.
    pub fn claim_item(&self, property_id: &str) -> bool {
        let mut items = self.items.lock().unwrap();
        match items
            .iter_mut()
            .find(|i| i.property_id == property_id && i.status == QueueStatus::Pending)
        {
            Some(item) => {
                item.status = QueueStatus::Processing;
                item.attempts += 1;
                item.last_attempt_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    pub async fn backdate_attempt(&self, property_id: &str, by: chrono::Duration) {
        let mut items = self.items.lock().unwrap();
        if let Some(item) = items.iter_mut().find(|i| i.property_id == property_id) {
            item.last_attempt_at = item.last_attempt_at.map(|at| at - by);
        }
    }

    pub fn daily_stats_refreshes(&self) -> usize {
        self.stats_refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn enqueue(&self, property_id: &str, priority: i32) -> Result<bool> {
        let now = Utc::now();
        let mut items = self.items.lock().unwrap();
        match items.iter_mut().find(|i| i.property_id == property_id) {
            None => {
                items.push(QueueItem::new_pending(property_id, priority, now));
                Ok(true)
            }
            Some(item) => {
                let requeue = matches!(item.status, QueueStatus::Completed | QueueStatus::Failed)
                    || item.is_stale(now, self.stale_after);
                if requeue {
                    item.status = QueueStatus::Pending;
                    item.priority = priority;
                    item.queued_at = now;
                    item.last_error = None;
                    item.completed_at = None;
                }
                Ok(requeue)
            }
        }
    }

    async fn enqueue_unvalidated(&self, priority: i32, limit: Option<i64>) -> Result<u64> {
        let candidates = match &self.properties {
            Some(properties) => properties.ids_with_address(),
            None => Vec::new(),
        };
        let now = Utc::now();
        let mut items = self.items.lock().unwrap();
        let mut inserted = 0u64;
        for id in candidates {
            if limit.map_or(false, |l| inserted as i64 >= l) {
                break;
            }
            if items.iter().any(|i| i.property_id == id) {
                continue;
            }
            items.push(QueueItem::new_pending(id, priority, now));
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn claim_batch(&self, limit: usize) -> Result<Vec<QueueItem>> {
        let now = Utc::now();
        let mut items = self.items.lock().unwrap();
        let mut pending: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, i)| i.status == QueueStatus::Pending)
            .map(|(idx, _)| idx)
            .collect();
        pending.sort_by_key(|&idx| (items[idx].priority, items[idx].queued_at));
        let mut claimed = Vec::new();
        for idx in pending.into_iter().take(limit) {
            let item = &mut items[idx];
            item.status = QueueStatus::Processing;
            item.attempts += 1;
            item.last_attempt_at = Some(now);
            claimed.push(item.clone());
        }
        Ok(claimed)
    }

    async fn mark_completed(&self, record: &CompletionRecord) -> Result<bool> {
        let mut items = self.items.lock().unwrap();
        let Some(item) = items
            .iter_mut()
            .find(|i| i.property_id == record.property_id && i.status == QueueStatus::Processing)
        else {
            return Ok(false);
        };
        item.status = QueueStatus::Completed;
        item.completed_at = Some(Utc::now());
        item.found = Some(record.found);
        item.confidence_score = Some(record.confidence_score);
        item.method = Some(record.method);
        item.city_suggested = record.city_suggested.clone();
        item.city_before = record.city_before.clone();
        item.city_after = record.city_after.clone();
        item.postal_before = record.postal_before.clone();
        item.postal_after = record.postal_after.clone();
        item.geocoding_updated = record.geocoding_updated;
        item.last_error = None;
        Ok(true)
    }

    async fn mark_failed(&self, property_id: &str, error: &str) -> Result<bool> {
        let mut items = self.items.lock().unwrap();
        let Some(item) = items
            .iter_mut()
            .find(|i| i.property_id == property_id && i.status == QueueStatus::Processing)
        else {
            return Ok(false);
        };
        item.status = QueueStatus::Failed;
        item.last_error = Some(error.to_string());
        Ok(true)
    }

    async fn status_summary(&self) -> Result<Vec<QueueStatusSummary>> {
        let items = self.items.lock().unwrap();
        Ok(QueueStatus::ALL
            .iter()
            .filter_map(|status| {
                let group: Vec<&QueueItem> = items.iter().filter(|i| i.status == *status).collect();
                if group.is_empty() {
                    return None;
                }
                let attempts: i64 = group.iter().map(|i| i.attempts as i64).sum();
                Some(QueueStatusSummary {
                    status: *status,
                    count: group.len() as i64,
                    avg_attempts: attempts as f64 / group.len() as f64,
                    oldest_queued_at: group.iter().map(|i| i.queued_at).min(),
                    newest_queued_at: group.iter().map(|i| i.queued_at).max(),
                })
            })
            .collect())
    }

    async fn recent_results(&self, limit: i64) -> Result<Vec<RecentResult>> {
        let items = self.items.lock().unwrap();
        let mut completed: Vec<&QueueItem> = items
            .iter()
            .filter(|i| i.status == QueueStatus::Completed)
            .collect();
        completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(completed
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|i| RecentResult {
                property_id: i.property_id.clone(),
                address_line1: self
                    .properties
                    .as_ref()
                    .and_then(|p| p.get(&i.property_id))
                    .map(|p| p.address_line1),
                city_before: i.city_before.clone(),
                city_after: i.city_after.clone(),
                confidence_score: i.confidence_score,
                found: i.found,
                completed_at: i.completed_at,
            })
            .collect())
    }

    async fn reset(&self, request: &ResetRequest) -> Result<u64> {
        let now = Utc::now();
        let mut items = self.items.lock().unwrap();
        let mut changed = 0u64;
        for item in items.iter_mut() {
            let failed = request.include_failed && item.status == QueueStatus::Failed;
            let stale = request
                .stale_after
                .map_or(false, |window| item.is_stale(now, window));
            if failed || stale {
                item.status = QueueStatus::Pending;
                item.last_error = None;
                if request.clear_attempts {
                    item.attempts = 0;
                }
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn health(&self) -> Result<QueueHealth> {
        let now = Utc::now();
        let items = self.items.lock().unwrap();
        Ok(QueueHealth {
            stuck: items.iter().filter(|i| i.is_stale(now, self.stale_after)).count() as i64,
            failed: items.iter().filter(|i| i.status == QueueStatus::Failed).count() as i64,
            last_completed_at: items
                .iter()
                .filter(|i| i.status == QueueStatus::Completed)
                .filter_map(|i| i.completed_at)
                .max(),
        })
    }

    async fn refresh_daily_stats(&self) -> Result<()> {
        self.stats_refreshes.fetch_add(1, Ordering::SeqCst);
        let today = Utc::now().date_naive();
        let row = {
            let items = self.items.lock().unwrap();
            let done: Vec<&QueueItem> = items
                .iter()
                .filter(|i| i.status == QueueStatus::Completed)
                .filter(|i| i.completed_at.map_or(false, |at| at.date_naive() == today))
                .collect();
            let count = |f: &dyn Fn(&QueueItem) -> bool| done.iter().filter(|i| f(i)).count() as i64;
            DailyStats {
                date: today,
                total_validated: done.len() as i64,
                nar_found: count(&|i: &QueueItem| i.found == Some(true)),
                high_confidence: count(&|i: &QueueItem| i.confidence_score.map_or(false, |c| c >= 90)),
                cities_updated: count(&|i: &QueueItem| i.city_after != i.city_before),
                postal_codes_updated: count(&|i: &QueueItem| i.postal_after != i.postal_before),
                geocoding_updated: count(&|i: &QueueItem| i.geocoding_updated),
            }
        };
        let mut stats = self.stats.lock().unwrap();
        stats.retain(|s| s.date != today);
        stats.push(row);
        Ok(())
    }

    async fn daily_stats(&self, days: i32) -> Result<Vec<DailyStats>> {
        let cutoff = Utc::now().date_naive() - chrono::Duration::days(days as i64);
        let mut rows: Vec<DailyStats> = self
            .stats
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.date >= cutoff)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }
}

/// The whole pipeline over in-memory stores, with production thresholds.
pub(crate) struct Fixture {
    pub reference: Arc<InMemoryReferenceStore>,
    pub properties: Arc<InMemoryPropertyStore>,
    pub queue: Arc<InMemoryWorkQueue>,
    pub cache: Arc<MemoryValidationCache>,
    pub orchestrator: Arc<ResolutionOrchestrator>,
}

impl Fixture {
    pub fn new(reference: InMemoryReferenceStore) -> Self {
        let reference = Arc::new(reference);
        let cities = CityIndex::from_names(reference.city_names());
        let municipality = MunicipalityResolver::new(
            reference.clone(),
            Arc::new(cities),
            Arc::new(AmalgamationTable::ontario()),
            DEFAULT_FUZZY_THRESHOLD,
        );
        let matcher = AddressMatcher::new(reference.clone(), DEFAULT_MIN_CITY_CONFIDENCE);
        let cache = Arc::new(MemoryValidationCache::new(1000));
        let resolver = AddressResolver::new(cache.clone(), municipality, matcher, DEFAULT_MAX_RANGE_SPAN);
        let properties = Arc::new(InMemoryPropertyStore::default());
        let queue = Arc::new(
            InMemoryWorkQueue::new(Duration::from_secs(30 * 60)).with_properties(properties.clone()),
        );
        let orchestrator = Arc::new(ResolutionOrchestrator::new(
            resolver,
            properties.clone(),
            queue.clone(),
            DEFAULT_UPDATE_THRESHOLD,
        ));
        Self {
            reference,
            properties,
            queue,
            cache,
            orchestrator,
        }
    }

    pub async fn add_property(&self, id: &str, address: &str, city: Option<&str>, postal: Option<&str>) {
        self.properties.insert(PropertyRecord {
            id: id.to_string(),
            source_kind: SourceKind::Transaction,
            address_line1: address.to_string(),
            city_raw: None,
            postal_code_raw: None,
            province: Some("ON".into()),
            city: city.map(String::from),
            postal_code: postal.map(String::from),
            latitude: None,
            longitude: None,
            geocode_source: None,
            city_backup: None,
            postal_code_backup: None,
            backup_taken_at: None,
        });
    }

    pub async fn claim(&self, id: &str) {
        self.queue.enqueue(id, DEFAULT_PRIORITY).await.unwrap();
        assert!(self.queue.claim_item(id), "{} was not claimable", id);
    }

    pub async fn requeue_and_claim(&self, id: &str) {
        assert!(self.queue.enqueue(id, DEFAULT_PRIORITY).await.unwrap());
        assert!(self.queue.claim_item(id), "{} was not claimable", id);
    }

    pub async fn property(&self, id: &str) -> PropertyRecord {
        self.properties.get(id).expect("property exists")
    }

    pub async fn queue_item(&self, id: &str) -> QueueItem {
        self.queue.item(id).expect("queue item exists")
    }
}
