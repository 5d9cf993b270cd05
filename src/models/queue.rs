// src/models/queue.rs - Work queue rows, completion records and operator views
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::models::resolution::ResolutionMethod;

/// Priority given to properties enqueued without an explicit one (1 = highest).
pub const DEFAULT_PRIORITY: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 4] = [
        QueueStatus::Pending,
        QueueStatus::Processing,
        QueueStatus::Completed,
        QueueStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|st| st.as_str() == s)
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "⏳",
            QueueStatus::Processing => "▶️",
            QueueStatus::Completed => "✅",
            QueueStatus::Failed => "❌",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One property awaiting (or done with) resolution. One row per property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub property_id: String,
    pub priority: i32,
    pub status: QueueStatus,
    pub attempts: i32,
    pub confidence_score: Option<i32>,
    pub found: Option<bool>,
    pub method: Option<ResolutionMethod>,
    pub city_suggested: Option<String>,
    pub city_before: Option<String>,
    pub city_after: Option<String>,
    pub postal_before: Option<String>,
    pub postal_after: Option<String>,
    pub geocoding_updated: bool,
    pub last_error: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    pub fn new_pending(property_id: impl Into<String>, priority: i32, now: DateTime<Utc>) -> Self {
        Self {
            property_id: property_id.into(),
            priority,
            status: QueueStatus::Pending,
            attempts: 0,
            confidence_score: None,
            found: None,
            method: None,
            city_suggested: None,
            city_before: None,
            city_after: None,
            postal_before: None,
            postal_after: None,
            geocoding_updated: false,
            last_error: None,
            queued_at: now,
            last_attempt_at: None,
            completed_at: None,
        }
    }

    /// A `processing` item whose last attempt started before `now - stale_after`.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        if self.status != QueueStatus::Processing {
            return false;
        }
        let window = chrono::Duration::from_std(stale_after).unwrap_or_else(|_| chrono::Duration::zero());
        match self.last_attempt_at {
            Some(started) => started + window < now,
            None => true,
        }
    }
}

/// What the orchestrator records when an item completes. `city_after` and
/// `postal_after` are the values persisted on the property, never the
/// resolver's suggestion, which has its own column.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRecord {
    pub property_id: String,
    pub found: bool,
    pub confidence_score: i32,
    pub method: ResolutionMethod,
    pub city_suggested: Option<String>,
    pub city_before: Option<String>,
    pub city_after: Option<String>,
    pub postal_before: Option<String>,
    pub postal_after: Option<String>,
    pub geocoding_updated: bool,
}

/// Operator reset of failed and/or stale items back to pending.
#[derive(Debug, Clone, PartialEq)]
pub struct ResetRequest {
    pub include_failed: bool,
    /// Reset `processing` items whose last attempt is older than this.
    pub stale_after: Option<Duration>,
    pub clear_attempts: bool,
}

/// One line of the status query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatusSummary {
    pub status: QueueStatus,
    pub count: i64,
    pub avg_attempts: f64,
    pub oldest_queued_at: Option<DateTime<Utc>>,
    pub newest_queued_at: Option<DateTime<Utc>>,
}

/// One completed item for audit/reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentResult {
    pub property_id: String,
    pub address_line1: Option<String>,
    pub city_before: Option<String>,
    pub city_after: Option<String>,
    pub confidence_score: Option<i32>,
    pub found: Option<bool>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        for status in QueueStatus::ALL {
            assert_eq!(QueueStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(QueueStatus::from_str("done"), None);
    }

    #[test]
    fn test_staleness_only_applies_to_processing() {
        let now = Utc::now();
        let mut item = QueueItem::new_pending("p1", DEFAULT_PRIORITY, now);
        assert!(!item.is_stale(now, Duration::from_secs(60)));

        item.status = QueueStatus::Processing;
        item.last_attempt_at = Some(now - chrono::Duration::minutes(45));
        assert!(item.is_stale(now, Duration::from_secs(30 * 60)));
        assert!(!item.is_stale(now, Duration::from_secs(60 * 60)));
    }
}
