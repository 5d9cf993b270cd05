// src/orchestrator/health.rs - Service-loop health tracking
use std::time::{Duration, Instant};

pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;
pub const MAX_IDLE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Failing { consecutive_failures: u32 },
    Idle { idle_for: Duration },
}

/// Counts consecutive failed batches and time since the last batch that
/// actually processed work.
#[derive(Debug, Clone)]
pub struct ServiceHealth {
    consecutive_failures: u32,
    last_successful_batch: Instant,
}

impl ServiceHealth {
    pub fn new(now: Instant) -> Self {
        Self {
            consecutive_failures: 0,
            last_successful_batch: now,
        }
    }

    pub fn record_success(&mut self, now: Instant) {
        self.consecutive_failures = 0;
        self.last_successful_batch = now;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Reports at most one condition. A failure alert resets the counter so
    /// the next alert needs another run of failures.
    pub fn check(&mut self, now: Instant) -> HealthStatus {
        if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            let consecutive_failures = self.consecutive_failures;
            self.consecutive_failures = 0;
            return HealthStatus::Failing { consecutive_failures };
        }
        let idle_for = now.saturating_duration_since(self.last_successful_batch);
        if idle_for > MAX_IDLE {
            return HealthStatus::Idle { idle_for };
        }
        HealthStatus::Healthy
    }
}
