//! Monthly request budgets per external service
//!
//! Counts outbound calls per calendar month and refuses new work once a
//! service reaches its configured ceiling, which is kept below the
//! platform's hard monthly cap.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::db::Database;
use crate::error::Result;

/// Calendar-month key (`YYYY-MM`) for a point in time
pub fn month_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

/// Quota tracker for outbound service calls
#[derive(Clone)]
pub struct QuotaTracker {
    db: Database,
    /// Per-service ceilings (requests per calendar month)
    ceilings: HashMap<String, u32>,
}

impl QuotaTracker {
    /// Create a new tracker with the given ceilings
    pub fn new(db: Database, ceilings: HashMap<String, u32>) -> Self {
        Self { db, ceilings }
    }

    /// Ceiling configured for a service, if any
    pub fn ceiling(&self, service: &str) -> Option<u32> {
        self.ceilings.get(service).copied()
    }

    /// Check whether the service still has budget this month
    pub async fn check_budget(&self, service: &str) -> Result<bool> {
        self.check_budget_at(service, Utc::now()).await
    }

    /// Check budget for the month containing `now`
    ///
    /// Returns Ok(false) once the month's count has reached the ceiling.
    /// A service without a configured ceiling is never limited.
    pub async fn check_budget_at(&self, service: &str, now: DateTime<Utc>) -> Result<bool> {
        let ceiling = match self.ceiling(service) {
            Some(c) => c,
            None => return Ok(true),
        };

        let count = self.usage_at(service, now).await?;
        Ok(count < ceiling)
    }

    /// Add `delta` calls to this month's counter
    pub async fn record_usage(&self, service: &str, delta: u32) -> Result<()> {
        self.record_usage_at(service, delta, Utc::now()).await
    }

    /// Add `delta` calls to the counter of the month containing `now`
    pub async fn record_usage_at(&self, service: &str, delta: u32, now: DateTime<Utc>) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        self.db
            .increment_usage(service, &month_key(now), delta, now.timestamp())
            .await?;
        tracing::debug!("Recorded {} call(s) against {}", delta, service);
        Ok(())
    }

    /// Calls recorded for the service this month
    pub async fn usage(&self, service: &str) -> Result<u32> {
        self.usage_at(service, Utc::now()).await
    }

    pub async fn usage_at(&self, service: &str, now: DateTime<Utc>) -> Result<u32> {
        let counter = self.db.get_usage(service, &month_key(now)).await?;
        Ok(counter.map(|c| c.request_count).unwrap_or(0))
    }

    /// Calls left before the ceiling, or None when the service is unlimited
    pub async fn remaining(&self, service: &str) -> Result<Option<u32>> {
        self.remaining_at(service, Utc::now()).await
    }

    pub async fn remaining_at(&self, service: &str, now: DateTime<Utc>) -> Result<Option<u32>> {
        match self.ceiling(service) {
            Some(ceiling) => {
                let used = self.usage_at(service, now).await?;
                Ok(Some(ceiling.saturating_sub(used)))
            }
            None => Ok(None),
        }
    }
}
