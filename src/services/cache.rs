//! Read-through schedule cache with tiered fallback
//!
//! Lookup order for a date, first hit wins:
//! 1. fresh tier: stored at most `max_age` ago
//! 2. live refresh: fetch + parse the whole schedule, store every date found
//! 3. stale tier: last stored value, bounded only by `permanent_ttl`
//! 4. empty result stamped with the current time
//!
//! Refresh errors end at this layer; `get` never fails.
//!
//! Tier ages are measured against the injected clock. Store TTLs carry
//! a grace period on top so the store never drops an entry the clock
//! check would still accept.

use crate::domain::types::VisitResult;
use crate::infra::clock::Clock;
use crate::infra::config::Config;
use crate::infra::metrics::CacheMetrics;
use crate::services::refresher::Refresher;
use crate::services::store::{permanent_key, transient_key, CacheEntry, CacheStore};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Extra store lifetime beyond the tier windows
const STORE_TTL_GRACE_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a stored value counts as fresh
    pub max_age: Duration,
    /// Expiry of the stale-fallback tier; `None` keeps entries indefinitely
    pub permanent_ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_age: Duration::hours(1), permanent_ttl: None }
    }
}

impl From<&Config> for CacheConfig {
    fn from(config: &Config) -> Self {
        Self { max_age: config.cache_max_age(), permanent_ttl: config.cache_permanent_ttl() }
    }
}

pub struct ScheduleCache {
    store: Arc<dyn CacheStore>,
    refresher: Arc<dyn Refresher>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    metrics: Arc<CacheMetrics>,
    /// Serializes refreshes so concurrent misses share one upstream fetch
    refresh_lock: Mutex<()>,
    /// Completed refresh attempts, successful or not
    refresh_generation: AtomicU64,
}

impl ScheduleCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        refresher: Arc<dyn Refresher>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        info!(
            max_age_secs = %config.max_age.num_seconds(),
            permanent_ttl_secs = ?config.permanent_ttl.map(|ttl| ttl.num_seconds()),
            "schedule_cache_initialized"
        );
        Self {
            store,
            refresher,
            clock,
            config,
            metrics,
            refresh_lock: Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Visits for `date` through the fallback chain
    pub async fn get(&self, date: NaiveDate) -> VisitResult {
        self.metrics.record_lookup();

        if let Some(value) = self.fresh(date) {
            return value;
        }

        let seen = self.refresh_generation.load(Ordering::Acquire);
        {
            let _refreshing = self.refresh_lock.lock().await;
            // a concurrent caller may have refreshed while we waited
            if let Some(value) = self.fresh(date) {
                return value;
            }
            if self.refresh_generation.load(Ordering::Acquire) == seen {
                if let Some(value) = self.refresh(date).await {
                    return value;
                }
            } else {
                debug!(date = %date, "refresh_shared_with_waiter");
            }
        }

        if let Some(value) = self.stale(date) {
            return value;
        }

        self.metrics.record_empty();
        debug!(date = %date, "cache_empty_result");
        VisitResult::empty(self.clock.now())
    }

    /// Refresh unconditionally and store everything found.
    /// Returns the number of dates stored; 0 when the refresh failed.
    pub async fn warm(&self, date: NaiveDate) -> usize {
        let _refreshing = self.refresh_lock.lock().await;
        self.refresh_and_store(date).await.map_or(0, |results| results.len())
    }

    fn fresh(&self, date: NaiveDate) -> Option<VisitResult> {
        let entry = self.store.get(&transient_key(date))?;
        let age = self.clock.now() - entry.stored_at;
        if age > self.config.max_age {
            return None;
        }
        self.metrics.record_fresh_hit();
        debug!(date = %date, age_secs = %age.num_seconds(), "cache_fresh_hit");
        Some(entry.value)
    }

    fn stale(&self, date: NaiveDate) -> Option<VisitResult> {
        let entry = self.store.get(&permanent_key(date))?;
        let age = self.clock.now() - entry.stored_at;
        if self.config.permanent_ttl.is_some_and(|ttl| age > ttl) {
            debug!(date = %date, age_secs = %age.num_seconds(), "cache_stale_expired");
            return None;
        }
        self.metrics.record_stale_hit();
        info!(date = %date, updated = %entry.value.updated, "cache_stale_fallback");
        Some(entry.value)
    }

    async fn refresh(&self, date: NaiveDate) -> Option<VisitResult> {
        let mut stored = self.refresh_and_store(date).await?;
        let found = stored.remove(&date);
        if found.is_none() {
            debug!(date = %date, "refresh_missing_requested_date");
        }
        found
    }

    /// Run the refresher and write every non-empty date to both tiers
    async fn refresh_and_store(&self, date: NaiveDate) -> Option<BTreeMap<NaiveDate, VisitResult>> {
        let start = Instant::now();
        let outcome = self.refresher.refresh(date).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        self.refresh_generation.fetch_add(1, Ordering::Release);

        let snapshot = match outcome {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.metrics.record_refresh(latency_ms, true);
                warn!(date = %date, error = %format!("{e:#}"), latency_ms = %latency_ms, "schedule_refresh_failed");
                return None;
            }
        };
        self.metrics.record_refresh(latency_ms, false);

        let mut results = snapshot.by_date();
        results.retain(|_, result| !result.is_empty());

        let grace = Duration::seconds(STORE_TTL_GRACE_SECS);
        let transient_ttl = Some(self.config.max_age + grace);
        let permanent_ttl = self.config.permanent_ttl.map(|ttl| ttl + grace);
        let stored_at = self.clock.now();
        for (day, result) in &results {
            let entry = CacheEntry { stored_at, value: result.clone() };
            self.store.set(&transient_key(*day), entry.clone(), transient_ttl);
            self.store.set(&permanent_key(*day), entry, permanent_ttl);
        }
        self.metrics.record_dates_stored(results.len() as u64);

        info!(
            requested = %date,
            dates = %results.len(),
            first = ?results.keys().next(),
            last = ?results.keys().next_back(),
            "schedule_cached"
        );
        Some(results)
    }
}
