//! Lock-free cache metrics
//!
//! Counters are statistical only (Relaxed ordering); nothing reads them
//! for coordination.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Counters for the cache fallback chain
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// `get` calls
    lookups: AtomicU64,
    /// Served from the fresh tier
    fresh_hits: AtomicU64,
    /// Refresh attempts
    refreshes: AtomicU64,
    /// Refresh attempts that errored
    refresh_failures: AtomicU64,
    /// Served from the stale tier
    stale_hits: AtomicU64,
    /// Nothing found in any tier
    empty_results: AtomicU64,
    /// Dates written by refreshes
    dates_stored: AtomicU64,
    refresh_latency_sum_ms: AtomicU64,
    refresh_latency_max_ms: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fresh_hit(&self) {
        self.fresh_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stale_hit(&self) {
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_empty(&self) {
        self.empty_results.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh(&self, latency_ms: u64, failed: bool) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.refresh_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.refresh_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        update_atomic_max(&self.refresh_latency_max_ms, latency_ms);
    }

    pub fn record_dates_stored(&self, count: u64) {
        self.dates_stored.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn report(&self) -> CacheMetricsSummary {
        let refreshes = self.refreshes.load(Ordering::Relaxed);
        let latency_sum = self.refresh_latency_sum_ms.load(Ordering::Relaxed);
        let lookups = self.lookups.load(Ordering::Relaxed);
        let fresh_hits = self.fresh_hits.load(Ordering::Relaxed);

        CacheMetricsSummary {
            lookups,
            fresh_hits,
            refreshes,
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            empty_results: self.empty_results.load(Ordering::Relaxed),
            dates_stored: self.dates_stored.load(Ordering::Relaxed),
            refresh_latency_avg_ms: if refreshes > 0 { latency_sum / refreshes } else { 0 },
            refresh_latency_max_ms: self.refresh_latency_max_ms.load(Ordering::Relaxed),
            fresh_hit_ratio: if lookups > 0 { fresh_hits as f64 / lookups as f64 } else { 0.0 },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheMetricsSummary {
    pub lookups: u64,
    pub fresh_hits: u64,
    pub refreshes: u64,
    pub refresh_failures: u64,
    pub stale_hits: u64,
    pub empty_results: u64,
    pub dates_stored: u64,
    pub refresh_latency_avg_ms: u64,
    pub refresh_latency_max_ms: u64,
    pub fresh_hit_ratio: f64,
}

impl CacheMetricsSummary {
    pub fn log(&self) {
        info!(
            lookups = %self.lookups,
            fresh_hits = %self.fresh_hits,
            fresh_hit_ratio = %format!("{:.2}", self.fresh_hit_ratio),
            refreshes = %self.refreshes,
            refresh_failures = %self.refresh_failures,
            stale_hits = %self.stale_hits,
            empty_results = %self.empty_results,
            dates_stored = %self.dates_stored,
            refresh_avg_ms = %self.refresh_latency_avg_ms,
            refresh_max_ms = %self.refresh_latency_max_ms,
            "cache_metrics"
        );
    }
}
