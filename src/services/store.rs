//! Key/value cache store with per-key TTL
//!
//! The cache only needs atomic get/set on single keys. [`MemoryStore`] is
//! the in-process backend; anything else (Redis, sled, ...) plugs in
//! through [`CacheStore`].
//!
//! Store TTLs bound memory only. Whether an entry is still fresh, or
//! still usable as a stale fallback, is decided by `ScheduleCache` from
//! `stored_at` and its own clock.

use crate::domain::types::VisitResult;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use moka::sync::Cache;
use moka::Expiry;
use std::time::Instant;

const TRANSIENT_PREFIX: &str = "transient-";
const PERMANENT_PREFIX: &str = "permanent-";

/// Default max entries held by [`MemoryStore`]
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Key of the short-lived tier entry for `date`
pub fn transient_key(date: NaiveDate) -> String {
    format!("{TRANSIENT_PREFIX}{date}")
}

/// Key of the durable (stale fallback) tier entry for `date`
pub fn permanent_key(date: NaiveDate) -> String {
    format!("{PERMANENT_PREFIX}{date}")
}

/// A stored result and when it was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub stored_at: DateTime<Utc>,
    pub value: VisitResult,
}

pub trait CacheStore: Send + Sync {
    /// Current value for `key`, or `None` when absent or expired
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Write `entry` under `key`. `ttl = None` keeps it until overwritten.
    fn set(&self, key: &str, entry: CacheEntry, ttl: Option<Duration>);
}

#[derive(Debug, Clone)]
struct Slot {
    entry: CacheEntry,
    ttl: Option<std::time::Duration>,
}

/// Each slot carries its own TTL; a rewrite restarts it
struct SlotExpiry;

impl Expiry<String, Slot> for SlotExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        slot: &Slot,
        _created_at: Instant,
    ) -> Option<std::time::Duration> {
        slot.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        slot: &Slot,
        _updated_at: Instant,
        _duration_until_expiry: Option<std::time::Duration>,
    ) -> Option<std::time::Duration> {
        slot.ttl
    }
}

/// In-memory store on a bounded moka cache
pub struct MemoryStore {
    slots: Cache<String, Slot>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryStore {
    pub fn new(max_entries: u64) -> Self {
        let slots = Cache::builder().max_capacity(max_entries).expire_after(SlotExpiry).build();
        Self { slots }
    }

    /// Approximate number of keys held
    pub fn len(&self) -> u64 {
        self.slots.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply pending evictions and expirations now instead of lazily
    pub fn run_pending_tasks(&self) {
        self.slots.run_pending_tasks();
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.slots.get(key).map(|slot| slot.entry)
    }

    fn set(&self, key: &str, entry: CacheEntry, ttl: Option<Duration>) {
        // negative TTLs clamp to zero: written already expired
        let ttl = ttl.map(|ttl| ttl.to_std().unwrap_or_default());
        self.slots.insert(key.to_string(), Slot { entry, ttl });
    }
}
