use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::fmt::Debug;

use crate::error::RateLimitError;

// Counter for one "<category>:<identifier>" key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRecord {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateRecord {
    pub fn fresh(now: DateTime<Utc>, window: TimeDelta) -> Self {
        Self {
            count: 0,
            reset_at: now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_at
    }
}

// `hit` applies the window rule for one key atomically and returns the bumped record
pub trait RateLimitStore: Send + Sync + Debug {
    fn hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> Result<RateRecord, RateLimitError>;

    // Drops every record whose window has passed, returning how many went.
    fn sweep(&self, now: DateTime<Utc>) -> Result<usize, RateLimitError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Process-local store, each instance counts on its own
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, RateRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, record: RateRecord) {
        self.records.insert(key.into(), record);
    }

    pub fn get(&self, key: &str) -> Option<RateRecord> {
        self.records.get(key).map(|r| *r)
    }
}

impl RateLimitStore for MemoryStore {
    fn hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> Result<RateRecord, RateLimitError> {
        let mut entry = self
            .records
            .entry(key.to_string())
            .or_insert_with(|| RateRecord::fresh(now, window));

        // window expired..? Replace it
        if entry.is_expired(now) {
            *entry = RateRecord::fresh(now, window);
        }

        entry.count = entry.count.saturating_add(1);
        Ok(*entry)
    }

    fn sweep(&self, now: DateTime<Utc>) -> Result<usize, RateLimitError> {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let keep = !record.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
