// crates/citypop-core/src/cache.rs

//! Process-wide dataset cache.
//!
//! Readers get an `Arc` to the currently published [`Dataset`]; a refresh
//! swaps in a whole new one. Nobody ever sees a half-built dataset.

use crate::model::Dataset;
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub struct DatasetCache {
    current: ArcSwapOption<Dataset>,
    ttl: Duration,
    /// Set by [`DatasetCache::expire`]; cleared by the next `put`.
    forced: AtomicBool,
}

impl DatasetCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            current: ArcSwapOption::const_empty(),
            ttl,
            forced: AtomicBool::new(false),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The published dataset, if any. Cheap; never blocks a writer.
    pub fn get(&self) -> Option<Arc<Dataset>> {
        self.current.load_full()
    }

    /// Publish `dataset` as of `at`. Overwrites `dataset.refreshed_at`.
    pub fn put(&self, mut dataset: Dataset, at: DateTime<Utc>) -> Arc<Dataset> {
        dataset.refreshed_at = at;
        let dataset = Arc::new(dataset);
        self.current.store(Some(Arc::clone(&dataset)));
        self.forced.store(false, Ordering::Release);
        dataset
    }

    /// Empty, force-expired, or older than the TTL.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.forced.load(Ordering::Acquire) {
            return true;
        }
        match self.current.load().as_ref() {
            None => true,
            // A refresh time in the future is treated as fresh.
            Some(ds) => now
                .signed_duration_since(ds.refreshed_at)
                .to_std()
                .map(|age| age >= self.ttl)
                .unwrap_or(false),
        }
    }

    /// Mark the current dataset expired without dropping it, so it can keep
    /// serving as stale data if the next refresh fails.
    pub fn expire(&self) {
        self.forced.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RefreshStats;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn dataset() -> Dataset {
        Dataset {
            records: Vec::new(),
            source: "api".into(),
            augmented_by: Vec::new(),
            refreshed_at: Utc.timestamp_opt(0, 0).unwrap(),
            stats: RefreshStats::default(),
        }
    }

    #[test]
    fn empty_cache_is_expired() {
        let cache = DatasetCache::new(Duration::from_secs(60));
        assert!(cache.get().is_none());
        assert!(cache.is_expired(Utc::now()));
    }

    #[test]
    fn ttl_boundary() {
        let cache = DatasetCache::new(Duration::from_secs(60));
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        cache.put(dataset(), t0);
        assert_eq!(cache.get().unwrap().refreshed_at, t0);
        assert!(!cache.is_expired(t0 + ChronoDuration::seconds(59)));
        assert!(cache.is_expired(t0 + ChronoDuration::seconds(60)));
    }

    #[test]
    fn forced_expiry_keeps_data_until_next_put() {
        let cache = DatasetCache::new(Duration::from_secs(3600));
        let t0 = Utc::now();
        cache.put(dataset(), t0);
        cache.expire();
        assert!(cache.is_expired(t0));
        assert!(cache.get().is_some());
        cache.put(dataset(), t0);
        assert!(!cache.is_expired(t0));
    }
}
