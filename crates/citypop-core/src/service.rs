// crates/citypop-core/src/service.rs

//! # CityService
//!
//! The entry point a presentation layer talks to: `get_view`, `refresh`,
//! `export_csv` and the page-summary decorator, on top of the fallback
//! chain and the dataset cache.
//!
//! ```rust,no_run
//! # #[cfg(feature = "fetch")]
//! # fn main() -> citypop_core::Result<()> {
//! use citypop_core::{CityService, Config, QueryParams};
//!
//! let service = CityService::from_config(&Config::default())?;
//! let view = service.get_view(&QueryParams::new().top_n(10))?;
//! for row in &view.rows {
//!     println!("{:>2}. {} ({})", row.rank, row.record.city, row.record.population);
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "fetch"))]
//! # fn main() {}
//! ```

use crate::cache::DatasetCache;
use crate::chain::FallbackChain;
use crate::config::Config;
use crate::error::{CityError, FailureLog, Result};
use crate::export;
use crate::model::{Dataset, RankedCity};
use crate::query::{self, rank_order, QueryParams};
use crate::source::{HttpClient, PageSummary, PageSummaryClient};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Knobs that are not part of the chain itself.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub cache_ttl: Duration,
    pub failure_backoff: Duration,
    pub dataset_limit: Option<usize>,
    pub summary: PageSummaryClient,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ServiceOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_ttl: config.cache_ttl(),
            failure_backoff: config.failure_backoff(),
            dataset_limit: config.dataset_limit,
            summary: PageSummaryClient::new(
                &config.summary.base_url,
                Duration::from_secs(config.summary.timeout_secs),
            ),
        }
    }
}

/// What `get_view` hands to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct View {
    pub rows: Vec<RankedCity>,
    /// Provenance of the dataset, e.g. `WorldPopulationReview+GeoNames`.
    pub source: String,
    pub refreshed_at: DateTime<Utc>,
    /// `true` when the last refresh failed and older data is being shown.
    pub stale: bool,
    pub warning: Option<String>,
}

/// Outcome of a successful refresh.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub dataset: Arc<Dataset>,
    /// Providers that failed before the winner, or augment failures.
    pub failures: FailureLog,
    /// Another caller's refresh finished while this one waited; its result is reused.
    pub joined: bool,
}

#[derive(Debug, Clone)]
struct LastFailure {
    at: DateTime<Utc>,
    causes: FailureLog,
}

pub struct CityService {
    chain: FallbackChain,
    http: Arc<dyn HttpClient>,
    cache: Arc<DatasetCache>,
    options: ServiceOptions,
    refresh_lock: Mutex<()>,
    /// Completed refresh attempts, successful or not.
    attempts: AtomicU64,
    last_failure: Mutex<Option<LastFailure>>,
}

impl CityService {
    pub fn new(chain: FallbackChain, http: Arc<dyn HttpClient>, options: ServiceOptions) -> Self {
        let cache = Arc::new(DatasetCache::new(options.cache_ttl));
        Self {
            chain,
            http,
            cache,
            options,
            refresh_lock: Mutex::new(()),
            attempts: AtomicU64::new(0),
            last_failure: Mutex::new(None),
        }
    }

    /// Chain and options from `config`, transport supplied by the caller.
    pub fn with_config(config: &Config, http: Arc<dyn HttpClient>) -> Self {
        Self::new(
            FallbackChain::from_config(config),
            http,
            ServiceOptions::from_config(config),
        )
    }

    /// Everything from `config`, with the reqwest transport.
    #[cfg(feature = "fetch")]
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let client =
            crate::source::transport::ReqwestClient::new(&config.user_agent, config.connect_timeout())?;
        Ok(Self::with_config(config, Arc::new(client)))
    }

    /// Share an externally owned cache (e.g. one per process).
    pub fn with_cache(mut self, cache: Arc<DatasetCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<DatasetCache> {
        &self.cache
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    /// Currently published dataset, without triggering a refresh.
    pub fn current(&self) -> Option<Arc<Dataset>> {
        self.cache.get()
    }

    /// Publish a dataset obtained elsewhere (e.g. a snapshot), keeping its
    /// original refresh time so the TTL still applies.
    pub fn seed(&self, dataset: Dataset) -> Arc<Dataset> {
        let at = dataset.refreshed_at;
        info!(records = dataset.len(), source = %dataset.source_label(), "dataset seeded");
        self.cache.put(dataset, at)
    }

    /// Fetch a new dataset now, regardless of the TTL.
    ///
    /// Concurrent calls collapse into one fetch: a caller that had to wait
    /// for another refresh gets that refresh's outcome.
    ///
    /// # Errors
    /// [`CityError::RefreshFailed`] when every source failed. Its
    /// `stale_since` is set when an older dataset keeps serving.
    pub fn refresh(&self) -> Result<RefreshReport> {
        let seen = self.attempts.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock();
        if self.attempts.load(Ordering::Acquire) != seen {
            debug!("refresh completed while waiting, reusing its outcome");
            return self.last_outcome();
        }
        self.run_refresh()
    }

    /// Caller must hold `refresh_lock`.
    fn run_refresh(&self) -> Result<RefreshReport> {
        let outcome = self.resolve_and_publish();
        self.attempts.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    fn resolve_and_publish(&self) -> Result<RefreshReport> {
        match self.chain.resolve(self.http.as_ref()) {
            Ok(resolution) => {
                let mut records = resolution.records;
                let mut stats = resolution.stats;
                if let Some(limit) = self.options.dataset_limit {
                    records.sort_by(rank_order);
                    records.truncate(limit);
                    stats.records = records.len();
                }
                let dataset = Dataset {
                    records,
                    source: resolution.source,
                    augmented_by: resolution.augmented_by,
                    refreshed_at: Utc::now(),
                    stats,
                };
                let dataset = self.cache.put(dataset, Utc::now());
                *self.last_failure.lock() = None;
                info!(
                    source = %dataset.source_label(),
                    records = dataset.len(),
                    merged_away = dataset.stats.merged_away,
                    skipped = dataset.stats.rows_skipped(),
                    "dataset published"
                );
                Ok(RefreshReport {
                    dataset,
                    failures: resolution.failures,
                    joined: false,
                })
            }
            Err(CityError::AllSourcesUnavailable(causes)) => {
                let stale_since = self.cache.get().map(|d| d.refreshed_at);
                match stale_since {
                    Some(at) => warn!(%at, "refresh failed, keeping previous dataset: {causes}"),
                    None => error!("refresh failed, no data available: {causes}"),
                }
                self.cache.expire();
                *self.last_failure.lock() = Some(LastFailure {
                    at: Utc::now(),
                    causes: causes.clone(),
                });
                Err(CityError::RefreshFailed {
                    causes,
                    stale_since,
                })
            }
            Err(e) => Err(e),
        }
    }

    fn last_outcome(&self) -> Result<RefreshReport> {
        if let Some(failure) = self.last_failure.lock().clone() {
            return Err(CityError::RefreshFailed {
                causes: failure.causes,
                stale_since: self.cache.get().map(|d| d.refreshed_at),
            });
        }
        match self.cache.get() {
            Some(dataset) => Ok(RefreshReport {
                dataset,
                failures: FailureLog::default(),
                joined: true,
            }),
            None => Err(CityError::NoDataAvailable(FailureLog::default())),
        }
    }

    /// Refresh an expired cache unless a refresh failed within the back-off
    /// window. Returns the causes when no fresh data could be published.
    ///
    /// Expiry is re-checked under the lock, so callers that queued behind a
    /// successful refresh do not fetch again.
    fn refresh_expired(&self) -> Result<Option<FailureLog>> {
        let _guard = self.refresh_lock.lock();
        let now = Utc::now();
        if !self.cache.is_expired(now) {
            return Ok(None);
        }
        if let Some(recent) = self.recent_failure(now) {
            debug!("within failure back-off, not refetching");
            return Ok(Some(recent.causes));
        }
        match self.run_refresh() {
            Ok(_) => Ok(None),
            Err(CityError::RefreshFailed { causes, .. }) => Ok(Some(causes)),
            Err(e) => Err(e),
        }
    }

    /// Causes of the last failure, if it happened within the back-off window.
    fn recent_failure(&self, now: DateTime<Utc>) -> Option<LastFailure> {
        let last = self.last_failure.lock();
        last.as_ref()
            .filter(|f| {
                now.signed_duration_since(f.at)
                    .to_std()
                    .map(|age| age < self.options.failure_backoff)
                    .unwrap_or(true)
            })
            .cloned()
    }

    /// Rank-ordered view of the current dataset.
    ///
    /// An empty or expired cache is refreshed first, unless a refresh failed
    /// within the back-off window. When a refresh fails and older data
    /// exists, that data is returned with `stale` set and a warning.
    ///
    /// # Errors
    /// [`CityError::QueryParamInvalid`] before any fetch;
    /// [`CityError::NoDataAvailable`] when nothing was ever loaded.
    pub fn get_view(&self, params: &QueryParams) -> Result<View> {
        params.validate()?;

        let mut warning = None;
        if self.cache.is_expired(Utc::now()) {
            if let Some(causes) = self.refresh_expired()? {
                let Some(current) = self.cache.get() else {
                    return Err(CityError::NoDataAvailable(causes));
                };
                warning = Some(
                    CityError::RefreshFailed {
                        causes,
                        stale_since: Some(current.refreshed_at),
                    }
                    .to_string(),
                );
            }
        }

        let dataset = self
            .cache
            .get()
            .ok_or_else(|| CityError::NoDataAvailable(FailureLog::default()))?;
        let rows = query::view(&dataset.records, params)?;
        Ok(View {
            rows,
            source: dataset.source_label(),
            refreshed_at: dataset.refreshed_at,
            stale: warning.is_some(),
            warning,
        })
    }

    /// The same rows as [`get_view`](Self::get_view), as CSV bytes.
    pub fn export_csv(&self, params: &QueryParams) -> Result<Vec<u8>> {
        let view = self.get_view(params)?;
        export::to_csv(&view.rows)
    }

    /// Page summary for a title. A missing page is `Ok(None)`.
    pub fn describe(&self, title: &str) -> Result<Option<PageSummary>> {
        Ok(self.options.summary.fetch(self.http.as_ref(), title)?)
    }

    /// Page summary for the city at `rank` in `view`. Unknown ranks are `Ok(None)`.
    pub fn describe_rank(&self, view: &View, rank: usize) -> Result<Option<PageSummary>> {
        match query::select(&view.rows, rank) {
            Some(row) => self.describe(&row.record.city),
            None => Ok(None),
        }
    }
}
