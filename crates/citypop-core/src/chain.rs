// crates/citypop-core/src/chain.rs

//! # Fallback Chain
//!
//! Tries primary adapters in priority order and stops at the first one whose
//! rows survive normalization. In merge mode, `augment` adapters are then
//! fetched in order and only fill absent fields of the working records.
//!
//! Every failure is logged and recorded; nothing is retried.

use crate::common::RefreshStats;
use crate::config::Config;
use crate::error::{CityError, FailureLog, ProviderFailure, Result};
use crate::merge::{collapse_by_name, fill_from, merge, SourcePriority};
use crate::model::CityRecord;
use crate::normalize::normalize_rows;
use crate::source::{self, HttpClient, SourceAdapter, SourceRole};
use crate::text::fold_key;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Outcome of a successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Merged records, one per entity. Unordered.
    pub records: Vec<CityRecord>,
    /// The primary adapter that supplied the working dataset.
    pub source: String,
    /// Augment adapters that filled at least one field.
    pub augmented_by: Vec<String>,
    /// Providers that failed on the way, including augment failures.
    pub failures: FailureLog,
    pub stats: RefreshStats,
}

pub struct FallbackChain {
    adapters: Vec<Box<dyn SourceAdapter>>,
    merge_mode: bool,
    collapse_by_name: bool,
}

impl FallbackChain {
    /// Adapters in priority order. Merge mode off, name collapse on.
    pub fn new(adapters: Vec<Box<dyn SourceAdapter>>) -> Self {
        Self {
            adapters,
            merge_mode: false,
            collapse_by_name: true,
        }
    }

    pub fn with_merge_mode(mut self, on: bool) -> Self {
        self.merge_mode = on;
        self
    }

    pub fn with_name_collapse(mut self, on: bool) -> Self {
        self.collapse_by_name = on;
        self
    }

    pub fn from_config(config: &Config) -> Self {
        let adapters = config.sources.iter().map(source::from_config).collect();
        Self::new(adapters)
            .with_merge_mode(config.merge_mode)
            .with_name_collapse(config.collapse_by_name)
    }

    /// Source names in chain order, used as merge priority.
    pub fn priority(&self) -> SourcePriority {
        SourcePriority::new(self.adapters.iter().map(|a| a.name().to_string()))
    }

    /// Run the chain.
    ///
    /// # Errors
    /// [`CityError::AllSourcesUnavailable`] with every primary's cause, in
    /// chain order, when no primary produced a usable row.
    pub fn resolve(&self, http: &dyn HttpClient) -> Result<Resolution> {
        let priority = self.priority();
        let mut failures = Vec::new();

        let primaries = self
            .adapters
            .iter()
            .filter(|a| a.role() == SourceRole::Primary);

        let mut found = None;
        for adapter in primaries {
            let name = adapter.name();
            info!(source = name, "trying source");
            match attempt(&**adapter, http) {
                Ok((records, stats)) => {
                    info!(
                        source = name,
                        records = records.len(),
                        skipped = stats.rows_skipped(),
                        "source succeeded"
                    );
                    found = Some((name.to_string(), records, stats));
                    break;
                }
                Err(failure) => {
                    warn!(source = name, "{failure}");
                    failures.push(failure);
                }
            }
        }

        let Some((winner, records, mut stats)) = found else {
            return Err(CityError::AllSourcesUnavailable(FailureLog(failures)));
        };

        let before = records.len();
        let mut records = merge(records, &priority);
        if self.collapse_by_name {
            records = collapse_by_name(records, &priority);
        }
        stats.merged_away = before - records.len();

        let mut augmented_by = Vec::new();
        if self.merge_mode {
            for adapter in self.adapters.iter().filter(|a| a.role() == SourceRole::Augment) {
                let name = adapter.name();
                match attempt(&**adapter, http) {
                    Ok((extra, extra_stats)) => {
                        stats.absorb(&extra_stats);
                        let filled = augment(&mut records, &extra);
                        info!(source = name, filled, offered = extra.len(), "augment applied");
                        if filled > 0 {
                            augmented_by.push(name.to_string());
                        }
                    }
                    Err(failure) => {
                        warn!(source = name, "augment skipped: {failure}");
                        failures.push(failure);
                    }
                }
            }
        }

        stats.records = records.len();
        Ok(Resolution {
            records,
            source: winner,
            augmented_by,
            failures: FailureLog(failures),
            stats,
        })
    }
}

/// Fetch and normalize one adapter. Zero usable rows counts as a failure.
fn attempt(
    adapter: &dyn SourceAdapter,
    http: &dyn HttpClient,
) -> std::result::Result<(Vec<CityRecord>, RefreshStats), ProviderFailure> {
    let rows = adapter.fetch(http).map_err(ProviderFailure::Unavailable)?;
    let mut stats = RefreshStats::default();
    let records = normalize_rows(&rows, adapter.mapping(), adapter.name(), &mut stats);
    if records.is_empty() {
        return Err(ProviderFailure::NoUsableRows {
            provider: adapter.name().to_string(),
            skipped: stats.rows_skipped(),
        });
    }
    Ok((records, stats))
}

/// Fill absent fields of `records` from matching `extra` records.
///
/// Exact matches (entity key, then folded `city|country`) are applied first
/// across all extras. Remaining extras then match on the folded city name
/// alone, only when that name is unique among the working records and among
/// the extras. Unmatched extras are dropped. Returns the number of records
/// that gained a field.
fn augment(records: &mut [CityRecord], extra: &[CityRecord]) -> usize {
    let mut by_key = HashMap::new();
    let mut by_name = HashMap::new();
    let mut by_city: HashMap<String, Option<usize>> = HashMap::new();
    for (i, r) in records.iter().enumerate() {
        by_key.entry(r.entity_key.clone()).or_insert(i);
        by_name.entry(folded_name(r)).or_insert(i);
        by_city
            .entry(fold_key(&r.city))
            .and_modify(|slot| *slot = None)
            .or_insert(Some(i));
    }
    let mut extra_cities: HashMap<String, usize> = HashMap::new();
    for e in extra {
        *extra_cities.entry(fold_key(&e.city)).or_default() += 1;
    }

    let mut touched = vec![false; records.len()];
    let mut pending = Vec::new();
    for e in extra {
        let exact = by_key
            .get(&e.entity_key)
            .or_else(|| by_name.get(&folded_name(e)))
            .copied();
        match exact {
            Some(i) => touched[i] |= fill_from(&mut records[i], e),
            None => pending.push(e),
        }
    }

    let mut unmatched = 0usize;
    for e in pending {
        let city = fold_key(&e.city);
        let target = by_city
            .get(&city)
            .copied()
            .flatten()
            .filter(|_| extra_cities.get(&city) == Some(&1));
        match target {
            Some(i) => touched[i] |= fill_from(&mut records[i], e),
            None => unmatched += 1,
        }
    }
    if unmatched > 0 {
        debug!(unmatched, "augment records without a match dropped");
    }
    touched.into_iter().filter(|t| *t).count()
}

fn folded_name(r: &CityRecord) -> String {
    format!("{}|{}", fold_key(&r.city), fold_key(&r.country))
}
