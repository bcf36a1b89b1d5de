// crates/citypop-core/src/query.rs

//! # Query/View Layer
//!
//! A view is a pure function of the canonical records and [`QueryParams`].
//! Filters apply in a fixed order: minimum population, country allow-list,
//! search text, coordinate presence. The remainder is sorted by population
//! (descending, then city name), truncated to `top_n`, ranked from 1 and
//! given a bubble scale.

use crate::error::{CityError, Result};
use crate::model::{CityRecord, RankedCity};
use crate::text::fold_key;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Marker-size transform for map bubbles. Never used for sorting or filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BubbleScaling {
    #[default]
    Sqrt,
    Log10,
}

impl BubbleScaling {
    pub fn apply(self, population: u64) -> f64 {
        let p = population as f64;
        match self {
            BubbleScaling::Sqrt => p.sqrt(),
            BubbleScaling::Log10 => p.max(1.0).log10(),
        }
    }
}

/// View parameters. All optional and composable.
///
/// Numeric limits are signed so that a caller's negative value can be
/// rejected explicitly instead of wrapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    pub min_population: Option<i64>,
    /// Exact match against the normalized country string. Empty = all.
    pub countries: BTreeSet<String>,
    /// Case- and accent-insensitive substring on city or country. Empty = all.
    pub search_text: String,
    pub require_coordinates: bool,
    pub top_n: Option<i64>,
    pub bubble: BubbleScaling,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_population(mut self, min: i64) -> Self {
        self.min_population = Some(min);
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.countries.insert(country.into());
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search_text = text.into();
        self
    }

    pub fn require_coordinates(mut self, yes: bool) -> Self {
        self.require_coordinates = yes;
        self
    }

    pub fn top_n(mut self, n: i64) -> Self {
        self.top_n = Some(n);
        self
    }

    pub fn bubble(mut self, scaling: BubbleScaling) -> Self {
        self.bubble = scaling;
        self
    }

    /// Reject caller contract violations before any data is touched.
    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.top_n {
            if n < 0 {
                return Err(CityError::QueryParamInvalid {
                    param: "top_n",
                    reason: format!("must be non-negative, got {n}"),
                });
            }
        }
        if let Some(min) = self.min_population {
            if min < 0 {
                return Err(CityError::QueryParamInvalid {
                    param: "min_population",
                    reason: format!("must be non-negative, got {min}"),
                });
            }
        }
        Ok(())
    }
}

/// Compute the view. Identical inputs always give identical output.
pub fn view(records: &[CityRecord], params: &QueryParams) -> Result<Vec<RankedCity>> {
    params.validate()?;

    let min = params.min_population.unwrap_or(0).max(0) as u64;
    let needle = fold_key(params.search_text.trim());

    let mut rows: Vec<&CityRecord> = records
        .iter()
        .filter(|r| r.population >= min)
        .filter(|r| params.countries.is_empty() || params.countries.contains(&r.country))
        .filter(|r| {
            needle.is_empty()
                || fold_key(&r.city).contains(&needle)
                || fold_key(&r.country).contains(&needle)
        })
        .filter(|r| !params.require_coordinates || r.has_coordinates())
        .collect();

    rows.sort_by(|a, b| rank_order(a, b));

    if let Some(n) = params.top_n {
        rows.truncate(n as usize);
    }

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(i, r)| RankedCity {
            rank: i + 1,
            bubble_scale: params.bubble.apply(r.population),
            record: r.clone(),
        })
        .collect())
}

/// Population descending, then city, country and key for a total order.
pub fn rank_order(a: &CityRecord, b: &CityRecord) -> Ordering {
    b.population
        .cmp(&a.population)
        .then_with(|| a.city.cmp(&b.city))
        .then_with(|| a.country.cmp(&b.country))
        .then_with(|| a.entity_key.cmp(&b.entity_key))
}

/// Look up a rank in a view. Ranks that no longer exist yield `None`.
pub fn select(rows: &[RankedCity], rank: usize) -> Option<&RankedCity> {
    rank.checked_sub(1).and_then(|i| rows.get(i))
}
