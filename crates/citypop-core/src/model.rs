// crates/citypop-core/src/model.rs
use crate::common::RefreshStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A city in the canonical dataset.
///
/// Records are produced by the normalizer and combined by the merge engine.
/// Once a dataset is published they are never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    pub city: String,
    pub country: String,
    /// Always `> 0`; rows without a usable population never become records.
    pub population: u64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Provider name. `primary+filler` when a field was filled from another source.
    pub source: String,
    pub as_of: Option<DateTime<Utc>>,
    /// Deduplication key: provider-native id, else `city|country` lower-cased.
    pub entity_key: String,
}

impl CityRecord {
    /// Build the fallback entity key for records without a native id.
    pub fn name_key(city: &str, country: &str) -> String {
        format!("{}|{}", city.to_lowercase(), country.to_lowercase())
    }

    /// Whether `entity_key` is a provider-native id rather than the name key.
    pub fn has_native_key(&self) -> bool {
        self.entity_key != Self::name_key(&self.city, &self.country)
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// The provider that won the merge (first segment of `source`).
    pub fn primary_source(&self) -> &str {
        self.source.split('+').next().unwrap_or(&self.source)
    }
}

/// One published refresh: immutable for the whole cache epoch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dataset {
    pub records: Vec<CityRecord>,
    /// The adapter that supplied the working dataset.
    pub source: String,
    /// Augment adapters that contributed fields in merge mode.
    pub augmented_by: Vec<String>,
    pub refreshed_at: DateTime<Utc>,
    pub stats: RefreshStats,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Human-readable provenance, e.g. `WorldPopulationReview+GeoNames`.
    pub fn source_label(&self) -> String {
        if self.augmented_by.is_empty() {
            self.source.clone()
        } else {
            format!("{}+{}", self.source, self.augmented_by.join("+"))
        }
    }
}

/// A record as it appears in a view: ranked and with its marker size.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedCity {
    /// 1-based position in the view.
    pub rank: usize,
    pub bubble_scale: f64,
    #[serde(flatten)]
    pub record: CityRecord,
}
