/// Simple aggregate statistics for one refresh cycle.
///
/// Returned as part of a published [`Dataset`](crate::Dataset); the counts
/// describe what the winning adapter delivered and what normalization and
/// merging did with it.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStats {
    /// Raw rows delivered by the adapters that contributed.
    pub rows_fetched: usize,
    pub skipped_missing_city: usize,
    pub skipped_missing_country: usize,
    pub skipped_invalid_population: usize,
    /// Records folded into another record by the merge engine.
    pub merged_away: usize,
    /// Records in the published dataset.
    pub records: usize,
}

impl RefreshStats {
    pub fn rows_skipped(&self) -> usize {
        self.skipped_missing_city + self.skipped_missing_country + self.skipped_invalid_population
    }

    pub(crate) fn absorb(&mut self, other: &RefreshStats) {
        self.rows_fetched += other.rows_fetched;
        self.skipped_missing_city += other.skipped_missing_city;
        self.skipped_missing_country += other.skipped_missing_country;
        self.skipped_invalid_population += other.skipped_invalid_population;
    }
}
