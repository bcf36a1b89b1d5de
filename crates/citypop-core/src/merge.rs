// crates/citypop-core/src/merge.rs

//! # Deduplication & Merge Engine
//!
//! Collapses records describing the same city into one.
//!
//! Winner precedence inside a group:
//! 1. later `as_of`, when both records carry one
//! 2. higher-priority source (earlier in the chain)
//! 3. larger population
//! 4. earlier in the input
//!
//! Absent fields of the winner are then filled from the losers, in
//! precedence order.

use crate::model::CityRecord;
use crate::text::fold_key;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Source names in chain order; earlier means higher priority.
#[derive(Debug, Clone, Default)]
pub struct SourcePriority {
    order: Vec<String>,
}

impl SourcePriority {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            order: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Position of `source` in the chain; unknown sources rank last.
    pub fn rank(&self, source: &str) -> usize {
        let primary = source.split('+').next().unwrap_or(source);
        self.order
            .iter()
            .position(|s| s == primary)
            .unwrap_or(usize::MAX)
    }
}

/// Merge by `entity_key`: one output record per distinct key.
///
/// Output is ordered by entity key; callers that need another order sort.
pub fn merge(records: Vec<CityRecord>, priority: &SourcePriority) -> Vec<CityRecord> {
    let total = records.len();
    let out: Vec<CityRecord> = group_by(records, |r| r.entity_key.clone())
        .into_values()
        .filter_map(|group| resolve_group(group, priority))
        .collect();
    log_merged(total, out.len());
    out
}

/// Collapse records with different keys that name the same city and country
/// (accent- and case-insensitive). The survivor keeps the winner's key.
///
/// Records carrying distinct provider-native ids are distinct cities: when a
/// name group holds more than one of them, those stay apart and only the
/// name-keyed members of the group fold together.
pub fn collapse_by_name(records: Vec<CityRecord>, priority: &SourcePriority) -> Vec<CityRecord> {
    let total = records.len();
    let mut out = Vec::with_capacity(total);
    for group in group_by(records, |r| {
        format!("{}|{}", fold_key(&r.city), fold_key(&r.country))
    })
    .into_values()
    {
        let natives = group.iter().filter(|(_, r)| r.has_native_key()).count();
        if natives > 1 {
            let (native, named): (Vec<_>, Vec<_>) =
                group.into_iter().partition(|(_, r)| r.has_native_key());
            out.extend(native.into_iter().map(|(_, r)| r));
            out.extend(resolve_group(named, priority));
        } else {
            out.extend(resolve_group(group, priority));
        }
    }
    log_merged(total, out.len());
    out
}

fn group_by<F>(records: Vec<CityRecord>, key: F) -> BTreeMap<String, Vec<(usize, CityRecord)>>
where
    F: Fn(&CityRecord) -> String,
{
    let mut groups: BTreeMap<String, Vec<(usize, CityRecord)>> = BTreeMap::new();
    for (idx, rec) in records.into_iter().enumerate() {
        groups.entry(key(&rec)).or_default().push((idx, rec));
    }
    groups
}

fn log_merged(input: usize, output: usize) {
    if output < input {
        debug!(input, output, "merged duplicate records");
    }
}

fn resolve_group(
    mut group: Vec<(usize, CityRecord)>,
    priority: &SourcePriority,
) -> Option<CityRecord> {
    group.sort_by(|(ia, a), (ib, b)| precedence(a, b, priority).then(ia.cmp(ib)));

    let mut iter = group.into_iter().map(|(_, r)| r);
    let mut winner = iter.next()?;
    for loser in iter {
        fill_from(&mut winner, &loser);
    }
    Some(winner)
}

/// `Less` means `a` wins over `b`.
pub fn precedence(a: &CityRecord, b: &CityRecord, priority: &SourcePriority) -> Ordering {
    if let (Some(ta), Some(tb)) = (a.as_of, b.as_of) {
        match tb.cmp(&ta) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    priority
        .rank(&a.source)
        .cmp(&priority.rank(&b.source))
        .then_with(|| b.population.cmp(&a.population))
}

/// Per-field union: absent fields of `winner` are taken from `loser`.
/// Latitude and longitude are only filled together, from one record.
/// Returns whether anything was filled.
pub(crate) fn fill_from(winner: &mut CityRecord, loser: &CityRecord) -> bool {
    let mut filled = false;
    // Coordinates move as a pair, never half from each record.
    if winner.latitude.is_none() && winner.longitude.is_none() && loser.has_coordinates() {
        winner.latitude = loser.latitude;
        winner.longitude = loser.longitude;
        filled = true;
    }
    if winner.as_of.is_none() && loser.as_of.is_some() {
        winner.as_of = loser.as_of;
        filled = true;
    }
    if filled {
        let filler = loser.primary_source();
        if !winner.source.split('+').any(|s| s == filler) {
            winner.source = format!("{}+{}", winner.source, filler);
        }
    }
    filled
}
