// crates/citypop-core/src/normalize.rs

//! # Schema Normalizer
//!
//! Turns a provider's [`RawRow`] into a [`CityRecord`] using that provider's
//! [`ColumnMapping`]. Row-level problems never fail a refresh: the row is
//! skipped and the reason counted.

use crate::common::RefreshStats;
use crate::model::CityRecord;
use crate::raw::RawRow;
use crate::text::{clean_text, decode_entities, strip_citations};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::trace;

/// Per-provider column names, in lookup order, for each canonical field.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMapping {
    pub city: &'static [&'static str],
    pub country: &'static [&'static str],
    pub population: &'static [&'static str],
    pub latitude: &'static [&'static str],
    pub longitude: &'static [&'static str],
    /// Stable provider identifier; becomes the entity key when present.
    pub native_id: &'static [&'static str],
    pub as_of: &'static [&'static str],
}

impl ColumnMapping {
    /// Canonical field names, used by adapters that build rows themselves.
    pub const CANONICAL: ColumnMapping = ColumnMapping {
        city: &["city"],
        country: &["country"],
        population: &["population"],
        latitude: &["latitude"],
        longitude: &["longitude"],
        native_id: &["id"],
        as_of: &["as_of"],
    };
}

/// Why a row did not make it into the canonical set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingCity,
    MissingCountry,
    InvalidPopulation,
}

/// Outcome of normalizing one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Record(CityRecord),
    Skipped(SkipReason),
}

/// Normalize a single row. Never panics, never errors.
pub fn normalize(row: &RawRow, mapping: &ColumnMapping, source: &str) -> Normalized {
    let city = row.first_of(mapping.city).map(clean_text).unwrap_or_default();
    if city.is_empty() {
        return Normalized::Skipped(SkipReason::MissingCity);
    }
    let country = row
        .first_of(mapping.country)
        .map(clean_text)
        .unwrap_or_default();
    if country.is_empty() {
        return Normalized::Skipped(SkipReason::MissingCountry);
    }
    let population = match row.first_of(mapping.population).and_then(parse_population) {
        Some(p) => p,
        None => return Normalized::Skipped(SkipReason::InvalidPopulation),
    };

    let latitude = row
        .first_of(mapping.latitude)
        .and_then(|v| parse_coordinate(v, 90.0));
    let longitude = row
        .first_of(mapping.longitude)
        .and_then(|v| parse_coordinate(v, 180.0));
    let as_of = row.first_of(mapping.as_of).and_then(parse_as_of);

    let entity_key = row
        .first_of(mapping.native_id)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| CityRecord::name_key(&city, &country));

    Normalized::Record(CityRecord {
        city,
        country,
        population,
        latitude,
        longitude,
        source: source.to_string(),
        as_of,
        entity_key,
    })
}

/// Normalize a batch, counting skips into `stats`.
pub fn normalize_rows(
    rows: &[RawRow],
    mapping: &ColumnMapping,
    source: &str,
    stats: &mut RefreshStats,
) -> Vec<CityRecord> {
    stats.rows_fetched += rows.len();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match normalize(row, mapping, source) {
            Normalized::Record(rec) => out.push(rec),
            Normalized::Skipped(reason) => {
                trace!(source, ?reason, "row skipped");
                match reason {
                    SkipReason::MissingCity => stats.skipped_missing_city += 1,
                    SkipReason::MissingCountry => stats.skipped_missing_country += 1,
                    SkipReason::InvalidPopulation => stats.skipped_invalid_population += 1,
                }
            }
        }
    }
    out
}

/// Coerce a population cell to a positive integer.
///
/// Separators, citation markers, parenthesized qualifiers and symbols such as
/// `~` are dropped. Unicode dashes count as `-`, so ranges such as
/// `"2,000–3,000"` are rejected. Letters are rejected except a single exponent
/// marker, so magnitude suffixes like `"1.2M"` yield `None` rather than a
/// guess. Zero, negative and out-of-range values yield `None`.
///
/// ```rust
/// use citypop_core::normalize::parse_population;
///
/// assert_eq!(parse_population("1,234,567"), Some(1_234_567));
/// assert_eq!(parse_population("37,400,068[3] (2023)"), Some(37_400_068));
/// assert_eq!(parse_population("1.2e6"), Some(1_200_000));
/// assert_eq!(parse_population("1.2M"), None);
/// assert_eq!(parse_population("-5"), None);
/// assert_eq!(parse_population(""), None);
/// ```
pub fn parse_population(raw: &str) -> Option<u64> {
    let text = strip_parenthesized(&strip_citations(&decode_entities(raw)));

    let mut cleaned = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '0'..='9' | '.' | '+' | '-' => cleaned.push(ch),
            '\u{2010}'..='\u{2015}' | '\u{2212}' => cleaned.push('-'),
            c if c.is_alphabetic() => cleaned.push(c),
            _ => {}
        }
    }
    if cleaned.is_empty() {
        return None;
    }

    // "1.234.567" uses dots as thousands separators.
    if cleaned.matches('.').count() > 1 {
        cleaned.retain(|c| c != '.');
    }

    if !is_numeric_literal(&cleaned) {
        return None;
    }

    if let Ok(v) = cleaned.parse::<i64>() {
        return u64::try_from(v).ok().filter(|&p| p > 0);
    }
    let v: f64 = cleaned.parse().ok()?;
    if !v.is_finite() {
        return None;
    }
    let rounded = v.round();
    if rounded < 1.0 || rounded >= u64::MAX as f64 {
        return None;
    }
    Some(rounded as u64)
}

/// Sign, digits, optional fraction, optional exponent. Nothing else.
fn is_numeric_literal(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(i) => (&body[..i], Some(&body[i + 1..])),
        None => (body, None),
    };
    let mut parts = mantissa.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    let digits_ok = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    if int_part.is_empty() && frac_part.map_or(true, str::is_empty) {
        return false;
    }
    if !digits_ok(int_part) || !frac_part.map_or(true, digits_ok) {
        return false;
    }
    match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && digits_ok(exp)
        }
    }
}

fn strip_parenthesized(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for ch in s.chars() {
        match ch {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Parse a coordinate; anything out of `[-bound, bound]` is treated as absent.
pub fn parse_coordinate(raw: &str, bound: f64) -> Option<f64> {
    let text = strip_citations(raw);
    let v: f64 = text.trim().parse().ok()?;
    (v.is_finite() && v.abs() <= bound).then_some(v)
}

/// Parse a measurement timestamp: RFC 3339, `YYYY-MM-DD`, or a bare year.
pub fn parse_as_of(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = s.parse().ok()?;
        return Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPING: ColumnMapping = ColumnMapping {
        city: &["name", "city"],
        country: &["country"],
        population: &["population", "pop"],
        latitude: &["lat", "latitude"],
        longitude: &["lng", "longitude"],
        native_id: &["id"],
        as_of: &["year"],
    };

    fn record(row: RawRow) -> CityRecord {
        match normalize(&row, &MAPPING, "test") {
            Normalized::Record(r) => r,
            Normalized::Skipped(reason) => panic!("unexpected skip: {reason:?}"),
        }
    }

    #[test]
    fn population_policy() {
        assert_eq!(parse_population("1,234,567"), Some(1_234_567));
        assert_eq!(parse_population("1.2M"), None);
        assert_eq!(parse_population(""), None);
        assert_eq!(parse_population("-5"), None);
        assert_eq!(parse_population("0"), None);
        assert_eq!(parse_population("N/A"), None);
        assert_eq!(parse_population("~ 3 000 000"), Some(3_000_000));
        assert_eq!(parse_population("8336817.0"), Some(8_336_817));
        assert_eq!(parse_population("1.234.567"), Some(1_234_567));
        assert_eq!(parse_population("21,893,095[12]"), Some(21_893_095));
        assert_eq!(parse_population("1990-2000"), None);
        assert_eq!(parse_population("2,000\u{2013}3,000"), None);
        assert_eq!(parse_population("2,000\u{2014}3,000"), None);
        assert_eq!(parse_population("\u{2212}5"), None);
        assert_eq!(parse_population("1e30"), None);
        assert_eq!(parse_population("99999999999999999999"), None);
        assert_eq!(parse_population("1e9"), Some(1_000_000_000));
    }

    #[test]
    fn coordinates_out_of_range_are_absent_not_skipped() {
        let rec = record(
            RawRow::new()
                .with("name", "Nowhere")
                .with("country", "X")
                .with("pop", "10")
                .with("lat", "123.0")
                .with("lng", "abc"),
        );
        assert_eq!(rec.latitude, None);
        assert_eq!(rec.longitude, None);
        assert_eq!(rec.population, 10);
    }

    #[test]
    fn entity_key_prefers_native_id() {
        let with_id = record(
            RawRow::new()
                .with("id", "Q1490")
                .with("name", "Tokyo")
                .with("country", "Japan")
                .with("population", "14000000"),
        );
        assert_eq!(with_id.entity_key, "Q1490");

        let without_id = record(
            RawRow::new()
                .with("city", " Tokyo[1] ")
                .with("country", "Japan")
                .with("population", "14000000"),
        );
        assert_eq!(without_id.city, "Tokyo");
        assert_eq!(without_id.entity_key, "tokyo|japan");
    }

    #[test]
    fn skips_are_typed_and_counted() {
        let rows = vec![
            RawRow::new().with("country", "X").with("pop", "5"),
            RawRow::new().with("name", "A").with("pop", "5"),
            RawRow::new().with("name", "A").with("country", "X").with("pop", "1.2M"),
            RawRow::new().with("name", "[1]").with("country", "X").with("pop", "5"),
            RawRow::new().with("name", "A").with("country", "X").with("pop", "5"),
        ];
        let mut stats = RefreshStats::default();
        let out = normalize_rows(&rows, &MAPPING, "test", &mut stats);
        assert_eq!(out.len(), 1);
        assert_eq!(stats.rows_fetched, 5);
        assert_eq!(stats.skipped_missing_city, 2);
        assert_eq!(stats.skipped_missing_country, 1);
        assert_eq!(stats.skipped_invalid_population, 1);
    }

    #[test]
    fn as_of_formats() {
        let y = parse_as_of("2023").unwrap();
        assert_eq!(y, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        assert!(parse_as_of("2020-07-01T00:00:00Z").is_some());
        assert!(parse_as_of("2020-07-01").is_some());
        assert!(parse_as_of("last year").is_none());
    }
}
