// crates/citypop-core/src/export.rs

//! CSV export of a view.

use crate::error::{CityError, Result};
use crate::model::RankedCity;
use serde::Serialize;

#[derive(Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Rank")]
    rank: usize,
    #[serde(rename = "City")]
    city: &'a str,
    #[serde(rename = "Country")]
    country: &'a str,
    #[serde(rename = "Population")]
    population: u64,
    #[serde(rename = "Source")]
    source: &'a str,
}

/// `Rank,City,Country,Population,Source` with standard quoting.
/// An empty view still produces the header line.
pub fn to_csv(rows: &[RankedCity]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(["Rank", "City", "Country", "Population", "Source"])?;
    for r in rows {
        writer.serialize(CsvRow {
            rank: r.rank,
            city: &r.record.city,
            country: &r.record.country,
            population: r.record.population,
            source: &r.record.source,
        })?;
    }
    writer
        .into_inner()
        .map_err(|e| CityError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CityRecord;

    fn ranked(rank: usize, city: &str, country: &str, population: u64) -> RankedCity {
        RankedCity {
            rank,
            bubble_scale: 0.0,
            record: CityRecord {
                city: city.into(),
                country: country.into(),
                population,
                latitude: None,
                longitude: None,
                source: "api".into(),
                as_of: None,
                entity_key: CityRecord::name_key(city, country),
            },
        }
    }

    #[test]
    fn header_only_for_empty_view() {
        assert_eq!(to_csv(&[]).unwrap(), b"Rank,City,Country,Population,Source\n");
    }

    #[test]
    fn fields_with_commas_and_quotes_are_quoted() {
        let out = to_csv(&[
            ranked(1, "Washington, D.C.", "United States", 5_000_000),
            ranked(2, "The \"Big\" Apple", "USA", 8_000_000),
        ])
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "1,\"Washington, D.C.\",United States,5000000,api");
        assert_eq!(lines[2], "2,\"The \"\"Big\"\" Apple\",USA,8000000,api");
    }
}
