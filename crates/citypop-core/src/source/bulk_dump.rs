// crates/citypop-core/src/source/bulk_dump.rs

//! Bulk GeoNames extract (`cities15000.zip` by default).
//!
//! Fixed 19-column tab-separated schema, one place per line. The payload may
//! arrive as a zip archive, a gzip stream or plain text.

use super::{fetch_bytes, HttpClient, HttpRequest, SourceAdapter, SourceRole};
use crate::error::SourceUnavailable;
use crate::normalize::ColumnMapping;
use crate::raw::RawRow;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_URL: &str = "https://download.geonames.org/export/dump/cities15000.zip";
pub const DEFAULT_MEMBER: &str = "cities15000.txt";

/// GeoNames "geoname" table columns, in file order.
pub const COLUMNS: [&str; 19] = [
    "geonameid",
    "name",
    "asciiname",
    "alternatenames",
    "latitude",
    "longitude",
    "feature_class",
    "feature_code",
    "country_code",
    "cc2",
    "admin1_code",
    "admin2_code",
    "admin3_code",
    "admin4_code",
    "population",
    "elevation",
    "dem",
    "timezone",
    "modification_date",
];

pub const MAPPING: ColumnMapping = ColumnMapping {
    city: &["name", "asciiname"],
    country: &["country_code"],
    population: &["population"],
    latitude: &["latitude"],
    longitude: &["longitude"],
    native_id: &["geonameid"],
    // modification_date is an edit time, not a measurement time.
    as_of: &[],
};

#[derive(Debug, Clone)]
pub struct BulkDumpAdapter {
    name: String,
    url: String,
    member: String,
    timeout: Duration,
    role: SourceRole,
}

impl BulkDumpAdapter {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            member: DEFAULT_MEMBER.to_string(),
            timeout,
            role: SourceRole::Primary,
        }
    }

    /// Archive entry to read when the payload is a zip.
    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = member.into();
        self
    }

    pub fn with_role(mut self, role: SourceRole) -> Self {
        self.role = role;
        self
    }
}

impl SourceAdapter for BulkDumpAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> SourceRole {
        self.role
    }

    fn mapping(&self) -> &ColumnMapping {
        &MAPPING
    }

    fn fetch(&self, http: &dyn HttpClient) -> Result<Vec<RawRow>, SourceUnavailable> {
        let request = HttpRequest::get(&self.url, self.timeout);
        let body = fetch_bytes(&self.name, http, &request)?;
        let text = decode_payload(&body, &self.member)
            .map_err(|msg| SourceUnavailable::format(&self.name, msg))?;
        Ok(parse_tsv(&text))
    }
}

/// Parse the TSV body. Lines with the wrong column count are dropped.
pub fn parse_tsv(text: &str) -> Vec<RawRow> {
    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cells: Vec<&str> = line.split('\t').collect();
        if cells.len() != COLUMNS.len() {
            dropped += 1;
            continue;
        }
        rows.push(COLUMNS.iter().copied().zip(cells).collect());
    }
    if dropped > 0 {
        debug!(dropped, "malformed dump lines dropped");
    }
    rows
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

/// Turn the raw body into text, unpacking zip or gzip by magic bytes.
pub fn decode_payload(body: &[u8], member: &str) -> Result<String, String> {
    if body.starts_with(ZIP_MAGIC) {
        return unzip_member(body, member);
    }
    if body.starts_with(GZIP_MAGIC) {
        return gunzip(body);
    }
    String::from_utf8(body.to_vec()).map_err(|e| format!("dump is not UTF-8: {e}"))
}

#[cfg(feature = "compact")]
fn unzip_member(body: &[u8], member: &str) -> Result<String, String> {
    use std::io::{Cursor, Read};

    let mut archive = zip::ZipArchive::new(Cursor::new(body)).map_err(|e| e.to_string())?;
    let target = if archive.file_names().any(|n| n == member) {
        member.to_string()
    } else {
        archive
            .file_names()
            .find(|n| n.ends_with(".txt"))
            .map(str::to_string)
            .ok_or_else(|| format!("archive has no member '{member}'"))?
    };
    let mut file = archive.by_name(&target).map_err(|e| e.to_string())?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(|e| e.to_string())?;
    String::from_utf8(buf).map_err(|e| format!("dump is not UTF-8: {e}"))
}

#[cfg(feature = "compact")]
fn gunzip(body: &[u8]) -> Result<String, String> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let mut text = String::new();
    GzDecoder::new(body)
        .read_to_string(&mut text)
        .map_err(|e| e.to_string())?;
    Ok(text)
}

#[cfg(not(feature = "compact"))]
fn unzip_member(_body: &[u8], _member: &str) -> Result<String, String> {
    Err("zip payload but 'compact' feature disabled".into())
}

#[cfg(not(feature = "compact"))]
fn gunzip(_body: &[u8]) -> Result<String, String> {
    Err("gzip payload but 'compact' feature disabled".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, name: &str, cc: &str, pop: &str, lat: &str, lng: &str) -> String {
        let mut cells = vec![""; 19];
        cells[0] = id;
        cells[1] = name;
        cells[2] = name;
        cells[4] = lat;
        cells[5] = lng;
        cells[6] = "P";
        cells[7] = "PPLC";
        cells[8] = cc;
        cells[14] = pop;
        cells[18] = "2024-01-01";
        cells.join("\t")
    }

    #[test]
    fn parses_fixed_schema_and_drops_short_lines() {
        let text = format!(
            "{}\n{}\nbroken\tline\n",
            line("1850147", "Tokyo", "JP", "8336599", "35.6895", "139.69171"),
            line("1273294", "Delhi", "IN", "10927986", "28.65195", "77.23149"),
        );
        let rows = parse_tsv(&text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("geonameid"), Some("1850147"));
        assert_eq!(rows[1].get("country_code"), Some("IN"));
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(decode_payload(b"abc", DEFAULT_MEMBER).unwrap(), "abc");
    }

    #[cfg(feature = "compact")]
    #[test]
    fn gzip_payload_is_unpacked() {
        use flate2::{write::GzEncoder, Compression};
        use std::io::Write;

        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"hello dump").unwrap();
        let gz = enc.finish().unwrap();
        assert_eq!(decode_payload(&gz, DEFAULT_MEMBER).unwrap(), "hello dump");
    }
}
