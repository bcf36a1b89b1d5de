// crates/citypop-core/src/source/html_table.rs

//! Crawled HTML page with a city/country/population table
//! (default: Wikipedia "List of largest cities").
//!
//! The scanner is deliberately naive: it works on ASCII-lowercased copies of
//! the markup so byte offsets stay valid, and it does not build a DOM.
//! Column roles are found by regex over the lower-cased header text.

use super::{fetch_bytes, HttpClient, HttpRequest, SourceAdapter, SourceRole};
use crate::error::SourceUnavailable;
use crate::normalize::ColumnMapping;
use crate::raw::RawRow;
use crate::text::clean_text;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_URL: &str = "https://en.wikipedia.org/wiki/List_of_largest_cities";

static COUNTRY_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"country|nation|state").expect("valid regex"));
static CITY_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"city|name|urban|municipality|metropolis|town").expect("valid regex"));
static POPULATION_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"pop").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct HtmlTableAdapter {
    name: String,
    url: String,
    timeout: Duration,
    role: SourceRole,
}

impl HtmlTableAdapter {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            timeout,
            role: SourceRole::Primary,
        }
    }

    pub fn with_role(mut self, role: SourceRole) -> Self {
        self.role = role;
        self
    }
}

impl SourceAdapter for HtmlTableAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> SourceRole {
        self.role
    }

    fn mapping(&self) -> &ColumnMapping {
        &ColumnMapping::CANONICAL
    }

    fn fetch(&self, http: &dyn HttpClient) -> Result<Vec<RawRow>, SourceUnavailable> {
        let request = HttpRequest::get(&self.url, self.timeout).accept("text/html");
        let body = fetch_bytes(&self.name, http, &request)?;
        let html = String::from_utf8_lossy(&body);
        parse_tables(&html).ok_or_else(|| {
            SourceUnavailable::format(&self.name, "no table with city, country and population columns")
        })
    }
}

/// Column positions of the three roles in one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    city: usize,
    country: usize,
    population: usize,
}

impl Columns {
    /// Country is claimed first so "Country name" never reads as a city column.
    fn detect(headers: &[String]) -> Option<Self> {
        let lower: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
        let find = |re: &Regex, taken: &[usize]| {
            lower
                .iter()
                .enumerate()
                .find(|(i, h)| !taken.contains(i) && re.is_match(h))
                .map(|(i, _)| i)
        };
        let country = find(&COUNTRY_HEADER, &[])?;
        let population = find(&POPULATION_HEADER, &[country])?;
        let city = find(&CITY_HEADER, &[country, population])?;
        Some(Self {
            city,
            country,
            population,
        })
    }

    fn max(&self) -> usize {
        self.city.max(self.country).max(self.population)
    }
}

/// Rows of the first table whose header row matches all three roles.
pub fn parse_tables(html: &str) -> Option<Vec<RawRow>> {
    let lower = html.to_ascii_lowercase();
    let mut from = 0;
    while let Some((start, end)) = next_block(&lower, "<table", "</table>", from) {
        from = end;
        if let Some(rows) = parse_table(&html[start..end], &lower[start..end]) {
            return Some(rows);
        }
    }
    None
}

fn parse_table(table: &str, lower: &str) -> Option<Vec<RawRow>> {
    let mut rows_iter = table_rows(table, lower).into_iter();

    // The header is the first row holding <th> cells that name all three roles.
    let columns = loop {
        let (cells, has_th) = rows_iter.next()?;
        if !has_th {
            continue;
        }
        if let Some(c) = Columns::detect(&cells) {
            break c;
        }
    };

    let mut out = Vec::new();
    let mut dropped = 0usize;
    for (cells, _) in rows_iter {
        if cells.len() <= columns.max() {
            dropped += 1;
            continue;
        }
        out.push(
            RawRow::new()
                .with("city", cells[columns.city].as_str())
                .with("country", cells[columns.country].as_str())
                .with("population", cells[columns.population].as_str()),
        );
    }
    if dropped > 0 {
        debug!(dropped, "short table rows dropped");
    }
    Some(out)
}

/// Every `<tr>` as cleaned cell texts, plus whether it contained a `<th>`.
fn table_rows(table: &str, lower: &str) -> Vec<(Vec<String>, bool)> {
    let mut rows = Vec::new();
    let mut from = 0;
    while let Some((start, end)) = next_block(lower, "<tr", "</tr>", from) {
        from = end;
        rows.push(row_cells(&table[start..end], &lower[start..end]));
    }
    rows
}

fn row_cells(row: &str, lower: &str) -> (Vec<String>, bool) {
    let mut cells = Vec::new();
    let mut has_th = false;
    let mut pos = 0;
    while let Some((open, is_th)) = next_cell_open(lower, pos) {
        has_th |= is_th;
        let Some(content_start) = lower[open..].find('>').map(|i| open + i + 1) else {
            break;
        };
        let close_tag = if is_th { "</th" } else { "</td" };
        let content_end = [
            lower[content_start..].find(close_tag),
            next_cell_open(lower, content_start).map(|(i, _)| i - content_start),
        ]
        .into_iter()
        .flatten()
        .min()
        .map(|i| content_start + i)
        .unwrap_or(lower.len());

        cells.push(clean_text(&strip_tags(&row[content_start..content_end])));
        pos = content_end;
    }
    (cells, has_th)
}

/// Position of the next `<td` / `<th` opening tag (not `<thead`, `<tbody>`...).
fn next_cell_open(lower: &str, from: usize) -> Option<(usize, bool)> {
    let bytes = lower.as_bytes();
    let mut search = from;
    while let Some(rel) = lower.get(search..)?.find("<t") {
        let i = search + rel;
        let kind = bytes.get(i + 2).copied();
        let after = bytes.get(i + 3).copied();
        let is_tag_end = matches!(after, Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') | Some(b'/'));
        match kind {
            Some(b'd') if is_tag_end => return Some((i, false)),
            Some(b'h') if is_tag_end => return Some((i, true)),
            _ => search = i + 2,
        }
    }
    None
}

/// Find the next complete block from `from` onwards, on lower-cased input.
fn next_block(lower: &str, open: &str, close: &str, from: usize) -> Option<(usize, usize)> {
    let start = lower.get(from..)?.find(open)? + from;
    let end = match lower[start + open.len()..].find(close) {
        Some(rel) => start + open.len() + rel + close.len(),
        None => lower.len(),
    };
    Some((start, end))
}

/// Remove all tags, and drop `<style>`/`<sup>` contents (sort keys, footnotes).
fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let tail = &rest[lt..];
        let tail_lower = tail.get(..6).unwrap_or(tail).to_ascii_lowercase();
        let skip_to = if tail_lower.starts_with("<sup") {
            find_ci(tail, "</sup>").map(|i| i + "</sup>".len())
        } else if tail_lower.starts_with("<style") {
            find_ci(tail, "</style>").map(|i| i + "</style>".len())
        } else {
            tail.find('>').map(|i| i + 1)
        };
        match skip_to {
            Some(n) => rest = &tail[n..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
<table class="infobox"><tr><th>Motto</th><td>none</td></tr></table>
<TABLE class="wikitable sortable">
<thead>
<tr><th>City</th><th>Country</th><th>Population<sup>[a]</sup></th></tr>
</thead>
<tbody>
<tr><th scope="row"><a href="/wiki/Tokyo">Tokyo</a></th><td><span class="flag"></span>&nbsp;Japan</td><td>37,468,000<sup class="reference">[3]</sup></td></tr>
<tr><td>Delhi</td><td>India</td><td>28,514,000</td></tr>
<tr><td colspan="3">Footer</td></tr>
</tbody>
</TABLE>
</body></html>"#;

    #[test]
    fn finds_matching_table_and_rows() {
        let rows = parse_tables(PAGE).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("city"), Some("Tokyo"));
        assert_eq!(rows[0].get("country"), Some("Japan"));
        assert_eq!(rows[0].get("population"), Some("37,468,000"));
        assert_eq!(rows[1].get("city"), Some("Delhi"));
    }

    #[test]
    fn header_detection_claims_country_first() {
        let headers = vec![
            "Rank".to_string(),
            "Country name".to_string(),
            "City".to_string(),
            "Pop. (2020)".to_string(),
        ];
        assert_eq!(
            Columns::detect(&headers),
            Some(Columns {
                city: 2,
                country: 1,
                population: 3
            })
        );
    }

    #[test]
    fn page_without_table_is_none() {
        assert!(parse_tables("<p>nothing here</p>").is_none());
    }
}
