// crates/citypop-core/src/source/knowledge_graph.rs

//! Public knowledge-graph query endpoint (Wikidata SPARQL).
//!
//! One binding per (city, population statement). A city with several
//! statements yields several rows under the same entity id; the merge
//! engine keeps the most recent one by its point-in-time qualifier.

use super::{fetch_bytes, HttpClient, HttpRequest, SourceAdapter, SourceRole};
use crate::error::SourceUnavailable;
use crate::normalize::ColumnMapping;
use crate::raw::RawRow;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://query.wikidata.org/sparql";
pub const DEFAULT_LIMIT: u32 = 500;

pub const MAPPING: ColumnMapping = ColumnMapping {
    city: &["cityLabel"],
    country: &["countryLabel"],
    population: &["population"],
    latitude: &["latitude"],
    longitude: &["longitude"],
    native_id: &["entity"],
    as_of: &["pointInTime"],
};

/// Cities (instances of subclasses of Q515) with a population statement,
/// its optional P585 qualifier and a P625 coordinate.
pub fn build_query(limit: u32) -> String {
    format!(
        r#"SELECT ?city ?cityLabel ?countryLabel ?population ?pointInTime ?coord WHERE {{
  ?city wdt:P31/wdt:P279* wd:Q515 ;
        wdt:P17 ?country ;
        p:P1082 ?popStatement .
  ?popStatement ps:P1082 ?population .
  OPTIONAL {{ ?popStatement pq:P585 ?pointInTime . }}
  OPTIONAL {{ ?city wdt:P625 ?coord . }}
  FILTER(?population > 1000000)
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "en". }}
}}
ORDER BY DESC(?population)
LIMIT {limit}"#
    )
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<HashMap<String, SparqlValue>>,
}

#[derive(Debug, Deserialize)]
struct SparqlValue {
    value: String,
}

#[derive(Debug, Clone)]
pub struct KnowledgeGraphAdapter {
    name: String,
    endpoint: String,
    limit: u32,
    timeout: Duration,
    role: SourceRole,
}

impl KnowledgeGraphAdapter {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            limit: DEFAULT_LIMIT,
            timeout,
            role: SourceRole::Primary,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_role(mut self, role: SourceRole) -> Self {
        self.role = role;
        self
    }
}

impl SourceAdapter for KnowledgeGraphAdapter {
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
        let request = HttpRequest::get(&self.endpoint, self.timeout)
            .accept("application/sparql-results+json")
            .query("query", build_query(self.limit))
            .query("format", "json");
        let body = fetch_bytes(&self.name, http, &request)?;
        parse_bindings(&body).map_err(|msg| SourceUnavailable::format(&self.name, msg))
    }
}

/// Flatten SPARQL JSON bindings into rows. Bindings without an entity IRI are dropped.
pub fn parse_bindings(body: &[u8]) -> Result<Vec<RawRow>, String> {
    let response: SparqlResponse = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    let total = response.results.bindings.len();

    let rows: Vec<RawRow> = response
        .results
        .bindings
        .into_iter()
        .filter_map(|binding| {
            let entity = binding.get("city").map(|v| entity_id(&v.value))?;
            let mut row = RawRow::new().with("entity", entity);
            for key in ["cityLabel", "countryLabel", "population", "pointInTime"] {
                if let Some(v) = binding.get(key) {
                    row.insert(key, v.value.as_str());
                }
            }
            if let Some((lon, lat)) = binding.get("coord").and_then(|v| parse_wkt_point(&v.value)) {
                row.insert("latitude", lat);
                row.insert("longitude", lon);
            }
            Some(row)
        })
        .collect();

    if rows.len() < total {
        debug!(dropped = total - rows.len(), "bindings without entity dropped");
    }
    Ok(rows)
}

/// `http://www.wikidata.org/entity/Q1490` -> `Q1490`.
fn entity_id(iri: &str) -> String {
    iri.rsplit('/').next().unwrap_or(iri).to_string()
}

/// `Point(139.69 35.68)` -> `("139.69", "35.68")`, longitude first as in WKT.
fn parse_wkt_point(wkt: &str) -> Option<(String, String)> {
    let inner = wkt
        .trim()
        .strip_prefix("Point(")
        .and_then(|s| s.strip_suffix(')'))?;
    let mut parts = inner.split_whitespace();
    let lon = parts.next()?.to_string();
    let lat = parts.next()?.to_string();
    Some((lon, lat))
}
