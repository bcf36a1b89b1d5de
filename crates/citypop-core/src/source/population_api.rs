// crates/citypop-core/src/source/population_api.rs

//! JSON-over-HTTP city list (default: WorldPopulationReview `cities.json`).

use super::{fetch_bytes, HttpClient, HttpRequest, SourceAdapter, SourceRole};
use crate::error::SourceUnavailable;
use crate::normalize::ColumnMapping;
use crate::raw::RawRow;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_URL: &str = "https://worldpopulationreview.com/static/cities.json";

/// Field names seen across revisions of the endpoint.
pub const MAPPING: ColumnMapping = ColumnMapping {
    city: &["name", "city", "cityName"],
    country: &["country", "countryName", "country_name"],
    population: &["population", "pop", "pop2024", "pop2023"],
    latitude: &["lat", "latitude"],
    longitude: &["lng", "lon", "longitude"],
    native_id: &[],
    as_of: &["year", "as_of"],
};

/// Keys under which a wrapped payload usually keeps its list.
const WRAPPER_KEYS: &[&str] = &["data", "cities", "results", "items"];

#[derive(Debug, Clone)]
pub struct PopulationApiAdapter {
    name: String,
    url: String,
    timeout: Duration,
    role: SourceRole,
}

impl PopulationApiAdapter {
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

impl SourceAdapter for PopulationApiAdapter {
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
        let request = HttpRequest::get(&self.url, self.timeout)
            .accept("application/json,text/plain,*/*");
        let body = fetch_bytes(&self.name, http, &request)?;
        parse_payload(&body).map_err(|msg| SourceUnavailable::format(&self.name, msg))
    }
}

/// Parse a JSON list of city objects. Non-object elements are dropped.
pub fn parse_payload(body: &[u8]) -> Result<Vec<RawRow>, String> {
    let value: Value = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    let items = list_of(&value).ok_or_else(|| "expected a JSON array of cities".to_string())?;

    let rows: Vec<RawRow> = items.iter().filter_map(RawRow::from_json_object).collect();
    if rows.len() < items.len() {
        debug!(dropped = items.len() - rows.len(), "non-object list elements dropped");
    }
    Ok(rows)
}

fn list_of(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(obj) => WRAPPER_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
            .or_else(|| obj.values().find_map(Value::as_array)),
        _ => None,
    }
}
