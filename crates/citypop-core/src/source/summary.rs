// crates/citypop-core/src/source/summary.rs

//! Page-summary lookup used to decorate one selected city with prose.
//! Not part of the canonical dataset; it never affects ranking or filtering.

use super::{fetch_bytes, HttpClient, HttpRequest};
use crate::error::{SourceCause, SourceUnavailable};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary/";
const PROVIDER: &str = "page-summary";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extract: String,
    /// Link to the full page, when the endpoint supplies one.
    #[serde(default)]
    pub page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryPayload {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageLink>,
}

#[derive(Debug, Deserialize)]
struct PageLink {
    page: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PageSummaryClient {
    base_url: String,
    timeout: Duration,
}

impl PageSummaryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Endpoint URL for a human-readable title (`New York City` -> `.../New_York_City`).
    pub fn url_for(&self, title: &str) -> Result<String, SourceUnavailable> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SourceUnavailable::format(PROVIDER, format!("bad base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SourceUnavailable::format(PROVIDER, "base URL cannot take a path"))?
            .pop_if_empty()
            .push(&title.trim().replace(' ', "_"));
        Ok(url.into())
    }

    /// Fetch the summary. A page that does not exist is `Ok(None)`.
    pub fn fetch(
        &self,
        http: &dyn HttpClient,
        title: &str,
    ) -> Result<Option<PageSummary>, SourceUnavailable> {
        let request = HttpRequest::get(self.url_for(title)?, self.timeout).accept("application/json");
        let body = match fetch_bytes(PROVIDER, http, &request) {
            Ok(body) => body,
            Err(SourceUnavailable {
                cause: SourceCause::HttpStatus(404),
                ..
            }) => return Ok(None),
            Err(e) => return Err(e),
        };
        parse_summary(&body)
            .map(Some)
            .map_err(|msg| SourceUnavailable::format(PROVIDER, msg))
    }
}

pub fn parse_summary(body: &[u8]) -> Result<PageSummary, String> {
    let payload: SummaryPayload = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    Ok(PageSummary {
        title: payload.title,
        description: payload.description,
        extract: payload.extract,
        page_url: payload
            .content_urls
            .and_then(|c| c.desktop)
            .and_then(|d| d.page),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_are_path_encoded() {
        let client = PageSummaryClient::new(DEFAULT_BASE_URL, Duration::from_secs(5));
        assert_eq!(
            client.url_for("New York City").unwrap(),
            "https://en.wikipedia.org/api/rest_v1/page/summary/New_York_City"
        );
        assert_eq!(
            client.url_for("São Paulo").unwrap(),
            "https://en.wikipedia.org/api/rest_v1/page/summary/S%C3%A3o_Paulo"
        );
    }

    #[test]
    fn summary_payload_is_flattened() {
        let body = br#"{"title":"Tokyo","description":"Capital of Japan","extract":"Tokyo is...",
            "content_urls":{"desktop":{"page":"https://en.wikipedia.org/wiki/Tokyo"}}}"#;
        let s = parse_summary(body).unwrap();
        assert_eq!(s.title, "Tokyo");
        assert_eq!(s.page_url.as_deref(), Some("https://en.wikipedia.org/wiki/Tokyo"));
    }
}
