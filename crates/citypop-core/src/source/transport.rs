// crates/citypop-core/src/source/transport.rs

//! The HTTP seam. Adapters only ever see [`HttpClient`]; production code
//! plugs in [`ReqwestClient`], tests plug in canned responses.

use crate::error::SourceCause;
use std::time::Duration;

/// A GET request as an adapter describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub accept: &'static str,
    /// Whole-request bound. Exceeding it is a [`SourceCause::Network`] failure.
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            accept: "*/*",
            timeout,
        }
    }

    pub fn accept(mut self, accept: &'static str) -> Self {
        self.accept = accept;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Blocking GET returning the body of a 2xx response.
///
/// Implementations classify failures: transport problems and timeouts are
/// `Network`, non-2xx answers are `HttpStatus`. They never retry.
pub trait HttpClient: Send + Sync {
    fn get(&self, request: &HttpRequest) -> Result<Vec<u8>, SourceCause>;
}

#[cfg(feature = "fetch")]
pub use self::reqwest_client::ReqwestClient;

#[cfg(feature = "fetch")]
mod reqwest_client {
    use super::{HttpClient, HttpRequest};
    use crate::error::{CityError, Result, SourceCause};
    use reqwest::blocking::Client;
    use reqwest::header::ACCEPT;
    use std::time::Duration;
    use tracing::debug;

    /// [`HttpClient`] backed by `reqwest::blocking`.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: Client,
    }

    impl ReqwestClient {
        pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self> {
            let client = Client::builder()
                .user_agent(user_agent)
                .connect_timeout(connect_timeout)
                .build()
                .map_err(|e| CityError::Config(format!("cannot build HTTP client: {e}")))?;
            Ok(Self { client })
        }
    }

    impl HttpClient for ReqwestClient {
        fn get(&self, request: &HttpRequest) -> std::result::Result<Vec<u8>, SourceCause> {
            debug!(url = %request.url, timeout = ?request.timeout, "GET");
            let response = self
                .client
                .get(&request.url)
                .query(&request.query)
                .header(ACCEPT, request.accept)
                .timeout(request.timeout)
                .send()
                .map_err(classify)?;

            let status = response.status();
            if !status.is_success() {
                return Err(SourceCause::HttpStatus(status.as_u16()));
            }
            response.bytes().map(|b| b.to_vec()).map_err(classify)
        }
    }

    fn classify(e: reqwest::Error) -> SourceCause {
        match e.status() {
            Some(status) => SourceCause::HttpStatus(status.as_u16()),
            None if e.is_decode() => SourceCause::Format(e.to_string()),
            None => SourceCause::Network(e.to_string()),
        }
    }
}
