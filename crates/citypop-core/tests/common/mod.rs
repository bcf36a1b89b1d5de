#![allow(dead_code)]

use citypop_core::normalize::ColumnMapping;
use citypop_core::raw::RawRow;
use citypop_core::{
    CityRecord, HttpClient, HttpRequest, SourceAdapter, SourceCause, SourceRole,
    SourceUnavailable,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// HTTP client answering from a URL -> response table. Unknown URLs are 404.
#[derive(Default)]
pub struct CannedHttp {
    responses: Mutex<HashMap<String, Result<Vec<u8>, SourceCause>>>,
    pub requests: Mutex<Vec<String>>,
}

impl CannedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.lock().insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn fail(self, url: &str, cause: SourceCause) -> Self {
        self.responses.lock().insert(url.to_string(), Err(cause));
        self
    }

    pub fn set(&self, url: &str, response: Result<Vec<u8>, SourceCause>) {
        self.responses.lock().insert(url.to_string(), response);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl HttpClient for CannedHttp {
    fn get(&self, request: &HttpRequest) -> Result<Vec<u8>, SourceCause> {
        self.requests.lock().push(request.url.clone());
        self.responses
            .lock()
            .get(&request.url)
            .cloned()
            .unwrap_or(Err(SourceCause::HttpStatus(404)))
    }
}

/// What a [`FakeAdapter`] returns on each call.
#[derive(Clone)]
pub enum Script {
    Rows(Vec<RawRow>),
    Fail(SourceCause),
}

/// Adapter that ignores the transport and counts its calls.
pub struct FakeAdapter {
    name: String,
    role: SourceRole,
    script: Arc<Mutex<Script>>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeAdapter {
    pub fn rows(name: &str, rows: Vec<RawRow>) -> Self {
        Self::new(name, Script::Rows(rows))
    }

    pub fn failing(name: &str, cause: SourceCause) -> Self {
        Self::new(name, Script::Fail(cause))
    }

    fn new(name: &str, script: Script) -> Self {
        Self {
            name: name.to_string(),
            role: SourceRole::Primary,
            script: Arc::new(Mutex::new(script)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn augment(mut self) -> Self {
        self.role = SourceRole::Augment;
        self
    }

    /// Handles kept by the test after the adapter is boxed into a chain.
    pub fn handles(&self) -> (Arc<AtomicUsize>, Arc<Mutex<Script>>) {
        (Arc::clone(&self.calls), Arc::clone(&self.script))
    }

    pub fn boxed(self) -> Box<dyn SourceAdapter> {
        Box::new(self)
    }
}

impl SourceAdapter for FakeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> SourceRole {
        self.role
    }

    fn mapping(&self) -> &ColumnMapping {
        &ColumnMapping::CANONICAL
    }

    fn fetch(&self, _http: &dyn HttpClient) -> Result<Vec<RawRow>, SourceUnavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.script.lock() {
            Script::Rows(rows) => Ok(rows.clone()),
            Script::Fail(cause) => Err(SourceUnavailable::new(&self.name, cause.clone())),
        }
    }
}

pub fn row(city: &str, country: &str, population: &str) -> RawRow {
    RawRow::new()
        .with("city", city)
        .with("country", country)
        .with("population", population)
}

pub fn record(city: &str, country: &str, population: u64) -> CityRecord {
    CityRecord {
        city: city.into(),
        country: country.into(),
        population,
        latitude: None,
        longitude: None,
        source: "test".into(),
        as_of: None,
        entity_key: CityRecord::name_key(city, country),
    }
}

pub fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
