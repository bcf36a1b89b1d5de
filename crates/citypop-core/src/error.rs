// crates/citypop-core/src/error.rs

//! Error taxonomy.
//!
//! Adapter failures ([`SourceUnavailable`]) stay inside the fallback chain.
//! Everything a caller can observe is a [`CityError`].

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Why a single provider could not deliver a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCause {
    /// Connection refused, DNS failure, timeout, truncated body.
    Network(String),
    /// The provider answered with a non-2xx status.
    HttpStatus(u16),
    /// The payload could not be parsed at all.
    Format(String),
}

impl fmt::Display for SourceCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceCause::Network(msg) => write!(f, "network error: {msg}"),
            SourceCause::HttpStatus(code) => write!(f, "HTTP status {code}"),
            SourceCause::Format(msg) => write!(f, "malformed payload: {msg}"),
        }
    }
}

/// A provider failed as a whole. Row-level problems never produce this.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("source '{provider}' unavailable: {cause}")]
pub struct SourceUnavailable {
    pub provider: String,
    pub cause: SourceCause,
}

impl SourceUnavailable {
    pub fn new(provider: impl Into<String>, cause: SourceCause) -> Self {
        Self {
            provider: provider.into(),
            cause,
        }
    }

    pub fn network(provider: impl Into<String>, msg: impl fmt::Display) -> Self {
        Self::new(provider, SourceCause::Network(msg.to_string()))
    }

    pub fn status(provider: impl Into<String>, code: u16) -> Self {
        Self::new(provider, SourceCause::HttpStatus(code))
    }

    pub fn format(provider: impl Into<String>, msg: impl fmt::Display) -> Self {
        Self::new(provider, SourceCause::Format(msg.to_string()))
    }
}

/// One entry of the chain's failure log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderFailure {
    Unavailable(SourceUnavailable),
    /// The provider answered, but normalization left nothing usable.
    NoUsableRows { provider: String, skipped: usize },
}

impl ProviderFailure {
    pub fn provider(&self) -> &str {
        match self {
            ProviderFailure::Unavailable(e) => &e.provider,
            ProviderFailure::NoUsableRows { provider, .. } => provider,
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFailure::Unavailable(e) => write!(f, "{e}"),
            ProviderFailure::NoUsableRows { provider, skipped } => write!(
                f,
                "source '{provider}' returned no usable rows ({skipped} skipped)"
            ),
        }
    }
}

/// Ordered list of per-provider failures, in chain order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureLog(pub Vec<ProviderFailure>);

impl FailureLog {
    pub fn iter(&self) -> impl Iterator<Item = &ProviderFailure> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FailureLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no sources configured");
        }
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

/// Errors surfaced by citypop-core.
#[derive(Debug, Error)]
pub enum CityError {
    #[error("all sources unavailable: {0}")]
    AllSourcesUnavailable(FailureLog),

    /// A refresh failed. `stale_since` is set when an older dataset keeps serving.
    #[error("{}", refresh_failed_message(.stale_since, .causes))]
    RefreshFailed {
        causes: FailureLog,
        stale_since: Option<DateTime<Utc>>,
    },

    #[error("no data available: {0}")]
    NoDataAvailable(FailureLog),

    #[error("invalid query parameter `{param}`: {reason}")]
    QueryParamInvalid { param: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("snapshot encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("lookup failed: {0}")]
    Lookup(#[from] SourceUnavailable),
}

fn refresh_failed_message(stale_since: &Option<DateTime<Utc>>, causes: &FailureLog) -> String {
    match stale_since {
        Some(at) => format!(
            "showing data from {}, refresh failed: {causes}",
            at.format("%Y-%m-%d %H:%M UTC")
        ),
        None => format!("refresh failed, no data available: {causes}"),
    }
}

impl CityError {
    /// `true` when older data is still being served despite this error.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            CityError::RefreshFailed {
                stale_since: Some(_),
                ..
            }
        )
    }

    /// Per-provider causes, when the error came out of the fallback chain.
    pub fn causes(&self) -> Option<&FailureLog> {
        match self {
            CityError::AllSourcesUnavailable(log)
            | CityError::NoDataAvailable(log)
            | CityError::RefreshFailed { causes: log, .. } => Some(log),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for CityError {
    fn from(e: toml::de::Error) -> Self {
        CityError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CityError>;
