// crates/citypop-core/src/lib.rs

pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod export;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod query;
pub mod service;
pub mod snapshot;
pub mod source; // One adapter per provider
pub mod text;
// Shared raw input (used by every adapter and the normalizer)
#[doc(hidden)]
pub mod raw;
pub mod common;

// Re-exports
pub use crate::error::{CityError, Result, SourceCause, SourceUnavailable};
pub use cache::DatasetCache;
pub use chain::{FallbackChain, Resolution};
pub use config::{Config, SourceConfig, SourceKind};
pub use model::{CityRecord, Dataset, RankedCity};
pub use query::{BubbleScaling, QueryParams};
pub use service::{CityService, RefreshReport, ServiceOptions, View};
pub use source::{HttpClient, HttpRequest, PageSummary, SourceAdapter, SourceRole};
pub use crate::common::RefreshStats;
