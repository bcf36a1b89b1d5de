// crates/citypop-core/src/source/mod.rs

//! # Source Adapters
//!
//! One adapter per provider. An adapter owns that provider's transport
//! details and payload shape, and hands raw rows plus its column mapping to
//! the normalizer. Adding a provider means adding one adapter and one
//! [`ColumnMapping`]; nothing downstream changes.

use crate::config::{SourceConfig, SourceKind};
use crate::error::SourceUnavailable;
use crate::normalize::ColumnMapping;
use crate::raw::RawRow;
use serde::{Deserialize, Serialize};

pub mod bulk_dump;
pub mod html_table;
pub mod knowledge_graph;
pub mod population_api;
pub mod summary;
pub mod transport;

pub use bulk_dump::BulkDumpAdapter;
pub use html_table::HtmlTableAdapter;
pub use knowledge_graph::KnowledgeGraphAdapter;
pub use population_api::PopulationApiAdapter;
pub use summary::{PageSummary, PageSummaryClient};
pub use transport::{HttpClient, HttpRequest};

/// What an adapter may contribute to a refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    /// May supply the working dataset.
    #[default]
    Primary,
    /// Only fills fields of an existing dataset, in merge mode.
    Augment,
}

pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn role(&self) -> SourceRole {
        SourceRole::Primary
    }

    /// How this provider's rows map onto canonical fields.
    fn mapping(&self) -> &ColumnMapping;

    /// Fetch and parse. Fails only when the provider fails as a whole;
    /// unparseable rows are dropped here or left for the normalizer to skip.
    fn fetch(&self, http: &dyn HttpClient) -> Result<Vec<RawRow>, SourceUnavailable>;
}

/// Build the adapter described by one configuration entry.
pub fn from_config(cfg: &SourceConfig) -> Box<dyn SourceAdapter> {
    let timeout = cfg.timeout();
    match &cfg.kind {
        SourceKind::PopulationApi { url } => Box::new(
            PopulationApiAdapter::new(&cfg.name, url, timeout).with_role(cfg.role),
        ),
        SourceKind::BulkDump { url, member } => Box::new(
            BulkDumpAdapter::new(&cfg.name, url, timeout)
                .with_member(member)
                .with_role(cfg.role),
        ),
        SourceKind::HtmlTable { url } => {
            Box::new(HtmlTableAdapter::new(&cfg.name, url, timeout).with_role(cfg.role))
        }
        SourceKind::KnowledgeGraph { endpoint, limit } => Box::new(
            KnowledgeGraphAdapter::new(&cfg.name, endpoint, timeout)
                .with_limit(*limit)
                .with_role(cfg.role),
        ),
    }
}

/// Run a request and tag any failure with the provider name.
pub(crate) fn fetch_bytes(
    provider: &str,
    http: &dyn HttpClient,
    request: &HttpRequest,
) -> Result<Vec<u8>, SourceUnavailable> {
    http.get(request)
        .map_err(|cause| SourceUnavailable::new(provider, cause))
}
