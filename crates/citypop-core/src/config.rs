// crates/citypop-core/src/config.rs

//! Pipeline configuration.
//!
//! Every field has a default. Out of the box the chain is
//! the population API first with the GeoNames dump as fallback, refreshed hourly.

use crate::error::{CityError, Result};
use crate::source::{bulk_dump, knowledge_graph, population_api, summary, SourceRole};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Time-to-live of a published dataset.
    pub cache_ttl_secs: u64,
    /// After a failed refresh, expired data is served without retrying for this long.
    pub failure_backoff_secs: u64,
    /// Consult `augment` sources after the primary succeeds.
    pub merge_mode: bool,
    /// Collapse records with different keys but the same city and country.
    pub collapse_by_name: bool,
    /// Keep only the N most populous records in the canonical dataset.
    pub dataset_limit: Option<usize>,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub summary: SummaryConfig,
    /// Chain order; earlier sources have higher priority.
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3600,
            failure_backoff_secs: 60,
            merge_mode: false,
            collapse_by_name: true,
            dataset_limit: None,
            user_agent: concat!(
                "Mozilla/5.0 (compatible; citypop/",
                env!("CARGO_PKG_VERSION"),
                ")"
            )
            .to_string(),
            connect_timeout_secs: 10,
            summary: SummaryConfig::default(),
            sources: vec![
                SourceConfig {
                    name: "WorldPopulationReview".into(),
                    role: SourceRole::Primary,
                    timeout_secs: None,
                    kind: SourceKind::PopulationApi {
                        url: population_api::DEFAULT_URL.into(),
                    },
                },
                SourceConfig {
                    name: "GeoNames".into(),
                    role: SourceRole::Primary,
                    timeout_secs: None,
                    kind: SourceKind::BulkDump {
                        url: bulk_dump::DEFAULT_URL.into(),
                        member: bulk_dump::DEFAULT_MEMBER.into(),
                    },
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            base_url: summary::DEFAULT_BASE_URL.into(),
            timeout_secs: 10,
        }
    }
}

/// One adapter in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default)]
    pub role: SourceRole,
    /// Overrides the per-kind default timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(flatten)]
    pub kind: SourceKind,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or_else(|| self.kind.default_timeout_secs()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    PopulationApi {
        url: String,
    },
    BulkDump {
        url: String,
        #[serde(default = "default_member")]
        member: String,
    },
    HtmlTable {
        url: String,
    },
    KnowledgeGraph {
        #[serde(default = "default_endpoint")]
        endpoint: String,
        #[serde(default = "default_limit")]
        limit: u32,
    },
}

impl SourceKind {
    /// Light JSON endpoints get short timeouts, bulk downloads long ones.
    pub fn default_timeout_secs(&self) -> u64 {
        match self {
            SourceKind::PopulationApi { .. } => 15,
            SourceKind::BulkDump { .. } => 30,
            SourceKind::HtmlTable { .. } => 20,
            SourceKind::KnowledgeGraph { .. } => 60,
        }
    }
}

fn default_member() -> String {
    bulk_dump::DEFAULT_MEMBER.into()
}

fn default_endpoint() -> String {
    knowledge_graph::DEFAULT_ENDPOINT.into()
}

fn default_limit() -> u32 {
    knowledge_graph::DEFAULT_LIMIT
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CityError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(CityError::Config("at least one source is required".into()));
        }
        if !self.sources.iter().any(|s| s.role == SourceRole::Primary) {
            return Err(CityError::Config("at least one primary source is required".into()));
        }
        let mut seen = HashSet::new();
        for s in &self.sources {
            if s.name.trim().is_empty() {
                return Err(CityError::Config("source names must not be empty".into()));
            }
            if s.name.contains('+') {
                return Err(CityError::Config(format!(
                    "source name '{}' must not contain '+'",
                    s.name
                )));
            }
            if !seen.insert(s.name.as_str()) {
                return Err(CityError::Config(format!("duplicate source name '{}'", s.name)));
            }
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chain_is_api_then_dump() {
        let c = Config::default();
        assert_eq!(c.cache_ttl_secs, 3600);
        assert_eq!(c.sources.len(), 2);
        assert_eq!(c.sources[0].timeout(), Duration::from_secs(15));
        assert_eq!(c.sources[1].timeout(), Duration::from_secs(30));
        c.validate().unwrap();
    }

    #[test]
    fn toml_round_trip_of_all_kinds() {
        let c = Config::from_toml_str(
            r#"
            cache_ttl_secs = 600
            merge_mode = true

            [[sources]]
            name = "wikipedia"
            kind = "html_table"
            url = "https://en.wikipedia.org/wiki/List_of_largest_cities"

            [[sources]]
            name = "wikidata"
            kind = "knowledge_graph"
            limit = 50

            [[sources]]
            name = "geonames"
            kind = "bulk_dump"
            url = "https://download.geonames.org/export/dump/cities15000.zip"
            role = "augment"
            timeout_secs = 90
            "#,
        )
        .unwrap();
        assert_eq!(c.cache_ttl_secs, 600);
        assert!(c.merge_mode);
        assert_eq!(
            c.sources[1].kind,
            SourceKind::KnowledgeGraph {
                endpoint: knowledge_graph::DEFAULT_ENDPOINT.into(),
                limit: 50
            }
        );
        assert_eq!(c.sources[2].role, SourceRole::Augment);
        assert_eq!(c.sources[2].timeout(), Duration::from_secs(90));
        assert!(matches!(
            &c.sources[2].kind,
            SourceKind::BulkDump { member, .. } if member == "cities15000.txt"
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Config::from_toml_str(
            r#"
            [[sources]]
            name = "a"
            kind = "population_api"
            url = "http://x"

            [[sources]]
            name = "a"
            kind = "html_table"
            url = "http://y"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CityError::Config(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn augment_only_chain_is_rejected() {
        let mut c = Config::default();
        for s in &mut c.sources {
            s.role = SourceRole::Augment;
        }
        assert!(c.validate().is_err());
    }
}
