use citypop_core::{BubbleScaling, QueryParams};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for citypop
#[derive(Debug, Parser)]
#[command(
    name = "citypop",
    version,
    about = "Fetch, rank and filter the world's most populous cities"
)]
pub struct CliArgs {
    /// Path to a TOML configuration file (default: built-in sources)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Snapshot file: loaded at start-up if present, written after a successful refresh
    #[arg(short = 's', long = "snapshot", global = true)]
    pub snapshot: Option<PathBuf>,

    /// Consult augment sources after the primary succeeds
    #[arg(long = "merge", global = true)]
    pub merge: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG wins when set.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the ranked, filtered view
    View {
        #[command(flatten)]
        query: QueryArgs,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write the view as CSV (Rank,City,Country,Population,Source)
    Export {
        #[command(flatten)]
        query: QueryArgs,

        /// Output file (default: stdout)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// Fetch a fresh dataset now, ignoring the cache TTL
    Refresh,

    /// Show the page summary for a title, or for a rank in the view
    Describe {
        /// Page title (e.g. "Tokyo")
        #[arg(required_unless_present = "rank")]
        title: Option<String>,

        /// Rank in the view built from the filters below
        #[arg(long, conflicts_with = "title")]
        rank: Option<usize>,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// List the configured sources in chain order
    Sources,
}

/// View filters shared by several commands.
#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Drop cities below this population
    #[arg(long = "min", allow_negative_numbers = true)]
    pub min_population: Option<i64>,

    /// Country allow-list (repeatable, exact match)
    #[arg(long = "country")]
    pub countries: Vec<String>,

    /// Case- and accent-insensitive substring on city or country
    #[arg(long = "search", default_value = "")]
    pub search: String,

    /// Only cities with coordinates
    #[arg(long = "coords")]
    pub require_coordinates: bool,

    /// Keep the N most populous
    #[arg(short = 'n', long = "top", allow_negative_numbers = true)]
    pub top_n: Option<i64>,

    /// Bubble size as log10(population) instead of sqrt(population)
    #[arg(long = "log-scale")]
    pub log_scale: bool,
}

impl QueryArgs {
    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new()
            .search(self.search.clone())
            .require_coordinates(self.require_coordinates);
        if let Some(min) = self.min_population {
            params = params.min_population(min);
        }
        if let Some(n) = self.top_n {
            params = params.top_n(n);
        }
        for c in &self.countries {
            params = params.country(c.clone());
        }
        if self.log_scale {
            params = params.bubble(BubbleScaling::Log10);
        }
        params
    }
}
