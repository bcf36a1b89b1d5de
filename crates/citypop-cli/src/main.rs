//! citypop: command-line interface for citypop-core
//!
//! This binary stands in for the dashboard: it builds the rank-ordered view
//! of the world's most populous cities from the configured sources and
//! prints it, exports it as CSV, or decorates one city with its page summary.
//!
//! Usage examples
//! --------------
//!
//! - Top ten cities with coordinates
//!   $ citypop view --top 10 --coords
//!
//! - Cities in two countries, as JSON
//!   $ citypop view --country India --country China --json
//!
//! - Export the filtered view
//!   $ citypop export --min 10000000 -o megacities.csv
//!
//! - Summary for the third-ranked city
//!   $ citypop describe --rank 3
//!
//! - Force a refresh and keep a warm-start snapshot
//!   $ citypop --snapshot cities.bin.gz refresh
//!
//! Configuration
//! -------------
//!
//! Without `--config`, the built-in chain is used: the population API first,
//! the GeoNames dump as fallback. Logging goes to stderr; set `RUST_LOG` or
//! pass `-v` for more detail.
mod args;

use crate::args::{CliArgs, Commands};
use anyhow::{bail, Context};
use citypop_core::{snapshot, CityService, Config, View};
use clap::Parser;
use std::io::Write;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if args.merge {
        config.merge_mode = true;
    }

    let service = build_service(&config)?;
    if let Some(path) = args.snapshot.as_ref().filter(|p| p.exists()) {
        match snapshot::load(path) {
            Ok(dataset) => {
                service.seed(dataset);
            }
            Err(e) => tracing::warn!(path = %path.display(), "ignoring unreadable snapshot: {e}"),
        }
    }

    match args.command {
        Commands::View { query, json } => {
            let view = service.get_view(&query.to_params())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_view(&view);
            }
        }

        Commands::Export { query, output } => {
            let bytes = service.export_csv(&query.to_params())?;
            match output {
                Some(path) => std::fs::write(&path, &bytes)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => std::io::stdout().write_all(&bytes)?,
            }
        }

        Commands::Refresh => {
            let report = service.refresh()?;
            let ds = &report.dataset;
            println!("Refreshed from {}", ds.source_label());
            println!("  Records: {}", ds.len());
            println!("  Rows fetched: {}", ds.stats.rows_fetched);
            println!("  Rows skipped: {}", ds.stats.rows_skipped());
            println!("  Merged away: {}", ds.stats.merged_away);
            for failure in report.failures.iter() {
                println!("  Failed: {failure}");
            }
            if let Some(path) = &args.snapshot {
                snapshot::save(ds, path)?;
            }
        }

        Commands::Describe { title, rank, query } => {
            let summary = match (title, rank) {
                (Some(title), _) => service.describe(&title)?,
                (None, Some(rank)) => {
                    let view = service.get_view(&query.to_params())?;
                    if citypop_core::query::select(&view.rows, rank).is_none() {
                        bail!("rank {rank} is not in the current view ({} rows)", view.rows.len());
                    }
                    service.describe_rank(&view, rank)?
                }
                (None, None) => bail!("either a title or --rank is required"),
            };
            match summary {
                Some(s) => {
                    println!("{}", s.title);
                    if let Some(d) = &s.description {
                        println!("{d}");
                    }
                    println!();
                    println!("{}", s.extract);
                    if let Some(url) = &s.page_url {
                        println!();
                        println!("{url}");
                    }
                }
                None => println!("No summary available."),
            }
        }

        Commands::Sources => {
            for (i, s) in config.sources.iter().enumerate() {
                println!(
                    "{}. {} [{:?}, {:?}, timeout {}s]",
                    i + 1,
                    s.name,
                    s.kind,
                    s.role,
                    s.timeout().as_secs()
                );
            }
        }
    }

    Ok(())
}

#[cfg(feature = "fetch")]
fn build_service(config: &Config) -> anyhow::Result<CityService> {
    Ok(CityService::from_config(config)?)
}

#[cfg(not(feature = "fetch"))]
fn build_service(_config: &Config) -> anyhow::Result<CityService> {
    bail!("citypop was built without the 'fetch' feature; no network transport available")
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "citypop_core=warn",
        1 => "citypop_core=info",
        2 => "citypop_core=debug",
        _ => "citypop_core=trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_view(view: &View) {
    if let Some(warning) = &view.warning {
        eprintln!("warning: {warning}");
    }
    println!(
        "Source: {} (refreshed {})",
        view.source,
        view.refreshed_at.format("%Y-%m-%d %H:%M UTC")
    );
    for r in &view.rows {
        let coords = match (r.record.latitude, r.record.longitude) {
            (Some(lat), Some(lon)) => format!("{lat:.3}, {lon:.3}"),
            _ => "-".to_string(),
        };
        println!(
            "{:>4}  {:<28} {:<24} {:>12}  {}",
            r.rank, r.record.city, r.record.country, r.record.population, coords
        );
    }
    if view.rows.is_empty() {
        println!("No cities match.");
    }
}
