//! citypop-cli
//! ===========
//!
//! Command-line interface for the `citypop-core` city population pipeline.
//!
//! This crate primarily provides a binary (`citypop`). The library target
//! only exists so the crate has a rendered documentation page.
//!
//! Basic usage
//! -----------
//!
//! ```text
//! citypop --help
//! citypop view --top 20
//! citypop view --search "são" --coords --json
//! citypop export --country Japan -o japan.csv
//! citypop --config sources.toml --merge refresh
//! citypop describe Lagos
//! ```
//!
//! For programmatic access (the fallback chain, the merge engine and the
//! query layer), use [`citypop-core`] directly.
//!
#![cfg_attr(docsrs, feature(doc_cfg))]
