//! Threshold summaries for Prometheus `query_range` results.
//!
//! This library supports the `shadow-thresholds` binary found in this crate.
//! Each configured target names one JSON file of query results. Samples are
//! grouped by their `(env, field)` labels, each group is reduced to quartiles
//! and a Tukey upper fence, and the whole run is written out as a single CSV
//! table.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::multiple_crate_versions)]

pub mod analyze;
pub mod config;
pub mod query;
pub mod report;
pub mod stats;
