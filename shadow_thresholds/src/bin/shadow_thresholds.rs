//! Summarize Prometheus `query_range` result files into IQR thresholds.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;

use clap::Parser;
use shadow_thresholds::{
    config::{self, Config},
    query,
    report::{self, Report},
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the query result files
    #[clap(default_value = ".")]
    input_dir: PathBuf,

    /// Path of the CSV report. Defaults to baseline_summary_demo.csv inside
    /// the input directory.
    #[clap(long)]
    out: Option<PathBuf>,

    /// YAML file listing the targets to summarize, replacing the built-in
    /// dkcal_p95, macros_p95 and rel_p95 targets
    #[clap(long)]
    config: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error("Failed to load targets: {0}")]
    Config(#[from] config::Error),
    #[error("Failed to load query results: {0}")]
    Query(#[from] query::Error),
    #[error("Failed to write report: {0}")]
    Report(#[from] report::Error),
}

fn run(args: &Args) -> Result<PathBuf, Error> {
    let targets = match &args.config {
        Some(path) => config::load_config_from_path(path)?,
        None => Config::default(),
    };
    info!(
        "Summarizing {count} targets from {dir:?}",
        count = targets.targets.len(),
        dir = args.input_dir
    );

    let report = Report::build(&args.input_dir, &targets)?;
    let tally = report.tally();
    info!(
        "{rows} rows: {stats} with statistics, {no_data} without data",
        rows = tally.rows,
        stats = tally.with_statistics,
        no_data = tally.no_data
    );

    let out = report::output_path(&args.input_dir, args.out.as_deref());
    report.write_to(&out)?;
    Ok(out)
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish()
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(out) => {
            println!("[compute] wrote {}", out.display());
            Ok(())
        }
        Err(e) => {
            error!("{e}");
            Err(e)
        }
    }
}
