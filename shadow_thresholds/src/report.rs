//! The threshold summary table
//!
//! A [`Report`] holds one [`Row`] per `(metric, env, field)` group, or a
//! single placeholder row for a metric with no data at all. Rows are kept in
//! the order they were added and written out once, as CSV, at the end of a
//! run.

use std::{
    borrow::Cow,
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
    analyze::{self, GroupKey, Groups},
    config::Config,
    query,
    stats::{Statistic, format_general},
};

/// File name of the report when no output path is given.
pub const DEFAULT_OUTPUT_FILE: &str = "baseline_summary_demo.csv";
/// Column names, in order.
pub const HEADER: [&str; 9] = [
    "metric",
    "env",
    "field",
    "count",
    "threshold_suggestion(median+1.5*IQR)",
    "median",
    "q1",
    "q3",
    "note",
];
/// Note for rows without statistics.
pub const NOTE_NO_DATA: &str = "no data";
/// Note for rows with statistics. The thresholds are advisory.
pub const NOTE_DEMO: &str = "demo only";

const DELIMITER: char = ',';
const QUOTE: char = '"';
const LINE_TERMINATOR: &str = "\r\n";

/// Errors produced when writing a [`Report`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error creating the directory that holds the report
    #[error("Failed to create output directory {path:?}: {source}")]
    CreateDir {
        /// Directory path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
    /// Error writing the report file
    #[error("Failed to write report {path:?}: {source}")]
    WriteFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
}

/// One line of the summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Logical metric name
    pub metric: String,
    /// Group this row describes, `None` for a metric with no groups at all
    pub key: Option<GroupKey>,
    /// Number of samples in the group
    pub count: Option<usize>,
    /// Statistics, present only when the group had enough samples
    pub statistic: Option<Statistic>,
}

impl Row {
    /// Placeholder row for a metric that produced no groups.
    #[must_use]
    pub fn no_data(metric: &str) -> Self {
        Self {
            metric: metric.to_string(),
            key: None,
            count: None,
            statistic: None,
        }
    }

    /// Row describing one group of `metric`.
    #[must_use]
    pub fn for_group(metric: &str, key: GroupKey, values: &[f64]) -> Self {
        Self {
            metric: metric.to_string(),
            key: Some(key),
            count: Some(values.len()),
            statistic: Statistic::compute(values),
        }
    }

    /// Free text note for this row.
    #[must_use]
    pub fn note(&self) -> &'static str {
        if self.statistic.is_some() {
            NOTE_DEMO
        } else {
            NOTE_NO_DATA
        }
    }

    /// Column values of this row, in [`HEADER`] order.
    #[must_use]
    pub fn fields(&self) -> [String; 9] {
        let (env, field) = self
            .key
            .as_ref()
            .map_or((String::new(), String::new()), |key| {
                (key.env.clone(), key.field.clone())
            });
        let count = self.count.map(|c| c.to_string()).unwrap_or_default();
        let [threshold, median, q1, q3] = self.statistic.map_or_else(
            || std::array::from_fn(|_| String::new()),
            |stat| [stat.threshold, stat.median, stat.q1, stat.q3].map(format_general),
        );

        [
            self.metric.clone(),
            env,
            field,
            count,
            threshold,
            median,
            q1,
            q3,
            self.note().to_string(),
        ]
    }
}

/// Row counts of a [`Report`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// All rows
    pub rows: usize,
    /// Rows with statistics
    pub with_statistics: usize,
    /// Rows marked as having no data
    pub no_data: usize,
}

/// The summary table for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    rows: Vec<Row>,
}

impl Report {
    /// Construct an empty [`Report`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Summarize every target of `config`, reading query files from
    /// `input_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if any query file exists but cannot be read or
    /// parsed. Missing files are not errors.
    pub fn build(input_dir: &Path, config: &Config) -> Result<Self, query::Error> {
        let mut report = Self::new();
        for target in &config.targets {
            let path = target.path_in(input_dir);
            let groups = analyze::load_groups(&path, target.label_defaults())?;
            report.add_target(&target.metric, groups);
        }
        Ok(report)
    }

    /// Append the rows for `metric`: one per group in key order, or a single
    /// placeholder if `groups` is empty.
    pub fn add_target(&mut self, metric: &str, groups: Groups) {
        if groups.is_empty() {
            debug!("No groups for {metric}");
            self.rows.push(Row::no_data(metric));
            return;
        }

        for (key, values) in groups {
            let row = Row::for_group(metric, key, &values);
            if row.statistic.is_none() {
                debug!(
                    "Too few samples for {metric} {env}/{field}: {count}",
                    env = row.key.as_ref().map_or("", |k| k.env.as_str()),
                    field = row.key.as_ref().map_or("", |k| k.field.as_str()),
                    count = values.len(),
                );
            }
            self.rows.push(row);
        }
    }

    /// Rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Count rows by outcome.
    #[must_use]
    pub fn tally(&self) -> Tally {
        let with_statistics = self.rows.iter().filter(|r| r.statistic.is_some()).count();
        Tally {
            rows: self.rows.len(),
            with_statistics,
            no_data: self.rows.len() - with_statistics,
        }
    }

    /// Render the header and all rows as CSV.
    #[must_use]
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_record(&mut out, HEADER.iter().copied());
        for row in &self.rows {
            let fields = row.fields();
            push_record(&mut out, fields.iter().map(String::as_str));
        }
        out
    }

    /// Write the report to `path`, creating its parent directory if needed
    /// and replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<(), Error> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| Error::CreateDir {
                path: dir.to_path_buf(),
                source: Box::new(source),
            })?;
        }

        fs::write(path, self.to_csv()).map_err(|source| Error::WriteFile {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        info!("Wrote {rows} rows to {path:?}", rows = self.rows.len());
        Ok(())
    }
}

/// Where the report goes: `out` if given, otherwise [`DEFAULT_OUTPUT_FILE`]
/// inside `input_dir`.
#[must_use]
pub fn output_path(input_dir: &Path, out: Option<&Path>) -> PathBuf {
    out.map_or_else(|| input_dir.join(DEFAULT_OUTPUT_FILE), Path::to_path_buf)
}

fn push_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        out.push_str(&escape_field(field));
    }
    out.push_str(LINE_TERMINATOR);
}

/// Quote `field` if it holds the delimiter, a quote or a line break. Quotes
/// inside a quoted field are doubled.
fn escape_field(field: &str) -> Cow<'_, str> {
    let needs_quotes = field
        .chars()
        .any(|c| c == DELIMITER || c == QUOTE || c == '\r' || c == '\n');
    if !needs_quotes {
        return Cow::Borrowed(field);
    }

    let mut quoted = String::with_capacity(field.len() + 2);
    quoted.push(QUOTE);
    for c in field.chars() {
        if c == QUOTE {
            quoted.push(QUOTE);
        }
        quoted.push(c);
    }
    quoted.push(QUOTE);
    Cow::Owned(quoted)
}
