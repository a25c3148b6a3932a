//! This module controls which query files are summarized and under which
//! metric names. Without a configuration file the three built-in targets are
//! used; a YAML file may replace them wholesale.
use std::{
    collections::BTreeSet,
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::analyze::LabelDefaults;

/// Errors produced by [`Config`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error for a serde [`serde_yaml`].
    #[error("Failed to deserialize yaml: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    /// Error reading config file
    #[error("Failed to read config file {path:?}: {source}")]
    ReadFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
    /// The configuration lists no targets.
    #[error("No targets configured")]
    NoTargets,
    /// Two targets share a metric name.
    #[error("Duplicate target metric found: {0}")]
    DuplicateMetric(String),
}

/// Field recorded for series without a `field` label when a target does not
/// say otherwise.
pub const DEFAULT_FIELD: &str = "dkcal";

fn default_field() -> String {
    DEFAULT_FIELD.to_string()
}

/// One logical metric and the query file holding its samples.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// Metric name written in the first column of the report
    pub metric: String,
    /// Query file, relative paths resolve against the input directory
    pub file: PathBuf,
    /// `field` value for series that carry no field label
    #[serde(default = "default_field")]
    pub default_field: String,
}

impl Target {
    /// Construct a new [`Target`].
    #[must_use]
    pub fn new(metric: &str, file: &str, default_field: &str) -> Self {
        Self {
            metric: metric.to_string(),
            file: PathBuf::from(file),
            default_field: default_field.to_string(),
        }
    }

    /// Location of this target's query file beneath `input_dir`. Absolute
    /// `file` entries are returned unchanged.
    #[must_use]
    pub fn path_in(&self, input_dir: &Path) -> PathBuf {
        input_dir.join(&self.file)
    }

    /// Label defaults applied to this target's series.
    #[must_use]
    pub fn label_defaults(&self) -> LabelDefaults<'_> {
        LabelDefaults::with_field(&self.default_field)
    }
}

/// Ordered set of targets for one run
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Targets, reported in this order
    pub targets: Vec<Target>,
}

impl Default for Config {
    fn default() -> Self {
        // Absolute and relative kcal metrics never carry a field label. The
        // macros metric always does, so a missing one is genuinely unknown.
        Self {
            targets: vec![
                Target::new("dkcal_p95", "abs_kcal.json", DEFAULT_FIELD),
                Target::new("macros_p95", "abs_macros.json", "unknown"),
                Target::new("rel_p95", "rel.json", DEFAULT_FIELD),
            ],
        }
    }
}

impl Config {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML of the expected
    /// shape, lists no targets or repeats a metric name.
    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.targets.is_empty() {
            return Err(Error::NoTargets);
        }
        let mut seen = BTreeSet::new();
        for target in &self.targets {
            if !seen.insert(target.metric.as_str()) {
                return Err(Error::DuplicateMetric(target.metric.clone()));
            }
        }
        Ok(())
    }
}

/// Load targets from the YAML file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails [`Config::from_yaml`].
pub fn load_config_from_path(path: &Path) -> Result<Config, Error> {
    let contents = fs::read_to_string(path).map_err(|source| Error::ReadFile {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;
    Config::from_yaml(&contents)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_targets_are_fixed() {
        let config = Config::default();
        let metrics: Vec<&str> = config.targets.iter().map(|t| t.metric.as_str()).collect();
        assert_eq!(metrics, vec!["dkcal_p95", "macros_p95", "rel_p95"]);
        let files: Vec<&Path> = config.targets.iter().map(|t| t.file.as_path()).collect();
        assert_eq!(
            files,
            vec![
                Path::new("abs_kcal.json"),
                Path::new("abs_macros.json"),
                Path::new("rel.json"),
            ]
        );
        assert_eq!(config.targets[0].default_field, "dkcal");
    }

    #[test]
    fn config_deserializes() -> Result<(), Error> {
        let contents = r"
targets:
  - metric: dkcal_p95
    file: abs_kcal.json
  - metric: carbs_p95
    file: /var/lib/prom/carbs.json
    default_field: dc
";
        let config = Config::from_yaml(contents)?;
        assert_eq!(
            config,
            Config {
                targets: vec![
                    Target::new("dkcal_p95", "abs_kcal.json", "dkcal"),
                    Target::new("carbs_p95", "/var/lib/prom/carbs.json", "dc"),
                ]
            }
        );
        Ok(())
    }

    #[test]
    fn unknown_keys_rejected() {
        let contents = r"
targets:
  - metric: dkcal_p95
    file: abs_kcal.json
    colour: blue
";
        assert!(matches!(
            Config::from_yaml(contents),
            Err(Error::SerdeYaml(_))
        ));
    }

    #[test]
    fn empty_targets_rejected() {
        assert!(matches!(
            Config::from_yaml("targets: []"),
            Err(Error::NoTargets)
        ));
    }

    #[test]
    fn duplicate_metrics_rejected() {
        let contents = r"
targets:
  - metric: rel_p95
    file: a.json
  - metric: rel_p95
    file: b.json
";
        assert!(matches!(
            Config::from_yaml(contents),
            Err(Error::DuplicateMetric(m)) if m == "rel_p95"
        ));
    }

    #[test]
    fn relative_files_resolve_against_input_dir() {
        let target = Target::new("rel_p95", "rel.json", "dkcal");
        assert_eq!(
            target.path_in(Path::new("/data/prom")),
            PathBuf::from("/data/prom/rel.json")
        );

        let target = Target::new("rel_p95", "/elsewhere/rel.json", "dkcal");
        assert_eq!(
            target.path_in(Path::new("/data/prom")),
            PathBuf::from("/elsewhere/rel.json")
        );
    }

    #[test]
    fn load_single_file_works() -> Result<(), Error> {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let config_path = temp_dir.path().join("targets.yaml");
        let mut file = fs::File::create(&config_path).expect("create");
        file.write_all(b"targets:\n  - metric: dkcal_p95\n    file: abs_kcal.json\n")
            .expect("write");

        let config = load_config_from_path(&config_path)?;
        assert_eq!(config.targets.len(), 1);
        Ok(())
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let result = load_config_from_path(&temp_dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(Error::ReadFile { .. })));
    }
}
