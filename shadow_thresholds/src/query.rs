//! Prometheus `query_range` response files
//!
//! This module defines the on-disk representation of a range query result and
//! the per-sample parse attempt. Only the parts of the response this program
//! needs are modeled: the envelope fields `status` and `resultType` are
//! ignored, as are any unknown keys.

use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Errors produced when loading a query file
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The file exists but could not be read.
    #[error("Failed to read query file {path:?}: {source}")]
    ReadFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
    /// The file is not a JSON document of the expected shape.
    #[error("Failed to deserialize query file {path:?}: {source}")]
    Deserialize {
        /// File path
        path: PathBuf,
        /// Underlying serde error
        #[source]
        source: Box<serde_json::Error>,
    },
}

/// Reasons a single `[timestamp, value]` entry is not a usable sample.
///
/// None of these are fatal. Callers drop the entry and move on.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    /// The entry is not a two element array.
    #[error("sample is not a [timestamp, value] pair: {0}")]
    Shape(String),
    /// The value position holds `null`.
    #[error("sample value is missing")]
    Missing,
    /// The value position holds a string that is not a number.
    #[error("sample value {0:?} is not numeric")]
    NotNumeric(String),
    /// The value position holds a JSON type that cannot be a number.
    #[error("sample value has unsupported type: {0}")]
    Type(String),
    /// The value parsed but is NaN or infinite.
    #[error("sample value {0} is not finite")]
    NonFinite(f64),
}

/// The top level of a `query_range` response.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct Response {
    /// Response payload. Absent is equivalent to an empty result.
    #[serde(default)]
    pub data: Data,
}

/// The `data` member of a [`Response`].
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct Data {
    /// One entry per returned series.
    #[serde(default)]
    pub result: Vec<Series>,
}

/// A single series: a label set and its raw `[timestamp, value]` entries.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct Series {
    /// Labels attached to this series.
    #[serde(default)]
    pub metric: FxHashMap<String, String>,
    /// Raw value entries. Kept untyped so that one malformed entry does not
    /// reject the whole document.
    #[serde(default)]
    pub values: Vec<Value>,
}

/// A single numeric observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Seconds since the unix epoch, when the timestamp position is numeric.
    pub timestamp: Option<f64>,
    /// The observed value, always finite.
    pub value: f64,
}

impl TryFrom<&Value> for Sample {
    type Error = SampleError;

    fn try_from(raw: &Value) -> Result<Self, Self::Error> {
        let Value::Array(pair) = raw else {
            return Err(SampleError::Shape(raw.to_string()));
        };
        let [timestamp, value] = pair.as_slice() else {
            return Err(SampleError::Shape(raw.to_string()));
        };

        Ok(Sample {
            timestamp: parse_number(timestamp).ok(),
            value: parse_number(value)?,
        })
    }
}

/// Parse a JSON number, or a string holding one, into a finite `f64`.
fn parse_number(raw: &Value) -> Result<f64, SampleError> {
    let value = match raw {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| SampleError::Type(number.to_string()))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| SampleError::NotNumeric(s.clone()))?,
        Value::Null => return Err(SampleError::Missing),
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
            return Err(SampleError::Type(raw.to_string()));
        }
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(SampleError::NonFinite(value))
    }
}

impl Series {
    /// Returns the value of label `name`, or `default` when the series does
    /// not carry that label.
    #[must_use]
    pub fn label<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.metric.get(name).map_or(default, String::as_str)
    }

    /// Attempts to parse every raw entry of this series into a [`Sample`].
    pub fn samples(&self) -> impl Iterator<Item = Result<Sample, SampleError>> + '_ {
        self.values.iter().map(Sample::try_from)
    }

    /// Returns the values of every well-formed sample in this series,
    /// dropping the rest.
    #[must_use]
    pub fn valid_values(&self) -> Vec<f64> {
        self.samples()
            .filter_map(|sample| match sample {
                Ok(sample) => Some(sample.value),
                Err(e) => {
                    debug!("Dropping sample: {e}");
                    None
                }
            })
            .collect()
    }
}

/// Load a query response from `path`.
///
/// Returns `Ok(None)` if no file exists at `path`, which callers treat as a
/// target with no data.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read, or if its contents
/// are not a JSON document of the expected shape.
pub fn load(path: &Path) -> Result<Option<Response>, Error> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::ReadFile {
                path: path.to_path_buf(),
                source: Box::new(source),
            });
        }
    };

    let response = serde_json::from_str(&contents).map_err(|source| Error::Deserialize {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;
    Ok(Some(response))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn string_and_number_values_parse() {
        assert_eq!(
            Sample::try_from(&json!([1_700_000_000, "12.5"])),
            Ok(Sample {
                timestamp: Some(1_700_000_000.0),
                value: 12.5
            })
        );
        assert_eq!(
            Sample::try_from(&json!([1.5, 3])),
            Ok(Sample {
                timestamp: Some(1.5),
                value: 3.0
            })
        );
        assert_eq!(
            Sample::try_from(&json!(["t", " 7 "])),
            Ok(Sample {
                timestamp: None,
                value: 7.0
            })
        );
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert_eq!(
            Sample::try_from(&json!(["t", "NaN-string"])),
            Err(SampleError::NotNumeric("NaN-string".to_string()))
        );
        assert_eq!(
            Sample::try_from(&json!([null, null])),
            Err(SampleError::Missing)
        );
        assert!(matches!(
            Sample::try_from(&json!([0, true])),
            Err(SampleError::Type(_))
        ));
        assert!(matches!(
            Sample::try_from(&json!([0])),
            Err(SampleError::Shape(_))
        ));
        assert!(matches!(
            Sample::try_from(&json!([0, "1", "2"])),
            Err(SampleError::Shape(_))
        ));
        assert!(matches!(
            Sample::try_from(&json!("10")),
            Err(SampleError::Shape(_))
        ));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        assert!(matches!(
            Sample::try_from(&json!([0, "NaN"])),
            Err(SampleError::NonFinite(_))
        ));
        assert!(matches!(
            Sample::try_from(&json!([0, "inf"])),
            Err(SampleError::NonFinite(_))
        ));
    }

    #[test]
    fn valid_values_skips_bad_entries() {
        let series = Series {
            metric: FxHashMap::default(),
            values: vec![
                json!([0, "1"]),
                json!(["t", "NaN-string"]),
                json!([null, null]),
                json!([3, 4.5]),
            ],
        };
        assert_eq!(series.valid_values(), vec![1.0, 4.5]);
    }

    #[test]
    fn label_falls_back_to_default() {
        let mut metric = FxHashMap::default();
        metric.insert("env".to_string(), "prod".to_string());
        let series = Series {
            metric,
            values: Vec::new(),
        };
        assert_eq!(series.label("env", "unknown"), "prod");
        assert_eq!(series.label("field", "dkcal"), "dkcal");
    }

    #[test]
    fn envelope_fields_are_ignored() -> Result<(), serde_json::Error> {
        let response: Response = serde_json::from_str(
            r#"{
                "status": "success",
                "data": {
                    "resultType": "matrix",
                    "result": [
                        {"metric": {"env": "prod"}, "values": [[1, "2"]]}
                    ]
                }
            }"#,
        )?;
        assert_eq!(response.data.result.len(), 1);
        assert_eq!(response.data.result[0].label("env", "unknown"), "prod");
        Ok(())
    }

    #[test]
    fn missing_members_are_empty() -> Result<(), serde_json::Error> {
        let response: Response = serde_json::from_str("{}")?;
        assert_eq!(response, Response::default());

        let response: Response = serde_json::from_str(r#"{"data": {"result": [{}]}}"#)?;
        assert_eq!(response.data.result, vec![Series::default()]);
        Ok(())
    }

    #[test]
    fn missing_file_is_none() -> Result<(), Error> {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let loaded = load(&temp_dir.path().join("abs_kcal.json"))?;
        assert!(loaded.is_none());
        Ok(())
    }

    #[test]
    fn corrupt_file_is_an_error() -> Result<(), io::Error> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("rel.json");
        let mut file = fs::File::create(&path)?;
        file.write_all(b"{\"data\": {\"result\": [")?;

        let result = load(&path);
        assert!(matches!(result, Err(Error::Deserialize { .. })));
        Ok(())
    }

    #[test]
    fn result_of_wrong_type_is_an_error() -> Result<(), io::Error> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("rel.json");
        fs::write(&path, r#"{"data": {"result": "nope"}}"#)?;

        assert!(matches!(load(&path), Err(Error::Deserialize { .. })));
        Ok(())
    }

    proptest! {
        #[test]
        fn finite_values_survive_as_strings(
            timestamp in 0_u64..2_000_000_000,
            value in any::<f64>().prop_filter("must be finite", |f| f.is_finite()),
        ) {
            let raw = json!([timestamp, value.to_string()]);
            let sample = Sample::try_from(&raw);
            prop_assert_eq!(sample, Ok(Sample { timestamp: Some(timestamp as f64), value }));
        }
    }
}
