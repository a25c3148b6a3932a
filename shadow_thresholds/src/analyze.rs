//! Grouping of query results by label
//!
//! Series are bucketed by their `(env, field)` labels. Series that share a
//! key are merged, so the values of a group are the concatenation of every
//! contributing series. Groups iterate in lexicographic key order.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::query::{self, Series};

/// Label holding the environment of a series.
pub const ENV_LABEL: &str = "env";
/// Label holding the measured field of a series.
pub const FIELD_LABEL: &str = "field";
/// Environment recorded for series that carry no [`ENV_LABEL`].
pub const DEFAULT_ENV: &str = "unknown";

/// The `(env, field)` pair identifying a group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    /// Value of the `env` label
    pub env: String,
    /// Value of the `field` label
    pub field: String,
}

impl GroupKey {
    /// Construct a new [`GroupKey`].
    #[must_use]
    pub fn new(env: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            field: field.into(),
        }
    }
}

/// Values substituted for labels a series does not carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelDefaults<'a> {
    /// Substitute for a missing `env` label
    pub env: &'a str,
    /// Substitute for a missing `field` label
    pub field: &'a str,
}

impl<'a> LabelDefaults<'a> {
    /// Defaults for a target whose series fall back to `field` when they have
    /// no field label of their own.
    #[must_use]
    pub fn with_field(field: &'a str) -> Self {
        Self {
            env: DEFAULT_ENV,
            field,
        }
    }

    /// Derive the group key of `series`.
    #[must_use]
    pub fn key_for(&self, series: &Series) -> GroupKey {
        GroupKey::new(
            series.label(ENV_LABEL, self.env),
            series.label(FIELD_LABEL, self.field),
        )
    }
}

/// Sample values bucketed by [`GroupKey`], in key order.
pub type Groups = BTreeMap<GroupKey, Vec<f64>>;

/// Bucket the valid sample values of `series` by group key.
///
/// A series with no valid samples contributes nothing, not even an empty
/// group.
#[must_use]
pub fn group_series(series: &[Series], defaults: LabelDefaults<'_>) -> Groups {
    let mut groups = Groups::new();

    for s in series {
        let values = s.valid_values();
        let key = defaults.key_for(s);
        if values.is_empty() {
            debug!(
                "Series {env}/{field} has no valid samples",
                env = key.env,
                field = key.field
            );
            continue;
        }
        groups.entry(key).or_default().extend(values);
    }

    groups
}

/// Load the query file at `path` and group its series.
///
/// A missing file produces empty [`Groups`].
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_groups(path: &Path, defaults: LabelDefaults<'_>) -> Result<Groups, query::Error> {
    let Some(response) = query::load(path)? else {
        warn!("Query file {path:?} does not exist");
        return Ok(Groups::new());
    };

    let groups = group_series(&response.data.result, defaults);
    info!(
        "Loaded {series} series into {groups} groups from {path:?}",
        series = response.data.result.len(),
        groups = groups.len()
    );
    Ok(groups)
}
