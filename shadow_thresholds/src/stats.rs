//! Quartile statistics and the Tukey upper fence
//!
//! Quartiles use the "n equal groups" exclusive method: the `i`-th cut point
//! of `n` sorted values sits at 1-based rank `i * (n + 1) / 4`, linearly
//! interpolated between the two neighbouring order statistics. The median is
//! the second cut point of the same rule.

use std::fmt::Write;

/// Fewest samples for which statistics are computed.
pub const MIN_SAMPLES: usize = 4;
/// Multiple of the interquartile range added to the median.
pub const IQR_FENCE: f64 = 1.5;
/// Significant digits kept by [`format_general`].
pub const SIGNIFICANT_DIGITS: i32 = 6;

/// Summary statistics of one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistic {
    /// Number of samples
    pub count: usize,
    /// `median + IQR_FENCE * (q3 - q1)`
    pub threshold: f64,
    /// Second quartile
    pub median: f64,
    /// First quartile
    pub q1: f64,
    /// Third quartile
    pub q3: f64,
}

impl Statistic {
    /// Compute statistics over `values`.
    ///
    /// Returns `None` when fewer than [`MIN_SAMPLES`] values are given. The
    /// order of `values` does not matter.
    #[must_use]
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.len() < MIN_SAMPLES {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let q1 = quartile(&sorted, 1);
        let median = quartile(&sorted, 2);
        let q3 = quartile(&sorted, 3);

        Some(Self {
            count: sorted.len(),
            threshold: median + IQR_FENCE * (q3 - q1),
            median,
            q1,
            q3,
        })
    }

    /// The interquartile range, `q3 - q1`.
    #[must_use]
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// The `cut`-th quartile of `sorted`, `cut` in `1..=3`.
///
/// Requires `sorted.len() >= MIN_SAMPLES` so that both neighbours of every
/// cut point exist.
fn quartile(sorted: &[f64], cut: usize) -> f64 {
    debug_assert!(sorted.len() >= MIN_SAMPLES);
    debug_assert!((1..=3).contains(&cut));

    let m = sorted.len() + 1;
    let j = cut * m / 4;
    let delta = (cut * m - j * 4) as f64;
    let (lower, upper) = (sorted[j - 1], sorted[j]);
    lower + (upper - lower) * delta / 4.0
}

/// Render `value` with [`SIGNIFICANT_DIGITS`] significant digits, printf `%g`
/// style.
///
/// Scientific notation is used when the decimal exponent is below -4 or not
/// below the precision. Trailing zeros, and a trailing decimal point, are
/// removed in both notations.
#[must_use]
pub fn format_general(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value.is_sign_positive() { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Rounding to the requested precision can carry into the exponent, e.g.
    // 999999.7 becomes 1e+06, so take the exponent from the rounded form.
    let precision = usize::try_from(SIGNIFICANT_DIGITS - 1).unwrap_or(0);
    let scientific = format!("{value:.precision$e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS {
        let mut out = trim_fraction(mantissa).to_string();
        let sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(out, "e{sign}{:02}", exponent.unsigned_abs());
        out
    } else {
        let decimals = usize::try_from(SIGNIFICANT_DIGITS - 1 - exponent).unwrap_or(0);
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

/// Strip trailing zeros from the fractional part of `s`, then a dangling `.`.
fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
