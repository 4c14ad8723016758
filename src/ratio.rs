//! Ratio-of-means test: log-ratio z statistic with delta-method or Fieller intervals

use serde::{Deserialize, Serialize};

use crate::binomial::TestResult;
use crate::config::Sidedness;
use crate::continuous::SummaryStats;
use crate::distributions::{normal_quantile, p_value_from_z};
use crate::error::{check_alpha, AbError, Result};

pub const METHOD_DELTA: &str = "delta";
pub const METHOD_FIELLER: &str = "fieller";
pub const METHOD_FIELLER_UNBOUNDED: &str = "fieller_unbounded";

/// Confidence set for a ratio; Fieller's set is unbounded when the
/// denominator mean is not significantly different from zero
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RatioInterval {
    Bounded(f64, f64),
    Unbounded,
}

impl RatioInterval {
    /// (lo, hi) form, infinite on both sides when unbounded
    pub fn as_tuple(&self) -> (f64, f64) {
        match *self {
            RatioInterval::Bounded(lo, hi) => (lo, hi),
            RatioInterval::Unbounded => (f64::NEG_INFINITY, f64::INFINITY),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, RatioInterval::Unbounded)
    }
}

/// Standard error of log(mean2 / mean1) by the delta method
fn se_log_ratio(a: &SummaryStats, b: &SummaryStats) -> f64 {
    (a.var / (a.n as f64 * a.mean * a.mean) + b.var / (b.n as f64 * b.mean * b.mean)).sqrt()
}

/// Delta-method interval on the ratio scale
pub fn delta_ratio_ci(a: SummaryStats, b: SummaryStats, alpha: f64) -> (f64, f64) {
    let ratio = b.mean / a.mean;
    let se = ratio.abs() * se_log_ratio(&a, &b);
    let z = normal_quantile(1.0 - alpha / 2.0);
    (ratio - z * se, ratio + z * se)
}

/// Fieller interval for mean2 / mean1
pub fn fieller_ratio_ci(a: SummaryStats, b: SummaryStats, alpha: f64) -> RatioInterval {
    let va = a.var / a.n as f64;
    let vb = b.var / b.n as f64;
    let z = normal_quantile(1.0 - alpha / 2.0);
    let z2 = z * z;

    let g = a.mean * b.mean;
    let h = a.mean * a.mean - z2 * va;
    let k = b.mean * b.mean - z2 * vb;
    if h <= 0.0 {
        return RatioInterval::Unbounded;
    }
    // Negative discriminant only arises from rounding once h > 0
    let root = (g * g - h * k).max(0.0).sqrt();
    RatioInterval::Bounded((g - root) / h, (g + root) / h)
}

/// Test H0: mean2 / mean1 = 1 on the log scale.
///
/// Both means must be positive for the log ratio to exist. A Fieller
/// interval that is unbounded is reported with method `fieller_unbounded`
/// and an infinite `ci`.
pub fn ratio_test(a: SummaryStats, b: SummaryStats, alpha: f64, sided: Sidedness, fieller: bool) -> Result<TestResult> {
    a.check("A")?;
    b.check("B")?;
    check_alpha(alpha)?;
    if a.mean <= 0.0 || b.mean <= 0.0 {
        return Err(AbError::invalid(format!(
            "ratio test needs positive means, got {} and {}", a.mean, b.mean
        )));
    }

    let ratio = b.mean / a.mean;
    let se_log = se_log_ratio(&a, &b);
    let z = if se_log > 0.0 { ratio.ln() / se_log } else { 0.0 };

    let (ci, method) = if fieller {
        let interval = fieller_ratio_ci(a, b, alpha);
        let method = if interval.is_unbounded() { METHOD_FIELLER_UNBOUNDED } else { METHOD_FIELLER };
        (interval.as_tuple(), method)
    } else {
        (delta_ratio_ci(a, b, alpha), METHOD_DELTA)
    };

    Ok(TestResult {
        p_value: p_value_from_z(z, sided),
        effect: ratio,
        ci,
        method: method.to_string(),
    })
}
