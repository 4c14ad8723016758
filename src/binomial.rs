//! Two-proportion test: pooled z statistic, Newcombe interval for p2 - p1

use serde::{Deserialize, Serialize};

use crate::config::Sidedness;
use crate::distributions::{normal_quantile, p_value_from_z};
use crate::error::{check_alpha, AbError, Result};

/// Outcome of a two-sample hypothesis test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub p_value: f64,
    /// Point estimate, B relative to A
    pub effect: f64,
    pub ci: (f64, f64),
    /// Method tag, e.g. "welch" or "fieller_unbounded"
    pub method: String,
}

pub const METHOD_NEWCOMBE: &str = "newcombe_wilson_diff";

/// Wilson score interval for a single proportion, clipped to [0, 1]
pub fn wilson_ci(x: u64, n: u64, alpha: f64) -> (f64, f64) {
    if n == 0 {
        return (0.0, 0.0);
    }
    let n = n as f64;
    let p = x as f64 / n;
    let z = normal_quantile(1.0 - alpha / 2.0);
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    let centre = (p + z2 / (2.0 * n)) / denom;
    let margin = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denom;
    ((centre - margin).max(0.0), (centre + margin).min(1.0))
}

/// Newcombe hybrid score interval for p2 - p1
pub fn newcombe_ci(x1: u64, n1: u64, x2: u64, n2: u64, alpha: f64) -> (f64, f64) {
    let (p1_lo, p1_hi) = wilson_ci(x1, n1, alpha);
    let (p2_lo, p2_hi) = wilson_ci(x2, n2, alpha);
    let lo = p2_lo - p1_hi;
    let hi = p2_hi - p1_lo;
    (lo.min(hi), lo.max(hi))
}

fn check_counts(x: u64, n: u64, arm: &str) -> Result<()> {
    if n == 0 {
        return Err(AbError::invalid(format!("sample size of arm {} must be > 0", arm)));
    }
    if x > n {
        return Err(AbError::invalid(format!(
            "successes of arm {} must be in [0, {}], got {}", arm, n, x
        )));
    }
    Ok(())
}

/// Pooled two-proportion z-test. Effect is p2 - p1.
///
/// A pooled variance of zero (all successes or all failures) gives z = 0.
pub fn binomial_test(x1: u64, n1: u64, x2: u64, n2: u64, alpha: f64, sided: Sidedness) -> Result<TestResult> {
    check_counts(x1, n1, "A")?;
    check_counts(x2, n2, "B")?;
    check_alpha(alpha)?;

    let (nf1, nf2) = (n1 as f64, n2 as f64);
    let p1 = x1 as f64 / nf1;
    let p2 = x2 as f64 / nf2;
    let effect = p2 - p1;
    let pooled = (x1 + x2) as f64 / (nf1 + nf2);
    let se = (pooled * (1.0 - pooled) * (1.0 / nf1 + 1.0 / nf2)).sqrt();
    let z = if se > 0.0 { effect / se } else { 0.0 };

    Ok(TestResult {
        p_value: p_value_from_z(z, sided),
        effect,
        ci: newcombe_ci(x1, n1, x2, n2, alpha),
        method: METHOD_NEWCOMBE.to_string(),
    })
}
