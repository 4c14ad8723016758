//! Continuous-metric tests: Welch (normal approximation), Yuen trimmed
//! means, and bootstrap BCa intervals

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::binomial::TestResult;
use crate::config::Sidedness;
use crate::distributions::{
    critical_z, mean, normal_cdf, normal_quantile, p_value_from_z, percentile_sorted,
    sample_variance, sort_floats,
};
use crate::error::{check_alpha, AbError, Result};

pub const METHOD_WELCH: &str = "welch";
pub const METHOD_YUEN: &str = "yuen";

// ============================================================================
// SUMMARY STATISTICS
// ============================================================================

/// Mean, sample variance (n - 1) and size of one arm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub mean: f64,
    pub var: f64,
    pub n: u64,
}

impl SummaryStats {
    pub fn new(mean: f64, var: f64, n: u64) -> Self {
        SummaryStats { mean, var, n }
    }

    pub fn from_sample(data: &[f64]) -> Self {
        SummaryStats {
            mean: mean(data),
            var: sample_variance(data),
            n: data.len() as u64,
        }
    }

    pub(crate) fn check(&self, arm: &str) -> Result<()> {
        if self.n == 0 {
            return Err(AbError::invalid(format!("sample size of arm {} must be > 0", arm)));
        }
        if !self.mean.is_finite() || !(self.var >= 0.0) || !self.var.is_finite() {
            return Err(AbError::invalid(format!(
                "arm {} needs a finite mean and non-negative variance", arm
            )));
        }
        Ok(())
    }
}

fn z_result(effect: f64, se: f64, alpha: f64, sided: Sidedness, method: &str) -> TestResult {
    let stat = if se > 0.0 { effect / se } else { 0.0 };
    let crit = critical_z(alpha, sided);
    TestResult {
        p_value: p_value_from_z(stat, sided),
        effect,
        ci: (effect - crit * se, effect + crit * se),
        method: method.to_string(),
    }
}

// ============================================================================
// WELCH
// ============================================================================

/// Welch test from summary statistics with a normal reference distribution.
/// Effect is mean2 - mean1; zero standard error gives a zero statistic.
pub fn welch_test(a: SummaryStats, b: SummaryStats, alpha: f64, sided: Sidedness) -> Result<TestResult> {
    a.check("A")?;
    b.check("B")?;
    check_alpha(alpha)?;
    let effect = b.mean - a.mean;
    let se = (a.var / a.n as f64 + b.var / b.n as f64).sqrt();
    Ok(z_result(effect, se, alpha, sided, METHOD_WELCH))
}

// ============================================================================
// YUEN TRIMMED MEANS
// ============================================================================

struct TrimmedArm {
    trimmed_mean: f64,
    winsorized_var: f64,
    n: usize,
    h: usize,
}

fn trim_arm(data: &[f64], trim: f64) -> TrimmedArm {
    let mut sorted = data.to_vec();
    sort_floats(&mut sorted);
    let n = sorted.len();
    let g = (trim * n as f64).floor() as usize;
    let trimmed = &sorted[g..n - g];

    let mut winsorized = sorted.clone();
    if g > 0 {
        let (low, high) = (sorted[g], sorted[n - g - 1]);
        for v in winsorized.iter_mut().take(g) {
            *v = low;
        }
        for v in winsorized.iter_mut().skip(n - g) {
            *v = high;
        }
    }

    TrimmedArm {
        trimmed_mean: mean(trimmed),
        winsorized_var: sample_variance(&winsorized),
        n,
        h: trimmed.len(),
    }
}

/// Yuen's test on trimmed means.
///
/// Each arm drops `floor(trim * n)` values per tail for the location
/// estimate; the spread comes from the winsorized sample, giving the
/// squared standard error (n - 1) * s_w^2 / (h * (h - 1)) with h the
/// number of retained values.
pub fn yuen_trimmed_mean_test(a: &[f64], b: &[f64], trim: f64, alpha: f64, sided: Sidedness) -> Result<TestResult> {
    check_alpha(alpha)?;
    if !(0.0..0.5).contains(&trim) {
        return Err(AbError::invalid(format!("trim must be in [0, 0.5), got {}", trim)));
    }
    let ta = trim_arm(a, trim);
    let tb = trim_arm(b, trim);
    if ta.h < 2 || tb.h < 2 {
        return Err(AbError::invalid("Yuen test needs at least two retained values per arm"));
    }

    let d = |t: &TrimmedArm| (t.n - 1) as f64 * t.winsorized_var / (t.h * (t.h - 1)) as f64;
    let se = (d(&ta) + d(&tb)).sqrt();
    let effect = tb.trimmed_mean - ta.trimmed_mean;
    Ok(z_result(effect, se, alpha, sided, METHOD_YUEN))
}

/// Welch or Yuen on raw samples; `robust_trim` selects Yuen with that trim fraction
pub fn continuous_test(
    a: &[f64],
    b: &[f64],
    alpha: f64,
    sided: Sidedness,
    robust_trim: Option<f64>,
) -> Result<TestResult> {
    match robust_trim {
        Some(trim) => yuen_trimmed_mean_test(a, b, trim, alpha, sided),
        None => welch_test(SummaryStats::from_sample(a), SummaryStats::from_sample(b), alpha, sided),
    }
}

// ============================================================================
// BOOTSTRAP BCa
// ============================================================================

fn resample(rng: &mut StdRng, data: &[f64]) -> Vec<f64> {
    (0..data.len()).map(|_| data[rng.gen_range(0..data.len())]).collect()
}

fn without(data: &[f64], i: usize) -> Vec<f64> {
    data.iter().enumerate().filter(|&(j, _)| j != i).map(|(_, &v)| v).collect()
}

/// Bias-corrected and accelerated bootstrap interval for `effect(a, b)`.
///
/// Resample `i` draws from its own generator seeded with `seed + i`, so the
/// interval is reproducible whatever the thread count. The share of
/// bootstrap effects below the observed effect is clamped to
/// [1/(2B), 1 - 1/(2B)] to keep the bias correction finite.
pub fn bootstrap_bca_ci<F>(a: &[f64], b: &[f64], effect: F, alpha: f64, iters: usize, seed: u64) -> Result<(f64, f64)>
where
    F: Fn(&[f64], &[f64]) -> f64 + Sync,
{
    check_alpha(alpha)?;
    if iters == 0 {
        return Err(AbError::invalid("bootstrap iterations must be > 0"));
    }
    if a.len() < 2 || b.len() < 2 {
        return Err(AbError::invalid("bootstrap needs at least two observations per arm"));
    }

    let observed = effect(a, b);

    let mut boot: Vec<f64> = (0..iters)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let sa = resample(&mut rng, a);
            let sb = resample(&mut rng, b);
            effect(&sa, &sb)
        })
        .collect();
    sort_floats(&mut boot);

    let below = boot.iter().filter(|&&v| v < observed).count() as f64 / iters as f64;
    let edge = 0.5 / iters as f64;
    let z0 = normal_quantile(below.clamp(edge, 1.0 - edge));

    // Jackknife over both arms combined
    let jacks: Vec<f64> = (0..a.len())
        .into_par_iter()
        .map(|i| effect(&without(a, i), b))
        .chain((0..b.len()).into_par_iter().map(|i| effect(a, &without(b, i))))
        .collect();
    let jack_mean = mean(&jacks);
    let num: f64 = jacks.iter().map(|j| (jack_mean - j).powi(3)).sum();
    let den = 6.0 * jacks.iter().map(|j| (jack_mean - j).powi(2)).sum::<f64>().powf(1.5);
    let accel = if den != 0.0 { num / den } else { 0.0 };

    let adjust = |q: f64| {
        let zq = normal_quantile(q);
        normal_cdf(z0 + (z0 + zq) / (1.0 - accel * (z0 + zq)))
    };
    let lo_q = adjust(alpha / 2.0);
    let hi_q = adjust(1.0 - alpha / 2.0);

    tracing::debug!(z0, accel, lo_q, hi_q, iters, "bootstrap BCa quantiles");

    let lo = percentile_sorted(&boot, lo_q * 100.0);
    let hi = percentile_sorted(&boot, hi_q * 100.0);
    Ok((lo.min(hi), lo.max(hi)))
}

/// Difference of means, B - A
pub fn mean_difference(a: &[f64], b: &[f64]) -> f64 {
    mean(b) - mean(a)
}

/// Difference of trimmed means, B - A; the location estimate of Yuen's test
pub fn trimmed_mean_difference(a: &[f64], b: &[f64], trim: f64) -> f64 {
    trim_arm(b, trim).trimmed_mean - trim_arm(a, trim).trimmed_mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::{Distribution, Normal};

    fn normal_sample(rng: &mut StdRng, mu: f64, sd: f64, n: usize) -> Vec<f64> {
        let dist = Normal::new(mu, sd).unwrap();
        (0..n).map(|_| dist.sample(rng)).collect()
    }

    #[test]
    fn test_welch_detects_shift() {
        let mut rng = StdRng::seed_from_u64(0);
        let a = normal_sample(&mut rng, 0.0, 1.0, 200);
        let b = normal_sample(&mut rng, 0.5, 1.0, 180);
        let r = welch_test(SummaryStats::from_sample(&a), SummaryStats::from_sample(&b), 0.05, Sidedness::Two).unwrap();
        let diff = mean(&b) - mean(&a);
        assert!((r.effect - diff).abs() < 1e-12);
        assert!(r.ci.0 < diff && diff < r.ci.1);
        assert!(r.p_value < 0.05);
        assert_eq!(r.method, METHOD_WELCH);
    }

    #[test]
    fn test_welch_zero_variance_is_degenerate_not_error() {
        let s = SummaryStats::new(3.0, 0.0, 10);
        let r = welch_test(s, s, 0.05, Sidedness::Two).unwrap();
        assert_eq!(r.p_value, 1.0);
        assert_eq!(r.ci, (0.0, 0.0));
    }

    #[test]
    fn test_welch_one_sided_ci_uses_one_sided_critical_value() {
        let a = SummaryStats::new(0.0, 1.0, 100);
        let b = SummaryStats::new(0.3, 1.0, 100);
        let two = welch_test(a, b, 0.05, Sidedness::Two).unwrap();
        let right = welch_test(a, b, 0.05, Sidedness::Right).unwrap();
        assert!(right.ci.1 - right.ci.0 < two.ci.1 - two.ci.0);
        assert!(right.p_value < two.p_value);
    }

    #[test]
    fn test_welch_rejects_empty_arm() {
        let a = SummaryStats::new(0.0, 1.0, 0);
        let b = SummaryStats::new(0.0, 1.0, 10);
        assert!(welch_test(a, b, 0.05, Sidedness::Two).is_err());
    }

    #[test]
    fn test_yuen_resists_outlier() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut a = normal_sample(&mut rng, 0.0, 1.0, 200);
        a.push(20.0);
        let b = normal_sample(&mut rng, 1.0, 1.0, 201);
        let r = yuen_trimmed_mean_test(&a, &b, 0.2, 0.05, Sidedness::Two).unwrap();
        assert!(r.effect > 0.5);
        assert!(r.ci.0 < r.effect && r.effect < r.ci.1);
        assert!(r.p_value < 0.05);
        assert_eq!(r.method, METHOD_YUEN);
    }

    #[test]
    fn test_yuen_without_trim_matches_welch() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = normal_sample(&mut rng, 0.0, 1.0, 50);
        let b = normal_sample(&mut rng, 0.2, 2.0, 60);
        let y = yuen_trimmed_mean_test(&a, &b, 0.0, 0.05, Sidedness::Two).unwrap();
        let w = continuous_test(&a, &b, 0.05, Sidedness::Two, None).unwrap();
        assert!((y.p_value - w.p_value).abs() < 1e-12);
        assert!((y.effect - w.effect).abs() < 1e-12);
    }

    #[test]
    fn test_bootstrap_bca_contains_observed_effect() {
        let mut rng = StdRng::seed_from_u64(2);
        let a = normal_sample(&mut rng, 0.0, 1.0, 50);
        let b = normal_sample(&mut rng, 0.5, 1.0, 50);
        let (lo, hi) = bootstrap_bca_ci(&a, &b, mean_difference, 0.05, 2000, 11).unwrap();
        let diff = mean_difference(&a, &b);
        assert!(lo < diff && diff < hi, "({}, {}) vs {}", lo, hi, diff);
    }

    #[test]
    fn test_trimmed_mean_difference_ignores_tails() {
        let a: Vec<f64> = (1..=10).map(f64::from).collect();
        let mut b: Vec<f64> = (1..=10).map(|v| f64::from(v) + 1.0).collect();
        b[9] = 1000.0;
        assert!((trimmed_mean_difference(&a, &b, 0.2) - 1.0).abs() < 1e-12);
        assert!(mean_difference(&a, &b) > 90.0);
        assert!((trimmed_mean_difference(&a, &b, 0.0) - mean_difference(&a, &b)).abs() < 1e-12);
    }

    #[test]
    fn test_bootstrap_bca_is_reproducible() {
        let a: Vec<f64> = (0..30).map(|i| (i as f64).sin()).collect();
        let b: Vec<f64> = (0..30).map(|i| (i as f64).cos() + 0.3).collect();
        let first = bootstrap_bca_ci(&a, &b, mean_difference, 0.1, 500, 99).unwrap();
        let second = bootstrap_bca_ci(&a, &b, mean_difference, 0.1, 500, 99).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_bootstrap_bca_coverage() {
        let shift = 0.5;
        let sims = 200;
        let mut rng = StdRng::seed_from_u64(2024);
        let mut covered = 0;
        for s in 0..sims {
            let a = normal_sample(&mut rng, 0.0, 1.0, 40);
            let b = normal_sample(&mut rng, shift, 1.0, 40);
            let (lo, hi) = bootstrap_bca_ci(&a, &b, mean_difference, 0.1, 1000, s as u64 * 7919).unwrap();
            if lo <= shift && shift <= hi {
                covered += 1;
            }
        }
        let coverage = covered as f64 / sims as f64;
        println!("BCa empirical coverage at 90%: {:.3}", coverage);
        assert!(coverage > 0.83 && coverage < 0.97, "coverage {}", coverage);
    }
}
