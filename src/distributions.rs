//! Distributional primitives shared by every test in the crate
//! Normal CDF/quantile, beta PDF/CDF, chi-square survival, descriptive helpers

use statrs::function::erf::{erfc, erfc_inv};
use statrs::function::gamma::{gamma_ur, ln_gamma};

use crate::config::Sidedness;

/// Number of trapezoid steps used by `BetaDist::cdf`
pub const BETA_CDF_STEPS: usize = 1000;

// ============================================================================
// NORMAL
// ============================================================================

/// Standard normal CDF
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Standard normal survival function, 1 - CDF without cancellation
pub fn normal_sf(x: f64) -> f64 {
    0.5 * erfc(x / std::f64::consts::SQRT_2)
}

/// Standard normal quantile (inverse CDF)
pub fn normal_quantile(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    -std::f64::consts::SQRT_2 * erfc_inv(2.0 * p)
}

/// p-value of a z statistic under the given alternative
pub fn p_value_from_z(z: f64, sided: Sidedness) -> f64 {
    match sided {
        Sidedness::Two => 2.0 * normal_sf(z.abs()),
        Sidedness::Left => normal_cdf(z),
        Sidedness::Right => normal_sf(z),
    }
}

/// Critical value used for a confidence interval under the given alternative
pub fn critical_z(alpha: f64, sided: Sidedness) -> f64 {
    match sided {
        Sidedness::Two => normal_quantile(1.0 - alpha / 2.0),
        Sidedness::Left | Sidedness::Right => normal_quantile(1.0 - alpha),
    }
}

// ============================================================================
// BETA
// ============================================================================

/// Beta distribution with a precomputed normalising constant.
///
/// The CDF is a trapezoidal integral of the PDF over a fixed grid of
/// `BETA_CDF_STEPS` steps on [0, x], so results do not depend on any
/// incomplete-beta implementation. Where the density is singular at an
/// endpoint (shape < 1) the PDF reports 0 at that single point.
#[derive(Debug, Clone, Copy)]
pub struct BetaDist {
    pub a: f64,
    pub b: f64,
    log_norm: f64,
}

impl BetaDist {
    pub fn new(a: f64, b: f64) -> Self {
        BetaDist {
            a,
            b,
            log_norm: ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b),
        }
    }

    pub fn pdf(&self, x: f64) -> f64 {
        if !(0.0..=1.0).contains(&x) {
            return 0.0;
        }
        let log_density = self.log_norm + log_term(x, self.a - 1.0) + log_term(1.0 - x, self.b - 1.0);
        let v = log_density.exp();
        if v.is_finite() { v } else { 0.0 }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        let x = x.min(1.0);
        let step = x / BETA_CDF_STEPS as f64;
        let mut total = 0.0;
        let mut prev = self.pdf(0.0);
        for i in 1..=BETA_CDF_STEPS {
            let cur = self.pdf(i as f64 * step);
            total += (prev + cur) * step * 0.5;
            prev = cur;
        }
        total
    }

    pub fn mean(&self) -> f64 {
        self.a / (self.a + self.b)
    }
}

// e * ln(x), treating 0 * ln(0) as 0
fn log_term(x: f64, e: f64) -> f64 {
    if e == 0.0 { 0.0 } else { e * x.ln() }
}

pub fn beta_pdf(x: f64, a: f64, b: f64) -> f64 {
    BetaDist::new(a, b).pdf(x)
}

pub fn beta_cdf(x: f64, a: f64, b: f64) -> f64 {
    BetaDist::new(a, b).cdf(x)
}

/// `n` evenly spaced points on [lo, hi], endpoints included
pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (n - 1) as f64;
            (0..n).map(|i| if i == n - 1 { hi } else { lo + step * i as f64 }).collect()
        }
    }
}

/// Trapezoidal integral of sampled `ys` over abscissae `xs`
pub fn trapezoid(ys: &[f64], xs: &[f64]) -> f64 {
    ys.windows(2)
        .zip(xs.windows(2))
        .map(|(y, x)| (y[0] + y[1]) * (x[1] - x[0]) * 0.5)
        .sum()
}

// ============================================================================
// CHI-SQUARE
// ============================================================================

/// Chi-square survival function P(X >= x) with `df` degrees of freedom
pub fn chi_square_sf(x: f64, df: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if !x.is_finite() {
        return 0.0;
    }
    gamma_ur(df / 2.0, x / 2.0)
}

// ============================================================================
// DESCRIPTIVE HELPERS
// ============================================================================

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample variance (n - 1 denominator); 0 for fewer than two values
pub fn sample_variance(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(data);
    data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

/// Sample covariance of paired slices (n - 1 denominator)
pub fn covariance(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let (mx, my) = (mean(&x[..n]), mean(&y[..n]));
    x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum::<f64>() / (n - 1) as f64
}

/// Pearson correlation; NaN when either side has zero variance
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let denom = (sample_variance(x) * sample_variance(y)).sqrt();
    if denom > 0.0 { covariance(x, y) / denom } else { f64::NAN }
}

/// Percentile of sorted data with linear interpolation between ranks, q in [0, 100]
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let q = if q.is_nan() { 50.0 } else { q.clamp(0.0, 100.0) };
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn sort_floats(data: &mut [f64]) {
    data.sort_by(|a, b| a.total_cmp(b));
}
