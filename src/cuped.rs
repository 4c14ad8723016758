//! CUPED variance reduction with a pre-period covariate

use serde::{Deserialize, Serialize};

use crate::distributions::{covariance, mean, sample_variance};
use crate::error::{AbError, Result};

/// Fewest complete (pre, post) pairs the engine will adjust with
pub const CUPED_MIN_PAIRS: usize = 10;

/// |corr(pre, post)| below this makes the adjustment not worth applying
pub const CUPED_MIN_ABS_CORRELATION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CupedEstimate {
    pub theta: f64,
    pub variance_reduction_pct: f64,
}

/// theta = cov(pre, post) / (var(pre) + ridge); theta is 0 when the denominator is 0
pub fn estimate_cuped_theta(pre: &[f64], post: &[f64], ridge: f64) -> Result<CupedEstimate> {
    if pre.len() != post.len() {
        return Err(AbError::invalid(format!(
            "pre and post must be paired, got {} and {} values", pre.len(), post.len()
        )));
    }
    if !(ridge >= 0.0) {
        return Err(AbError::invalid("ridge must be >= 0"));
    }

    let denom = sample_variance(pre) + ridge;
    let theta = if denom == 0.0 { 0.0 } else { covariance(pre, post) / denom };

    let adjusted = apply_cuped(post, pre, theta);
    let var_post = sample_variance(post);
    let variance_reduction_pct = if var_post == 0.0 {
        0.0
    } else {
        (1.0 - sample_variance(&adjusted) / var_post) * 100.0
    };

    Ok(CupedEstimate { theta, variance_reduction_pct })
}

/// post - theta * (pre - mean(pre)); the centring keeps the metric's mean unchanged
pub fn apply_cuped(post: &[f64], pre: &[f64], theta: f64) -> Vec<f64> {
    let pre_mean = mean(pre);
    post.iter()
        .zip(pre)
        .map(|(y, x)| y - theta * (x - pre_mean))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::correlation;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, StandardNormal};

    /// Bivariate standard normal pairs with correlation `rho`
    fn correlated(rho: f64, n: usize, seed: u64) -> (Vec<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pre = Vec::with_capacity(n);
        let mut post = Vec::with_capacity(n);
        for _ in 0..n {
            let z1: f64 = StandardNormal.sample(&mut rng);
            let z2: f64 = StandardNormal.sample(&mut rng);
            pre.push(z1);
            post.push(rho * z1 + (1.0 - rho * rho).sqrt() * z2);
        }
        (pre, post)
    }

    #[test]
    fn test_cuped_reduces_variance() {
        let (pre, post) = correlated(0.5, 2000, 0);
        let est = estimate_cuped_theta(&pre, &post, 0.0).unwrap();
        let adjusted = apply_cuped(&post, &pre, est.theta);
        assert!(sample_variance(&adjusted) < sample_variance(&post));
        assert!(est.theta > 0.4 && est.theta < 0.6);
        // Expected reduction ~ rho^2 = 25%
        assert!(est.variance_reduction_pct > 18.0 && est.variance_reduction_pct < 32.0);
        assert!((correlation(&pre, &post) - 0.5).abs() < 0.06);
    }

    #[test]
    fn test_cuped_preserves_mean() {
        let (pre, post) = correlated(0.7, 500, 4);
        let est = estimate_cuped_theta(&pre, &post, 0.0).unwrap();
        let adjusted = apply_cuped(&post, &pre, est.theta);
        assert!((mean(&adjusted) - mean(&post)).abs() < 1e-10);
    }

    #[test]
    fn test_cuped_constant_inputs() {
        let pre = [1.0; 20];
        let post: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let est = estimate_cuped_theta(&pre, &post, 0.0).unwrap();
        assert_eq!(est.theta, 0.0);
        assert!(est.variance_reduction_pct.abs() < 1e-12);

        let est = estimate_cuped_theta(&post, &[3.0; 20], 0.0).unwrap();
        assert_eq!(est.variance_reduction_pct, 0.0);
    }

    #[test]
    fn test_ridge_shrinks_theta() {
        let (pre, post) = correlated(0.5, 300, 9);
        let plain = estimate_cuped_theta(&pre, &post, 0.0).unwrap();
        let ridged = estimate_cuped_theta(&pre, &post, 1.0).unwrap();
        assert!(ridged.theta.abs() < plain.theta.abs());
        assert!(estimate_cuped_theta(&pre, &post[..10], 0.0).is_err());
    }
}
