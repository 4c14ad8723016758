//! Bayesian probability that B beats A
//!
//! Binomial metrics use conjugate Beta posteriors and a trapezoidal
//! integral over a fixed grid. Continuous metrics use independent
//! Normal-Inverse-Gamma posteriors and seeded Monte Carlo draws.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Gamma, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::BetaPrior;
use crate::distributions::{linspace, mean, trapezoid, BetaDist};
use crate::error::{AbError, Result};

/// Grid size for the binomial win-probability integral
pub const BAYES_GRID: usize = 2000;

/// Draws per Monte Carlo chunk; each chunk has its own seeded generator
const DRAW_CHUNK: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesResult {
    /// P(B > A)
    pub p_win: f64,
    /// Posterior mass inside the ROPE, when one was given. The binomial
    /// engine measures A - B against the bounds and the continuous engine
    /// measures B - A, so they agree only for a symmetric ROPE.
    pub p_rope: Option<f64>,
    pub rope: Option<(f64, f64)>,
}

fn check_rope(rope: Option<(f64, f64)>) -> Result<()> {
    match rope {
        Some((lo, hi)) if !(lo <= hi) => Err(AbError::invalid(format!("ROPE bounds out of order: ({}, {})", lo, hi))),
        _ => Ok(()),
    }
}

// ============================================================================
// BETA-BINOMIAL
// ============================================================================

/// Posterior Beta parameters after x successes in n trials
pub fn beta_posterior(prior: BetaPrior, x: u64, n: u64) -> (f64, f64) {
    (prior.a + x as f64, prior.b + (n - x) as f64)
}

/// P(B > A) = integral of f_B(x) * F_A(x) dx, plus the optional ROPE mass
/// integral of f_B(x) * [F_A(x + hi) - F_A(x + lo)] dx with shifted arguments
/// clipped to [0, 1].
pub fn bayes_prob_win_binomial(
    x1: u64,
    n1: u64,
    x2: u64,
    n2: u64,
    prior: BetaPrior,
    rope: Option<(f64, f64)>,
) -> Result<BayesResult> {
    if x1 > n1 || x2 > n2 {
        return Err(AbError::invalid("successes must be in [0, n]"));
    }
    if !(prior.a > 0.0 && prior.b > 0.0) {
        return Err(AbError::invalid("beta prior parameters must be > 0"));
    }
    check_rope(rope)?;

    let (a1, b1) = beta_posterior(prior, x1, n1);
    let (a2, b2) = beta_posterior(prior, x2, n2);
    let post_a = BetaDist::new(a1, b1);
    let post_b = BetaDist::new(a2, b2);

    let xs = linspace(0.0, 1.0, BAYES_GRID);
    let f_b: Vec<f64> = xs.par_iter().map(|&x| post_b.pdf(x)).collect();
    let integrand: Vec<f64> = xs
        .par_iter()
        .zip(&f_b)
        .map(|(&x, &fb)| fb * post_a.cdf(x))
        .collect();
    let p_win = trapezoid(&integrand, &xs).clamp(0.0, 1.0);

    let p_rope = rope.map(|(lo, hi)| {
        let integrand: Vec<f64> = xs
            .par_iter()
            .zip(&f_b)
            .map(|(&x, &fb)| {
                let upper = post_a.cdf((x + hi).clamp(0.0, 1.0));
                let lower = post_a.cdf((x + lo).clamp(0.0, 1.0));
                fb * (upper - lower)
            })
            .collect();
        trapezoid(&integrand, &xs).clamp(0.0, 1.0)
    });

    tracing::debug!(a1, b1, a2, b2, p_win, ?p_rope, "beta-binomial win probability");
    Ok(BayesResult { p_win, p_rope, rope })
}

// ============================================================================
// NORMAL-INVERSE-GAMMA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NigParams {
    pub mu: f64,
    pub k: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl NigParams {
    /// Near-uninformative prior
    pub fn vague() -> Self {
        NigParams { mu: 0.0, k: 1e-6, alpha: 1e-6, beta: 1e-6 }
    }

    /// Conjugate update with observed data
    pub fn update(&self, data: &[f64]) -> Self {
        let n = data.len() as f64;
        if data.is_empty() {
            return *self;
        }
        let m = mean(data);
        let k_n = self.k + n;
        let ss: f64 = data.iter().map(|x| (x - m).powi(2)).sum();
        NigParams {
            mu: (self.k * self.mu + n * m) / k_n,
            k: k_n,
            alpha: self.alpha + n / 2.0,
            beta: self.beta + 0.5 * ss + self.k * n * (m - self.mu).powi(2) / (2.0 * k_n),
        }
    }

    /// sigma^2 = beta / Gamma(alpha, 1), then mu ~ Normal(mu_n, sqrt(sigma^2 / k_n))
    fn sample_mean(&self, rng: &mut StdRng, gamma: &Gamma<f64>) -> f64 {
        let sigma2 = self.beta / gamma.sample(rng);
        let sd = (sigma2 / self.k).sqrt();
        match Normal::new(self.mu, sd) {
            Ok(n) => n.sample(rng),
            Err(_) => self.mu,
        }
    }
}

/// Monte Carlo P(mean_B > mean_A) under independent NIG posteriors
pub fn bayes_prob_win_continuous(
    a: &[f64],
    b: &[f64],
    rope: Option<(f64, f64)>,
    draws: usize,
    seed: u64,
) -> Result<BayesResult> {
    if a.is_empty() || b.is_empty() {
        return Err(AbError::invalid("both arms need at least one observation"));
    }
    if draws == 0 {
        return Err(AbError::invalid("draws must be > 0"));
    }
    check_rope(rope)?;

    let prior = NigParams::vague();
    let post_a = prior.update(a);
    let post_b = prior.update(b);
    let gamma_a = Gamma::new(post_a.alpha, 1.0).map_err(|e| AbError::invalid(format!("posterior A: {}", e)))?;
    let gamma_b = Gamma::new(post_b.alpha, 1.0).map_err(|e| AbError::invalid(format!("posterior B: {}", e)))?;

    let chunks = (draws + DRAW_CHUNK - 1) / DRAW_CHUNK;
    let (wins, in_rope) = (0..chunks)
        .into_par_iter()
        .map(|c| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(c as u64));
            let size = DRAW_CHUNK.min(draws - c * DRAW_CHUNK);
            let (mut wins, mut in_rope) = (0usize, 0usize);
            for _ in 0..size {
                let mu_a = post_a.sample_mean(&mut rng, &gamma_a);
                let mu_b = post_b.sample_mean(&mut rng, &gamma_b);
                let diff = mu_b - mu_a;
                if diff > 0.0 {
                    wins += 1;
                }
                if let Some((lo, hi)) = rope {
                    if diff >= lo && diff <= hi {
                        in_rope += 1;
                    }
                }
            }
            (wins, in_rope)
        })
        .reduce(|| (0, 0), |x, y| (x.0 + y.0, x.1 + y.1));

    let p_win = wins as f64 / draws as f64;
    let p_rope = rope.map(|_| in_rope as f64 / draws as f64);
    tracing::debug!(draws, p_win, ?p_rope, "normal-inverse-gamma win probability");
    Ok(BayesResult { p_win, p_rope, rope })
}

// ============================================================================
// INJECTED STRATEGY
// ============================================================================

/// Bayesian back end used by the engine, chosen when the engine is built
pub trait BayesEngine: Send + Sync {
    fn prob_win_binomial(
        &self,
        x1: u64,
        n1: u64,
        x2: u64,
        n2: u64,
        prior: BetaPrior,
        rope: Option<(f64, f64)>,
    ) -> Result<BayesResult>;

    fn prob_win_continuous(
        &self,
        a: &[f64],
        b: &[f64],
        rope: Option<(f64, f64)>,
        draws: usize,
        seed: u64,
    ) -> Result<BayesResult>;
}

/// Conjugate Beta-Binomial / Normal-Inverse-Gamma implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct ConjugateBayes;

impl BayesEngine for ConjugateBayes {
    fn prob_win_binomial(
        &self,
        x1: u64,
        n1: u64,
        x2: u64,
        n2: u64,
        prior: BetaPrior,
        rope: Option<(f64, f64)>,
    ) -> Result<BayesResult> {
        bayes_prob_win_binomial(x1, n1, x2, n2, prior, rope)
    }

    fn prob_win_continuous(
        &self,
        a: &[f64],
        b: &[f64],
        rope: Option<(f64, f64)>,
        draws: usize,
        seed: u64,
    ) -> Result<BayesResult> {
        bayes_prob_win_continuous(a, b, rope, draws, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::StandardNormal;

    #[test]
    fn test_prob_win_binomial_clear_winner() {
        let res = bayes_prob_win_binomial(40, 200, 80, 200, BetaPrior::default(), None).unwrap();
        assert!(res.p_win > 0.95);
        assert!(res.p_rope.is_none());

        let res = bayes_prob_win_binomial(40, 200, 80, 200, BetaPrior::default(), Some((-0.02, 0.02))).unwrap();
        assert!(res.p_rope.unwrap() < 0.1);
        assert_eq!(res.rope, Some((-0.02, 0.02)));
    }

    #[test]
    fn test_prob_win_binomial_symmetry() {
        let res = bayes_prob_win_binomial(30, 100, 30, 100, BetaPrior::default(), Some((-0.5, 0.5))).unwrap();
        assert!((res.p_win - 0.5).abs() < 0.01, "p_win {}", res.p_win);
        assert!(res.p_rope.unwrap() > 0.98);

        let ab = bayes_prob_win_binomial(20, 100, 30, 100, BetaPrior::default(), None).unwrap();
        let ba = bayes_prob_win_binomial(30, 100, 20, 100, BetaPrior::default(), None).unwrap();
        assert!((ab.p_win + ba.p_win - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_prob_win_binomial_rejects_bad_input() {
        assert!(bayes_prob_win_binomial(5, 4, 1, 4, BetaPrior::default(), None).is_err());
        assert!(bayes_prob_win_binomial(1, 4, 1, 4, BetaPrior { a: 0.0, b: 1.0 }, None).is_err());
        assert!(bayes_prob_win_binomial(1, 4, 1, 4, BetaPrior::default(), Some((0.1, -0.1))).is_err());
    }

    fn normal_sample(rng: &mut StdRng, mu: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|_| {
                let z: f64 = StandardNormal.sample(rng);
                mu + z
            })
            .collect()
    }

    #[test]
    fn test_prob_win_continuous_sanity() {
        let mut rng = StdRng::seed_from_u64(0);
        let a = normal_sample(&mut rng, 0.0, 400);
        let b = normal_sample(&mut rng, 0.2, 400);
        let res = bayes_prob_win_continuous(&a, &b, None, 10_000, 0).unwrap();
        assert!(res.p_win > 0.8, "p_win {}", res.p_win);

        let res = bayes_prob_win_continuous(&a, &b, Some((-0.05, 0.05)), 10_000, 0).unwrap();
        assert!(res.p_rope.unwrap() < 0.2);
    }

    #[test]
    fn test_prob_win_continuous_reproducible() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 3.0, 4.0, 5.0];
        let first = bayes_prob_win_continuous(&a, &b, Some((-0.1, 0.1)), 3000, 42).unwrap();
        let second = bayes_prob_win_continuous(&a, &b, Some((-0.1, 0.1)), 3000, 42).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_asymmetric_rope_orientation() {
        // B converts 10 points higher: A - B sits near -0.1
        let below = bayes_prob_win_binomial(100, 1000, 200, 1000, BetaPrior::default(), Some((-0.15, -0.05))).unwrap();
        let above = bayes_prob_win_binomial(100, 1000, 200, 1000, BetaPrior::default(), Some((0.05, 0.15))).unwrap();
        assert!(below.p_rope.unwrap() > 0.95, "{:?}", below);
        assert!(above.p_rope.unwrap() < 0.05, "{:?}", above);

        // B's mean is 1 higher: B - A sits near +1
        let mut rng = StdRng::seed_from_u64(5);
        let a = normal_sample(&mut rng, 0.0, 400);
        let b = normal_sample(&mut rng, 1.0, 400);
        let above = bayes_prob_win_continuous(&a, &b, Some((0.5, 1.5)), 5000, 1).unwrap();
        let below = bayes_prob_win_continuous(&a, &b, Some((-1.5, -0.5)), 5000, 1).unwrap();
        assert!(above.p_rope.unwrap() > 0.95, "{:?}", above);
        assert!(below.p_rope.unwrap() < 0.05, "{:?}", below);
    }

    #[test]
    fn test_nig_update_tracks_sample() {
        let data = [4.0, 5.0, 6.0];
        let post = NigParams::vague().update(&data);
        assert!((post.mu - 5.0).abs() < 1e-5);
        assert!((post.alpha - 1.5).abs() < 1e-5);
        assert!((post.beta - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_engine_trait_object_dispatch() {
        let engine: Box<dyn BayesEngine> = Box::new(ConjugateBayes);
        let res = engine.prob_win_binomial(10, 100, 20, 100, BetaPrior::default(), None).unwrap();
        assert!(res.p_win > 0.9);
    }
}
