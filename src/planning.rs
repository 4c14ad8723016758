//! Experiment planning for conversion metrics: sample size, minimum
//! detectable effect, an A/A false-positive simulation and a revenue
//! projection for a hoped-for uplift

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Binomial, Distribution};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::Sidedness;
use crate::distributions::{normal_quantile, p_value_from_z};
use crate::error::{check_alpha, AbError, Result};

fn check_power(power: f64) -> Result<()> {
    if power.is_finite() && power > 0.0 && power < 1.0 {
        Ok(())
    } else {
        Err(AbError::invalid(format!("power must be in (0, 1), got {}", power)))
    }
}

/// Users needed per group for a two-sided test of p1 vs p2.
///
/// n = (z_{1-a/2} * sqrt(2 pbar (1 - pbar)) + z_power * sqrt(p1 q1 + p2 q2))^2 / (p1 - p2)^2,
/// rounded up. `None` when the rates are equal or not positive, since no
/// finite sample detects a zero difference.
pub fn required_sample_size(p1: f64, p2: f64, alpha: f64, power: f64) -> Result<Option<u64>> {
    check_alpha(alpha)?;
    check_power(power)?;
    if p1 >= 1.0 || p2 >= 1.0 {
        return Err(AbError::invalid("conversion rates must be below 1"));
    }
    if p1 == p2 || p1 <= 0.0 || p2 <= 0.0 {
        return Ok(None);
    }
    let z_alpha = normal_quantile(1.0 - alpha / 2.0);
    let z_beta = normal_quantile(power);
    let p_avg = (p1 + p2) / 2.0;
    let se_pooled = (2.0 * p_avg * (1.0 - p_avg)).sqrt();
    let se_effect = (p1 * (1.0 - p1) + p2 * (1.0 - p2)).sqrt();
    let n = (z_alpha * se_pooled + z_beta * se_effect).powi(2) / (p1 - p2).powi(2);
    Ok(Some((n.ceil() as u64).max(1)))
}

/// Smallest absolute difference detectable with `n` users per group
pub fn minimum_detectable_effect(n: u64, alpha: f64, power: f64, p1: f64) -> Result<Option<f64>> {
    check_alpha(alpha)?;
    check_power(power)?;
    if n == 0 || p1 <= 0.0 {
        return Ok(None);
    }
    let z_alpha = normal_quantile(1.0 - alpha / 2.0);
    let z_beta = normal_quantile(power);
    let se = (2.0 * p1 * (1.0 - p1) / n as f64).sqrt();
    Ok(Some((z_alpha + z_beta) * se))
}

/// Share of simulated A/A splits whose pooled z-test has p < alpha.
///
/// Users are split evenly (the odd user goes to B); simulation `i` draws
/// from a generator seeded with `seed + i`.
pub fn aa_false_positive_rate(baseline: f64, total_users: u64, alpha: f64, sims: usize, seed: u64) -> Result<f64> {
    check_alpha(alpha)?;
    if !(0.0..=1.0).contains(&baseline) {
        return Err(AbError::invalid(format!("baseline must be in [0, 1], got {}", baseline)));
    }
    if total_users < 2 {
        return Err(AbError::invalid("need at least two users to split"));
    }
    if sims == 0 {
        return Err(AbError::invalid("simulation count must be > 0"));
    }

    let ua = total_users / 2;
    let ub = total_users - ua;
    let dist_a = Binomial::new(ua, baseline).map_err(|e| AbError::invalid(e.to_string()))?;
    let dist_b = Binomial::new(ub, baseline).map_err(|e| AbError::invalid(e.to_string()))?;

    let hits: usize = (0..sims)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let ca = dist_a.sample(&mut rng);
            let cb = dist_b.sample(&mut rng);
            let (na, nb) = (ua as f64, ub as f64);
            let pooled = (ca + cb) as f64 / (na + nb);
            let se = (pooled * (1.0 - pooled) * (1.0 / na + 1.0 / nb)).sqrt();
            let z = if se > 0.0 { (cb as f64 / nb - ca as f64 / na) / se } else { 0.0 };
            usize::from(p_value_from_z(z, Sidedness::Two) < alpha)
        })
        .sum();

    let rate = hits as f64 / sims as f64;
    tracing::debug!(sims, rate, "A/A simulation finished");
    Ok(rate)
}

// ============================================================================
// ROI
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiEstimate {
    /// Users bought with the budget
    pub users: f64,
    pub base_revenue: f64,
    pub new_revenue: f64,
    pub profit: f64,
    /// Profit as a percentage of the budget
    pub roi_pct: f64,
}

/// Revenue gained if the baseline conversion rate rises by the relative
/// `uplift` (0.1 = +10%), with traffic bought at `cost_per_user`
pub fn estimate_roi(
    revenue_per_user: f64,
    cost_per_user: f64,
    budget: f64,
    baseline: f64,
    uplift: f64,
) -> Result<RoiEstimate> {
    if !(cost_per_user.is_finite() && cost_per_user > 0.0) {
        return Err(AbError::invalid(format!("cost per user must be > 0, got {}", cost_per_user)));
    }
    if !(budget.is_finite() && budget > 0.0) {
        return Err(AbError::invalid(format!("budget must be > 0, got {}", budget)));
    }
    if !(0.0..=1.0).contains(&baseline) {
        return Err(AbError::invalid(format!("baseline must be in [0, 1], got {}", baseline)));
    }
    if !revenue_per_user.is_finite() || !uplift.is_finite() {
        return Err(AbError::invalid("revenue per user and uplift must be finite"));
    }

    let users = budget / cost_per_user;
    let base_revenue = users * baseline * revenue_per_user;
    let new_revenue = users * baseline * (1.0 + uplift) * revenue_per_user;
    let profit = new_revenue - base_revenue;
    Ok(RoiEstimate { users, base_revenue, new_revenue, profit, roi_pct: profit / budget * 100.0 })
}
