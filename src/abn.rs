//! A/B/n conversion summary from aggregate counts: z-tests against the
//! control arm, Bonferroni split for a third arm, Cohen's h and a winner

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Sidedness;
use crate::distributions::p_value_from_z;
use crate::error::{check_alpha, AbError, Result};

/// Users and conversions of one arm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arm {
    pub users: u64,
    pub conversions: u64,
}

impl Arm {
    pub fn new(users: u64, conversions: u64) -> Self {
        Arm { users, conversions }
    }

    pub fn rate(&self) -> f64 {
        self.conversions as f64 / self.users as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    A,
    B,
    C,
    None,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Winner::A => "A",
            Winner::B => "B",
            Winner::C => "C",
            Winner::None => "None",
        };
        write!(f, "{}", s)
    }
}

/// One arm compared with the control
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub p_value: f64,
    pub significant: bool,
    /// Relative uplift over the control in percent, 0 when the control rate is 0
    pub uplift_pct: f64,
    pub cohens_h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbnResult {
    pub cr_a: f64,
    pub cr_b: f64,
    pub cr_c: Option<f64>,
    pub ab: Comparison,
    pub ac: Option<Comparison>,
    /// Per-comparison alpha after the Bonferroni split
    pub alpha_adj: f64,
    pub winner: Winner,
    /// p_ab scaled by the number of simultaneous metrics, capped at 1
    pub p_value_fdr: f64,
    pub significant_fdr: bool,
}

pub fn cohens_h(p_treat: f64, p_ctrl: f64) -> f64 {
    2.0 * (p_treat.sqrt().asin() - p_ctrl.sqrt().asin())
}

fn compare(ctrl: &Arm, treat: &Arm, pooled: f64, alpha_adj: f64) -> Comparison {
    let (cr_c, cr_t) = (ctrl.rate(), treat.rate());
    let se = (pooled * (1.0 - pooled) * (1.0 / ctrl.users as f64 + 1.0 / treat.users as f64)).sqrt();
    let z = if se > 0.0 { (cr_t - cr_c) / se } else { 0.0 };
    let p_value = p_value_from_z(z, Sidedness::Two);
    Comparison {
        p_value,
        significant: p_value < alpha_adj,
        uplift_pct: if cr_c > 0.0 { (cr_t - cr_c) / cr_c * 100.0 } else { 0.0 },
        cohens_h: cohens_h(cr_t, cr_c),
    }
}

/// Evaluate 2 or 3 arms, the first being the control.
///
/// With a third arm each comparison runs at alpha / 2. `metrics` is the
/// number of metrics tested at once; the A-vs-B p-value is scaled by it.
pub fn evaluate_abn(arms: &[Arm], alpha: f64, metrics: usize) -> Result<AbnResult> {
    check_alpha(alpha)?;
    if !(2..=3).contains(&arms.len()) {
        return Err(AbError::invalid(format!("A/B/n test takes 2 or 3 arms, got {}", arms.len())));
    }
    for (arm, name) in arms.iter().zip(["A", "B", "C"]) {
        if arm.users == 0 {
            return Err(AbError::invalid(format!("users of arm {} must be > 0", name)));
        }
        if arm.conversions > arm.users {
            return Err(AbError::invalid(format!(
                "conversions of arm {} must be in [0, {}], got {}", name, arm.users, arm.conversions
            )));
        }
    }

    let users: u64 = arms.iter().map(|a| a.users).sum();
    let conversions: u64 = arms.iter().map(|a| a.conversions).sum();
    let pooled = conversions as f64 / users as f64;
    let alpha_adj = alpha / (arms.len() - 1) as f64;

    let (a, b) = (&arms[0], &arms[1]);
    let ab = compare(a, b, pooled, alpha_adj);
    let ac = arms.get(2).map(|c| compare(a, c, pooled, alpha_adj));
    let (cr_a, cr_b) = (a.rate(), b.rate());
    let cr_c = arms.get(2).map(Arm::rate);

    let winner = match (ac, cr_c) {
        (Some(ac), Some(cr_c)) => {
            if ab.significant && cr_b > cr_a {
                Winner::B
            } else if ac.significant && cr_c > cr_a {
                Winner::C
            } else if !ab.significant && !ac.significant {
                Winner::A
            } else {
                Winner::None
            }
        }
        _ => {
            if ab.significant && cr_b > cr_a {
                Winner::B
            } else if !ab.significant {
                Winner::A
            } else {
                Winner::None
            }
        }
    };

    let m = metrics.max(1) as f64;
    let p_value_fdr = (ab.p_value * m).min(1.0);

    tracing::debug!(p_ab = ab.p_value, ?winner, "A/B/n evaluated");
    Ok(AbnResult {
        cr_a,
        cr_b,
        cr_c,
        ab,
        ac,
        alpha_adj,
        winner,
        p_value_fdr,
        significant_fdr: p_value_fdr < alpha,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_winner_b() {
        let res = evaluate_abn(&[Arm::new(100, 10), Arm::new(100, 20)], 0.05, 1).unwrap();
        assert!(res.ab.p_value < 0.05);
        assert!(res.ab.significant);
        assert_eq!(res.winner, Winner::B);
        assert!((res.ab.uplift_pct - 100.0).abs() < 1e-9);
        assert!(res.ab.cohens_h > 0.0);
        assert_eq!(res.winner.to_string(), "B");
    }

    #[test]
    fn test_identical_arms() {
        let res = evaluate_abn(&[Arm::new(100, 10), Arm::new(100, 10)], 0.05, 1).unwrap();
        assert_eq!(res.ab.p_value, 1.0);
        assert_eq!(res.cr_b - res.cr_a, 0.0);
        assert!(!res.ab.significant);
        assert_eq!(res.winner, Winner::A);
    }

    #[test]
    fn test_three_arms_use_bonferroni() {
        let arms = [Arm::new(1000, 100), Arm::new(1000, 100), Arm::new(1000, 140)];
        let res = evaluate_abn(&arms, 0.05, 1).unwrap();
        assert_eq!(res.alpha_adj, 0.025);
        let ac = res.ac.unwrap();
        assert!(ac.p_value < 0.025);
        assert_eq!(res.winner, Winner::C);

        // B significantly worse, C flat: neither winner nor "no difference"
        let arms = [Arm::new(1000, 200), Arm::new(1000, 100), Arm::new(1000, 200)];
        let res = evaluate_abn(&arms, 0.05, 1).unwrap();
        assert_eq!(res.winner, Winner::None);
    }

    #[test]
    fn test_metric_count_scales_p() {
        let arms = [Arm::new(100, 10), Arm::new(100, 20)];
        let single = evaluate_abn(&arms, 0.05, 1).unwrap();
        let many = evaluate_abn(&arms, 0.05, 10).unwrap();
        assert!((many.p_value_fdr - (single.ab.p_value * 10.0).min(1.0)).abs() < 1e-12);
        assert!(!many.significant_fdr);
        assert_eq!(evaluate_abn(&arms, 0.05, 0).unwrap().p_value_fdr, single.ab.p_value);
    }

    #[test]
    fn test_invalid_counts() {
        assert!(evaluate_abn(&[Arm::new(0, 0), Arm::new(10, 1)], 0.05, 1).is_err());
        assert!(evaluate_abn(&[Arm::new(10, 11), Arm::new(10, 1)], 0.05, 1).is_err());
        assert!(evaluate_abn(&[Arm::new(10, 1)], 0.05, 1).is_err());
        assert!(evaluate_abn(&[Arm::new(10, 1), Arm::new(10, 1)], 1.5, 1).is_err());
    }

    #[test]
    fn test_zero_control_rate_has_no_uplift() {
        let res = evaluate_abn(&[Arm::new(50, 0), Arm::new(50, 5)], 0.05, 1).unwrap();
        assert_eq!(res.ab.uplift_pct, 0.0);
    }
}
