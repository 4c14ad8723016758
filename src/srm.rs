//! Sample ratio mismatch check under uniform allocation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::distributions::chi_square_sf;
use crate::error::{check_alpha, AbError, Result};

/// Default SRM significance level, far stricter than the primary test alpha
pub const DEFAULT_SRM_ALPHA: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrmResult {
    pub p_value: f64,
    pub passed: bool,
    pub alpha: f64,
    pub chi_square: f64,
    pub df: usize,
    pub expected: BTreeMap<String, f64>,
    pub observed: BTreeMap<String, u64>,
}

impl SrmResult {
    /// Turn a failed check into the typed hard-stop error
    pub fn ensure_passed(self) -> Result<SrmResult> {
        if self.passed {
            Ok(self)
        } else {
            Err(AbError::SrmCheckFailed(self))
        }
    }
}

/// Chi-square goodness-of-fit of the group counts against an even split.
/// A failed check is returned as data (`passed == false`), not as an error.
pub fn srm_check(counts: &BTreeMap<String, u64>, alpha: f64) -> Result<SrmResult> {
    check_alpha(alpha)?;
    let k = counts.len();
    if k < 2 {
        return Err(AbError::invalid(format!("SRM check needs at least 2 groups, got {}", k)));
    }
    let total: u64 = counts.values().sum();
    if total == 0 {
        return Err(AbError::invalid("SRM check needs at least one observation"));
    }

    let expected_each = total as f64 / k as f64;
    let chi_square: f64 = counts
        .values()
        .map(|&obs| (obs as f64 - expected_each).powi(2) / expected_each)
        .sum();
    let df = k - 1;
    let p_value = chi_square_sf(chi_square, df as f64);
    let passed = p_value >= alpha;

    if !passed {
        tracing::warn!(p_value, alpha, chi_square, "sample ratio mismatch detected");
    } else {
        tracing::debug!(p_value, chi_square, "SRM check passed");
    }

    Ok(SrmResult {
        p_value,
        passed,
        alpha,
        chi_square,
        df,
        expected: counts.keys().map(|g| (g.clone(), expected_each)).collect(),
        observed: counts.clone(),
    })
}

/// Parse `A=100,B=120` into group counts
pub fn parse_counts(spec: &str) -> Result<BTreeMap<String, u64>> {
    let mut counts = BTreeMap::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, value) = part
            .split_once('=')
            .ok_or_else(|| AbError::invalid(format!("expected GROUP=COUNT, got '{}'", part)))?;
        let value: u64 = value
            .trim()
            .parse()
            .map_err(|_| AbError::invalid(format!("count for '{}' is not a non-negative integer", name.trim())))?;
        counts.insert(name.trim().to_string(), value);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn two(a: u64, b: u64) -> BTreeMap<String, u64> {
        let mut m = BTreeMap::new();
        m.insert("A".to_string(), a);
        m.insert("B".to_string(), b);
        m
    }

    #[test]
    fn test_balanced_split_passes() {
        let res = srm_check(&two(100, 100), DEFAULT_SRM_ALPHA).unwrap();
        assert!(res.passed);
        assert_eq!(res.chi_square, 0.0);
        assert!((res.p_value - 1.0).abs() < 1e-12);
        assert_eq!(res.expected["A"], 100.0);
        assert_eq!(res.df, 1);
    }

    #[test]
    fn test_gross_imbalance_fails() {
        let res = srm_check(&two(1000, 100), DEFAULT_SRM_ALPHA).unwrap();
        assert!(!res.passed);
        assert!(res.p_value < 1e-10);
        match res.ensure_passed() {
            Err(AbError::SrmCheckFailed(r)) => assert_eq!(r.observed["B"], 100),
            other => panic!("expected SrmCheckFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_false_positive_rate_under_even_split() {
        let mut rng = StdRng::seed_from_u64(0);
        let trials = 500;
        let mut failures = 0;
        for _ in 0..trials {
            let a = (0..1000).filter(|_| rng.gen_bool(0.5)).count() as u64;
            let res = srm_check(&two(a, 1000 - a), 0.001).unwrap();
            if !res.passed {
                failures += 1;
            }
        }
        let rate = failures as f64 / trials as f64;
        println!("SRM false positive rate: {:.4}", rate);
        assert!((rate - 0.001).abs() <= 0.005);
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut one = BTreeMap::new();
        one.insert("A".to_string(), 10);
        assert!(srm_check(&one, 0.001).is_err());
        assert!(srm_check(&two(0, 0), 0.001).is_err());
        assert!(srm_check(&two(10, 10), 0.0).is_err());
    }

    #[test]
    fn test_parse_counts() {
        let counts = parse_counts("A=100, B=120,C=90").unwrap();
        assert_eq!(counts.len(), 3);
        assert_eq!(counts["B"], 120);
        assert!(parse_counts("A=1,B").is_err());
        assert!(parse_counts("A=-3").is_err());
    }
}
