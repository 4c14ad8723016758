//! Analysis configuration and the small enums shared across the engine

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{check_alpha, AbError, Result};

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Binomial,
    Continuous,
    Ratio,
}

/// Alternative hypothesis direction, stated for the effect B - A
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sidedness {
    #[default]
    Two,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequentialPreset {
    /// Equal alpha per look (alpha / k)
    #[default]
    Pocock,
    /// Lan-DeMets O'Brien-Fleming-type spending
    Obf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NanPolicy {
    #[default]
    Drop,
    Zero,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultipleTesting {
    None,
    #[default]
    Holm,
    By,
}

macro_rules! str_enum {
    ($ty:ident, $what:literal, { $($name:literal $(| $alias:literal)* => $variant:ident),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = AbError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_lowercase().as_str() {
                    $($name $(| $alias)* => Ok($ty::$variant),)+
                    other => Err(AbError::invalid(format!("unknown {}: '{}'", $what, other))),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let s = match self {
                    $($ty::$variant => $name,)+
                };
                write!(f, "{}", s)
            }
        }
    };
}

str_enum!(MetricType, "metric type", {
    "binomial" => Binomial,
    "continuous" => Continuous,
    "ratio" => Ratio,
});

str_enum!(Sidedness, "sidedness", {
    "two" | "two-sided" => Two,
    "left" | "less" => Left,
    "right" | "greater" => Right,
});

str_enum!(SequentialPreset, "sequential preset", {
    "pocock" => Pocock,
    "obf" | "o'brien-fleming" | "obrien-fleming" => Obf,
});

str_enum!(NanPolicy, "nan policy", {
    "drop" => Drop,
    "zero" => Zero,
    "error" => Error,
});

str_enum!(MultipleTesting, "multiple testing method", {
    "none" => None,
    "holm" => Holm,
    "by" | "benjamini-yekutieli" => By,
});

// ============================================================================
// ANALYSIS CONFIG
// ============================================================================

/// Beta prior pseudo-counts for binomial Bayesian estimates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaPrior {
    pub a: f64,
    pub b: f64,
}

impl Default for BetaPrior {
    fn default() -> Self {
        BetaPrior { a: 1.0, b: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub alpha: f64,
    pub metric_type: MetricType,
    #[serde(default)]
    pub sided: Sidedness,

    #[serde(default)]
    pub use_cuped: bool,
    #[serde(default)]
    pub preperiod_metric_col: Option<String>,
    #[serde(default)]
    pub cuped_ridge: f64,

    #[serde(default)]
    pub use_sequential: bool,
    #[serde(default)]
    pub sequential_preset: SequentialPreset,
    #[serde(default = "default_looks")]
    pub sequential_looks: usize,
    /// p-values of earlier looks, owned by the caller
    #[serde(default)]
    pub sequential_history_p: Vec<f64>,

    #[serde(default)]
    pub nan_policy: NanPolicy,
    #[serde(default)]
    pub segments: Vec<String>,
    #[serde(default)]
    pub multiple_testing: MultipleTesting,

    #[serde(default)]
    pub robust: bool,
    #[serde(default = "default_trim")]
    pub trim: f64,
    #[serde(default)]
    pub bootstrap: bool,
    #[serde(default = "default_bootstrap_iters")]
    pub bootstrap_iters: usize,
    #[serde(default)]
    pub use_fieller: bool,

    #[serde(default)]
    pub use_bayes: bool,
    #[serde(default)]
    pub bayes_rope: Option<(f64, f64)>,
    #[serde(default = "default_draws")]
    pub bayes_draws: usize,
    #[serde(default)]
    pub bayes_prior: BetaPrior,

    #[serde(default = "default_true")]
    pub check_srm: bool,
    #[serde(default = "default_srm_alpha")]
    pub srm_alpha: f64,
    #[serde(default)]
    pub force_run_when_srm_failed: bool,

    /// Seed for bootstrap and Monte Carlo draws
    #[serde(default)]
    pub seed: u64,
}

fn default_looks() -> usize {
    5
}

fn default_trim() -> f64 {
    0.2
}

fn default_bootstrap_iters() -> usize {
    5000
}

fn default_draws() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_srm_alpha() -> f64 {
    0.001
}

impl AnalysisConfig {
    pub fn new(alpha: f64, metric_type: MetricType) -> Self {
        AnalysisConfig {
            alpha,
            metric_type,
            sided: Sidedness::Two,
            use_cuped: false,
            preperiod_metric_col: None,
            cuped_ridge: 0.0,
            use_sequential: false,
            sequential_preset: SequentialPreset::Pocock,
            sequential_looks: default_looks(),
            sequential_history_p: Vec::new(),
            nan_policy: NanPolicy::Drop,
            segments: Vec::new(),
            multiple_testing: MultipleTesting::Holm,
            robust: false,
            trim: default_trim(),
            bootstrap: false,
            bootstrap_iters: default_bootstrap_iters(),
            use_fieller: false,
            use_bayes: false,
            bayes_rope: None,
            bayes_draws: default_draws(),
            bayes_prior: BetaPrior::default(),
            check_srm: true,
            srm_alpha: default_srm_alpha(),
            force_run_when_srm_failed: false,
            seed: 0,
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject parameters that have no sensible fallback
    pub fn validate(&self) -> Result<()> {
        check_alpha(self.alpha)?;
        if self.sequential_looks < 1 {
            return Err(AbError::invalid("sequential_looks must be >= 1"));
        }
        if self.bayes_draws < 1 {
            return Err(AbError::invalid("bayes_draws must be >= 1"));
        }
        if self.bootstrap_iters < 1 {
            return Err(AbError::invalid("bootstrap_iters must be >= 1"));
        }
        if !(0.0..0.5).contains(&self.trim) {
            return Err(AbError::invalid(format!("trim must be in [0, 0.5), got {}", self.trim)));
        }
        if !(self.cuped_ridge >= 0.0) {
            return Err(AbError::invalid("cuped_ridge must be >= 0"));
        }
        if let Some((lo, hi)) = self.bayes_rope {
            if !(lo <= hi) {
                return Err(AbError::invalid(format!("ROPE bounds out of order: ({}, {})", lo, hi)));
            }
        }
        if self.bayes_prior.a <= 0.0 || self.bayes_prior.b <= 0.0 {
            return Err(AbError::invalid("beta prior parameters must be > 0"));
        }
        check_alpha(self.srm_alpha)
            .map_err(|_| AbError::invalid(format!("srm_alpha must be in (0, 1), got {}", self.srm_alpha)))?;
        if self.sequential_history_p.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(AbError::invalid("sequential history p-values must be in [0, 1]"));
        }
        Ok(())
    }

    /// Config used for per-segment sub-analyses; sequential looks and the
    /// SRM gate belong to the top-level analysis only
    pub fn for_segment(&self) -> Self {
        let mut sub = self.clone();
        sub.segments = Vec::new();
        sub.multiple_testing = MultipleTesting::None;
        sub.check_srm = false;
        sub.use_sequential = false;
        sub
    }
}
