//! Orchestration: one call runs the whole analysis pipeline for a
//! two-group dataset and returns a single annotated result.
//!
//! Order of operations: SRM gate, CUPED, the metric-type test, Bayesian
//! estimate, sequential decision, then per-segment sub-analyses with
//! multiple-testing correction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bayes::{BayesEngine, BayesResult, ConjugateBayes};
use crate::binomial::{binomial_test, TestResult};
use crate::config::{AnalysisConfig, MetricType};
use crate::continuous::{bootstrap_bca_ci, continuous_test, mean_difference, trimmed_mean_difference, SummaryStats};
use crate::cuped::{apply_cuped, estimate_cuped_theta, CUPED_MIN_ABS_CORRELATION, CUPED_MIN_PAIRS};
use crate::dataset::Dataset;
use crate::distributions::correlation;
use crate::error::{AbError, Result, ValidationError};
use crate::multiple::adjust;
use crate::ratio::ratio_test;
use crate::sequential::{
    append_history, make_sequential_plan, sequential_decision, SequentialDecision, SequentialPlan, StopEvent,
    StopNotifier,
};
use crate::srm::{srm_check, SrmResult};

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialMeta {
    pub plan: SequentialPlan,
    /// History including this look; the caller persists it for the next call
    pub history: Vec<f64>,
    pub decision: SequentialDecision,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultMeta {
    pub bayes: Option<BayesResult>,
    pub sequential: Option<SequentialMeta>,
    pub srm: Option<SrmResult>,
}

impl ResultMeta {
    fn is_empty(&self) -> bool {
        self.bayes.is_none() && self.sequential.is_none() && self.srm.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub column: String,
    pub value: String,
    pub p_raw: f64,
    pub p_adj: f64,
    pub effect: f64,
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub p_value: f64,
    pub effect: f64,
    pub ci: (f64, f64),
    pub method_notes: Vec<String>,
    pub meta: Option<ResultMeta>,
    pub segments: Option<Vec<SegmentResult>>,
}

impl AnalysisResult {
    /// Notes as one line for renderers
    pub fn method_notes_joined(&self) -> String {
        self.method_notes.join(", ")
    }

    /// Updated sequential history, when a sequential decision was made
    pub fn sequential_history(&self) -> Option<&[f64]> {
        self.meta.as_ref()?.sequential.as_ref().map(|s| s.history.as_slice())
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Analysis pipeline with its injected collaborators
pub struct Engine {
    bayes: Box<dyn BayesEngine>,
    notifier: Option<Box<dyn StopNotifier>>,
}

impl Default for Engine {
    fn default() -> Self {
        Engine { bayes: Box::new(ConjugateBayes), notifier: None }
    }
}

/// Analyse with the default engine
pub fn analyze(data: &Dataset, config: &AnalysisConfig) -> Result<AnalysisResult> {
    Engine::default().analyze(data, config)
}

enum Cuped {
    Applied(String),
    Skipped(&'static str),
}

fn group_count_error(labels: &[String]) -> ValidationError {
    ValidationError::new(
        "group_count",
        "Exactly two groups required",
        format!("Found {} distinct groups: {:?}", labels.len(), labels),
        "Filter the data to one control and one treatment group",
    )
}

fn non_binary_error() -> ValidationError {
    ValidationError::new(
        "non_binary_metric",
        "Binomial metric must be 0/1",
        "The metric column holds values other than 0 and 1",
        "Use metric_type 'continuous' or recode the metric to 0/1",
    )
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bayes(mut self, bayes: Box<dyn BayesEngine>) -> Self {
        self.bayes = bayes;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn StopNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn analyze(&self, data: &Dataset, config: &AnalysisConfig) -> Result<AnalysisResult> {
        config.validate()?;
        let labels = data.group_labels();
        if labels.len() != 2 {
            return Err(group_count_error(&labels).into());
        }
        let idx_a = data.group_indices(&labels[0]);
        let idx_b = data.group_indices(&labels[1]);

        let mut notes: Vec<String> = Vec::new();
        let mut meta = ResultMeta::default();

        // === SRM GATE ===
        if config.check_srm {
            let counts: BTreeMap<String, u64> = labels
                .iter()
                .zip([idx_a.len(), idx_b.len()])
                .map(|(l, n)| (l.clone(), n as u64))
                .collect();
            let srm = srm_check(&counts, config.srm_alpha)?;
            if !srm.passed {
                if !config.force_run_when_srm_failed {
                    return Err(AbError::SrmCheckFailed(srm));
                }
                tracing::warn!(p_value = srm.p_value, "continuing despite SRM failure");
                notes.push(format!("SRM check failed (p={:.3e}), analysis forced", srm.p_value));
            }
            meta.srm = Some(srm);
        }

        // === CUPED ===
        let mut metric = data.metric.clone();
        if config.use_cuped {
            match self.cuped(data, config, &mut metric)? {
                Cuped::Applied(note) => notes.push(note),
                Cuped::Skipped(reason) => {
                    tracing::warn!(reason, "CUPED skipped");
                    notes.push(format!("CUPED skipped: {}", reason));
                }
            }
        }

        let a: Vec<f64> = idx_a.iter().map(|&i| metric[i]).collect();
        let b: Vec<f64> = idx_b.iter().map(|&i| metric[i]).collect();

        // === HYPOTHESIS TEST ===
        let (mut test, bayes) = match config.metric_type {
            MetricType::Binomial => self.binomial(&a, &b, config)?,
            MetricType::Continuous => {
                let robust_trim = config.robust.then_some(config.trim);
                let test = continuous_test(&a, &b, config.alpha, config.sided, robust_trim)?;
                (test, self.bayes_continuous(&a, &b, config)?)
            }
            MetricType::Ratio => {
                let test = ratio_test(
                    SummaryStats::from_sample(&a),
                    SummaryStats::from_sample(&b),
                    config.alpha,
                    config.sided,
                    config.use_fieller,
                )?;
                (test, self.bayes_continuous(&a, &b, config)?)
            }
        };
        notes.push(test.method.clone());
        if config.metric_type == MetricType::Continuous && config.bootstrap {
            let (alpha, iters, seed) = (config.alpha, config.bootstrap_iters, config.seed);
            test.ci = if config.robust {
                let trim = config.trim;
                bootstrap_bca_ci(&a, &b, |x, y| trimmed_mean_difference(x, y, trim), alpha, iters, seed)?
            } else {
                bootstrap_bca_ci(&a, &b, mean_difference, alpha, iters, seed)?
            };
            notes.push("bootstrap_bca".to_string());
        }
        let TestResult { p_value, effect, ci, .. } = test;
        tracing::info!(p_value, effect, metric_type = %config.metric_type, "test complete");

        // === BAYES ===
        if let Some(br) = bayes {
            let mut msg = format!("Bayes: P(B>A)≈{:.3}", br.p_win);
            if let Some(pr) = br.p_rope {
                msg.push_str(&format!(", P(diff∈ROPE)≈{:.3}", pr));
            }
            notes.push(msg);
            meta.bayes = Some(br);
        }

        // === SEQUENTIAL ===
        if config.use_sequential {
            let seq = self.sequential(p_value, config)?;
            let d = &seq.decision;
            notes.push(format!(
                "Sequential ({}, k={}): look={}, {}, p≤{:.4} at this look; spent≈{:.4}.",
                config.sequential_preset,
                seq.plan.k,
                d.look,
                if d.stop { "STOP" } else { "continue" },
                d.threshold,
                d.spent_alpha_cum
            ));
            meta.sequential = Some(seq);
        }

        // === SEGMENTS ===
        let segments = if config.segments.is_empty() {
            None
        } else {
            let segs = self.segments(data, config, &mut notes);
            if segs.is_empty() { None } else { Some(segs) }
        };

        Ok(AnalysisResult {
            p_value,
            effect,
            ci,
            method_notes: notes,
            meta: if meta.is_empty() { None } else { Some(meta) },
            segments,
        })
    }

    /// Adjust `metric` in place on rows with a pre-period value
    fn cuped(&self, data: &Dataset, config: &AnalysisConfig, metric: &mut [f64]) -> Result<Cuped> {
        if config.metric_type == MetricType::Binomial {
            return Ok(Cuped::Skipped("binomial metric is analysed as counts"));
        }
        let pre = match config.preperiod_metric_col.as_deref().and_then(|c| data.covariate(c)) {
            Some(pre) => pre,
            None => return Ok(Cuped::Skipped("pre-period column missing")),
        };
        let complete: Vec<usize> = (0..metric.len()).filter(|&i| pre[i].is_some()).collect();
        if complete.len() < CUPED_MIN_PAIRS {
            return Ok(Cuped::Skipped("insufficient pre-period data"));
        }
        let x: Vec<f64> = complete.iter().filter_map(|&i| pre[i]).collect();
        let y: Vec<f64> = complete.iter().map(|&i| metric[i]).collect();
        let corr = correlation(&x, &y);
        if corr.is_nan() || corr.abs() < CUPED_MIN_ABS_CORRELATION {
            return Ok(Cuped::Skipped("low correlation"));
        }

        let est = estimate_cuped_theta(&x, &y, config.cuped_ridge)?;
        for (&i, adj) in complete.iter().zip(apply_cuped(&y, &x, est.theta)) {
            metric[i] = adj;
        }
        tracing::debug!(theta = est.theta, corr, pairs = complete.len(), "CUPED applied");
        Ok(Cuped::Applied(format!(
            "CUPED theta={:.4}, variance reduction≈{:.1}%",
            est.theta, est.variance_reduction_pct
        )))
    }

    fn binomial(&self, a: &[f64], b: &[f64], config: &AnalysisConfig) -> Result<(TestResult, Option<BayesResult>)> {
        if a.iter().chain(b).any(|&v| v != 0.0 && v != 1.0) {
            return Err(non_binary_error().into());
        }
        let (x1, n1) = (a.iter().filter(|&&v| v == 1.0).count() as u64, a.len() as u64);
        let (x2, n2) = (b.iter().filter(|&&v| v == 1.0).count() as u64, b.len() as u64);
        let test = binomial_test(x1, n1, x2, n2, config.alpha, config.sided)?;
        let bayes = if config.use_bayes {
            Some(self.bayes.prob_win_binomial(x1, n1, x2, n2, config.bayes_prior, config.bayes_rope)?)
        } else {
            None
        };
        Ok((test, bayes))
    }

    fn bayes_continuous(&self, a: &[f64], b: &[f64], config: &AnalysisConfig) -> Result<Option<BayesResult>> {
        if !config.use_bayes {
            return Ok(None);
        }
        self.bayes
            .prob_win_continuous(a, b, config.bayes_rope, config.bayes_draws, config.seed)
            .map(Some)
    }

    fn sequential(&self, p_value: f64, config: &AnalysisConfig) -> Result<SequentialMeta> {
        let plan = make_sequential_plan(config.sequential_looks, config.alpha, config.sequential_preset)?;
        let history = append_history(&config.sequential_history_p, p_value);
        let decision = sequential_decision(&history, &plan)?;
        if decision.stop {
            let event = StopEvent {
                look: decision.look,
                p_value: history[decision.look - 1],
                threshold: decision.threshold,
                spent_alpha_cum: decision.spent_alpha_cum,
                preset: decision.preset,
            };
            tracing::info!(look = event.look, p_value = event.p_value, "sequential test stopped early");
            if let Some(n) = &self.notifier {
                n.on_stop(&event);
            }
        }
        Ok(SequentialMeta { plan, history, decision })
    }

    /// Re-run the analysis per segment value and correct the raw p-values.
    /// Segments whose sub-analysis fails (e.g. only one group present) are skipped.
    fn segments(&self, data: &Dataset, config: &AnalysisConfig, notes: &mut Vec<String>) -> Vec<SegmentResult> {
        let sub_cfg = config.for_segment();
        let mut out = Vec::new();
        for col in &config.segments {
            let groups = match data.segment_groups(col) {
                Some(g) => g,
                None => {
                    tracing::warn!(column = %col, "segment column not in dataset");
                    continue;
                }
            };
            for (value, rows) in groups {
                let sub = data.subset(&rows);
                match self.analyze(&sub, &sub_cfg) {
                    Ok(r) => out.push(SegmentResult {
                        column: col.clone(),
                        value,
                        p_raw: r.p_value,
                        p_adj: r.p_value,
                        effect: r.effect,
                        n: rows.len(),
                    }),
                    Err(e) => {
                        tracing::warn!(column = %col, value = %value, error = %e, "segment skipped");
                    }
                }
            }
        }

        if !out.is_empty() {
            let raw: Vec<f64> = out.iter().map(|s| s.p_raw).collect();
            for (seg, p) in out.iter_mut().zip(adjust(config.multiple_testing, &raw)) {
                seg.p_adj = p;
            }
            notes.push(format!(
                "Multiple testing: {} on {} comparisons",
                config.multiple_testing.to_string().to_uppercase(),
                raw.len()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SequentialPreset;
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal, StandardNormal};
    use std::sync::{Arc, Mutex};

    fn alternating(n: usize) -> Vec<String> {
        (0..n).map(|i| if i % 2 == 0 { "A".to_string() } else { "B".to_string() }).collect()
    }

    fn binary_dataset(conv_a: usize, n_a: usize, conv_b: usize, n_b: usize) -> Dataset {
        let mut groups = Vec::new();
        let mut metric = Vec::new();
        for i in 0..n_a {
            groups.push("A".to_string());
            metric.push(if i < conv_a { 1.0 } else { 0.0 });
        }
        for i in 0..n_b {
            groups.push("B".to_string());
            metric.push(if i < conv_b { 1.0 } else { 0.0 });
        }
        Dataset::new(groups, metric).unwrap()
    }

    #[test]
    fn test_binomial_end_to_end() {
        let ds = binary_dataset(10, 100, 20, 100);
        let res = analyze(&ds, &AnalysisConfig::new(0.05, MetricType::Binomial)).unwrap();
        assert!((res.effect - 0.1).abs() < 1e-12);
        assert!(res.ci.0 <= res.ci.1);
        assert_eq!(res.method_notes, vec!["newcombe_wilson_diff".to_string()]);
        assert!(res.meta.unwrap().srm.unwrap().passed);
        assert!(res.segments.is_none());
    }

    #[test]
    fn test_group_count_and_binary_checks() {
        let ds = Dataset::new(vec!["A".into(), "A".into()], vec![1.0, 0.0]).unwrap();
        let err = analyze(&ds, &AnalysisConfig::new(0.05, MetricType::Binomial)).unwrap_err();
        assert_eq!(err.code(), "group_count");

        let ds = Dataset::new(alternating(4), vec![1.0, 2.0, 0.0, 1.0]).unwrap();
        let err = analyze(&ds, &AnalysisConfig::new(0.05, MetricType::Binomial)).unwrap_err();
        assert_eq!(err.code(), "non_binary_metric");
    }

    #[test]
    fn test_srm_gate_and_override() {
        let ds = binary_dataset(50, 1000, 10, 100);
        let mut cfg = AnalysisConfig::new(0.05, MetricType::Binomial);
        match analyze(&ds, &cfg) {
            Err(AbError::SrmCheckFailed(srm)) => assert!(!srm.passed),
            other => panic!("expected SRM failure, got {:?}", other),
        }

        cfg.force_run_when_srm_failed = true;
        let res = analyze(&ds, &cfg).unwrap();
        assert!(res.method_notes[0].starts_with("SRM check failed"));
        assert!(!res.meta.unwrap().srm.unwrap().passed);

        cfg.force_run_when_srm_failed = false;
        cfg.check_srm = false;
        assert!(analyze(&ds, &cfg).is_ok());
    }

    #[test]
    fn test_cuped_skipped_when_uncorrelated() {
        let mut rng = StdRng::seed_from_u64(0);
        let n = 2000;
        let post: Vec<f64> = (0..n).map(|_| StandardNormal.sample(&mut rng)).collect();
        let pre: Vec<Option<f64>> = (0..n).map(|_| Some(StandardNormal.sample(&mut rng))).collect();
        let ds = Dataset::new(alternating(n), post).unwrap().with_covariate("pre", pre).unwrap();

        let mut cfg = AnalysisConfig::new(0.05, MetricType::Continuous);
        cfg.use_cuped = true;
        cfg.preperiod_metric_col = Some("pre".into());
        let res = analyze(&ds, &cfg).unwrap();
        assert!(res.method_notes.iter().any(|n| n.contains("CUPED skipped")));
        assert_eq!(res.method_notes[1], "welch");
    }

    #[test]
    fn test_cuped_applied_when_correlated() {
        let mut rng = StdRng::seed_from_u64(1);
        let n = 2000;
        let mut pre = Vec::with_capacity(n);
        let mut post = Vec::with_capacity(n);
        for _ in 0..n {
            let z1: f64 = StandardNormal.sample(&mut rng);
            let z2: f64 = StandardNormal.sample(&mut rng);
            pre.push(Some(z1));
            post.push(0.5 * z1 + 0.75_f64.sqrt() * z2);
        }
        let ds = Dataset::new(alternating(n), post).unwrap().with_covariate("pre", pre).unwrap();

        let mut cfg = AnalysisConfig::new(0.05, MetricType::Continuous);
        cfg.use_cuped = true;
        let missing = analyze(&ds, &cfg).unwrap();
        assert_eq!(missing.method_notes[0], "CUPED skipped: pre-period column missing");

        cfg.preperiod_metric_col = Some("pre".into());
        let plain = analyze(&ds, &AnalysisConfig::new(0.05, MetricType::Continuous)).unwrap();
        let adjusted = analyze(&ds, &cfg).unwrap();
        assert!(adjusted.method_notes[0].starts_with("CUPED theta="));
        assert!(adjusted.ci.1 - adjusted.ci.0 < plain.ci.1 - plain.ci.0);
    }

    #[test]
    fn test_segments_are_corrected() {
        let groups = vec!["A", "B", "A", "B", "A", "B", "A", "B"].into_iter().map(String::from).collect();
        let metric = vec![1.0, 2.0, 1.5, 2.5, 3.0, 3.5, 2.0, 4.0];
        let country = vec!["US", "US", "US", "US", "DE", "DE", "DE", "DE"]
            .into_iter()
            .map(|s| Some(s.to_string()))
            .collect();
        let ds = Dataset::new(groups, metric).unwrap().with_segment("country", country).unwrap();

        let mut cfg = AnalysisConfig::new(0.05, MetricType::Continuous);
        cfg.segments = vec!["country".into(), "device".into()];
        let res = analyze(&ds, &cfg).unwrap();
        let segs = res.segments.as_ref().unwrap();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].value, "DE");
        for s in segs {
            assert!(s.p_adj >= s.p_raw);
            assert_eq!(s.n, 4);
        }
        assert!(res.method_notes_joined().ends_with("Multiple testing: HOLM on 2 comparisons"));
    }

    #[test]
    fn test_sequential_stops_on_tiny_history() {
        let ds = binary_dataset(10, 100, 20, 100);
        let mut cfg = AnalysisConfig::new(0.05, MetricType::Binomial);
        cfg.use_sequential = true;
        cfg.sequential_looks = 5;
        cfg.sequential_preset = SequentialPreset::Pocock;
        cfg.sequential_history_p = vec![1e-6];

        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let engine = Engine::new().with_notifier(Box::new(move |e: &StopEvent| sink.lock().unwrap().push(e.look)));
        let res = engine.analyze(&ds, &cfg).unwrap();

        let seq = res.meta.as_ref().unwrap().sequential.as_ref().unwrap();
        assert!(seq.decision.stop);
        assert_eq!(seq.decision.look, 1);
        assert_eq!(seq.history.len(), 2);
        assert_eq!(res.sequential_history().unwrap()[0], 1e-6);
        assert_eq!(*fired.lock().unwrap(), vec![1]);
        assert!(res.method_notes.last().unwrap().contains("STOP"));
    }

    #[test]
    fn test_sequential_history_is_idempotent() {
        let ds = binary_dataset(10, 100, 11, 100);
        let mut cfg = AnalysisConfig::new(0.05, MetricType::Binomial);
        cfg.use_sequential = true;
        let first = analyze(&ds, &cfg).unwrap();
        cfg.sequential_history_p = first.sequential_history().unwrap().to_vec();
        let second = analyze(&ds, &cfg).unwrap();
        assert_eq!(second.sequential_history().unwrap().len(), 1);
        let d = &second.meta.unwrap().sequential.unwrap().decision;
        assert!(!d.stop);
        assert_eq!(d.look, 1);
    }

    #[test]
    fn test_bayes_and_bootstrap_notes() {
        let mut rng = StdRng::seed_from_u64(3);
        let dist_a = Normal::new(10.0, 2.0).unwrap();
        let dist_b = Normal::new(11.0, 2.0).unwrap();
        let n = 400;
        let groups = alternating(n);
        let metric: Vec<f64> = groups
            .iter()
            .map(|g| if g == "A" { dist_a.sample(&mut rng) } else { dist_b.sample(&mut rng) })
            .collect();
        let ds = Dataset::new(groups, metric).unwrap();

        let mut cfg = AnalysisConfig::new(0.05, MetricType::Continuous);
        cfg.use_bayes = true;
        cfg.bayes_rope = Some((-0.1, 0.1));
        cfg.bootstrap = true;
        cfg.bootstrap_iters = 500;
        cfg.bayes_draws = 2000;
        let res = analyze(&ds, &cfg).unwrap();
        assert_eq!(res.method_notes[0], "welch");
        assert_eq!(res.method_notes[1], "bootstrap_bca");
        assert!(res.method_notes[2].starts_with("Bayes: P(B>A)≈"));
        assert!(res.method_notes[2].contains("ROPE"));
        assert!(res.meta.unwrap().bayes.unwrap().p_win > 0.99);
        assert!(res.ci.0 < res.effect && res.effect < res.ci.1);
    }

    #[test]
    fn test_robust_bootstrap_interval_brackets_trimmed_effect() {
        let mut rng = StdRng::seed_from_u64(21);
        let dist = Normal::new(10.0, 1.0).unwrap();
        let mut groups = Vec::new();
        let mut metric = Vec::new();
        for i in 0..100 {
            groups.push("A".to_string());
            metric.push(dist.sample(&mut rng));
            groups.push("B".to_string());
            let shift = if i < 10 { 500.0 } else { 0.5 };
            metric.push(dist.sample(&mut rng) + shift);
        }
        let ds = Dataset::new(groups, metric).unwrap();

        let mut cfg = AnalysisConfig::new(0.05, MetricType::Continuous);
        cfg.robust = true;
        cfg.bootstrap = true;
        cfg.bootstrap_iters = 2000;
        let res = analyze(&ds, &cfg).unwrap();
        assert_eq!(res.method_notes, vec!["yuen".to_string(), "bootstrap_bca".to_string()]);
        assert!(res.ci.0 <= res.effect && res.effect <= res.ci.1, "effect {} ci {:?}", res.effect, res.ci);
        // the outliers would drag a mean-difference interval far above this
        assert!(res.ci.1 < 5.0, "ci {:?}", res.ci);
    }

    #[test]
    fn test_ratio_dispatch() {
        let mut rng = StdRng::seed_from_u64(8);
        let groups = alternating(200);
        let metric: Vec<f64> = groups
            .iter()
            .map(|g| (if g == "A" { 10.0 } else { 12.0 }) + rng.gen_range(-1.0..1.0))
            .collect();
        let ds = Dataset::new(groups, metric).unwrap();
        let mut cfg = AnalysisConfig::new(0.05, MetricType::Ratio);
        cfg.use_fieller = true;
        let res = analyze(&ds, &cfg).unwrap();
        assert_eq!(res.method_notes[0], "fieller");
        assert!((res.effect - 1.2).abs() < 0.05);
    }
}
