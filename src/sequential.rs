//! Group-sequential testing with alpha spending
//!
//! A plan splits the total alpha across `k` interim looks. The decision
//! walks the caller's p-value history look by look and stops at the first
//! look whose p-value is at or below that look's budget. The history is an
//! explicit value: callers pass it in and receive the updated list back.

use serde::{Deserialize, Serialize};

use crate::binomial::binomial_test;
use crate::config::{SequentialPreset, Sidedness};
use crate::distributions::{normal_quantile, normal_sf};
use crate::error::{check_alpha, AbError, Result};

// ============================================================================
// PLAN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialPlan {
    pub k: usize,
    pub alpha: f64,
    pub preset: SequentialPreset,
    /// Significance budget of each look; sums to alpha
    pub thresholds: Vec<f64>,
    /// Alpha spent through each look; non-decreasing, ends at alpha
    pub cumulative: Vec<f64>,
}

/// Equal budget alpha / k at every look
pub fn pocock_thresholds(k: usize, alpha: f64) -> Vec<f64> {
    vec![alpha / k as f64; k]
}

/// Lan-DeMets O'Brien-Fleming-type spending, A(t) = 2 * (1 - Phi(z_{alpha/2} / sqrt(t))),
/// with increments rescaled to sum to alpha exactly. The tail is taken from
/// the survival function so early looks stay positive for large k.
pub fn obf_thresholds(k: usize, alpha: f64) -> Vec<f64> {
    let z = normal_quantile(1.0 - alpha / 2.0);
    let mut thresholds = Vec::with_capacity(k);
    let mut prev = 0.0;
    for i in 1..=k {
        let t = i as f64 / k as f64;
        let cum = 2.0 * normal_sf(z / t.sqrt());
        thresholds.push((cum - prev).max(0.0));
        prev = cum;
    }
    let total: f64 = thresholds.iter().sum();
    if total > 0.0 {
        for th in thresholds.iter_mut() {
            *th *= alpha / total;
        }
    }
    thresholds
}

fn cumulative_spend(thresholds: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(thresholds.len());
    let mut acc = 0.0;
    for th in thresholds.iter().take(thresholds.len().saturating_sub(1)) {
        acc += th;
        out.push(acc.min(alpha));
    }
    if !thresholds.is_empty() {
        out.push(alpha);
    }
    out
}

pub fn make_sequential_plan(k: usize, alpha: f64, preset: SequentialPreset) -> Result<SequentialPlan> {
    if k < 1 {
        return Err(AbError::invalid("number of looks must be >= 1"));
    }
    check_alpha(alpha)?;
    let thresholds = match preset {
        SequentialPreset::Pocock => pocock_thresholds(k, alpha),
        SequentialPreset::Obf => obf_thresholds(k, alpha),
    };
    let cumulative = cumulative_spend(&thresholds, alpha);
    Ok(SequentialPlan { k, alpha, preset, thresholds, cumulative })
}

// ============================================================================
// DECISION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialDecision {
    pub stop: bool,
    /// 1-based look the decision refers to
    pub look: usize,
    pub threshold: f64,
    pub spent_alpha_cum: f64,
    pub preset: SequentialPreset,
}

/// Stop at the first look i with history[i] <= thresholds[i].
///
/// Only the first `k` entries count. Without a stop the decision refers to
/// the latest observed look, so a full history yields look = k with the
/// whole alpha spent.
pub fn sequential_decision(history: &[f64], plan: &SequentialPlan) -> Result<SequentialDecision> {
    if history.is_empty() {
        return Err(AbError::invalid("sequential history must hold at least one p-value"));
    }
    let looks = history.len().min(plan.k);
    for i in 0..looks {
        if history[i] <= plan.thresholds[i] {
            return Ok(SequentialDecision {
                stop: true,
                look: i + 1,
                threshold: plan.thresholds[i],
                spent_alpha_cum: plan.cumulative[i],
                preset: plan.preset,
            });
        }
    }
    Ok(SequentialDecision {
        stop: false,
        look: looks,
        threshold: plan.thresholds[looks - 1],
        spent_alpha_cum: plan.cumulative[looks - 1],
        preset: plan.preset,
    })
}

/// Append this look's p-value, unless it repeats the last recorded one
pub fn append_history(history: &[f64], p_value: f64) -> Vec<f64> {
    let mut out = history.to_vec();
    if out.last() != Some(&p_value) {
        out.push(p_value);
    }
    out
}

// ============================================================================
// STOP NOTIFICATION
// ============================================================================

/// Early-stop event handed to a notifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopEvent {
    pub look: usize,
    pub p_value: f64,
    pub threshold: f64,
    pub spent_alpha_cum: f64,
    pub preset: SequentialPreset,
}

impl StopEvent {
    pub fn message(&self) -> String {
        format!(
            "Sequential test ({}) stopped at look {} p={:.4}",
            self.preset, self.look, self.p_value
        )
    }
}

/// Fire-and-forget sink for early stops. Implementations must not block;
/// the engine ignores whatever the sink does with the event.
pub trait StopNotifier: Send + Sync {
    fn on_stop(&self, event: &StopEvent);
}

impl<F> StopNotifier for F
where
    F: Fn(&StopEvent) + Send + Sync,
{
    fn on_stop(&self, event: &StopEvent) {
        self(event)
    }
}

// ============================================================================
// LOOK REPLAY
// ============================================================================

/// One interim look reconstructed from cumulative counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookStep {
    pub look: usize,
    pub users_a: u64,
    pub conv_a: u64,
    pub users_b: u64,
    pub conv_b: u64,
    pub p_value: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookReplay {
    pub plan: SequentialPlan,
    pub steps: Vec<LookStep>,
    pub decision: Option<SequentialDecision>,
}

/// Replay final binomial counts as `looks` evenly spaced interim analyses.
///
/// Look i sees floor(n * i / k) users and round(x * i / k) conversions per
/// arm; looks with an empty arm are skipped. The notifier fires once, on
/// the stopping look.
pub fn replay_looks(
    users_a: u64,
    conv_a: u64,
    users_b: u64,
    conv_b: u64,
    alpha: f64,
    looks: usize,
    preset: SequentialPreset,
    notifier: Option<&dyn StopNotifier>,
) -> Result<LookReplay> {
    let plan = make_sequential_plan(looks, alpha, preset)?;
    if conv_a > users_a || conv_b > users_b {
        return Err(AbError::invalid("conversions must not exceed users"));
    }

    let mut steps = Vec::new();
    let mut decision = None;
    for i in 1..=looks {
        let frac = |v: u64| v * i as u64 / looks as u64;
        let round_frac = |v: u64| ((v as f64 * i as f64 / looks as f64) + 0.5).floor() as u64;
        let (na, nb) = (frac(users_a), frac(users_b));
        if na == 0 || nb == 0 {
            continue;
        }
        let (ca, cb) = (round_frac(conv_a).min(na), round_frac(conv_b).min(nb));
        let res = binomial_test(ca, na, cb, nb, alpha, Sidedness::Two)?;
        let threshold = plan.thresholds[i - 1];
        steps.push(LookStep {
            look: i,
            users_a: na,
            conv_a: ca,
            users_b: nb,
            conv_b: cb,
            p_value: res.p_value,
            threshold,
        });

        let stop = res.p_value <= threshold;
        if stop || i == looks {
            let d = SequentialDecision {
                stop,
                look: i,
                threshold,
                spent_alpha_cum: plan.cumulative[i - 1],
                preset,
            };
            if stop {
                let event = StopEvent {
                    look: i,
                    p_value: res.p_value,
                    threshold,
                    spent_alpha_cum: d.spent_alpha_cum,
                    preset,
                };
                tracing::info!(look = i, p_value = res.p_value, threshold, "sequential replay stopped early");
                if let Some(n) = notifier {
                    n.on_stop(&event);
                }
            }
            decision = Some(d);
            break;
        }
    }

    Ok(LookReplay { plan, steps, decision })
}
