//! Multiple-testing correction across a family of p-values.
//! Adjusted values are returned in the caller's original order.

use crate::config::MultipleTesting;

/// Indices of `pvals` in ascending p order (stable for ties)
fn ascending_order(pvals: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..pvals.len()).collect();
    order.sort_by(|&i, &j| pvals[i].total_cmp(&pvals[j]));
    order
}

fn scatter(order: &[usize], sorted_adj: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; order.len()];
    for (rank, &orig) in order.iter().enumerate() {
        out[orig] = sorted_adj[rank];
    }
    out
}

/// Holm step-down adjustment (family-wise error rate)
pub fn holm(pvals: &[f64]) -> Vec<f64> {
    let m = pvals.len();
    let order = ascending_order(pvals);
    let mut adj = Vec::with_capacity(m);
    let mut running = 0.0_f64;
    for (i, &idx) in order.iter().enumerate() {
        let val = ((m - i) as f64 * pvals[idx]).min(1.0);
        running = running.max(val);
        adj.push(running);
    }
    scatter(&order, &adj)
}

/// Benjamini-Yekutieli step-up adjustment (FDR under arbitrary dependence)
pub fn benjamini_yekutieli(pvals: &[f64]) -> Vec<f64> {
    let m = pvals.len();
    if m == 0 {
        return Vec::new();
    }
    let order = ascending_order(pvals);
    let c_m: f64 = (1..=m).map(|i| 1.0 / i as f64).sum();

    let mut adj = vec![0.0; m];
    let mut prev = 1.0_f64;
    for i in (0..m).rev() {
        let rank = (i + 1) as f64;
        let val = (pvals[order[i]] * m as f64 * c_m / rank).min(1.0);
        prev = prev.min(val);
        adj[i] = prev;
    }
    scatter(&order, &adj)
}

/// Apply the configured correction; `None` returns the raw values
pub fn adjust(method: MultipleTesting, pvals: &[f64]) -> Vec<f64> {
    match method {
        MultipleTesting::None => pvals.to_vec(),
        MultipleTesting::Holm => holm(pvals),
        MultipleTesting::By => benjamini_yekutieli(pvals),
    }
}
