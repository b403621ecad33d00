//! ndarray-backed estimators used when the `fitted` feature is enabled.

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::numeric::{percentile, solve_linear};

fn to_matrix(rows: &[Vec<f64>]) -> Option<Array2<f64>> {
    let cols = rows.first()?.len();
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Array2::from_shape_vec((rows.len(), cols), flat).ok()
}

/// Ridge regression coefficients `(XᵀX + λI)⁻¹ Xᵀy`.
pub fn ridge_fit(rows: &[Vec<f64>], y: &[f64], lambda: f64) -> Option<Vec<f64>> {
    let x = to_matrix(rows)?;
    let y = Array1::from(y.to_vec());
    let p = x.ncols();
    let gram = x.t().dot(&x) + &(Array2::<f64>::eye(p) * lambda);
    let rhs = x.t().dot(&y);
    let a: Vec<Vec<f64>> = gram.outer_iter().map(|r| r.to_vec()).collect();
    solve_linear(a, rhs.to_vec())
}

#[derive(Debug, Clone, Copy)]
struct Stump {
    feature: usize,
    threshold: f64,
    left: f64,
    right: f64,
}

impl Stump {
    fn predict(&self, row: ArrayView1<f64>) -> f64 {
        if row[self.feature] <= self.threshold {
            self.left
        } else {
            self.right
        }
    }
}

/// Gradient-boosted regression stumps under squared loss.
#[derive(Debug, Clone)]
pub struct BoostedStumps {
    base: f64,
    learning_rate: f64,
    stumps: Vec<Stump>,
}

impl BoostedStumps {
    pub fn fit(rows: &[Vec<f64>], y: &[f64], rounds: usize, learning_rate: f64) -> Option<Self> {
        let x = to_matrix(rows)?;
        let y = Array1::from(y.to_vec());
        let base = y.mean()?;
        let mut fitted = Array1::from_elem(y.len(), base);
        let mut stumps = Vec::with_capacity(rounds);

        let thresholds: Vec<Vec<f64>> = x
            .axis_iter(Axis(1))
            .map(|col| {
                let values = col.to_vec();
                (1..10).map(|k| percentile(&values, k as f64 * 10.0)).collect()
            })
            .collect();

        for _ in 0..rounds {
            let residual = &y - &fitted;
            let mut best: Option<(f64, Stump)> = None;
            for (feature, cuts) in thresholds.iter().enumerate() {
                let col = x.column(feature);
                for &threshold in cuts {
                    let (mut ls, mut ln, mut rs, mut rn) = (0.0, 0usize, 0.0, 0usize);
                    for (v, r) in col.iter().zip(residual.iter()) {
                        if *v <= threshold {
                            ls += r;
                            ln += 1;
                        } else {
                            rs += r;
                            rn += 1;
                        }
                    }
                    if ln == 0 || rn == 0 {
                        continue;
                    }
                    // Reduction in squared error from splitting at this threshold.
                    let gain = ls * ls / ln as f64 + rs * rs / rn as f64;
                    if best.map(|(g, _)| gain > g).unwrap_or(true) {
                        best = Some((
                            gain,
                            Stump {
                                feature,
                                threshold,
                                left: ls / ln as f64,
                                right: rs / rn as f64,
                            },
                        ));
                    }
                }
            }
            let Some((_, stump)) = best else {
                break;
            };
            for (i, row) in x.outer_iter().enumerate() {
                fitted[i] += learning_rate * stump.predict(row);
            }
            stumps.push(stump);
        }

        Some(Self {
            base,
            learning_rate,
            stumps,
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let view = ArrayView1::from(row);
        self.base
            + self
                .stumps
                .iter()
                .map(|s| self.learning_rate * s.predict(view))
                .sum::<f64>()
    }
}

/// Scaled dot-product attention of `query` over `keys`, returning the
/// attention-weighted value and the normalised attention entropy.
pub fn attend(keys: &[Vec<f64>], values: &[f64], query: &[f64]) -> Option<(f64, f64)> {
    let k = to_matrix(keys)?;
    let q = Array1::from(query.to_vec());
    let scale = (q.len() as f64).sqrt();
    let scores = k.dot(&q) / scale;
    let max = scores.fold(f64::NEG_INFINITY, |m, v| m.max(*v));
    let exp = scores.mapv(|s| (s - max).exp());
    let total = exp.sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    let weights = exp / total;
    let v = Array1::from(values.to_vec());
    let output = weights.dot(&v);
    let entropy = -weights
        .iter()
        .filter(|w| **w > 0.0)
        .map(|w| w * w.ln())
        .sum::<f64>();
    let max_entropy = (weights.len() as f64).ln();
    let normalised = if max_entropy > 0.0 {
        entropy / max_entropy
    } else {
        1.0
    };
    Some((output, normalised))
}

/// Variance-targeted GARCH(1,1) grid search; returns `(omega, alpha, beta)`.
pub fn garch_grid_search(returns: &[f64]) -> Option<(f64, f64, f64)> {
    let r = Array1::from(returns.to_vec());
    let r2 = r.mapv(|v| v * v);
    let variance = r.var(0.0);
    if variance <= 0.0 || !variance.is_finite() {
        return None;
    }

    let mut best: Option<(f64, (f64, f64, f64))> = None;
    for ai in 1..=15 {
        let alpha = ai as f64 * 0.02;
        for bi in 50..=97 {
            let beta = bi as f64 * 0.01;
            if alpha + beta >= 0.999 {
                continue;
            }
            let omega = variance * (1.0 - alpha - beta);
            let mut sigma2 = variance;
            let mut ll = 0.0;
            for t in 0..r2.len() {
                if t > 0 {
                    sigma2 = omega + alpha * r2[t - 1] + beta * sigma2;
                }
                ll -= 0.5 * ((2.0 * std::f64::consts::PI * sigma2).ln() + r2[t] / sigma2);
            }
            if ll.is_finite() && best.map(|(b, _)| ll > b).unwrap_or(true) {
                best = Some((ll, (omega, alpha, beta)));
            }
        }
    }
    best.map(|(_, params)| params)
}
