use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::model::{AssetSeries, Signal};
use crate::numeric::{dot, mat_vec};

use super::estimate::{estimate_returns, ReturnEstimates};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioSettings {
    pub risk_free_rate: f64,
    pub min_history: usize,
    pub lookback: usize,
    /// Risk-parity iteration budget.
    pub iterations: usize,
    pub step: f64,
    pub floor: f64,
    pub tolerance: f64,
}

impl Default for PortfolioSettings {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            min_history: 30,
            lookback: 252,
            iterations: 50,
            step: 0.1,
            floor: 0.01,
            tolerance: 0.01,
        }
    }
}

impl PortfolioSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bad = |key: &str, detail: String| ConfigError::InvalidSetting {
            key: format!("portfolio.{}", key),
            detail,
        };
        if !self.risk_free_rate.is_finite() {
            return Err(bad("risk_free_rate", "must be finite".to_string()));
        }
        if self.min_history < 3 {
            return Err(bad("min_history", format!("{} is below 3", self.min_history)));
        }
        if self.lookback < 2 {
            return Err(bad("lookback", format!("{} is below 2", self.lookback)));
        }
        if !(self.step > 0.0 && self.step <= 1.0) {
            return Err(bad("step", format!("{} is outside (0, 1]", self.step)));
        }
        if !(0.0..0.5).contains(&self.floor) {
            return Err(bad("floor", format!("{} is outside [0, 0.5)", self.floor)));
        }
        if !(self.tolerance > 0.0) {
            return Err(bad("tolerance", format!("{} must be positive", self.tolerance)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMethod {
    EqualWeight,
    RiskParity,
    MaxSharpe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioAllocation {
    pub method: AllocationMethod,
    pub asset_symbols: Vec<String>,
    pub weights: Vec<f64>,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub asset_symbols: Vec<String>,
    pub candidates: Vec<PortfolioAllocation>,
    pub best_method: Option<AllocationMethod>,
    pub weights: Vec<f64>,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub diversification_ratio: f64,
    pub signal: Signal,
    pub confidence: f64,
    pub skipped: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn portfolio_return(weights: &[f64], expected: &[f64]) -> f64 {
    dot(weights, expected)
}

pub fn portfolio_variance(weights: &[f64], cov: &[Vec<f64>]) -> f64 {
    dot(weights, &mat_vec(cov, weights))
}

/// Share of portfolio variance attributable to each asset. Sums to one when
/// the variance is positive.
pub fn risk_contributions(weights: &[f64], cov: &[Vec<f64>]) -> Vec<f64> {
    let variance = portfolio_variance(weights, cov);
    if variance <= 0.0 {
        return vec![0.0; weights.len()];
    }
    let marginal = mat_vec(cov, weights);
    weights
        .iter()
        .zip(marginal)
        .map(|(w, m)| w * m / variance)
        .collect()
}

pub fn equal_weights(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

fn normalize(weights: &mut [f64]) {
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for w in weights.iter_mut() {
            *w /= total;
        }
    }
}

/// Fixed-point equal-risk-contribution heuristic. Not guaranteed to converge
/// on ill-conditioned covariance matrices; the iteration budget bounds it.
pub fn risk_parity_weights(cov: &[Vec<f64>], settings: &PortfolioSettings) -> Vec<f64> {
    let n = cov.len();
    let mut weights = equal_weights(n);
    if n == 0 || portfolio_variance(&weights, cov) <= 0.0 {
        return weights;
    }
    let target = 1.0 / n as f64;
    for iteration in 0..settings.iterations {
        let contrib = risk_contributions(&weights, cov);
        for (w, c) in weights.iter_mut().zip(&contrib) {
            *w = (*w + (target - c) * settings.step).max(settings.floor);
        }
        normalize(&mut weights);

        let worst = contrib
            .iter()
            .map(|c| (c - target).abs())
            .fold(0.0_f64, f64::max);
        if worst < settings.tolerance {
            debug!(iteration, worst, "risk parity converged");
            break;
        }
    }
    weights
}

/// Inverse-volatility weights tilted 30% toward positive excess return.
pub fn sharpe_weights(expected: &[f64], cov: &[Vec<f64>], risk_free_rate: f64) -> Vec<f64> {
    let n = expected.len();
    let vols: Vec<f64> = (0..n).map(|i| cov[i][i].max(0.0).sqrt()).collect();
    if vols.iter().any(|v| *v <= f64::EPSILON || !v.is_finite()) {
        return equal_weights(n);
    }
    let mut inv_vol: Vec<f64> = vols.iter().map(|v| 1.0 / v).collect();
    normalize(&mut inv_vol);

    let mut tilt: Vec<f64> = expected.iter().map(|m| (m - risk_free_rate).max(0.0)).collect();
    let tilt_total: f64 = tilt.iter().sum();
    if tilt_total <= 0.0 {
        return inv_vol;
    }
    normalize(&mut tilt);
    let mut weights: Vec<f64> = inv_vol
        .iter()
        .zip(&tilt)
        .map(|(v, r)| 0.7 * v + 0.3 * r)
        .collect();
    normalize(&mut weights);
    weights
}

fn allocation(
    method: AllocationMethod,
    weights: Vec<f64>,
    estimates: &ReturnEstimates,
    risk_free_rate: f64,
) -> PortfolioAllocation {
    let expected_return = portfolio_return(&weights, &estimates.expected_returns);
    let volatility = portfolio_variance(&weights, &estimates.covariance).max(0.0).sqrt();
    let sharpe_ratio = if volatility > 0.0 {
        (expected_return - risk_free_rate) / volatility
    } else {
        0.0
    };
    PortfolioAllocation {
        method,
        asset_symbols: estimates.symbols.clone(),
        weights,
        expected_return,
        volatility,
        sharpe_ratio,
    }
}

fn fallback_report(assets: &[AssetSeries], skipped: Vec<String>, error: String) -> PortfolioReport {
    PortfolioReport {
        asset_symbols: assets.iter().map(|a| a.symbol.clone()).collect(),
        candidates: Vec::new(),
        best_method: None,
        weights: equal_weights(assets.len()),
        expected_return: 0.0,
        volatility: 0.0,
        sharpe_ratio: 0.0,
        diversification_ratio: 0.0,
        signal: Signal::Hold,
        confidence: 0.0,
        skipped,
        error: Some(error),
    }
}

/// Evaluates equal-weight, risk-parity and max-Sharpe allocations and
/// recommends the one with the highest Sharpe ratio.
pub fn optimize(assets: &[AssetSeries], settings: &PortfolioSettings) -> PortfolioReport {
    let estimates = estimate_returns(assets, settings.min_history, settings.lookback);
    let n = estimates.len();
    if n < 2 {
        return fallback_report(
            assets,
            estimates.skipped,
            format!(
                "need at least 2 assets with {} valid prices, got {}",
                settings.min_history, n
            ),
        );
    }

    let rf = settings.risk_free_rate;
    let candidates = vec![
        allocation(AllocationMethod::EqualWeight, equal_weights(n), &estimates, rf),
        allocation(
            AllocationMethod::RiskParity,
            risk_parity_weights(&estimates.covariance, settings),
            &estimates,
            rf,
        ),
        allocation(
            AllocationMethod::MaxSharpe,
            sharpe_weights(&estimates.expected_returns, &estimates.covariance, rf),
            &estimates,
            rf,
        ),
    ];

    let mut best = &candidates[0];
    for candidate in &candidates[1..] {
        if candidate.sharpe_ratio > best.sharpe_ratio {
            best = candidate;
        }
    }
    let best = best.clone();

    if best.weights.iter().any(|w| !w.is_finite()) || !best.sharpe_ratio.is_finite() {
        return fallback_report(
            assets,
            estimates.skipped,
            "non-finite portfolio statistics".to_string(),
        );
    }

    let concentration: f64 = best.weights.iter().map(|w| w * w).sum();
    let diversification_ratio = if concentration > 0.0 { 1.0 / concentration } else { 0.0 };
    let signal = if best.sharpe_ratio > 1.0 {
        Signal::Buy
    } else if best.sharpe_ratio > 0.5 {
        Signal::Hold
    } else {
        Signal::Sell
    };
    let confidence = ((best.sharpe_ratio + diversification_ratio / n as f64) / 2.0).clamp(0.3, 0.8);

    PortfolioReport {
        asset_symbols: estimates.symbols.clone(),
        best_method: Some(best.method),
        weights: best.weights.clone(),
        expected_return: best.expected_return,
        volatility: best.volatility,
        sharpe_ratio: best.sharpe_ratio,
        diversification_ratio,
        signal,
        confidence,
        candidates,
        skipped: estimates.skipped,
        error: None,
    }
}
