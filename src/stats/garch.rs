use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::{AssetSeries, ModelCategory, ModelResult, Signal};
use crate::numeric::{annualization, log_returns, mean, std_dev};
use crate::registry::PricingModel;
use crate::stats::backend::EstimatorBackend;

const MODEL: &str = "garch";
const PARAMS: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GarchSettings {
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
    pub forecast_horizon: usize,
    pub min_points: usize,
    pub high_vol_ratio: f64,
    pub low_vol_ratio: f64,
}

impl Default for GarchSettings {
    fn default() -> Self {
        Self {
            omega: 0.00001,
            alpha: 0.1,
            beta: 0.85,
            forecast_horizon: 10,
            min_points: 30,
            high_vol_ratio: 1.5,
            low_vol_ratio: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GarchFit {
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
    /// Daily conditional volatility per observation.
    pub conditional_volatility: Vec<f64>,
    /// Daily volatility forecast, one entry per step.
    pub forecast: Vec<f64>,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
}

impl GarchFit {
    pub fn persistence(&self) -> f64 {
        self.alpha + self.beta
    }

    /// Unconditional daily volatility, or the sample level when the process
    /// is not covariance stationary.
    pub fn long_run_volatility(&self, returns: &[f64]) -> f64 {
        if self.persistence() < 1.0 {
            (self.omega / (1.0 - self.persistence())).sqrt()
        } else {
            std_dev(returns)
        }
    }
}

/// GARCH(1,1) recursion with fixed parameters.
pub fn garch_recursion(
    returns: &[f64],
    omega: f64,
    alpha: f64,
    beta: f64,
    horizon: usize,
) -> Result<GarchFit, ModelError> {
    let n = returns.len();
    let mut vol = Vec::with_capacity(n);
    let initial = if n <= 1 { 0.02 } else { std_dev(returns) };
    vol.push(initial);
    for t in 1..n {
        let prev = vol[t - 1];
        vol.push((omega + alpha * returns[t - 1].powi(2) + beta * prev * prev).sqrt());
    }

    let mut forecast = Vec::with_capacity(horizon);
    let mut last_vol = vol.last().copied().unwrap_or(initial);
    let last_ret = returns.last().copied().unwrap_or(0.0);
    for step in 0..horizon {
        // Past the first step the squared shock is replaced by its expectation.
        let variance = if step == 0 {
            omega + alpha * last_ret * last_ret + beta * last_vol * last_vol
        } else {
            omega + (alpha + beta) * last_vol * last_vol
        };
        let next = variance.sqrt();
        forecast.push(next);
        last_vol = next;
    }

    let log_likelihood = -0.5
        * returns
            .iter()
            .zip(&vol)
            .map(|(r, s)| {
                let var = s * s;
                (2.0 * std::f64::consts::PI * var).ln() + r * r / var
            })
            .sum::<f64>();
    if !log_likelihood.is_finite() || vol.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(ModelError::unstable(MODEL, "degenerate conditional variance"));
    }

    let nf = n.max(1) as f64;
    Ok(GarchFit {
        omega,
        alpha,
        beta,
        conditional_volatility: vol,
        forecast,
        log_likelihood,
        aic: 2.0 * PARAMS - 2.0 * log_likelihood,
        bic: PARAMS * nf.ln() - 2.0 * log_likelihood,
    })
}

#[derive(Debug, Clone)]
pub struct GarchModel {
    settings: GarchSettings,
    backend: EstimatorBackend,
}

impl GarchModel {
    pub fn new(settings: GarchSettings, backend: EstimatorBackend) -> Self {
        Self { settings, backend }
    }

    pub fn fit(&self, returns: &[f64]) -> Result<GarchFit, ModelError> {
        let s = &self.settings;
        match self.backend {
            #[cfg(feature = "fitted")]
            EstimatorBackend::LibraryBacked => {
                let (omega, alpha, beta) = crate::stats::fitted::garch_grid_search(returns)
                    .ok_or_else(|| ModelError::unstable(MODEL, "maximum likelihood search failed"))?;
                garch_recursion(returns, omega, alpha, beta, s.forecast_horizon)
            }
            _ => garch_recursion(returns, s.omega, s.alpha, s.beta, s.forecast_horizon),
        }
    }
}

impl PricingModel for GarchModel {
    fn name(&self) -> &str {
        MODEL
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Ml
    }

    fn min_data_points(&self) -> usize {
        self.settings.min_points
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(MODEL)?;
        let prices = asset.require_points(MODEL, self.settings.min_points)?;
        let returns = log_returns(prices);
        let fit = self.fit(&returns)?;

        let forecast_vol = mean(&fit.forecast);
        let long_run = fit.long_run_volatility(&returns);
        let ratio = if long_run > f64::EPSILON {
            forecast_vol / long_run
        } else {
            1.0
        };
        let signal = if ratio > self.settings.high_vol_ratio {
            Signal::Sell
        } else if ratio < self.settings.low_vol_ratio {
            Signal::Buy
        } else {
            Signal::Hold
        };
        let confidence = match self.backend {
            EstimatorBackend::LibraryBacked => 0.6,
            EstimatorBackend::SimplifiedFallback => 0.45,
        };

        Ok(
            ModelResult::new(MODEL, ModelCategory::Ml, spot, confidence, signal)
                .with("forecast_volatility", forecast_vol * annualization())
                .with("long_run_volatility", long_run * annualization())
                .with("volatility_ratio", ratio)
                .with("omega", fit.omega)
                .with("alpha", fit.alpha)
                .with("beta", fit.beta)
                .with("log_likelihood", fit.log_likelihood)
                .with("aic", fit.aic)
                .with("bic", fit.bic)
                .with("backend", self.backend.as_str()),
        )
    }
}
