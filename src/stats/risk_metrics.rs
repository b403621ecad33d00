use serde::Serialize;

use crate::error::ModelError;
use crate::model::{AssetSeries, ModelCategory, ModelResult, Signal};
use crate::numeric::{annualization, max_drawdown, mean, percentile, simple_returns, std_dev, TRADING_DAYS};
use crate::registry::PricingModel;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RiskMetrics {
    /// Daily historical VaR at 95%, as a (usually negative) return.
    pub var_95: f64,
    /// Mean of the returns at or below `var_95`.
    pub cvar_95: f64,
    pub max_drawdown: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
}

pub fn risk_metrics(prices: &[f64], risk_free_rate: f64) -> RiskMetrics {
    if prices.len() < 2 {
        return RiskMetrics::default();
    }
    let returns = simple_returns(prices);
    let var_95 = percentile(&returns, 5.0);
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var_95).collect();
    let cvar_95 = if tail.is_empty() { var_95 } else { mean(&tail) };

    let annualized_return = mean(&returns) * TRADING_DAYS;
    let annualized_volatility = std_dev(&returns) * annualization();
    let sharpe_ratio = if annualized_volatility > f64::EPSILON {
        (annualized_return - risk_free_rate) / annualized_volatility
    } else {
        0.0
    };

    let downside: Vec<f64> = returns.iter().map(|r| r.min(0.0)).collect();
    let downside_dev =
        (downside.iter().map(|d| d * d).sum::<f64>() / downside.len() as f64).sqrt() * annualization();
    let sortino_ratio = if downside_dev > f64::EPSILON {
        (annualized_return - risk_free_rate) / downside_dev
    } else {
        0.0
    };

    RiskMetrics {
        var_95,
        cvar_95,
        max_drawdown: max_drawdown(prices),
        annualized_return,
        annualized_volatility,
        sharpe_ratio,
        sortino_ratio,
    }
}

#[derive(Debug, Clone, Default)]
pub struct RiskMetricsModel;

impl PricingModel for RiskMetricsModel {
    fn name(&self) -> &str {
        "risk_metrics"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Technical
    }

    fn min_data_points(&self) -> usize {
        30
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(self.name())?;
        let prices = asset.require_points(self.name(), self.min_data_points())?;
        let m = risk_metrics(prices, asset.fundamentals.market.risk_free_rate);
        if !m.sharpe_ratio.is_finite() {
            return Err(ModelError::unstable(self.name(), "non-finite Sharpe ratio"));
        }
        let signal = if m.sharpe_ratio > 1.0 {
            Signal::Buy
        } else if m.sharpe_ratio < 0.0 {
            Signal::Sell
        } else {
            Signal::Hold
        };
        Ok(
            ModelResult::new(self.name(), ModelCategory::Technical, spot, 0.6, signal)
                .with("var_95", m.var_95)
                .with("cvar_95", m.cvar_95)
                .with("max_drawdown", m.max_drawdown)
                .with("annualized_return", m.annualized_return)
                .with("annualized_volatility", m.annualized_volatility)
                .with("sharpe_ratio", m.sharpe_ratio)
                .with("sortino_ratio", m.sortino_ratio),
        )
    }
}
