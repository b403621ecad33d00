use serde::Serialize;

use crate::model::AssetSeries;
use crate::numeric::{covariance_matrix, log_returns, mean, TRADING_DAYS};

/// Markowitz inputs for the assets that had enough usable history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnEstimates {
    pub symbols: Vec<String>,
    /// Aligned daily log returns, one row per asset.
    pub daily_returns: Vec<Vec<f64>>,
    pub daily_mean: Vec<f64>,
    pub daily_covariance: Vec<Vec<f64>>,
    pub expected_returns: Vec<f64>,
    pub covariance: Vec<Vec<f64>>,
    pub skipped: Vec<String>,
}

impl ReturnEstimates {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn volatilities(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| self.covariance[i][i].max(0.0).sqrt())
            .collect()
    }
}

fn usable(prices: &[f64]) -> bool {
    prices.iter().all(|p| p.is_finite() && *p > 0.0)
}

/// Log returns over the last `lookback` observations, aligned to the
/// shortest series. Assets with fewer than `min_history` prices are skipped.
pub fn estimate_returns(assets: &[AssetSeries], min_history: usize, lookback: usize) -> ReturnEstimates {
    let mut symbols = Vec::new();
    let mut series = Vec::new();
    let mut skipped = Vec::new();

    for asset in assets {
        let prices = &asset.historical_prices;
        if prices.len() < min_history.max(2) || !usable(prices) {
            skipped.push(asset.symbol.clone());
            continue;
        }
        let returns = log_returns(prices);
        let start = returns.len().saturating_sub(lookback.max(1));
        series.push(returns[start..].to_vec());
        symbols.push(asset.symbol.clone());
    }

    let aligned = series.iter().map(Vec::len).min().unwrap_or(0);
    let daily_returns: Vec<Vec<f64>> = series
        .into_iter()
        .map(|r| r[r.len() - aligned..].to_vec())
        .collect();

    let daily_mean: Vec<f64> = daily_returns.iter().map(|r| mean(r)).collect();
    let daily_covariance = covariance_matrix(&daily_returns);
    let expected_returns = daily_mean.iter().map(|m| m * TRADING_DAYS).collect();
    let covariance = daily_covariance
        .iter()
        .map(|row| row.iter().map(|c| c * TRADING_DAYS).collect())
        .collect();

    ReturnEstimates {
        symbols,
        daily_returns,
        daily_mean,
        daily_covariance,
        expected_returns,
        covariance,
        skipped,
    }
}
