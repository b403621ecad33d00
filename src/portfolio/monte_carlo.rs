use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp1, StandardNormal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::model::{AssetSeries, Signal};
use crate::numeric::{cholesky, max_drawdown, mean, percentile_sorted, std_dev, TRADING_DAYS};

use super::estimate::estimate_returns;
use super::optimizer::{equal_weights, portfolio_variance};

const LARGE_LOSS: f64 = -0.2;
const JITTER_ATTEMPTS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloSettings {
    pub num_simulations: usize,
    /// Simulated trading days per path.
    pub time_horizon: usize,
    pub seed: u64,
    pub max_simulations: usize,
    pub min_history: usize,
    pub lookback: usize,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            num_simulations: 1000,
            time_horizon: 252,
            seed: 42,
            max_simulations: 100_000,
            min_history: 30,
            lookback: 252,
        }
    }
}

impl MonteCarloSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bad = |key: &str, detail: String| ConfigError::InvalidSetting {
            key: format!("monte_carlo.{}", key),
            detail,
        };
        if self.num_simulations == 0 {
            return Err(bad("num_simulations", "must be at least 1".to_string()));
        }
        if self.time_horizon == 0 {
            return Err(bad("time_horizon", "must be at least 1".to_string()));
        }
        if self.max_simulations == 0 {
            return Err(bad("max_simulations", "must be at least 1".to_string()));
        }
        if self.min_history < 3 {
            return Err(bad("min_history", format!("{} is below 3", self.min_history)));
        }
        Ok(())
    }

    fn effective_simulations(&self) -> usize {
        if self.num_simulations > self.max_simulations {
            warn!(
                requested = self.num_simulations,
                cap = self.max_simulations,
                "num_simulations capped"
            );
            self.max_simulations
        } else {
            self.num_simulations
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p25: f64,
    pub p75: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulatedPortfolio {
    pub weights: Vec<f64>,
    pub final_value: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloReport {
    pub asset_symbols: Vec<String>,
    pub num_simulations: usize,
    pub time_horizon: usize,
    pub seed: u64,
    pub mean_final_value: f64,
    pub median_final_value: f64,
    pub std_final_value: f64,
    /// 5th percentile of simulated total returns.
    pub var_95: f64,
    /// 1st percentile of simulated total returns.
    pub var_99: f64,
    pub probability_of_loss: f64,
    pub probability_large_loss: f64,
    /// Percentiles of final portfolio value.
    pub percentiles: Percentiles,
    pub best_portfolio: SimulatedPortfolio,
    pub signal: Signal,
    pub confidence: f64,
    pub skipped: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Random point on the simplex: normalised i.i.d. exponentials.
pub fn random_weights(n: usize, rng: &mut StdRng) -> Vec<f64> {
    let raw: Vec<f64> = (0..n).map(|_| Exp1.sample(rng)).collect();
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return equal_weights(n);
    }
    raw.into_iter().map(|x| x / total).collect()
}

/// Cholesky factor of `cov`, adding growing diagonal jitter until it factors.
fn correlated_factor(cov: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    if let Some(l) = cholesky(cov) {
        return Some(l);
    }
    let scale = (0..cov.len())
        .map(|i| cov[i][i].abs())
        .fold(0.0_f64, f64::max)
        .max(1e-12);
    let mut jitter = scale * 1e-8;
    for _ in 0..JITTER_ATTEMPTS {
        let mut adjusted = cov.to_vec();
        for (i, row) in adjusted.iter_mut().enumerate() {
            row[i] += jitter;
        }
        if let Some(l) = cholesky(&adjusted) {
            return Some(l);
        }
        jitter *= 10.0;
    }
    None
}

fn simulate_one(
    index: usize,
    settings: &MonteCarloSettings,
    daily_mean: &[f64],
    daily_cov: &[Vec<f64>],
    factor: &[Vec<f64>],
) -> SimulatedPortfolio {
    let n = daily_mean.len();
    let mut rng = StdRng::seed_from_u64(settings.seed.wrapping_add(index as u64));
    let weights = random_weights(n, &mut rng);

    let mut path = Vec::with_capacity(settings.time_horizon + 1);
    let mut value = 1.0_f64;
    path.push(value);
    let mut z = vec![0.0; n];
    for _ in 0..settings.time_horizon {
        for zi in z.iter_mut() {
            *zi = StandardNormal.sample(&mut rng);
        }
        let mut daily = 0.0;
        for (i, row) in factor.iter().enumerate() {
            let shock: f64 = row[..=i].iter().zip(&z).map(|(l, zj)| l * zj).sum();
            daily += weights[i] * (daily_mean[i] + shock);
        }
        value *= 1.0 + daily;
        path.push(value);
    }

    let annualized_return = if value > 0.0 {
        value.powf(TRADING_DAYS / settings.time_horizon as f64) - 1.0
    } else {
        -1.0
    };
    let volatility = portfolio_variance(&weights, daily_cov).max(0.0).sqrt() * TRADING_DAYS.sqrt();
    let sharpe_ratio = if volatility > 0.0 {
        annualized_return / volatility
    } else {
        0.0
    };
    SimulatedPortfolio {
        weights,
        final_value: value,
        annualized_return,
        volatility,
        sharpe_ratio,
        max_drawdown: max_drawdown(&path),
    }
}

fn failed_report(
    assets: &[AssetSeries],
    settings: &MonteCarloSettings,
    skipped: Vec<String>,
    error: String,
) -> MonteCarloReport {
    MonteCarloReport {
        asset_symbols: assets.iter().map(|a| a.symbol.clone()).collect(),
        num_simulations: 0,
        time_horizon: settings.time_horizon,
        seed: settings.seed,
        mean_final_value: 1.0,
        median_final_value: 1.0,
        std_final_value: 0.0,
        var_95: 0.0,
        var_99: 0.0,
        probability_of_loss: 0.0,
        probability_large_loss: 0.0,
        percentiles: Percentiles::default(),
        best_portfolio: SimulatedPortfolio::default(),
        signal: Signal::Hold,
        confidence: 0.0,
        skipped,
        error: Some(error),
    }
}

/// Simulates random long-only portfolios over correlated normal daily
/// returns. Simulation `i` draws from its own RNG seeded with `seed + i`, so
/// the report does not depend on how rayon schedules the work.
pub fn simulate(assets: &[AssetSeries], settings: &MonteCarloSettings) -> MonteCarloReport {
    let estimates = estimate_returns(assets, settings.min_history, settings.lookback);
    if estimates.is_empty() {
        return failed_report(
            assets,
            settings,
            estimates.skipped,
            "no asset has enough valid history for simulation".to_string(),
        );
    }
    if settings.time_horizon == 0 {
        return failed_report(
            assets,
            settings,
            estimates.skipped,
            "time_horizon must be at least 1".to_string(),
        );
    }
    let Some(factor) = correlated_factor(&estimates.daily_covariance) else {
        return failed_report(
            assets,
            settings,
            estimates.skipped,
            "covariance matrix could not be factorised".to_string(),
        );
    };

    let count = settings.effective_simulations();
    let runs: Vec<SimulatedPortfolio> = (0..count)
        .into_par_iter()
        .map(|i| {
            simulate_one(
                i,
                settings,
                &estimates.daily_mean,
                &estimates.daily_covariance,
                &factor,
            )
        })
        .collect();

    let finals: Vec<f64> = runs.iter().map(|r| r.final_value).collect();
    let mut sorted_finals = finals.clone();
    sorted_finals.sort_by(|a, b| a.total_cmp(b));
    let sorted_returns: Vec<f64> = sorted_finals.iter().map(|v| v - 1.0).collect();

    let mean_final_value = mean(&finals);
    let std_final_value = std_dev(&finals);
    let probability_of_loss = finals.iter().filter(|v| **v < 1.0).count() as f64 / count as f64;
    let probability_large_loss =
        finals.iter().filter(|v| **v - 1.0 < LARGE_LOSS).count() as f64 / count as f64;

    let best_portfolio = runs
        .iter()
        .filter(|r| r.sharpe_ratio.is_finite())
        .max_by(|a, b| a.sharpe_ratio.total_cmp(&b.sharpe_ratio))
        .cloned()
        .unwrap_or_default();

    let signal = if mean_final_value > 1.1 && probability_of_loss < 0.3 {
        Signal::Buy
    } else if mean_final_value > 1.0 && probability_of_loss < 0.5 {
        Signal::Hold
    } else {
        Signal::Sell
    };
    let confidence = if mean_final_value > 0.0 {
        (1.0 - std_final_value / mean_final_value).clamp(0.3, 0.8)
    } else {
        0.3
    };

    MonteCarloReport {
        asset_symbols: estimates.symbols,
        num_simulations: count,
        time_horizon: settings.time_horizon,
        seed: settings.seed,
        mean_final_value,
        median_final_value: percentile_sorted(&sorted_finals, 50.0),
        std_final_value,
        var_95: percentile_sorted(&sorted_returns, 5.0),
        var_99: percentile_sorted(&sorted_returns, 1.0),
        probability_of_loss,
        probability_large_loss,
        percentiles: Percentiles {
            p5: percentile_sorted(&sorted_finals, 5.0),
            p25: percentile_sorted(&sorted_finals, 25.0),
            p75: percentile_sorted(&sorted_finals, 75.0),
            p95: percentile_sorted(&sorted_finals, 95.0),
        },
        best_portfolio,
        signal,
        confidence,
        skipped: estimates.skipped,
        error: None,
    }
}
