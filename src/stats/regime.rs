use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::{AssetSeries, ModelCategory, ModelResult, Signal};
use crate::numeric::{annualization, log_returns, median, simple_returns, std_dev};
use crate::registry::PricingModel;

const LOW_VOL_THRESHOLD: f64 = 0.3;
const HIGH_VOL_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    LowVolatility,
    Normal,
    HighVolatility,
}

/// Annualized realized volatility of simple returns.
pub fn realized_volatility(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }
    std_dev(&simple_returns(prices)) * annualization()
}

pub fn classify_regime(annualized_volatility: f64) -> MarketRegime {
    if annualized_volatility > HIGH_VOL_THRESHOLD {
        MarketRegime::HighVolatility
    } else if annualized_volatility < LOW_VOL_THRESHOLD {
        MarketRegime::LowVolatility
    } else {
        MarketRegime::Normal
    }
}

const VOL_WINDOW: usize = 20;
const TREND_WINDOW: usize = 50;
const HORIZON_DAYS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolState {
    Calm,
    Turbulent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeState {
    pub state: VolState,
    pub current_volatility: f64,
    pub median_volatility: f64,
    pub daily_drift: f64,
    /// Share of the recent rolling-volatility readings in the current state.
    pub persistence: f64,
}

/// Two-state volatility regime from rolling volatility against its median.
pub fn detect_regime(prices: &[f64]) -> Result<RegimeState, ModelError> {
    let returns = log_returns(prices);
    if returns.len() < VOL_WINDOW + 1 || prices.len() <= TREND_WINDOW {
        return Err(ModelError::insufficient(
            "regime_switching",
            TREND_WINDOW + VOL_WINDOW,
            prices.len(),
        ));
    }
    let rolling: Vec<f64> = returns.windows(VOL_WINDOW).map(std_dev).collect();
    let med = median(&rolling);
    let current = rolling[rolling.len() - 1];
    let state = if current > med {
        VolState::Turbulent
    } else {
        VolState::Calm
    };

    let recent = &rolling[rolling.len().saturating_sub(VOL_WINDOW)..];
    let same = recent
        .iter()
        .filter(|v| (**v > med) == (state == VolState::Turbulent))
        .count();
    let persistence = same as f64 / recent.len() as f64;

    let n = prices.len();
    let daily_drift = (prices[n - 1] / prices[n - 1 - TREND_WINDOW]).ln() / TREND_WINDOW as f64;

    Ok(RegimeState {
        state,
        current_volatility: current * annualization(),
        median_volatility: med * annualization(),
        daily_drift,
        persistence,
    })
}

#[derive(Debug, Clone, Default)]
pub struct RegimeSwitchingModel;

impl PricingModel for RegimeSwitchingModel {
    fn name(&self) -> &str {
        "regime_switching"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Technical
    }

    fn min_data_points(&self) -> usize {
        60
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(self.name())?;
        let prices = asset.require_points(self.name(), self.min_data_points())?;
        let regime = detect_regime(prices)?;

        // Trends are damped in turbulent regimes.
        let damping = match regime.state {
            VolState::Calm => 1.0,
            VolState::Turbulent => 0.5,
        };
        let prediction = spot * (regime.daily_drift * HORIZON_DAYS * damping).exp();
        let signal = match regime.state {
            VolState::Calm if regime.daily_drift > 0.0 => Signal::Buy,
            VolState::Turbulent if regime.daily_drift < 0.0 => Signal::Sell,
            _ => Signal::Hold,
        };
        Ok(ModelResult::new(
            self.name(),
            ModelCategory::Technical,
            prediction,
            (0.4 + 0.4 * regime.persistence).clamp(0.3, 0.8),
            signal,
        )
        .with(
            "state",
            match regime.state {
                VolState::Calm => "calm",
                VolState::Turbulent => "turbulent",
            },
        )
        .with("current_volatility", regime.current_volatility)
        .with("median_volatility", regime.median_volatility)
        .with("daily_drift", regime.daily_drift)
        .with("persistence", regime.persistence))
    }
}
