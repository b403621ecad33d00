//! One-step-ahead price predictors. Each refits on every call; no model
//! state survives between requests.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::{AssetSeries, ModelCategory, ModelResult, Signal};
use crate::numeric::{linear_trend, log_returns, mean, sample_std, std_dev};
use crate::registry::PricingModel;
use crate::stats::backend::EstimatorBackend;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceSettings {
    pub sequence_length: usize,
    pub ridge_lambda: f64,
    pub validation_split: f64,
    pub boosting_rounds: usize,
    pub learning_rate: f64,
    pub ewma_alpha: f64,
    /// Minimum absolute one-step log return for a directional signal.
    pub signal_threshold: f64,
}

impl Default for SequenceSettings {
    fn default() -> Self {
        Self {
            sequence_length: 30,
            ridge_lambda: 1e-3,
            validation_split: 0.2,
            boosting_rounds: 50,
            learning_rate: 0.1,
            ewma_alpha: 0.1,
            signal_threshold: 0.001,
        }
    }
}

/// Point forecast of the next log return plus its heuristic confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnForecast {
    pub expected_return: f64,
    pub confidence: f64,
    pub directional_accuracy: Option<f64>,
}

fn to_result(
    model: &str,
    spot: f64,
    forecast: ReturnForecast,
    settings: &SequenceSettings,
    backend: EstimatorBackend,
) -> Result<ModelResult, ModelError> {
    if !forecast.expected_return.is_finite() {
        return Err(ModelError::unstable(model, "non-finite return forecast"));
    }
    let mut result = ModelResult::new(
        model,
        ModelCategory::Ml,
        spot * forecast.expected_return.exp(),
        forecast.confidence,
        Signal::from_deviation(forecast.expected_return, settings.signal_threshold),
    )
    .with("expected_return", forecast.expected_return)
    .with("backend", backend.as_str());
    if let Some(acc) = forecast.directional_accuracy {
        result = result.with("directional_accuracy", acc);
    }
    Ok(result)
}

/// Z-scored returns with the moments needed to undo the scaling.
#[derive(Debug, Clone)]
pub struct Standardized {
    pub values: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl Standardized {
    pub fn new(returns: &[f64]) -> Self {
        let m = mean(returns);
        let s = std_dev(returns).max(1e-12);
        Self {
            values: returns.iter().map(|r| (r - m) / s).collect(),
            mean: m,
            std: s,
        }
    }

    pub fn restore(&self, z: f64) -> f64 {
        z * self.std + self.mean
    }
}

/// Sliding windows of length `len` paired with the value that follows each.
pub fn sequence_windows(values: &[f64], len: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    if values.len() <= len {
        return (Vec::new(), Vec::new());
    }
    let mut rows = Vec::with_capacity(values.len() - len);
    let mut targets = Vec::with_capacity(values.len() - len);
    for i in 0..(values.len() - len) {
        rows.push(values[i..i + len].to_vec());
        targets.push(values[i + len]);
    }
    (rows, targets)
}

#[cfg_attr(not(feature = "fitted"), allow(dead_code))]
fn directional_accuracy(predicted: &[f64], actual: &[f64]) -> f64 {
    if predicted.is_empty() {
        return 0.5;
    }
    let hits = predicted
        .iter()
        .zip(actual)
        .filter(|(p, a)| p.signum() == a.signum())
        .count();
    hits as f64 / predicted.len() as f64
}

#[cfg_attr(not(feature = "fitted"), allow(dead_code))]
fn split_index(rows: usize, validation_split: f64) -> usize {
    let val = ((rows as f64) * validation_split.clamp(0.05, 0.5)).ceil() as usize;
    rows.saturating_sub(val.max(1)).max(1)
}

/// Recurrent-style sequence model: ridge autoregression over normalised
/// return windows when fitted, linear price trend otherwise.
#[derive(Debug, Clone)]
pub struct SequencePredictor {
    settings: SequenceSettings,
    backend: EstimatorBackend,
}

impl SequencePredictor {
    pub fn new(settings: SequenceSettings, backend: EstimatorBackend) -> Self {
        Self { settings, backend }
    }

    pub fn forecast(&self, prices: &[f64]) -> Result<ReturnForecast, ModelError> {
        match self.backend {
            #[cfg(feature = "fitted")]
            EstimatorBackend::LibraryBacked => self.forecast_fitted(prices),
            _ => Ok(self.forecast_trend(prices)),
        }
    }

    fn forecast_trend(&self, prices: &[f64]) -> ReturnForecast {
        let len = self.settings.sequence_length.min(prices.len());
        let window = &prices[prices.len() - len..];
        let (slope, intercept, r2) = linear_trend(window);
        let next = intercept + slope * len as f64;
        let last = window[len - 1];
        let expected_return = if next > 0.0 { (next / last).ln() } else { 0.0 };
        ReturnForecast {
            expected_return,
            confidence: (0.3 + 0.5 * r2.max(0.0)).clamp(0.3, 0.8),
            directional_accuracy: None,
        }
    }

    #[cfg(feature = "fitted")]
    fn forecast_fitted(&self, prices: &[f64]) -> Result<ReturnForecast, ModelError> {
        use crate::stats::fitted::ridge_fit;

        let len = self.settings.sequence_length;
        let z = Standardized::new(&log_returns(prices));
        let (rows, targets) = sequence_windows(&z.values, len);
        if rows.len() < 2 {
            return Err(ModelError::insufficient("lstm", len + 10, prices.len()));
        }
        let split = split_index(rows.len(), self.settings.validation_split);
        let coef = ridge_fit(&rows[..split], &targets[..split], self.settings.ridge_lambda)
            .ok_or_else(|| ModelError::unstable("lstm", "singular ridge system"))?;
        let predict = |row: &[f64]| row.iter().zip(&coef).map(|(x, c)| x * c).sum::<f64>();

        let val_pred: Vec<f64> = rows[split..].iter().map(|r| predict(r)).collect();
        let val_actual = &targets[split..];
        let accuracy = directional_accuracy(&val_pred, val_actual);
        let errors: Vec<f64> = val_pred.iter().zip(val_actual).map(|(p, a)| p - a).collect();
        let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / errors.len().max(1) as f64).sqrt();

        let latest = &z.values[z.values.len() - len..];
        let expected_return = z.restore(predict(latest));
        // rmse is in z units, so 1.0 means no better than the unconditional mean.
        let confidence = (0.3 + 1.2 * (accuracy - 0.5).max(0.0) + 0.2 * (1.0 - rmse.min(1.0)))
            .clamp(0.3, 0.9);
        Ok(ReturnForecast {
            expected_return,
            confidence,
            directional_accuracy: Some(accuracy),
        })
    }
}

impl PricingModel for SequencePredictor {
    fn name(&self) -> &str {
        "lstm"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Ml
    }

    fn min_data_points(&self) -> usize {
        self.settings.sequence_length + 10
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(self.name())?;
        let prices = asset.require_points(self.name(), self.min_data_points())?;
        let forecast = self.forecast(prices)?;
        to_result(self.name(), spot, forecast, &self.settings, self.backend)
    }
}

const BOOSTED_MIN_POINTS: usize = 60;
const FEATURE_LOOKBACK: usize = 20;

fn rsi(prices: &[f64], period: usize) -> f64 {
    let tail = &prices[prices.len().saturating_sub(period + 1)..];
    let (mut gain, mut loss) = (0.0, 0.0);
    for w in tail.windows(2) {
        let d = w[1] - w[0];
        if d > 0.0 {
            gain += d;
        } else {
            loss -= d;
        }
    }
    if loss <= f64::EPSILON {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + gain / loss)
}

/// Momentum, volatility and RSI features for the close at `t`.
pub fn engineered_features(prices: &[f64], t: usize) -> Vec<f64> {
    let p = prices[t];
    let momentum = |lag: usize| (p / prices[t - lag]).ln();
    let recent = log_returns(&prices[t - 10..=t]);
    vec![
        momentum(5),
        momentum(10),
        momentum(20),
        sample_std(&recent),
        rsi(&prices[..=t], 14) / 100.0 - 0.5,
    ]
}

/// Gradient-boosted trees over engineered features when fitted, drift
/// persistence otherwise.
#[derive(Debug, Clone)]
pub struct BoostedPredictor {
    settings: SequenceSettings,
    backend: EstimatorBackend,
}

impl BoostedPredictor {
    pub fn new(settings: SequenceSettings, backend: EstimatorBackend) -> Self {
        Self { settings, backend }
    }

    pub fn forecast(&self, prices: &[f64]) -> Result<ReturnForecast, ModelError> {
        match self.backend {
            #[cfg(feature = "fitted")]
            EstimatorBackend::LibraryBacked => self.forecast_fitted(prices),
            _ => Ok(self.forecast_persistence(prices)),
        }
    }

    fn forecast_persistence(&self, prices: &[f64]) -> ReturnForecast {
        let tail = &prices[prices.len().saturating_sub(FEATURE_LOOKBACK + 1)..];
        ReturnForecast {
            expected_return: mean(&log_returns(tail)),
            confidence: 0.4,
            directional_accuracy: None,
        }
    }

    #[cfg(feature = "fitted")]
    fn forecast_fitted(&self, prices: &[f64]) -> Result<ReturnForecast, ModelError> {
        use crate::stats::fitted::BoostedStumps;

        let n = prices.len();
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for t in FEATURE_LOOKBACK..(n - 1) {
            rows.push(engineered_features(prices, t));
            targets.push((prices[t + 1] / prices[t]).ln());
        }
        let split = split_index(rows.len(), self.settings.validation_split);
        let model = BoostedStumps::fit(
            &rows[..split],
            &targets[..split],
            self.settings.boosting_rounds,
            self.settings.learning_rate,
        )
        .ok_or_else(|| ModelError::unstable("xgboost", "boosting fit failed"))?;

        let val_pred: Vec<f64> = rows[split..].iter().map(|r| model.predict(r)).collect();
        let accuracy = directional_accuracy(&val_pred, &targets[split..]);
        let expected_return = model.predict(&engineered_features(prices, n - 1));
        Ok(ReturnForecast {
            expected_return,
            confidence: (0.3 + 0.6 * (accuracy - 0.5).max(0.0) * 2.0).clamp(0.3, 0.85),
            directional_accuracy: Some(accuracy),
        })
    }
}

impl PricingModel for BoostedPredictor {
    fn name(&self) -> &str {
        "xgboost"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Ml
    }

    fn min_data_points(&self) -> usize {
        BOOSTED_MIN_POINTS
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(self.name())?;
        let prices = asset.require_points(self.name(), BOOSTED_MIN_POINTS)?;
        let forecast = self.forecast(prices)?;
        to_result(self.name(), spot, forecast, &self.settings, self.backend)
    }
}

/// Attention over historical return windows when fitted, exponentially
/// weighted drift otherwise.
#[derive(Debug, Clone)]
pub struct AttentionPredictor {
    settings: SequenceSettings,
    backend: EstimatorBackend,
}

impl AttentionPredictor {
    pub fn new(settings: SequenceSettings, backend: EstimatorBackend) -> Self {
        Self { settings, backend }
    }

    pub fn forecast(&self, prices: &[f64]) -> Result<ReturnForecast, ModelError> {
        match self.backend {
            #[cfg(feature = "fitted")]
            EstimatorBackend::LibraryBacked => self.forecast_fitted(prices),
            _ => Ok(self.forecast_ewma(prices)),
        }
    }

    fn forecast_ewma(&self, prices: &[f64]) -> ReturnForecast {
        let alpha = self.settings.ewma_alpha.clamp(0.01, 1.0);
        let returns = log_returns(prices);
        let mut level = returns.first().copied().unwrap_or(0.0);
        for r in returns.iter().skip(1) {
            level = alpha * r + (1.0 - alpha) * level;
        }
        ReturnForecast {
            expected_return: level,
            confidence: 0.4,
            directional_accuracy: None,
        }
    }

    #[cfg(feature = "fitted")]
    fn forecast_fitted(&self, prices: &[f64]) -> Result<ReturnForecast, ModelError> {
        use crate::stats::fitted::attend;

        let len = self.settings.sequence_length;
        let z = Standardized::new(&log_returns(prices));
        let (keys, values) = sequence_windows(&z.values, len);
        if keys.is_empty() {
            return Err(ModelError::insufficient("transformer", len + 10, prices.len()));
        }
        let query = &z.values[z.values.len() - len..];
        let (output, entropy) = attend(&keys, &values, query)
            .ok_or_else(|| ModelError::unstable("transformer", "degenerate attention weights"))?;
        Ok(ReturnForecast {
            expected_return: z.restore(output),
            confidence: (0.35 + 0.5 * (1.0 - entropy)).clamp(0.3, 0.85),
            directional_accuracy: None,
        })
    }
}

impl PricingModel for AttentionPredictor {
    fn name(&self) -> &str {
        "transformer"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Ml
    }

    fn min_data_points(&self) -> usize {
        self.settings.sequence_length + 10
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(self.name())?;
        let prices = asset.require_points(self.name(), self.min_data_points())?;
        let forecast = self.forecast(prices)?;
        to_result(self.name(), spot, forecast, &self.settings, self.backend)
    }
}
