use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::{AssetSeries, ModelCategory, ModelResult, Signal};
use crate::numeric::{least_squares, mean, std_dev};
use crate::registry::PricingModel;

const PUELL_WINDOW: usize = 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoSettings {
    pub s2f_slope: f64,
    pub s2f_intercept: f64,
    pub s2f_threshold: f64,
}

impl Default for CryptoSettings {
    fn default() -> Self {
        Self {
            s2f_slope: 3.3,
            s2f_intercept: -15.7,
            s2f_threshold: 0.1,
        }
    }
}

/// `exp(slope * ln(stock / flow) + intercept)`.
pub fn stock_to_flow_price(
    supply: f64,
    annual_issuance: f64,
    settings: &CryptoSettings,
) -> Result<(f64, f64), ModelError> {
    if supply <= 0.0 || annual_issuance <= 0.0 {
        return Err(ModelError::invalid(
            "stock_to_flow",
            "supply and issuance must be positive",
        ));
    }
    let ratio = supply / annual_issuance;
    let price = (settings.s2f_slope * ratio.ln() + settings.s2f_intercept).exp();
    Ok((ratio, price))
}

/// Network value proportional to active addresses squared, calibrated on
/// the aligned price history.
pub fn metcalfe_value(prices: &[f64], addresses: &[f64]) -> Result<f64, ModelError> {
    let n = prices.len().min(addresses.len());
    if n < 10 {
        return Err(ModelError::insufficient("metcalfe_law", 10, n));
    }
    let prices = &prices[prices.len() - n..];
    let addresses = &addresses[addresses.len() - n..];
    let network: Vec<f64> = addresses.iter().map(|a| a * a).collect();
    let mean_network = mean(&network);
    if mean_network <= f64::EPSILON {
        return Err(ModelError::unstable("metcalfe_law", "zero network value"));
    }
    let scale = mean(prices) / mean_network;
    Ok(scale * network[n - 1])
}

pub fn mvrv_signal(mvrv: f64) -> Signal {
    if mvrv > 3.0 {
        Signal::StrongSell
    } else if mvrv > 2.0 {
        Signal::Sell
    } else if mvrv < 0.8 {
        Signal::StrongBuy
    } else if mvrv < 1.2 {
        Signal::Buy
    } else {
        Signal::Hold
    }
}

pub fn puell_signal(puell: f64) -> Signal {
    if puell > 4.0 {
        Signal::StrongSell
    } else if puell > 2.0 {
        Signal::Sell
    } else if puell < 0.3 {
        Signal::StrongBuy
    } else if puell < 0.5 {
        Signal::Buy
    } else {
        Signal::Hold
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRegressionFit {
    pub coefficients: [f64; 3],
    pub fair_value: f64,
    pub upper_band: f64,
    pub lower_band: f64,
    pub band_position: f64,
    pub residual_std: f64,
}

/// Fits `ln p = a + b ln(t + 1) + c t / 365.25` and evaluates it at the
/// last observation.
pub fn log_regression(prices: &[f64]) -> Result<LogRegressionFit, ModelError> {
    const MODEL: &str = "log_regression";
    if prices.len() < 10 {
        return Err(ModelError::insufficient(MODEL, 10, prices.len()));
    }
    let features = |t: f64| vec![1.0, (t + 1.0).ln(), t / 365.25];
    let rows: Vec<Vec<f64>> = (0..prices.len()).map(|t| features(t as f64)).collect();
    let y: Vec<f64> = prices.iter().map(|p| p.ln()).collect();
    let beta = least_squares(&rows, &y, 1e-9)
        .ok_or_else(|| ModelError::unstable(MODEL, "singular regression"))?;

    let residuals: Vec<f64> = rows
        .iter()
        .zip(&y)
        .map(|(row, v)| v - row.iter().zip(&beta).map(|(x, b)| x * b).sum::<f64>())
        .collect();
    let residual_std = std_dev(&residuals);

    let last = rows.len() - 1;
    let log_fit: f64 = rows[last].iter().zip(&beta).map(|(x, b)| x * b).sum();
    let fair_value = log_fit.exp();
    let upper_band = (log_fit + 2.0 * residual_std).exp();
    let lower_band = (log_fit - 2.0 * residual_std).exp();
    let width = upper_band - lower_band;
    let band_position = if width > f64::EPSILON {
        (prices[last] - fair_value) / width
    } else {
        0.0
    };

    Ok(LogRegressionFit {
        coefficients: [beta[0], beta[1], beta[2]],
        fair_value,
        upper_band,
        lower_band,
        band_position,
        residual_std,
    })
}

#[derive(Debug, Clone, Default)]
pub struct StockToFlowModel {
    settings: CryptoSettings,
}

impl StockToFlowModel {
    pub fn new(settings: CryptoSettings) -> Self {
        Self { settings }
    }
}

impl PricingModel for StockToFlowModel {
    fn name(&self) -> &str {
        "stock_to_flow"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Fundamental
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(self.name())?;
        let chain = asset.onchain(self.name())?;
        let (supply, issuance) = match (chain.circulating_supply, chain.annual_issuance) {
            (Some(s), Some(f)) => (s, f),
            _ => {
                return Err(ModelError::invalid(
                    self.name(),
                    "circulating_supply and annual_issuance are required",
                ))
            }
        };
        let (ratio, price) = stock_to_flow_price(supply, issuance, &self.settings)?;
        let deviation = (price - spot) / spot;
        Ok(ModelResult::new(
            self.name(),
            ModelCategory::Fundamental,
            price,
            0.75,
            Signal::from_deviation(deviation, self.settings.s2f_threshold),
        )
        .with("s2f_ratio", ratio)
        .with("deviation", deviation))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetcalfeModel;

impl PricingModel for MetcalfeModel {
    fn name(&self) -> &str {
        "metcalfe_law"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Fundamental
    }

    fn min_data_points(&self) -> usize {
        10
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(self.name())?;
        let prices = asset.require_points(self.name(), 10)?;
        let chain = asset.onchain(self.name())?;
        let value = metcalfe_value(prices, &chain.active_addresses)?;
        let signal = if value > spot { Signal::Buy } else { Signal::Sell };
        Ok(
            ModelResult::new(self.name(), ModelCategory::Fundamental, value, 0.65, signal)
                .with("premium", (spot - value) / value),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct MvrvModel;

impl PricingModel for MvrvModel {
    fn name(&self) -> &str {
        "mvrv"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Onchain
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(self.name())?;
        let chain = asset.onchain(self.name())?;
        let mvrv = chain
            .mvrv_ratio
            .filter(|m| m.is_finite() && *m > 0.0)
            .ok_or_else(|| ModelError::invalid(self.name(), "mvrv_ratio must be positive"))?;
        Ok(ModelResult::new(
            self.name(),
            ModelCategory::Onchain,
            spot / mvrv,
            0.75,
            mvrv_signal(mvrv),
        )
        .with("mvrv_ratio", mvrv))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PuellMultipleModel;

impl PricingModel for PuellMultipleModel {
    fn name(&self) -> &str {
        "puell_multiple"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Onchain
    }

    fn min_data_points(&self) -> usize {
        30
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(self.name())?;
        let prices = asset.require_points(self.name(), 30)?;
        // Issuance cancels out under a constant schedule, leaving price over its yearly mean.
        let window = &prices[prices.len().saturating_sub(PUELL_WINDOW)..];
        let yearly_mean = mean(window);
        let puell = spot / yearly_mean;
        Ok(ModelResult::new(
            self.name(),
            ModelCategory::Onchain,
            yearly_mean,
            0.6,
            puell_signal(puell),
        )
        .with("puell_multiple", puell)
        .with("window", window.len() as u64))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogRegressionModel;

impl PricingModel for LogRegressionModel {
    fn name(&self) -> &str {
        "log_regression"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Technical
    }

    fn min_data_points(&self) -> usize {
        10
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let prices = asset.require_points(self.name(), 10)?;
        let fit = log_regression(prices)?;
        let signal = if fit.band_position > 0.5 {
            Signal::Sell
        } else if fit.band_position < -0.5 {
            Signal::Buy
        } else {
            Signal::Hold
        };
        Ok(ModelResult::new(
            self.name(),
            ModelCategory::Technical,
            fit.fair_value,
            0.8,
            signal,
        )
        .with("upper_band", fit.upper_band)
        .with("lower_band", fit.lower_band)
        .with("band_position", fit.band_position)
        .with("residual_std", fit.residual_std))
    }
}
