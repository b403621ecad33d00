use serde::Serialize;

use crate::error::ModelError;
use crate::model::{AssetSeries, ModelCategory, ModelResult, Signal};
use crate::numeric::{log_returns, mean, TRADING_DAYS};
use crate::registry::PricingModel;

const MODEL: &str = "capm";
const MIN_BETA: f64 = 0.1;
const MAX_BETA: f64 = 3.0;
const ALPHA_BAND: f64 = 0.02;
const TRAILING_RETURN_POINTS: usize = 30;

/// Security market line: `rf + beta * (mr - rf)`.
pub fn expected_return(risk_free_rate: f64, beta: f64, market_return: f64) -> f64 {
    risk_free_rate + beta * (market_return - risk_free_rate)
}

pub fn validate_beta(beta: f64) -> f64 {
    if !beta.is_finite() || beta <= 0.0 {
        return 1.0;
    }
    beta.clamp(MIN_BETA, MAX_BETA)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SmlPosition {
    Above,
    On,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskClass {
    Conservative,
    Moderate,
    Aggressive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapmAnalysis {
    pub beta: f64,
    pub expected_return: f64,
    pub market_risk_premium: f64,
    pub sharpe_ratio: f64,
    pub alpha: Option<f64>,
    pub systematic_risk: f64,
    pub unsystematic_risk: f64,
    pub sml_position: SmlPosition,
    pub risk_class: RiskClass,
    pub confidence: f64,
}

pub fn capm_analysis(
    beta: f64,
    risk_free_rate: f64,
    market_return: f64,
    market_volatility: f64,
    actual_return: Option<f64>,
) -> CapmAnalysis {
    let beta = validate_beta(beta);
    let er = expected_return(risk_free_rate, beta, market_return);
    let denom = beta.abs() * market_volatility;
    let sharpe_ratio = if denom.abs() > f64::EPSILON {
        (er - risk_free_rate) / denom
    } else {
        0.0
    };
    let alpha = actual_return.map(|actual| actual - er);
    let systematic_risk = (beta * beta * market_volatility * market_volatility).sqrt();
    let unsystematic_risk = (0.5 * beta * beta * market_volatility * market_volatility).sqrt();
    let sml_position = match alpha {
        Some(a) if a > ALPHA_BAND => SmlPosition::Above,
        Some(a) if a < -ALPHA_BAND => SmlPosition::Below,
        _ => SmlPosition::On,
    };
    let risk_class = if beta < 0.7 {
        RiskClass::Conservative
    } else if beta <= 1.3 {
        RiskClass::Moderate
    } else {
        RiskClass::Aggressive
    };
    let market_risk_premium = market_return - risk_free_rate;

    let mut confidence: f64 = 0.7;
    confidence += if (0.8..=1.2).contains(&beta) {
        0.1
    } else if (0.5..=1.5).contains(&beta) {
        0.05
    } else {
        -0.1
    };
    confidence += if market_volatility > 0.2 { -0.1 } else { 0.05 };
    if market_risk_premium < 0.02 {
        confidence -= 0.1;
    }

    CapmAnalysis {
        beta,
        expected_return: er,
        market_risk_premium,
        sharpe_ratio,
        alpha,
        systematic_risk,
        unsystematic_risk,
        sml_position,
        risk_class,
        confidence: confidence.clamp(0.3, 0.95),
    }
}

#[derive(Debug, Clone, Default)]
pub struct CapmModel;

impl PricingModel for CapmModel {
    fn name(&self) -> &str {
        MODEL
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Fundamental
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(MODEL)?;
        let market = &asset.fundamentals.market;
        let beta = asset.fundamentals.equity.as_ref().map(|e| e.beta).unwrap_or(1.0);

        let actual = market.actual_return.or_else(|| {
            (asset.historical_prices.len() >= TRAILING_RETURN_POINTS
                && asset.historical_prices.iter().all(|p| *p > 0.0))
            .then(|| mean(&log_returns(&asset.historical_prices)) * TRADING_DAYS)
        });

        let a = capm_analysis(
            beta,
            market.risk_free_rate,
            market.market_return,
            market.market_volatility,
            actual,
        );
        let signal = match a.sml_position {
            SmlPosition::Above => Signal::Buy,
            SmlPosition::Below => Signal::Sell,
            SmlPosition::On => Signal::Hold,
        };

        let mut result = ModelResult::new(
            MODEL,
            ModelCategory::Fundamental,
            spot * (1.0 + a.expected_return),
            a.confidence,
            signal,
        )
        .with("beta", a.beta)
        .with("expected_return", a.expected_return)
        .with("sharpe_ratio", a.sharpe_ratio)
        .with("systematic_risk", a.systematic_risk)
        .with("unsystematic_risk", a.unsystematic_risk)
        .with("market_risk_premium", a.market_risk_premium)
        .with("risk_class", format!("{:?}", a.risk_class).to_ascii_lowercase());
        if let Some(alpha) = a.alpha {
            result = result.with("alpha", alpha);
        }
        Ok(result)
    }
}
