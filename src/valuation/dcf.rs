use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::{AssetSeries, ModelCategory, ModelResult, Signal};
use crate::registry::PricingModel;
use crate::valuation::capm::expected_return;
use crate::valuation::RiskLevel;

const MODEL: &str = "dcf";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcfSettings {
    pub projection_years: usize,
    pub terminal_growth: f64,
    pub cost_of_debt: f64,
    pub tax_rate: f64,
    /// Per-year multiplier applied to the growth rate.
    pub growth_decay: f64,
}

impl Default for DcfSettings {
    fn default() -> Self {
        Self {
            projection_years: 5,
            terminal_growth: 0.025,
            cost_of_debt: 0.05,
            tax_rate: 0.25,
            growth_decay: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DcfInputs {
    pub free_cash_flow: f64,
    pub growth_rate: f64,
    pub earnings_growth_rate: f64,
    pub total_debt: f64,
    pub shareholders_equity: f64,
    pub shares_outstanding: f64,
    pub beta: f64,
    pub risk_free_rate: f64,
    pub market_return: f64,
    pub market_volatility: f64,
}

impl DcfInputs {
    pub fn from_asset(asset: &AssetSeries) -> Result<Self, ModelError> {
        let eq = asset.equity(MODEL)?;
        let market = &asset.fundamentals.market;
        Ok(Self {
            free_cash_flow: eq.free_cash_flow,
            growth_rate: eq.revenue_growth_rate,
            earnings_growth_rate: eq.earnings_growth_rate,
            total_debt: eq.total_debt,
            shareholders_equity: eq.shareholders_equity,
            shares_outstanding: eq.shares_outstanding,
            beta: eq.beta,
            risk_free_rate: market.risk_free_rate,
            market_return: market.market_return,
            market_volatility: market.market_volatility,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DcfValuation {
    pub cost_of_equity: f64,
    pub wacc: f64,
    pub projected_cash_flows: Vec<f64>,
    pub discounted_cash_flows: Vec<f64>,
    pub terminal_value: f64,
    pub pv_terminal_value: f64,
    pub enterprise_value: f64,
    pub equity_value: f64,
    pub intrinsic_value_per_share: f64,
    pub confidence: f64,
    pub risk_level: RiskLevel,
}

/// Per-share value at one shifted input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityPoint {
    pub shift: f64,
    pub value_per_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DcfSensitivity {
    pub base_value: f64,
    /// Market return shifted across +/-2%, which moves the cost of capital.
    pub wacc: Vec<SensitivityPoint>,
    /// Revenue and earnings growth shifted across +/-1%.
    pub growth: Vec<SensitivityPoint>,
}

/// Returns `(cost_of_equity, wacc)`.
pub fn weighted_cost_of_capital(
    inputs: &DcfInputs,
    settings: &DcfSettings,
) -> Result<(f64, f64), ModelError> {
    let capital = inputs.total_debt + inputs.shareholders_equity;
    if capital <= 0.0 {
        return Err(ModelError::invalid(
            MODEL,
            "debt plus equity must be positive",
        ));
    }
    let cost_of_equity = expected_return(inputs.risk_free_rate, inputs.beta, inputs.market_return);
    let debt_ratio = inputs.total_debt / capital;
    let equity_ratio = 1.0 - debt_ratio;
    let wacc = equity_ratio * cost_of_equity
        + debt_ratio * settings.cost_of_debt * (1.0 - settings.tax_rate);
    Ok((cost_of_equity, wacc))
}

pub fn dcf_valuation(inputs: &DcfInputs, settings: &DcfSettings) -> Result<DcfValuation, ModelError> {
    if inputs.shares_outstanding <= 0.0 {
        return Err(ModelError::invalid(MODEL, "shares_outstanding must be positive"));
    }
    if settings.projection_years == 0 {
        return Err(ModelError::invalid(MODEL, "projection_years must be > 0"));
    }
    let (cost_of_equity, wacc) = weighted_cost_of_capital(inputs, settings)?;
    if wacc <= settings.terminal_growth {
        return Err(ModelError::unstable(
            MODEL,
            format!(
                "wacc {:.4} does not exceed terminal growth {:.4}",
                wacc, settings.terminal_growth
            ),
        ));
    }

    let mut projected = Vec::with_capacity(settings.projection_years);
    let mut discounted = Vec::with_capacity(settings.projection_years);
    for year in 1..=settings.projection_years {
        let g = inputs.growth_rate * settings.growth_decay.powi(year as i32 - 1);
        let fcf = inputs.free_cash_flow * (1.0 + g).powi(year as i32);
        projected.push(fcf);
        discounted.push(fcf / (1.0 + wacc).powi(year as i32));
    }

    let terminal_fcf = projected.last().copied().unwrap_or(inputs.free_cash_flow);
    let terminal_value =
        terminal_fcf * (1.0 + settings.terminal_growth) / (wacc - settings.terminal_growth);
    let pv_terminal_value = terminal_value / (1.0 + wacc).powi(settings.projection_years as i32);
    let enterprise_value = discounted.iter().sum::<f64>() + pv_terminal_value;
    let equity_value = enterprise_value - inputs.total_debt;
    let intrinsic_value_per_share = equity_value / inputs.shares_outstanding;

    if !intrinsic_value_per_share.is_finite() {
        return Err(ModelError::unstable(MODEL, "non-finite intrinsic value"));
    }

    Ok(DcfValuation {
        cost_of_equity,
        wacc,
        projected_cash_flows: projected,
        discounted_cash_flows: discounted,
        terminal_value,
        pv_terminal_value,
        enterprise_value,
        equity_value,
        intrinsic_value_per_share,
        confidence: dcf_confidence(inputs),
        risk_level: dcf_risk_level(inputs),
    })
}

fn debt_to_equity(inputs: &DcfInputs) -> f64 {
    if inputs.shareholders_equity > 0.0 {
        inputs.total_debt / inputs.shareholders_equity
    } else {
        0.0
    }
}

pub fn dcf_confidence(inputs: &DcfInputs) -> f64 {
    let mut confidence = 0.7;
    confidence -= (inputs.market_volatility / 2.0).min(0.25);
    let debt_to_equity = debt_to_equity(inputs);
    if debt_to_equity > 1.0 {
        confidence -= (debt_to_equity / 4.0).min(0.15);
    }
    // Revenue and earnings must both be growing to earn the bonus.
    if inputs.growth_rate > 0.0 && inputs.earnings_growth_rate > 0.0 {
        confidence += 0.1;
    } else {
        confidence -= 0.1;
    }
    confidence.clamp(0.3, 0.95)
}

pub fn dcf_risk_level(inputs: &DcfInputs) -> RiskLevel {
    let mut factors = 0;
    if debt_to_equity(inputs) > 1.0 {
        factors += 1;
    }
    if inputs.market_volatility > 0.3 {
        factors += 1;
    }
    if inputs.growth_rate < 0.0 || inputs.earnings_growth_rate < 0.0 {
        factors += 1;
    }
    if inputs.beta > 1.5 {
        factors += 1;
    }
    RiskLevel::from_factors(factors)
}

const SENSITIVITY_STEPS: usize = 5;

fn shifts(range: f64) -> impl Iterator<Item = f64> {
    let step = 2.0 * range / (SENSITIVITY_STEPS - 1) as f64;
    (0..SENSITIVITY_STEPS).map(move |i| -range + step * i as f64)
}

/// Revalues the company over a grid of shifted inputs. Points where the
/// shifted valuation fails are left out.
pub fn dcf_sensitivity(
    inputs: &DcfInputs,
    settings: &DcfSettings,
) -> Result<DcfSensitivity, ModelError> {
    let base_value = dcf_valuation(inputs, settings)?.intrinsic_value_per_share;

    let wacc = shifts(0.02)
        .filter_map(|shift| {
            let shifted = DcfInputs {
                market_return: inputs.market_return + shift,
                ..inputs.clone()
            };
            dcf_valuation(&shifted, settings).ok().map(|v| SensitivityPoint {
                shift,
                value_per_share: v.intrinsic_value_per_share,
            })
        })
        .collect();

    let growth = shifts(0.01)
        .filter_map(|shift| {
            let shifted = DcfInputs {
                growth_rate: inputs.growth_rate + shift,
                earnings_growth_rate: inputs.earnings_growth_rate + shift,
                ..inputs.clone()
            };
            dcf_valuation(&shifted, settings).ok().map(|v| SensitivityPoint {
                shift,
                value_per_share: v.intrinsic_value_per_share,
            })
        })
        .collect();

    Ok(DcfSensitivity {
        base_value,
        wacc,
        growth,
    })
}

#[derive(Debug, Clone, Default)]
pub struct DcfModel {
    settings: DcfSettings,
}

impl DcfModel {
    pub fn new(settings: DcfSettings) -> Self {
        Self { settings }
    }
}

impl PricingModel for DcfModel {
    fn name(&self) -> &str {
        MODEL
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Fundamental
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(MODEL)?;
        let inputs = DcfInputs::from_asset(asset)?;
        let v = dcf_valuation(&inputs, &self.settings)?;
        if v.intrinsic_value_per_share <= 0.0 {
            return Err(ModelError::unstable(MODEL, "equity value is not positive"));
        }
        let upside = (v.intrinsic_value_per_share - spot) / spot;
        let sensitivity = dcf_sensitivity(&inputs, &self.settings)
            .ok()
            .and_then(|s| serde_json::to_value(s).ok())
            .unwrap_or(serde_json::Value::Null);
        Ok(ModelResult::new(
            MODEL,
            ModelCategory::Fundamental,
            v.intrinsic_value_per_share,
            v.confidence,
            Signal::from_upside(upside),
        )
        .with("wacc", v.wacc)
        .with("cost_of_equity", v.cost_of_equity)
        .with("enterprise_value", v.enterprise_value)
        .with("equity_value", v.equity_value)
        .with("terminal_value", v.terminal_value)
        .with("pv_terminal_value", v.pv_terminal_value)
        .with("risk_level", v.risk_level.as_str())
        .with("sensitivity", sensitivity)
        .with("upside", upside))
    }
}
