use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::{AssetSeries, EconomicIndicators, ModelCategory, ModelResult, Signal};
use crate::numeric::TRADING_DAYS;
use crate::registry::PricingModel;

/// Per-model deviation thresholds for the fair-value signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForexSettings {
    pub ppp_threshold: f64,
    pub irp_threshold: f64,
    pub bop_threshold: f64,
    pub monetary_threshold: f64,
    pub bop_sensitivity: f64,
}

impl Default for ForexSettings {
    fn default() -> Self {
        Self {
            ppp_threshold: 0.05,
            irp_threshold: 0.05,
            bop_threshold: 0.05,
            monetary_threshold: 0.05,
            bop_sensitivity: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FairValue {
    pub theoretical_rate: f64,
    pub deviation: f64,
    pub confidence: f64,
}

impl FairValue {
    fn new(theoretical_rate: f64, spot: f64, confidence: f64) -> Self {
        Self {
            theoretical_rate,
            deviation: (theoretical_rate - spot) / spot,
            confidence,
        }
    }

    fn into_result(self, model: &str, threshold: f64) -> ModelResult {
        ModelResult::new(
            model,
            ModelCategory::Fundamental,
            self.theoretical_rate,
            self.confidence,
            Signal::from_deviation(self.deviation, threshold),
        )
        .with("deviation_pct", self.deviation * 100.0)
    }
}

fn check(model: &str, fv: FairValue) -> Result<FairValue, ModelError> {
    if fv.theoretical_rate.is_finite() && fv.deviation.is_finite() {
        Ok(fv)
    } else {
        Err(ModelError::unstable(model, "non-finite theoretical rate"))
    }
}

/// Deeper price history and a real inflation gap make PPP more trustworthy.
pub fn ppp_confidence(data_points: usize, inflation_differential: f64) -> f64 {
    let mut confidence: f64 = 0.4;
    if data_points >= 5 * TRADING_DAYS as usize {
        confidence += 0.2;
    } else if data_points >= TRADING_DAYS as usize {
        confidence += 0.1;
    }
    if inflation_differential.abs() > 0.01 {
        confidence += 0.1;
    }
    confidence.min(0.9)
}

/// Relative PPP drift of the first observed rate over the elapsed sample.
pub fn purchasing_power_parity(
    initial_rate: f64,
    spot: f64,
    elapsed_observations: usize,
    base: &EconomicIndicators,
    quote: &EconomicIndicators,
) -> FairValue {
    let years = elapsed_observations as f64 / TRADING_DAYS;
    let ratio = (1.0 + quote.inflation_rate) / (1.0 + base.inflation_rate);
    let confidence = ppp_confidence(
        elapsed_observations + 1,
        base.inflation_rate - quote.inflation_rate,
    );
    FairValue::new(initial_rate * ratio.powf(years), spot, confidence)
}

/// Covered interest parity forward for `horizon_years`.
pub fn interest_rate_parity(
    spot: f64,
    horizon_years: f64,
    base: &EconomicIndicators,
    quote: &EconomicIndicators,
) -> FairValue {
    let forward = spot * (1.0 + quote.interest_rate * horizon_years)
        / (1.0 + base.interest_rate * horizon_years);
    FairValue::new(forward, spot, 0.70)
}

fn normalize_balance(balance: f64) -> f64 {
    balance.signum() * (balance.abs() / 100_000.0).min(1.0)
}

/// External-balance strength of one economy in [-1, 1].
pub fn balance_score(e: &EconomicIndicators) -> f64 {
    let reserves = (e.foreign_reserves / 500_000.0).clamp(-1.0, 1.0);
    0.35 * normalize_balance(e.current_account_balance)
        + 0.35 * normalize_balance(e.trade_balance)
        + 0.20 * reserves
        + 0.10 * (e.political_stability - 0.5) * 2.0
}

pub fn balance_of_payments(
    spot: f64,
    sensitivity: f64,
    base: &EconomicIndicators,
    quote: &EconomicIndicators,
) -> (FairValue, f64) {
    let relative = balance_score(base) - balance_score(quote);
    let fair = spot * (1.0 + sensitivity * relative);
    let stability = (base.political_stability + quote.political_stability) / 2.0;
    let consistency = (1.0 - (base.gdp_growth - quote.gdp_growth).abs() * 2.0).clamp(0.3, 1.0);
    let confidence = ((relative.abs() * 2.0).min(0.8) * stability * consistency).clamp(0.3, 0.9);
    (FairValue::new(fair, spot, confidence), relative)
}

fn money_supply_effect(base_growth: f64, quote_growth: f64) -> f64 {
    let quote_growth = if quote_growth == 0.0 { 0.001 } else { quote_growth };
    let ratio = (1.0 + base_growth) / (1.0 + quote_growth);
    if ratio > 1.0 {
        1.0 + ratio.ln() * 0.5
    } else {
        1.0 - (1.0 / ratio).ln() * 0.5
    }
}

fn income_effect(base_gdp: f64, quote_gdp: f64) -> f64 {
    let base_gdp = if base_gdp <= 0.0 { 0.001 } else { base_gdp };
    let quote_gdp = if quote_gdp <= 0.0 { 0.001 } else { quote_gdp };
    (quote_gdp / base_gdp).clamp(0.5, 2.0)
}

pub fn monetary_strength(base: &EconomicIndicators, quote: &EconomicIndicators) -> f64 {
    let unit = |v: f64| v.clamp(-1.0, 1.0);
    let money = unit((quote.money_supply_growth - base.money_supply_growth) * 10.0);
    let interest = unit((base.interest_rate - quote.interest_rate) * 20.0);
    let inflation = unit((quote.inflation_rate - base.inflation_rate) * 25.0);
    let growth = unit((base.gdp_growth - quote.gdp_growth) * 15.0);
    unit(money * 0.25 + interest * 0.30 + inflation * 0.25 + growth * 0.20)
}

fn stability_adjustment(base: &EconomicIndicators, quote: &EconomicIndicators) -> f64 {
    let stability = 1.0 + (base.political_stability - quote.political_stability) * 0.1;
    let debt = 1.0 + (quote.government_debt_to_gdp - base.government_debt_to_gdp) * 0.05;
    let employment = 1.0 + (quote.unemployment_rate - base.unemployment_rate) * 0.5;
    (stability * debt * employment).clamp(0.8, 1.2)
}

pub fn monetary_model(
    spot: f64,
    base: &EconomicIndicators,
    quote: &EconomicIndicators,
) -> (FairValue, f64) {
    let rate = spot
        * money_supply_effect(base.money_supply_growth, quote.money_supply_growth)
        * income_effect(base.gdp_growth, quote.gdp_growth)
        * (base.interest_rate - quote.interest_rate).exp()
        * (-(base.inflation_rate - quote.inflation_rate)).exp();
    let adjusted = rate * stability_adjustment(base, quote);
    let strength = monetary_strength(base, quote);

    let deviation = (adjusted - spot) / spot;
    let stability = (base.political_stability + quote.political_stability) / 2.0;
    let consistency = (1.0 - (base.gdp_growth - quote.gdp_growth).abs() * 5.0).clamp(0.5, 1.0);
    let confidence = ((deviation.abs() * 10.0).min(0.8)
        * (strength.abs() + 0.3).min(0.9)
        * stability
        * consistency)
        .clamp(0.3, 0.9);
    (FairValue::new(adjusted, spot, confidence), strength)
}

macro_rules! forex_model {
    ($ty:ident) => {
        #[derive(Debug, Clone, Default)]
        pub struct $ty {
            settings: ForexSettings,
        }

        impl $ty {
            pub fn new(settings: ForexSettings) -> Self {
                Self { settings }
            }
        }
    };
}

forex_model!(PurchasingPowerParityModel);
forex_model!(InterestRateParityModel);
forex_model!(BalanceOfPaymentsModel);
forex_model!(MonetaryModel);

impl PricingModel for PurchasingPowerParityModel {
    fn name(&self) -> &str {
        "ppp"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Fundamental
    }

    fn min_data_points(&self) -> usize {
        2
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(self.name())?;
        let prices = asset.require_points(self.name(), 2)?;
        let fx = asset.forex(self.name())?;
        let fv = check(
            self.name(),
            purchasing_power_parity(prices[0], spot, prices.len() - 1, &fx.base, &fx.quote),
        )?;
        Ok(fv
            .into_result(self.name(), self.settings.ppp_threshold)
            .with("inflation_differential", fx.base.inflation_rate - fx.quote.inflation_rate))
    }
}

impl PricingModel for InterestRateParityModel {
    fn name(&self) -> &str {
        "irp"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Fundamental
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(self.name())?;
        let fx = asset.forex(self.name())?;
        if fx.forward_horizon_years <= 0.0 {
            return Err(ModelError::invalid(self.name(), "forward horizon must be positive"));
        }
        let fv = check(
            self.name(),
            interest_rate_parity(spot, fx.forward_horizon_years, &fx.base, &fx.quote),
        )?;
        Ok(fv
            .into_result(self.name(), self.settings.irp_threshold)
            .with("carry_pct", (fx.base.interest_rate - fx.quote.interest_rate) * 100.0)
            .with("horizon_years", fx.forward_horizon_years))
    }
}

impl PricingModel for BalanceOfPaymentsModel {
    fn name(&self) -> &str {
        "bop"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Fundamental
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(self.name())?;
        let fx = asset.forex(self.name())?;
        let (fv, relative) =
            balance_of_payments(spot, self.settings.bop_sensitivity, &fx.base, &fx.quote);
        let fv = check(self.name(), fv)?;
        Ok(fv
            .into_result(self.name(), self.settings.bop_threshold)
            .with("relative_strength", relative))
    }
}

impl PricingModel for MonetaryModel {
    fn name(&self) -> &str {
        "monetary"
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Fundamental
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(self.name())?;
        let fx = asset.forex(self.name())?;
        let (fv, strength) = monetary_model(spot, &fx.base, &fx.quote);
        let fv = check(self.name(), fv)?;
        Ok(fv
            .into_result(self.name(), self.settings.monetary_threshold)
            .with("monetary_strength", strength))
    }
}
