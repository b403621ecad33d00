use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::{AssetSeries, EquityFundamentals, MarketInputs, ModelCategory, ModelResult, Signal};
use crate::registry::PricingModel;
use crate::valuation::capm::expected_return;
use crate::valuation::RiskLevel;

const MODEL: &str = "ddm";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DdmSettings {
    pub min_required_return: f64,
    pub stable_growth: f64,
    pub high_growth_years: usize,
    pub zero_dividend_payout: f64,
    pub zero_dividend_years: usize,
}

impl Default for DdmSettings {
    fn default() -> Self {
        Self {
            min_required_return: 0.05,
            stable_growth: 0.03,
            high_growth_years: 5,
            zero_dividend_payout: 0.3,
            zero_dividend_years: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DdmVariant {
    Gordon,
    MultiStage,
    ZeroDividend,
}

impl DdmVariant {
    fn base_confidence(self) -> f64 {
        match self {
            Self::Gordon => 0.8,
            Self::MultiStage => 0.7,
            Self::ZeroDividend => 0.2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gordon => "gordon",
            Self::MultiStage => "multi_stage",
            Self::ZeroDividend => "zero_dividend",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DdmValuation {
    pub variant: DdmVariant,
    pub required_return: f64,
    pub intrinsic_value: f64,
    pub sustainability_score: f64,
    pub confidence: f64,
    pub risk_level: RiskLevel,
}

pub fn required_return(equity: &EquityFundamentals, market: &MarketInputs, settings: &DdmSettings) -> f64 {
    expected_return(market.risk_free_rate, equity.beta, market.market_return)
        .max(settings.min_required_return)
}

fn payout_ratio(equity: &EquityFundamentals) -> f64 {
    if equity.earnings_per_share > 0.0 {
        equity.dividend_per_share / equity.earnings_per_share
    } else {
        1.0
    }
}

/// 0-100 score of how well the dividend is covered. Non-payers score 0.
pub fn sustainability_score(equity: &EquityFundamentals) -> f64 {
    let dps = equity.dividend_per_share;
    if dps <= 0.0 {
        return 0.0;
    }
    let mut score: f64 = 100.0;

    let payout = payout_ratio(equity);
    if payout > 0.8 {
        score -= 30.0;
    } else if payout > 0.6 {
        score -= 15.0;
    }

    let total_dividends = dps * equity.shares_outstanding;
    let coverage = if total_dividends > 0.0 {
        equity.free_cash_flow / total_dividends
    } else {
        0.0
    };
    if coverage < 1.0 {
        score -= 25.0;
    } else if coverage < 1.5 {
        score -= 10.0;
    }

    let de = debt_to_equity(equity);
    if de > 1.0 {
        score -= 20.0;
    } else if de > 0.5 {
        score -= 10.0;
    }

    if equity.earnings_growth_rate > 0.1 {
        score += 10.0;
    } else if equity.earnings_growth_rate < 0.0 {
        score -= 15.0;
    }
    score.clamp(0.0, 100.0)
}

fn debt_to_equity(equity: &EquityFundamentals) -> f64 {
    if equity.shareholders_equity > 0.0 {
        equity.total_debt / equity.shareholders_equity
    } else {
        0.0
    }
}

/// Weak sustainability counts double below 40.
pub fn ddm_risk_level(equity: &EquityFundamentals, sustainability: f64) -> RiskLevel {
    let mut factors = 0;
    if sustainability < 40.0 {
        factors += 2;
    } else if sustainability < 60.0 {
        factors += 1;
    }
    if payout_ratio(equity) > 0.8 {
        factors += 1;
    }
    if equity.earnings_growth_rate < 0.0 {
        factors += 1;
    }
    if debt_to_equity(equity) > 1.0 {
        factors += 1;
    }
    RiskLevel::from_factors(factors)
}

pub fn ddm_valuation(
    equity: &EquityFundamentals,
    market: &MarketInputs,
    settings: &DdmSettings,
) -> Result<DdmValuation, ModelError> {
    let r = required_return(equity, market, settings);
    let dps = equity.dividend_per_share;
    let g = equity.dividend_growth_rate;
    let stable = settings.stable_growth;

    let (variant, value) = if dps <= 0.0 {
        let eg = equity.earnings_growth_rate;
        if eg >= r || r <= stable {
            return Err(ModelError::unstable(
                MODEL,
                "no dividend capacity at the required return",
            ));
        }
        let years = settings.zero_dividend_years as i32;
        let future_eps = equity.earnings_per_share * (1.0 + eg).powi(years);
        let future_dividend = future_eps * settings.zero_dividend_payout;
        let terminal = future_dividend / (r - stable);
        (DdmVariant::ZeroDividend, terminal / (1.0 + r).powi(years))
    } else if g >= r {
        if r <= stable {
            return Err(ModelError::unstable(
                MODEL,
                "required return does not exceed stable growth",
            ));
        }
        let years = settings.high_growth_years as i32;
        let mut pv = 0.0;
        let mut last = dps;
        for year in 1..=years {
            last = dps * (1.0 + g).powi(year);
            pv += last / (1.0 + r).powi(year);
        }
        let terminal = last * (1.0 + stable) / (r - stable);
        pv += terminal / (1.0 + r).powi(years);
        (DdmVariant::MultiStage, pv)
    } else {
        (DdmVariant::Gordon, dps * (1.0 + g) / (r - g))
    };

    if !value.is_finite() || value <= 0.0 {
        return Err(ModelError::unstable(MODEL, "non-positive dividend value"));
    }

    let score = sustainability_score(equity);
    let (confidence, risk_level) = if variant == DdmVariant::ZeroDividend {
        (variant.base_confidence(), RiskLevel::High)
    } else {
        let mut confidence = variant.base_confidence() + (score - 50.0) / 200.0 + 0.1;
        confidence += if equity.earnings_growth_rate > 0.0 {
            0.1
        } else {
            -0.1
        };
        (confidence.clamp(0.1, 0.95), ddm_risk_level(equity, score))
    };

    Ok(DdmValuation {
        variant,
        required_return: r,
        intrinsic_value: value,
        sustainability_score: score,
        confidence,
        risk_level,
    })
}

#[derive(Debug, Clone, Default)]
pub struct DdmModel {
    settings: DdmSettings,
}

impl DdmModel {
    pub fn new(settings: DdmSettings) -> Self {
        Self { settings }
    }
}

impl PricingModel for DdmModel {
    fn name(&self) -> &str {
        MODEL
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Fundamental
    }

    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let spot = asset.require_spot(MODEL)?;
        let equity = asset.equity(MODEL)?;
        let v = ddm_valuation(equity, &asset.fundamentals.market, &self.settings)?;
        let upside = (v.intrinsic_value - spot) / spot;
        Ok(ModelResult::new(
            MODEL,
            ModelCategory::Fundamental,
            v.intrinsic_value,
            v.confidence,
            Signal::from_upside(upside),
        )
        .with("variant", v.variant.as_str())
        .with("required_return", v.required_return)
        .with("sustainability_score", v.sustainability_score)
        .with("risk_level", v.risk_level.as_str())
        .with("upside", upside))
    }
}
