use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Equity,
    Crypto,
    Forex,
    Index,
    Futures,
}

impl AssetClass {
    pub const ALL: [AssetClass; 5] = [
        AssetClass::Equity,
        AssetClass::Crypto,
        AssetClass::Forex,
        AssetClass::Index,
        AssetClass::Futures,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::Crypto => "crypto",
            Self::Forex => "forex",
            Self::Index => "index",
            Self::Futures => "futures",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equity" | "stock" => Ok(Self::Equity),
            "crypto" => Ok(Self::Crypto),
            "forex" | "fx" => Ok(Self::Forex),
            "index" => Ok(Self::Index),
            "futures" => Ok(Self::Futures),
            other => Err(format!("unknown asset class '{}'", other)),
        }
    }
}

/// Company fundamentals used by DCF, DDM and CAPM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquityFundamentals {
    pub free_cash_flow: f64,
    pub total_debt: f64,
    pub shareholders_equity: f64,
    pub shares_outstanding: f64,
    pub revenue_growth_rate: f64,
    pub beta: f64,
    pub dividend_per_share: f64,
    pub dividend_growth_rate: f64,
    pub earnings_per_share: f64,
    pub earnings_growth_rate: f64,
}

impl Default for EquityFundamentals {
    fn default() -> Self {
        Self {
            free_cash_flow: 0.0,
            total_debt: 0.0,
            shareholders_equity: 0.0,
            shares_outstanding: 0.0,
            revenue_growth_rate: 0.0,
            beta: 1.0,
            dividend_per_share: 0.0,
            dividend_growth_rate: 0.0,
            earnings_per_share: 0.0,
            earnings_growth_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketInputs {
    pub risk_free_rate: f64,
    pub market_return: f64,
    pub market_volatility: f64,
    pub actual_return: Option<f64>,
}

impl Default for MarketInputs {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.03,
            market_return: 0.10,
            market_volatility: 0.20,
            actual_return: None,
        }
    }
}

/// Macro indicators for one side of a currency pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomicIndicators {
    pub gdp_growth: f64,
    pub inflation_rate: f64,
    pub unemployment_rate: f64,
    pub interest_rate: f64,
    pub money_supply_growth: f64,
    pub government_debt_to_gdp: f64,
    pub current_account_balance: f64,
    pub trade_balance: f64,
    pub foreign_reserves: f64,
    pub political_stability: f64,
}

impl Default for EconomicIndicators {
    fn default() -> Self {
        Self {
            gdp_growth: 0.02,
            inflation_rate: 0.02,
            unemployment_rate: 0.05,
            interest_rate: 0.02,
            money_supply_growth: 0.04,
            government_debt_to_gdp: 0.8,
            current_account_balance: 0.0,
            trade_balance: 0.0,
            foreign_reserves: 0.0,
            political_stability: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForexFundamentals {
    pub base: EconomicIndicators,
    pub quote: EconomicIndicators,
    pub forward_horizon_years: f64,
}

impl Default for ForexFundamentals {
    fn default() -> Self {
        Self {
            base: EconomicIndicators::default(),
            quote: EconomicIndicators::default(),
            forward_horizon_years: 0.25,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnChainMetrics {
    pub circulating_supply: Option<f64>,
    pub annual_issuance: Option<f64>,
    pub mvrv_ratio: Option<f64>,
    /// Active address counts aligned with the tail of `historical_prices`.
    pub active_addresses: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fundamentals {
    pub equity: Option<EquityFundamentals>,
    pub market: MarketInputs,
    pub forex: Option<ForexFundamentals>,
    pub onchain: Option<OnChainMetrics>,
}

/// Immutable market snapshot for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSeries {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub current_price: f64,
    /// Chronological closes, oldest first.
    #[serde(default)]
    pub historical_prices: Vec<f64>,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub fundamentals: Fundamentals,
}

impl AssetSeries {
    pub fn new(symbol: &str, asset_class: AssetClass, historical_prices: Vec<f64>) -> Self {
        let current_price = historical_prices.last().copied().unwrap_or(0.0);
        Self {
            symbol: symbol.to_string(),
            asset_class,
            current_price,
            historical_prices,
            volume: 0.0,
            market_cap: None,
            fundamentals: Fundamentals::default(),
        }
    }

    pub fn with_fundamentals(mut self, fundamentals: Fundamentals) -> Self {
        self.fundamentals = fundamentals;
        self
    }

    pub fn len(&self) -> usize {
        self.historical_prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.historical_prices.is_empty()
    }

    pub fn require_points(&self, model: &str, required: usize) -> Result<&[f64], ModelError> {
        if self.historical_prices.len() < required {
            return Err(ModelError::insufficient(
                model,
                required,
                self.historical_prices.len(),
            ));
        }
        if self
            .historical_prices
            .iter()
            .any(|p| !p.is_finite() || *p <= 0.0)
        {
            return Err(ModelError::invalid(
                model,
                "historical prices must be finite and positive",
            ));
        }
        Ok(&self.historical_prices)
    }

    pub fn require_spot(&self, model: &str) -> Result<f64, ModelError> {
        if self.current_price.is_finite() && self.current_price > 0.0 {
            Ok(self.current_price)
        } else {
            Err(ModelError::invalid(model, "current_price must be positive"))
        }
    }

    pub fn equity(&self, model: &str) -> Result<&EquityFundamentals, ModelError> {
        self.fundamentals
            .equity
            .as_ref()
            .ok_or_else(|| ModelError::invalid(model, "equity fundamentals missing"))
    }

    pub fn forex(&self, model: &str) -> Result<&ForexFundamentals, ModelError> {
        self.fundamentals
            .forex
            .as_ref()
            .ok_or_else(|| ModelError::invalid(model, "forex fundamentals missing"))
    }

    pub fn onchain(&self, model: &str) -> Result<&OnChainMetrics, ModelError> {
        self.fundamentals
            .onchain
            .as_ref()
            .ok_or_else(|| ModelError::invalid(model, "on-chain metrics missing"))
    }
}
