pub mod asset;
pub mod result;

pub use asset::{
    AssetClass, AssetSeries, EconomicIndicators, EquityFundamentals, ForexFundamentals,
    Fundamentals, MarketInputs, OnChainMetrics,
};
pub use result::{ModelCategory, ModelResult, Signal};
