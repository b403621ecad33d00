use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::{AssetSeries, ModelCategory, ModelResult};
use crate::stats::backend::EstimatorBackend;
use crate::stats::garch::{GarchModel, GarchSettings};
use crate::stats::predictor::{
    AttentionPredictor, BoostedPredictor, SequencePredictor, SequenceSettings,
};
use crate::stats::regime::RegimeSwitchingModel;
use crate::stats::risk_metrics::RiskMetricsModel;
use crate::valuation::capm::CapmModel;
use crate::valuation::crypto::{
    CryptoSettings, LogRegressionModel, MetcalfeModel, MvrvModel, PuellMultipleModel,
    StockToFlowModel,
};
use crate::valuation::dcf::{DcfModel, DcfSettings};
use crate::valuation::ddm::{DdmModel, DdmSettings};
use crate::valuation::forex::{
    BalanceOfPaymentsModel, ForexSettings, InterestRateParityModel, MonetaryModel,
    PurchasingPowerParityModel,
};

/// One valuation primitive or statistical wrapper behind a uniform interface.
pub trait PricingModel: Send + Sync {
    fn name(&self) -> &str;
    fn category(&self) -> ModelCategory;
    fn min_data_points(&self) -> usize {
        0
    }
    fn compute(&self, asset: &AssetSeries) -> Result<ModelResult, ModelError>;
}

/// Tunables for every registered model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub dcf: DcfSettings,
    pub ddm: DdmSettings,
    pub forex: ForexSettings,
    pub crypto: CryptoSettings,
    pub sequence: SequenceSettings,
    pub garch: GarchSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub category: ModelCategory,
    pub min_data_points: usize,
}

#[derive(Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Box<dyn PricingModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in model, wired with `settings` and the resolved backend.
    pub fn standard(settings: &ModelSettings, backend: EstimatorBackend) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(DcfModel::new(settings.dcf.clone())));
        registry.register(Box::new(DdmModel::new(settings.ddm.clone())));
        registry.register(Box::new(CapmModel::default()));

        registry.register(Box::new(PurchasingPowerParityModel::new(
            settings.forex.clone(),
        )));
        registry.register(Box::new(InterestRateParityModel::new(
            settings.forex.clone(),
        )));
        registry.register(Box::new(BalanceOfPaymentsModel::new(
            settings.forex.clone(),
        )));
        registry.register(Box::new(MonetaryModel::new(settings.forex.clone())));

        registry.register(Box::new(StockToFlowModel::new(settings.crypto.clone())));
        registry.register(Box::new(MetcalfeModel::default()));
        registry.register(Box::new(MvrvModel::default()));
        registry.register(Box::new(PuellMultipleModel::default()));
        registry.register(Box::new(LogRegressionModel::default()));

        registry.register(Box::new(GarchModel::new(settings.garch.clone(), backend)));
        registry.register(Box::new(SequencePredictor::new(
            settings.sequence.clone(),
            backend,
        )));
        registry.register(Box::new(BoostedPredictor::new(
            settings.sequence.clone(),
            backend,
        )));
        registry.register(Box::new(AttentionPredictor::new(
            settings.sequence.clone(),
            backend,
        )));
        registry.register(Box::new(RegimeSwitchingModel::default()));
        registry.register(Box::new(RiskMetricsModel::default()));
        registry
    }

    /// Registers `model`, replacing any model with the same name.
    pub fn register(&mut self, model: Box<dyn PricingModel>) {
        self.models.insert(model.name().to_string(), model);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn PricingModel> {
        self.models.get(name).map(|m| m.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn describe(&self) -> Vec<ModelInfo> {
        self.models
            .values()
            .map(|m| ModelInfo {
                name: m.name().to_string(),
                category: m.category(),
                min_data_points: m.min_data_points(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Runs one model with its data requirement enforced up front and the
    /// output checked for finiteness.
    pub fn run(&self, name: &str, asset: &AssetSeries) -> Result<ModelResult, ModelError> {
        let model = self
            .get(name)
            .ok_or_else(|| ModelError::invalid(name, "model is not registered"))?;
        let required = model.min_data_points();
        if asset.historical_prices.len() < required {
            return Err(ModelError::insufficient(
                name,
                required,
                asset.historical_prices.len(),
            ));
        }
        let result = model.compute(asset)?;
        if !result.prediction.is_finite() {
            return Err(ModelError::unstable(name, "non-finite prediction"));
        }
        Ok(result)
    }

    /// Like [`run`](Self::run) but folds failures into a zero-confidence
    /// HOLD result instead of returning an error.
    pub fn evaluate(&self, name: &str, asset: &AssetSeries) -> ModelResult {
        match self.run(name, asset) {
            Ok(result) => result,
            Err(err) => {
                tracing::debug!(model = %name, symbol = %asset.symbol, error = %err, "model fell back");
                let category = self
                    .get(name)
                    .map(|m| m.category())
                    .unwrap_or(ModelCategory::Technical);
                ModelResult::fallback(name, category, asset.current_price, &err)
            }
        }
    }
}
