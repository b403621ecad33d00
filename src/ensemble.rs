use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::model::{AssetClass, AssetSeries, ModelCategory, ModelResult, Signal};
use crate::numeric::{max_drawdown, mean, std_dev};
use crate::registry::{ModelRegistry, ModelSettings};
use crate::stats::backend::{resolve_backend, BackendPreference, EstimatorBackend};
use crate::stats::regime::{classify_regime, realized_volatility, MarketRegime};
use crate::stats::risk_metrics::risk_metrics;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub enabled: Vec<String>,
    pub weights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleSettings {
    pub vote_threshold: f64,
    /// Weight for enabled models missing from a profile's table.
    pub default_weight: f64,
    pub disagreement_discount: bool,
    pub backend: BackendPreference,
    /// Keyed by asset class name; classes without an entry use the built-in profile.
    pub profiles: BTreeMap<String, ProfileConfig>,
}

impl Default for EnsembleSettings {
    fn default() -> Self {
        Self {
            vote_threshold: 0.6,
            default_weight: 0.1,
            disagreement_discount: true,
            backend: BackendPreference::Auto,
            profiles: BTreeMap::new(),
        }
    }
}

impl EnsembleSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.vote_threshold > 0.0 && self.vote_threshold <= 1.0) {
            return Err(ConfigError::InvalidSetting {
                key: "ensemble.vote_threshold".to_string(),
                detail: format!("{} is outside (0, 1]", self.vote_threshold),
            });
        }
        if !self.default_weight.is_finite() || self.default_weight < 0.0 {
            return Err(ConfigError::InvalidSetting {
                key: "ensemble.default_weight".to_string(),
                detail: format!("{} must be finite and non-negative", self.default_weight),
            });
        }
        Ok(())
    }
}

fn profile(weights: &[(&str, f64)]) -> ProfileConfig {
    ProfileConfig {
        enabled: weights.iter().map(|(n, _)| n.to_string()).collect(),
        weights: weights.iter().map(|(n, w)| (n.to_string(), *w)).collect(),
    }
}

/// Built-in model mix per asset class.
pub fn default_profile(class: AssetClass) -> ProfileConfig {
    match class {
        AssetClass::Crypto => profile(&[
            ("lstm", 0.10),
            ("xgboost", 0.10),
            ("transformer", 0.10),
            ("stock_to_flow", 0.20),
            ("mvrv", 0.15),
            ("puell_multiple", 0.10),
            ("metcalfe_law", 0.10),
            ("log_regression", 0.10),
            ("risk_metrics", 0.05),
        ]),
        AssetClass::Equity => profile(&[
            ("dcf", 0.25),
            ("ddm", 0.15),
            ("capm", 0.15),
            ("lstm", 0.10),
            ("xgboost", 0.10),
            ("transformer", 0.05),
            ("garch", 0.05),
            ("regime_switching", 0.05),
            ("risk_metrics", 0.10),
        ]),
        AssetClass::Forex => profile(&[
            ("ppp", 0.20),
            ("irp", 0.20),
            ("bop", 0.15),
            ("monetary", 0.20),
            ("garch", 0.10),
            ("lstm", 0.15),
        ]),
        AssetClass::Index | AssetClass::Futures => profile(&[
            ("capm", 0.25),
            ("lstm", 0.15),
            ("xgboost", 0.15),
            ("transformer", 0.10),
            ("garch", 0.10),
            ("regime_switching", 0.10),
            ("risk_metrics", 0.15),
        ]),
    }
}

/// Validated model list with weights normalised to sum to one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleProfile {
    pub enabled: Vec<String>,
    pub weights: BTreeMap<String, f64>,
}

pub fn validate_profile(
    registry: &ModelRegistry,
    enabled: &[String],
    weights: &BTreeMap<String, f64>,
    default_weight: f64,
) -> Result<EnsembleProfile, ConfigError> {
    let mut names: Vec<String> = Vec::with_capacity(enabled.len());
    for raw in enabled {
        let name = raw.trim().to_string();
        if name.is_empty() || names.contains(&name) {
            continue;
        }
        if !registry.contains(&name) {
            return Err(ConfigError::UnknownModel(name));
        }
        names.push(name);
    }
    if names.is_empty() {
        return Err(ConfigError::NoModelsEnabled);
    }

    for (model, &weight) in weights {
        if !registry.contains(model) {
            return Err(ConfigError::UnknownModel(model.clone()));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(ConfigError::InvalidWeight {
                model: model.clone(),
                weight,
            });
        }
    }

    let raw: Vec<f64> = names
        .iter()
        .map(|n| weights.get(n).copied().unwrap_or(default_weight))
        .collect();
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return Err(ConfigError::ZeroWeightSum);
    }
    let weights = names
        .iter()
        .zip(raw)
        .map(|(n, w)| (n.clone(), w / total))
        .collect();
    Ok(EnsembleProfile {
        enabled: names,
        weights,
    })
}

/// One single-asset analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub asset: AssetSeries,
    #[serde(default)]
    pub enabled_models: Option<Vec<String>>,
    #[serde(default)]
    pub model_weights: Option<BTreeMap<String, f64>>,
}

impl AnalysisRequest {
    pub fn new(asset: AssetSeries) -> Self {
        Self {
            asset,
            enabled_models: None,
            model_weights: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Good,
    Limited,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub requested: usize,
    pub contributing: usize,
    pub skipped: BTreeMap<String, String>,
    pub data_quality: DataQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub volatility: f64,
    pub prediction_spread: f64,
    pub model_agreement: f64,
    pub data_completeness: f64,
    pub var_95: f64,
    pub cvar_95: f64,
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub current_price: f64,
    pub consensus_prediction: f64,
    pub market_signal: Signal,
    pub confidence_score: f64,
    pub category_scores: BTreeMap<ModelCategory, f64>,
    pub individual_predictions: BTreeMap<String, ModelResult>,
    pub model_weights: BTreeMap<String, f64>,
    pub risk_assessment: RiskAssessment,
    pub market_regime: MarketRegime,
    pub model_status: ModelStatus,
    /// Estimator strategy used by the statistical wrappers, when known.
    pub backend: Option<EstimatorBackend>,
    pub timestamp: DateTime<Utc>,
}

const ALL_FAILED_CONFIDENCE: f64 = 0.1;

/// Combines the results that were produced for `asset` into one ensemble.
///
/// `weights` is the configured table; only models present in `results`
/// take part, and their weights are renormalised to sum to one. Never fails:
/// with no results the consensus is the current price at confidence 0.1.
pub fn combine(
    asset: &AssetSeries,
    results: Vec<ModelResult>,
    skipped: BTreeMap<String, String>,
    weights: &BTreeMap<String, f64>,
    settings: &EnsembleSettings,
) -> EnsembleResult {
    let requested = results.len() + skipped.len();
    let n = results.len();

    let raw: Vec<f64> = results
        .iter()
        .map(|r| {
            weights
                .get(&r.model_name)
                .copied()
                .unwrap_or(settings.default_weight)
                .max(0.0)
        })
        .collect();
    let raw_total: f64 = raw.iter().sum();
    let normalized: Vec<f64> = if raw_total > 0.0 {
        raw.iter().map(|w| w / raw_total).collect()
    } else {
        vec![1.0 / n.max(1) as f64; n]
    };

    let predictions: Vec<f64> = results.iter().map(|r| r.prediction).collect();
    let (consensus, signal, confidence) = if n == 0 {
        (asset.current_price, Signal::Hold, ALL_FAILED_CONFIDENCE)
    } else {
        let weighted_conf: f64 = results
            .iter()
            .zip(&normalized)
            .map(|(r, w)| w * r.confidence)
            .sum();
        let consensus = if weighted_conf > f64::EPSILON {
            results
                .iter()
                .zip(&normalized)
                .map(|(r, w)| r.prediction * w * r.confidence)
                .sum::<f64>()
                / weighted_conf
        } else {
            results
                .iter()
                .zip(&normalized)
                .map(|(r, w)| r.prediction * w)
                .sum()
        };

        let bullish = results.iter().filter(|r| r.signal.is_bullish()).count() as f64;
        let bearish = results.iter().filter(|r| r.signal.is_bearish()).count() as f64;
        let signal = if bullish / n as f64 > settings.vote_threshold {
            Signal::Buy
        } else if bearish / n as f64 > settings.vote_threshold {
            Signal::Sell
        } else {
            Signal::Hold
        };

        let mut confidence = mean(&results.iter().map(|r| r.confidence).collect::<Vec<_>>());
        if settings.disagreement_discount {
            let center = mean(&predictions).abs();
            if center > f64::EPSILON {
                confidence /= 1.0 + std_dev(&predictions) / center;
            }
        }
        (consensus, signal, confidence)
    };

    let mut category_scores = BTreeMap::new();
    for category in ModelCategory::ALL {
        let confs: Vec<f64> = results
            .iter()
            .filter(|r| r.category == category)
            .map(|r| r.confidence)
            .collect();
        category_scores.insert(category, mean(&confs));
    }

    // Non-positive prints would turn the return series into inf/NaN.
    let priced: Vec<f64> = asset
        .historical_prices
        .iter()
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
        .collect();
    let volatility = realized_volatility(&priced);
    let risk = risk_metrics(&priced, asset.fundamentals.market.risk_free_rate);
    let prediction_spread = if n > 1 && asset.current_price > 0.0 {
        let hi = predictions.iter().copied().fold(f64::MIN, f64::max);
        let lo = predictions.iter().copied().fold(f64::MAX, f64::min);
        (hi - lo) / asset.current_price
    } else {
        0.0
    };
    let model_agreement = if n > 0 {
        let bullish = results.iter().filter(|r| r.signal.is_bullish()).count();
        let bearish = results.iter().filter(|r| r.signal.is_bearish()).count();
        let neutral = n - bullish - bearish;
        bullish.max(bearish).max(neutral) as f64 / n as f64
    } else {
        0.0
    };

    let model_weights: BTreeMap<String, f64> = results
        .iter()
        .zip(&normalized)
        .map(|(r, w)| (r.model_name.clone(), *w))
        .collect();
    let individual_predictions: BTreeMap<String, ModelResult> = results
        .into_iter()
        .map(|r| (r.model_name.clone(), r))
        .collect();

    EnsembleResult {
        symbol: asset.symbol.clone(),
        asset_class: asset.asset_class,
        current_price: asset.current_price,
        consensus_prediction: consensus,
        market_signal: signal,
        confidence_score: confidence.clamp(0.0, 1.0),
        category_scores,
        individual_predictions,
        model_weights,
        risk_assessment: RiskAssessment {
            volatility,
            prediction_spread,
            model_agreement,
            data_completeness: if requested > 0 {
                n as f64 / requested as f64
            } else {
                0.0
            },
            var_95: risk.var_95,
            cvar_95: risk.cvar_95,
            max_drawdown: max_drawdown(&priced),
        },
        market_regime: classify_regime(volatility),
        model_status: ModelStatus {
            requested,
            contributing: n,
            skipped,
            data_quality: match n {
                0 => DataQuality::None,
                1..=3 => DataQuality::Limited,
                _ => DataQuality::Good,
            },
        },
        backend: None,
        timestamp: Utc::now(),
    }
}

/// Immutable analysis context: registry, backend and per-class profiles.
/// Built once and shared; nothing in it changes after construction.
pub struct EnsembleContext {
    registry: ModelRegistry,
    settings: EnsembleSettings,
    profiles: BTreeMap<AssetClass, EnsembleProfile>,
    backend: EstimatorBackend,
}

impl EnsembleContext {
    pub fn from_settings(
        settings: &EnsembleSettings,
        models: &ModelSettings,
    ) -> Result<Self, ConfigError> {
        let backend = resolve_backend(settings.backend, "ensemble");
        Self::with_registry(ModelRegistry::standard(models, backend), settings.clone(), backend)
    }

    /// Builds a context over an arbitrary registry. Configured profiles are
    /// validated strictly; built-in profiles keep only registered models.
    pub fn with_registry(
        registry: ModelRegistry,
        settings: EnsembleSettings,
        backend: EstimatorBackend,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let mut profiles = BTreeMap::new();
        for (key, cfg) in &settings.profiles {
            let class = AssetClass::from_str(key).map_err(|detail| ConfigError::InvalidSetting {
                key: format!("ensemble.profiles.{}", key),
                detail,
            })?;
            let validated =
                validate_profile(&registry, &cfg.enabled, &cfg.weights, settings.default_weight)?;
            profiles.insert(class, validated);
        }
        for class in AssetClass::ALL {
            if profiles.contains_key(&class) {
                continue;
            }
            let builtin = default_profile(class);
            let enabled: Vec<String> = builtin
                .enabled
                .into_iter()
                .filter(|n| registry.contains(n))
                .collect();
            let weights: BTreeMap<String, f64> = builtin
                .weights
                .into_iter()
                .filter(|(n, _)| registry.contains(n))
                .collect();
            if let Ok(p) = validate_profile(&registry, &enabled, &weights, settings.default_weight) {
                profiles.insert(class, p);
            }
        }
        Ok(Self {
            registry,
            settings,
            profiles,
            backend,
        })
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &EnsembleSettings {
        &self.settings
    }

    pub fn backend(&self) -> EstimatorBackend {
        self.backend
    }

    pub fn profile(&self, class: AssetClass) -> Option<&EnsembleProfile> {
        self.profiles.get(&class)
    }

    /// The class profile, or the request's overrides validated against the
    /// registry.
    pub fn resolve_profile(&self, request: &AnalysisRequest) -> Result<EnsembleProfile, ConfigError> {
        let base = self.profiles.get(&request.asset.asset_class);
        if request.enabled_models.is_none() && request.model_weights.is_none() {
            return base.cloned().ok_or(ConfigError::NoModelsEnabled);
        }
        let enabled: Vec<String> = match (&request.enabled_models, &request.model_weights) {
            (Some(list), _) => list.clone(),
            (None, Some(weights)) => weights.keys().cloned().collect(),
            (None, None) => Vec::new(),
        };
        let weights = match (&request.model_weights, base) {
            (Some(w), _) => w.clone(),
            (None, Some(p)) => p.weights.clone(),
            (None, None) => BTreeMap::new(),
        };
        validate_profile(&self.registry, &enabled, &weights, self.settings.default_weight)
    }

    /// Runs every enabled model for the asset and aggregates the survivors.
    /// Only configuration problems are returned as errors.
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<EnsembleResult, ConfigError> {
        let profile = self.resolve_profile(request)?;
        let asset = &request.asset;

        let mut results = Vec::with_capacity(profile.enabled.len());
        let mut skipped = BTreeMap::new();
        for name in &profile.enabled {
            match self.registry.run(name, asset) {
                Ok(result) => results.push(result),
                Err(err) => {
                    debug!(model = %name, symbol = %asset.symbol, error = %err, "model skipped");
                    skipped.insert(name.clone(), err.to_string());
                }
            }
        }

        let mut result = combine(asset, results, skipped, &profile.weights, &self.settings);
        result.backend = Some(self.backend);
        Ok(result)
    }

    pub fn analyze_asset(&self, asset: AssetSeries) -> Result<EnsembleResult, ConfigError> {
        self.analyze(&AnalysisRequest::new(asset))
    }
}
