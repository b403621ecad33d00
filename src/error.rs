use thiserror::Error;

/// Per-model computation failure. Never crosses the aggregator boundary;
/// it is either folded into a fallback `ModelResult` or recorded as a skip.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("{model}: insufficient data (need {required} points, have {available})")]
    InsufficientData {
        model: String,
        required: usize,
        available: usize,
    },

    #[error("{model}: numeric instability: {detail}")]
    NumericInstability { model: String, detail: String },

    #[error("{model}: invalid input: {detail}")]
    InvalidInput { model: String, detail: String },
}

impl ModelError {
    pub fn insufficient(model: &str, required: usize, available: usize) -> Self {
        Self::InsufficientData {
            model: model.to_string(),
            required,
            available,
        }
    }

    pub fn unstable(model: &str, detail: impl Into<String>) -> Self {
        Self::NumericInstability {
            model: model.to_string(),
            detail: detail.into(),
        }
    }

    pub fn invalid(model: &str, detail: impl Into<String>) -> Self {
        Self::InvalidInput {
            model: model.to_string(),
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientData { .. } => "insufficient_data",
            Self::NumericInstability { .. } => "numeric_instability",
            Self::InvalidInput { .. } => "invalid_input",
        }
    }
}

/// Caller misconfiguration. This is the only error class that surfaces
/// out of an analysis request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("no models enabled")]
    NoModelsEnabled,

    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error("invalid weight for '{model}': {weight}")]
    InvalidWeight { model: String, weight: f64 },

    #[error("model weights sum to zero")]
    ZeroWeightSum,

    #[error("invalid setting {key}: {detail}")]
    InvalidSetting { key: String, detail: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
