use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Signal {
    pub fn is_bullish(self) -> bool {
        matches!(self, Self::Buy | Self::StrongBuy)
    }

    pub fn is_bearish(self) -> bool {
        matches!(self, Self::Sell | Self::StrongSell)
    }

    /// Five-band signal from the upside of an intrinsic value over spot.
    pub fn from_upside(upside: f64) -> Self {
        if upside > 0.20 {
            Self::StrongBuy
        } else if upside > 0.10 {
            Self::Buy
        } else if upside > -0.10 {
            Self::Hold
        } else if upside > -0.20 {
            Self::Sell
        } else {
            Self::StrongSell
        }
    }

    /// Symmetric three-band signal around zero.
    pub fn from_deviation(deviation: f64, threshold: f64) -> Self {
        if deviation > threshold {
            Self::Buy
        } else if deviation < -threshold {
            Self::Sell
        } else {
            Self::Hold
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    Fundamental,
    Technical,
    Onchain,
    Ml,
}

impl ModelCategory {
    pub const ALL: [ModelCategory; 4] = [
        ModelCategory::Fundamental,
        ModelCategory::Technical,
        ModelCategory::Onchain,
        ModelCategory::Ml,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fundamental => "fundamental",
            Self::Technical => "technical",
            Self::Onchain => "onchain",
            Self::Ml => "ml",
        }
    }
}

/// Output of one valuation primitive or statistical wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub model_name: String,
    pub category: ModelCategory,
    pub prediction: f64,
    pub confidence: f64,
    pub signal: Signal,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl ModelResult {
    pub fn new(
        model_name: &str,
        category: ModelCategory,
        prediction: f64,
        confidence: f64,
        signal: Signal,
    ) -> Self {
        Self {
            model_name: model_name.to_string(),
            category,
            prediction,
            confidence: if confidence.is_finite() {
                confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
            signal,
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Zero-confidence HOLD carrying the failure reason.
    pub fn fallback(
        model_name: &str,
        category: ModelCategory,
        current_price: f64,
        err: &ModelError,
    ) -> Self {
        Self::new(model_name, category, current_price, 0.0, Signal::Hold)
            .with("error", err.to_string())
            .with("error_kind", err.kind())
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn is_fallback(&self) -> bool {
        self.metadata.contains_key("error")
    }

    /// Equality ignoring the creation timestamp.
    pub fn same_outcome(&self, other: &Self) -> bool {
        self.model_name == other.model_name
            && self.category == other.category
            && self.prediction.to_bits() == other.prediction.to_bits()
            && self.confidence.to_bits() == other.confidence.to_bits()
            && self.signal == other.signal
            && self.metadata == other.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upside_bands() {
        assert_eq!(Signal::from_upside(0.25), Signal::StrongBuy);
        assert_eq!(Signal::from_upside(0.15), Signal::Buy);
        assert_eq!(Signal::from_upside(0.0), Signal::Hold);
        assert_eq!(Signal::from_upside(-0.15), Signal::Sell);
        assert_eq!(Signal::from_upside(-0.5), Signal::StrongSell);
    }

    #[test]
    fn signal_wire_names() {
        assert_eq!(
            serde_json::to_string(&Signal::StrongBuy).unwrap(),
            "\"STRONG_BUY\""
        );
        assert_eq!(
            serde_json::to_string(&ModelCategory::Onchain).unwrap(),
            "\"onchain\""
        );
    }

    #[test]
    fn confidence_is_clamped() {
        let r = ModelResult::new("x", ModelCategory::Ml, 1.0, 1.7, Signal::Hold);
        assert_eq!(r.confidence, 1.0);
        let r = ModelResult::new("x", ModelCategory::Ml, 1.0, f64::NAN, Signal::Hold);
        assert_eq!(r.confidence, 0.0);
    }
}
