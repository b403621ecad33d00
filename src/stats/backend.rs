use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Backend requested through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    #[default]
    Auto,
    Library,
    Simplified,
}

/// Estimator strategy shared by every statistical wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorBackend {
    LibraryBacked,
    SimplifiedFallback,
}

impl EstimatorBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LibraryBacked => "library_backed",
            Self::SimplifiedFallback => "simplified_fallback",
        }
    }
}

/// True when the binary was built with the ndarray-backed estimators.
pub fn library_available() -> bool {
    cfg!(feature = "fitted")
}

pub fn resolve_backend(requested: BackendPreference, context: &str) -> EstimatorBackend {
    match requested {
        BackendPreference::Auto => {
            if library_available() {
                info!("Estimator backend=auto for {} -> selected library_backed", context);
                EstimatorBackend::LibraryBacked
            } else {
                info!(
                    "Estimator backend=auto for {} -> selected simplified_fallback",
                    context
                );
                EstimatorBackend::SimplifiedFallback
            }
        }
        BackendPreference::Library => {
            if library_available() {
                info!("Estimator backend=library for {}", context);
                EstimatorBackend::LibraryBacked
            } else {
                warn!(
                    "Estimator backend=library requested for {}, but binary lacks the fitted feature. Falling back to simplified.",
                    context
                );
                EstimatorBackend::SimplifiedFallback
            }
        }
        BackendPreference::Simplified => {
            info!("Estimator backend=simplified for {}", context);
            EstimatorBackend::SimplifiedFallback
        }
    }
}
