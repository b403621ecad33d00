use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ensemble::{EnsembleContext, EnsembleSettings};
use crate::error::ConfigError;
use crate::portfolio::{MonteCarloSettings, PortfolioSettings};
use crate::registry::ModelSettings;
use crate::store::{ResultStore, StoreSettings};

pub const CONFIG_PATH_ENV: &str = "QUANT_ENSEMBLE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub ensemble: EnsembleSettings,
    pub models: ModelSettings,
    pub portfolio: PortfolioSettings,
    pub monte_carlo: MonteCarloSettings,
    pub store: StoreSettings,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

fn invalid(key: &str, detail: String) -> ConfigError {
    ConfigError::InvalidSetting {
        key: key.to_string(),
        detail,
    }
}

impl Config {
    /// Reads `config/default.toml`, or the file named by
    /// `QUANT_ENSEMBLE_CONFIG`, after loading `.env`.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config = Self::parse(&config_str)
            .with_context(|| format!("invalid configuration in {}", config_path.display()))?;
        Ok(config)
    }

    pub fn parse(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("failed to parse config toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks scalar settings. Profiles are checked against the registry
    /// when the context is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ensemble.validate()?;
        self.portfolio.validate()?;
        self.monte_carlo.validate()?;

        let m = &self.models;
        if m.sequence.sequence_length < 2 {
            return Err(invalid(
                "models.sequence.sequence_length",
                format!("{} is below 2", m.sequence.sequence_length),
            ));
        }
        if !(0.0..1.0).contains(&m.sequence.validation_split) {
            return Err(invalid(
                "models.sequence.validation_split",
                format!("{} is outside [0, 1)", m.sequence.validation_split),
            ));
        }
        if m.garch.alpha < 0.0 || m.garch.beta < 0.0 || m.garch.alpha + m.garch.beta >= 1.0 {
            return Err(invalid(
                "models.garch",
                format!(
                    "alpha={} beta={} must be non-negative with alpha+beta < 1",
                    m.garch.alpha, m.garch.beta
                ),
            ));
        }
        if m.garch.omega <= 0.0 {
            return Err(invalid("models.garch.omega", format!("{} must be positive", m.garch.omega)));
        }
        if m.dcf.projection_years == 0 {
            return Err(invalid("models.dcf.projection_years", "must be at least 1".to_string()));
        }
        if !(0.0..1.0).contains(&m.dcf.tax_rate) {
            return Err(invalid(
                "models.dcf.tax_rate",
                format!("{} is outside [0, 1)", m.dcf.tax_rate),
            ));
        }
        for (key, threshold) in [
            ("models.forex.ppp_threshold", m.forex.ppp_threshold),
            ("models.forex.irp_threshold", m.forex.irp_threshold),
            ("models.forex.bop_threshold", m.forex.bop_threshold),
            ("models.forex.monetary_threshold", m.forex.monetary_threshold),
        ] {
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(invalid(key, format!("{} must be positive", threshold)));
            }
        }
        if self.server.bind.trim().is_empty() {
            return Err(invalid("server.bind", "cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn build_context(&self) -> Result<EnsembleContext, ConfigError> {
        EnsembleContext::from_settings(&self.ensemble, &self.models)
    }

    /// Opens the result store when enabled. Open failures disable the store.
    pub fn open_store(&self) -> Option<ResultStore> {
        if !self.store.enabled {
            return None;
        }
        match ResultStore::open(&self.store.path) {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!(path = %self.store.path, error = %e, "result store disabled");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_toml_uses_defaults() {
        let config = Config::parse("[logging]\nlevel = \"debug\"\n").expect("parse");
        assert_eq!(config.logging.level, "debug");
        assert!((config.ensemble.vote_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.monte_carlo.num_simulations, 1000);
        assert_eq!(config.portfolio.iterations, 50);
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn rejects_vote_threshold_out_of_range() {
        let err = Config::parse("[ensemble]\nvote_threshold = 1.5\n").expect_err("should fail");
        assert!(format!("{:#}", err).contains("vote_threshold"));
    }

    #[test]
    fn rejects_explosive_garch() {
        let err = Config::parse("[models.garch]\nalpha = 0.5\nbeta = 0.6\n").expect_err("should fail");
        assert!(format!("{:#}", err).contains("models.garch"));
    }

    #[test]
    fn rejects_short_sequence_length() {
        let err = Config::parse("[models.sequence]\nsequence_length = 1\n").expect_err("should fail");
        assert!(format!("{:#}", err).contains("sequence_length"));
    }
}
