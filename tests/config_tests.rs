use std::path::Path;

use quant_ensemble::config::Config;
use quant_ensemble::error::ConfigError;
use quant_ensemble::model::AssetClass;

fn shipped_config() -> Config {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
    Config::load_from(&path).expect("shipped config should load")
}

#[test]
/// The shipped config parses, validates and builds a context whose equity
/// profile weights sum to one.
fn shipped_config_builds_context() {
    let config = shipped_config();
    assert!((config.portfolio.risk_free_rate - 0.02).abs() < f64::EPSILON);
    assert_eq!(config.monte_carlo.seed, 42);

    let ctx = config.build_context().expect("context should build");
    let equity = ctx.profile(AssetClass::Equity).expect("equity profile");
    assert_eq!(equity.enabled.len(), 9);
    let total: f64 = equity.weights.values().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!((equity.weights["dcf"] - 0.25).abs() < 1e-9);
}

#[test]
/// Classes the file does not configure still get a built-in profile.
fn unconfigured_classes_use_builtin_profiles() {
    let ctx = shipped_config().build_context().expect("context should build");
    let index = ctx.profile(AssetClass::Index).expect("index profile");
    assert!(index.enabled.contains(&"capm".to_string()));
    assert!(ctx.profile(AssetClass::Futures).is_some());
}

#[test]
fn profile_with_unknown_model_fails_context_build() {
    let config = Config::parse(
        r#"
        [ensemble.profiles.equity]
        enabled = ["dcf", "astrology"]
        "#,
    )
    .expect("scalar settings are valid");
    let err = config.build_context().err().expect("should fail");
    assert_eq!(err, ConfigError::UnknownModel("astrology".to_string()));
}

#[test]
fn negative_profile_weight_fails_context_build() {
    let config = Config::parse(
        r#"
        [ensemble.profiles.crypto]
        enabled = ["mvrv"]
        [ensemble.profiles.crypto.weights]
        mvrv = -0.5
        "#,
    )
    .expect("scalar settings are valid");
    assert!(matches!(
        config.build_context(),
        Err(ConfigError::InvalidWeight { .. })
    ));
}

#[test]
fn unknown_asset_class_key_is_rejected() {
    let config = Config::parse(
        r#"
        [ensemble.profiles.bonds]
        enabled = ["capm"]
        "#,
    )
    .expect("scalar settings are valid");
    assert!(matches!(
        config.build_context(),
        Err(ConfigError::InvalidSetting { .. })
    ));
}

#[test]
fn invalid_portfolio_step_is_rejected() {
    let err = Config::parse("[portfolio]\nstep = 0.0\n").expect_err("should fail");
    assert!(format!("{:#}", err).contains("portfolio.step"));
}
