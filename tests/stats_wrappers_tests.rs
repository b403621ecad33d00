use quant_ensemble::model::{AssetClass, AssetSeries, ModelCategory, Signal};
use quant_ensemble::registry::PricingModel;
use quant_ensemble::stats::backend::{
    library_available, resolve_backend, BackendPreference, EstimatorBackend,
};
use quant_ensemble::stats::garch::{garch_recursion, GarchModel, GarchSettings};
use quant_ensemble::stats::predictor::{
    AttentionPredictor, BoostedPredictor, SequencePredictor, SequenceSettings,
};
use quant_ensemble::stats::regime::{
    classify_regime, detect_regime, realized_volatility, MarketRegime, RegimeSwitchingModel,
};
use quant_ensemble::stats::risk_metrics::{risk_metrics, RiskMetricsModel};

const SIMPLE: EstimatorBackend = EstimatorBackend::SimplifiedFallback;

/// Deterministic wiggly series with a small drift.
fn wiggle(n: usize, drift: f64, amplitude: f64) -> Vec<f64> {
    let mut p = 100.0;
    let mut out = Vec::with_capacity(n);
    for t in 0..n {
        out.push(p);
        p *= (drift + amplitude * (t as f64 * 1.7).sin()).exp();
    }
    out
}

fn asset(prices: Vec<f64>) -> AssetSeries {
    AssetSeries::new("TEST", AssetClass::Equity, prices)
}

#[test]
fn backend_resolution_honours_capability() {
    assert_eq!(resolve_backend(BackendPreference::Simplified, "test"), SIMPLE);
    let expected = if library_available() {
        EstimatorBackend::LibraryBacked
    } else {
        SIMPLE
    };
    assert_eq!(resolve_backend(BackendPreference::Library, "test"), expected);
    assert_eq!(resolve_backend(BackendPreference::Auto, "test"), expected);
}

#[test]
/// The simplified sequence model extrapolates a straight price line upward.
fn sequence_trend_fallback_follows_line() {
    let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
    let model = SequencePredictor::new(SequenceSettings::default(), SIMPLE);
    let r = model.compute(&asset(prices)).expect("lstm result");
    assert_eq!(r.signal, Signal::Buy);
    assert_eq!(r.category, ModelCategory::Ml);
    assert!((r.prediction - 160.0).abs() < 1e-6);
    assert!((r.confidence - 0.8).abs() < 1e-9);
}

#[test]
fn ewma_and_persistence_fallbacks_track_drift() {
    let up: Vec<f64> = (0..80).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
    let down: Vec<f64> = (0..80).map(|i| 100.0 * 0.99_f64.powi(i)).collect();

    let attention = AttentionPredictor::new(SequenceSettings::default(), SIMPLE);
    let f = attention.forecast(&up).expect("forecast");
    assert!((f.expected_return - 1.01_f64.ln()).abs() < 1e-9);

    let boosted = BoostedPredictor::new(SequenceSettings::default(), SIMPLE);
    let r = boosted.compute(&asset(down)).expect("xgboost result");
    assert_eq!(r.signal, Signal::Sell);
    assert!((r.confidence - 0.4).abs() < 1e-9);
}

#[test]
/// Fitted estimators carry no hidden randomness: repeated runs agree.
fn fitted_wrappers_are_repeatable() {
    let a = asset(wiggle(200, 0.0005, 0.015));
    let models: Vec<Box<dyn PricingModel>> = vec![
        Box::new(SequencePredictor::new(SequenceSettings::default(), EstimatorBackend::LibraryBacked)),
        Box::new(BoostedPredictor::new(SequenceSettings::default(), EstimatorBackend::LibraryBacked)),
        Box::new(AttentionPredictor::new(SequenceSettings::default(), EstimatorBackend::LibraryBacked)),
        Box::new(GarchModel::new(GarchSettings::default(), EstimatorBackend::LibraryBacked)),
    ];
    for m in &models {
        match (m.compute(&a), m.compute(&a)) {
            (Ok(x), Ok(y)) => assert!(x.same_outcome(&y), "{} differs", m.name()),
            (Err(x), Err(y)) => assert_eq!(x, y),
            _ => panic!("{} was not repeatable", m.name()),
        }
    }
}

#[test]
fn sequence_models_need_enough_history() {
    let model = SequencePredictor::new(SequenceSettings::default(), SIMPLE);
    let err = model.compute(&asset(vec![100.0; 20])).expect_err("too short");
    assert_eq!(err.kind(), "insufficient_data");
}

#[test]
fn garch_recursion_forecast_reverts_to_long_run() {
    let prices = wiggle(120, 0.0, 0.02);
    let returns: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let fit = garch_recursion(&returns, 1e-5, 0.1, 0.85, 200).expect("fit");
    assert_eq!(fit.conditional_volatility.len(), returns.len());
    let long_run = fit.long_run_volatility(&returns);
    let last = fit.forecast[fit.forecast.len() - 1];
    assert!((last - long_run).abs() < 1e-3);
    assert!(fit.persistence() < 1.0);
}

#[test]
/// Multi-step forecasts carry alpha through the expected squared shock, so
/// the horizon end sits at sqrt(omega / (1 - alpha - beta)), not at the
/// beta-only level.
fn garch_forecast_uses_full_persistence() {
    let returns: Vec<f64> = (0..200)
        .map(|t| if t % 2 == 0 { 0.01 } else { -0.01 })
        .collect();
    let (omega, alpha, beta) = (1e-5, 0.1, 0.85);
    let fit = garch_recursion(&returns, omega, alpha, beta, 500).expect("fit");

    let last_vol = fit.conditional_volatility[returns.len() - 1];
    let first = (omega + alpha * 0.01_f64.powi(2) + beta * last_vol * last_vol).sqrt();
    assert!((fit.forecast[0] - first).abs() < 1e-15);

    let second = (omega + (alpha + beta) * first * first).sqrt();
    assert!((fit.forecast[1] - second).abs() < 1e-15);

    let long_run = (omega / (1.0 - alpha - beta)).sqrt();
    let beta_only = (omega / (1.0 - beta)).sqrt();
    let end = fit.forecast[fit.forecast.len() - 1];
    assert!((end - long_run).abs() < 1e-6);
    assert!((end - beta_only).abs() > 1e-3);
}

#[test]
fn garch_model_prices_at_spot() {
    let prices = wiggle(120, 0.0, 0.02);
    let spot = prices[prices.len() - 1];
    let model = GarchModel::new(GarchSettings::default(), SIMPLE);
    let r = model.compute(&asset(prices)).expect("garch result");
    assert!((r.prediction - spot).abs() < 1e-12);
    assert!((r.confidence - 0.45).abs() < 1e-12);
    assert_eq!(r.metadata.get("backend").and_then(|v| v.as_str()), Some("simplified_fallback"));
}

#[test]
/// Flat prices give a zero starting variance, which the recursion rejects.
fn garch_flat_series_is_unstable() {
    let model = GarchModel::new(GarchSettings::default(), SIMPLE);
    let err = model.compute(&asset(vec![50.0; 60])).expect_err("flat");
    assert_eq!(err.kind(), "numeric_instability");
}

#[test]
fn regime_thresholds() {
    assert_eq!(classify_regime(0.1), MarketRegime::LowVolatility);
    assert_eq!(classify_regime(0.5), MarketRegime::Normal);
    assert_eq!(classify_regime(1.2), MarketRegime::HighVolatility);
    assert!(realized_volatility(&[100.0; 30]).abs() < f64::EPSILON);
    assert!(realized_volatility(&wiggle(100, 0.0, 0.1)) > 0.8);
}

#[test]
fn regime_switching_detects_state_and_drift() {
    let prices = wiggle(120, 0.002, 0.01);
    let state = detect_regime(&prices).expect("regime");
    assert!(state.daily_drift > 0.0);
    assert!((0.0..=1.0).contains(&state.persistence));

    let r = RegimeSwitchingModel.compute(&asset(prices)).expect("regime result");
    assert!(r.confidence >= 0.3 && r.confidence <= 0.8);
    assert!(r.metadata.contains_key("state"));
}

#[test]
fn risk_metrics_tail_and_drawdown() {
    let m = risk_metrics(&[100.0, 120.0, 60.0, 90.0], 0.0);
    assert!((m.max_drawdown + 0.5).abs() < 1e-12);
    assert!(m.cvar_95 <= m.var_95);

    let falling: Vec<f64> = wiggle(90, -0.004, 0.01);
    let r = RiskMetricsModel.compute(&asset(falling)).expect("risk result");
    assert_eq!(r.signal, Signal::Sell);
}
