use quant_ensemble::model::{AssetClass, AssetSeries, EquityFundamentals, Fundamentals, MarketInputs, Signal};
use quant_ensemble::registry::PricingModel;
use quant_ensemble::valuation::capm::{
    capm_analysis, expected_return, validate_beta, CapmModel, RiskClass, SmlPosition,
};

#[test]
/// With a positive market premium, a higher beta always demands a higher return.
fn expected_return_increases_with_beta() {
    let mut prev = f64::MIN;
    for i in 0..=30 {
        let beta = i as f64 * 0.1;
        let er = expected_return(0.03, beta, 0.10);
        assert!(er > prev, "beta {} gave {} <= {}", beta, er, prev);
        prev = er;
    }
}

#[test]
fn beta_validation_replaces_and_clamps() {
    assert!((validate_beta(-0.5) - 1.0).abs() < f64::EPSILON);
    assert!((validate_beta(f64::NAN) - 1.0).abs() < f64::EPSILON);
    assert!((validate_beta(0.01) - 0.1).abs() < f64::EPSILON);
    assert!((validate_beta(7.0) - 3.0).abs() < f64::EPSILON);
    assert!((validate_beta(1.1) - 1.1).abs() < f64::EPSILON);
}

#[test]
/// Alpha above the band places the asset above the security market line.
fn analysis_classifies_alpha_and_risk() {
    let a = capm_analysis(1.0, 0.03, 0.10, 0.15, Some(0.20));
    assert!((a.expected_return - 0.10).abs() < 1e-12);
    assert_eq!(a.sml_position, SmlPosition::Above);
    assert_eq!(a.risk_class, RiskClass::Moderate);
    // 0.7 + 0.1 (beta band) + 0.05 (calm market)
    assert!((a.confidence - 0.85).abs() < 1e-12);

    let b = capm_analysis(2.0, 0.03, 0.10, 0.3, Some(0.0));
    assert_eq!(b.sml_position, SmlPosition::Below);
    assert_eq!(b.risk_class, RiskClass::Aggressive);

    let c = capm_analysis(0.5, 0.03, 0.10, 0.2, None);
    assert_eq!(c.sml_position, SmlPosition::On);
    assert_eq!(c.risk_class, RiskClass::Conservative);
}

#[test]
fn model_uses_supplied_actual_return() {
    let mut asset = AssetSeries::new("ACME", AssetClass::Equity, vec![50.0; 5]);
    asset.fundamentals = Fundamentals {
        equity: Some(EquityFundamentals {
            beta: 1.0,
            ..EquityFundamentals::default()
        }),
        market: MarketInputs {
            actual_return: Some(0.25),
            ..MarketInputs::default()
        },
        ..Fundamentals::default()
    };
    let r = CapmModel.compute(&asset).expect("capm result");
    assert_eq!(r.signal, Signal::Buy);
    assert!((r.prediction - 50.0 * 1.10).abs() < 1e-9);
    assert!(r.metadata.contains_key("alpha"));
}

#[test]
/// Without fundamentals or enough history CAPM still prices at beta 1.
fn model_without_history_holds() {
    let asset = AssetSeries::new("IDX", AssetClass::Index, vec![100.0; 5]);
    let r = CapmModel.compute(&asset).expect("capm result");
    assert_eq!(r.signal, Signal::Hold);
    assert!(!r.metadata.contains_key("alpha"));
}
