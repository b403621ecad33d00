use quant_ensemble::model::{
    AssetClass, AssetSeries, EconomicIndicators, ForexFundamentals, Fundamentals, Signal,
};
use quant_ensemble::registry::PricingModel;
use quant_ensemble::valuation::forex::{
    balance_of_payments, balance_score, interest_rate_parity, monetary_model, monetary_strength,
    ppp_confidence, purchasing_power_parity, ForexSettings, InterestRateParityModel, MonetaryModel,
    PurchasingPowerParityModel,
};

fn pair(prices: Vec<f64>, base: EconomicIndicators, quote: EconomicIndicators) -> AssetSeries {
    AssetSeries::new("EURUSD", AssetClass::Forex, prices).with_fundamentals(Fundamentals {
        forex: Some(ForexFundamentals {
            base,
            quote,
            forward_horizon_years: 0.25,
        }),
        ..Fundamentals::default()
    })
}

#[test]
/// Equal inflation leaves the PPP rate where the sample started.
fn ppp_equal_inflation_keeps_initial_rate() {
    let e = EconomicIndicators::default();
    let fv = purchasing_power_parity(1.10, 1.20, 252, &e, &e);
    assert!((fv.theoretical_rate - 1.10).abs() < 1e-12);
    assert!((fv.deviation - (1.10 - 1.20) / 1.20).abs() < 1e-12);
    // A year of prices, no inflation gap.
    assert!((fv.confidence - 0.5).abs() < 1e-12);
}

#[test]
fn ppp_inflation_gap_moves_rate() {
    let base = EconomicIndicators {
        inflation_rate: 0.02,
        ..EconomicIndicators::default()
    };
    let quote = EconomicIndicators {
        inflation_rate: 0.05,
        ..EconomicIndicators::default()
    };
    let fv = purchasing_power_parity(1.0, 1.0, 252, &base, &quote);
    assert!((fv.theoretical_rate - 1.05 / 1.02).abs() < 1e-12);
    assert!((fv.confidence - 0.6).abs() < 1e-12);
}

#[test]
/// Confidence grows with history depth: a year adds 0.1, five years 0.2.
fn ppp_confidence_follows_data_depth() {
    assert!((ppp_confidence(100, 0.0) - 0.4).abs() < 1e-12);
    assert!((ppp_confidence(252, 0.0) - 0.5).abs() < 1e-12);
    assert!((ppp_confidence(1259, 0.0) - 0.5).abs() < 1e-12);
    assert!((ppp_confidence(1260, 0.0) - 0.6).abs() < 1e-12);
    assert!((ppp_confidence(1260, -0.03) - 0.7).abs() < 1e-12);
    assert!((ppp_confidence(20, 0.01) - 0.4).abs() < 1e-12);
}

#[test]
fn irp_forward_follows_rate_differential() {
    let base = EconomicIndicators {
        interest_rate: 0.01,
        ..EconomicIndicators::default()
    };
    let quote = EconomicIndicators {
        interest_rate: 0.05,
        ..EconomicIndicators::default()
    };
    let fv = interest_rate_parity(1.10, 1.0, &base, &quote);
    assert!((fv.theoretical_rate - 1.10 * 1.05 / 1.01).abs() < 1e-12);
    assert!(fv.deviation > 0.0);
}

#[test]
fn identical_economies_are_neutral() {
    let e = EconomicIndicators::default();
    assert!(monetary_strength(&e, &e).abs() < f64::EPSILON);
    let (fv, strength) = monetary_model(1.25, &e, &e);
    assert!((fv.theoretical_rate - 1.25).abs() < 1e-12);
    assert!(strength.abs() < f64::EPSILON);
    assert!((fv.confidence - 0.3).abs() < 1e-12);
    // Only political stability contributes for a default economy.
    assert!((balance_score(&e) - 0.04).abs() < 1e-12);
}

#[test]
/// Base score 0.175 + 0.35 + 0.1 + 0.04 against the default 0.04 gives a
/// relative strength of 0.625.
fn bop_fair_rate_tracks_relative_balance() {
    let base = EconomicIndicators {
        current_account_balance: 50_000.0,
        trade_balance: 100_000.0,
        foreign_reserves: 250_000.0,
        ..EconomicIndicators::default()
    };
    let quote = EconomicIndicators::default();
    assert!((balance_score(&base) - 0.665).abs() < 1e-12);

    let (fv, relative) = balance_of_payments(1.2, 0.15, &base, &quote);
    assert!((relative - 0.625).abs() < 1e-12);
    assert!((fv.theoretical_rate - 1.2 * (1.0 + 0.15 * 0.625)).abs() < 1e-12);
    // Capped 0.8 signal strength times 0.7 stability, growth rates equal.
    assert!((fv.confidence - 0.56).abs() < 1e-12);

    let (mirror, mirror_relative) = balance_of_payments(1.2, 0.15, &quote, &base);
    assert!((mirror_relative + 0.625).abs() < 1e-12);
    assert!(mirror.deviation < 0.0);
}

#[test]
/// Only the interest gap differs, so the rate moves by exp(0.10) and the
/// strength saturates at 0.30 from the interest term alone.
fn monetary_rate_follows_interest_differential() {
    let base = EconomicIndicators {
        interest_rate: 0.12,
        ..EconomicIndicators::default()
    };
    let quote = EconomicIndicators::default();
    let (fv, strength) = monetary_model(1.5, &base, &quote);
    assert!((strength - 0.3).abs() < 1e-12);
    assert!((fv.theoretical_rate - 1.5 * 0.1_f64.exp()).abs() < 1e-12);
    // min(10 * deviation, 0.8) * min(0.3 + 0.3, 0.9) * 0.7 stability.
    assert!((fv.confidence - 0.8 * 0.6 * 0.7).abs() < 1e-12);
}

#[test]
/// A rate that rallied 20% with no inflation gap reads as overvalued.
fn ppp_model_flags_overvaluation() {
    let prices: Vec<f64> = (0..=252).map(|i| 1.0 + 0.2 * i as f64 / 252.0).collect();
    let e = EconomicIndicators::default();
    let asset = pair(prices, e.clone(), e);
    let r = PurchasingPowerParityModel::new(ForexSettings::default())
        .compute(&asset)
        .expect("ppp result");
    assert_eq!(r.signal, Signal::Sell);
    assert!((r.prediction - 1.0).abs() < 1e-12);
}

#[test]
fn models_require_forex_fundamentals() {
    let asset = AssetSeries::new("EURUSD", AssetClass::Forex, vec![1.1; 10]);
    let irp = InterestRateParityModel::new(ForexSettings::default());
    let monetary = MonetaryModel::new(ForexSettings::default());
    assert_eq!(irp.compute(&asset).expect_err("missing").kind(), "invalid_input");
    assert_eq!(monetary.compute(&asset).expect_err("missing").kind(), "invalid_input");
}
