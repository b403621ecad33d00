use quant_ensemble::model::{AssetClass, AssetSeries, Fundamentals, ModelCategory, OnChainMetrics, Signal};
use quant_ensemble::registry::PricingModel;
use quant_ensemble::valuation::crypto::{
    log_regression, metcalfe_value, mvrv_signal, puell_signal, stock_to_flow_price, CryptoSettings,
    MvrvModel, PuellMultipleModel, StockToFlowModel,
};

fn coin(prices: Vec<f64>, onchain: OnChainMetrics) -> AssetSeries {
    AssetSeries::new("BTC", AssetClass::Crypto, prices).with_fundamentals(Fundamentals {
        onchain: Some(onchain),
        ..Fundamentals::default()
    })
}

#[test]
fn stock_to_flow_power_law() {
    let settings = CryptoSettings::default();
    let (ratio, price) = stock_to_flow_price(19_000_000.0, 328_500.0, &settings).expect("s2f");
    let expected_ratio = 19_000_000.0 / 328_500.0;
    assert!((ratio - expected_ratio).abs() < 1e-9);
    assert!((price - (3.3 * expected_ratio.ln() - 15.7).exp()).abs() < 1e-9);
    assert!(stock_to_flow_price(1.0, 0.0, &settings).is_err());
}

#[test]
/// Model price far above spot is a buy; missing issuance is invalid input.
fn stock_to_flow_model_signal() {
    let metrics = OnChainMetrics {
        circulating_supply: Some(19_000_000.0),
        annual_issuance: Some(164_250.0),
        ..OnChainMetrics::default()
    };
    let (_, price) =
        stock_to_flow_price(19_000_000.0, 164_250.0, &CryptoSettings::default()).expect("s2f");
    let asset = coin(vec![price / 2.0; 5], metrics);
    let model = StockToFlowModel::new(CryptoSettings::default());
    let r = model.compute(&asset).expect("s2f result");
    assert_eq!(r.signal, Signal::Buy);
    assert_eq!(r.category, ModelCategory::Fundamental);

    let bare = coin(vec![100.0; 5], OnChainMetrics::default());
    assert_eq!(model.compute(&bare).expect_err("missing").kind(), "invalid_input");
}

#[test]
/// With a flat address count the Metcalfe value is the mean price.
fn metcalfe_flat_network_returns_mean_price() {
    let prices: Vec<f64> = (1..=20).map(|i| i as f64).collect();
    let addresses = vec![1000.0; 20];
    let v = metcalfe_value(&prices, &addresses).expect("metcalfe");
    assert!((v - 10.5).abs() < 1e-9);

    let err = metcalfe_value(&prices, &addresses[..5]).expect_err("too short");
    assert_eq!(err.kind(), "insufficient_data");
}

#[test]
fn mvrv_and_puell_bands() {
    assert_eq!(mvrv_signal(3.5), Signal::StrongSell);
    assert_eq!(mvrv_signal(2.5), Signal::Sell);
    assert_eq!(mvrv_signal(1.5), Signal::Hold);
    assert_eq!(mvrv_signal(1.0), Signal::Buy);
    assert_eq!(mvrv_signal(0.5), Signal::StrongBuy);

    assert_eq!(puell_signal(5.0), Signal::StrongSell);
    assert_eq!(puell_signal(3.0), Signal::Sell);
    assert_eq!(puell_signal(1.0), Signal::Hold);
    assert_eq!(puell_signal(0.4), Signal::Buy);
    assert_eq!(puell_signal(0.2), Signal::StrongBuy);
}

#[test]
fn mvrv_model_prices_at_realized_value() {
    let asset = coin(
        vec![60_000.0; 3],
        OnChainMetrics {
            mvrv_ratio: Some(2.4),
            ..OnChainMetrics::default()
        },
    );
    let r = MvrvModel.compute(&asset).expect("mvrv result");
    assert!((r.prediction - 25_000.0).abs() < 1e-6);
    assert_eq!(r.signal, Signal::Sell);
    assert_eq!(r.category, ModelCategory::Onchain);
}

#[test]
/// Spot at several times its yearly average is a sell.
fn puell_model_spike_sells() {
    let mut prices = vec![100.0; 59];
    prices.push(350.0);
    let asset = coin(prices, OnChainMetrics::default());
    let r = PuellMultipleModel.compute(&asset).expect("puell result");
    let yearly_mean = (59.0 * 100.0 + 350.0) / 60.0;
    assert!((r.prediction - yearly_mean).abs() < 1e-9);
    assert_eq!(r.signal, Signal::Sell);
}

#[test]
/// A series generated from the regression form is recovered almost exactly.
fn log_regression_recovers_generating_curve() {
    let prices: Vec<f64> = (0..200)
        .map(|t| {
            let t = t as f64;
            (1.0 + 0.8 * (t + 1.0).ln() + 0.3 * t / 365.25).exp()
        })
        .collect();
    let fit = log_regression(&prices).expect("fit");
    let last = prices[prices.len() - 1];
    assert!((fit.fair_value - last).abs() / last < 1e-4);
    assert!(fit.residual_std < 1e-4);
    assert!(fit.lower_band <= fit.fair_value && fit.fair_value <= fit.upper_band);
}
