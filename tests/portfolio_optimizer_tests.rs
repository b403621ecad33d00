use quant_ensemble::model::{AssetClass, AssetSeries, Signal};
use quant_ensemble::portfolio::estimate::estimate_returns;
use quant_ensemble::portfolio::optimizer::{
    risk_contributions, risk_parity_weights, sharpe_weights,
};
use quant_ensemble::portfolio::{optimize, AllocationMethod, PortfolioSettings};

/// Prices whose log returns repeat `pattern` scaled by `step`. Patterns of
/// period four that are mutually orthogonal give uncorrelated series of
/// equal volatility.
fn patterned(symbol: &str, pattern: [f64; 4], step: f64, len: usize) -> AssetSeries {
    let mut prices = Vec::with_capacity(len);
    let mut log_price = 100.0_f64.ln();
    prices.push(log_price.exp());
    for t in 1..len {
        log_price += pattern[(t - 1) % 4] * step;
        prices.push(log_price.exp());
    }
    AssetSeries::new(symbol, AssetClass::Equity, prices)
}

fn three_uncorrelated() -> Vec<AssetSeries> {
    vec![
        patterned("AAA", [1.0, -1.0, 1.0, -1.0], 0.01, 201),
        patterned("BBB", [1.0, 1.0, -1.0, -1.0], 0.01, 201),
        patterned("CCC", [1.0, -1.0, -1.0, 1.0], 0.01, 201),
    ]
}

#[test]
/// Orthogonal return patterns estimate as uncorrelated with equal variance.
fn estimates_align_and_annualize() {
    let est = estimate_returns(&three_uncorrelated(), 30, 252);
    assert_eq!(est.len(), 3);
    assert!(est.skipped.is_empty());
    for row in &est.daily_returns {
        assert_eq!(row.len(), 200);
    }
    let daily_var = 0.0001 * 200.0 / 199.0;
    for i in 0..3 {
        assert!((est.covariance[i][i] - daily_var * 252.0).abs() < 1e-9);
        for j in 0..3 {
            if i != j {
                assert!(est.covariance[i][j].abs() < 1e-12);
            }
        }
    }
}

#[test]
fn short_or_broken_series_are_skipped() {
    let mut broken = patterned("BAD", [1.0, -1.0, 1.0, -1.0], 0.01, 60);
    broken.historical_prices[10] = -1.0;
    let assets = vec![
        patterned("AAA", [1.0, -1.0, 1.0, -1.0], 0.01, 60),
        patterned("SHORT", [1.0, -1.0, 1.0, -1.0], 0.01, 10),
        broken,
    ];
    let est = estimate_returns(&assets, 30, 252);
    assert_eq!(est.symbols, vec!["AAA".to_string()]);
    assert_eq!(est.skipped, vec!["SHORT".to_string(), "BAD".to_string()]);
}

#[test]
/// Equal-volatility uncorrelated assets already have equal risk shares, so
/// every candidate allocation is the equal split.
fn uncorrelated_equal_vol_assets_split_evenly() {
    let report = optimize(&three_uncorrelated(), &PortfolioSettings::default());
    assert!(report.error.is_none());
    assert_eq!(report.candidates.len(), 3);
    assert_eq!(report.candidates[0].method, AllocationMethod::EqualWeight);
    assert_eq!(report.candidates[1].method, AllocationMethod::RiskParity);
    assert_eq!(report.candidates[2].method, AllocationMethod::MaxSharpe);
    for candidate in &report.candidates {
        for w in &candidate.weights {
            assert!((w - 1.0 / 3.0).abs() < 1e-6);
        }
    }
    assert!((report.diversification_ratio - 3.0).abs() < 1e-6);
    // Flat drift is below the risk-free rate.
    assert!(report.sharpe_ratio < 0.0);
    assert_eq!(report.signal, Signal::Sell);
    assert!(report.confidence >= 0.3 && report.confidence <= 0.8);
}

#[test]
/// Risk parity moves weight toward the calmer asset and narrows the gap in
/// risk contributions.
fn risk_parity_favours_lower_volatility() {
    let cov = vec![vec![0.04, 0.0], vec![0.0, 0.16]];
    let weights = risk_parity_weights(&cov, &PortfolioSettings::default());
    assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    assert!(weights[0] > 0.55);
    assert!(weights[0] > weights[1]);

    let before = risk_contributions(&[0.5, 0.5], &cov);
    let after = risk_contributions(&weights, &cov);
    assert!((after[0] - after[1]).abs() < (before[0] - before[1]).abs());
    assert!(weights.iter().all(|w| *w >= 0.01 - 1e-12));
}

#[test]
fn sharpe_weights_fall_back_to_inverse_volatility() {
    let cov = vec![vec![0.04, 0.0], vec![0.0, 0.16]];
    let w = sharpe_weights(&[0.0, 0.0], &cov, 0.02);
    assert!((w[0] - 2.0 / 3.0).abs() < 1e-12);
    assert!((w[1] - 1.0 / 3.0).abs() < 1e-12);

    let tilted = sharpe_weights(&[0.02, 0.30], &cov, 0.02);
    assert!((tilted[1] - (0.7 / 3.0 + 0.3)).abs() < 1e-12);

    let degenerate = vec![vec![0.0, 0.0], vec![0.0, 0.16]];
    let eq = sharpe_weights(&[0.1, 0.1], &degenerate, 0.02);
    assert!((eq[0] - 0.5).abs() < f64::EPSILON);
}

#[test]
/// One usable asset is not a portfolio: the report falls back to equal
/// weights, HOLD and zero confidence with an explanation.
fn fewer_than_two_assets_falls_back() {
    let assets = vec![
        patterned("AAA", [1.0, -1.0, 1.0, -1.0], 0.01, 60),
        patterned("SHORT", [1.0, -1.0, 1.0, -1.0], 0.01, 5),
    ];
    let report = optimize(&assets, &PortfolioSettings::default());
    let error = report.error.as_deref().expect("fallback explains itself");
    assert!(error.ends_with("got 1"));
    assert!(report.best_method.is_none());
    assert!(report.candidates.is_empty());
    assert_eq!(report.weights, vec![0.5, 0.5]);
    assert_eq!(report.signal, Signal::Hold);
    assert!(report.confidence.abs() < f64::EPSILON);
    assert_eq!(report.skipped, vec!["SHORT".to_string()]);
}

#[test]
fn best_candidate_has_highest_sharpe() {
    let mut assets = three_uncorrelated();
    // Give one asset a strong upward drift.
    let prices: Vec<f64> = assets[2]
        .historical_prices
        .iter()
        .enumerate()
        .map(|(t, p)| p * (0.002 * t as f64).exp())
        .collect();
    assets[2] = AssetSeries::new("CCC", AssetClass::Equity, prices);

    let report = optimize(&assets, &PortfolioSettings::default());
    assert!(report.error.is_none());
    let best = report
        .candidates
        .iter()
        .map(|c| c.sharpe_ratio)
        .fold(f64::MIN, f64::max);
    assert!((report.sharpe_ratio - best).abs() < f64::EPSILON);
    assert!((report.weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
}
