use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use quant_ensemble::ensemble::{EnsembleContext, EnsembleSettings};
use quant_ensemble::portfolio::{MonteCarloSettings, PortfolioSettings};
use quant_ensemble::registry::ModelSettings;
use quant_ensemble::server::{router, AppState};
use quant_ensemble::stats::backend::BackendPreference;

fn app() -> axum::Router {
    let settings = EnsembleSettings {
        backend: BackendPreference::Simplified,
        ..EnsembleSettings::default()
    };
    let ctx = EnsembleContext::from_settings(&settings, &ModelSettings::default())
        .expect("default context");
    router(AppState::new(
        ctx,
        PortfolioSettings::default(),
        MonteCarloSettings::default(),
        None,
    ))
}

fn prices(len: usize, drift: f64) -> Vec<f64> {
    (0..len)
        .map(|t| 100.0 * (drift * t as f64 + 0.02 * (t as f64 * 0.9).sin()).exp())
        .collect()
}

fn asset(symbol: &str, drift: f64) -> Value {
    let p = prices(120, drift);
    json!({
        "symbol": symbol,
        "asset_class": "equity",
        "current_price": p[p.len() - 1],
        "historical_prices": p,
    })
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_reports_backend_and_model_count() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["backend"], json!("simplified_fallback"));
    assert_eq!(body["models"], json!(18));
}

#[tokio::test]
async fn models_lists_registry() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/models")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let models = body["models"].as_array().expect("models array");
    assert!(models.iter().any(|m| m["name"] == json!("garch")));
}

#[tokio::test]
/// Misconfigured requests are rejected with a 400 and an error message.
async fn ensemble_rejects_unknown_model() {
    let response = app()
        .oneshot(post(
            "/api/ensemble",
            json!({ "asset": asset("ACME", 0.001), "enabled_models": ["no_such_model"] }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error string")
        .contains("no_such_model"));
}

#[tokio::test]
async fn ensemble_runs_selected_models() {
    let response = app()
        .oneshot(post(
            "/api/ensemble",
            json!({
                "asset": asset("ACME", 0.001),
                "enabled_models": ["risk_metrics", "regime_switching", "lstm"],
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["symbol"], json!("ACME"));
    assert_eq!(body["model_status"]["requested"], json!(3));
    assert!(body["consensus_prediction"].as_f64().expect("number") > 0.0);
}

#[tokio::test]
async fn portfolio_requires_assets() {
    let response = app()
        .oneshot(post("/api/portfolio", json!({ "assets": [] })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn portfolio_returns_candidates() {
    let response = app()
        .oneshot(post(
            "/api/portfolio",
            json!({ "assets": [asset("AAA", 0.001), asset("BBB", -0.0005)], "risk_free_rate": 0.01 }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["candidates"].as_array().expect("candidates").len(), 3);
}

#[tokio::test]
async fn monte_carlo_rejects_zero_simulations() {
    let response = app()
        .oneshot(post(
            "/api/monte-carlo",
            json!({ "assets": [asset("AAA", 0.001)], "num_simulations": 0 }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn monte_carlo_uses_request_overrides() {
    let response = app()
        .oneshot(post(
            "/api/monte-carlo",
            json!({
                "assets": [asset("AAA", 0.001), asset("BBB", 0.0)],
                "num_simulations": 50,
                "time_horizon": 10,
                "seed": 3,
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["num_simulations"], json!(50));
    assert_eq!(body["seed"], json!(3));
}
