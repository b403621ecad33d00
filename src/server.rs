use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::ensemble::{AnalysisRequest, EnsembleContext, EnsembleResult};
use crate::model::AssetSeries;
use crate::portfolio::{
    optimize, simulate, MonteCarloReport, MonteCarloSettings, PortfolioReport, PortfolioSettings,
};
use crate::registry::ModelInfo;
use crate::stats::backend::EstimatorBackend;
use crate::store::ResultStore;

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<EnsembleContext>,
    pub portfolio: Arc<PortfolioSettings>,
    pub monte_carlo: Arc<MonteCarloSettings>,
    pub store: Option<Arc<ResultStore>>,
}

impl AppState {
    pub fn new(
        ctx: EnsembleContext,
        portfolio: PortfolioSettings,
        monte_carlo: MonteCarloSettings,
        store: Option<ResultStore>,
    ) -> Self {
        Self {
            ctx: Arc::new(ctx),
            portfolio: Arc::new(portfolio),
            monte_carlo: Arc::new(monte_carlo),
            store: store.map(Arc::new),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    backend: EstimatorBackend,
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
pub struct PortfolioRequest {
    pub assets: Vec<AssetSeries>,
    #[serde(default)]
    pub risk_free_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct MonteCarloRequest {
    pub assets: Vec<AssetSeries>,
    #[serde(default)]
    pub num_simulations: Option<usize>,
    #[serde(default)]
    pub time_horizon: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
}

type ApiResult<T> = std::result::Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/models", get(models))
        .route("/api/ensemble", post(ensemble))
        .route("/api/portfolio", post(portfolio))
        .route("/api/monte-carlo", post(monte_carlo))
        .with_state(state)
}

pub async fn run_server(bind: &str, state: AppState) -> Result<()> {
    let app = router(state);
    info!("quant-ensemble listening on http://{}", bind);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "backend": state.ctx.backend(),
        "models": state.ctx.registry().len(),
    }))
}

async fn models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        backend: state.ctx.backend(),
        models: state.ctx.registry().describe(),
    })
}

async fn ensemble(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> ApiResult<EnsembleResult> {
    let ctx = state.ctx.clone();
    let store = state.store.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let result = ctx.analyze(&req)?;
        if let Some(store) = store {
            store.record_quietly("ensemble", &result.symbol, &result);
        }
        Ok::<_, crate::error::ConfigError>(result)
    })
    .await
    .map_err(internal_err)?;

    outcome
        .map(Json)
        .map_err(|e| api_err(StatusCode::BAD_REQUEST, &e.to_string()))
}

async fn portfolio(
    State(state): State<AppState>,
    Json(req): Json<PortfolioRequest>,
) -> ApiResult<PortfolioReport> {
    if req.assets.is_empty() {
        return Err(api_err(StatusCode::BAD_REQUEST, "assets cannot be empty"));
    }
    let mut settings = (*state.portfolio).clone();
    if let Some(rf) = req.risk_free_rate {
        settings.risk_free_rate = rf;
    }
    settings
        .validate()
        .map_err(|e| api_err(StatusCode::BAD_REQUEST, &e.to_string()))?;

    let store = state.store.clone();
    let report = tokio::task::spawn_blocking(move || {
        let report = optimize(&req.assets, &settings);
        if let Some(store) = store {
            store.record_quietly("portfolio", &report.asset_symbols.join(","), &report);
        }
        report
    })
    .await
    .map_err(internal_err)?;
    Ok(Json(report))
}

async fn monte_carlo(
    State(state): State<AppState>,
    Json(req): Json<MonteCarloRequest>,
) -> ApiResult<MonteCarloReport> {
    if req.assets.is_empty() {
        return Err(api_err(StatusCode::BAD_REQUEST, "assets cannot be empty"));
    }
    let mut settings = (*state.monte_carlo).clone();
    if let Some(n) = req.num_simulations {
        settings.num_simulations = n;
    }
    if let Some(h) = req.time_horizon {
        settings.time_horizon = h;
    }
    if let Some(seed) = req.seed {
        settings.seed = seed;
    }
    settings
        .validate()
        .map_err(|e| api_err(StatusCode::BAD_REQUEST, &e.to_string()))?;

    let store = state.store.clone();
    let report = tokio::task::spawn_blocking(move || {
        let report = simulate(&req.assets, &settings);
        if let Some(store) = store {
            store.record_quietly("monte_carlo", &report.asset_symbols.join(","), &report);
        }
        report
    })
    .await
    .map_err(internal_err)?;
    Ok(Json(report))
}

fn api_err(status: StatusCode, message: &str) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: message.to_string(),
        }),
    )
}

fn internal_err(e: tokio::task::JoinError) -> (StatusCode, Json<ApiError>) {
    error!(error = %e, "analysis task failed");
    api_err(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
}
