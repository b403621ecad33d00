use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use quant_ensemble::config::Config;
use quant_ensemble::ensemble::AnalysisRequest;
use quant_ensemble::model::AssetSeries;
use quant_ensemble::portfolio::{optimize, simulate};
use quant_ensemble::server::{run_server, AppState};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Cross-model valuation and risk ensemble",
    after_help = "EXAMPLES:
    # Ensemble analysis of one asset
    quant-ensemble analyze asset.json

    # Compare allocation heuristics across assets
    quant-ensemble optimize assets.json

    # Simulate 5000 random portfolios over 60 days
    quant-ensemble simulate assets.json --simulations 5000 --horizon 60

    # Serve the JSON API
    quant-ensemble serve --bind 0.0.0.0:8080"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the asset-class ensemble on one asset (AnalysisRequest or AssetSeries JSON)
    Analyze { file: PathBuf },
    /// Optimize a multi-asset portfolio (array of AssetSeries, or {"assets": [...]})
    Optimize { file: PathBuf },
    /// Monte Carlo simulation of random portfolios
    Simulate {
        file: PathBuf,
        #[arg(long)]
        simulations: Option<usize>,
        /// Trading days per simulated path
        #[arg(long)]
        horizon: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List registered models and the estimator backend
    Models,
    /// Start the HTTP API
    Serve {
        /// Overrides server.bind
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnalysisFile {
    Request(AnalysisRequest),
    Asset(AssetSeries),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AssetsFile {
    List(Vec<AssetSeries>),
    Wrapped { assets: Vec<AssetSeries> },
}

impl AssetsFile {
    fn into_assets(self) -> Vec<AssetSeries> {
        match self {
            Self::List(assets) | Self::Wrapped { assets } => assets,
        }
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set QUANT_ENSEMBLE_CONFIG or run from a directory containing config/default.toml");
            std::process::exit(1);
        }
    };

    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"))
        }))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .json()
        .init();

    let ctx = config
        .build_context()
        .context("invalid ensemble configuration")?;
    tracing::info!(
        backend = ctx.backend().as_str(),
        models = ctx.registry().len(),
        "Starting quant-ensemble"
    );

    match args.command {
        Command::Analyze { file } => {
            let request = match read_json::<AnalysisFile>(&file)? {
                AnalysisFile::Request(r) => r,
                AnalysisFile::Asset(a) => AnalysisRequest::new(a),
            };
            let result = ctx.analyze(&request)?;
            if let Some(store) = config.open_store() {
                store.record_quietly("ensemble", &result.symbol, &result);
            }
            print_json(&result)
        }
        Command::Optimize { file } => {
            let assets = read_json::<AssetsFile>(&file)?.into_assets();
            let report = optimize(&assets, &config.portfolio);
            if let Some(store) = config.open_store() {
                store.record_quietly("portfolio", &report.asset_symbols.join(","), &report);
            }
            print_json(&report)
        }
        Command::Simulate {
            file,
            simulations,
            horizon,
            seed,
        } => {
            let assets = read_json::<AssetsFile>(&file)?.into_assets();
            let mut settings = config.monte_carlo.clone();
            if let Some(n) = simulations {
                settings.num_simulations = n;
            }
            if let Some(h) = horizon {
                settings.time_horizon = h;
            }
            if let Some(s) = seed {
                settings.seed = s;
            }
            settings.validate()?;
            let report = simulate(&assets, &settings);
            if let Some(store) = config.open_store() {
                store.record_quietly("monte_carlo", &report.asset_symbols.join(","), &report);
            }
            print_json(&report)
        }
        Command::Models => print_json(&serde_json::json!({
            "backend": ctx.backend(),
            "models": ctx.registry().describe(),
        })),
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let store = config.open_store();
            let state = AppState::new(
                ctx,
                config.portfolio.clone(),
                config.monte_carlo.clone(),
                store,
            );
            run_server(&bind, state).await
        }
    }
}
