mod config;
mod data;
mod engine;
mod error;
mod indicators;
mod ml;
mod stats;
mod types;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::ExperimentConfig;
use engine::{ExperimentResponse, ExperimentRunner, PredictionArtifact, TrainedPipeline};
use error::ExperimentResult;
use ml::features::{self, FeatureSpec};

#[derive(Parser)]
#[command(name = "etf-backtest")]
#[command(version = "0.1.0")]
#[command(
    about = "Feature-selection experiments for ETF forward-return prediction",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Price series JSON (overrides paths.data)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one feature set, JSON request on stdin, JSON response on stdout
    Experiment {
        /// Request JSON (read from stdin when omitted)
        #[arg(short, long)]
        request: Option<String>,
    },
    /// Evaluate one JSON request per stdin line, one JSON result per stdout line
    Batch,
    /// Forecast the forward return from the latest data and save it
    Predict {
        /// Comma separated feature ids (base feature set when omitted)
        #[arg(short, long, value_delimiter = ',')]
        features: Vec<String>,
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Output path (overrides paths.prediction_output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Backtest a next-day model with a long/flat signal on the test period
    Backtest {
        /// Comma separated feature ids (base feature set when omitted)
        #[arg(short, long, value_delimiter = ',')]
        features: Vec<String>,
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
    /// List selectable feature ids
    Features,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries results
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    if cli.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    match &cli.command {
        Commands::Experiment { request } => run_experiment(&cli, request.as_deref())?,
        Commands::Batch => run_batch(&cli)?,
        Commands::Predict { features, seed, output } => {
            run_predict(&cli, features, *seed, output.as_deref())?;
        }
        Commands::Backtest { features, seed } => run_backtest(&cli, features, *seed)?,
        Commands::Features => {
            for id in features::all_feature_ids() {
                println!("{}", id);
            }
        }
    }

    Ok(())
}

fn data_path(cli: &Cli, config: &ExperimentConfig) -> PathBuf {
    cli.data.clone().unwrap_or_else(|| config.paths.data.clone())
}

fn feature_specs(ids: &[String], config: &ExperimentConfig) -> ExperimentResult<Vec<FeatureSpec>> {
    if ids.is_empty() {
        Ok(features::base_feature_set(&config.base_features))
    } else {
        features::resolve(ids)
    }
}

fn run_experiment(cli: &Cli, request: Option<&str>) -> Result<()> {
    match experiment_response(cli, request) {
        Ok(response) => {
            println!("{}", serde_json::to_string(&response)?);
            Ok(())
        }
        Err(e) => {
            error!("Experiment failed: {}", e);
            println!("{}", serde_json::to_string(&e.to_response())?);
            std::process::exit(1);
        }
    }
}

fn experiment_response(cli: &Cli, request: Option<&str>) -> ExperimentResult<ExperimentResponse> {
    let config = ExperimentConfig::load(Path::new(&cli.config))?;
    let raw = match request {
        Some(raw) => raw.to_string(),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    ExperimentRunner::new(&config, data_path(cli, &config)).handle(&raw)
}

fn run_batch(cli: &Cli) -> Result<()> {
    let config = ExperimentConfig::load(Path::new(&cli.config))?;
    let runner = ExperimentRunner::new(&config, data_path(cli, &config));
    runner.serve_lines(io::stdin().lock(), io::stdout().lock())?;
    Ok(())
}

fn run_predict(cli: &Cli, ids: &[String], seed: u64, output: Option<&Path>) -> Result<()> {
    let config = ExperimentConfig::load(Path::new(&cli.config))?;
    let specs = feature_specs(ids, &config)?;
    let series = data::load_series(&data_path(cli, &config))?;

    let horizon = config.target.horizon_days;
    info!("Training {}-day model on {} features", horizon, specs.len());
    let pipeline = TrainedPipeline::train(&series, &specs, horizon, seed, &config)?;

    let artifact = PredictionArtifact::from_pipeline(&pipeline)?;
    artifact.save(output.unwrap_or(&config.paths.prediction_output))?;
    artifact.print_summary();
    Ok(())
}

fn run_backtest(cli: &Cli, ids: &[String], seed: u64) -> Result<()> {
    let config = ExperimentConfig::load(Path::new(&cli.config))?;
    let specs = feature_specs(ids, &config)?;
    let series = data::load_series(&data_path(cli, &config))?;

    info!("Training next-day model on {} features", specs.len());
    let pipeline = TrainedPipeline::train(&series, &specs, 1, seed, &config)?;
    pipeline.test_metrics();

    let results = pipeline.backtest()?;
    results.print_summary();

    println!("\nPITFALL AVOIDANCE:");
    println!("  1. Lookahead: signal at t -> position at t+1");
    println!("  2. Leakage: standardized with train mean/std only");
    println!("  3. No shuffle: chronological train/val/test split");
    Ok(())
}
