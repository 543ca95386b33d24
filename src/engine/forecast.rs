use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::pipeline::TrainedPipeline;
use crate::error::ExperimentResult;
use crate::ml::evaluation::UncertaintyEstimate;

const CAVEATS: [&str; 4] = [
    "Prediction based on historical patterns only",
    "Confidence interval estimated from test set errors, widened when inputs are out of distribution",
    "Past performance does not guarantee future results",
    "This is not financial advice",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionArtifact {
    pub prediction_date: NaiveDate,
    pub horizon_days: usize,
    pub predicted_return_pct: f64,
    pub confidence_interval_95: IntervalPct,
    pub uncertainty: UncertaintyPct,
    pub model_info: ArtifactModelInfo,
    pub caveats: Vec<String>,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalPct {
    pub low: f64,
    pub high: f64,
}

/// Uncertainty breakdown, std values in percent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertaintyPct {
    pub base_std_pct: f64,
    pub adjusted_std_pct: f64,
    pub extrapolation_multiplier: f64,
    pub is_extrapolating: bool,
    pub max_z_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactModelInfo {
    pub features: Vec<String>,
    pub train_samples: usize,
    pub val_samples: usize,
    pub test_samples: usize,
    pub test_mse: f64,
    pub test_r2: f64,
    pub best_epoch: usize,
    pub epochs_run: usize,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn pct(value: f64) -> f64 {
    round_to(value * 100.0, 2)
}

impl PredictionArtifact {
    pub fn from_pipeline(pipeline: &TrainedPipeline<'_>) -> ExperimentResult<Self> {
        let metrics = pipeline.test_metrics();
        let forecast = pipeline.forecast()?;
        let report = &pipeline.predictor.report;

        Ok(Self {
            prediction_date: forecast.date,
            horizon_days: pipeline.horizon,
            predicted_return_pct: pct(forecast.point),
            confidence_interval_95: IntervalPct {
                low: pct(forecast.interval.low),
                high: pct(forecast.interval.high),
            },
            uncertainty: UncertaintyPct::from(&forecast.uncertainty),
            model_info: ArtifactModelInfo {
                features: pipeline.predictor.feature_ids.clone(),
                train_samples: pipeline.split.train.len(),
                val_samples: pipeline.split.validation.len(),
                test_samples: pipeline.split.test.len(),
                test_mse: round_to(metrics.mse, 6),
                test_r2: round_to(metrics.r2, 3),
                best_epoch: report.best_epoch,
                epochs_run: report.epochs_run,
            },
            caveats: CAVEATS.iter().map(|c| c.to_string()).collect(),
            generated_at: Local::now().to_rfc3339(),
        })
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> ExperimentResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Prediction saved to: {}", path.display());
        Ok(())
    }

    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(50));
        println!("{}-DAY RETURN PREDICTION", self.horizon_days);
        println!("{}", "=".repeat(50));
        println!("Prediction Date:    {}", self.prediction_date);
        println!("Horizon:            {} trading days", self.horizon_days);
        println!();
        println!("Predicted Return:   {:>+.1}%", self.predicted_return_pct);
        println!(
            "95% Confidence:     {:>+.1}% to {:>+.1}%",
            self.confidence_interval_95.low, self.confidence_interval_95.high
        );
        if self.uncertainty.is_extrapolating {
            println!(
                "  (inputs {:.1} std from training data, interval widened x{:.2})",
                self.uncertainty.max_z_score, self.uncertainty.extrapolation_multiplier
            );
        }
        println!();
        println!("Model Quality:");
        println!("  Test R2:          {:.3}", self.model_info.test_r2);
        println!("  Test MSE:         {:.6}", self.model_info.test_mse);
        println!("  Training samples: {}", self.model_info.train_samples);
        println!();
        println!("IMPORTANT CAVEATS:");
        for caveat in &self.caveats {
            println!("  - {}", caveat);
        }
        println!("{}", "=".repeat(50));
    }
}

impl From<&UncertaintyEstimate> for UncertaintyPct {
    fn from(u: &UncertaintyEstimate) -> Self {
        Self {
            base_std_pct: pct(u.base_std),
            adjusted_std_pct: pct(u.adjusted_std),
            extrapolation_multiplier: round_to(u.extrapolation_multiplier, 3),
            is_extrapolating: u.is_extrapolating,
            max_z_score: round_to(u.max_z_score, 3),
        }
    }
}
