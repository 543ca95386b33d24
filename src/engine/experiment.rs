use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};

use super::pipeline::TrainedPipeline;
use crate::config::ExperimentConfig;
use crate::data;
use crate::error::{ExperimentError, ExperimentResult};
use crate::ml::evaluation::UncertaintyEstimate;
use crate::ml::features;
use crate::types::PriceSeries;

fn default_ticker() -> String {
    "SPY".to_string()
}

fn default_seed() -> u64 {
    42
}

/// One feature-set evaluation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRequest {
    #[serde(default = "default_ticker")]
    pub ticker: String,
    #[serde(default, alias = "feature_ids")]
    pub feature_ids: Vec<String>,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl ExperimentRequest {
    pub fn parse(raw: &str) -> ExperimentResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| ExperimentError::MalformedInput(format!("invalid JSON request: {}", e)))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentResponse {
    pub feature_ids: Vec<String>,
    pub metrics: ExperimentMetrics,
    pub prediction: PredictionSummary,
    pub model_info: ModelInfo,
    pub data_info: DataInfo,
}

/// Backtest metrics are informational; the rest score the 12-month model
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentMetrics {
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub cagr: f64,
    pub r2: f64,
    pub mse: f64,
    pub direction_accuracy: f64,
    pub mae: f64,
    pub calibration_ratio: f64,
    pub r2_non_overlapping: f64,
    pub direction_accuracy_non_overlapping: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionSummary {
    #[serde(rename = "pred12mReturn")]
    pub pred_12m_return: f64,
    #[serde(rename = "ci95Low")]
    pub ci95_low: f64,
    #[serde(rename = "ci95High")]
    pub ci95_high: f64,
    pub uncertainty: UncertaintyEstimate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub train_samples: usize,
    pub val_samples: usize,
    pub test_samples: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataInfo {
    pub total_samples: usize,
    pub non_overlapping_samples: usize,
    pub effective_independent_periods: usize,
}

/// Request counts from a batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub handled: usize,
    pub failed: usize,
}

/// Runs experiment requests against one price file, loaded on first use
pub struct ExperimentRunner<'a> {
    config: &'a ExperimentConfig,
    data_path: PathBuf,
    series: OnceCell<PriceSeries>,
}

impl<'a> ExperimentRunner<'a> {
    pub fn new(config: &'a ExperimentConfig, data_path: PathBuf) -> Self {
        Self {
            config,
            data_path,
            series: OnceCell::new(),
        }
    }

    fn series(&self) -> ExperimentResult<&PriceSeries> {
        if let Some(series) = self.series.get() {
            return Ok(series);
        }
        let loaded = data::load_series(&self.data_path)?;
        Ok(self.series.get_or_init(|| loaded))
    }

    /// Parse and run one raw JSON request
    pub fn handle(&self, raw: &str) -> ExperimentResult<ExperimentResponse> {
        let request = ExperimentRequest::parse(raw)?;
        self.run(&request)
    }

    /// One JSON request per input line, one JSON result per output line.
    /// A failing request, including one that is not UTF-8, yields an error
    /// line and the loop moves on. Only I/O failures end it.
    pub fn serve_lines<R: BufRead, W: Write>(
        &self,
        mut input: R,
        mut output: W,
    ) -> ExperimentResult<BatchSummary> {
        let mut summary = BatchSummary::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let outcome = String::from_utf8(std::mem::take(&mut buf))
                .map_err(|e| {
                    ExperimentError::MalformedInput(format!("request is not UTF-8: {}", e))
                })
                .and_then(|line| {
                    if line.trim().is_empty() {
                        Ok(None)
                    } else {
                        self.handle(&line).map(Some)
                    }
                });

            let json = match outcome {
                Ok(None) => continue,
                Ok(Some(response)) => {
                    summary.handled += 1;
                    serde_json::to_string(&response)?
                }
                Err(e) => {
                    summary.handled += 1;
                    summary.failed += 1;
                    warn!("Request {} failed: {}", summary.handled, e);
                    serde_json::to_string(&e.to_response())?
                }
            };
            writeln!(output, "{}", json)?;
            output.flush()?;
        }

        info!(
            "Batch complete: {} requests, {} failed",
            summary.handled, summary.failed
        );
        Ok(summary)
    }

    /// Feature ids are validated before any data is read
    pub fn run(&self, request: &ExperimentRequest) -> ExperimentResult<ExperimentResponse> {
        let specs = features::resolve(&request.feature_ids)?;
        info!(
            "Experiment {} with {:?} (seed {})",
            request.ticker, request.feature_ids, request.seed
        );

        let series = self.series()?;
        let horizon = self.config.target.horizon_days;
        let pipeline = TrainedPipeline::train(series, &specs, horizon, request.seed, self.config)?;

        let regression = pipeline.test_metrics();
        let non_overlapping = pipeline.non_overlapping_metrics();
        if non_overlapping.samples < 2 {
            warn!(
                "Only {} non-overlapping test window(s); non-overlapping metrics are zero",
                non_overlapping.samples
            );
        }
        let backtest = pipeline.backtest()?;
        let forecast = pipeline.forecast()?;

        Ok(ExperimentResponse {
            feature_ids: request.feature_ids.clone(),
            metrics: ExperimentMetrics {
                sharpe: backtest.sharpe,
                max_drawdown: backtest.max_drawdown,
                cagr: backtest.cagr,
                r2: regression.r2,
                mse: regression.mse,
                direction_accuracy: regression.direction_accuracy,
                mae: regression.mae,
                calibration_ratio: regression.calibration_ratio,
                r2_non_overlapping: non_overlapping.r2,
                direction_accuracy_non_overlapping: non_overlapping.direction_accuracy,
            },
            prediction: PredictionSummary {
                pred_12m_return: forecast.point,
                ci95_low: forecast.interval.low,
                ci95_high: forecast.interval.high,
                uncertainty: forecast.uncertainty,
            },
            model_info: ModelInfo {
                train_samples: pipeline.split.train.len(),
                val_samples: pipeline.split.validation.len(),
                test_samples: pipeline.split.test.len(),
            },
            data_info: DataInfo {
                total_samples: pipeline.samples.len(),
                non_overlapping_samples: non_overlapping.samples,
                effective_independent_periods: non_overlapping.samples,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_series(rows: usize) -> tempfile::NamedTempFile {
        let start = chrono::NaiveDate::from_ymd_opt(2005, 1, 3).unwrap();
        let series: Vec<serde_json::Value> = (0..rows)
            .map(|i| {
                let t = i as f64;
                let cumret = 0.04 * t + 6.0 * (t / 50.0).sin() + 1.5 * (t / 11.0).cos();
                serde_json::json!({
                    "date": (start + chrono::Duration::days(i as i64))
                        .format("%Y-%m-%d")
                        .to_string(),
                    "value": { "raw": cumret },
                })
            })
            .collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::json!({ "series": series })).unwrap();
        file
    }

    fn fast_config() -> ExperimentConfig {
        let mut config = ExperimentConfig::default();
        config.training.epochs = 3;
        config
    }

    #[test]
    fn test_request_defaults_and_alias() {
        let request = ExperimentRequest::parse(r#"{"feature_ids": ["mom_1m"]}"#).unwrap();
        assert_eq!(request.ticker, "SPY");
        assert_eq!(request.seed, 42);
        assert_eq!(request.feature_ids, vec!["mom_1m".to_string()]);
    }

    #[test]
    fn test_unknown_feature_rejected_before_loading_data() {
        let config = fast_config();
        let runner = ExperimentRunner::new(&config, PathBuf::from("/nonexistent/data.json"));
        let err = runner
            .handle(r#"{"featureIds": ["mom_1m", "nonexistent_feature"]}"#)
            .unwrap_err();
        let response = serde_json::to_value(err.to_response()).unwrap();
        assert!(response["error"].as_str().unwrap().contains("nonexistent_feature"));
        assert_eq!(response["validFeatures"].as_array().unwrap().len(), 15);
    }

    #[test]
    fn test_empty_and_malformed_requests() {
        let config = fast_config();
        let runner = ExperimentRunner::new(&config, PathBuf::from("/nonexistent/data.json"));
        assert!(matches!(
            runner.handle(r#"{"featureIds": []}"#),
            Err(ExperimentError::EmptyFeatureSet)
        ));
        assert!(matches!(runner.handle("{not json"), Err(ExperimentError::MalformedInput(_))));
        assert!(matches!(
            runner.handle(r#"{"featureIds": ["mom_1m"]}"#),
            Err(ExperimentError::DataNotFound(_))
        ));
    }

    #[test]
    fn test_insufficient_history() {
        let file = write_series(300);
        let config = fast_config();
        let runner = ExperimentRunner::new(&config, file.path().to_path_buf());
        let err = runner.handle(r#"{"featureIds": ["mom_12m"]}"#).unwrap_err();
        assert!(matches!(err, ExperimentError::InsufficientData { .. }));
    }

    #[test]
    fn test_full_response_shape() {
        let file = write_series(1200);
        let config = fast_config();
        let runner = ExperimentRunner::new(&config, file.path().to_path_buf());
        let request =
            r#"{"ticker": "QQQ", "featureIds": ["mom_1m", "vol_1m", "dd_current"], "seed": 7}"#;
        let response = runner.handle(request).unwrap();

        let info = &response.model_info;
        assert_eq!(
            info.train_samples + info.val_samples + info.test_samples,
            response.data_info.total_samples
        );
        assert_eq!(
            response.data_info.non_overlapping_samples,
            response.data_info.effective_independent_periods
        );

        let json = serde_json::to_value(&response).unwrap();
        let metric_keys = [
            "sharpe",
            "maxDrawdown",
            "cagr",
            "r2",
            "mse",
            "directionAccuracy",
            "mae",
            "calibrationRatio",
            "r2NonOverlapping",
            "directionAccuracyNonOverlapping",
        ];
        for key in metric_keys {
            assert!(json["metrics"].get(key).is_some(), "missing metrics.{}", key);
        }
        for key in ["pred12mReturn", "ci95Low", "ci95High"] {
            assert!(json["prediction"].get(key).is_some(), "missing prediction.{}", key);
        }
        let uncertainty = &json["prediction"]["uncertainty"];
        for key in ["baseStd", "adjustedStd", "extrapolationMultiplier", "isExtrapolating"] {
            assert!(uncertainty.get(key).is_some(), "missing uncertainty.{}", key);
        }
        assert!(uncertainty["adjustedStd"].as_f64().unwrap() >= 0.10);

        // the same runner reuses the loaded series
        let again = runner
            .handle(r#"{"featureIds": ["mom_1m", "vol_1m", "dd_current"], "seed": 7}"#)
            .unwrap();
        assert_eq!(again.prediction.pred_12m_return, response.prediction.pred_12m_return);
    }

    #[test]
    fn test_batch_continues_past_bad_lines() {
        let file = write_series(1200);
        let config = fast_config();
        let runner = ExperimentRunner::new(&config, file.path().to_path_buf());

        let mut input = Vec::new();
        input.extend_from_slice(b"{\"featureIds\": [\"nonexistent_feature\"]}\n");
        input.extend_from_slice(b"{\"featureIds\": [\"mom_1m\xff\"]}\n");
        input.extend_from_slice(b"\n");
        input.extend_from_slice(b"{\"featureIds\": [\"mom_1m\"]}");

        let mut output = Vec::new();
        let summary = runner.serve_lines(input.as_slice(), &mut output).unwrap();
        assert_eq!(summary, BatchSummary { handled: 3, failed: 2 });

        let lines: Vec<serde_json::Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0]["validFeatures"].is_array());
        assert!(lines[1]["error"].as_str().unwrap().contains("UTF-8"));
        assert!(lines[1].get("validFeatures").is_none());
        assert_eq!(lines[2]["featureIds"], serde_json::json!(["mom_1m"]));
        assert!(lines[2]["prediction"]["pred12mReturn"].is_number());
    }
}
