use chrono::NaiveDate;
use tracing::info;

use super::backtest::SignalBacktester;
use super::results::BacktestResults;
use crate::config::ExperimentConfig;
use crate::error::ExperimentResult;
use crate::ml::evaluation::ConfidenceInterval;
use crate::ml::{
    build_dataset, ChronologicalSplit, FeatureFrame, FeatureSpec, LabeledSamples,
    NonOverlappingMetrics, RegressionMetrics, ReturnPredictor, StandardizedSplit, Trainer,
    UncertaintyEstimate,
};
use crate::types::PriceSeries;

/// Outcome of build -> split -> standardize -> train, with held-out
/// predictions ready for evaluation.
pub struct TrainedPipeline<'a> {
    config: &'a ExperimentConfig,
    pub horizon: usize,
    pub frame: FeatureFrame,
    pub samples: LabeledSamples,
    pub split: ChronologicalSplit,
    pub predictor: ReturnPredictor,
    pub test_predictions: Vec<f64>,
}

/// Latest-row forecast with its widened interval
#[derive(Debug, Clone)]
pub struct ForwardForecast {
    pub date: NaiveDate,
    pub point: f64,
    pub interval: ConfidenceInterval,
    pub uncertainty: UncertaintyEstimate,
}

impl<'a> TrainedPipeline<'a> {
    pub fn train(
        series: &PriceSeries,
        specs: &[FeatureSpec],
        horizon: usize,
        seed: u64,
        config: &'a ExperimentConfig,
    ) -> ExperimentResult<Self> {
        let (frame, samples) = build_dataset(series, specs, horizon, config.split.min_samples)?;
        let split = ChronologicalSplit::new(&samples, &config.split)?;
        let standardized = StandardizedSplit::new(&split)?;

        let trainer = Trainer::new(&config.network, &config.training);
        let (network, report) = trainer.fit(
            &standardized.x_train,
            &standardized.y_train,
            &standardized.x_val,
            &standardized.y_val,
            seed,
        )?;

        let predictor =
            ReturnPredictor::new(frame.feature_ids(), network, standardized.scaler, report);
        let test_predictions = predictor.predict_standardized(&standardized.x_test).to_vec();

        Ok(Self {
            config,
            horizon,
            frame,
            samples,
            split,
            predictor,
            test_predictions,
        })
    }

    pub fn test_targets(&self) -> &[f64] {
        self.split.test.targets.as_slice().unwrap_or(&[])
    }

    pub fn test_metrics(&self) -> RegressionMetrics {
        let metrics = RegressionMetrics::compute(self.test_targets(), &self.test_predictions);
        info!(
            "Test R2: {:.3}, MSE: {:.6}, direction: {:.1}%",
            metrics.r2,
            metrics.mse,
            metrics.direction_accuracy * 100.0
        );
        metrics
    }

    /// Metrics on test rows spaced `horizon` apart
    pub fn non_overlapping_metrics(&self) -> NonOverlappingMetrics {
        NonOverlappingMetrics::compute(self.test_targets(), &self.test_predictions, self.horizon)
    }

    /// Long/flat backtest over the test slice using in-slice daily returns
    pub fn backtest(&self) -> ExperimentResult<BacktestResults> {
        let test = &self.split.test;
        SignalBacktester::new(&self.config.backtest).run(
            &test.dates,
            &self.test_predictions,
            &test.realized_returns(),
        )
    }

    /// Predict from the most recent row with complete features
    pub fn forecast(&self) -> ExperimentResult<ForwardForecast> {
        let (date, latest) = self.frame.latest_features()?;
        let point = self.predictor.predict_one(&latest)?;
        let uncertainty = UncertaintyEstimate::estimate(
            self.test_targets(),
            &self.test_predictions,
            self.predictor.max_z_score(&latest),
            &self.config.uncertainty,
        );
        let interval = uncertainty.interval(point, self.config.uncertainty.ci_z);

        info!(
            "Forecast for {}: {:+.2}% (95% CI {:+.2}% to {:+.2}%){}",
            date,
            point * 100.0,
            interval.low * 100.0,
            interval.high * 100.0,
            if uncertainty.is_extrapolating { ", extrapolating" } else { "" }
        );

        Ok(ForwardForecast {
            date,
            point,
            interval,
            uncertainty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::features::{base_feature_set, resolve};
    use crate::types::PricePoint;

    fn synthetic_series(n: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2010, 1, 4).unwrap();
        let points = (0..n)
            .map(|i| {
                let t = i as f64;
                PricePoint {
                    date: start + chrono::Duration::days(i as i64),
                    price: 100.0 * (1.0 + 0.0003 * t)
                        + 5.0 * (t / 40.0).sin()
                        + 2.0 * (t / 9.0).cos(),
                }
            })
            .collect();
        PriceSeries::new(points).unwrap()
    }

    fn fast_config() -> ExperimentConfig {
        let mut config = ExperimentConfig::default();
        config.training.epochs = 5;
        config
    }

    #[test]
    fn test_pipeline_counts_and_forecast() {
        let config = fast_config();
        let series = synthetic_series(900);
        let specs = resolve(&["mom_1m".to_string(), "vol_1m".to_string()]).unwrap();
        let pipeline = TrainedPipeline::train(&series, &specs, 252, 42, &config).unwrap();

        let n = pipeline.samples.len();
        assert_eq!(
            pipeline.split.train.len()
                + pipeline.split.validation.len()
                + pipeline.split.test.len(),
            n
        );
        assert_eq!(pipeline.test_predictions.len(), pipeline.split.test.len());

        let forecast = pipeline.forecast().unwrap();
        // latest complete features are at the last price, past the last labeled row
        assert_eq!(Some(forecast.date), series.last().map(|p| p.date));
        assert!(forecast.uncertainty.adjusted_std >= config.uncertainty.market_floor);
        assert!(forecast.interval.low < forecast.point && forecast.point < forecast.interval.high);
    }

    #[test]
    fn test_one_day_task_backtest() {
        let config = fast_config();
        let series = synthetic_series(400);
        let specs = base_feature_set(&config.base_features);
        let pipeline = TrainedPipeline::train(&series, &specs, 1, 7, &config).unwrap();

        let results = pipeline.backtest().unwrap();
        assert_eq!(results.days, pipeline.split.test.len() - 1);
        assert!(results.max_drawdown <= 0.0);
        assert!(results.exposure >= 0.0 && results.exposure <= 1.0);
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let config = fast_config();
        let series = synthetic_series(500);
        let specs = resolve(&["px_sma50".to_string(), "mom_3m".to_string()]).unwrap();
        let a = TrainedPipeline::train(&series, &specs, 21, 42, &config).unwrap();
        let b = TrainedPipeline::train(&series, &specs, 21, 42, &config).unwrap();
        assert_eq!(a.test_predictions, b.test_predictions);
        assert_eq!(a.forecast().unwrap().point, b.forecast().unwrap().point);
    }
}
