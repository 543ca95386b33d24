use chrono::NaiveDate;
use ndarray::{s, Array1, Array2};
use std::ops::Range;
use tracing::{debug, info};

use super::features::FeatureSpec;
use crate::error::{ExperimentError, ExperimentResult};
use crate::indicators::{ratio_minus_one, Series};
use crate::types::PriceSeries;

/// Feature columns and forward-return label aligned 1:1 with a price series
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub dates: Vec<NaiveDate>,
    pub prices: Vec<f64>,
    pub specs: Vec<FeatureSpec>,
    /// One column per feature
    pub columns: Vec<Series>,
    /// `price[t + horizon] / price[t] - 1`
    pub target: Series,
}

impl FeatureFrame {
    pub fn build(series: &PriceSeries, specs: &[FeatureSpec], horizon: usize) -> Self {
        let prices = series.prices();
        let columns = specs.iter().map(|spec| spec.kind.compute(&prices)).collect();
        let target = forward_return(&prices, horizon);

        Self {
            dates: series.dates(),
            prices,
            specs: specs.to_vec(),
            columns,
            target,
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn feature_ids(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.id.clone()).collect()
    }

    fn features_at(&self, row: usize) -> Option<Vec<f64>> {
        self.columns.iter().map(|col| col[row]).collect()
    }

    /// Rows where every feature and the target are defined
    pub fn labeled_samples(&self) -> LabeledSamples {
        let mut dates = Vec::new();
        let mut prices = Vec::new();
        let mut values = Vec::new();
        let mut targets = Vec::new();

        for row in 0..self.len() {
            let (Some(features), Some(target)) = (self.features_at(row), self.target[row]) else {
                continue;
            };
            dates.push(self.dates[row]);
            prices.push(self.prices[row]);
            values.extend(features);
            targets.push(target);
        }

        let n = targets.len();
        let features = Array2::from_shape_vec((n, self.specs.len()), values)
            .unwrap_or_else(|_| Array2::zeros((0, self.specs.len())));

        LabeledSamples {
            feature_ids: self.feature_ids(),
            dates,
            prices,
            features,
            targets: Array1::from(targets),
        }
    }

    /// Last row with every feature defined, ignoring the target. This is the
    /// input for forward inference.
    pub fn latest_features(&self) -> ExperimentResult<(NaiveDate, Vec<f64>)> {
        (0..self.len())
            .rev()
            .find_map(|row| self.features_at(row).map(|f| (self.dates[row], f)))
            .ok_or(ExperimentError::NoInferenceRows)
    }
}

fn forward_return(prices: &[f64], horizon: usize) -> Series {
    (0..prices.len())
        .map(|t| {
            let ahead = prices.get(t + horizon)?;
            if horizon == 0 {
                return None;
            }
            ratio_minus_one(*ahead, prices[t])
        })
        .collect()
}

/// Complete feature/target rows in chronological order
#[derive(Debug, Clone)]
pub struct LabeledSamples {
    pub feature_ids: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub prices: Vec<f64>,
    pub features: Array2<f64>,
    pub targets: Array1<f64>,
}

impl LabeledSamples {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Contiguous row range, order preserved
    pub fn slice(&self, range: Range<usize>) -> Self {
        Self {
            feature_ids: self.feature_ids.clone(),
            dates: self.dates[range.clone()].to_vec(),
            prices: self.prices[range.clone()].to_vec(),
            features: self.features.slice(s![range.clone(), ..]).to_owned(),
            targets: self.targets.slice(s![range]).to_owned(),
        }
    }

    /// Daily return of each row relative to the previous row of this slice
    pub fn realized_returns(&self) -> Vec<Option<f64>> {
        (0..self.len())
            .map(|t| {
                if t == 0 {
                    None
                } else {
                    ratio_minus_one(self.prices[t], self.prices[t - 1])
                }
            })
            .collect()
    }
}

/// Build the feature frame and its complete rows, enforcing a minimum
/// number of usable samples.
pub fn build_dataset(
    series: &PriceSeries,
    specs: &[FeatureSpec],
    horizon: usize,
    min_samples: usize,
) -> ExperimentResult<(FeatureFrame, LabeledSamples)> {
    if specs.is_empty() {
        return Err(ExperimentError::EmptyFeatureSet);
    }

    let frame = FeatureFrame::build(series, specs, horizon);
    let samples = frame.labeled_samples();
    debug!(
        "Feature frame: {} rows, {} features, horizon {}",
        frame.len(),
        specs.len(),
        horizon
    );

    if samples.len() < min_samples {
        return Err(ExperimentError::InsufficientData {
            rows: samples.len(),
            required: min_samples,
        });
    }

    info!(
        "Features built, {} rows with valid {}-day forward returns",
        samples.len(),
        horizon
    );
    Ok((frame, samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::features::{lookup, FeatureKind};
    use crate::types::PricePoint;
    use approx::assert_relative_eq;

    fn series(prices: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                date: start + chrono::Duration::days(i as i64),
                price,
            })
            .collect();
        PriceSeries::new(points).unwrap()
    }

    #[test]
    fn test_forward_target_and_row_dropping() {
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let specs = vec![FeatureSpec::new("mom", FeatureKind::Momentum { periods: 2 })];
        let frame = FeatureFrame::build(&series(&prices), &specs, 3);

        assert_relative_eq!(frame.target[0].unwrap(), 103.0 / 100.0 - 1.0);
        assert!(frame.target[7].is_none());

        // rows 2..=6 have both the 2-day momentum and a 3-day forward return
        let samples = frame.labeled_samples();
        assert_eq!(samples.len(), 5);
        assert_eq!(samples.prices[0], 102.0);
        assert_eq!(samples.features.dim(), (5, 1));
        assert_relative_eq!(samples.features[[0, 0]], 102.0 / 100.0 - 1.0);
    }

    #[test]
    fn test_latest_features_ignore_target() {
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let specs = vec![FeatureSpec::new("mom", FeatureKind::Momentum { periods: 2 })];
        let frame = FeatureFrame::build(&series(&prices), &specs, 3);

        let (date, features) = frame.latest_features().unwrap();
        assert_eq!(date, frame.dates[9]);
        assert_relative_eq!(features[0], 109.0 / 107.0 - 1.0);
    }

    #[test]
    fn test_latest_features_missing() {
        let specs = vec![lookup("mom_12m").unwrap()];
        let frame = FeatureFrame::build(&series(&[100.0; 30]), &specs, 1);
        assert!(matches!(frame.latest_features(), Err(ExperimentError::NoInferenceRows)));
    }

    #[test]
    fn test_insufficient_rows() {
        let prices: Vec<f64> = (0..150).map(|i| 100.0 + i as f64).collect();
        let specs = vec![lookup("mom_1m").unwrap()];
        let err = build_dataset(&series(&prices), &specs, 100, 100).unwrap_err();
        match err {
            ExperimentError::InsufficientData { rows, required } => {
                assert_eq!(rows, 29);
                assert_eq!(required, 100);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_slice_and_realized_returns() {
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let specs = vec![FeatureSpec::new("mom", FeatureKind::Momentum { periods: 1 })];
        let samples = FeatureFrame::build(&series(&prices), &specs, 1).labeled_samples();

        let tail = samples.slice(4..samples.len());
        assert_eq!(tail.prices[0], 105.0);
        let returns = tail.realized_returns();
        assert_eq!(returns[0], None);
        assert_relative_eq!(returns[1].unwrap(), 106.0 / 105.0 - 1.0);
    }
}
