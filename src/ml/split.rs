use ndarray::{Array1, Array2, ArrayView1, Axis};
use tracing::info;

use super::dataset::LabeledSamples;
use crate::config::SplitSettings;
use crate::error::{ExperimentError, ExperimentResult};

/// Train / validation / test slices in time order
#[derive(Debug, Clone)]
pub struct ChronologicalSplit {
    pub train: LabeledSamples,
    pub validation: LabeledSamples,
    pub test: LabeledSamples,
}

impl ChronologicalSplit {
    /// Contiguous split at `floor(train_ratio * n)` and
    /// `floor((train_ratio + val_ratio) * n)`. No shuffling.
    pub fn new(samples: &LabeledSamples, settings: &SplitSettings) -> ExperimentResult<Self> {
        let n = samples.len();
        let (train_end, val_end) = boundaries(n, settings.train_ratio, settings.val_ratio);

        if train_end == 0 || val_end == train_end || val_end == n {
            return Err(ExperimentError::InsufficientData {
                rows: n,
                required: settings.min_samples,
            });
        }

        let split = Self {
            train: samples.slice(0..train_end),
            validation: samples.slice(train_end..val_end),
            test: samples.slice(val_end..n),
        };

        info!(
            "Split: train={}, val={}, test={}",
            split.train.len(),
            split.validation.len(),
            split.test.len()
        );
        Ok(split)
    }
}

fn boundaries(n: usize, train_ratio: f64, val_ratio: f64) -> (usize, usize) {
    let train_end = (train_ratio * n as f64).floor() as usize;
    let val_end = ((train_ratio + val_ratio) * n as f64).floor() as usize;
    (train_end.min(n), val_end.clamp(train_end.min(n), n))
}

/// Per-feature centering and scaling learned from training rows only
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    /// Population std; zero-variance columns are stored as 1
    pub std: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(train: &Array2<f64>) -> ExperimentResult<Self> {
        let mean = train
            .mean_axis(Axis(0))
            .ok_or_else(|| ExperimentError::MalformedInput("cannot standardize zero rows".into()))?;
        let std = train
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });
        Ok(Self { mean, std })
    }

    pub fn transform(&self, features: &Array2<f64>) -> Array2<f64> {
        (features - &self.mean) / &self.std
    }

    pub fn transform_row(&self, raw: ArrayView1<f64>) -> Array1<f64> {
        (&raw - &self.mean) / &self.std
    }

    /// Largest absolute standardized value of a raw feature vector
    pub fn max_abs_z(&self, raw: ArrayView1<f64>) -> f64 {
        self.transform_row(raw)
            .iter()
            .fold(0.0, |acc: f64, z| acc.max(z.abs()))
    }
}

/// Feature matrices after standardization. Test targets stay on the
/// chronological split.
#[derive(Debug, Clone)]
pub struct StandardizedSplit {
    pub scaler: StandardScaler,
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_val: Array2<f64>,
    pub y_val: Array1<f64>,
    pub x_test: Array2<f64>,
}

impl StandardizedSplit {
    pub fn new(split: &ChronologicalSplit) -> ExperimentResult<Self> {
        let scaler = StandardScaler::fit(&split.train.features)?;
        Ok(Self {
            x_train: scaler.transform(&split.train.features),
            y_train: split.train.targets.clone(),
            x_val: scaler.transform(&split.validation.features),
            y_val: split.validation.targets.clone(),
            x_test: scaler.transform(&split.test.features),
            scaler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use ndarray::array;

    fn samples(n: usize) -> LabeledSamples {
        let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
        let features = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 {
                i as f64
            } else {
                // later rows have a much larger scale
                (i as f64).powi(2)
            }
        });
        LabeledSamples {
            feature_ids: vec!["a".into(), "b".into()],
            dates: (0..n).map(|i| start + chrono::Duration::days(i as i64)).collect(),
            prices: (0..n).map(|i| 100.0 + i as f64).collect(),
            features,
            targets: Array1::from_iter((0..n).map(|i| i as f64 / 100.0)),
        }
    }

    #[test]
    fn test_split_boundaries_and_reconstruction() {
        let data = samples(101);
        let split = ChronologicalSplit::new(&data, &SplitSettings::default()).unwrap();

        assert_eq!(split.train.len(), 70);
        assert_eq!(split.validation.len(), 15);
        assert_eq!(split.test.len(), 16);

        let mut dates = split.train.dates.clone();
        dates.extend(&split.validation.dates);
        dates.extend(&split.test.dates);
        assert_eq!(dates, data.dates);
        assert!(split.train.dates.last() < split.validation.dates.first());
        assert!(split.validation.dates.last() < split.test.dates.first());
    }

    #[test]
    fn test_split_rejects_empty_partition() {
        let err = ChronologicalSplit::new(&samples(2), &SplitSettings::default()).unwrap_err();
        assert!(matches!(err, ExperimentError::InsufficientData { rows: 2, .. }));
    }

    #[test]
    fn test_standardization_uses_train_rows_only() {
        let data = samples(200);
        let split = ChronologicalSplit::new(&data, &SplitSettings::default()).unwrap();
        let standardized = StandardizedSplit::new(&split).unwrap();

        for col in standardized.x_train.columns() {
            let values = col.to_vec();
            assert_relative_eq!(crate::stats::mean(&values).unwrap(), 0.0, epsilon = 1e-9);
            assert_relative_eq!(crate::stats::population_std(&values), 1.0, epsilon = 1e-9);
        }

        assert_eq!(standardized.y_train, split.train.targets);
        assert_eq!(standardized.x_test.nrows(), split.test.len());

        // later slices sit far above the train mean for a trending column
        assert!(standardized.x_test.column(1).iter().all(|z| *z > 2.0));
        assert_relative_eq!(
            standardized.scaler.mean[0],
            split.train.features.column(0).mean().unwrap()
        );
    }

    #[test]
    fn test_zero_variance_column_scales_by_one() {
        let train = array![[1.0, 5.0], [3.0, 5.0]];
        let scaler = StandardScaler::fit(&train).unwrap();
        assert_eq!(scaler.std[1], 1.0);
        assert_eq!(scaler.transform(&train).column(1).to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_max_abs_z() {
        let scaler = StandardScaler {
            mean: array![0.0, 1.0],
            std: array![1.0, 0.5],
        };
        assert_relative_eq!(scaler.max_abs_z(array![-3.0, 1.5].view()), 3.0);
        assert_relative_eq!(scaler.max_abs_z(array![0.5, 0.0].view()), 2.0);
    }
}
