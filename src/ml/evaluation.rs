//! Held-out quality metrics and the heuristic forecast interval.

use serde::Serialize;

use crate::config::UncertaintySettings;
use crate::stats;

/// Overlapping-window metrics over every test row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mse: f64,
    pub direction_accuracy: f64,
    pub mae: f64,
    /// `std(predicted) / std(actual)`; below 1 means the model is too timid
    pub calibration_ratio: f64,
}

impl RegressionMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        let true_std = stats::population_std(actual);
        let calibration_ratio = if true_std > 0.0 {
            stats::population_std(predicted) / true_std
        } else {
            0.0
        };

        Self {
            r2: stats::r_squared(actual, predicted),
            mse: stats::mean_squared_error(actual, predicted),
            direction_accuracy: stats::direction_accuracy(actual, predicted),
            mae: stats::mean_absolute_error(actual, predicted),
            calibration_ratio,
        }
    }
}

/// Rows `0, stride, 2*stride, ...` below `n`
pub fn non_overlapping_indices(n: usize, stride: usize) -> Vec<usize> {
    (0..n).step_by(stride.max(1)).collect()
}

/// Metrics on rows whose target windows do not overlap
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonOverlappingMetrics {
    pub r2: f64,
    pub direction_accuracy: f64,
    pub samples: usize,
}

impl NonOverlappingMetrics {
    /// Fewer than two independent rows yields zeros with the row count
    pub fn compute(actual: &[f64], predicted: &[f64], stride: usize) -> Self {
        let indices = non_overlapping_indices(actual.len().min(predicted.len()), stride);
        if indices.len() < 2 {
            return Self {
                r2: 0.0,
                direction_accuracy: 0.0,
                samples: indices.len(),
            };
        }

        let a: Vec<f64> = indices.iter().map(|&i| actual[i]).collect();
        let p: Vec<f64> = indices.iter().map(|&i| predicted[i]).collect();
        Self {
            r2: stats::r_squared(&a, &p),
            direction_accuracy: stats::direction_accuracy(&a, &p),
            samples: indices.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UncertaintyEstimate {
    /// Population std of test residuals
    pub base_std: f64,
    pub adjusted_std: f64,
    pub extrapolation_multiplier: f64,
    pub is_extrapolating: bool,
    /// Largest |z| of the inference inputs under training statistics
    pub max_z_score: f64,
}

impl UncertaintyEstimate {
    /// Widen the residual std when the inference inputs sit outside the
    /// training distribution, then apply the market floor.
    pub fn estimate(
        actual: &[f64],
        predicted: &[f64],
        max_z_score: f64,
        settings: &UncertaintySettings,
    ) -> Self {
        let base_std = stats::population_std(&stats::residuals(actual, predicted));
        let excess = (max_z_score - settings.extrapolation_threshold).max(0.0);
        let extrapolation_multiplier = 1.0 + settings.extrapolation_slope * excess;
        let adjusted_std = (base_std * extrapolation_multiplier).max(settings.market_floor);

        Self {
            base_std,
            adjusted_std,
            extrapolation_multiplier,
            is_extrapolating: max_z_score > settings.extrapolation_threshold,
            max_z_score,
        }
    }

    pub fn interval(&self, point: f64, z: f64) -> ConfidenceInterval {
        ConfidenceInterval {
            low: point - z * self.adjusted_std,
            high: point + z * self.adjusted_std,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub low: f64,
    pub high: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_regression_metrics() {
        let actual = [0.10, -0.05, 0.20, 0.00];
        let predicted = [0.05, 0.05, 0.10, -0.02];
        let m = RegressionMetrics::compute(&actual, &predicted);

        assert_relative_eq!(m.mse, (0.0025 + 0.01 + 0.01 + 0.0004) / 4.0, epsilon = 1e-12);
        assert_relative_eq!(m.mae, (0.05 + 0.10 + 0.10 + 0.02) / 4.0, epsilon = 1e-12);
        // 0.10/0.05 agree, -0.05/0.05 disagree, 0.20/0.10 agree, 0.00/-0.02 agree
        assert_relative_eq!(m.direction_accuracy, 0.75);
        assert!(m.calibration_ratio > 0.0 && m.calibration_ratio < 1.0);
    }

    #[test]
    fn test_calibration_zero_when_actual_flat() {
        let m = RegressionMetrics::compute(&[0.1, 0.1, 0.1], &[0.0, 0.1, 0.2]);
        assert_eq!(m.calibration_ratio, 0.0);
        assert_eq!(m.r2, 0.0);
    }

    #[test]
    fn test_non_overlapping_indices() {
        assert_eq!(non_overlapping_indices(600, 252), vec![0, 252, 504]);
        assert_eq!(non_overlapping_indices(3, 1), vec![0, 1, 2]);
        assert!(non_overlapping_indices(0, 252).is_empty());
    }

    #[test]
    fn test_single_window_reports_neutral_metrics() {
        let actual = vec![0.1; 252];
        let predicted = vec![0.2; 252];
        let m = NonOverlappingMetrics::compute(&actual, &predicted, 252);
        assert_eq!(m.samples, 1);
        assert_eq!(m.r2, 0.0);
        assert_eq!(m.direction_accuracy, 0.0);
    }

    #[test]
    fn test_non_overlapping_uses_strided_rows() {
        let actual = [0.1, 9.0, -0.2, 9.0, 0.3];
        let predicted = [0.2, -9.0, -0.1, -9.0, 0.1];
        let m = NonOverlappingMetrics::compute(&actual, &predicted, 2);
        assert_eq!(m.samples, 3);
        assert_relative_eq!(m.direction_accuracy, 1.0);
    }

    #[test]
    fn test_market_floor_dominates_small_residuals() {
        // residuals of +-0.05 have population std 0.05
        let actual = [0.05, -0.05, 0.05, -0.05];
        let predicted = [0.0; 4];
        let settings = UncertaintySettings::default();
        let u = UncertaintyEstimate::estimate(&actual, &predicted, 1.0, &settings);
        assert_relative_eq!(u.base_std, 0.05, epsilon = 1e-12);
        assert_eq!(u.extrapolation_multiplier, 1.0);
        assert!(!u.is_extrapolating);
        assert_eq!(u.adjusted_std, 0.10);
    }

    #[test]
    fn test_extrapolation_multiplier() {
        let actual = [0.3, -0.3, 0.3, -0.3];
        let predicted = [0.0; 4];
        let settings = UncertaintySettings::default();
        let u = UncertaintyEstimate::estimate(&actual, &predicted, 5.0, &settings);
        assert_relative_eq!(u.extrapolation_multiplier, 1.3, epsilon = 1e-12);
        assert!(u.is_extrapolating);
        assert_relative_eq!(u.adjusted_std, 0.39, epsilon = 1e-12);

        let ci = u.interval(0.08, 1.96);
        assert_relative_eq!(ci.low, 0.08 - 1.96 * 0.39, epsilon = 1e-12);
        assert_relative_eq!(ci.high, 0.08 + 1.96 * 0.39, epsilon = 1e-12);
    }
}
