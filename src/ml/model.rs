use ndarray::{Array1, Array2, ArrayView1, Axis};
use tracing::debug;

use super::nn::Mlp;
use super::split::StandardScaler;
use super::trainer::TrainingReport;
use crate::error::{ExperimentError, ExperimentResult};

/// Trained network bundled with the training-set standardization it expects.
/// Every input goes through the same stored scaler.
#[derive(Debug, Clone)]
pub struct ReturnPredictor {
    pub feature_ids: Vec<String>,
    network: Mlp,
    scaler: StandardScaler,
    pub report: TrainingReport,
}

impl ReturnPredictor {
    pub fn new(
        feature_ids: Vec<String>,
        network: Mlp,
        scaler: StandardScaler,
        report: TrainingReport,
    ) -> Self {
        Self {
            feature_ids,
            network,
            scaler,
            report,
        }
    }

    /// Predictions for already-standardized rows
    pub fn predict_standardized(&self, x: &Array2<f64>) -> Array1<f64> {
        self.network.predict(x)
    }

    /// Point prediction for one raw feature vector
    pub fn predict_one(&self, raw: &[f64]) -> ExperimentResult<f64> {
        let expected = self.network.input_size();
        if raw.len() != expected {
            return Err(ExperimentError::MalformedInput(format!(
                "expected {} features, got {}",
                expected,
                raw.len()
            )));
        }
        let z = self.scaler.transform_row(ArrayView1::from(raw)).insert_axis(Axis(0));
        let prediction = self.network.predict(&z)[0];
        debug!("Prediction for latest row: {:.6}", prediction);
        Ok(prediction)
    }

    /// Largest |z| of a raw feature vector under the training statistics
    pub fn max_z_score(&self, raw: &[f64]) -> f64 {
        self.scaler.max_abs_z(ArrayView1::from(raw))
    }
}
