use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;

use super::layer::{Activation, DenseLayer};
use super::optimizer::Optimizer;
use crate::ml::backend::ComputeBackend;

/// Feed-forward regressor: ReLU hidden layers with dropout, one linear output.
///
/// `Clone` copies parameters only, which is what a best-epoch snapshot needs.
#[derive(Debug, Clone)]
pub struct Mlp {
    pub layers: Vec<DenseLayer>,
    pub backend: ComputeBackend,
}

impl Mlp {
    pub fn new(
        input_size: usize,
        hidden_sizes: &[usize],
        dropout: f64,
        backend: ComputeBackend,
        rng: &mut StdRng,
    ) -> Self {
        let mut layers = Vec::with_capacity(hidden_sizes.len() + 1);
        let mut fan_in = input_size;
        for &size in hidden_sizes {
            layers.push(DenseLayer::new(fan_in, size, Activation::Relu, rng).with_dropout(dropout));
            fan_in = size;
        }
        layers.push(DenseLayer::new(fan_in, 1, Activation::Identity, rng));

        Self { layers, backend }
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.weights.nrows())
    }

    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(DenseLayer::num_parameters).sum()
    }

    /// Training-mode forward pass; returns one prediction per row
    pub fn forward_train(&mut self, x: &Array2<f64>, rng: &mut StdRng) -> Array1<f64> {
        let backend = self.backend;
        let mut output = x.clone();
        for layer in &mut self.layers {
            output = layer.forward(&output, backend, rng);
        }
        output.index_axis_move(Axis(1), 0)
    }

    /// Eval-mode forward pass
    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        let mut output = x.clone();
        for layer in &self.layers {
            output = layer.infer(&output, self.backend);
        }
        output.index_axis_move(Axis(1), 0)
    }

    pub fn mse(&self, x: &Array2<f64>, y: &Array1<f64>) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        let diff = self.predict(x) - y;
        diff.mapv(|d| d * d).sum() / y.len() as f64
    }

    /// Backpropagate the MSE of the last `forward_train` call and apply one
    /// optimizer step per layer.
    pub fn backward(
        &mut self,
        predictions: &Array1<f64>,
        targets: &Array1<f64>,
        optimizers: &mut [Box<dyn Optimizer>],
    ) {
        let n = predictions.len().max(1) as f64;
        let mut gradient = ((predictions - targets) * (2.0 / n)).insert_axis(Axis(1));

        for (layer, optimizer) in self.layers.iter_mut().zip(optimizers.iter_mut()).rev() {
            let Some(grads) = layer.backward(&gradient, self.backend) else {
                return;
            };
            optimizer.update_weights(&mut layer.weights, &grads.weights);
            optimizer.update_biases(&mut layer.biases, &grads.biases);
            gradient = grads.input;
        }
    }
}
