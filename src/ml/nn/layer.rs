//! Fully connected layer: `output = activation(input · weights + bias)`,
//! optionally followed by inverted dropout while training.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::Rng;

use crate::ml::backend::ComputeBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Identity,
}

impl Activation {
    fn apply(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Identity => z.clone(),
        }
    }

    fn derivative(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Identity => Array2::ones(z.dim()),
        }
    }
}

/// Values kept from the last training forward pass
#[derive(Debug)]
struct ForwardCache {
    input: Array2<f64>,
    z: Array2<f64>,
    dropout_mask: Option<Array2<f64>>,
}

/// Gradients of the loss w.r.t. a layer's parameters and its input
pub struct LayerGradients {
    pub input: Array2<f64>,
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
}

#[derive(Debug)]
pub struct DenseLayer {
    /// `input_size x output_size`
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
    pub activation: Activation,
    pub dropout_rate: f64,
    cache: Option<ForwardCache>,
}

impl DenseLayer {
    /// Uniform init in `±1/sqrt(input_size)` for weights and biases
    pub fn new(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut StdRng,
    ) -> Self {
        let bound = 1.0 / (input_size.max(1) as f64).sqrt();
        let weights =
            Array2::from_shape_fn((input_size, output_size), |_| rng.gen_range(-bound..bound));
        let biases = Array1::from_shape_fn(output_size, |_| rng.gen_range(-bound..bound));

        Self {
            weights,
            biases,
            activation,
            dropout_rate: 0.0,
            cache: None,
        }
    }

    pub fn with_dropout(mut self, rate: f64) -> Self {
        self.dropout_rate = rate.clamp(0.0, 1.0);
        self
    }

    fn linear(&self, input: &Array2<f64>, backend: ComputeBackend) -> Array2<f64> {
        backend.matmul(input.view(), self.weights.view()) + &self.biases
    }

    /// Training-mode pass; caches what `backward` needs
    pub fn forward(
        &mut self,
        input: &Array2<f64>,
        backend: ComputeBackend,
        rng: &mut StdRng,
    ) -> Array2<f64> {
        let z = self.linear(input, backend);
        let mut output = self.activation.apply(&z);

        let dropout_mask = if self.dropout_rate > 0.0 {
            let keep = 1.0 - self.dropout_rate;
            let mask = Array2::from_shape_fn(output.dim(), |_| {
                if rng.gen::<f64>() < keep {
                    1.0 / keep
                } else {
                    0.0
                }
            });
            output = &output * &mask;
            Some(mask)
        } else {
            None
        };

        self.cache = Some(ForwardCache {
            input: input.clone(),
            z,
            dropout_mask,
        });
        output
    }

    /// Eval-mode pass: no dropout, no caching
    pub fn infer(&self, input: &Array2<f64>, backend: ComputeBackend) -> Array2<f64> {
        self.activation.apply(&self.linear(input, backend))
    }

    /// Backpropagate `output_gradient` through the last training pass.
    /// Returns `None` when no forward pass has been cached.
    pub fn backward(
        &self,
        output_gradient: &Array2<f64>,
        backend: ComputeBackend,
    ) -> Option<LayerGradients> {
        let cache = self.cache.as_ref()?;

        let grad = match &cache.dropout_mask {
            Some(mask) => output_gradient * mask,
            None => output_gradient.clone(),
        };
        let delta = &grad * &self.activation.derivative(&cache.z);

        Some(LayerGradients {
            weights: backend.matmul(cache.input.t(), delta.view()),
            biases: delta.sum_axis(Axis(0)),
            input: backend.matmul(delta.view(), self.weights.t()),
        })
    }

    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}

impl Clone for DenseLayer {
    /// Copies parameters only; the forward cache is per training step
    fn clone(&self) -> Self {
        Self {
            weights: self.weights.clone(),
            biases: self.biases.clone(),
            activation: self.activation,
            dropout_rate: self.dropout_rate,
            cache: None,
        }
    }
}
