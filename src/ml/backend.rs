use ndarray::{Array2, ArrayView2};
use std::fmt;
use tracing::debug;

/// Where the network's matrix products run. Selected once when training
/// starts and carried by the trained model for evaluation and inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComputeBackend {
    #[default]
    Cpu,
}

impl ComputeBackend {
    /// Best backend available in this build
    pub fn select() -> Self {
        let backend = ComputeBackend::Cpu;
        debug!("Compute backend: {}", backend);
        backend
    }

    pub fn matmul(&self, a: ArrayView2<f64>, b: ArrayView2<f64>) -> Array2<f64> {
        match self {
            ComputeBackend::Cpu => a.dot(&b),
        }
    }
}

impl fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeBackend::Cpu => write!(f, "cpu"),
        }
    }
}
