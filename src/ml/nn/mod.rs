//! Minimal multilayer perceptron for return regression.

pub mod layer;
pub mod network;
pub mod optimizer;

pub use network::Mlp;
pub use optimizer::{build_optimizer, Optimizer};
