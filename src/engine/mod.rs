pub mod backtest;
pub mod experiment;
pub mod forecast;
pub mod pipeline;
pub mod results;

pub use experiment::{ExperimentResponse, ExperimentRunner};
pub use forecast::PredictionArtifact;
pub use pipeline::TrainedPipeline;
