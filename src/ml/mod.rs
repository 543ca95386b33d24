pub mod backend;
pub mod dataset;
pub mod evaluation;
pub mod features;
pub mod model;
pub mod nn;
pub mod split;
pub mod trainer;

pub use dataset::{build_dataset, FeatureFrame, LabeledSamples};
pub use evaluation::{NonOverlappingMetrics, RegressionMetrics, UncertaintyEstimate};
pub use features::FeatureSpec;
pub use model::ReturnPredictor;
pub use split::{ChronologicalSplit, StandardizedSplit};
pub use trainer::Trainer;
