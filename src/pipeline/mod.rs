//! Pipelines built from the stages: training end to end, and inference from
//! saved artifacts

mod predict;
mod train;

pub use predict::{PredictPipeline, PREDICTION_COLUMN};
pub use train::{ArtifactPaths, TrainPipeline, TrainingSummary};
