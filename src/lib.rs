//! Scorecast - student math score regression pipeline
//!
//! Three stages run in order, sharing an `artifacts/` directory:
//! - ingestion: read the source table, keep a raw copy, split 80/20
//! - transformation: impute, scale and one-hot encode, fitted on train only
//! - model training: evaluate a fixed roster of regressors (optionally grid
//!   searched), keep the best held-out R² and save it
//!
//! # Modules
//!
//! - [`ingestion`] - Source loading and the seeded train/test split
//! - [`preprocessing`] - Imputer, scaler, encoder and column transformer
//! - [`training`] - Regressors, cross-validation, grid search, model trainer
//! - [`export`] - Artifact serialization
//! - [`pipeline`] - Training and prediction pipelines
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

pub mod config;
pub mod logging;

// Stages
pub mod ingestion;
pub mod preprocessing;
pub mod training;

// Utilities
pub mod export;
pub mod utils;

// Orchestration
pub mod pipeline;
pub mod cli;

pub use error::{PipelineError, Result, ScorecastError, Stage, StageResult};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PipelineError, Result, ScorecastError, Stage, StageContext, StageResult};

    // Configuration
    pub use crate::config::{IngestionConfig, ModelTrainerConfig, PipelineConfig, TransformationConfig};

    // Stages
    pub use crate::ingestion::{DataIngestion, DataIngestionArtifact};
    pub use crate::preprocessing::{ColumnTransformer, DataTransformation, TransformationArtifact};
    pub use crate::training::{ModelKind, ModelTrainer, ModelTrainerArtifact, Regressor, TrainedModel};

    // Pipelines
    pub use crate::pipeline::{PredictPipeline, TrainPipeline, TrainingSummary};
}
