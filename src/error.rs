//! Error types for the scorecast pipeline
//!
//! Components return [`ScorecastError`] through [`Result`]. Pipeline stages wrap
//! those causes in a [`PipelineError`] that also records which stage failed and
//! the source location the failure was raised from.

use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for component-level operations
pub type Result<T> = std::result::Result<T, ScorecastError>;

/// Result type alias for pipeline stages
pub type StageResult<T> = std::result::Result<T, PipelineError>;

/// Underlying cause of a failure
#[derive(Error, Debug)]
pub enum ScorecastError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error(
        "No best model found with acceptable performance: {best_model} scored R² {score:.4}, threshold is {threshold}"
    )]
    NoAcceptableModel {
        best_model: String,
        score: f64,
        threshold: f64,
    },
}

impl From<polars::error::PolarsError> for ScorecastError {
    fn from(err: polars::error::PolarsError) -> Self {
        ScorecastError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ScorecastError {
    fn from(err: serde_json::Error) -> Self {
        ScorecastError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for ScorecastError {
    fn from(err: bincode::Error) -> Self {
        ScorecastError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ScorecastError {
    fn from(err: ndarray::ShapeError) -> Self {
        ScorecastError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

/// Pipeline stage a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Configuration,
    Ingestion,
    Transformation,
    ModelTraining,
    Prediction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configuration => "configuration",
            Stage::Ingestion => "data ingestion",
            Stage::Transformation => "data transformation",
            Stage::ModelTraining => "model training",
            Stage::Prediction => "prediction",
        };
        f.write_str(name)
    }
}

/// A failure tagged with its stage and the location it was raised from
#[derive(Error, Debug)]
#[error("Error occurred in [{file}] line number [{line}] during {stage}: error message [{source}]")]
pub struct PipelineError {
    pub stage: Stage,
    pub file: &'static str,
    pub line: u32,
    #[source]
    pub source: ScorecastError,
}

impl PipelineError {
    /// Wrap `source`, recording the caller's location.
    #[track_caller]
    pub fn new(stage: Stage, source: impl Into<ScorecastError>) -> Self {
        let location = Location::caller();
        Self {
            stage,
            file: location.file(),
            line: location.line(),
            source: source.into(),
        }
    }

    /// The underlying cause.
    pub fn cause(&self) -> &ScorecastError {
        &self.source
    }

    /// True when the failure is the sub-threshold model rejection.
    pub fn is_rejection(&self) -> bool {
        matches!(self.source, ScorecastError::NoAcceptableModel { .. })
    }
}

/// Attach a stage tag to a component result.
pub trait StageContext<T> {
    fn stage(self, stage: Stage) -> StageResult<T>;
}

impl<T, E> StageContext<T> for std::result::Result<T, E>
where
    E: Into<ScorecastError>,
{
    #[track_caller]
    fn stage(self, stage: Stage) -> StageResult<T> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => {
                let err = PipelineError::new(stage, err);
                tracing::error!("{}", err);
                Err(err)
            }
        }
    }
}
