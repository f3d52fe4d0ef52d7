//! Pipeline configuration
//!
//! Every stage reads its paths and tunables from here. All fields have
//! defaults, so a JSON config file only needs to name what it overrides.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScorecastError};
use crate::training::ModelKind;

/// Directory all run artifacts are written to
pub const ARTIFACTS_DIR: &str = "artifacts";

/// Default location of the source table
pub const DEFAULT_SOURCE_PATH: &str = "notebook/data/stud.csv";

/// Fraction of rows held out for testing
pub const DEFAULT_TEST_SIZE: f64 = 0.2;

/// Seed for the train/test split and seeded models
pub const DEFAULT_RANDOM_STATE: u64 = 42;

/// Minimum held-out R² a model must reach to be persisted
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.6;

/// Folds used by grid search
pub const DEFAULT_CV_FOLDS: usize = 3;

pub const TARGET_COLUMN: &str = "math score";
pub const NUMERICAL_COLUMNS: [&str; 2] = ["writing score", "reading score"];
pub const CATEGORICAL_COLUMNS: [&str; 5] = [
    "gender",
    "race/ethnicity",
    "parental level of education",
    "lunch",
    "test preparation course",
];

fn artifact(name: &str) -> PathBuf {
    Path::new(ARTIFACTS_DIR).join(name)
}

/// Paths and split settings for the ingestion stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub source_path: PathBuf,
    pub raw_data_path: PathBuf,
    pub train_data_path: PathBuf,
    pub test_data_path: PathBuf,
    pub test_size: f64,
    pub random_state: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from(DEFAULT_SOURCE_PATH),
            raw_data_path: artifact("data.csv"),
            train_data_path: artifact("train.csv"),
            test_data_path: artifact("test.csv"),
            test_size: DEFAULT_TEST_SIZE,
            random_state: DEFAULT_RANDOM_STATE,
        }
    }
}

impl IngestionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the source table from `path`
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = path.into();
        self
    }

    /// Write the raw copy and both splits under `dir`
    pub fn with_artifacts_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.raw_data_path = dir.join("data.csv");
        self.train_data_path = dir.join("train.csv");
        self.test_data_path = dir.join("test.csv");
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}

/// Column roles and output path for the transformation stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformationConfig {
    pub preprocessor_path: PathBuf,
    pub target_column: String,
    pub numerical_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
}

impl Default for TransformationConfig {
    fn default() -> Self {
        Self {
            preprocessor_path: artifact("preprocessor.bin"),
            target_column: TARGET_COLUMN.to_string(),
            numerical_columns: NUMERICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            categorical_columns: CATEGORICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl TransformationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preprocessor_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.preprocessor_path = path.into();
        self
    }

    pub fn with_target(mut self, column: impl Into<String>) -> Self {
        self.target_column = column.into();
        self
    }
}

/// Model selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelTrainerConfig {
    pub model_path: PathBuf,
    /// Minimum held-out R² for the winner to be accepted
    pub acceptance_threshold: f64,
    pub cv_folds: usize,
    /// Run grid search; when false every candidate uses its default parameters
    pub tune_hyperparameters: bool,
    pub random_state: u64,
    /// Candidates in evaluation order. Ties resolve to the earliest entry.
    pub roster: Vec<ModelKind>,
}

impl Default for ModelTrainerConfig {
    fn default() -> Self {
        Self {
            model_path: artifact("model.bin"),
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            cv_folds: DEFAULT_CV_FOLDS,
            tune_hyperparameters: true,
            random_state: DEFAULT_RANDOM_STATE,
            roster: ModelKind::roster().to_vec(),
        }
    }
}

impl ModelTrainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.acceptance_threshold = threshold;
        self
    }

    pub fn with_tuning(mut self, enabled: bool) -> Self {
        self.tune_hyperparameters = enabled;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_roster(mut self, roster: Vec<ModelKind>) -> Self {
        self.roster = roster;
        self
    }
}

/// Configuration for a full training run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ingestion: IngestionConfig,
    pub transformation: TransformationConfig,
    pub trainer: ModelTrainerConfig,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point every artifact path at `dir`, keeping the default file names.
    pub fn with_artifacts_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.ingestion = self.ingestion.with_artifacts_dir(dir);
        self.transformation.preprocessor_path = dir.join("preprocessor.bin");
        self.trainer.model_path = dir.join("model.bin");
        self
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.ingestion.source_path = path.into();
        self
    }

    /// Load a configuration from a JSON file. Values are checked when a
    /// pipeline runs, see [`validate`](Self::validate).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Reject settings no stage can run with
    pub fn validate(&self) -> Result<()> {
        let test_size = self.ingestion.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(ScorecastError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                test_size
            )));
        }
        if self.trainer.cv_folds < 2 {
            return Err(ScorecastError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.trainer.cv_folds
            )));
        }
        if !self.trainer.acceptance_threshold.is_finite() {
            return Err(ScorecastError::ConfigError(
                "acceptance_threshold must be finite".to_string(),
            ));
        }
        if self.trainer.roster.is_empty() {
            return Err(ScorecastError::ConfigError("model roster is empty".to_string()));
        }
        let t = &self.transformation;
        if t.numerical_columns.is_empty() && t.categorical_columns.is_empty() {
            return Err(ScorecastError::ConfigError(
                "no input feature columns configured".to_string(),
            ));
        }
        if t.numerical_columns.contains(&t.target_column)
            || t.categorical_columns.contains(&t.target_column)
        {
            return Err(ScorecastError::ConfigError(format!(
                "target column '{}' is also listed as a feature",
                t.target_column
            )));
        }
        Ok(())
    }
}
