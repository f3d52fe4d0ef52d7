//! End-to-end training run

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{Stage, StageContext, StageResult};
use crate::ingestion::DataIngestion;
use crate::preprocessing::DataTransformation;
use crate::training::{CandidateScoreSummary, ModelTrainer};

/// Files written by a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub raw_data: PathBuf,
    pub train_data: PathBuf,
    pub test_data: PathBuf,
    pub preprocessor: PathBuf,
    pub model: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub best_model: String,
    /// Held-out R² of `best_model`
    pub r2_score: f64,
    pub scores: Vec<CandidateScoreSummary>,
    pub artifacts: ArtifactPaths,
    pub elapsed_seconds: f64,
}

/// Ingestion, transformation and model training, in that order
pub struct TrainPipeline {
    config: PipelineConfig,
}

impl TrainPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> StageResult<TrainingSummary> {
        let start = Instant::now();
        self.config.validate().stage(Stage::Configuration)?;

        let ingestion = DataIngestion::new(self.config.ingestion.clone()).initiate_data_ingestion()?;

        let transformation = DataTransformation::new(self.config.transformation.clone())
            .initiate_data_transformation(&ingestion.train_data_path, &ingestion.test_data_path)?;

        let trained = ModelTrainer::new(self.config.trainer.clone())
            .initiate_model_trainer(&transformation.train_arr, &transformation.test_arr)?;

        let elapsed_seconds = start.elapsed().as_secs_f64();
        info!(
            "Training pipeline finished in {:.2}s: {} (R² = {:.4})",
            elapsed_seconds, trained.best_model_name, trained.r2_score
        );

        Ok(TrainingSummary {
            best_model: trained.best_model_name,
            r2_score: trained.r2_score,
            scores: trained.scores,
            artifacts: ArtifactPaths {
                raw_data: ingestion.raw_data_path,
                train_data: ingestion.train_data_path,
                test_data: ingestion.test_data_path,
                preprocessor: transformation.preprocessor_path,
                model: trained.model_path,
            },
            elapsed_seconds,
        })
    }
}
