//! Data ingestion stage
//!
//! Reads the source table, keeps a raw copy and writes a seeded train/test
//! split next to it.

mod split;

pub use split::{test_count, train_test_split, TrainTestSplit};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::IngestionConfig;
use crate::error::{ScorecastError, Stage, StageContext, StageResult};
use crate::utils::{take_rows, DataLoader, DataSaver};

/// Paths written by [`DataIngestion::initiate_data_ingestion`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataIngestionArtifact {
    pub raw_data_path: PathBuf,
    pub train_data_path: PathBuf,
    pub test_data_path: PathBuf,
}

pub struct DataIngestion {
    config: IngestionConfig,
}

impl DataIngestion {
    pub fn new(config: IngestionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    /// Copy the source table and split it into train and test files.
    pub fn initiate_data_ingestion(&self) -> StageResult<DataIngestionArtifact> {
        info!("Entered the data ingestion method or component");
        let cfg = &self.config;

        let mut df = DataLoader::new()
            .load_csv(&cfg.source_path)
            .stage(Stage::Ingestion)?;
        if df.height() == 0 || df.width() == 0 {
            return Err(ScorecastError::ValidationError(format!(
                "source table {} is empty",
                cfg.source_path.display()
            )))
            .stage(Stage::Ingestion);
        }
        info!(
            rows = df.height(),
            cols = df.width(),
            "Read the dataset as dataframe"
        );

        DataSaver::save_csv(&mut df, &cfg.raw_data_path).stage(Stage::Ingestion)?;

        info!("Train test split initiated");
        let split = train_test_split(df.height(), cfg.test_size, cfg.random_state)
            .stage(Stage::Ingestion)?;
        let mut train = take_rows(&df, &split.train_indices).stage(Stage::Ingestion)?;
        let mut test = take_rows(&df, &split.test_indices).stage(Stage::Ingestion)?;

        DataSaver::save_csv(&mut train, &cfg.train_data_path).stage(Stage::Ingestion)?;
        DataSaver::save_csv(&mut test, &cfg.test_data_path).stage(Stage::Ingestion)?;

        info!(
            train_rows = train.height(),
            test_rows = test.height(),
            "Ingestion of the data is completed"
        );

        Ok(DataIngestionArtifact {
            raw_data_path: cfg.raw_data_path.clone(),
            train_data_path: cfg.train_data_path.clone(),
            test_data_path: cfg.test_data_path.clone(),
        })
    }
}
