//! Batch inference with saved artifacts

use std::path::{Path, PathBuf};

use ndarray::Array1;
use polars::prelude::*;
use tracing::info;

use crate::error::{Result, Stage, StageContext, StageResult};
use crate::export::{load_object, ArtifactKind};
use crate::preprocessing::ColumnTransformer;
use crate::training::{Regressor, TrainedModel};
use crate::utils::{DataLoader, DataSaver};

/// Column holding predictions in written output
pub const PREDICTION_COLUMN: &str = "predicted math score";

/// Fitted transform and model loaded from disk
pub struct PredictPipeline {
    preprocessor: ColumnTransformer,
    model: TrainedModel,
}

impl PredictPipeline {
    pub fn load(preprocessor_path: impl AsRef<Path>, model_path: impl AsRef<Path>) -> StageResult<Self> {
        let preprocessor: ColumnTransformer =
            load_object(preprocessor_path, ArtifactKind::Preprocessor).stage(Stage::Prediction)?;
        let model: TrainedModel = load_object(model_path, ArtifactKind::Model).stage(Stage::Prediction)?;
        info!("Loaded {} and its preprocessing object", model.name());
        Ok(Self { preprocessor, model })
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// Predict for every row of `features`. Extra columns, the target
    /// included, are ignored.
    pub fn predict(&self, features: &DataFrame) -> StageResult<Array1<f64>> {
        let x = self.preprocessor.transform(features).stage(Stage::Prediction)?;
        self.model.predict(&x).stage(Stage::Prediction)
    }

    /// Predict for a CSV file and optionally write it back with a prediction
    /// column appended.
    pub fn predict_csv(&self, data_path: impl AsRef<Path>, output: Option<&PathBuf>) -> StageResult<Array1<f64>> {
        let mut df = DataLoader::new().load_csv(data_path).stage(Stage::Prediction)?;
        let predictions = self.predict(&df)?;
        if let Some(path) = output {
            write_predictions(&mut df, &predictions, path).stage(Stage::Prediction)?;
            info!(path = %path.display(), rows = predictions.len(), "Wrote predictions");
        }
        Ok(predictions)
    }
}

fn write_predictions(df: &mut DataFrame, predictions: &Array1<f64>, path: &Path) -> Result<()> {
    let column = Column::new(PREDICTION_COLUMN.into(), predictions.to_vec());
    df.with_column(column)?;
    DataSaver::save_csv(df, path)
}
