//! Data transformation stage

use std::path::{Path, PathBuf};

use ndarray::{concatenate, Array1, Array2, Axis};
use polars::prelude::DataFrame;
use tracing::info;

use super::column_transformer::ColumnTransformer;
use crate::config::TransformationConfig;
use crate::error::{Result, ScorecastError, Stage, StageContext, StageResult};
use crate::export::{save_object, ArtifactKind};
use crate::utils::{numeric_column, DataLoader};

/// Feature+target matrices and the saved transform location
#[derive(Debug, Clone)]
pub struct TransformationArtifact {
    /// Transformed train features with the target as the last column
    pub train_arr: Array2<f64>,
    /// Transformed test features with the target as the last column
    pub test_arr: Array2<f64>,
    pub preprocessor_path: PathBuf,
}

pub struct DataTransformation {
    config: TransformationConfig,
}

/// Read the target column, rejecting missing values.
pub fn target_values(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
    let values = numeric_column(df, target)?;
    let missing = values.iter().filter(|v| v.map_or(true, f64::is_nan)).count();
    if missing > 0 {
        return Err(ScorecastError::ValidationError(format!(
            "target column '{}' has {} missing values",
            target, missing
        )));
    }
    Ok(values.into_iter().flatten().collect())
}

/// Append `target` to `features` as the final column.
pub fn attach_target(features: Array2<f64>, target: &Array1<f64>) -> Result<Array2<f64>> {
    if features.nrows() != target.len() {
        return Err(ScorecastError::ShapeError {
            expected: format!("{} target values", features.nrows()),
            actual: target.len().to_string(),
        });
    }
    let target_col = target.view().insert_axis(Axis(1));
    Ok(concatenate(Axis(1), &[features.view(), target_col])?)
}

/// Split a feature+target matrix back into `(x, y)`.
pub fn split_features_target(arr: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
    let n_cols = arr.ncols();
    if n_cols < 2 {
        return Err(ScorecastError::ShapeError {
            expected: "at least one feature column plus the target".to_string(),
            actual: format!("{} columns", n_cols),
        });
    }
    let x = arr.slice(ndarray::s![.., ..n_cols - 1]).to_owned();
    let y = arr.column(n_cols - 1).to_owned();
    Ok((x, y))
}

impl DataTransformation {
    pub fn new(config: TransformationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransformationConfig {
        &self.config
    }

    /// Unfitted transform over the configured feature columns
    pub fn get_data_transformer_object(&self) -> ColumnTransformer {
        info!(
            numerical = ?self.config.numerical_columns,
            categorical = ?self.config.categorical_columns,
            "building preprocessing object"
        );
        ColumnTransformer::new(
            self.config.numerical_columns.clone(),
            self.config.categorical_columns.clone(),
        )
    }

    /// Fit the transform on the train split, apply it to both splits and save it.
    pub fn initiate_data_transformation(
        &self,
        train_path: impl AsRef<Path>,
        test_path: impl AsRef<Path>,
    ) -> StageResult<TransformationArtifact> {
        let loader = DataLoader::new();
        let train_df = loader
            .load_csv(train_path.as_ref())
            .stage(Stage::Transformation)?;
        let test_df = loader
            .load_csv(test_path.as_ref())
            .stage(Stage::Transformation)?;
        info!("Read train and test data completed");

        let target = &self.config.target_column;
        let train_target = target_values(&train_df, target).stage(Stage::Transformation)?;
        let test_target = target_values(&test_df, target).stage(Stage::Transformation)?;

        let mut preprocessor = self.get_data_transformer_object();
        info!("Applying preprocessing object on training dataframe and testing dataframe");
        let train_features = preprocessor
            .fit_transform(&train_df)
            .stage(Stage::Transformation)?;
        let test_features = preprocessor
            .transform(&test_df)
            .stage(Stage::Transformation)?;

        let train_arr = attach_target(train_features, &train_target).stage(Stage::Transformation)?;
        let test_arr = attach_target(test_features, &test_target).stage(Stage::Transformation)?;

        save_object(
            &self.config.preprocessor_path,
            ArtifactKind::Preprocessor,
            "column transformer",
            &preprocessor,
        )
        .stage(Stage::Transformation)?;
        info!(
            features = preprocessor.n_output_features(),
            train_rows = train_arr.nrows(),
            test_rows = test_arr.nrows(),
            "Saved preprocessing object"
        );

        Ok(TransformationArtifact {
            train_arr,
            test_arr,
            preprocessor_path: self.config.preprocessor_path.clone(),
        })
    }
}
