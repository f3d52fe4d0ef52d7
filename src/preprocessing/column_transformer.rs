//! Column-wise preprocessing transform
//!
//! Numeric columns go through median imputation and standard scaling;
//! categorical columns go through most-frequent imputation and one-hot
//! encoding. Output columns are the numeric block followed by one block per
//! categorical column, in the configured column order.

use std::collections::BTreeMap;
use std::time::Instant;

use ndarray::{s, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::encoder::OneHotEncoder;
use super::imputer::{ImputeStrategy, ImputeValue, Imputer};
use super::scaler::{ScalerParams, StandardScaler};
use crate::error::{Result, ScorecastError};
use crate::utils::{numeric_column, string_column};

/// Snapshot of everything the transform learned during fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedParams {
    pub numeric_fill: BTreeMap<String, f64>,
    pub categorical_fill: BTreeMap<String, String>,
    pub scaling: BTreeMap<String, ScalerParams>,
    pub categories: BTreeMap<String, Vec<String>>,
}

/// Fitted preprocessing transform for the feature columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    numerical_columns: Vec<String>,
    categorical_columns: Vec<String>,
    numeric_imputer: Imputer,
    scaler: StandardScaler,
    categorical_imputer: Imputer,
    encoder: OneHotEncoder,
    is_fitted: bool,
}

impl ColumnTransformer {
    pub fn new(numerical_columns: Vec<String>, categorical_columns: Vec<String>) -> Self {
        Self {
            numerical_columns,
            categorical_columns,
            numeric_imputer: Imputer::new(ImputeStrategy::Median),
            scaler: StandardScaler::new(),
            categorical_imputer: Imputer::new(ImputeStrategy::MostFrequent),
            encoder: OneHotEncoder::new(),
            is_fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn numerical_columns(&self) -> &[String] {
        &self.numerical_columns
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    /// Learn imputation values, scaling and vocabularies from `df`.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let start = Instant::now();
        if df.height() == 0 {
            return Err(ScorecastError::ValidationError(
                "cannot fit preprocessing on an empty table".to_string(),
            ));
        }

        let mut numeric_imputer = Imputer::new(self.numeric_imputer.strategy());
        let mut scaler = StandardScaler::new();
        for col in &self.numerical_columns {
            let raw = numeric_column(df, col)?;
            numeric_imputer.fit_numeric(col, &raw)?;
            let filled = numeric_imputer.fill_numeric(col, &raw)?;
            scaler.fit_column(col, &filled)?;
        }

        let mut categorical_imputer = Imputer::new(self.categorical_imputer.strategy());
        let mut encoder = OneHotEncoder::new();
        for col in &self.categorical_columns {
            let raw = string_column(df, col)?;
            categorical_imputer.fit_text(col, &raw)?;
            let filled = categorical_imputer.fill_text(col, &raw)?;
            encoder.fit_column(col, &filled)?;
        }

        self.numeric_imputer = numeric_imputer;
        self.scaler = scaler;
        self.categorical_imputer = categorical_imputer;
        self.encoder = encoder;
        self.is_fitted = true;

        debug!(
            rows = df.height(),
            output_features = self.n_output_features(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fitted column transformer"
        );
        Ok(self)
    }

    /// Apply the fitted transform. Never modifies the fitted state.
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ScorecastError::ModelNotFitted);
        }

        let n_rows = df.height();
        let mut out = Array2::<f64>::zeros((n_rows, self.n_output_features()));
        let mut offset = 0;

        for col in &self.numerical_columns {
            let raw = numeric_column(df, col)?;
            let filled = self.numeric_imputer.fill_numeric(col, &raw)?;
            let scaled = self.scaler.transform_column(col, &filled)?;
            for (row, value) in scaled.into_iter().enumerate() {
                out[[row, offset]] = value;
            }
            offset += 1;
        }

        for col in &self.categorical_columns {
            let raw = string_column(df, col)?;
            let filled = self.categorical_imputer.fill_text(col, &raw)?;
            let block = self.encoder.transform_column(col, &filled)?;
            let width = block.ncols();
            out.slice_mut(s![.., offset..offset + width]).assign(&block);
            offset += width;
        }

        Ok(out)
    }

    /// Fit on `df` and transform it
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Number of output columns; zero before fit for categorical blocks
    pub fn n_output_features(&self) -> usize {
        let categorical: usize = self
            .categorical_columns
            .iter()
            .map(|c| self.encoder.n_categories(c).unwrap_or(0))
            .sum();
        self.numerical_columns.len() + categorical
    }

    /// Names of the output columns in order
    pub fn feature_names(&self) -> Result<Vec<String>> {
        if !self.is_fitted {
            return Err(ScorecastError::ModelNotFitted);
        }
        let mut names = self.numerical_columns.clone();
        for col in &self.categorical_columns {
            names.extend(self.encoder.feature_names(col)?);
        }
        Ok(names)
    }

    /// Everything learned during fit
    pub fn fitted_params(&self) -> Result<FittedParams> {
        if !self.is_fitted {
            return Err(ScorecastError::ModelNotFitted);
        }

        let numeric_fill = self
            .numeric_imputer
            .fill_values()
            .iter()
            .filter_map(|(k, v)| match v {
                ImputeValue::Numeric(x) => Some((k.clone(), *x)),
                ImputeValue::Text(_) => None,
            })
            .collect();
        let categorical_fill = self
            .categorical_imputer
            .fill_values()
            .iter()
            .filter_map(|(k, v)| match v {
                ImputeValue::Text(s) => Some((k.clone(), s.clone())),
                ImputeValue::Numeric(_) => None,
            })
            .collect();

        Ok(FittedParams {
            numeric_fill,
            categorical_fill,
            scaling: self.scaler.params().clone(),
            categories: self.encoder.categories().clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn transformer() -> ColumnTransformer {
        ColumnTransformer::new(
            vec!["reading score".to_string()],
            vec!["gender".to_string(), "lunch".to_string()],
        )
    }

    fn train_df() -> DataFrame {
        df!(
            "reading score" => &[Some(60i64), None, Some(80), Some(70)],
            "gender" => &[Some("female"), Some("male"), None, Some("male")],
            "lunch" => &["standard", "standard", "free/reduced", "standard"],
        )
        .unwrap()
    }

    #[test]
    fn test_fit_transform_layout() {
        let mut ct = transformer();
        let arr = ct.fit_transform(&train_df()).unwrap();

        assert_eq!(arr.shape(), &[4, 5]);
        assert_eq!(
            ct.feature_names().unwrap(),
            vec![
                "reading score",
                "gender_female",
                "gender_male",
                "lunch_free/reduced",
                "lunch_standard"
            ]
        );

        let params = ct.fitted_params().unwrap();
        assert_eq!(params.numeric_fill["reading score"], 70.0);
        assert_eq!(params.categorical_fill["gender"], "male");

        // Imputed row: median 70 scales to 0, mode "male"
        assert!(arr[[1, 0]].abs() < 1e-12);
        assert_eq!(arr.row(2).slice(s![1..3]).to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_unknown_category_is_all_zero() {
        let mut ct = transformer();
        ct.fit(&train_df()).unwrap();

        let test = df!(
            "reading score" => &[65i64],
            "gender" => &["nonbinary"],
            "lunch" => &["standard"],
        )
        .unwrap();
        let arr = ct.transform(&test).unwrap();
        assert_eq!(arr.row(0).slice(s![1..3]).to_vec(), vec![0.0, 0.0]);
        assert_eq!(arr[[0, 4]], 1.0);
    }

    #[test]
    fn test_missing_column_and_unfitted() {
        let ct = transformer();
        assert!(matches!(ct.transform(&train_df()), Err(ScorecastError::ModelNotFitted)));

        let mut ct = transformer();
        let df = df!("reading score" => &[1.0, 2.0]).unwrap();
        assert!(matches!(ct.fit(&df), Err(ScorecastError::FeatureNotFound(_))));
    }
}
