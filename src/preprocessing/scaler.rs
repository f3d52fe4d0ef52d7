//! Standard (z-score) scaling

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScorecastError};

/// Parameters for one fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: f64,
    /// Population standard deviation, or 1.0 for a constant column
    pub scale: f64,
}

/// Per-column standard scaler: `(x - mean) / std`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    params: BTreeMap<String, ScalerParams>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        !self.params.is_empty()
    }

    pub fn params(&self) -> &BTreeMap<String, ScalerParams> {
        &self.params
    }

    /// Fit one column. Values must already be imputed.
    pub fn fit_column(&mut self, column: &str, values: &[f64]) -> Result<()> {
        if values.is_empty() {
            return Err(ScorecastError::ValidationError(format!(
                "cannot fit scaler on empty column '{}'",
                column
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ScorecastError::ValidationError(format!(
                "column '{}' contains non-finite values",
                column
            )));
        }

        // Accumulate in sorted order so the statistics do not depend on row order
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let mut deviations: Vec<f64> = sorted.iter().map(|v| (v - mean).powi(2)).collect();
        deviations.sort_by(|a, b| a.total_cmp(b));
        let std = (deviations.iter().sum::<f64>() / n).sqrt();

        let scale = if std > f64::EPSILON { std } else { 1.0 };
        self.params
            .insert(column.to_string(), ScalerParams { mean, scale });
        Ok(())
    }

    /// Scale one column with its fitted parameters.
    pub fn transform_column(&self, column: &str, values: &[f64]) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(ScorecastError::ModelNotFitted);
        }
        let p = self
            .params
            .get(column)
            .ok_or_else(|| ScorecastError::FeatureNotFound(column.to_string()))?;
        Ok(values.iter().map(|v| (v - p.mean) / p.scale).collect())
    }
}
