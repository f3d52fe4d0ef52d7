//! Regressor trait and evaluation metrics

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScorecastError};

/// A regression model that can be fit and queried
pub trait Regressor: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict targets for `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn is_fitted(&self) -> bool;
}

/// Check that `x` and `y` describe the same non-empty, finite sample.
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ScorecastError::ValidationError(format!(
            "cannot fit on a {}x{} matrix",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.nrows() != y.len() {
        return Err(ScorecastError::ShapeError {
            expected: format!("{} targets", x.nrows()),
            actual: y.len().to_string(),
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(ScorecastError::ValidationError(
            "training data contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

/// Check that `x` has the feature count the model was fitted with.
pub(crate) fn check_predict_input(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(ScorecastError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Coefficient of determination.
///
/// A constant `y_true` scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(ScorecastError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: y_pred.len().to_string(),
        });
    }
    if y_true.is_empty() {
        return Err(ScorecastError::ValidationError(
            "R² is undefined for zero samples".to_string(),
        ));
    }

    let n = y_true.len() as f64;
    let y_mean = y_true.sum() / n;
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot > 0.0 {
        Ok(1.0 - ss_res / ss_tot)
    } else if ss_res == 0.0 {
        Ok(1.0)
    } else {
        Ok(0.0)
    }
}

/// Highest-scoring item; ties keep the earliest and NaN scores never win
/// over a real one. When every score is NaN the first item is returned.
pub fn first_max_by<'a, T, I, F>(items: I, score: F) -> Option<&'a T>
where
    I: IntoIterator<Item = &'a T>,
    F: Fn(&T) -> f64,
{
    items.into_iter().fold(None, |best, cand| match best {
        None => Some(cand),
        Some(b) if score(cand).is_nan() => Some(b),
        Some(b) if score(b) >= score(cand) => Some(b),
        _ => Some(cand),
    })
}

/// Regression metrics for a set of predictions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub r2: f64,
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute regression metrics
    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        let r2 = r2_score(y_true, y_pred)?;
        let n = y_true.len() as f64;
        let (sq, abs) = y_true
            .iter()
            .zip(y_pred.iter())
            .fold((0.0, 0.0), |(sq, abs), (t, p)| {
                let e = t - p;
                (sq + e * e, abs + e.abs())
            });
        let mse = sq / n;

        Ok(Self {
            r2,
            mse,
            rmse: mse.sqrt(),
            mae: abs / n,
            n_samples: y_true.len(),
        })
    }
}
