//! One-hot encoding of categorical columns

use std::collections::{BTreeMap, BTreeSet};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScorecastError};

/// One-hot encoder with a sorted vocabulary per column. Categories not seen
/// during fit encode as an all-zero block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: BTreeMap<String, Vec<String>>,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        !self.categories.is_empty()
    }

    /// Vocabulary per column, sorted
    pub fn categories(&self) -> &BTreeMap<String, Vec<String>> {
        &self.categories
    }

    fn vocabulary(&self, column: &str) -> Result<&[String]> {
        if !self.is_fitted() {
            return Err(ScorecastError::ModelNotFitted);
        }
        self.categories
            .get(column)
            .map(Vec::as_slice)
            .ok_or_else(|| ScorecastError::FeatureNotFound(column.to_string()))
    }

    /// Learn the vocabulary of one column.
    pub fn fit_column(&mut self, column: &str, values: &[String]) -> Result<()> {
        let vocab: BTreeSet<&String> = values.iter().collect();
        if vocab.is_empty() {
            return Err(ScorecastError::ValidationError(format!(
                "cannot fit encoder on empty column '{}'",
                column
            )));
        }
        self.categories
            .insert(column.to_string(), vocab.into_iter().cloned().collect());
        Ok(())
    }

    /// Width of the block produced for `column`
    pub fn n_categories(&self, column: &str) -> Result<usize> {
        Ok(self.vocabulary(column)?.len())
    }

    /// Output names for `column`, `{column}_{category}`
    pub fn feature_names(&self, column: &str) -> Result<Vec<String>> {
        Ok(self
            .vocabulary(column)?
            .iter()
            .map(|cat| format!("{}_{}", column, cat))
            .collect())
    }

    /// Encode one column as a `(rows, categories)` indicator block.
    pub fn transform_column(&self, column: &str, values: &[String]) -> Result<Array2<f64>> {
        let vocab = self.vocabulary(column)?;
        let mut block = Array2::<f64>::zeros((values.len(), vocab.len()));

        for (row, value) in values.iter().enumerate() {
            if let Ok(idx) = vocab.binary_search(value) {
                block[[row, idx]] = 1.0;
            }
        }

        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_onehot_sorted_vocabulary() {
        let mut encoder = OneHotEncoder::default();
        encoder
            .fit_column("lunch", &strings(&["standard", "free/reduced", "standard"]))
            .unwrap();

        assert_eq!(encoder.categories()["lunch"], strings(&["free/reduced", "standard"]));
        assert_eq!(
            encoder.feature_names("lunch").unwrap(),
            strings(&["lunch_free/reduced", "lunch_standard"])
        );

        let block = encoder
            .transform_column("lunch", &strings(&["standard", "free/reduced"]))
            .unwrap();
        assert_eq!(block.row(0).to_vec(), vec![0.0, 1.0]);
        assert_eq!(block.row(1).to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_unknown_category_ignored() {
        let mut encoder = OneHotEncoder::new();
        encoder.fit_column("gender", &strings(&["female", "male"])).unwrap();

        let block = encoder
            .transform_column("gender", &strings(&["other", "male"]))
            .unwrap();
        assert_eq!(block.shape(), &[2, 2]);
        assert!(block.row(0).iter().all(|v| *v == 0.0));
        assert_eq!(block.row(1).to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_unfitted_encoder() {
        let encoder = OneHotEncoder::default();
        assert!(matches!(
            encoder.transform_column("gender", &strings(&["male"])),
            Err(ScorecastError::ModelNotFitted)
        ));
    }
}
