//! Missing value imputation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScorecastError};

/// Strategy for imputing missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with mean (numeric only)
    Mean,
    /// Replace with median (numeric only)
    Median,
    /// Replace with the most frequent value; ties go to the smallest value
    MostFrequent,
}

/// Value learned for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeValue {
    Numeric(f64),
    Text(String),
}

/// Per-column imputer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: BTreeMap<String, ImputeValue>,
}

fn observed_sorted(values: &[Option<f64>]) -> Vec<f64> {
    let mut observed: Vec<f64> = values
        .iter()
        .filter_map(|v| *v)
        .filter(|v| !v.is_nan())
        .collect();
    observed.sort_by(|a, b| a.total_cmp(b));
    observed
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Most frequent element of a sorted slice; the first run wins ties.
fn mode_of_sorted<T: PartialEq + Clone>(sorted: &[T]) -> Option<T> {
    let mut best: Option<(&T, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i + 1;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        let run = j - i;
        if best.map_or(true, |(_, count)| run > count) {
            best = Some((&sorted[i], run));
        }
        i = j;
    }
    best.map(|(v, _)| v.clone())
}

impl Imputer {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: BTreeMap::new(),
        }
    }

    pub fn strategy(&self) -> ImputeStrategy {
        self.strategy
    }

    pub fn is_fitted(&self) -> bool {
        !self.fill_values.is_empty()
    }

    /// Learned fill values keyed by column name
    pub fn fill_values(&self) -> &BTreeMap<String, ImputeValue> {
        &self.fill_values
    }

    /// Learn the fill value of a numeric column. NaN counts as missing.
    pub fn fit_numeric(&mut self, column: &str, values: &[Option<f64>]) -> Result<()> {
        let sorted = observed_sorted(values);
        if sorted.is_empty() {
            return Err(ScorecastError::ValidationError(format!(
                "column '{}' has no observed values to impute from",
                column
            )));
        }

        let fill = match self.strategy {
            // Summed in sorted order so the result does not depend on row order
            ImputeStrategy::Mean => sorted.iter().sum::<f64>() / sorted.len() as f64,
            ImputeStrategy::Median => median_of_sorted(&sorted),
            ImputeStrategy::MostFrequent => mode_of_sorted(&sorted).unwrap_or(sorted[0]),
        };

        self.fill_values
            .insert(column.to_string(), ImputeValue::Numeric(fill));
        Ok(())
    }

    /// Learn the fill value of a categorical column.
    pub fn fit_text(&mut self, column: &str, values: &[Option<String>]) -> Result<()> {
        if self.strategy != ImputeStrategy::MostFrequent {
            return Err(ScorecastError::InvalidParameter {
                name: "strategy".to_string(),
                value: format!("{:?}", self.strategy),
                reason: "only MostFrequent applies to categorical columns".to_string(),
            });
        }

        let mut observed: Vec<&String> = values.iter().flatten().collect();
        observed.sort();
        let mode = mode_of_sorted(&observed).ok_or_else(|| {
            ScorecastError::ValidationError(format!(
                "column '{}' has no observed values to impute from",
                column
            ))
        })?;

        self.fill_values
            .insert(column.to_string(), ImputeValue::Text(mode.clone()));
        Ok(())
    }

    fn fill_value(&self, column: &str) -> Result<&ImputeValue> {
        if !self.is_fitted() {
            return Err(ScorecastError::ModelNotFitted);
        }
        self.fill_values
            .get(column)
            .ok_or_else(|| ScorecastError::FeatureNotFound(column.to_string()))
    }

    /// Replace missing entries of a numeric column.
    pub fn fill_numeric(&self, column: &str, values: &[Option<f64>]) -> Result<Vec<f64>> {
        let fill = match self.fill_value(column)? {
            ImputeValue::Numeric(v) => *v,
            ImputeValue::Text(_) => {
                return Err(ScorecastError::DataError(format!(
                    "column '{}' was fitted as categorical",
                    column
                )))
            }
        };
        Ok(values
            .iter()
            .map(|v| match v {
                Some(x) if !x.is_nan() => *x,
                _ => fill,
            })
            .collect())
    }

    /// Replace missing entries of a categorical column.
    pub fn fill_text(&self, column: &str, values: &[Option<String>]) -> Result<Vec<String>> {
        let fill = match self.fill_value(column)? {
            ImputeValue::Text(s) => s,
            ImputeValue::Numeric(_) => {
                return Err(ScorecastError::DataError(format!(
                    "column '{}' was fitted as numeric",
                    column
                )))
            }
        };
        Ok(values
            .iter()
            .map(|v| v.clone().unwrap_or_else(|| fill.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_imputation() {
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        let values = vec![Some(4.0), None, Some(1.0), Some(3.0), Some(f64::NAN), Some(2.0)];
        imputer.fit_numeric("reading score", &values).unwrap();

        let filled = imputer.fill_numeric("reading score", &values).unwrap();
        assert_eq!(filled, vec![4.0, 2.5, 1.0, 3.0, 2.5, 2.0]);
    }

    #[test]
    fn test_mean_imputation() {
        let mut imputer = Imputer::new(ImputeStrategy::Mean);
        imputer.fit_numeric("x", &[Some(1.0), Some(2.0), None, Some(6.0)]).unwrap();
        assert_eq!(imputer.fill_values()["x"], ImputeValue::Numeric(3.0));
    }

    #[test]
    fn test_mode_ties_break_to_smallest() {
        let mut imputer = Imputer::new(ImputeStrategy::MostFrequent);
        let values: Vec<Option<String>> = ["b", "a", "b", "a", "c"]
            .iter()
            .map(|s| Some(s.to_string()))
            .chain(std::iter::once(None))
            .collect();
        imputer.fit_text("lunch", &values).unwrap();

        let filled = imputer.fill_text("lunch", &values).unwrap();
        assert_eq!(filled[5], "a");
    }

    #[test]
    fn test_all_missing_column_fails() {
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        assert!(imputer.fit_numeric("x", &[None, None]).is_err());

        let mut imputer = Imputer::new(ImputeStrategy::MostFrequent);
        assert!(imputer.fit_text("g", &[None]).is_err());
    }

    #[test]
    fn test_unfitted_and_unknown_column() {
        let imputer = Imputer::new(ImputeStrategy::Median);
        assert!(matches!(
            imputer.fill_numeric("x", &[None]),
            Err(ScorecastError::ModelNotFitted)
        ));

        let mut imputer = Imputer::new(ImputeStrategy::Median);
        imputer.fit_numeric("x", &[Some(1.0)]).unwrap();
        assert!(matches!(
            imputer.fill_numeric("y", &[None]),
            Err(ScorecastError::FeatureNotFound(_))
        ));
    }

    #[test]
    fn test_text_requires_most_frequent() {
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        assert!(imputer.fit_text("g", &[Some("a".to_string())]).is_err());
    }
}
