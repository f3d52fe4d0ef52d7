//! Exhaustive hyperparameter search with k-fold cross-validation

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::cross_validation::KFold;
use super::models::{first_max_by, r2_score, Regressor};
use crate::error::{Result, ScorecastError};

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
    /// Explicit "no value", e.g. an unbounded `max_depth`
    Null,
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
            ParamValue::Null => write!(f, "None"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// One point of a grid: parameter name to value, in name order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Fail on any parameter outside `known`.
    pub fn ensure_known(&self, known: &[&str]) -> Result<()> {
        match self.0.keys().find(|k| !known.contains(&k.as_str())) {
            Some(unknown) => Err(ScorecastError::InvalidParameter {
                name: unknown.clone(),
                value: self.0[unknown].to_string(),
                reason: format!("not a parameter of this model (expected one of {:?})", known),
            }),
            None => Ok(()),
        }
    }

    fn wrong_type(name: &str, value: &ParamValue, expected: &str) -> ScorecastError {
        ScorecastError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: format!("expected {}", expected),
        }
    }

    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(v)) if *v >= 0 => Ok(*v as usize),
            Some(other) => Err(Self::wrong_type(name, other, "a non-negative integer")),
        }
    }

    /// `Null` maps to `None`; an absent key keeps `default`.
    pub fn optional_usize_or(&self, name: &str, default: Option<usize>) -> Result<Option<usize>> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Null) => Ok(None),
            Some(ParamValue::Int(v)) if *v >= 0 => Ok(Some(*v as usize)),
            Some(other) => Err(Self::wrong_type(name, other, "a non-negative integer or None")),
        }
    }

    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(Self::wrong_type(name, other, "a number")),
        }
    }

    pub fn text_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Text(v)) => Ok(v.as_str()),
            Some(other) => Err(Self::wrong_type(name, other, "a string")),
        }
    }
}

/// Ordered parameter grid. Combinations enumerate with the last parameter
/// varying fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    params: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<V: Into<ParamValue>>(mut self, name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        self.params
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn add_values(mut self, name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.params.push((name.into(), values));
        self
    }

    /// Number of combinations; an empty grid has exactly one (no parameters).
    pub fn n_combinations(&self) -> usize {
        self.params.iter().map(|(_, v)| v.len()).product()
    }

    pub fn combinations(&self) -> Vec<ParamSet> {
        let mut combos = vec![ParamSet::new()];
        for (name, values) in &self.params {
            combos = combos
                .into_iter()
                .flat_map(|set| {
                    values.iter().map(move |value| {
                        let mut next = set.clone();
                        next.insert(name.clone(), value.clone());
                        next
                    })
                })
                .collect();
        }
        combos
    }
}

/// Cross-validated score of one parameter combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ParamSet,
    pub mean_score: f64,
    pub fold_scores: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct GridSearchResult<M> {
    pub best_params: ParamSet,
    pub best_score: f64,
    /// Refit on the full training set with `best_params`
    pub best_estimator: M,
    /// Every combination, in grid order
    pub cv_results: Vec<CandidateScore>,
}

/// Exhaustive search scored by mean R² over the folds
#[derive(Debug, Clone)]
pub struct GridSearchCV {
    cv: KFold,
}

impl GridSearchCV {
    pub fn new(cv_folds: usize) -> Self {
        Self {
            cv: KFold::new(cv_folds),
        }
    }

    pub fn with_cv(cv: KFold) -> Self {
        Self { cv }
    }

    /// Evaluate every combination of `grid` with models from `build`.
    ///
    /// Combinations are scored in parallel and collected in grid order, so the
    /// first maximum wins regardless of scheduling.
    pub fn fit<M, F>(&self, build: F, grid: &ParamGrid, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult<M>>
    where
        M: Regressor,
        F: Fn(&ParamSet) -> Result<M> + Sync,
    {
        if x.nrows() != y.len() {
            return Err(ScorecastError::ShapeError {
                expected: format!("{} targets", x.nrows()),
                actual: y.len().to_string(),
            });
        }
        let splits = self.cv.split(x.nrows())?;
        let folds: Vec<(Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>)> = splits
            .iter()
            .map(|s| {
                (
                    x.select(Axis(0), &s.train_indices),
                    y.select(Axis(0), &s.train_indices),
                    x.select(Axis(0), &s.test_indices),
                    y.select(Axis(0), &s.test_indices),
                )
            })
            .collect();

        let combos = grid.combinations();
        tracing::debug!(
            "Grid search over {} combinations x {} folds",
            combos.len(),
            folds.len()
        );

        let cv_results: Vec<CandidateScore> = combos
            .into_par_iter()
            .map(|params| {
                let fold_scores = folds
                    .iter()
                    .map(|(x_tr, y_tr, x_val, y_val)| {
                        let mut model = build(&params)?;
                        model.fit(x_tr, y_tr)?;
                        r2_score(y_val, &model.predict(x_val)?)
                    })
                    .collect::<Result<Vec<f64>>>()?;
                let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
                Ok(CandidateScore {
                    params,
                    mean_score,
                    fold_scores,
                })
            })
            .collect::<Result<_>>()?;

        let best = first_max_by(&cv_results, |c| c.mean_score)
            .ok_or_else(|| ScorecastError::ValidationError("parameter grid is empty".to_string()))?;

        let best_params = best.params.clone();
        let best_score = best.mean_score;
        let mut best_estimator = build(&best_params)?;
        best_estimator.fit(x, y)?;

        Ok(GridSearchResult {
            best_params,
            best_score,
            best_estimator,
            cv_results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::knn::{KNNConfig, KNNRegressor};

    #[test]
    fn test_combinations_last_key_fastest() {
        let grid = ParamGrid::new()
            .add("a", [1i64, 2])
            .add("b", ["x", "y", "z"]);
        assert_eq!(grid.n_combinations(), 6);

        let combos = grid.combinations();
        assert_eq!(combos.len(), 6);
        assert_eq!(combos[0], ParamSet::new().with("a", 1i64).with("b", "x"));
        assert_eq!(combos[1], ParamSet::new().with("a", 1i64).with("b", "y"));
        assert_eq!(combos[3], ParamSet::new().with("a", 2i64).with("b", "x"));
    }

    #[test]
    fn test_empty_grid_has_one_combination() {
        let grid = ParamGrid::new();
        assert_eq!(grid.n_combinations(), 1);
        assert_eq!(grid.combinations(), vec![ParamSet::new()]);
    }

    #[test]
    fn test_typed_getters() {
        let params = ParamSet::new()
            .with("n", 5i64)
            .with("lr", 0.1)
            .with("crit", "friedman_mse")
            .with("depth", ParamValue::Null);

        assert_eq!(params.usize_or("n", 1).unwrap(), 5);
        assert_eq!(params.usize_or("missing", 7).unwrap(), 7);
        assert_eq!(params.f64_or("lr", 1.0).unwrap(), 0.1);
        assert_eq!(params.f64_or("n", 1.0).unwrap(), 5.0);
        assert_eq!(params.text_or("crit", "squared_error").unwrap(), "friedman_mse");
        assert_eq!(params.optional_usize_or("depth", Some(3)).unwrap(), None);

        assert!(params.usize_or("lr", 1).is_err());
        assert!(params.text_or("n", "").is_err());
        assert!(params.ensure_known(&["n", "lr", "crit"]).is_err());
        assert!(params.ensure_known(&["n", "lr", "crit", "depth"]).is_ok());
        assert_eq!(params.to_string(), "{crit: friedman_mse, depth: None, lr: 0.1, n: 5}");
    }

    #[test]
    fn test_grid_search_picks_best_neighbors() {
        // Contiguous folds extrapolate; on a monotone target the single
        // nearest neighbour stays closest.
        let x = Array2::from_shape_fn((60, 1), |(i, _)| i as f64);
        let y = x.column(0).to_owned();
        let grid = ParamGrid::new().add("n_neighbors", [15i64, 1, 9]);

        let result = GridSearchCV::new(3)
            .fit(
                |p| {
                    Ok(KNNRegressor::new(KNNConfig {
                        n_neighbors: p.usize_or("n_neighbors", 5)?,
                        ..Default::default()
                    }))
                },
                &grid,
                &x,
                &y,
            )
            .unwrap();

        assert_eq!(result.cv_results.len(), 3);
        assert_eq!(result.best_params, ParamSet::new().with("n_neighbors", 1i64));
        assert!(result.best_estimator.is_fitted());
        let best_mean = result
            .cv_results
            .iter()
            .map(|c| c.mean_score)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(result.best_score, best_mean);
    }

    /// Predicts the training mean, or NaN when `broken`
    struct MeanModel {
        broken: bool,
        mean: Option<f64>,
    }

    impl Regressor for MeanModel {
        fn fit(&mut self, _x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
            self.mean = y.mean();
            Ok(())
        }

        fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            let mean = self.mean.ok_or(ScorecastError::ModelNotFitted)?;
            let value = if self.broken { f64::NAN } else { mean };
            Ok(Array1::from_elem(x.nrows(), value))
        }

        fn is_fitted(&self) -> bool {
            self.mean.is_some()
        }
    }

    #[test]
    fn test_grid_search_nan_score_does_not_win() {
        let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(12, |i| (i % 4) as f64);
        let grid = ParamGrid::new().add("broken", [0i64, 1]);

        let result = GridSearchCV::new(3)
            .fit(
                |p| {
                    Ok(MeanModel {
                        broken: p.usize_or("broken", 0)? == 1,
                        mean: None,
                    })
                },
                &grid,
                &x,
                &y,
            )
            .unwrap();

        assert!(result.cv_results[1].mean_score.is_nan());
        assert_eq!(result.best_params, ParamSet::new().with("broken", 0i64));
        assert!(result.best_score.is_finite());
    }

    #[test]
    fn test_grid_search_ties_keep_first() {
        let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let y = Array1::from_elem(12, 3.0);
        let grid = ParamGrid::new().add("n_neighbors", [2i64, 3]);

        let result = GridSearchCV::new(3)
            .fit(
                |p| {
                    Ok(KNNRegressor::new(KNNConfig {
                        n_neighbors: p.usize_or("n_neighbors", 5)?,
                        ..Default::default()
                    }))
                },
                &grid,
                &x,
                &y,
            )
            .unwrap();
        assert_eq!(result.best_params, ParamSet::new().with("n_neighbors", 2i64));
    }
}
