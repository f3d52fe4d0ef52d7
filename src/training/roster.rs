//! The fixed roster of candidate regressors

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::adaboost::{AdaBoostLoss, AdaBoostRegressor};
use super::catboost::{CatBoostConfig, CatBoostRegressor};
use super::decision_tree::{Criterion, DecisionTreeRegressor};
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::grid_search::{ParamGrid, ParamSet, ParamValue};
use super::knn::{KNNConfig, KNNRegressor, WeightScheme};
use super::linear_models::LinearRegression;
use super::models::Regressor;
use super::random_forest::RandomForestRegressor;
use super::xgboost::{XGBoostConfig, XGBoostRegressor};
use crate::error::Result;

/// Candidate model types, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    RandomForest,
    DecisionTree,
    GradientBoosting,
    LinearRegression,
    KNeighbors,
    XGBoost,
    CatBoost,
    AdaBoost,
}

const ROSTER: [ModelKind; 8] = [
    ModelKind::RandomForest,
    ModelKind::DecisionTree,
    ModelKind::GradientBoosting,
    ModelKind::LinearRegression,
    ModelKind::KNeighbors,
    ModelKind::XGBoost,
    ModelKind::CatBoost,
    ModelKind::AdaBoost,
];

impl ModelKind {
    /// Every candidate, in the order they are evaluated
    pub fn roster() -> &'static [ModelKind] {
        &ROSTER
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "Random Forest",
            ModelKind::DecisionTree => "Decision Tree",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::LinearRegression => "Linear Regression",
            ModelKind::KNeighbors => "K-Neighbors Regressor",
            ModelKind::XGBoost => "XGBRegressor",
            ModelKind::CatBoost => "CatBoosting Regressor",
            ModelKind::AdaBoost => "AdaBoost Regressor",
        }
    }

    /// Parameters each kind accepts
    pub fn known_params(&self) -> &'static [&'static str] {
        match self {
            ModelKind::RandomForest => &["n_estimators", "max_depth", "min_samples_split", "min_samples_leaf", "criterion"],
            ModelKind::DecisionTree => &["criterion", "max_depth", "min_samples_split", "min_samples_leaf"],
            ModelKind::GradientBoosting => &["n_estimators", "learning_rate", "subsample", "max_depth"],
            ModelKind::LinearRegression => &[],
            ModelKind::KNeighbors => &["n_neighbors", "weights"],
            ModelKind::XGBoost => &["n_estimators", "learning_rate", "max_depth", "reg_lambda"],
            ModelKind::CatBoost => &["depth", "learning_rate", "iterations"],
            ModelKind::AdaBoost => &["n_estimators", "learning_rate", "loss"],
        }
    }

    /// Search grid used when hyperparameter tuning is enabled
    pub fn default_grid(&self) -> ParamGrid {
        match self {
            ModelKind::RandomForest => ParamGrid::new().add("n_estimators", [8i64, 16, 32, 64, 128, 256]),
            ModelKind::DecisionTree => ParamGrid::new()
                .add("criterion", ["squared_error", "friedman_mse"])
                .add_values(
                    "max_depth",
                    vec![ParamValue::Null, ParamValue::Int(4), ParamValue::Int(8)],
                ),
            ModelKind::GradientBoosting => ParamGrid::new()
                .add("learning_rate", [0.1, 0.05, 0.01])
                .add("subsample", [0.7, 0.8, 0.9])
                .add("n_estimators", [32i64, 64, 128]),
            ModelKind::LinearRegression => ParamGrid::new(),
            ModelKind::KNeighbors => ParamGrid::new().add("n_neighbors", [5i64, 7, 9, 11]),
            ModelKind::XGBoost => ParamGrid::new()
                .add("learning_rate", [0.1, 0.05, 0.01])
                .add("n_estimators", [32i64, 64, 128]),
            ModelKind::CatBoost => ParamGrid::new()
                .add("depth", [6i64, 8])
                .add("learning_rate", [0.01, 0.05, 0.1])
                .add("iterations", [30i64, 50, 100]),
            ModelKind::AdaBoost => ParamGrid::new()
                .add("learning_rate", [0.1, 0.01, 0.5])
                .add("n_estimators", [32i64, 64, 128]),
        }
    }

    /// Unfitted model of this kind. Absent parameters take the model's defaults.
    pub fn build(&self, params: &ParamSet, seed: u64) -> Result<TrainedModel> {
        params.ensure_known(self.known_params())?;

        let model = match self {
            ModelKind::RandomForest => {
                let mut rf = RandomForestRegressor::new(params.usize_or("n_estimators", 100)?)
                    .with_max_depth(params.optional_usize_or("max_depth", None)?)
                    .with_random_state(seed);
                rf.min_samples_split = params.usize_or("min_samples_split", 2)?;
                rf.min_samples_leaf = params.usize_or("min_samples_leaf", 1)?;
                rf.criterion = Criterion::parse(params.text_or("criterion", "squared_error")?)?;
                TrainedModel::RandomForest(rf)
            }
            ModelKind::DecisionTree => TrainedModel::DecisionTree(
                DecisionTreeRegressor::new()
                    .with_criterion(Criterion::parse(params.text_or("criterion", "squared_error")?)?)
                    .with_max_depth(params.optional_usize_or("max_depth", None)?)
                    .with_min_samples_split(params.usize_or("min_samples_split", 2)?)
                    .with_min_samples_leaf(params.usize_or("min_samples_leaf", 1)?)
                    .with_random_state(seed),
            ),
            ModelKind::GradientBoosting => {
                let defaults = GradientBoostingConfig::default();
                TrainedModel::GradientBoosting(GradientBoostingRegressor::new(GradientBoostingConfig {
                    n_estimators: params.usize_or("n_estimators", defaults.n_estimators)?,
                    learning_rate: params.f64_or("learning_rate", defaults.learning_rate)?,
                    subsample: params.f64_or("subsample", defaults.subsample)?,
                    max_depth: params.usize_or("max_depth", defaults.max_depth)?,
                    random_state: seed,
                    ..defaults
                }))
            }
            ModelKind::LinearRegression => TrainedModel::LinearRegression(LinearRegression::new()),
            ModelKind::KNeighbors => TrainedModel::KNeighbors(KNNRegressor::new(KNNConfig {
                n_neighbors: params.usize_or("n_neighbors", 5)?,
                weights: WeightScheme::parse(params.text_or("weights", "uniform")?)?,
                ..Default::default()
            })),
            ModelKind::XGBoost => {
                let defaults = XGBoostConfig::default();
                TrainedModel::XGBoost(XGBoostRegressor::new(XGBoostConfig {
                    n_estimators: params.usize_or("n_estimators", defaults.n_estimators)?,
                    learning_rate: params.f64_or("learning_rate", defaults.learning_rate)?,
                    max_depth: params.usize_or("max_depth", defaults.max_depth)?,
                    reg_lambda: params.f64_or("reg_lambda", defaults.reg_lambda)?,
                    random_state: seed,
                    ..defaults
                }))
            }
            ModelKind::CatBoost => {
                let defaults = CatBoostConfig::default();
                TrainedModel::CatBoost(CatBoostRegressor::new(CatBoostConfig {
                    depth: params.usize_or("depth", defaults.depth)?,
                    learning_rate: params.f64_or("learning_rate", defaults.learning_rate)?,
                    iterations: params.usize_or("iterations", defaults.iterations)?,
                    ..defaults
                }))
            }
            ModelKind::AdaBoost => TrainedModel::AdaBoost(
                AdaBoostRegressor::new(
                    params.usize_or("n_estimators", 50)?,
                    params.f64_or("learning_rate", 1.0)?,
                )
                .with_loss(AdaBoostLoss::parse(params.text_or("loss", "linear")?)?)
                .with_random_state(seed),
            ),
        };
        Ok(model)
    }
}

/// A roster model, fitted or not. This is what the model artifact stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    RandomForest(RandomForestRegressor),
    DecisionTree(DecisionTreeRegressor),
    GradientBoosting(GradientBoostingRegressor),
    LinearRegression(LinearRegression),
    KNeighbors(KNNRegressor),
    XGBoost(XGBoostRegressor),
    CatBoost(CatBoostRegressor),
    AdaBoost(AdaBoostRegressor),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::DecisionTree(_) => ModelKind::DecisionTree,
            TrainedModel::GradientBoosting(_) => ModelKind::GradientBoosting,
            TrainedModel::LinearRegression(_) => ModelKind::LinearRegression,
            TrainedModel::KNeighbors(_) => ModelKind::KNeighbors,
            TrainedModel::XGBoost(_) => ModelKind::XGBoost,
            TrainedModel::CatBoost(_) => ModelKind::CatBoost,
            TrainedModel::AdaBoost(_) => ModelKind::AdaBoost,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().display_name()
    }

    fn as_regressor(&self) -> &dyn Regressor {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::DecisionTree(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::LinearRegression(m) => m,
            TrainedModel::KNeighbors(m) => m,
            TrainedModel::XGBoost(m) => m,
            TrainedModel::CatBoost(m) => m,
            TrainedModel::AdaBoost(m) => m,
        }
    }

    fn as_regressor_mut(&mut self) -> &mut dyn Regressor {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::DecisionTree(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::LinearRegression(m) => m,
            TrainedModel::KNeighbors(m) => m,
            TrainedModel::XGBoost(m) => m,
            TrainedModel::CatBoost(m) => m,
            TrainedModel::AdaBoost(m) => m,
        }
    }
}

impl Regressor for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.as_regressor_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_regressor().predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.as_regressor().is_fitted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScorecastError;

    #[test]
    fn test_roster_order_and_names() {
        let names: Vec<&str> = ModelKind::roster().iter().map(|k| k.display_name()).collect();
        assert_eq!(
            names,
            vec![
                "Random Forest",
                "Decision Tree",
                "Gradient Boosting",
                "Linear Regression",
                "K-Neighbors Regressor",
                "XGBRegressor",
                "CatBoosting Regressor",
                "AdaBoost Regressor",
            ]
        );
    }

    #[test]
    fn test_default_grids_are_buildable() {
        for kind in ModelKind::roster() {
            let grid = kind.default_grid();
            for params in grid.combinations() {
                let model = kind.build(&params, 42).unwrap();
                assert_eq!(model.kind(), *kind);
                assert!(!model.is_fitted());
            }
        }
        assert_eq!(ModelKind::GradientBoosting.default_grid().n_combinations(), 27);
        assert_eq!(ModelKind::LinearRegression.default_grid().n_combinations(), 1);
    }

    #[test]
    fn test_build_rejects_unknown_and_mistyped_params() {
        let unknown = ParamSet::new().with("gamma", 0.5);
        assert!(matches!(
            ModelKind::KNeighbors.build(&unknown, 0),
            Err(ScorecastError::InvalidParameter { .. })
        ));

        let mistyped = ParamSet::new().with("n_neighbors", "five");
        assert!(ModelKind::KNeighbors.build(&mistyped, 0).is_err());

        let bad_criterion = ParamSet::new().with("criterion", "gini");
        assert!(ModelKind::DecisionTree.build(&bad_criterion, 0).is_err());
    }

    #[test]
    fn test_dispatch_fits_and_predicts() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { i as f64 } else { ((i * 7) % 11) as f64 });
        let y = x.column(0).mapv(|v| 2.0 * v + 1.0);

        let mut model = ModelKind::LinearRegression.build(&ParamSet::new(), 0).unwrap();
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted());
        assert_eq!(model.name(), "Linear Regression");

        let pred = model.predict(&x).unwrap();
        assert!((pred[5] - y[5]).abs() < 1e-6);
    }
}
