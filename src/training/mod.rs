//! Model training module
//!
//! Provides the candidate regressors and the machinery to choose between them:
//! - Decision trees and random forests
//! - Gradient boosting, XGBoost-style and CatBoost-style boosting, AdaBoost.R2
//! - Ordinary least squares
//! - K-nearest neighbors
//! - K-fold cross-validation and exhaustive grid search
//! - The model trainer stage that selects, validates and saves the winner

mod models;
mod roster;
mod trainer;
pub mod adaboost;
pub mod catboost;
pub mod cross_validation;
pub mod decision_tree;
pub mod grid_search;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod random_forest;
pub mod xgboost;

pub use adaboost::{AdaBoostLoss, AdaBoostRegressor};
pub use catboost::{CatBoostConfig, CatBoostRegressor};
pub use cross_validation::{CVSplit, KFold};
pub use decision_tree::{Criterion, DecisionTreeRegressor, MaxFeatures, TreeNode};
pub use grid_search::{CandidateScore, GridSearchCV, GridSearchResult, ParamGrid, ParamSet, ParamValue};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
pub use linear_models::LinearRegression;
pub use models::{r2_score, ModelMetrics, Regressor};
pub use random_forest::RandomForestRegressor;
pub use roster::{ModelKind, TrainedModel};
pub use trainer::{CandidateReport, CandidateScoreSummary, ModelReport, ModelTrainer, ModelTrainerArtifact};
pub use xgboost::{XGBoostConfig, XGBoostRegressor};
