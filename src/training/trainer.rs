//! Model selection and training stage

use std::path::PathBuf;
use std::time::Instant;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::grid_search::{GridSearchCV, ParamSet};
use super::models::{first_max_by, r2_score, Regressor};
use super::roster::{ModelKind, TrainedModel};
use crate::config::ModelTrainerConfig;
use crate::error::{Result, ScorecastError, Stage, StageContext, StageResult};
use crate::export::{save_object, ArtifactKind};
use crate::preprocessing::split_features_target;

/// One evaluated candidate
#[derive(Debug, Clone)]
pub struct CandidateReport {
    pub kind: ModelKind,
    pub name: &'static str,
    /// Parameters the model was fitted with; empty means defaults
    pub best_params: ParamSet,
    /// Mean cross-validated R² of `best_params`, when tuning ran
    pub cv_score: Option<f64>,
    /// R² on the held-out test matrix
    pub test_r2: f64,
    pub model: TrainedModel,
    pub fit_seconds: f64,
}

/// Per-candidate results in roster order
#[derive(Debug, Clone, Default)]
pub struct ModelReport {
    pub entries: Vec<CandidateReport>,
}

impl ModelReport {
    /// Highest held-out R²; ties keep the earliest candidate and a NaN
    /// score never displaces a real one.
    pub fn best(&self) -> Option<&CandidateReport> {
        first_max_by(&self.entries, |c| c.test_r2)
    }

    pub fn scores(&self) -> Vec<CandidateScoreSummary> {
        self.entries
            .iter()
            .map(|e| CandidateScoreSummary {
                name: e.name.to_string(),
                params: e.best_params.to_string(),
                cv_score: e.cv_score,
                test_r2: e.test_r2,
            })
            .collect()
    }
}

/// Serializable view of one report entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScoreSummary {
    pub name: String,
    pub params: String,
    pub cv_score: Option<f64>,
    pub test_r2: f64,
}

/// Output of the training stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTrainerArtifact {
    pub best_model_name: String,
    pub best_model_kind: ModelKind,
    pub r2_score: f64,
    pub model_path: PathBuf,
    pub scores: Vec<CandidateScoreSummary>,
}

pub struct ModelTrainer {
    config: ModelTrainerConfig,
}

impl ModelTrainer {
    pub fn new(config: ModelTrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelTrainerConfig {
        &self.config
    }

    fn fit_candidate(
        &self,
        kind: ModelKind,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
    ) -> Result<(TrainedModel, ParamSet, Option<f64>)> {
        let seed = self.config.random_state;
        if !self.config.tune_hyperparameters {
            let params = ParamSet::new();
            let mut model = kind.build(&params, seed)?;
            model.fit(x_train, y_train)?;
            return Ok((model, params, None));
        }

        let grid = kind.default_grid();
        debug!(
            "{}: searching {} parameter combinations",
            kind.display_name(),
            grid.n_combinations()
        );
        let search = GridSearchCV::new(self.config.cv_folds).fit(
            |params| kind.build(params, seed),
            &grid,
            x_train,
            y_train,
        )?;
        info!(
            "{}: best params {} (cv R² = {:.4})",
            kind.display_name(),
            search.best_params,
            search.best_score
        );
        Ok((search.best_estimator, search.best_params, Some(search.best_score)))
    }

    /// Fit every roster candidate on the train split and score it on the test split.
    pub fn evaluate_models(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<ModelReport> {
        if self.config.roster.is_empty() {
            return Err(ScorecastError::ConfigError("model roster is empty".to_string()));
        }

        let mut report = ModelReport::default();
        for &kind in &self.config.roster {
            let start = Instant::now();
            let (model, best_params, cv_score) = self.fit_candidate(kind, x_train, y_train)?;
            let test_r2 = r2_score(y_test, &model.predict(x_test)?)?;
            let fit_seconds = start.elapsed().as_secs_f64();

            info!(
                "{}: test R² = {:.4} ({:.2}s)",
                kind.display_name(),
                test_r2,
                fit_seconds
            );
            report.entries.push(CandidateReport {
                kind,
                name: kind.display_name(),
                best_params,
                cv_score,
                test_r2,
                model,
                fit_seconds,
            });
        }
        Ok(report)
    }

    /// Select the best candidate and persist it, or reject the run when even
    /// the best scores below the acceptance threshold.
    fn select_and_save(&self, report: &ModelReport) -> Result<ModelTrainerArtifact> {
        let best = report
            .best()
            .ok_or_else(|| ScorecastError::ComputationError("no candidate was evaluated".to_string()))?;

        let threshold = self.config.acceptance_threshold;
        if !(best.test_r2 >= threshold) {
            return Err(ScorecastError::NoAcceptableModel {
                best_model: best.name.to_string(),
                score: best.test_r2,
                threshold,
            });
        }
        info!("Best found model on both training and testing dataset: {}", best.name);

        save_object(&self.config.model_path, ArtifactKind::Model, best.name, &best.model)?;

        Ok(ModelTrainerArtifact {
            best_model_name: best.name.to_string(),
            best_model_kind: best.kind,
            r2_score: best.test_r2,
            model_path: self.config.model_path.clone(),
            scores: report.scores(),
        })
    }

    /// Train, select and save. Both matrices carry the target as their last column.
    pub fn initiate_model_trainer(
        &self,
        train_arr: &Array2<f64>,
        test_arr: &Array2<f64>,
    ) -> StageResult<ModelTrainerArtifact> {
        info!("Split training and test input data");
        let (x_train, y_train) = split_features_target(train_arr).stage(Stage::ModelTraining)?;
        let (x_test, y_test) = split_features_target(test_arr).stage(Stage::ModelTraining)?;

        let report = self
            .evaluate_models(&x_train, &y_train, &x_test, &y_test)
            .stage(Stage::ModelTraining)?;
        let artifact = self.select_and_save(&report).stage(Stage::ModelTraining)?;

        info!(
            "Model training completed: {} with R² = {:.4}",
            artifact.best_model_name, artifact.r2_score
        );
        Ok(artifact)
    }
}
