//! Integration tests for model selection: threshold policy, tuning, persistence

use ndarray::{concatenate, Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use scorecast::config::ModelTrainerConfig;
use scorecast::error::{ScorecastError, Stage};
use scorecast::export::{load_object, ArtifactKind};
use scorecast::training::{
    r2_score, GridSearchCV, KFold, ModelKind, ModelTrainer, ParamSet, Regressor, TrainedModel,
};
use tempfile::TempDir;

fn features(n: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
    Array2::from_shape_fn((n, 4), |_| rng.gen_range(-1.0..1.0))
}

fn with_target(x: &Array2<f64>, y: &Array1<f64>) -> Array2<f64> {
    concatenate(Axis(1), &[x.view(), y.view().insert_axis(Axis(1))]).unwrap()
}

/// Target unrelated to the features
fn noise_split() -> (Array2<f64>, Array2<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let x_train = features(120, &mut rng);
    let y_train = Array1::from_shape_fn(120, |_| rng.gen_range(0.0..100.0));
    let x_test = features(40, &mut rng);
    let y_test = Array1::from_shape_fn(40, |_| rng.gen_range(0.0..100.0));
    (with_target(&x_train, &y_train), with_target(&x_test, &y_test))
}

/// Target linear in the features plus a little noise
fn signal_split() -> (Array2<f64>, Array2<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut make = |n: usize| {
        let x = features(n, &mut rng);
        let y = Array1::from_iter(x.rows().into_iter().map(|r| {
            50.0 + 20.0 * r[0] - 10.0 * r[1] + 5.0 * r[2] + rng.gen_range(-1.0..1.0)
        }));
        with_target(&x, &y)
    };
    let train = make(150);
    let test = make(50);
    (train, test)
}

#[test]
fn test_all_candidates_below_threshold_rejects_run() {
    let dir = TempDir::new().unwrap();
    let model_path = dir.path().join("model.bin");
    let (train, test) = noise_split();

    let trainer = ModelTrainer::new(
        ModelTrainerConfig::new()
            .with_model_path(&model_path)
            .with_tuning(false)
            .with_roster(vec![ModelKind::LinearRegression, ModelKind::DecisionTree]),
    );
    let err = trainer.initiate_model_trainer(&train, &test).unwrap_err();

    assert!(err.is_rejection());
    assert_eq!(err.stage, Stage::ModelTraining);
    match err.cause() {
        ScorecastError::NoAcceptableModel { score, threshold, .. } => {
            assert!(*score < 0.6);
            assert_eq!(*threshold, 0.6);
        }
        other => panic!("unexpected cause: {:?}", other),
    }
    assert!(err.to_string().contains("No best model found"));
    assert!(!model_path.exists());
}

#[test]
fn test_winner_is_saved_and_reloads() {
    let dir = TempDir::new().unwrap();
    let model_path = dir.path().join("model.bin");
    let (train, test) = signal_split();

    let trainer = ModelTrainer::new(
        ModelTrainerConfig::new()
            .with_model_path(&model_path)
            .with_tuning(false)
            .with_roster(vec![
                ModelKind::DecisionTree,
                ModelKind::LinearRegression,
                ModelKind::KNeighbors,
            ]),
    );
    let artifact = trainer.initiate_model_trainer(&train, &test).unwrap();

    assert_eq!(artifact.best_model_name, "Linear Regression");
    assert_eq!(artifact.scores.len(), 3);
    assert!(artifact.r2_score > 0.95);

    let model: TrainedModel = load_object(&model_path, ArtifactKind::Model).unwrap();
    assert_eq!(model.kind(), ModelKind::LinearRegression);

    let x_test = test.slice(ndarray::s![.., ..4]).to_owned();
    let y_test = test.column(4).to_owned();
    let r2 = r2_score(&y_test, &model.predict(&x_test).unwrap()).unwrap();
    assert!((r2 - artifact.r2_score).abs() < 1e-12);
}

#[test]
fn test_tuned_candidates_report_cv_scores() {
    let dir = TempDir::new().unwrap();
    let (train, test) = signal_split();

    let trainer = ModelTrainer::new(
        ModelTrainerConfig::new()
            .with_model_path(dir.path().join("model.bin"))
            .with_roster(vec![ModelKind::KNeighbors, ModelKind::LinearRegression]),
    );
    let artifact = trainer.initiate_model_trainer(&train, &test).unwrap();

    assert_eq!(artifact.scores[0].name, "K-Neighbors Regressor");
    assert!(artifact.scores[0].params.starts_with("{n_neighbors: "));
    assert!(artifact.scores.iter().all(|s| s.cv_score.is_some()));
    assert_eq!(artifact.scores[1].params, "{}");
}

#[test]
fn test_grid_search_refits_best_on_full_data() {
    let (train, _) = signal_split();
    let x = train.slice(ndarray::s![.., ..4]).to_owned();
    let y = train.column(4).to_owned();

    let kind = ModelKind::DecisionTree;
    let result = GridSearchCV::with_cv(KFold::new(3).with_shuffle(0))
        .fit(|p| kind.build(p, 42), &kind.default_grid(), &x, &y)
        .unwrap();

    assert_eq!(result.cv_results.len(), kind.default_grid().n_combinations());
    assert!(result.best_estimator.is_fitted());

    let mut refit = kind.build(&result.best_params, 42).unwrap();
    refit.fit(&x, &y).unwrap();
    assert_eq!(
        refit.predict(&x).unwrap(),
        result.best_estimator.predict(&x).unwrap()
    );
    assert_ne!(result.best_params, ParamSet::new());
}
