//! AdaBoost.R2 regression
//!
//! Each round draws a weighted bootstrap sample, fits a shallow regression
//! tree to it and reweights rows by their normalised error. Prediction is the
//! weighted median of the estimators' outputs.

use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTreeRegressor;
use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{Result, ScorecastError};

/// How absolute errors are mapped onto `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AdaBoostLoss {
    #[default]
    Linear,
    Square,
    Exponential,
}

impl AdaBoostLoss {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "linear" => Ok(AdaBoostLoss::Linear),
            "square" => Ok(AdaBoostLoss::Square),
            "exponential" => Ok(AdaBoostLoss::Exponential),
            other => Err(ScorecastError::InvalidParameter {
                name: "loss".to_string(),
                value: other.to_string(),
                reason: "expected linear, square or exponential".to_string(),
            }),
        }
    }

    fn apply(&self, normalised: f64) -> f64 {
        match self {
            AdaBoostLoss::Linear => normalised,
            AdaBoostLoss::Square => normalised * normalised,
            AdaBoostLoss::Exponential => 1.0 - (-normalised).exp(),
        }
    }
}

/// Outcome of one boosting round
enum Round {
    Continue(DecisionTreeRegressor, f64),
    /// Keep this estimator and stop boosting
    Perfect(DecisionTreeRegressor),
    /// Stop without keeping this estimator
    Stop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub loss: AdaBoostLoss,
    /// Depth of every base tree
    pub max_depth: usize,
    pub random_state: u64,
    estimators: Vec<DecisionTreeRegressor>,
    estimator_weights: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            loss: AdaBoostLoss::Linear,
            max_depth: 3,
            random_state: 42,
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_loss(mut self, loss: AdaBoostLoss) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_estimators_fitted(&self) -> usize {
        self.estimators.len()
    }

    pub fn estimator_weights(&self) -> &[f64] {
        &self.estimator_weights
    }

    /// Rows drawn with probability proportional to `weights`.
    fn weighted_bootstrap(weights: &[f64], rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut total = 0.0;
        for w in weights {
            total += w;
            cumulative.push(total);
        }
        let last = weights.len() - 1;
        (0..weights.len())
            .map(|_| {
                let u = rng.gen::<f64>() * total;
                cumulative.partition_point(|&c| c <= u).min(last)
            })
            .collect()
    }

    fn boost(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: &mut [f64],
        round: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Result<Round> {
        let indices = Self::weighted_bootstrap(weights, rng);
        let mut tree = DecisionTreeRegressor::new()
            .with_max_depth(Some(self.max_depth))
            .with_random_state(self.random_state.wrapping_add(round as u64));
        tree.fit_on_indices(x, y, indices)?;

        let predictions = tree.predict(x)?;
        let errors: Vec<f64> = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, t)| (p - t).abs())
            .collect();
        let max_error = errors.iter().copied().fold(0.0, f64::max);
        if max_error <= 0.0 {
            return Ok(Round::Perfect(tree));
        }

        let losses: Vec<f64> = errors.iter().map(|e| self.loss.apply(e / max_error)).collect();
        let average_loss: f64 = losses.iter().zip(weights.iter()).map(|(l, w)| l * w).sum();
        if average_loss >= 0.5 {
            return Ok(if round == 0 { Round::Perfect(tree) } else { Round::Stop });
        }

        let beta = average_loss / (1.0 - average_loss);
        let estimator_weight = self.learning_rate * (1.0 / beta).ln();

        for (w, l) in weights.iter_mut().zip(losses.iter()) {
            *w *= beta.powf((1.0 - l) * self.learning_rate);
        }
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            weights.iter_mut().for_each(|w| *w /= total);
        }

        Ok(Round::Continue(tree, estimator_weight))
    }

    fn weighted_median(values: &[f64], weights: &[f64]) -> f64 {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));

        let half = weights.iter().sum::<f64>() / 2.0;
        let mut cumulative = 0.0;
        for &i in &order {
            cumulative += weights[i];
            if cumulative >= half {
                return values[i];
            }
        }
        values[order[order.len() - 1]]
    }
}

impl Regressor for AdaBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 || !(self.learning_rate > 0.0) {
            return Err(ScorecastError::InvalidParameter {
                name: "n_estimators/learning_rate".to_string(),
                value: format!("{}/{}", self.n_estimators, self.learning_rate),
                reason: "both must be positive".to_string(),
            });
        }

        let n = x.nrows();
        let mut weights = vec![1.0 / n as f64; n];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);
        let mut estimators = Vec::with_capacity(self.n_estimators);
        let mut estimator_weights = Vec::with_capacity(self.n_estimators);

        for round in 0..self.n_estimators {
            match self.boost(x, y, &mut weights, round, &mut rng)? {
                Round::Continue(tree, weight) => {
                    estimators.push(tree);
                    estimator_weights.push(weight);
                }
                Round::Perfect(tree) => {
                    estimators.push(tree);
                    estimator_weights.push(1.0);
                    break;
                }
                Round::Stop => break,
            }
        }

        tracing::debug!(
            "AdaBoost kept {} of {} estimators",
            estimators.len(),
            self.n_estimators
        );
        self.estimators = estimators;
        self.estimator_weights = estimator_weights;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(ScorecastError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;

        let per_estimator: Vec<Array1<f64>> = self
            .estimators
            .iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        Ok(Array1::from_iter((0..x.nrows()).map(|row| {
            let values: Vec<f64> = per_estimator.iter().map(|p| p[row]).collect();
            Self::weighted_median(&values, &self.estimator_weights)
        })))
    }

    fn is_fitted(&self) -> bool {
        !self.estimators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::r2_score;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((120, 2), |(i, j)| ((i * (5 + j * 2)) % 37) as f64);
        let y = x.column(0).mapv(|v| (v / 3.0).sin() * 10.0) + x.column(1).mapv(|v| v * 0.5);
        (x, y)
    }

    #[test]
    fn test_adaboost_fits() {
        let (x, y) = data();
        let mut model = AdaBoostRegressor::new(30, 0.5);
        model.fit(&x, &y).unwrap();
        assert!(model.n_estimators_fitted() >= 1);

        let r2 = r2_score(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(r2 > 0.5, "r2 = {}", r2);
    }

    #[test]
    fn test_adaboost_is_seeded() {
        let (x, y) = data();
        let mut a = AdaBoostRegressor::new(10, 1.0).with_loss(AdaBoostLoss::Square);
        let mut b = AdaBoostRegressor::new(10, 1.0).with_loss(AdaBoostLoss::Square);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
        assert_eq!(a.estimator_weights(), b.estimator_weights());
    }

    #[test]
    fn test_weighted_median() {
        assert_eq!(AdaBoostRegressor::weighted_median(&[3.0, 1.0, 2.0], &[1.0, 1.0, 1.0]), 2.0);
        assert_eq!(AdaBoostRegressor::weighted_median(&[3.0, 1.0, 2.0], &[5.0, 1.0, 1.0]), 3.0);
    }

    #[test]
    fn test_loss_parse() {
        assert_eq!(AdaBoostLoss::parse("square").unwrap(), AdaBoostLoss::Square);
        assert!(AdaBoostLoss::parse("huber").is_err());
        assert!((AdaBoostLoss::Exponential.apply(0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_learning_rate() {
        let (x, y) = data();
        let mut model = AdaBoostRegressor::new(10, 0.0);
        assert!(matches!(
            model.fit(&x, &y),
            Err(ScorecastError::InvalidParameter { .. })
        ));
    }
}
