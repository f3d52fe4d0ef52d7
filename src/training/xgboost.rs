//! XGBoost-style boosting with a second-order loss approximation
//!
//! - Leaf weight: `w* = -G / (H + lambda)`, soft-thresholded by `alpha`
//! - Split gain: `0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - G²/(H+λ)] - γ`
//! - Squared loss, so every hessian is 1 and `min_child_weight` bounds the
//!   number of rows per child

use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{Result, ScorecastError};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: u64,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict_row(&self, x: &Array2<f64>, row: usize) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if x[[row, *feature]] <= *threshold {
                    left.predict_row(x, row)
                } else {
                    right.predict_row(x, row)
                }
            }
        }
    }
}

fn leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g = if g_sum > alpha {
        g_sum - alpha
    } else if g_sum < -alpha {
        g_sum + alpha
    } else {
        return 0.0;
    };
    -g / (h_sum + lambda)
}

fn structure_score(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

#[derive(Debug, Clone, Copy)]
struct XGBSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    grad: &'a Array1<f64>,
    hess: &'a Array1<f64>,
    features: &'a [usize],
    config: &'a XGBoostConfig,
}

impl TreeBuilder<'_> {
    fn build(&self, indices: Vec<usize>, depth: usize) -> XGBNode {
        let cfg = self.config;
        let g_sum: f64 = indices.iter().map(|&i| self.grad[i]).sum();
        let h_sum: f64 = indices.iter().map(|&i| self.hess[i]).sum();
        let weight = leaf_weight(g_sum, h_sum, cfg.reg_lambda, cfg.reg_alpha);

        if depth >= cfg.max_depth || indices.len() < 2 || h_sum < 2.0 * cfg.min_child_weight {
            return XGBNode::Leaf { weight };
        }

        let candidates: Vec<Option<XGBSplit>> = self
            .features
            .par_iter()
            .map(|&f| self.best_split_for_feature(&indices, f, g_sum, h_sum))
            .collect();
        let best = candidates
            .into_iter()
            .flatten()
            .fold(None, |best: Option<XGBSplit>, cand| match best {
                Some(b) if b.gain >= cand.gain => Some(b),
                _ => Some(cand),
            });

        match best {
            Some(split) if split.gain > cfg.gamma => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .into_iter()
                    .partition(|&i| self.x[[i, split.feature]] <= split.threshold);
                XGBNode::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left: Box::new(self.build(left_idx, depth + 1)),
                    right: Box::new(self.build(right_idx, depth + 1)),
                }
            }
            _ => XGBNode::Leaf { weight },
        }
    }

    fn best_split_for_feature(
        &self,
        indices: &[usize],
        feature: usize,
        g_total: f64,
        h_total: f64,
    ) -> Option<XGBSplit> {
        let lambda = self.config.reg_lambda;
        let min_child = self.config.min_child_weight;

        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

        let parent = structure_score(g_total, h_total, lambda);
        let mut g_left = 0.0;
        let mut h_left = 0.0;
        let mut best: Option<XGBSplit> = None;

        for pos in 0..sorted.len() - 1 {
            let idx = sorted[pos];
            g_left += self.grad[idx];
            h_left += self.hess[idx];

            let value = self.x[[idx, feature]];
            let next = self.x[[sorted[pos + 1], feature]];
            if value >= next {
                continue;
            }

            let g_right = g_total - g_left;
            let h_right = h_total - h_left;
            if h_left < min_child || h_right < min_child {
                continue;
            }

            let gain = 0.5
                * (structure_score(g_left, h_left, lambda) + structure_score(g_right, h_right, lambda)
                    - parent);
            if best.map_or(true, |b| gain > b.gain) {
                best = Some(XGBSplit {
                    feature,
                    threshold: (value + next) / 2.0,
                    gain,
                });
            }
        }
        best
    }
}

/// XGBoost regressor with squared error loss
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostRegressor {
    pub config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
}

impl Default for XGBoostRegressor {
    fn default() -> Self {
        Self::new(XGBoostConfig::default())
    }
}

impl XGBoostRegressor {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn sample_subset(n: usize, fraction: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if fraction >= 1.0 {
            return (0..n).collect();
        }
        let k = ((n as f64 * fraction).round() as usize).clamp(1, n);
        let mut idx = sample(rng, n, k).into_vec();
        idx.sort_unstable();
        idx
    }
}

impl Regressor for XGBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let cfg = &self.config;
        if cfg.n_estimators == 0 || !(cfg.learning_rate > 0.0) {
            return Err(ScorecastError::InvalidParameter {
                name: "n_estimators/learning_rate".to_string(),
                value: format!("{}/{}", cfg.n_estimators, cfg.learning_rate),
                reason: "both must be positive".to_string(),
            });
        }
        for (name, value) in [("subsample", cfg.subsample), ("colsample_bytree", cfg.colsample_bytree)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ScorecastError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must be in (0, 1]".to_string(),
                });
            }
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(cfg.random_state);

        let base_score = y.sum() / n_samples as f64;
        let mut predictions = Array1::from_elem(n_samples, base_score);
        let hess = Array1::<f64>::ones(n_samples);
        let mut trees = Vec::with_capacity(cfg.n_estimators);

        for _ in 0..cfg.n_estimators {
            let grad = &predictions - y;
            let rows = Self::sample_subset(n_samples, cfg.subsample, &mut rng);
            let features = Self::sample_subset(n_features, cfg.colsample_bytree, &mut rng);

            let builder = TreeBuilder {
                x,
                grad: &grad,
                hess: &hess,
                features: &features,
                config: cfg,
            };
            let tree = builder.build(rows, 0);

            for i in 0..n_samples {
                predictions[i] += cfg.learning_rate * tree.predict_row(x, i);
            }
            trees.push(tree);
        }

        self.trees = trees;
        self.base_score = base_score;
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ScorecastError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;

        let lr = self.config.learning_rate;
        Ok(Array1::from_iter((0..x.nrows()).map(|row| {
            self.trees
                .iter()
                .fold(self.base_score, |acc, tree| acc + lr * tree.predict_row(x, row))
        })))
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::r2_score;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((120, 3), |(i, j)| ((i * (j + 2) + j) % 23) as f64);
        let y = x.column(0).mapv(|v| if v > 11.0 { 40.0 } else { 10.0 }) + x.column(2).mapv(|v| v * 0.5);
        (x, y)
    }

    #[test]
    fn test_xgboost_fits() {
        let (x, y) = data();
        let mut model = XGBoostRegressor::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_trees(), 100);

        let r2 = r2_score(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(r2 > 0.95, "r2 = {}", r2);
    }

    #[test]
    fn test_leaf_weight_regularization() {
        assert_eq!(leaf_weight(-4.0, 3.0, 1.0, 0.0), 1.0);
        assert_eq!(leaf_weight(-4.0, 3.0, 1.0, 2.0), 0.5);
        assert_eq!(leaf_weight(1.0, 3.0, 1.0, 2.0), 0.0);
    }

    #[test]
    fn test_column_subsampling_is_seeded() {
        let (x, y) = data();
        let config = XGBoostConfig {
            n_estimators: 10,
            colsample_bytree: 0.5,
            subsample: 0.8,
            ..Default::default()
        };
        let mut a = XGBoostRegressor::new(config.clone());
        let mut b = XGBoostRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_unfitted() {
        let model = XGBoostRegressor::default();
        assert!(matches!(
            model.predict(&Array2::zeros((1, 3))),
            Err(ScorecastError::ModelNotFitted)
        ));
    }
}
