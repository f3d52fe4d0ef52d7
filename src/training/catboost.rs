//! CatBoost-style boosting with symmetric (oblivious) trees
//!
//! Features are quantised once into at most `border_count` borders. Every
//! level of a tree applies the same (feature, border) split to all of its
//! buckets, chosen by the summed second-order gain over the buckets.

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{Result, ScorecastError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostConfig {
    pub iterations: usize,
    pub learning_rate: f64,
    /// Levels per symmetric tree
    pub depth: usize,
    pub l2_leaf_reg: f64,
    pub border_count: usize,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            learning_rate: 0.1,
            depth: 6,
            l2_leaf_reg: 3.0,
            border_count: 32,
        }
    }
}

/// Symmetric tree: one `(feature, threshold)` per level, `2^levels` leaves
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricTree {
    splits: Vec<(usize, f64)>,
    leaf_values: Vec<f64>,
}

impl SymmetricTree {
    fn predict_row(&self, x: &Array2<f64>, row: usize) -> f64 {
        let leaf = self.splits.iter().fold(0usize, |idx, &(feature, threshold)| {
            idx * 2 + usize::from(x[[row, feature]] > threshold)
        });
        self.leaf_values[leaf]
    }
}

/// Candidate thresholds per feature: quantiles of the training values,
/// excluding the maximum so every border sends rows both ways.
fn compute_borders(x: &Array2<f64>, border_count: usize) -> Vec<Vec<f64>> {
    x.columns()
        .into_iter()
        .map(|col| {
            let mut values: Vec<f64> = col.to_vec();
            values.sort_by(|a, b| a.total_cmp(b));
            values.dedup();
            if values.len() < 2 {
                return Vec::new();
            }
            let candidates = &values[..values.len() - 1];
            if candidates.len() <= border_count {
                return candidates.to_vec();
            }
            let mut borders: Vec<f64> = (1..=border_count)
                .map(|k| candidates[k * candidates.len() / (border_count + 1)])
                .collect();
            borders.dedup();
            borders
        })
        .collect()
}

/// Bin of every value: the number of borders strictly below it.
fn quantise(x: &Array2<f64>, borders: &[Vec<f64>]) -> Array2<u16> {
    Array2::from_shape_fn(x.dim(), |(i, f)| {
        borders[f].partition_point(|b| *b < x[[i, f]]) as u16
    })
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

struct LevelSearch<'a> {
    bins: &'a Array2<u16>,
    borders: &'a [Vec<f64>],
    grad: &'a Array1<f64>,
    buckets: &'a [Vec<usize>],
    lambda: f64,
}

impl LevelSearch<'_> {
    /// Best border of `feature` and its gain summed over all buckets.
    fn best_for_feature(&self, feature: usize) -> Option<(usize, f64)> {
        let n_borders = self.borders[feature].len();
        if n_borders == 0 {
            return None;
        }

        let mut gains = vec![0.0; n_borders];
        let mut hist_g = vec![0.0; n_borders + 1];
        let mut hist_h = vec![0.0; n_borders + 1];

        for bucket in self.buckets {
            if bucket.is_empty() {
                continue;
            }
            hist_g.iter_mut().for_each(|v| *v = 0.0);
            hist_h.iter_mut().for_each(|v| *v = 0.0);
            for &i in bucket {
                let b = self.bins[[i, feature]] as usize;
                hist_g[b] += self.grad[i];
                hist_h[b] += 1.0;
            }

            let g_total: f64 = hist_g.iter().sum();
            let h_total: f64 = hist_h.iter().sum();
            let parent = score(g_total, h_total, self.lambda);

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for (j, gain) in gains.iter_mut().enumerate() {
                g_left += hist_g[j];
                h_left += hist_h[j];
                *gain += score(g_left, h_left, self.lambda)
                    + score(g_total - g_left, h_total - h_left, self.lambda)
                    - parent;
            }
        }

        gains
            .into_iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (j, gain)| match best {
                Some((_, g)) if g >= gain => best,
                _ => Some((j, gain)),
            })
    }
}

fn build_symmetric_tree(
    x: &Array2<f64>,
    bins: &Array2<u16>,
    borders: &[Vec<f64>],
    grad: &Array1<f64>,
    config: &CatBoostConfig,
) -> SymmetricTree {
    let mut splits = Vec::with_capacity(config.depth);
    let mut buckets: Vec<Vec<usize>> = vec![(0..x.nrows()).collect()];

    for _ in 0..config.depth {
        let search = LevelSearch {
            bins,
            borders,
            grad,
            buckets: &buckets,
            lambda: config.l2_leaf_reg,
        };
        let per_feature: Vec<Option<(usize, f64)>> = (0..x.ncols())
            .into_par_iter()
            .map(|f| search.best_for_feature(f))
            .collect();

        let best = per_feature
            .into_iter()
            .enumerate()
            .filter_map(|(f, r)| r.map(|(j, gain)| (f, j, gain)))
            .fold(None, |best: Option<(usize, usize, f64)>, cand| match best {
                Some(b) if b.2 >= cand.2 => Some(b),
                _ => Some(cand),
            });

        let (feature, border_idx) = match best {
            Some((f, j, gain)) if gain > 1e-12 => (f, j),
            _ => break,
        };

        let border = border_idx as u16;
        splits.push((feature, borders[feature][border_idx]));
        buckets = buckets
            .into_iter()
            .flat_map(|bucket| {
                let (left, right): (Vec<usize>, Vec<usize>) =
                    bucket.into_iter().partition(|&i| bins[[i, feature]] <= border);
                [left, right]
            })
            .collect();
    }

    let leaf_values = buckets
        .iter()
        .map(|bucket| {
            let g: f64 = bucket.iter().map(|&i| grad[i]).sum();
            -g / (bucket.len() as f64 + config.l2_leaf_reg)
        })
        .collect();

    SymmetricTree {
        splits,
        leaf_values,
    }
}

/// CatBoost-style regressor with squared loss
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostRegressor {
    pub config: CatBoostConfig,
    trees: Vec<SymmetricTree>,
    base_prediction: f64,
    n_features: usize,
}

impl Default for CatBoostRegressor {
    fn default() -> Self {
        Self::new(CatBoostConfig::default())
    }
}

impl CatBoostRegressor {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: 0,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for CatBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let cfg = &self.config;
        if cfg.iterations == 0 || !(cfg.learning_rate > 0.0) || cfg.border_count == 0 {
            return Err(ScorecastError::InvalidParameter {
                name: "iterations/learning_rate/border_count".to_string(),
                value: format!("{}/{}/{}", cfg.iterations, cfg.learning_rate, cfg.border_count),
                reason: "all must be positive".to_string(),
            });
        }
        if cfg.depth == 0 || cfg.depth > 16 {
            return Err(ScorecastError::InvalidParameter {
                name: "depth".to_string(),
                value: cfg.depth.to_string(),
                reason: "must be in 1..=16".to_string(),
            });
        }

        let n = x.nrows();
        let borders = compute_borders(x, cfg.border_count.min(u16::MAX as usize - 1));
        let bins = quantise(x, &borders);

        let base_prediction = y.sum() / n as f64;
        let mut predictions = Array1::from_elem(n, base_prediction);
        let mut trees = Vec::with_capacity(cfg.iterations);

        for _ in 0..cfg.iterations {
            let grad = &predictions - y;
            let tree = build_symmetric_tree(x, &bins, &borders, &grad, cfg);
            for i in 0..n {
                predictions[i] += cfg.learning_rate * tree.predict_row(x, i);
            }
            trees.push(tree);
        }

        self.trees = trees;
        self.base_prediction = base_prediction;
        self.n_features = x.ncols();
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
                .fold(self.base_prediction, |acc, tree| acc + lr * tree.predict_row(x, row))
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
    use ndarray::array;

    #[test]
    fn test_catboost_fits() {
        let x = Array2::from_shape_fn((150, 3), |(i, j)| ((i * (j + 3)) % 31) as f64);
        let y = x.column(0).mapv(|v| (v / 5.0).floor() * 3.0) - x.column(1).mapv(|v| v * 0.2);

        let mut model = CatBoostRegressor::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_trees(), 100);

        let r2 = r2_score(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(r2 > 0.9, "r2 = {}", r2);
    }

    #[test]
    fn test_borders_are_capped_quantiles() {
        let x = Array2::from_shape_fn((100, 1), |(i, _)| i as f64);
        let borders = compute_borders(&x, 4);
        assert_eq!(borders[0].len(), 4);
        assert!(borders[0].windows(2).all(|w| w[0] < w[1]));
        assert!(*borders[0].last().unwrap() < 99.0);

        let constant = array![[1.0], [1.0]];
        assert!(compute_borders(&constant, 4)[0].is_empty());
    }

    #[test]
    fn test_quantise_matches_thresholds() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let borders = compute_borders(&x, 32);
        assert_eq!(borders[0], vec![0.0, 1.0, 2.0]);
        let bins = quantise(&x, &borders);
        assert_eq!(bins.column(0).to_vec(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_tree_depth_bounds_leaves() {
        let x = Array2::from_shape_fn((64, 2), |(i, j)| ((i + j * 5) % 16) as f64);
        let y = x.column(0).to_owned();
        let config = CatBoostConfig {
            depth: 2,
            ..Default::default()
        };
        let bins_borders = compute_borders(&x, config.border_count);
        let bins = quantise(&x, &bins_borders);
        let grad = -&y;
        let tree = build_symmetric_tree(&x, &bins, &bins_borders, &grad, &config);
        assert_eq!(tree.splits.len(), 2);
        assert_eq!(tree.leaf_values.len(), 4);
    }
}
