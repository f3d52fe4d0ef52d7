//! CART regression tree
//!
//! Splits are found by sorting each candidate feature once per node and
//! sweeping running sums, so a node costs `O(n log n)` per feature.

use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{Result, ScorecastError};

/// Nodes at or above this size scan features in parallel
const PARALLEL_SPLIT_MIN_SAMPLES: usize = 512;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict_row(&self, x: &Array2<f64>, row: usize) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if x[[row, *feature_idx]] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Split quality measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// Reduction of the sum of squared errors
    SquaredError,
    /// Friedman's improvement score `n_l n_r (mean_l - mean_r)^2 / (n_l + n_r)^2`
    FriedmanMse,
}

impl Criterion {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "squared_error" => Ok(Criterion::SquaredError),
            "friedman_mse" => Ok(Criterion::FriedmanMse),
            other => Err(ScorecastError::InvalidParameter {
                name: "criterion".to_string(),
                value: other.to_string(),
                reason: "expected squared_error or friedman_mse".to_string(),
            }),
        }
    }

    fn score(&self, left_n: f64, left_sum: f64, right_n: f64, right_sum: f64) -> f64 {
        match self {
            Criterion::SquaredError => {
                let total = left_sum + right_sum;
                left_sum * left_sum / left_n + right_sum * right_sum / right_n
                    - total * total / (left_n + right_n)
            }
            Criterion::FriedmanMse => {
                let diff = left_sum / left_n - right_sum / right_n;
                let n = left_n + right_n;
                left_n * right_n * diff * diff / (n * n)
            }
        }
    }
}

/// Features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
    Fraction(f64),
    Fixed(usize),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match *self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(k) => k,
        };
        k.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    score: f64,
}

/// Regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub criterion: Criterion,
    pub random_state: u64,
    n_features: usize,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            criterion: Criterion::SquaredError,
            random_state: 0,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Depth of the fitted tree
    pub fn depth(&self) -> Option<usize> {
        self.root.as_ref().map(TreeNode::depth)
    }

    pub fn n_leaves(&self) -> Option<usize> {
        self.root.as_ref().map(TreeNode::n_leaves)
    }

    /// Fit on the rows of `x` selected by `indices`. Repeated indices act as
    /// sample weights, which is how bootstrap samples are passed in.
    pub fn fit_on_indices(&mut self, x: &Array2<f64>, y: &Array1<f64>, indices: Vec<usize>) -> Result<()> {
        if indices.is_empty() {
            return Err(ScorecastError::ValidationError(
                "cannot fit a tree on zero samples".to_string(),
            ));
        }
        self.n_features = x.ncols();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);
        self.root = Some(self.build_node(x, y, indices, 0, &mut rng));
        Ok(())
    }

    fn build_node(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> TreeNode {
        let n_samples = indices.len();
        let (sum, sum_sq) = indices
            .iter()
            .fold((0.0, 0.0), |(s, sq), &i| (s + y[i], sq + y[i] * y[i]));
        let mean = sum / n_samples as f64;
        let variance = (sum_sq / n_samples as f64 - mean * mean).max(0.0);

        let depth_reached = self.max_depth.map_or(false, |d| depth >= d);
        if depth_reached
            || n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || variance <= 1e-12 * (1.0 + mean * mean)
        {
            return TreeNode::Leaf {
                value: mean,
                n_samples,
            };
        }

        let features = self.candidate_features(rng);
        let best = match self.find_best_split(x, y, &indices, &features) {
            Some(best) => best,
            None => {
                return TreeNode::Leaf {
                    value: mean,
                    n_samples,
                }
            }
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, best.feature_idx]] <= best.threshold);

        let left = self.build_node(x, y, left_idx, depth + 1, rng);
        let right = self.build_node(x, y, right_idx, depth + 1, rng);

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left: Box::new(left),
            right: Box::new(right),
            n_samples,
        }
    }

    fn candidate_features(&self, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let k = self.max_features.resolve(self.n_features);
        if k >= self.n_features {
            return (0..self.n_features).collect();
        }
        let mut features = sample(rng, self.n_features, k).into_vec();
        features.sort_unstable();
        features
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let scan = |&f: &usize| self.best_split_for_feature(x, y, indices, f);
        let per_feature: Vec<Option<SplitCandidate>> = if indices.len() >= PARALLEL_SPLIT_MIN_SAMPLES {
            features.par_iter().map(scan).collect()
        } else {
            features.iter().map(scan).collect()
        };

        // First feature wins ties so the result does not depend on scheduling
        per_feature
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, cand| match best {
                Some(b) if b.score >= cand.score => Some(b),
                _ => Some(cand),
            })
    }

    fn best_split_for_feature(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        feature_idx: usize,
    ) -> Option<SplitCandidate> {
        let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = pairs.len();
        let total: f64 = pairs.iter().map(|p| p.1).sum();
        let min_leaf = self.min_samples_leaf;

        let mut best: Option<SplitCandidate> = None;
        let mut left_sum = 0.0;
        for k in 0..n - 1 {
            left_sum += pairs[k].1;
            let left_n = k + 1;
            if pairs[k].0 >= pairs[k + 1].0 {
                continue;
            }
            if left_n < min_leaf || n - left_n < min_leaf {
                continue;
            }

            let score = self.criterion.score(
                left_n as f64,
                left_sum,
                (n - left_n) as f64,
                total - left_sum,
            );
            if score > 1e-12 && best.map_or(true, |b| score > b.score) {
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold: (pairs[k].0 + pairs[k + 1].0) / 2.0,
                    score,
                });
            }
        }
        best
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.fit_on_indices(x, y, (0..x.nrows()).collect())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(ScorecastError::ModelNotFitted)?;
        check_predict_input(x, self.n_features)?;
        Ok(Array1::from_iter((0..x.nrows()).map(|row| root.predict_row(x, row))))
    }

    fn is_fitted(&self) -> bool {
        self.root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_tree_fits_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, 20.0, 20.0, 20.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.depth(), Some(1));
        assert_eq!(tree.n_leaves(), Some(2));
        let pred = tree.predict(&array![[0.0], [6.4], [6.6], [100.0]]).unwrap();
        assert_eq!(pred.to_vec(), vec![5.0, 5.0, 20.0, 20.0]);
    }

    #[test]
    fn test_max_depth_and_min_leaf() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from_shape_fn(40, |i| (i as f64).sin() * 10.0);

        let mut tree = DecisionTreeRegressor::new().with_max_depth(Some(3));
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth().unwrap() <= 3);

        let mut tree = DecisionTreeRegressor::new().with_min_samples_leaf(20);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.n_leaves(), Some(2));
    }

    #[test]
    fn test_criteria_agree_on_clear_split() {
        let x = array![[0.0, 3.0], [1.0, 1.0], [2.0, 4.0], [3.0, 1.0], [4.0, 5.0], [5.0, 9.0]];
        let y = array![1.0, 1.0, 1.0, 8.0, 8.0, 8.0];
        for criterion in [Criterion::SquaredError, Criterion::FriedmanMse] {
            let mut tree = DecisionTreeRegressor::new()
                .with_criterion(criterion)
                .with_max_depth(Some(1));
            tree.fit(&x, &y).unwrap();
            assert_eq!(tree.predict(&x).unwrap(), y);
        }
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![4.0, 4.0, 4.0];
        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.n_leaves(), Some(1));
    }

    #[test]
    fn test_parse_criterion() {
        assert_eq!(Criterion::parse("friedman_mse").unwrap(), Criterion::FriedmanMse);
        assert!(Criterion::parse("gini").is_err());
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::All.resolve(16), 16);
        assert_eq!(MaxFeatures::Sqrt.resolve(16), 4);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(9), 5);
        assert_eq!(MaxFeatures::Fixed(100).resolve(9), 9);
    }
}
