//! K-nearest neighbors regression

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{Result, ScorecastError};

/// Distance metric for neighbor search
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
    Minkowski(f64),
}

impl DistanceMetric {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match *self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
            DistanceMetric::Minkowski(p) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).abs().powf(p))
                .sum::<f64>()
                .powf(1.0 / p),
        }
    }
}

/// How neighbors are weighted when averaging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightScheme {
    #[default]
    Uniform,
    /// Inverse distance; an exact match takes all the weight
    Distance,
}

impl WeightScheme {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "uniform" => Ok(WeightScheme::Uniform),
            "distance" => Ok(WeightScheme::Distance),
            other => Err(ScorecastError::InvalidParameter {
                name: "weights".to_string(),
                value: other.to_string(),
                reason: "expected uniform or distance".to_string(),
            }),
        }
    }
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// Neighbor candidate ordered by distance, then by training row
#[derive(Debug, Clone, Copy, PartialEq)]
struct Neighbor {
    dist: f64,
    row: usize,
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then(self.row.cmp(&other.row))
    }
}

/// KNN regressor storing its training set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNRegressor {
    pub config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Default for KNNRegressor {
    fn default() -> Self {
        Self::new(KNNConfig::default())
    }
}

impl KNNRegressor {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// `k` nearest training rows to `point`, nearest first. O(n log k).
    fn nearest(&self, x_train: &Array2<f64>, point: ArrayView1<f64>, k: usize) -> Vec<Neighbor> {
        let mut heap = BinaryHeap::with_capacity(k + 1);
        for (row, train_row) in x_train.rows().into_iter().enumerate() {
            let candidate = Neighbor {
                dist: self.config.metric.distance(point, train_row),
                row,
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if heap.peek().map_or(false, |top| candidate < *top) {
                heap.pop();
                heap.push(candidate);
            }
        }
        heap.into_sorted_vec()
    }

    fn aggregate(&self, neighbors: &[Neighbor], y_train: &Array1<f64>) -> f64 {
        match self.config.weights {
            WeightScheme::Uniform => {
                neighbors.iter().map(|n| y_train[n.row]).sum::<f64>() / neighbors.len() as f64
            }
            WeightScheme::Distance => {
                let exact: Vec<f64> = neighbors
                    .iter()
                    .filter(|n| n.dist == 0.0)
                    .map(|n| y_train[n.row])
                    .collect();
                if !exact.is_empty() {
                    return exact.iter().sum::<f64>() / exact.len() as f64;
                }
                let (num, den) = neighbors.iter().fold((0.0, 0.0), |(num, den), n| {
                    let w = 1.0 / n.dist;
                    (num + w * y_train[n.row], den + w)
                });
                num / den
            }
        }
    }
}

impl Regressor for KNNRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.config.n_neighbors == 0 {
            return Err(ScorecastError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if let DistanceMetric::Minkowski(p) = self.config.metric {
            if !(p >= 1.0) {
                return Err(ScorecastError::InvalidParameter {
                    name: "p".to_string(),
                    value: p.to_string(),
                    reason: "Minkowski p must be at least 1".to_string(),
                });
            }
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x_train), Some(y_train)) => (x_train, y_train),
            _ => return Err(ScorecastError::ModelNotFitted),
        };
        check_predict_input(x, x_train.ncols())?;

        let k = self.config.n_neighbors.min(x_train.nrows());
        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = self.nearest(x_train, x.row(i), k);
                self.aggregate(&neighbors, y_train)
            })
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    fn is_fitted(&self) -> bool {
        self.x_train.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_knn_uniform_average() {
        let x = array![[0.0], [1.0], [2.0], [10.0], [11.0]];
        let y = array![1.0, 2.0, 3.0, 10.0, 20.0];
        let mut knn = KNNRegressor::new(KNNConfig {
            n_neighbors: 2,
            ..Default::default()
        });
        knn.fit(&x, &y).unwrap();

        let pred = knn.predict(&array![[0.4], [10.6]]).unwrap();
        assert!((pred[0] - 1.5).abs() < 1e-12);
        assert!((pred[1] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_knn_ties_resolve_to_earlier_rows() {
        let x = array![[-1.0], [1.0], [3.0]];
        let y = array![10.0, 20.0, 30.0];
        let mut knn = KNNRegressor::new(KNNConfig {
            n_neighbors: 1,
            ..Default::default()
        });
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&array![[0.0]]).unwrap()[0], 10.0);
    }

    #[test]
    fn test_knn_distance_weights() {
        let x = array![[0.0], [3.0]];
        let y = array![0.0, 30.0];
        let mut knn = KNNRegressor::new(KNNConfig {
            n_neighbors: 2,
            weights: WeightScheme::Distance,
            ..Default::default()
        });
        knn.fit(&x, &y).unwrap();

        // weights 1/1 and 1/2
        let pred = knn.predict(&array![[1.0], [3.0]]).unwrap();
        assert!((pred[0] - 10.0).abs() < 1e-12);
        assert_eq!(pred[1], 30.0);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let mut knn = KNNRegressor::default();
        knn.fit(&array![[0.0], [1.0]], &array![2.0, 4.0]).unwrap();
        assert_eq!(knn.predict(&array![[7.0]]).unwrap()[0], 3.0);
    }

    #[test]
    fn test_manhattan_metric() {
        let d = DistanceMetric::Manhattan.distance(array![0.0, 0.0].view(), array![3.0, 4.0].view());
        assert_eq!(d, 7.0);
        let d = DistanceMetric::Minkowski(2.0).distance(array![0.0, 0.0].view(), array![3.0, 4.0].view());
        assert!((d - 5.0).abs() < 1e-12);
    }
}
