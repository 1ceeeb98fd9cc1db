//! Gradient-boosted regression trees (squared-error loss)
//!
//! Training starts from the mean target and adds one shrunken tree per
//! round, each fitted to the current residuals:
//!
//! ```text
//! F_0(x) = mean(y)
//! F_m(x) = F_{m-1}(x) + learning_rate * h_m(x),   h_m fitted to y - F_{m-1}(x)
//! ```
//!
//! For squared error the negative gradient is the residual and the optimal
//! leaf value is the mean residual, so no separate line search is needed.
//!
//! # Example
//!
//! ```rust
//! use car_mpg_trainer::boosting::{BoostingParams, GradientBoostingRegressor};
//! use car_mpg_trainer::data::DenseMatrix;
//!
//! let x = DenseMatrix::from_row_major(vec![1.0, 2.0, 3.0, 4.0], 4, 1);
//! let y = [1.0, 1.0, 5.0, 5.0];
//!
//! let model = GradientBoostingRegressor::new(BoostingParams::default())
//!     .fit(&x, &y)?;
//! let predictions = model.predict(&x);
//! assert_eq!(predictions.len(), 4);
//! # Ok::<(), car_mpg_trainer::Error>(())
//! ```

mod tree;

pub use tree::{Node, NodeId, RegressionTree, TreeParams};

use crate::data::DenseMatrix;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Boosting hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    /// Growth limits for each tree
    pub tree: TreeParams,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            tree: TreeParams::default(),
        }
    }
}

impl BoostingParams {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::InvalidInput(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidInput(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if self.tree.max_depth == 0 {
            return Err(Error::InvalidInput("max_depth must be at least 1".to_string()));
        }
        if self.tree.min_samples_split < 2 {
            return Err(Error::InvalidInput(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.tree.min_samples_leaf == 0 {
            return Err(Error::InvalidInput(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Unfitted booster
#[derive(Debug, Clone, Copy, Default)]
pub struct GradientBoostingRegressor {
    params: BoostingParams,
}

impl GradientBoostingRegressor {
    /// Create a booster with the given hyperparameters
    #[must_use]
    pub const fn new(params: BoostingParams) -> Self {
        Self { params }
    }

    /// Hyperparameters
    #[must_use]
    pub const fn params(&self) -> &BoostingParams {
        &self.params
    }

    /// Train the ensemble.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for bad hyperparameters, an empty training
    ///   set, a row/target length mismatch, or non-finite targets
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(self, x: &DenseMatrix, y: &[f64]) -> Result<FittedBoostingRegressor> {
        self.params.validate()?;
        if x.n_rows() != y.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature rows but {} targets",
                x.n_rows(),
                y.len()
            )));
        }
        if y.is_empty() {
            return Err(Error::InvalidInput("training set is empty".to_string()));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput("targets must be finite".to_string()));
        }

        let n = y.len() as f64;
        let init = y.iter().sum::<f64>() / n;
        let mut raw = vec![init; y.len()];
        let mut residuals = vec![0.0; y.len()];
        let mut trees = Vec::with_capacity(self.params.n_estimators);
        let mut train_loss = Vec::with_capacity(self.params.n_estimators);

        for round in 0..self.params.n_estimators {
            for ((r, target), pred) in residuals.iter_mut().zip(y).zip(&raw) {
                *r = target - pred;
            }

            let tree = RegressionTree::fit(x, &residuals, &self.params.tree);
            for (pred, row) in raw.iter_mut().zip(x.rows()) {
                *pred += self.params.learning_rate * tree.predict_row(row);
            }
            trees.push(tree);

            let loss = y
                .iter()
                .zip(&raw)
                .map(|(t, p)| (t - p) * (t - p))
                .sum::<f64>()
                / n;
            train_loss.push(loss);

            if round == 0 || (round + 1) % 10 == 0 {
                debug!(round = round + 1, loss, "boosting round");
            }
        }

        Ok(FittedBoostingRegressor {
            params: self.params,
            init,
            trees,
            train_loss,
        })
    }
}

/// Trained ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedBoostingRegressor {
    params: BoostingParams,
    init: f64,
    trees: Vec<RegressionTree>,
    train_loss: Vec<f64>,
}

impl FittedBoostingRegressor {
    /// Hyperparameters used for training
    #[must_use]
    pub const fn params(&self) -> &BoostingParams {
        &self.params
    }

    /// Initial prediction (training target mean)
    #[must_use]
    pub const fn init(&self) -> f64 {
        self.init
    }

    /// Fitted trees in boosting order
    #[must_use]
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Mean squared training error after each round
    #[must_use]
    pub fn train_loss(&self) -> &[f64] {
        &self.train_loss
    }

    /// Predict one row
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.init
            + self.params.learning_rate
                * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    /// Predict every row, preserving row order
    #[must_use]
    pub fn predict(&self, x: &DenseMatrix) -> Vec<f64> {
        x.rows().map(|row| self.predict_row(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (DenseMatrix, Vec<f64>) {
        let xs: Vec<f64> = (0..20).map(f64::from).collect();
        let ys: Vec<f64> = xs.iter().map(|&v| if v < 10.0 { 5.0 } else { 25.0 }).collect();
        (DenseMatrix::from_row_major(xs, 20, 1), ys)
    }

    #[test]
    fn test_training_loss_decreases() {
        let (x, y) = step_data();
        let model = GradientBoostingRegressor::new(BoostingParams::default())
            .fit(&x, &y)
            .unwrap();

        let loss = model.train_loss();
        assert_eq!(loss.len(), 100);
        assert!(loss.windows(2).all(|w| w[1] <= w[0] + 1e-12));
        assert!(loss[99] < 1e-6);
    }

    #[test]
    fn test_init_is_target_mean() {
        let (x, y) = step_data();
        let model = GradientBoostingRegressor::new(BoostingParams {
            n_estimators: 1,
            ..BoostingParams::default()
        })
        .fit(&x, &y)
        .unwrap();

        assert!((model.init() - 15.0).abs() < 1e-12);
        assert_eq!(model.trees().len(), 1);
    }

    #[test]
    fn test_shrinkage_scales_first_tree() {
        let (x, y) = step_data();
        let model = GradientBoostingRegressor::new(BoostingParams {
            n_estimators: 1,
            learning_rate: 0.5,
            ..BoostingParams::default()
        })
        .fit(&x, &y)
        .unwrap();

        // residuals are -10 / +10, half of that is applied
        assert!((model.predict_row(&[0.0]) - 10.0).abs() < 1e-12);
        assert!((model.predict_row(&[19.0]) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_predict_preserves_order_and_length() {
        let (x, y) = step_data();
        let model = GradientBoostingRegressor::new(BoostingParams::default())
            .fit(&x, &y)
            .unwrap();

        let test = DenseMatrix::from_row_major(vec![19.0, 0.0, 12.0], 3, 1);
        let preds = model.predict(&test);
        assert_eq!(preds.len(), 3);
        assert!(preds[0] > 20.0);
        assert!(preds[1] < 10.0);
        assert!(preds[2] > 20.0);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let (x, y) = step_data();
        let cases = [
            BoostingParams {
                n_estimators: 0,
                ..BoostingParams::default()
            },
            BoostingParams {
                learning_rate: 0.0,
                ..BoostingParams::default()
            },
            BoostingParams {
                learning_rate: f64::NAN,
                ..BoostingParams::default()
            },
            BoostingParams {
                tree: TreeParams {
                    max_depth: 0,
                    ..TreeParams::default()
                },
                ..BoostingParams::default()
            },
        ];
        for params in cases {
            let result = GradientBoostingRegressor::new(params).fit(&x, &y);
            assert!(matches!(result, Err(Error::InvalidInput(_))), "{params:?}");
        }
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let (x, _) = step_data();
        let result = GradientBoostingRegressor::default().fit(&x, &[1.0, 2.0]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_deterministic() {
        let (x, y) = step_data();
        let a = GradientBoostingRegressor::default().fit(&x, &y).unwrap();
        let b = GradientBoostingRegressor::default().fit(&x, &y).unwrap();
        assert_eq!(a, b);
    }
}
