//! Feature standardization
//!
//! Each column is rescaled to zero mean and unit variance using statistics
//! learned from the matrix passed to [`StandardScaler::fit`]. Variance uses
//! the population formula (divide by `n`). A constant column keeps scale
//! 1.0 so it is only centred.

use crate::data::DenseMatrix;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Unfitted standardization step
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardScaler;

impl StandardScaler {
    /// Create a scaler
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Learn per-column mean and scale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the matrix has no rows.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(self, x: &DenseMatrix) -> Result<FittedStandardScaler> {
        if x.n_rows() == 0 {
            return Err(Error::InvalidInput(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let n = x.n_rows() as f64;
        let mut mean = vec![0.0; x.n_cols()];
        for row in x.rows() {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut var = vec![0.0; x.n_cols()];
        for row in x.rows() {
            for ((acc, v), m) in var.iter_mut().zip(row).zip(&mean) {
                let d = v - m;
                *acc += d * d;
            }
        }

        let scale = var
            .into_iter()
            .map(|v| {
                let std = (v / n).sqrt();
                if std > f64::EPSILON * 10.0 {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(FittedStandardScaler { mean, scale })
    }
}

/// Standardization with learned statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedStandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl FittedStandardScaler {
    /// Per-column means
    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Per-column scale (standard deviation, or 1.0 for constant columns)
    #[must_use]
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Number of columns the scaler was fitted on
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Apply `(x - mean) / scale` column-wise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if the column count differs from fit time.
    pub fn transform(&self, x: &DenseMatrix) -> Result<DenseMatrix> {
        if x.n_cols() != self.n_features() {
            return Err(Error::SchemaMismatch(format!(
                "scaler fitted on {} columns, got {}",
                self.n_features(),
                x.n_cols()
            )));
        }

        let mut out = x.clone();
        for row in out.as_mut_slice().chunks_mut(self.n_features().max(1)) {
            for ((v, m), s) in row.iter_mut().zip(&self.mean).zip(&self.scale) {
                *v = (*v - m) / s;
            }
        }
        Ok(out)
    }
}
