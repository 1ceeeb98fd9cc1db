//! Preprocessing + estimator pipeline
//!
//! A [`Pipeline`] selects the declared numeric columns from a feature frame,
//! standardizes them and feeds them to the booster. Any other column in the
//! frame is ignored. Fitting consumes the pipeline and returns an immutable
//! [`FittedPipeline`], which is the unit that gets serialized and registered.
//!
//! ```rust,no_run
//! use car_mpg_trainer::boosting::BoostingParams;
//! use car_mpg_trainer::data::{split_features_target, NUMERIC_FEATURES, TARGET_COLUMN};
//! use car_mpg_trainer::pipeline::Pipeline;
//! use car_mpg_trainer::storage::load_dataset;
//!
//! let train = load_dataset("data/train.csv")?;
//! let (x, y) = split_features_target(&train, TARGET_COLUMN)?;
//!
//! let fitted = Pipeline::new(NUMERIC_FEATURES, BoostingParams::default()).fit(&x, &y)?;
//! let predictions = fitted.predict(&x)?;
//! # Ok::<(), car_mpg_trainer::Error>(())
//! ```

use crate::boosting::{BoostingParams, FittedBoostingRegressor, GradientBoostingRegressor};
use crate::data::Dataset;
use crate::metrics::r2_score;
use crate::preprocessing::{FittedStandardScaler, StandardScaler};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Unfitted pipeline: column selection, scaler, booster
#[derive(Debug, Clone)]
pub struct Pipeline {
    features: Vec<String>,
    scaler: StandardScaler,
    booster: GradientBoostingRegressor,
}

impl Pipeline {
    /// Build a pipeline over the given numeric feature columns
    #[must_use]
    pub fn new<I, S>(features: I, params: BoostingParams) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            features: features.into_iter().map(Into::into).collect(),
            scaler: StandardScaler::new(),
            booster: GradientBoostingRegressor::new(params),
        }
    }

    /// Feature columns, in model order
    #[must_use]
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Learn scaling statistics and trees from the training split only.
    ///
    /// # Errors
    ///
    /// - [`Error::SchemaMismatch`] if a declared feature column is absent
    /// - [`Error::MalformedInput`] if a feature column is not numeric
    /// - [`Error::InvalidInput`] for an empty feature list, empty data, a
    ///   row/target length mismatch, or bad hyperparameters
    pub fn fit(self, x: &Dataset, y: &[f64]) -> Result<FittedPipeline> {
        if self.features.is_empty() {
            return Err(Error::InvalidInput(
                "pipeline needs at least one feature column".to_string(),
            ));
        }
        if x.num_rows() != y.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature rows but {} targets",
                x.num_rows(),
                y.len()
            )));
        }

        let raw = x.select_matrix(&self.features)?;
        let scaler = self.scaler.fit(&raw)?;
        let scaled = scaler.transform(&raw)?;
        let model = self.booster.fit(&scaled, y)?;

        Ok(FittedPipeline {
            features: self.features,
            scaler,
            model,
        })
    }
}

/// Fitted pipeline; inference only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    features: Vec<String>,
    scaler: FittedStandardScaler,
    model: FittedBoostingRegressor,
}

impl FittedPipeline {
    /// Feature columns, in model order
    #[must_use]
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Learned standardization
    #[must_use]
    pub const fn scaler(&self) -> &FittedStandardScaler {
        &self.scaler
    }

    /// Learned ensemble
    #[must_use]
    pub const fn model(&self) -> &FittedBoostingRegressor {
        &self.model
    }

    /// One prediction per row of `x`, in row order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] or [`Error::MalformedInput`] if the
    /// feature columns are absent or not numeric.
    pub fn predict(&self, x: &Dataset) -> Result<Vec<f64>> {
        let raw = x.select_matrix(&self.features)?;
        let scaled = self.scaler.transform(&raw)?;
        Ok(self.model.predict(&scaled))
    }

    /// Coefficient of determination of the predictions on `(x, y)`.
    ///
    /// # Errors
    ///
    /// Propagates [`FittedPipeline::predict`] errors; returns
    /// [`Error::InvalidInput`] if `y` does not match the row count.
    pub fn score(&self, x: &Dataset, y: &[f64]) -> Result<f64> {
        if x.num_rows() != y.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature rows but {} targets",
                x.num_rows(),
                y.len()
            )));
        }
        let predictions = self.predict(x)?;
        Ok(r2_score(y, &predictions))
    }

    /// Serialize to JSON
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] if serialization fails
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Other(format!("failed to serialize pipeline: {e}")))
    }

    /// Deserialize from JSON produced by [`FittedPipeline::to_json`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`] if the payload is not a pipeline
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::MalformedInput(format!("invalid pipeline payload: {e}")))
    }
}
