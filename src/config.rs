//! Command-line arguments and the validated training configuration

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use crate::boosting::{BoostingParams, TreeParams};
use crate::experiment::validate_name;
use crate::{Error, Result};

/// Default directory for `predictions.csv`
pub const DEFAULT_OUTPUT_DIR: &str = "./outputs";

/// Default root of the file tracking store
pub const DEFAULT_TRACKING_DIR: &str = "./mlruns";

/// Default experiment name
pub const DEFAULT_EXPERIMENT: &str = "Default";

/// Raw command-line arguments.
///
/// Option names use underscores (`--train_data`), matching the job
/// submission interface this trainer is launched from.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "car-mpg-trainer",
    version,
    about = "Train a gradient-boosted fuel-efficiency regressor and track the run."
)]
pub struct TrainArgs {
    /// Directory holding the single training data file
    #[arg(long = "train_data")]
    pub train_data: PathBuf,

    /// Directory holding the single test data file
    #[arg(long = "test_data")]
    pub test_data: PathBuf,

    /// Number of boosting rounds
    #[arg(long = "n_estimators", default_value_t = 100)]
    pub n_estimators: usize,

    /// Shrinkage applied to each tree
    #[arg(long = "learning_rate", default_value_t = 0.1)]
    pub learning_rate: f64,

    /// Name to register the fitted model under
    #[arg(long = "registered_model_name")]
    pub registered_model_name: String,

    /// Accepted for interface compatibility; ignored
    #[arg(long = "model")]
    pub model: Option<String>,

    /// Maximum depth of each tree
    #[arg(long = "max_depth", default_value_t = 3)]
    pub max_depth: usize,

    /// Directory that receives predictions.csv
    #[arg(long = "output_dir", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Root of the local tracking store
    #[arg(long = "tracking_dir", env = "TRACKING_DIR", default_value = DEFAULT_TRACKING_DIR)]
    pub tracking_dir: PathBuf,

    /// Experiment the run is grouped under
    #[arg(long = "experiment_name", default_value = DEFAULT_EXPERIMENT)]
    pub experiment_name: String,
}

/// Validated training configuration.
///
/// Serialized as the parameters of the tracking run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainConfig {
    /// Training data directory
    pub train_data: PathBuf,
    /// Test data directory
    pub test_data: PathBuf,
    /// Boosting rounds
    pub n_estimators: usize,
    /// Shrinkage
    pub learning_rate: f64,
    /// Tree depth limit
    pub max_depth: usize,
    /// Model registry name
    pub registered_model_name: String,
    /// Predictions output directory
    pub output_dir: PathBuf,
    /// Experiment name
    pub experiment_name: String,
}

impl TrainConfig {
    /// Configuration with default hyperparameters and output locations.
    #[must_use]
    pub fn new(
        train_data: impl Into<PathBuf>,
        test_data: impl Into<PathBuf>,
        registered_model_name: impl Into<String>,
    ) -> Self {
        Self {
            train_data: train_data.into(),
            test_data: test_data.into(),
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            registered_model_name: registered_model_name.into(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            experiment_name: DEFAULT_EXPERIMENT.to_string(),
        }
    }

    /// Booster hyperparameters derived from this configuration
    #[must_use]
    pub fn boosting_params(&self) -> BoostingParams {
        BoostingParams {
            n_estimators: self.n_estimators,
            learning_rate: self.learning_rate,
            tree: TreeParams {
                max_depth: self.max_depth,
                ..TreeParams::default()
            },
        }
    }

    /// Check hyperparameters and names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for out-of-range hyperparameters, or
    /// a model or experiment name the tracking store cannot use as a path
    /// component.
    pub fn validate(&self) -> Result<()> {
        self.boosting_params().validate()?;
        validate_name("registered model name", &self.registered_model_name)?;
        validate_name("experiment name", &self.experiment_name)
    }

    /// Run parameters as JSON
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] if the configuration cannot be encoded.
    pub fn to_params(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| Error::Other(format!("cannot encode params: {e}")))
    }
}

impl TryFrom<TrainArgs> for TrainConfig {
    type Error = Error;

    fn try_from(args: TrainArgs) -> Result<Self> {
        let config = Self {
            train_data: args.train_data,
            test_data: args.test_data,
            n_estimators: args.n_estimators,
            learning_rate: args.learning_rate,
            max_depth: args.max_depth,
            registered_model_name: args.registered_model_name,
            output_dir: args.output_dir,
            experiment_name: args.experiment_name,
        };
        config.validate()?;
        Ok(config)
    }
}
