//! End-to-end training job
//!
//! One call to [`Trainer::run`] performs, inside a single tracking run:
//!
//! 1. load the train and test files from their directories and check that
//!    both carry the same columns, including the target and every feature
//! 2. split each on the `mpg` target
//! 3. fit the standardize + boost pipeline on the training split
//! 4. score it on the test split and log the score
//! 5. write `predictions.csv` and log it as an artifact
//! 6. store the fitted pipeline and register it under the configured name
//!
//! The run ends `Finished` when every step succeeds and `Failed` otherwise;
//! a failing step's error message names the step.

use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::TrainConfig;
use crate::data::{
    require_matching_columns, split_features_target, NUMERIC_FEATURES, TARGET_COLUMN,
};
use crate::error::StepContext;
use crate::experiment::{ActiveRun, ModelVersion, RunRecord, RunStatus, Tracker};
use crate::metrics::{rmse, SCORE_METRIC};
use crate::pipeline::{FittedPipeline, Pipeline};
use crate::storage::{load_dataset_dir, write_predictions};
use crate::{Error, Result};

/// Artifact path the fitted pipeline is stored under
pub const MODEL_ARTIFACT_PATH: &str = "gbr-car-mpg-predictor";

/// File name of the predictions table
pub const PREDICTIONS_FILE: &str = "predictions.csv";

/// Outcome of a successful training job
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Closed run record
    pub run: RunRecord,
    /// R² on the test split
    pub score: f64,
    /// Where the predictions table was written
    pub predictions_path: PathBuf,
    /// Registry entry of the fitted model
    pub model_version: ModelVersion,
    /// Fitted pipeline
    pub pipeline: FittedPipeline,
    /// Training rows
    pub train_rows: usize,
    /// Test rows
    pub test_rows: usize,
}

/// Runs the training job for one configuration.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainConfig,
}

impl Trainer {
    /// Create a trainer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if the configuration is invalid.
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Execute the job against `tracker`.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error after ending the run as
    /// [`RunStatus::Failed`]; returns tracking errors from starting or
    /// finishing the run.
    pub fn run<T: Tracker + ?Sized>(&self, tracker: &mut T) -> Result<TrainingReport> {
        let mut run = ActiveRun::start(
            tracker,
            &self.config.experiment_name,
            self.config.to_params()?,
        )?;
        info!(
            run_id = run.run_id(),
            experiment = %self.config.experiment_name,
            "training run started"
        );

        match self.execute(&mut run) {
            Ok(outcome) => {
                let record = run.finish(RunStatus::Finished)?;
                info!(run_id = record.run_id(), score = outcome.score, "training run finished");
                Ok(TrainingReport {
                    run: record,
                    score: outcome.score,
                    predictions_path: outcome.predictions_path,
                    model_version: outcome.model_version,
                    pipeline: outcome.pipeline,
                    train_rows: outcome.train_rows,
                    test_rows: outcome.test_rows,
                })
            }
            Err(e) => {
                warn!(run_id = run.run_id(), error = %e, "training run failed");
                if let Err(end) = run.finish(RunStatus::Failed) {
                    warn!(error = %end, "could not mark run failed");
                }
                Err(e)
            }
        }
    }

    fn execute<T: Tracker + ?Sized>(&self, run: &mut ActiveRun<'_, T>) -> Result<Outcome> {
        let config = &self.config;

        let train = load_dataset_dir(&config.train_data).step("load training data")?;
        let test = load_dataset_dir(&config.test_data).step("load test data")?;
        info!(
            train_rows = train.num_rows(),
            test_rows = test.num_rows(),
            "datasets loaded"
        );
        require_matching_columns(&train, &test, TARGET_COLUMN, &NUMERIC_FEATURES)
            .step("check schemas")?;

        let (x_train, y_train) =
            split_features_target(&train, TARGET_COLUMN).step("split training data")?;
        let (x_test, y_test) =
            split_features_target(&test, TARGET_COLUMN).step("split test data")?;

        let pipeline = Pipeline::new(NUMERIC_FEATURES, config.boosting_params())
            .fit(&x_train, &y_train)
            .step("fit pipeline")?;
        info!(
            n_estimators = config.n_estimators,
            learning_rate = config.learning_rate,
            "pipeline fitted"
        );

        let score = pipeline.score(&x_test, &y_test).step("score")?;
        run.log_metric(SCORE_METRIC, score).step("log metric")?;

        let predicted = pipeline.predict(&x_test).step("predict")?;
        info!(
            metric = SCORE_METRIC,
            score,
            rmse = rmse(&y_test, &predicted),
            "test split scored"
        );
        let predictions_path = config.output_dir.join(PREDICTIONS_FILE);
        fs::create_dir_all(&config.output_dir)
            .map_err(Error::from)
            .and_then(|()| write_predictions(&predictions_path, &y_test, &predicted))
            .step("write predictions")?;
        run.log_artifact(&predictions_path).step("log predictions")?;
        info!(path = %predictions_path.display(), "predictions written");

        let model_version = run
            .log_model(&pipeline, MODEL_ARTIFACT_PATH, &config.registered_model_name)
            .step("register model")?;
        info!(
            name = model_version.name(),
            version = model_version.version(),
            "model registered"
        );

        Ok(Outcome {
            score,
            predictions_path,
            model_version,
            pipeline,
            train_rows: train.num_rows(),
            test_rows: test.num_rows(),
        })
    }
}

struct Outcome {
    score: f64,
    predictions_path: PathBuf,
    model_version: ModelVersion,
    pipeline: FittedPipeline,
    train_rows: usize,
    test_rows: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::MemoryTracker;
    use std::path::Path;
    use tempfile::TempDir;

    const TRAIN_CSV: &str = "mpg,cyl,disp,hp,wt,acc,yr,origin,car_type,name\n\
                             18,8,307,130,3504,12,70,1,0,chevrolet chevelle malibu\n\
                             15,8,350,165,3693,11.5,70,1,0,buick skylark 320\n";
    const TEST_CSV: &str = "mpg,cyl,disp,hp,wt,acc,yr,origin,car_type,name\n\
                            18,8,318,150,3436,11,70,1,0,plymouth satellite\n";

    fn workspace(train: &str, test: &str) -> (TempDir, TrainConfig) {
        let dir = TempDir::new().unwrap();
        let write = |sub: &str, name: &str, body: &str| {
            let path = dir.path().join(sub);
            fs::create_dir_all(&path).unwrap();
            fs::write(path.join(name), body).unwrap();
        };
        write("train", "train.csv", train);
        write("test", "test.csv", test);

        let mut config = TrainConfig::new(
            dir.path().join("train"),
            dir.path().join("test"),
            "car-mpg",
        );
        config.output_dir = dir.path().join("outputs");
        (dir, config)
    }

    #[test]
    fn test_run_records_everything() {
        let (_dir, config) = workspace(TRAIN_CSV, TEST_CSV);
        let mut tracker = MemoryTracker::new();

        let report = Trainer::new(config).unwrap().run(&mut tracker).unwrap();

        assert_eq!(report.run.status(), RunStatus::Finished);
        assert_eq!((report.train_rows, report.test_rows), (2, 1));
        assert!(report.score.is_finite());
        assert_eq!(report.model_version.version(), 1);

        let run_id = report.run.run_id();
        assert_eq!(tracker.metrics_for_run(run_id, SCORE_METRIC).len(), 1);
        assert!(tracker.artifact_bytes(run_id, PREDICTIONS_FILE).is_some());
        assert!(tracker
            .artifact_bytes(run_id, "gbr-car-mpg-predictor/model.json")
            .is_some());

        let csv = fs::read_to_string(&report.predictions_path).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.starts_with("Actual,Predicted"));
    }

    #[test]
    fn test_failure_ends_run_failed() {
        let (dir, config) = workspace(TRAIN_CSV, TEST_CSV);
        fs::remove_file(dir.path().join("test").join("test.csv")).unwrap();
        let mut tracker = MemoryTracker::new();

        let err = Trainer::new(config).unwrap().run(&mut tracker).unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound(_)));
        assert!(err.to_string().contains("load test data"));
        let runs = tracker.runs_for_experiment("Default");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status(), RunStatus::Failed);
        assert!(tracker.model_versions("car-mpg").is_empty());
    }

    #[test]
    fn test_missing_target_fails_before_fit() {
        let (_dir, config) = workspace(
            "cyl,disp,hp,wt,acc,yr,origin,car_type\n8,307,130,3504,12,70,1,0\n",
            TEST_CSV,
        );
        let mut tracker = MemoryTracker::new();

        let result = Trainer::new(config).unwrap().run(&mut tracker);
        assert!(matches!(result, Err(Error::SchemaMismatch(_))));
        assert_eq!(tracker.metric_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = TrainConfig::new(Path::new("a"), Path::new("b"), "car-mpg");
        config.n_estimators = 0;
        assert!(matches!(Trainer::new(config), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_nan_feature_fails_run() {
        let (dir, config) = workspace(
            "mpg,cyl,disp,hp,wt,acc,yr,origin,car_type,name\n\
             18,8,307,NaN,3504,12,70,1,0,chevrolet chevelle malibu\n\
             15,8,350,165,3693,11.5,70,1,0,buick skylark 320\n",
            TEST_CSV,
        );
        let mut tracker = MemoryTracker::new();

        let err = Trainer::new(config).unwrap().run(&mut tracker).unwrap_err();

        assert!(matches!(err, Error::MalformedInput(_)));
        assert!(err.to_string().contains("hp"));
        let runs = tracker.runs_for_experiment("Default");
        assert_eq!(runs[0].status(), RunStatus::Failed);
        assert_eq!(tracker.metric_count(), 0);
        assert!(tracker.model_versions("car-mpg").is_empty());
        assert!(!dir.path().join("outputs").join(PREDICTIONS_FILE).exists());
    }

    #[test]
    fn test_different_column_sets_rejected_before_fit() {
        let (dir, config) = workspace(
            TRAIN_CSV,
            "mpg,cyl,disp,hp,wt,acc,yr,origin,car_type,weight_kg\n\
             18,8,318,150,3436,11,70,1,0,1558\n",
        );
        let mut tracker = MemoryTracker::new();

        let err = Trainer::new(config).unwrap().run(&mut tracker).unwrap_err();

        assert!(matches!(err, Error::SchemaMismatch(_)));
        let msg = err.to_string();
        assert!(msg.contains("check schemas"));
        assert!(msg.contains("weight_kg"));
        assert_eq!(tracker.metric_count(), 0);
        assert!(!dir.path().join("outputs").join(PREDICTIONS_FILE).exists());
    }

    #[test]
    fn test_test_split_missing_feature_rejected_before_fit() {
        let (_dir, config) = workspace(
            TRAIN_CSV,
            "mpg,cyl,disp,hp,acc,yr,origin,car_type,name\n\
             18,8,318,150,11,70,1,0,plymouth satellite\n",
        );
        let mut tracker = MemoryTracker::new();

        let err = Trainer::new(config).unwrap().run(&mut tracker).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
        assert!(err.to_string().contains("test data"));
        assert_eq!(tracker.metric_count(), 0);
    }

    #[test]
    fn test_unsafe_model_name_rejected_before_run() {
        let config = TrainConfig::new(Path::new("a"), Path::new("b"), "Car MPG");
        assert!(matches!(Trainer::new(config), Err(Error::InvalidInput(_))));
    }
}
