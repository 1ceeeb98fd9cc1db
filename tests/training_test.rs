//! End-to-end training job tests
//!
//! Runs the full job against the on-disk tracking store:
//! 1. Load train/test files from their directories
//! 2. Fit, score, predict
//! 3. Check the run, metric, artifacts, and registry on disk

use std::fs;
use std::path::Path;

use car_mpg_trainer::config::TrainConfig;
use car_mpg_trainer::data::{split_features_target, TARGET_COLUMN};
use car_mpg_trainer::experiment::{FileTracker, RunStatus};
use car_mpg_trainer::pipeline::FittedPipeline;
use car_mpg_trainer::storage::load_dataset_dir;
use car_mpg_trainer::trainer::{Trainer, MODEL_ARTIFACT_PATH, PREDICTIONS_FILE};
use car_mpg_trainer::Error;
use tempfile::TempDir;

const HEADER: &str = "mpg,cyl,disp,hp,wt,acc,yr,origin,car_type,name";

fn write_split(root: &Path, dir: &str, rows: &[&str]) {
    let path = root.join(dir);
    fs::create_dir_all(&path).unwrap();
    let mut body = String::from(HEADER);
    for row in rows {
        body.push('\n');
        body.push_str(row);
    }
    body.push('\n');
    fs::write(path.join(format!("{dir}.csv")), body).unwrap();
}

/// Two training rows, one test row
fn small_workspace() -> (TempDir, TrainConfig) {
    let dir = TempDir::new().unwrap();
    write_split(
        dir.path(),
        "train",
        &[
            "18,8,307,130,3504,12,70,1,0,chevrolet chevelle malibu",
            "15,8,350,165,3693,11.5,70,1,0,buick skylark 320",
        ],
    );
    write_split(
        dir.path(),
        "test",
        &["18,8,318,150,3436,11,70,1,0,plymouth satellite"],
    );

    let mut config = TrainConfig::new(
        dir.path().join("train"),
        dir.path().join("test"),
        "car-mpg-gbr",
    );
    config.output_dir = dir.path().join("outputs");
    (dir, config)
}

#[test]
fn test_small_dataset_end_to_end() {
    let (dir, config) = small_workspace();
    let mut tracker = FileTracker::open(dir.path().join("mlruns")).unwrap();

    let report = Trainer::new(config).unwrap().run(&mut tracker).unwrap();
    let run_id = report.run.run_id();

    // run closed as finished, on disk too
    let stored = tracker.load_run("Default", run_id).unwrap();
    assert_eq!(stored.status(), RunStatus::Finished);
    assert_eq!(stored.params()["n_estimators"], 100);

    // exactly one score metric
    let metrics = tracker.load_metrics("Default", run_id).unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].key(), "r2_score");
    assert!(metrics[0].value().is_finite());

    // predictions.csv: header plus one data row
    let csv = fs::read_to_string(&report.predictions_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "Actual,Predicted");
    let (actual, predicted) = lines[1].split_once(',').unwrap();
    assert!((actual.parse::<f64>().unwrap() - 18.0).abs() < 1e-9);
    let predicted: f64 = predicted.parse().unwrap();
    assert!((15.0..=18.0).contains(&predicted), "{predicted}");

    // artifacts copied into the run
    let stored_csv = tracker.artifact_path("Default", run_id, PREDICTIONS_FILE);
    assert_eq!(fs::read_to_string(stored_csv).unwrap(), csv);

    // one registered version pointing at the stored model
    let versions = tracker.model_versions("car-mpg-gbr").unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version(), 1);
    assert_eq!(versions[0].run_id(), run_id);
    assert_eq!(versions[0].artifact_path(), MODEL_ARTIFACT_PATH);
}

#[test]
fn test_stored_model_reproduces_predictions() {
    let (dir, config) = small_workspace();
    let test_dir = config.test_data.clone();
    let mut tracker = FileTracker::open(dir.path().join("mlruns")).unwrap();

    let report = Trainer::new(config).unwrap().run(&mut tracker).unwrap();

    let key = format!("{MODEL_ARTIFACT_PATH}/model.json");
    let payload =
        fs::read(tracker.artifact_path("Default", report.run.run_id(), &key)).unwrap();
    let restored = FittedPipeline::from_json(&payload).unwrap();
    assert_eq!(restored, report.pipeline);

    let (x_test, _) =
        split_features_target(&load_dataset_dir(test_dir).unwrap(), TARGET_COLUMN).unwrap();
    assert_eq!(
        restored.predict(&x_test).unwrap(),
        report.pipeline.predict(&x_test).unwrap()
    );
}

#[test]
fn test_two_runs_are_independent() {
    let (dir, config) = small_workspace();
    let mut tracker = FileTracker::open(dir.path().join("mlruns")).unwrap();
    let trainer = Trainer::new(config).unwrap();

    let first = trainer.run(&mut tracker).unwrap();
    let second = trainer.run(&mut tracker).unwrap();

    assert_ne!(first.run.run_id(), second.run.run_id());
    assert_eq!(tracker.list_runs("Default").unwrap().len(), 2);
    for report in [&first, &second] {
        let metrics = tracker.load_metrics("Default", report.run.run_id()).unwrap();
        assert_eq!(metrics.len(), 1);
    }
    // deterministic training
    assert_eq!(first.pipeline, second.pipeline);

    let versions = tracker.model_versions("car-mpg-gbr").unwrap();
    let numbers: Vec<u32> = versions.iter().map(|v| v.version()).collect();
    assert_eq!(numbers, vec![1, 2]);
}

#[test]
fn test_scaler_ignores_test_data() {
    let (dir, config) = small_workspace();
    let mut tracker = FileTracker::open(dir.path().join("mlruns")).unwrap();
    let trainer = Trainer::new(config).unwrap();
    let baseline = trainer.run(&mut tracker).unwrap();

    // replace the test split with very different cars
    fs::remove_file(dir.path().join("test").join("test.csv")).unwrap();
    write_split(
        dir.path(),
        "test",
        &[
            "31,4,98,65,2045,16.2,81,1,1,ford escort 4w",
            "44,4,97,52,2130,24.6,82,2,1,vw pickup",
        ],
    );
    let shifted = trainer.run(&mut tracker).unwrap();

    assert_eq!(shifted.test_rows, 2);
    assert_eq!(baseline.pipeline.scaler(), shifted.pipeline.scaler());
    assert_eq!(baseline.pipeline.model(), shifted.pipeline.model());
}

#[test]
fn test_empty_test_dir_marks_run_failed() {
    let (dir, config) = small_workspace();
    fs::remove_file(dir.path().join("test").join("test.csv")).unwrap();
    let mut tracker = FileTracker::open(dir.path().join("mlruns")).unwrap();

    let result = Trainer::new(config).unwrap().run(&mut tracker);
    assert!(matches!(result, Err(Error::ResourceNotFound(_))));

    let runs = tracker.list_runs("Default").unwrap();
    assert_eq!(runs.len(), 1);
    let stored = tracker.load_run("Default", &runs[0]).unwrap();
    assert_eq!(stored.status(), RunStatus::Failed);
    assert!(tracker.model_versions("car-mpg-gbr").unwrap().is_empty());
}

#[test]
fn test_missing_feature_column_is_schema_mismatch() {
    let dir = TempDir::new().unwrap();
    for split in ["train", "test"] {
        let path = dir.path().join(split);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("data.csv"), "mpg,cyl,disp\n18,8,307\n15,8,350\n").unwrap();
    }
    let mut config = TrainConfig::new(dir.path().join("train"), dir.path().join("test"), "m");
    config.output_dir = dir.path().join("outputs");
    let mut tracker = FileTracker::open(dir.path().join("mlruns")).unwrap();

    let result = Trainer::new(config).unwrap().run(&mut tracker);
    assert!(matches!(result, Err(Error::SchemaMismatch(_))));
}
