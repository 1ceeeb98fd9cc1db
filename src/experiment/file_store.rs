//! Filesystem tracking store
//!
//! ## Layout
//!
//! ```text
//! <root>/
//! ├── <experiment>/
//! │   └── <run_id>/
//! │       ├── run.json          RunRecord, rewritten when the run ends
//! │       ├── metrics.jsonl     one MetricRecord per line
//! │       ├── artifacts.jsonl   one ArtifactRecord per line
//! │       └── artifacts/<key>   stored artifact content
//! └── models/
//!     └── <name>/
//!         └── version-<n>.json  ModelVersion
//! ```
//!
//! Every filesystem failure surfaces as [`Error::TrackingServiceError`].

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::tracker::{content_hash, run_id, validate_name, Tracker};
use super::{ArtifactRecord, MetricRecord, ModelVersion, RunRecord, RunStatus};
use crate::{Error, Result};

const RUN_FILE: &str = "run.json";
const METRICS_FILE: &str = "metrics.jsonl";
const ARTIFACTS_INDEX: &str = "artifacts.jsonl";
const ARTIFACTS_DIR: &str = "artifacts";
const MODELS_DIR: &str = "models";

/// [`Tracker`] persisting to a local directory tree.
#[derive(Debug)]
pub struct FileTracker {
    root: PathBuf,
    runs: HashMap<String, RunRecord>,
    next_seq: u64,
}

impl FileTracker {
    /// Open (and create if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrackingServiceError`] if the root cannot be created.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| Error::tracking(&format!("cannot create {}", root.display()), e))?;
        Ok(Self {
            root,
            runs: HashMap::new(),
            next_seq: 0,
        })
    }

    /// Store root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one run
    #[must_use]
    pub fn run_dir(&self, experiment: &str, run_id: &str) -> PathBuf {
        self.root.join(experiment).join(run_id)
    }

    /// Path where an artifact of a run is stored
    #[must_use]
    pub fn artifact_path(&self, experiment: &str, run_id: &str, key: &str) -> PathBuf {
        let mut path = self.run_dir(experiment, run_id).join(ARTIFACTS_DIR);
        path.extend(key.split('/'));
        path
    }

    /// Read a run record back from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrackingServiceError`] if the record is missing or unreadable.
    pub fn load_run(&self, experiment: &str, run_id: &str) -> Result<RunRecord> {
        read_json(&self.run_dir(experiment, run_id).join(RUN_FILE))
    }

    /// IDs of every run stored under `experiment`, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrackingServiceError`] if the directory cannot be listed.
    pub fn list_runs(&self, experiment: &str) -> Result<Vec<String>> {
        let dir = self.root.join(experiment);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| Error::tracking("cannot list runs", e))? {
            let entry = entry.map_err(|e| Error::tracking("cannot list runs", e))?;
            if entry.path().join(RUN_FILE).is_file() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Read every metric of a run, in logging order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrackingServiceError`] if the metrics file is unreadable.
    pub fn load_metrics(&self, experiment: &str, run_id: &str) -> Result<Vec<MetricRecord>> {
        read_json_lines(&self.run_dir(experiment, run_id).join(METRICS_FILE))
    }

    /// Read every artifact record of a run, in logging order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrackingServiceError`] if the index is unreadable.
    pub fn load_artifacts(&self, experiment: &str, run_id: &str) -> Result<Vec<ArtifactRecord>> {
        read_json_lines(&self.run_dir(experiment, run_id).join(ARTIFACTS_INDEX))
    }

    /// Every registered version of `name`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrackingServiceError`] if the registry is unreadable.
    pub fn model_versions(&self, name: &str) -> Result<Vec<ModelVersion>> {
        let dir = self.root.join(MODELS_DIR).join(name);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut versions = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| Error::tracking("cannot list models", e))? {
            let path = entry
                .map_err(|e| Error::tracking("cannot list models", e))?
                .path();
            if path.extension().is_some_and(|ext| ext == "json") {
                versions.push(read_json::<ModelVersion>(&path)?);
            }
        }
        versions.sort_by_key(ModelVersion::version);
        Ok(versions)
    }

    fn open_run(&self, run_id: &str) -> Result<&RunRecord> {
        let run = self
            .runs
            .get(run_id)
            .ok_or_else(|| Error::TrackingServiceError(format!("unknown run '{run_id}'")))?;
        if run.status().is_terminal() {
            return Err(Error::TrackingServiceError(format!(
                "run '{run_id}' is already closed"
            )));
        }
        Ok(run)
    }
}

impl Tracker for FileTracker {
    fn start_run(&mut self, experiment: &str, params: serde_json::Value) -> Result<RunRecord> {
        validate_name("experiment name", experiment)?;

        // another process may share the root; skip IDs already on disk
        let (id, dir) = loop {
            let id = run_id(Utc::now(), self.next_seq);
            self.next_seq += 1;
            let dir = self.run_dir(experiment, &id);
            if !dir.exists() {
                break (id, dir);
            }
        };

        fs::create_dir_all(&dir).map_err(|e| Error::tracking("cannot create run", e))?;
        let run = RunRecord::open(id, experiment, params);
        write_json(&dir.join(RUN_FILE), &run)?;
        self.runs.insert(run.run_id().to_string(), run.clone());
        Ok(run)
    }

    fn log_metric(&mut self, metric: MetricRecord) -> Result<()> {
        let run = self.open_run(metric.run_id())?;
        let path = self.run_dir(run.experiment(), run.run_id()).join(METRICS_FILE);
        append_json_line(&path, &metric)
    }

    fn log_artifact(&mut self, run_id: &str, key: &str, bytes: &[u8]) -> Result<ArtifactRecord> {
        let run = self.open_run(run_id)?;
        let target = self.artifact_path(run.experiment(), run_id, key);
        let index = self.run_dir(run.experiment(), run_id).join(ARTIFACTS_INDEX);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::tracking("cannot create artifact directory", e))?;
        }
        fs::write(&target, bytes)
            .map_err(|e| Error::tracking(&format!("cannot store artifact '{key}'"), e))?;

        let record = ArtifactRecord::new(run_id, key, content_hash(bytes), bytes.len() as u64);
        append_json_line(&index, &record)?;
        Ok(record)
    }

    fn register_model(
        &mut self,
        name: &str,
        run_id: &str,
        artifact_path: &str,
    ) -> Result<ModelVersion> {
        validate_name("registered model name", name)?;
        if !self.runs.contains_key(run_id) {
            return Err(Error::TrackingServiceError(format!(
                "cannot register model from unknown run '{run_id}'"
            )));
        }

        let next = self
            .model_versions(name)?
            .last()
            .map_or(1, |v| v.version() + 1);
        let dir = self.root.join(MODELS_DIR).join(name);
        fs::create_dir_all(&dir).map_err(|e| Error::tracking("cannot create registry entry", e))?;

        let version = ModelVersion::new(name, next, run_id, artifact_path);
        write_json(&dir.join(format!("version-{next}.json")), &version)?;
        Ok(version)
    }

    fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<RunRecord> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::TrackingServiceError(format!("unknown run '{run_id}'")))?;
        if !run.close(status) {
            return Err(Error::TrackingServiceError(format!(
                "run '{run_id}' cannot move from {:?} to {status:?}",
                run.status()
            )));
        }

        let run = run.clone();
        write_json(
            &self.run_dir(run.experiment(), run_id).join(RUN_FILE),
            &run,
        )?;
        Ok(run)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| Error::tracking("failed to encode record", e))?;
    fs::write(path, bytes)
        .map_err(|e| Error::tracking(&format!("cannot write {}", path.display()), e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)
        .map_err(|e| Error::tracking(&format!("cannot read {}", path.display()), e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::tracking(&format!("corrupt record {}", path.display()), e))
}

fn append_json_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut line =
        serde_json::to_vec(value).map_err(|e| Error::tracking("failed to encode record", e))?;
    line.push(b'\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::tracking(&format!("cannot open {}", path.display()), e))?;
    file.write_all(&line)
        .map_err(|e| Error::tracking(&format!("cannot append to {}", path.display()), e))
}

fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path)
        .map_err(|e| Error::tracking(&format!("cannot read {}", path.display()), e))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|e| Error::tracking(&format!("corrupt line in {}", path.display()), e))
        })
        .collect()
}
