//! Tracking client interface and the scoped run handle

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::{ArtifactRecord, MetricRecord, ModelVersion, RunRecord, RunStatus};
use crate::{Error, Result};

/// File name of the serialized model inside its artifact directory
pub const MODEL_FILE: &str = "model.json";

/// Experiment-tracking backend.
///
/// Stores runs, their metrics and artifacts, and a registry of named model
/// versions. Callers normally go through [`ActiveRun`], which guarantees
/// that every started run is ended.
pub trait Tracker {
    /// Open a new run under `experiment`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrackingServiceError`] if the run cannot be recorded.
    fn start_run(&mut self, experiment: &str, params: serde_json::Value) -> Result<RunRecord>;

    /// Append a metric observation to an open run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrackingServiceError`] if the run is unknown or closed.
    fn log_metric(&mut self, metric: MetricRecord) -> Result<()>;

    /// Store `bytes` under `key` in the run's artifact area.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrackingServiceError`] if the run is unknown or closed,
    /// or the content cannot be stored.
    fn log_artifact(&mut self, run_id: &str, key: &str, bytes: &[u8]) -> Result<ArtifactRecord>;

    /// Register the artifact at `artifact_path` of `run_id` as the next
    /// version of model `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrackingServiceError`] if the run is unknown or the
    /// registry cannot be updated.
    fn register_model(&mut self, name: &str, run_id: &str, artifact_path: &str)
        -> Result<ModelVersion>;

    /// Close a run with a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrackingServiceError`] if the run is unknown or
    /// already closed.
    fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<RunRecord>;
}

/// Content hash in `algorithm:hex_digest` form
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    format!("trueno:{:016x}", trueno::hash_bytes(bytes))
}

/// Run identifier from the start time and a per-store sequence number
#[must_use]
pub fn run_id(started: DateTime<Utc>, seq: u64) -> String {
    format!("{}-{seq:04}", started.format("%Y%m%dT%H%M%S%6f"))
}

/// Reject names that could escape the store layout.
///
/// Names are used as path components: they must be non-empty and may only
/// contain ASCII letters, digits, `-`, `_` and `.`, and must not be `.`
/// or `..`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] naming `what` and the offending value.
pub fn validate_name(what: &str, name: &str) -> Result<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
    if name.is_empty() || name == "." || name == ".." || !name.chars().all(allowed) {
        return Err(Error::InvalidInput(format!("invalid {what} '{name}'")));
    }
    Ok(())
}

/// Validate a `/`-separated artifact key; every segment must be a valid name.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for empty, absolute, or traversing keys.
pub fn validate_artifact_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidInput("empty artifact key".to_string()));
    }
    key.split('/')
        .try_for_each(|segment| validate_name("artifact key segment", segment))
}

/// Handle to an open run.
///
/// Obtained from [`ActiveRun::start`]; every logging call goes through it.
/// Close it with [`ActiveRun::finish`]. A handle dropped while still open,
/// including during unwinding, ends its run as [`RunStatus::Failed`].
pub struct ActiveRun<'t, T: Tracker + ?Sized> {
    tracker: &'t mut T,
    record: RunRecord,
    steps: HashMap<String, u64>,
    closed: bool,
}

impl<'t, T: Tracker + ?Sized> ActiveRun<'t, T> {
    /// Start a run on `tracker`.
    ///
    /// # Errors
    ///
    /// Propagates [`Tracker::start_run`] errors.
    pub fn start(
        tracker: &'t mut T,
        experiment: &str,
        params: serde_json::Value,
    ) -> Result<Self> {
        let record = tracker.start_run(experiment, params)?;
        debug!(run_id = record.run_id(), experiment, "run started");
        Ok(Self {
            tracker,
            record,
            steps: HashMap::new(),
            closed: false,
        })
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        self.record.run_id()
    }

    /// Get the run record as of start.
    #[must_use]
    pub const fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Log a metric; repeated keys get increasing steps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrackingServiceError`] for non-finite values or
    /// backend failures.
    pub fn log_metric(&mut self, key: &str, value: f64) -> Result<MetricRecord> {
        if !value.is_finite() {
            return Err(Error::TrackingServiceError(format!(
                "metric '{key}' has non-finite value {value}"
            )));
        }

        let step = self.steps.entry(key.to_string()).or_insert(0);
        let metric = MetricRecord::new(self.record.run_id(), key, *step, value);
        *step += 1;

        self.tracker.log_metric(metric.clone())?;
        debug!(run_id = self.record.run_id(), key, value, "metric logged");
        Ok(metric)
    }

    /// Copy a local file into the run's artifact area, keyed by file name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceNotFound`] if the file cannot be read, or
    /// backend errors.
    pub fn log_artifact<P: AsRef<Path>>(&mut self, path: P) -> Result<ArtifactRecord> {
        let path = path.as_ref();
        let key = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::InvalidInput(format!("artifact path {} has no file name", path.display()))
            })?
            .to_string();
        let bytes = std::fs::read(path).map_err(|e| {
            Error::ResourceNotFound(format!("artifact {}: {e}", path.display()))
        })?;
        self.log_artifact_bytes(&key, &bytes)
    }

    /// Store in-memory content under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a bad key, or backend errors.
    pub fn log_artifact_bytes(&mut self, key: &str, bytes: &[u8]) -> Result<ArtifactRecord> {
        validate_artifact_key(key)?;
        let artifact = self.tracker.log_artifact(self.record.run_id(), key, bytes)?;
        debug!(
            run_id = self.record.run_id(),
            key,
            size = artifact.size_bytes(),
            "artifact logged"
        );
        Ok(artifact)
    }

    /// Serialize `model` to `<artifact_path>/model.json` and register it as
    /// the next version of `registered_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrackingServiceError`] if serialization or
    /// registration fails.
    pub fn log_model<M: Serialize>(
        &mut self,
        model: &M,
        artifact_path: &str,
        registered_name: &str,
    ) -> Result<ModelVersion> {
        validate_name("registered model name", registered_name)?;
        let payload = serde_json::to_vec_pretty(model)
            .map_err(|e| Error::tracking("failed to serialize model", e))?;
        self.log_artifact_bytes(&format!("{artifact_path}/{MODEL_FILE}"), &payload)?;

        let version =
            self.tracker
                .register_model(registered_name, self.record.run_id(), artifact_path)?;
        debug!(
            name = version.name(),
            version = version.version(),
            "model registered"
        );
        Ok(version)
    }

    /// End the run with `status`.
    ///
    /// # Errors
    ///
    /// Propagates [`Tracker::end_run`] errors; the handle counts as closed
    /// either way.
    pub fn finish(mut self, status: RunStatus) -> Result<RunRecord> {
        self.closed = true;
        self.tracker.end_run(self.record.run_id(), status)
    }
}

impl<T: Tracker + ?Sized> Drop for ActiveRun<'_, T> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!(run_id = self.record.run_id(), "run dropped while open, marking failed");
        if let Err(e) = self.tracker.end_run(self.record.run_id(), RunStatus::Failed) {
            warn!(run_id = self.record.run_id(), error = %e, "failed to end run");
        }
    }
}
