//! Tracking records: runs, metric points, artifacts, registered models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is open and accepts logging calls.
    Running,
    /// Run body completed.
    Finished,
    /// Run body returned an error or the handle was dropped while open.
    Failed,
}

impl RunStatus {
    /// Whether the run has been closed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One execution of the training job.
///
/// A run is created `Running` and closed exactly once with
/// [`RunRecord::close`]. Its `params` hold the configuration the job ran with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    run_id: String,
    experiment: String,
    status: RunStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    params: serde_json::Value,
}

impl RunRecord {
    /// Open a run now.
    #[must_use]
    pub fn open(
        run_id: impl Into<String>,
        experiment: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            experiment: experiment.into(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            params,
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the experiment the run belongs to.
    #[must_use]
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Get the current status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Get the end timestamp, once closed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Get the run parameters.
    #[must_use]
    pub const fn params(&self) -> &serde_json::Value {
        &self.params
    }

    /// Close the run with a terminal status.
    ///
    /// Returns `false` and leaves the record untouched if the run was
    /// already closed or `status` is not terminal.
    pub fn close(&mut self, status: RunStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.ended_at = Some(Utc::now());
        true
    }
}

/// A single metric observation.
///
/// `step` counts observations of the same key within a run, starting at 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    run_id: String,
    key: String,
    step: u64,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Record `value` for `key` at `step`, timestamped now.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, step: u64, value: f64) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            step,
            value,
            timestamp: Utc::now(),
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the metric key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the step.
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Get the value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Get the wall-clock time of the observation.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// A file stored against a run.
///
/// `key` is the relative path inside the run's artifact area, for example
/// `predictions.csv` or `gbr-car-mpg-predictor/model.json`. `cas_hash` has
/// the form `algorithm:hex_digest`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    run_id: String,
    key: String,
    cas_hash: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Describe stored content.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        key: impl Into<String>,
        cas_hash: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            cas_hash: cas_hash.into(),
            size_bytes,
            created_at: Utc::now(),
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the artifact key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the content hash.
    #[must_use]
    pub fn cas_hash(&self) -> &str {
        &self.cas_hash
    }

    /// Get the stored size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// A numbered version of a registered model.
///
/// Versions of one name start at 1 and grow by one per registration. Each
/// points at the run and artifact path holding the serialized model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelVersion {
    name: String,
    version: u32,
    run_id: String,
    artifact_path: String,
    created_at: DateTime<Utc>,
}

impl ModelVersion {
    /// Describe a new registry entry.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: u32,
        run_id: impl Into<String>,
        artifact_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            run_id: run_id.into(),
            artifact_path: artifact_path.into(),
            created_at: Utc::now(),
        }
    }

    /// Get the registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the version number.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Get the source run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the artifact path of the model inside the source run.
    #[must_use]
    pub fn artifact_path(&self) -> &str {
        &self.artifact_path
    }

    /// Get the registration timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
