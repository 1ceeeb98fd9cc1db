//! In-memory tracking store
//!
//! Keeps everything in process memory; nothing survives the process. Used
//! by tests and by library callers that only need the records.

use std::collections::HashMap;

use chrono::Utc;

use super::tracker::{content_hash, run_id, validate_name, Tracker};
use super::{ArtifactRecord, MetricRecord, ModelVersion, RunRecord, RunStatus};
use crate::{Error, Result};

/// In-memory [`Tracker`].
///
/// Runs are keyed by ID; metrics are kept in arrival order and sorted by
/// step on query; artifacts keep their bytes; registered models keep every
/// version in registration order.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    runs: HashMap<String, RunRecord>,
    metrics: Vec<MetricRecord>,
    artifacts: HashMap<(String, String), (ArtifactRecord, Vec<u8>)>,
    models: HashMap<String, Vec<ModelVersion>>,
    next_seq: u64,
}

impl MemoryTracker {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty() && self.metrics.is_empty() && self.models.is_empty()
    }

    /// Number of runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Number of metric observations across all runs.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Get a run by ID.
    #[must_use]
    pub fn get_run(&self, run_id: &str) -> Option<&RunRecord> {
        self.runs.get(run_id)
    }

    /// All runs of an experiment, oldest first.
    #[must_use]
    pub fn runs_for_experiment(&self, experiment: &str) -> Vec<&RunRecord> {
        let mut runs: Vec<&RunRecord> = self
            .runs
            .values()
            .filter(|run| run.experiment() == experiment)
            .collect();
        runs.sort_by(|a, b| a.run_id().cmp(b.run_id()));
        runs
    }

    /// Metrics of one run and key, ordered by step.
    #[must_use]
    pub fn metrics_for_run(&self, run_id: &str, key: &str) -> Vec<MetricRecord> {
        let mut metrics: Vec<MetricRecord> = self
            .metrics
            .iter()
            .filter(|m| m.run_id() == run_id && m.key() == key)
            .cloned()
            .collect();
        metrics.sort_by_key(MetricRecord::step);
        metrics
    }

    /// All metrics of a run, in logging order.
    #[must_use]
    pub fn all_metrics_for_run(&self, run_id: &str) -> Vec<&MetricRecord> {
        self.metrics.iter().filter(|m| m.run_id() == run_id).collect()
    }

    /// Artifact records of a run, sorted by key.
    #[must_use]
    pub fn artifacts_for_run(&self, run_id: &str) -> Vec<&ArtifactRecord> {
        let mut records: Vec<&ArtifactRecord> = self
            .artifacts
            .iter()
            .filter(|((run, _), _)| run == run_id)
            .map(|(_, (record, _))| record)
            .collect();
        records.sort_by(|a, b| a.key().cmp(b.key()));
        records
    }

    /// Stored bytes of one artifact.
    #[must_use]
    pub fn artifact_bytes(&self, run_id: &str, key: &str) -> Option<&[u8]> {
        self.artifacts
            .get(&(run_id.to_string(), key.to_string()))
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// Every version of a registered model, oldest first.
    #[must_use]
    pub fn model_versions(&self, name: &str) -> &[ModelVersion] {
        self.models
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
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

impl Tracker for MemoryTracker {
    fn start_run(&mut self, experiment: &str, params: serde_json::Value) -> Result<RunRecord> {
        validate_name("experiment name", experiment)?;
        let id = run_id(Utc::now(), self.next_seq);
        self.next_seq += 1;

        let run = RunRecord::open(id, experiment, params);
        self.runs.insert(run.run_id().to_string(), run.clone());
        Ok(run)
    }

    fn log_metric(&mut self, metric: MetricRecord) -> Result<()> {
        self.open_run(metric.run_id())?;
        self.metrics.push(metric);
        Ok(())
    }

    fn log_artifact(&mut self, run_id: &str, key: &str, bytes: &[u8]) -> Result<ArtifactRecord> {
        self.open_run(run_id)?;
        let record = ArtifactRecord::new(run_id, key, content_hash(bytes), bytes.len() as u64);
        self.artifacts.insert(
            (run_id.to_string(), key.to_string()),
            (record.clone(), bytes.to_vec()),
        );
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

        let versions = self.models.entry(name.to_string()).or_default();
        let next = versions.last().map_or(1, |v| v.version() + 1);
        let version = ModelVersion::new(name, next, run_id, artifact_path);
        versions.push(version.clone());
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
        Ok(run.clone())
    }
}
