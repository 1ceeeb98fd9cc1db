//! Experiment tracking
//!
//! Records each training job as a run, with its metrics, stored artifacts,
//! and versions of the models it registers.
//!
//! ## Schema Overview
//!
//! ```text
//! experiment (name) ──< RunRecord (N)
//!                            │
//!                            ├──< MetricRecord (N) [stepped per key]
//!                            ├──< ArtifactRecord (N) [content-hashed]
//!                            └──< ModelVersion (N) ──> registered name
//! ```
//!
//! Two backends implement [`Tracker`]: [`MemoryTracker`] and the on-disk
//! [`FileTracker`].
//!
//! ## Usage
//!
//! ```rust
//! use car_mpg_trainer::experiment::{ActiveRun, MemoryTracker, RunStatus};
//!
//! let mut tracker = MemoryTracker::new();
//! let mut run = ActiveRun::start(&mut tracker, "Default", serde_json::json!({})).unwrap();
//! run.log_metric("r2_score", 0.87).unwrap();
//! let record = run.finish(RunStatus::Finished).unwrap();
//! assert_eq!(record.status(), RunStatus::Finished);
//! ```

mod file_store;
mod records;
mod store;
mod tracker;

pub use file_store::FileTracker;
pub use records::{ArtifactRecord, MetricRecord, ModelVersion, RunRecord, RunStatus};
pub use store::MemoryTracker;
pub use tracker::{
    content_hash, run_id, validate_artifact_key, validate_name, ActiveRun, Tracker, MODEL_FILE,
};
