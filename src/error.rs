//! Error types for the MPG trainer
//!
//! Every failure is fatal for the run: errors propagate to the caller,
//! the tracking run is closed as failed, and nothing is retried.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trainer error types
#[derive(Error, Debug)]
pub enum Error {
    /// Input directory is missing, unreadable, or holds no data file
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Data file could not be parsed as a table
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Target or feature columns are absent or incompatible
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Tracking store rejected a run, metric, artifact or model operation
    #[error("Tracking service error: {0}")]
    TrackingServiceError(String),

    /// Invalid configuration or argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error (CSV decoding, casts, batch assembly)
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap a failure raised while talking to the tracking store.
    pub(crate) fn tracking(context: &str, err: impl std::fmt::Display) -> Self {
        Self::TrackingServiceError(format!("{context}: {err}"))
    }

    /// Prefix the message with the job step that failed, keeping the kind.
    ///
    /// `Io` and `Arrow` errors have no message of their own and become
    /// [`Error::Other`].
    #[must_use]
    pub fn in_step(self, step: &str) -> Self {
        match self {
            Self::ResourceNotFound(msg) => Self::ResourceNotFound(format!("{step}: {msg}")),
            Self::MalformedInput(msg) => Self::MalformedInput(format!("{step}: {msg}")),
            Self::SchemaMismatch(msg) => Self::SchemaMismatch(format!("{step}: {msg}")),
            Self::TrackingServiceError(msg) => {
                Self::TrackingServiceError(format!("{step}: {msg}"))
            }
            Self::InvalidInput(msg) => Self::InvalidInput(format!("{step}: {msg}")),
            Self::Other(msg) => Self::Other(format!("{step}: {msg}")),
            other @ (Self::Io(_) | Self::Arrow(_)) => Self::Other(format!("{step}: {other}")),
        }
    }
}

/// Name the job step a fallible call belongs to.
pub(crate) trait StepContext<T> {
    fn step(self, step: &str) -> Result<T>;
}

impl<T> StepContext<T> for Result<T> {
    fn step(self, step: &str) -> Result<T> {
        self.map_err(|e| e.in_step(step))
    }
}
