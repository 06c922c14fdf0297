//! Error types for the scheduler engine.
//!
//! Control-surface failures (registration, cancellation, distortion,
//! rewind lookup, history import) are returned synchronously and never
//! leave partial state behind. Failures raised by task callbacks are not
//! represented here at all -- they are caught inside the tick loop and
//! reported through the event feed.

use thiserror::Error;

/// Scheduler engine error.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Curve name not recognized (string boundary: CLI flags, config files).
    #[error(
        "unsupported curve type: {curve}. Use linear, sinusoidal, exponential, logarithmic, or custom"
    )]
    UnsupportedCurve { curve: String },

    /// A task option failed validation.
    #[error("{field} must be a positive finite number")]
    InvalidOption { field: &'static str },

    /// A custom-curve task was evaluated without a curve function.
    #[error("a customCurve function is required for the custom curve")]
    MissingCustomCurve,

    /// No task (or history entry) with the given id.
    #[error("no task found with id {0}")]
    TaskNotFound(usize),

    /// Replay index out of range for the task's recorded executions.
    #[error("no execution found at index {index} for task {task_id}")]
    ExecutionNotFound { task_id: usize, index: usize },

    /// Distortion factor was not a positive finite number.
    #[error("distortion factor must be a positive number, got {0}")]
    InvalidDistortion(f64),

    /// History snapshot failed to parse; prior history is left untouched.
    #[error("failed to import history: {0}")]
    HistoryImport(#[from] serde_json::Error),
}

/// Result type alias for SchedulerError.
pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;
