use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::curve::{Curve, CurveFn};
use crate::error::{Result, SchedulerError};

/// Error type task callbacks may fail with. Callback failures never reach a
/// caller; the engine reports them through the event feed.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned by a task callback.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send>>;

/// The unit of work. Invoked once per due tick; the engine awaits the
/// returned future before moving to the next task in the same tick.
pub type TaskCallback = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    /// Terminal. A cancelled task is never scheduled again and never
    /// transitions back, but it keeps its execution history.
    Cancelled,
}

/// Options accepted at task registration.
#[derive(Clone)]
pub struct TaskOptions {
    pub curve: Curve,
    /// Characteristic period / time constant of the curve (ms).
    pub duration: f64,
    /// Base magnitude of the computed interval (ms).
    pub amplitude: f64,
    /// Secondary multiplier, independent of curve shape.
    pub scale: f64,
    /// Evaluation function for [`Curve::Custom`] tasks.
    pub custom_curve: Option<CurveFn>,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            curve: Curve::Linear,
            duration: 60_000.0,
            amplitude: 1000.0,
            scale: 1.0,
            custom_curve: None,
        }
    }
}

impl TaskOptions {
    /// Validate every field before the engine mutates anything.
    pub(crate) fn validate(&self) -> Result<()> {
        debug!(curve = %self.curve, "validating task options");
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(SchedulerError::InvalidOption { field: "duration" });
        }
        if !self.amplitude.is_finite() || self.amplitude <= 0.0 {
            return Err(SchedulerError::InvalidOption { field: "amplitude" });
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(SchedulerError::InvalidOption { field: "scale" });
        }
        Ok(())
    }
}

/// A registered task.
///
/// Ids are dense and stable: the k-th registered task has id k, and ids are
/// never reused, not even after cancellation.
#[derive(Clone)]
pub struct Task {
    pub id: usize,
    pub(crate) callback: TaskCallback,
    pub curve: Curve,
    pub duration: f64,
    pub amplitude: f64,
    pub scale: f64,
    pub(crate) custom_curve: Option<CurveFn>,
    /// Tick-sampled time of the last execution (registration time if the
    /// task has never run), ms since epoch.
    pub last_execution: u64,
    pub status: TaskStatus,
}

impl Task {
    pub(crate) fn new(id: usize, callback: TaskCallback, options: TaskOptions, now: u64) -> Self {
        Self {
            id,
            callback,
            curve: options.curve,
            duration: options.duration,
            amplitude: options.amplitude,
            scale: options.scale,
            custom_curve: options.custom_curve,
            last_execution: now,
            status: TaskStatus::Pending,
        }
    }

    /// Raw interval for this task given time elapsed since its last
    /// execution. Unclamped and undistorted.
    pub(crate) fn raw_interval(&self, elapsed: f64) -> Result<f64> {
        self.curve.evaluate(
            self.custom_curve.as_ref(),
            elapsed,
            self.duration,
            self.amplitude,
            self.scale,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_callback() -> TaskCallback {
        Arc::new(|| Box::pin(async { Ok(()) }))
    }

    #[test]
    fn default_options_are_valid() {
        assert!(TaskOptions::default().validate().is_ok());
    }

    #[test]
    fn rejects_each_nonpositive_field() {
        for (field, options) in [
            ("duration", TaskOptions { duration: 0.0, ..Default::default() }),
            ("duration", TaskOptions { duration: f64::NAN, ..Default::default() }),
            ("amplitude", TaskOptions { amplitude: -5.0, ..Default::default() }),
            ("amplitude", TaskOptions { amplitude: f64::INFINITY, ..Default::default() }),
            ("scale", TaskOptions { scale: 0.0, ..Default::default() }),
        ] {
            match options.validate().unwrap_err() {
                SchedulerError::InvalidOption { field: f } => assert_eq!(f, field),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn new_task_starts_pending_at_registration_time() {
        let task = Task::new(0, noop_callback(), TaskOptions::default(), 1234);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.last_execution, 1234);
        assert_eq!(task.id, 0);
    }

    #[test]
    fn raw_interval_uses_task_fields() {
        let options = TaskOptions {
            curve: Curve::Linear,
            duration: 1000.0,
            amplitude: 100.0,
            scale: 3.0,
            custom_curve: None,
        };
        let task = Task::new(0, noop_callback(), options, 0);
        assert_eq!(task.raw_interval(0.0).unwrap(), 300.0);
    }
}
