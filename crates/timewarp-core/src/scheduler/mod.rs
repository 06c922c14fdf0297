mod curve;
mod engine;
mod history;
mod task;

pub use curve::{Curve, CurveFn};
pub use engine::{Scheduler, DEFAULT_MIN_INTERVAL_MS};
pub use history::{ExecutionRecord, HistoryLog, TaskHistory};
pub use task::{TaskCallback, TaskError, TaskFuture, TaskOptions, TaskStatus};
