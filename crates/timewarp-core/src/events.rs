use serde::{Deserialize, Serialize};

/// Every lifecycle change in the engine produces an Event.
/// Subscribers receive them over a broadcast channel in emission order;
/// delivery never blocks the tick loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TaskAdded {
        task_id: usize,
    },
    TaskExecuted {
        task_id: usize,
        /// Tick-sampled time of the execution (ms since epoch).
        time: u64,
    },
    DistortionChanged {
        factor: f64,
    },
    TaskRewound {
        task_id: usize,
        execution_index: usize,
    },
    TaskCancelled {
        task_id: usize,
    },
    /// A task callback failed during a scheduled run or a rewind.
    /// Non-fatal: the task stays scheduled on subsequent ticks.
    TaskFailed {
        task_id: usize,
        error: String,
    },
    Paused,
    Resumed,
    Stopped,
    HistoryImported,
}
