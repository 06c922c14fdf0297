//! Execution history.
//!
//! One [`TaskHistory`] per task, in registration order. Records are appended
//! in the order they are recorded, which for rewinds is not the order the
//! replayed executions originally happened. The engine never removes
//! records; the whole log is only ever replaced wholesale via import.

use serde::{Deserialize, Serialize};

/// A single recorded execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Tick-sampled execution time, ms since epoch.
    pub time: u64,
}

/// All recorded executions of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHistory {
    pub id: usize,
    pub executions: Vec<ExecutionRecord>,
}

/// Ordered history log for the whole engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLog {
    entries: Vec<TaskHistory>,
}

impl HistoryLog {
    /// Add an empty entry for a newly registered task.
    pub(crate) fn add_task(&mut self, id: usize) {
        self.entries.push(TaskHistory {
            id,
            executions: Vec::new(),
        });
    }

    /// Append an execution record for `id`. Unknown ids are ignored; that
    /// can only happen after an import replaced the log with foreign data.
    pub(crate) fn record(&mut self, id: usize, time: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|h| h.id == id) {
            entry.executions.push(ExecutionRecord { time });
        }
    }

    pub fn get(&self, id: usize) -> Option<&TaskHistory> {
        self.entries.iter().find(|h| h.id == id)
    }

    pub fn entries(&self) -> &[TaskHistory] {
        &self.entries
    }

    /// Deterministic snapshot: entries in insertion order, executions in
    /// recorded order, field order fixed by the struct declarations.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries = serde_json::from_str(json)?;
        Ok(Self { entries })
    }
}
