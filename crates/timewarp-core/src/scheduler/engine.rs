//! Scheduler engine.
//!
//! A single repeating tick loop drives all activity: each tick walks the
//! tasks in registration order, executes the ones whose curve-computed
//! interval has elapsed, and sleeps `min_interval` before the next pass.
//! Task callbacks are awaited one at a time, so executions within a tick
//! are strictly sequential and a callback never overlaps its own previous
//! invocation.
//!
//! The engine is ordinary application state with an explicit lifecycle:
//! create, register tasks (which starts the loop), pause/resume, stop.
//! There is no process-wide singleton.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

use super::history::HistoryLog;
use super::task::{Task, TaskCallback, TaskError, TaskOptions, TaskStatus};
use crate::error::{Result, SchedulerError};
use crate::events::Event;

/// Floor applied to every computed interval (ms). Also the tick cadence,
/// so the loop cannot busy-spin even under pathological curve outputs.
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 100;

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct EngineState {
    tasks: Vec<Task>,
    history: HistoryLog,
    is_running: bool,
    is_paused: bool,
    distortion_factor: f64,
    /// Bumped on every loop (re)start; a live loop exits as soon as the
    /// counter moves past its own generation, so ticks from a superseded
    /// loop can never interleave with the current one.
    loop_generation: u64,
}

/// Variable-interval task scheduler.
///
/// Cloning yields another handle to the same engine. All control-surface
/// methods are synchronous and take effect immediately on shared state;
/// [`Scheduler::register_task`] and [`Scheduler::resume`] must be called
/// inside a Tokio runtime because they may start the tick loop.
#[derive(Clone)]
pub struct Scheduler {
    state: Arc<Mutex<EngineState>>,
    events: broadcast::Sender<Event>,
    min_interval: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_min_interval(DEFAULT_MIN_INTERVAL_MS)
    }

    /// Engine with a custom interval floor / tick cadence (clamped to >= 1 ms).
    pub fn with_min_interval(min_interval_ms: u64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(EngineState {
                tasks: Vec::new(),
                history: HistoryLog::default(),
                is_running: false,
                is_paused: false,
                distortion_factor: 1.0,
                loop_generation: 0,
            })),
            events,
            min_interval: min_interval_ms.max(1),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.lock().is_running
    }

    pub fn is_paused(&self) -> bool {
        self.lock().is_paused
    }

    pub fn distortion_factor(&self) -> f64 {
        self.lock().distortion_factor
    }

    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval
    }

    pub fn task_status(&self, task_id: usize) -> Option<TaskStatus> {
        self.lock().tasks.iter().find(|t| t.id == task_id).map(|t| t.status)
    }

    /// Interval the task is currently scheduled on, sampled at the present
    /// moment: `max(min_interval, raw_curve * distortion_factor)`.
    pub fn next_interval(&self, task_id: usize) -> Result<f64> {
        let s = self.lock();
        let task = s
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .ok_or(SchedulerError::TaskNotFound(task_id))?;
        let elapsed = now_ms().saturating_sub(task.last_execution) as f64;
        let raw = task.raw_interval(elapsed)?;
        Ok(clamp_interval(raw, s.distortion_factor, self.min_interval))
    }

    /// Subscribe to the lifecycle event feed. Receivers observe events in
    /// emission order; a slow receiver lags without affecting the engine.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register a task. Returns the assigned id (dense, in registration
    /// order, never reused). Starts the tick loop if the engine is neither
    /// running nor paused.
    pub fn register_task<F, Fut>(&self, callback: F, options: TaskOptions) -> Result<usize>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        options.validate()?;
        let callback: TaskCallback = Arc::new(move || Box::pin(callback()));

        let (id, start, generation) = {
            let mut s = self.lock();
            let id = s.tasks.len();
            s.tasks.push(Task::new(id, callback, options, now_ms()));
            s.history.add_task(id);
            let start = !s.is_running && !s.is_paused;
            if start {
                s.is_running = true;
                s.loop_generation += 1;
            }
            (id, start, s.loop_generation)
        };

        debug!(task_id = id, "task registered");
        self.emit(Event::TaskAdded { task_id: id });
        if start {
            self.spawn_loop(generation);
        }
        Ok(id)
    }

    // ── Lifecycle control ────────────────────────────────────────────

    /// Stop scheduling future ticks. No-op if already paused; in-flight
    /// executions are not interrupted.
    pub fn pause(&self) {
        let paused = {
            let mut s = self.lock();
            if s.is_paused {
                false
            } else {
                s.is_paused = true;
                s.is_running = false;
                true
            }
        };
        if paused {
            self.emit(Event::Paused);
        }
    }

    /// Restart the tick loop after a pause. No-op if not paused.
    pub fn resume(&self) {
        let generation = {
            let mut s = self.lock();
            if !s.is_paused {
                None
            } else {
                s.is_paused = false;
                s.is_running = true;
                s.loop_generation += 1;
                Some(s.loop_generation)
            }
        };
        if let Some(generation) = generation {
            self.spawn_loop(generation);
            self.emit(Event::Resumed);
        }
    }

    /// Halt the loop unconditionally. The engine can be restarted by
    /// registering a new task or, after a pause, by resuming.
    pub fn stop(&self) {
        {
            let mut s = self.lock();
            s.is_running = false;
            s.is_paused = false;
        }
        self.emit(Event::Stopped);
    }

    /// Permanently remove a task from scheduling. Its history is kept.
    pub fn cancel_task(&self, task_id: usize) -> Result<()> {
        {
            let mut s = self.lock();
            let task = s
                .tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or(SchedulerError::TaskNotFound(task_id))?;
            task.status = TaskStatus::Cancelled;
        }
        self.emit(Event::TaskCancelled { task_id });
        Ok(())
    }

    /// Replace the global distortion multiplier with the factor produced by
    /// `factor_fn`. Takes effect on the next interval computation.
    pub fn apply_distortion<F>(&self, factor_fn: F) -> Result<()>
    where
        F: FnOnce() -> f64,
    {
        let factor = factor_fn();
        if !factor.is_finite() || factor <= 0.0 {
            return Err(SchedulerError::InvalidDistortion(factor));
        }
        self.lock().distortion_factor = factor;
        debug!(factor, "distortion factor replaced");
        self.emit(Event::DistortionChanged { factor });
        Ok(())
    }

    // ── Replay & history ─────────────────────────────────────────────

    /// Re-invoke the callback behind a recorded execution. The replay
    /// appends a fresh record at the current time; the record looked up by
    /// `execution_index` is untouched. A cancelled (or history-only,
    /// post-import) task passes validation and then skips silently.
    pub async fn rewind(&self, task_id: usize, execution_index: usize) -> Result<()> {
        let callback = {
            let s = self.lock();
            let entry = s
                .history
                .get(task_id)
                .ok_or(SchedulerError::TaskNotFound(task_id))?;
            if entry.executions.get(execution_index).is_none() {
                return Err(SchedulerError::ExecutionNotFound {
                    task_id,
                    index: execution_index,
                });
            }
            s.tasks
                .iter()
                .find(|t| t.id == task_id && t.status != TaskStatus::Cancelled)
                .map(|t| Arc::clone(&t.callback))
        };
        let Some(callback) = callback else {
            return Ok(());
        };

        match callback().await {
            Ok(()) => {
                self.lock().history.record(task_id, now_ms());
                self.emit(Event::TaskRewound {
                    task_id,
                    execution_index,
                });
            }
            Err(e) => {
                self.emit(Event::TaskFailed {
                    task_id,
                    error: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Deterministic JSON snapshot of the full history log.
    pub fn export_history(&self) -> Result<String, serde_json::Error> {
        self.lock().history.to_json()
    }

    /// Replace the whole history log with a previously exported snapshot.
    /// The snapshot is parsed in full before anything is replaced, so a
    /// malformed input leaves the prior history untouched. Task ids in the
    /// snapshot are not checked against registered tasks.
    pub fn import_history(&self, snapshot: &str) -> Result<()> {
        let imported = HistoryLog::from_json(snapshot)?;
        self.lock().history = imported;
        self.emit(Event::HistoryImported);
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap()
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine; delivery never gates scheduling.
        let _ = self.events.send(event);
    }

    fn spawn_loop(&self, generation: u64) {
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let min_interval = self.min_interval;
        tokio::spawn(run_loop(state, events, min_interval, generation));
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// `max(min_interval, raw * distortion)`. A NaN product still yields the
/// floor, so the tick cadence is bounded below no matter what a custom
/// curve returns.
fn clamp_interval(raw: f64, distortion: f64, min_interval_ms: u64) -> f64 {
    (min_interval_ms as f64).max(raw * distortion)
}

/// Outcome of inspecting one task slot under the lock.
enum TickStep {
    Skip,
    Run(usize, TaskCallback),
    Fail(usize, SchedulerError),
}

async fn run_loop(
    state: Arc<Mutex<EngineState>>,
    events: broadcast::Sender<Event>,
    min_interval: u64,
    generation: u64,
) {
    loop {
        // Gate, re-checked at the start of every tick.
        {
            let mut s = state.lock().unwrap();
            if s.loop_generation != generation {
                return;
            }
            if !s.is_running || s.is_paused || s.tasks.is_empty() {
                s.is_running = false;
                debug!("tick loop halting");
                return;
            }
            if s.tasks.iter().all(|t| t.status == TaskStatus::Cancelled) {
                s.is_running = false;
                drop(s);
                debug!("all tasks cancelled, tick loop halting");
                let _ = events.send(Event::Stopped);
                return;
            }
        }

        let now = now_ms();
        let mut index = 0;
        loop {
            // Inspect under the lock, await with the lock released: control
            // calls made while a callback runs stay visible to the rest of
            // this tick (a task cancelled mid-tick is skipped when reached).
            let step = {
                let mut s = state.lock().unwrap();
                if index >= s.tasks.len() {
                    break;
                }
                let distortion = s.distortion_factor;
                let task = &mut s.tasks[index];
                if task.status == TaskStatus::Cancelled {
                    TickStep::Skip
                } else {
                    let elapsed = now.saturating_sub(task.last_execution) as f64;
                    match task.raw_interval(elapsed) {
                        Ok(raw) => {
                            if elapsed >= clamp_interval(raw, distortion, min_interval) {
                                task.status = TaskStatus::Running;
                                TickStep::Run(task.id, Arc::clone(&task.callback))
                            } else {
                                TickStep::Skip
                            }
                        }
                        Err(e) => TickStep::Fail(task.id, e),
                    }
                }
            };

            match step {
                TickStep::Skip => {}
                TickStep::Run(task_id, callback) => {
                    let result = callback().await;
                    let mut s = state.lock().unwrap();
                    // Cancellation is terminal even when it landed while the
                    // callback was in flight.
                    if s.tasks[index].status == TaskStatus::Running {
                        s.tasks[index].status = TaskStatus::Pending;
                    }
                    match result {
                        Ok(()) => {
                            s.tasks[index].last_execution = now;
                            s.history.record(task_id, now);
                            drop(s);
                            let _ = events.send(Event::TaskExecuted { task_id, time: now });
                        }
                        Err(e) => {
                            drop(s);
                            let _ = events.send(Event::TaskFailed {
                                task_id,
                                error: e.to_string(),
                            });
                        }
                    }
                }
                TickStep::Fail(task_id, e) => {
                    let _ = events.send(Event::TaskFailed {
                        task_id,
                        error: e.to_string(),
                    });
                }
            }
            index += 1;
        }

        tokio::time::sleep(Duration::from_millis(min_interval)).await;
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::curve::{Curve, CurveFn};
    use proptest::prelude::*;

    fn noop() -> impl Fn() -> std::future::Ready<Result<(), TaskError>> + Send + Sync + 'static {
        || std::future::ready(Ok(()))
    }

    #[tokio::test]
    async fn linear_task_interval_matches_amplitude_times_scale() {
        let scheduler = Scheduler::new();
        let id = scheduler
            .register_task(noop(), TaskOptions {
                curve: Curve::Linear,
                duration: 1000.0,
                amplitude: 100.0,
                scale: 1.0,
                custom_curve: None,
            })
            .unwrap();
        assert_eq!(scheduler.next_interval(id).unwrap(), 100.0);
    }

    #[tokio::test]
    async fn sinusoidal_interval_doubles_under_distortion() {
        let scheduler = Scheduler::new();
        let id = scheduler
            .register_task(noop(), TaskOptions {
                curve: Curve::Sinusoidal,
                duration: 10_000.0,
                amplitude: 1000.0,
                scale: 1.0,
                custom_curve: None,
            })
            .unwrap();
        scheduler.apply_distortion(|| 2.0).unwrap();
        // Just after registration the curve sits at its 0.5 base: raw 500,
        // distorted 1000, floor 100.
        let interval = scheduler.next_interval(id).unwrap();
        assert!((interval - 1000.0).abs() < 5.0, "interval was {interval}");
    }

    #[tokio::test]
    async fn negative_custom_curve_output_is_floored() {
        let scheduler = Scheduler::new();
        let curve: CurveFn = Arc::new(|_, _, _, _| -500.0);
        let id = scheduler
            .register_task(noop(), TaskOptions {
                curve: Curve::Custom,
                custom_curve: Some(curve),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(scheduler.next_interval(id).unwrap(), DEFAULT_MIN_INTERVAL_MS as f64);
    }

    #[tokio::test]
    async fn rejected_registration_leaves_no_trace() {
        let scheduler = Scheduler::new();
        let err = scheduler
            .register_task(noop(), TaskOptions {
                amplitude: -1.0,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidOption { field: "amplitude" }));
        assert!(scheduler.task_status(0).is_none());
        assert_eq!(scheduler.export_history().unwrap(), "[]");
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn ids_are_dense_and_sequential() {
        let scheduler = Scheduler::new();
        for expected in 0..3 {
            let id = scheduler.register_task(noop(), TaskOptions::default()).unwrap();
            assert_eq!(id, expected);
        }
    }

    #[tokio::test]
    async fn invalid_distortion_leaves_factor_unchanged() {
        let scheduler = Scheduler::new();
        for bad in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            let err = scheduler.apply_distortion(|| bad).unwrap_err();
            assert!(matches!(err, SchedulerError::InvalidDistortion(_)));
            assert_eq!(scheduler.distortion_factor(), 1.0);
        }
        scheduler.apply_distortion(|| 0.5).unwrap();
        assert_eq!(scheduler.distortion_factor(), 0.5);
    }

    #[tokio::test]
    async fn cancel_unknown_task_errors() {
        let scheduler = Scheduler::new();
        assert!(matches!(
            scheduler.cancel_task(9).unwrap_err(),
            SchedulerError::TaskNotFound(9)
        ));
    }

    #[tokio::test]
    async fn cancellation_is_permanent() {
        let scheduler = Scheduler::new();
        let id = scheduler.register_task(noop(), TaskOptions::default()).unwrap();
        scheduler.cancel_task(id).unwrap();
        assert_eq!(scheduler.task_status(id), Some(TaskStatus::Cancelled));
        // A second cancel is not an error and changes nothing.
        scheduler.cancel_task(id).unwrap();
        assert_eq!(scheduler.task_status(id), Some(TaskStatus::Cancelled));
    }

    #[tokio::test]
    async fn rewind_with_no_recorded_executions_errors() {
        let scheduler = Scheduler::new();
        let id = scheduler.register_task(noop(), TaskOptions::default()).unwrap();
        let err = scheduler.rewind(id, 0).await.unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::ExecutionNotFound { task_id: 0, index: 0 }
        ));
    }

    #[tokio::test]
    async fn rewind_unknown_task_errors() {
        let scheduler = Scheduler::new();
        let err = scheduler.rewind(42, 0).await.unwrap_err();
        assert!(matches!(err, SchedulerError::TaskNotFound(42)));
    }

    #[tokio::test]
    async fn import_rejects_malformed_snapshot_atomically() {
        let scheduler = Scheduler::new();
        scheduler
            .import_history(r#"[{"id":0,"executions":[{"time":5}]}]"#)
            .unwrap();
        let before = scheduler.export_history().unwrap();

        let err = scheduler.import_history("{broken").unwrap_err();
        assert!(matches!(err, SchedulerError::HistoryImport(_)));
        assert_eq!(scheduler.export_history().unwrap(), before);
    }

    #[test]
    fn min_interval_is_clamped_to_one() {
        let scheduler = Scheduler::with_min_interval(0);
        assert_eq!(scheduler.min_interval_ms(), 1);
    }

    proptest! {
        #[test]
        fn clamped_interval_never_drops_below_floor(
            raw in prop::num::f64::ANY,
            distortion in 0.0001f64..1000.0,
        ) {
            let interval = clamp_interval(raw, distortion, DEFAULT_MIN_INTERVAL_MS);
            prop_assert!(interval >= DEFAULT_MIN_INTERVAL_MS as f64);
        }
    }
}
