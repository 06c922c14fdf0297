//! # TimeWarp Core Library
//!
//! Core engine for TimeWarp, a variable-interval task scheduler: registered
//! callbacks are invoked repeatedly at intervals that change over time
//! according to a configurable curve (linear, sinusoidal, exponential,
//! logarithmic, or user-supplied), uniformly scaled by a global distortion
//! multiplier. Consumers such as the CLI heartbeat demo are thin layers over
//! this crate.
//!
//! ## Architecture
//!
//! - **Scheduler Engine**: one repeating tick loop owns all scheduling.
//!   Callbacks are awaited sequentially within a tick; there is no parallel
//!   task execution.
//! - **Event Feed**: every lifecycle change is broadcast to subscribers,
//!   decoupled from scheduling decisions.
//! - **History**: each successful execution (including replays) is recorded
//!   per task and can be exported/imported as an opaque JSON snapshot.
//!
//! ## Key Components
//!
//! - [`Scheduler`]: engine handle — registration, control surface, replay
//! - [`Curve`]: interval curve variants plus the custom-function slot
//! - [`Event`]: broadcast lifecycle events
//! - [`HistoryLog`]: execution history with deterministic serialization

pub mod error;
pub mod events;
pub mod scheduler;

pub use error::SchedulerError;
pub use events::Event;
pub use scheduler::{
    Curve, CurveFn, ExecutionRecord, HistoryLog, Scheduler, TaskCallback, TaskError, TaskFuture,
    TaskHistory, TaskOptions, TaskStatus, DEFAULT_MIN_INTERVAL_MS,
};
