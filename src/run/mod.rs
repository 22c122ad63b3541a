//! Run supervision: worker thread, status monitor and lifecycle control
//!
//! One [`RunController`] owns at most one active run. A run owns the shared
//! solver state, the worker stepping it and the monitor sampling it.

pub mod controller;
pub mod lifecycle;
pub mod monitor;
pub mod shared;
pub mod sink;
pub mod worker;

pub use controller::{RunController, RunHandle, RunSummary};
pub use lifecycle::{LifecycleEvent, RunPhase};
pub use monitor::{MonitorHandle, StatusMonitor};
pub use shared::{Diagnostics, SharedState, SolverState, StatusSnapshot};
pub use sink::{CollectingSink, JsonLinesSink, LogSink, NullSink, StatusSink};
pub use worker::{CancelToken, Tick, WorkerExit, WorkerHandle, WorkerLoop, WorkerOutcome};
