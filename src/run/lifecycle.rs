//! Run lifecycle state machine
//!
//! Deterministic transition table for a supervised run:
//! - Only `Running` has a live worker
//! - `Paused` keeps the solver and estimator state for resumption
//! - `Stopped`, `Completed` and `Failed` end the run; `Start` begins a fresh one

use crate::errors::{Result, SupervisorError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Run phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunPhase {
    /// Nothing started yet
    Idle,
    /// A worker is stepping the solver
    Running,
    /// Worker stopped, solver retained
    Paused,
    /// Run terminated and discarded
    Stopped,
    /// Solver reported done (terminal)
    Completed,
    /// Solver step failed (terminal)
    Failed,
}

/// Events that drive phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Start,
    Pause,
    Resume,
    Stop,
    /// Worker exited after the solver reported done
    WorkerFinished,
    /// Worker exited on a step failure or panic
    WorkerFailed,
}

impl RunPhase {
    /// Check if the run has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Stopped | RunPhase::Completed | RunPhase::Failed)
    }

    /// Check if a worker should be alive in this phase
    pub fn has_worker(&self) -> bool {
        matches!(self, RunPhase::Running)
    }

    /// Attempt a phase transition
    ///
    /// Valid transitions:
    /// 1. Idle      → Running   (Start)
    /// 2. Running   → Paused    (Pause)
    /// 3. Paused    → Running   (Resume)
    /// 4. Running   → Stopped   (Stop)
    /// 5. Paused    → Stopped   (Stop)
    /// 6. Running   → Completed (WorkerFinished)
    /// 7. Running   → Failed    (WorkerFailed)
    /// 8. Stopped | Completed | Failed → Running (Start, fresh run)
    pub fn transition(&self, event: LifecycleEvent) -> Result<RunPhase> {
        use LifecycleEvent::*;
        use RunPhase::*;

        let next = match (self, event) {
            (Idle, Start) => Running,
            (Running, Pause) => Paused,
            (Paused, Resume) => Running,
            (Running, Stop) | (Paused, Stop) => Stopped,
            (Running, WorkerFinished) => Completed,
            (Running, WorkerFailed) => Failed,
            (Stopped, Start) | (Completed, Start) | (Failed, Start) => Running,

            (from, event) => {
                return Err(SupervisorError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                    reason: format!("No valid transition from {:?} on {:?}", from, event),
                });
            }
        };

        Ok(next)
    }

    /// Get all valid events from this phase
    pub fn valid_events(&self) -> Vec<LifecycleEvent> {
        use LifecycleEvent::*;
        use RunPhase::*;

        match self {
            Idle => vec![Start],
            Running => vec![Pause, Stop, WorkerFinished, WorkerFailed],
            Paused => vec![Resume, Stop],
            Stopped | Completed | Failed => vec![Start],
        }
    }

    /// Human-readable phase name
    pub fn display_name(&self) -> &'static str {
        match self {
            RunPhase::Idle => "Idle",
            RunPhase::Running => "Running",
            RunPhase::Paused => "Paused",
            RunPhase::Stopped => "Stopped",
            RunPhase::Completed => "Completed",
            RunPhase::Failed => "Failed",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
