//! State shared between the worker and the status monitor
//!
//! One mutex guards the solver together with the published progress, so a
//! reader always sees a step and its progress value as a unit.

use crate::errors::StepError;
use crate::progress::estimator::monotone;
use crate::solver::BoxedSolver;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Fields guarded by the shared lock
pub struct SolverState {
    pub solver: BoxedSolver,
    /// Published progress in [0, 1], non-decreasing within a run
    pub progress: f64,
    pub done: bool,
    pub failure: Option<StepError>,
}

impl SolverState {
    /// Publish a new progress value; regressions are ignored.
    pub fn publish_progress(&mut self, value: f64) {
        self.progress = monotone(self.progress, value);
    }

    /// Clear per-run outcome before a retained solver is stepped again.
    pub fn begin_run(&mut self) {
        self.progress = 0.0;
        self.done = false;
        self.failure = None;
    }

    /// Record completion. Progress becomes exactly 1.0.
    pub fn mark_done(&mut self) {
        self.done = true;
        self.progress = 1.0;
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            time: self.solver.time_vector().to_vec(),
            series: self.solver.diagnostic_series().to_vec(),
            current_time: self.solver.current_time(),
            termination_error: self.solver.termination_error(),
        }
    }
}

/// Copy of the solver's time-series diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub time: Vec<f64>,
    pub series: Vec<f64>,
    pub current_time: f64,
    pub termination_error: f64,
}

/// Point-in-time view handed to renderers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub progress: f64,
    pub done: bool,
    /// Whether a worker was stepping when the snapshot was taken
    pub worker_active: bool,
    pub failure: Option<String>,
    pub diagnostics: Diagnostics,
}

impl StatusSnapshot {
    /// Format as human-readable string
    pub fn format(&self) -> String {
        format!(
            "Progress: {:.1}% | t = {:.4e} | err = {:.3e}{}{}",
            self.progress * 100.0,
            self.diagnostics.current_time,
            self.diagnostics.termination_error,
            if self.done { " [DONE]" } else { "" },
            if self.failure.is_some() { " [FAILED]" } else { "" },
        )
    }
}

/// Cloneable handle to the lock-guarded solver state
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<Mutex<SolverState>>,
}

impl SharedState {
    pub fn new(solver: BoxedSolver) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SolverState {
                solver,
                progress: 0.0,
                done: false,
                failure: None,
            })),
        }
    }

    /// Acquire the shared lock. A panic inside `step()` poisons the mutex;
    /// the data is still consistent per step, so the guard is recovered.
    pub fn lock(&self) -> MutexGuard<'_, SolverState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy out everything a renderer needs, holding the lock only for the copy.
    pub fn snapshot(&self, worker_active: bool) -> StatusSnapshot {
        let state = self.lock();
        StatusSnapshot {
            progress: state.progress,
            done: state.done,
            worker_active,
            failure: state.failure.as_ref().map(|e| e.to_string()),
            diagnostics: state.diagnostics(),
        }
    }

    pub fn progress(&self) -> f64 {
        self.lock().progress
    }

    pub fn is_done(&self) -> bool {
        self.lock().done
    }

    pub fn failure(&self) -> Option<StepError> {
        self.lock().failure.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{Solver, StepOutcome};

    struct Fixed {
        time: Vec<f64>,
    }

    impl Solver for Fixed {
        fn step(&mut self) -> Result<StepOutcome, StepError> {
            Ok(StepOutcome::Continue)
        }
        fn time_vector(&self) -> &[f64] {
            &self.time
        }
        fn termination_error(&self) -> f64 {
            0.5
        }
        fn diagnostic_series(&self) -> &[f64] {
            &self.time
        }
    }

    fn shared() -> SharedState {
        SharedState::new(Box::new(Fixed {
            time: vec![0.0, 1.0, 2.0],
        }))
    }

    #[test]
    fn test_publish_never_regresses() {
        let state = shared();
        {
            let mut guard = state.lock();
            guard.publish_progress(0.6);
            guard.publish_progress(0.3);
            guard.publish_progress(f64::NAN);
        }
        assert_eq!(state.progress(), 0.6);
    }

    #[test]
    fn test_mark_done_forces_one() {
        let state = shared();
        state.lock().publish_progress(0.42);
        state.lock().mark_done();
        assert!(state.is_done());
        assert_eq!(state.progress(), 1.0);
    }

    #[test]
    fn test_begin_run_clears_outcome() {
        let state = shared();
        {
            let mut guard = state.lock();
            guard.mark_done();
            guard.failure = Some(StepError::new("late failure", 2.0));
            guard.begin_run();
        }
        assert_eq!(state.progress(), 0.0);
        assert!(!state.is_done());
        assert_eq!(state.failure(), None);
        assert_eq!(state.lock().solver.current_time(), 2.0);
    }

    #[test]
    fn test_snapshot_copies_diagnostics() {
        let state = shared();
        let snap = state.snapshot(true);
        assert!(snap.worker_active);
        assert_eq!(snap.diagnostics.time, vec![0.0, 1.0, 2.0]);
        assert_eq!(snap.diagnostics.current_time, 2.0);
        assert_eq!(snap.diagnostics.termination_error, 0.5);
        assert!(snap.format().contains("Progress: 0.0%"));
    }
}
