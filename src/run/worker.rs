//! Background worker that steps the solver
//!
//! Each iteration takes the shared lock for exactly one `step()` plus the
//! progress write, then sleeps briefly so the monitor can get in.
//! Cancellation is cooperative: the token is checked at every iteration
//! boundary, never in the middle of a step.

use crate::config::RunConfig;
use crate::errors::{Result, StepError, SupervisorError};
use crate::progress::{ProgressEstimator, ProgressSample, RunState};
use crate::run::shared::SharedState;
use crate::solver::StepOutcome;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cooperative stop flag, safe to trip from any thread any number of times
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a worker left its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The solver reported `Done`
    Completed,
    /// The cancel token was tripped
    Cancelled,
}

/// What a worker thread hands back when it exits
#[derive(Debug)]
pub struct WorkerExit {
    pub outcome: std::result::Result<WorkerOutcome, StepError>,
    /// Estimator state to seed the next worker on resume
    pub run_state: RunState,
    pub steps: u64,
}

/// Result of a single loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Done,
}

/// Solver stepping loop
pub struct WorkerLoop {
    shared: SharedState,
    estimator: ProgressEstimator,
    cancel: CancelToken,
    progress_interval: u64,
    yield_interval: Duration,
    steps: u64,
}

impl WorkerLoop {
    /// Create a worker, continuing from `run_state`
    pub fn new(shared: SharedState, config: &RunConfig, run_state: RunState) -> Self {
        Self {
            shared,
            estimator: ProgressEstimator::resume(config.termination.clone(), run_state),
            cancel: CancelToken::new(),
            progress_interval: u64::from(config.worker.progress_interval.max(1)),
            yield_interval: config.worker.yield_interval(),
            steps: 0,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn run_state(&self) -> &RunState {
        self.estimator.state()
    }

    /// Request a stop at the next iteration boundary
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// One step under the lock, refreshing progress every Nth iteration.
    pub fn tick(&mut self) -> std::result::Result<Tick, StepError> {
        self.steps += 1;
        let mut state = self.shared.lock();

        match state.solver.step() {
            Ok(StepOutcome::Done) => {
                self.estimator.finish();
                state.mark_done();
                Ok(Tick::Done)
            }
            Ok(StepOutcome::Continue) => {
                if self.steps % self.progress_interval == 0 {
                    let sample = ProgressSample {
                        current_time: state.solver.current_time(),
                        termination_error: state.solver.termination_error(),
                    };
                    let progress = self.estimator.update(sample);
                    state.publish_progress(progress);
                }
                Ok(Tick::Continue)
            }
            Err(err) => {
                state.failure = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Step until done, cancelled, or failed.
    pub fn run(mut self) -> WorkerExit {
        let outcome = loop {
            if self.cancel.is_cancelled() {
                break Ok(WorkerOutcome::Cancelled);
            }

            match self.tick() {
                Ok(Tick::Done) => break Ok(WorkerOutcome::Completed),
                Ok(Tick::Continue) => {}
                Err(err) => break Err(err),
            }

            thread::sleep(self.yield_interval);
        };

        match &outcome {
            Ok(outcome) => info!(?outcome, steps = self.steps, progress = self.estimator.progress(), "worker exited"),
            Err(err) => warn!(%err, steps = self.steps, "worker stopped on solver failure"),
        }

        WorkerExit {
            outcome,
            run_state: self.estimator.into_state(),
            steps: self.steps,
        }
    }

    /// Run on a dedicated, named thread. `active` is raised now and
    /// lowered when the thread ends.
    pub fn spawn(self, active: Arc<AtomicBool>) -> Result<WorkerHandle> {
        let cancel = self.cancel.clone();
        active.store(true, Ordering::SeqCst);
        let guard = ActiveGuard(active.clone());

        let thread = thread::Builder::new()
            .name("stepwatch-worker".to_string())
            .spawn(move || {
                let _guard = guard;
                self.run()
            });

        let thread = match thread {
            Ok(thread) => thread,
            Err(err) => {
                active.store(false, Ordering::SeqCst);
                return Err(err.into());
            }
        };

        debug!("worker thread spawned");
        Ok(WorkerHandle {
            cancel,
            active,
            thread,
        })
    }
}

/// Clears the active flag when the worker thread ends, unwinding included
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owner-side handle of a running worker thread
pub struct WorkerHandle {
    cancel: CancelToken,
    active: Arc<AtomicBool>,
    thread: JoinHandle<WorkerExit>,
}

impl WorkerHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// True until the worker thread has left its loop
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Flag the monitor polls to decide whether to keep scheduling itself
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        self.active.clone()
    }

    /// Wait for the worker to exit. Blocks for at most one in-flight step
    /// after `stop()`.
    pub fn join(self) -> Result<WorkerExit> {
        self.thread
            .join()
            .map_err(|payload| SupervisorError::WorkerPanicked(panic_message(payload.as_ref())))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
