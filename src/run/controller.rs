//! Run controller: start, pause, resume and stop over a worker and monitor
//!
//! All methods take `&self`, so one controller can be shared between a UI
//! thread and a signal handler. The controller's own bookkeeping mutex is
//! separate from the shared solver lock and is never taken by the worker.

use crate::config::RunConfig;
use crate::errors::{Result, StepError, SupervisorError};
use crate::progress::RunState;
use crate::run::lifecycle::{LifecycleEvent, RunPhase};
use crate::run::monitor::{MonitorHandle, StatusMonitor};
use crate::run::shared::{SharedState, StatusSnapshot};
use crate::run::sink::{NullSink, StatusSink};
use crate::run::worker::{WorkerExit, WorkerHandle, WorkerLoop, WorkerOutcome};
use crate::solver::SolverFactory;
use crate::telemetry::{RunEvent, TelemetryCollector};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Cheap, cloneable read handle on a run
#[derive(Clone)]
pub struct RunHandle {
    id: Uuid,
    shared: SharedState,
    worker_active: Arc<AtomicBool>,
}

impl RunHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> StatusSnapshot {
        self.shared
            .snapshot(self.worker_active.load(Ordering::SeqCst))
    }

    pub fn progress(&self) -> f64 {
        self.shared.progress()
    }

    pub fn is_worker_active(&self) -> bool {
        self.worker_active.load(Ordering::SeqCst)
    }
}

/// Final account of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub phase: RunPhase,
    pub steps: u64,
    pub pauses: u32,
    pub progress: f64,
    pub final_time: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Everything a started run owns
struct ActiveRun {
    id: Uuid,
    shared: SharedState,
    worker_active: Arc<AtomicBool>,
    /// Estimator state handed from one worker to the next
    run_state: RunState,
    worker: Option<WorkerHandle>,
    monitor: Option<MonitorHandle>,
    steps: u64,
    /// Steps taken by the most recently joined worker
    worker_steps: u64,
    pauses: u32,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    failure: Option<StepError>,
}

impl ActiveRun {
    fn new(shared: SharedState) -> Self {
        Self {
            id: Uuid::new_v4(),
            shared,
            worker_active: Arc::new(AtomicBool::new(false)),
            run_state: RunState::default(),
            worker: None,
            monitor: None,
            steps: 0,
            worker_steps: 0,
            pauses: 0,
            started_at: Utc::now(),
            finished_at: None,
            failure: None,
        }
    }

    fn handle(&self) -> RunHandle {
        RunHandle {
            id: self.id,
            shared: self.shared.clone(),
            worker_active: self.worker_active.clone(),
        }
    }

    fn worker_running(&self) -> bool {
        self.worker.as_ref().map_or(false, |w| !w.is_finished())
    }

    /// Fold a finished worker's results into the run
    fn absorb(&mut self, exit: WorkerExit) -> std::result::Result<WorkerOutcome, StepError> {
        self.steps += exit.steps;
        self.worker_steps = exit.steps;
        self.run_state = exit.run_state;
        if let Err(err) = &exit.outcome {
            self.failure = Some(err.clone());
        }
        exit.outcome
    }

    /// Cancel and join the worker, then halt the monitor.
    fn halt(&mut self) -> Option<Result<WorkerExit>> {
        let exit = self.worker.take().map(|worker| {
            worker.stop();
            worker.join()
        });
        if let Some(monitor) = self.monitor.take() {
            monitor.halt();
        }
        exit
    }

    fn summary(&self, phase: RunPhase) -> RunSummary {
        let state = self.shared.lock();
        RunSummary {
            run_id: self.id,
            phase,
            steps: self.steps,
            pauses: self.pauses,
            progress: state.progress,
            final_time: state.solver.current_time(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

struct Lifecycle {
    phase: RunPhase,
    /// Present from the first successful start on; the solver outlives stop
    run: Option<ActiveRun>,
}

/// Lifecycle controller for one supervised solver at a time
pub struct RunController {
    config: RunConfig,
    factory: SolverFactory,
    sink: Arc<dyn StatusSink>,
    telemetry: TelemetryCollector,
    lifecycle: Mutex<Lifecycle>,
}

impl RunController {
    pub fn new(config: RunConfig, factory: SolverFactory) -> Self {
        Self {
            config,
            factory,
            sink: Arc::new(NullSink),
            telemetry: TelemetryCollector::new(),
            lifecycle: Mutex::new(Lifecycle {
                phase: RunPhase::Idle,
                run: None,
            }),
        }
    }

    /// Renderer that receives the monitor's snapshots
    pub fn with_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> RunPhase {
        let mut lc = self.lock();
        self.reap(&mut lc);
        lc.phase
    }

    /// Start a run, or resume a paused one. A no-op while a worker is active.
    pub fn start(&self) -> Result<RunHandle> {
        let mut lc = self.lock();
        self.start_locked(&mut lc)
    }

    /// Resume a paused run. A no-op while a worker is active; returns
    /// `None` when nothing is paused or running.
    pub fn resume(&self) -> Result<Option<RunHandle>> {
        let mut lc = self.lock();
        self.reap(&mut lc);
        match lc.phase {
            RunPhase::Paused | RunPhase::Running => self.start_locked(&mut lc).map(Some),
            _ => Ok(None),
        }
    }

    fn start_locked(&self, lc: &mut Lifecycle) -> Result<RunHandle> {
        self.reap(lc);

        if let Some(run) = lc.run.as_ref() {
            if run.worker_running() {
                return Ok(run.handle());
            }
        }

        if lc.phase == RunPhase::Paused {
            let next = lc.phase.transition(LifecycleEvent::Resume)?;
            let run = lc
                .run
                .as_mut()
                .ok_or_else(|| SupervisorError::Generic("paused run has no solver".to_string()))?;
            self.launch(run)?;
            self.telemetry.record(RunEvent::Resumed {
                run_id: run.id,
                timestamp: Instant::now(),
            });
            info!(run_id = %run.id, progress = run.run_state.progress, "run resumed");
            lc.phase = next;
            return Ok(run.handle());
        }

        let next = lc.phase.transition(LifecycleEvent::Start)?;

        // A stopped, completed or failed run keeps its solver; only the
        // worker and estimator state start over.
        let retained = lc.run.take();
        let reused_solver = retained.is_some();
        let mut run = match retained {
            Some(previous) => {
                previous.shared.lock().begin_run();
                ActiveRun::new(previous.shared)
            }
            None => {
                self.config.validate()?;
                let mut solver = (self.factory)(&self.config)?;
                solver.initialize()?;
                ActiveRun::new(SharedState::new(solver))
            }
        };

        if let Err(err) = self.launch(&mut run) {
            if reused_solver {
                lc.run = Some(run);
            }
            return Err(err);
        }
        self.telemetry.record(RunEvent::Started {
            run_id: run.id,
            timestamp: Instant::now(),
        });
        info!(
            run_id = %run.id,
            reused_solver,
            measurement = self.config.termination.measurement.map(|m| m.as_str()),
            "run started"
        );

        let handle = run.handle();
        lc.run = Some(run);
        lc.phase = next;
        Ok(handle)
    }

    /// Spawn a fresh worker seeded with the run's saved state, plus a monitor.
    fn launch(&self, run: &mut ActiveRun) -> Result<()> {
        if let Some(stale) = run.monitor.take() {
            stale.halt();
        }

        let worker = WorkerLoop::new(run.shared.clone(), &self.config, run.run_state.clone())
            .spawn(run.worker_active.clone())?;

        let monitor = StatusMonitor::new(
            run.shared.clone(),
            run.worker_active.clone(),
            self.sink.clone(),
            self.config.monitor.poll_interval(),
        )
        .spawn();

        match monitor {
            Ok(monitor) => {
                run.worker = Some(worker);
                run.monitor = Some(monitor);
                Ok(())
            }
            Err(err) => {
                worker.stop();
                if let Ok(exit) = worker.join() {
                    let _ = run.absorb(exit);
                }
                Err(err)
            }
        }
    }

    /// Pause a running worker, keeping the solver for later.
    pub fn pause(&self) -> Result<()> {
        let mut lc = self.lock();
        self.reap(&mut lc);
        if lc.phase != RunPhase::Running {
            return Ok(());
        }

        let Some(run) = lc.run.as_mut() else {
            return Ok(());
        };

        let exit = match run.halt() {
            Some(exit) => exit,
            None => Ok(WorkerExit {
                outcome: Ok(WorkerOutcome::Cancelled),
                run_state: run.run_state.clone(),
                steps: 0,
            }),
        };
        let event = self.settle(run, exit);

        if event == LifecycleEvent::Pause {
            run.pauses += 1;
            self.telemetry.record(RunEvent::Paused {
                run_id: run.id,
                steps: run.worker_steps,
                progress: run.run_state.progress,
                timestamp: Instant::now(),
            });
            info!(run_id = %run.id, progress = run.run_state.progress, "run paused");
        }

        let next = lc.phase.transition(event)?;
        self.finish_phase(&mut lc, next);
        Ok(())
    }

    /// Pause if running, resume if paused, otherwise nothing.
    pub fn toggle_pause(&self) -> Result<RunPhase> {
        let mut lc = self.lock();
        self.reap(&mut lc);
        let phase = lc.phase;
        match phase {
            RunPhase::Running => {
                drop(lc);
                self.pause()?;
            }
            RunPhase::Paused => {
                self.start_locked(&mut lc)?;
                drop(lc);
            }
            _ => drop(lc),
        }
        Ok(self.phase())
    }

    /// Terminate the run. The solver is kept, its estimator state is
    /// discarded; a later `start` steps the same solver as a new run.
    pub fn stop(&self) -> Result<()> {
        let mut lc = self.lock();
        self.reap(&mut lc);
        if !matches!(lc.phase, RunPhase::Running | RunPhase::Paused) {
            return Ok(());
        }

        let next = lc.phase.transition(LifecycleEvent::Stop)?;
        if let Some(run) = lc.run.as_mut() {
            let steps = match run.halt() {
                Some(Ok(exit)) => {
                    let _ = run.absorb(exit);
                    run.worker_steps
                }
                Some(Err(err)) => {
                    warn!(%err, "worker ended abnormally during stop");
                    0
                }
                None => 0,
            };
            run.run_state = RunState::default();
            run.finished_at = Some(Utc::now());
            self.telemetry.record(RunEvent::Stopped {
                run_id: run.id,
                steps,
                timestamp: Instant::now(),
            });
            info!(run_id = %run.id, steps = run.steps, "run stopped");
        }
        lc.phase = next;
        Ok(())
    }

    /// Snapshot of the current run, if any
    pub fn status(&self) -> Option<StatusSnapshot> {
        let handle = {
            let mut lc = self.lock();
            self.reap(&mut lc);
            lc.run.as_ref().map(ActiveRun::handle)
        };
        handle.map(|h| h.status())
    }

    /// Estimator state retained for the current run
    pub fn run_state(&self) -> Option<RunState> {
        let mut lc = self.lock();
        self.reap(&mut lc);
        lc.run.as_ref().map(|run| run.run_state.clone())
    }

    pub fn handle(&self) -> Option<RunHandle> {
        self.lock().run.as_ref().map(ActiveRun::handle)
    }

    /// Block until the current worker exits.
    ///
    /// Returns the summary for completed, paused and stopped runs, and the
    /// solver's error for failed ones. Pause and stop from other threads
    /// remain possible while waiting.
    pub fn wait(&self) -> Result<RunSummary> {
        let poll = self.config.monitor.poll_interval().min(Duration::from_millis(20));
        loop {
            let mut lc = self.lock();
            self.reap(&mut lc);
            if lc.phase != RunPhase::Running {
                let monitor = lc.run.as_mut().and_then(|run| run.monitor.take());
                let outcome = self.outcome_locked(&lc);
                drop(lc);
                if let Some(monitor) = monitor {
                    monitor.join();
                }
                return outcome;
            }
            drop(lc);
            thread::sleep(poll);
        }
    }

    fn outcome_locked(&self, lc: &Lifecycle) -> Result<RunSummary> {
        match (lc.phase, lc.run.as_ref()) {
            (RunPhase::Failed, Some(run)) => Err(run
                .failure
                .clone()
                .map(SupervisorError::Step)
                .unwrap_or_else(|| SupervisorError::Generic("run failed".to_string()))),
            (phase, Some(run)) => Ok(run.summary(phase)),
            (_, None) => Err(SupervisorError::Generic("no run has been started".to_string())),
        }
    }

    /// Join a worker that exited on its own and advance the phase.
    fn reap(&self, lc: &mut Lifecycle) {
        if lc.phase != RunPhase::Running {
            return;
        }
        let Some(run) = lc.run.as_mut() else {
            return;
        };
        if run.worker.as_ref().map_or(true, |worker| !worker.is_finished()) {
            return;
        }

        let exit = match run.worker.take() {
            Some(worker) => worker.join(),
            None => return,
        };
        let event = self.settle(run, exit);
        match lc.phase.transition(event) {
            Ok(next) => self.finish_phase(lc, next),
            Err(err) => warn!(%err, "could not reconcile finished worker"),
        }
    }

    /// Translate a worker exit into the lifecycle event it implies.
    fn settle(&self, run: &mut ActiveRun, exit: Result<WorkerExit>) -> LifecycleEvent {
        match exit {
            Ok(exit) => match run.absorb(exit) {
                Ok(WorkerOutcome::Cancelled) => LifecycleEvent::Pause,
                Ok(WorkerOutcome::Completed) => {
                    self.telemetry.record(RunEvent::Completed {
                        run_id: run.id,
                        steps: run.worker_steps,
                        timestamp: Instant::now(),
                    });
                    info!(run_id = %run.id, steps = run.steps, "run completed");
                    LifecycleEvent::WorkerFinished
                }
                Err(err) => {
                    self.record_failure(run, err.to_string());
                    LifecycleEvent::WorkerFailed
                }
            },
            Err(err) => {
                run.worker_steps = 0;
                let time = run.shared.lock().solver.current_time();
                run.failure = Some(StepError::new(err.to_string(), time));
                self.record_failure(run, err.to_string());
                LifecycleEvent::WorkerFailed
            }
        }
    }

    fn record_failure(&self, run: &ActiveRun, error: String) {
        warn!(run_id = %run.id, %error, "run failed");
        self.telemetry.record(RunEvent::Failed {
            run_id: run.id,
            steps: run.worker_steps,
            error,
            timestamp: Instant::now(),
        });
    }

    fn finish_phase(&self, lc: &mut Lifecycle, next: RunPhase) {
        lc.phase = next;
        if next.is_terminal() {
            if let Some(run) = lc.run.as_mut() {
                run.finished_at = Some(Utc::now());
            }
        }
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        let lc = self.lifecycle.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(run) = lc.run.as_mut() {
            if let Some(worker) = run.worker.as_ref() {
                worker.stop();
            }
        }
    }
}
