//! Periodic status monitor
//!
//! Samples the shared state on its own cadence, independent of the worker's
//! step rate, and republishes snapshots to a sink. It is sampling, not event
//! delivery: consecutive polls may see the same progress value.

use crate::errors::Result;
use crate::run::shared::{SharedState, StatusSnapshot};
use crate::run::sink::StatusSink;
use crate::run::worker::CancelToken;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Poller bound to one shared state and one worker's active flag
pub struct StatusMonitor {
    shared: SharedState,
    worker_active: Arc<AtomicBool>,
    sink: Arc<dyn StatusSink>,
    interval: Duration,
    halt: CancelToken,
}

impl StatusMonitor {
    pub fn new(
        shared: SharedState,
        worker_active: Arc<AtomicBool>,
        sink: Arc<dyn StatusSink>,
        interval: Duration,
    ) -> Self {
        Self {
            shared,
            worker_active,
            sink,
            interval,
            halt: CancelToken::new(),
        }
    }

    /// Take one snapshot and publish it. Returns whether polling should go on.
    pub fn poll_once(&self) -> bool {
        let active = self.worker_active.load(Ordering::SeqCst);
        let snapshot: StatusSnapshot = self.shared.snapshot(active);
        self.sink.publish(&snapshot);
        active
    }

    /// Poll until the worker goes inactive or the monitor is halted.
    pub fn run(self) -> u64 {
        let mut polls = 0;
        while !self.halt.is_cancelled() {
            polls += 1;
            if !self.poll_once() {
                debug!(polls, "worker inactive, monitor stopping");
                break;
            }
            thread::park_timeout(self.interval);
        }
        polls
    }

    pub fn spawn(self) -> Result<MonitorHandle> {
        let halt = self.halt.clone();
        let thread = thread::Builder::new()
            .name("stepwatch-monitor".to_string())
            .spawn(move || self.run())?;
        Ok(MonitorHandle { halt, thread })
    }
}

/// Owner-side handle of the monitor thread
pub struct MonitorHandle {
    halt: CancelToken,
    thread: JoinHandle<u64>,
}

impl MonitorHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the monitor to notice the worker is gone and publish its
    /// final snapshot.
    pub fn join(self) -> u64 {
        self.thread.join().unwrap_or(0)
    }

    /// Stop polling and wait for the thread; returns the number of polls.
    pub fn halt(self) -> u64 {
        self.halt.cancel();
        self.thread.thread().unpark();
        self.thread.join().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StepError;
    use crate::run::sink::CollectingSink;
    use crate::solver::{Solver, StepOutcome};

    struct Idle;

    impl Solver for Idle {
        fn step(&mut self) -> std::result::Result<StepOutcome, StepError> {
            Ok(StepOutcome::Continue)
        }
        fn time_vector(&self) -> &[f64] {
            &[]
        }
        fn termination_error(&self) -> f64 {
            1e10
        }
        fn diagnostic_series(&self) -> &[f64] {
            &[]
        }
    }

    #[test]
    fn test_stops_after_worker_inactive() {
        let sink = Arc::new(CollectingSink::new());
        let active = Arc::new(AtomicBool::new(false));
        let monitor = StatusMonitor::new(
            SharedState::new(Box::new(Idle)),
            active,
            sink.clone(),
            Duration::from_millis(1),
        );

        assert_eq!(monitor.run(), 1);
        assert_eq!(sink.len(), 1);
        assert!(!sink.snapshots()[0].worker_active);
    }

    #[test]
    fn test_halt_stops_polling() {
        let sink = Arc::new(CollectingSink::new());
        let active = Arc::new(AtomicBool::new(true));
        let handle = StatusMonitor::new(
            SharedState::new(Box::new(Idle)),
            active,
            sink.clone(),
            Duration::from_secs(60),
        )
        .spawn()
        .unwrap();

        while sink.len() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        let polls = handle.halt();
        assert!(polls >= 1);
        assert_eq!(sink.len() as u64, polls);
    }
}
