//! Scripted solvers and helpers shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use stepwatch::config::{Measurement, RunConfig};
use stepwatch::solver::{BoxedSolver, Solver, SolverFactory, StepOutcome};
use stepwatch::StepError;

/// Solver replaying a fixed script of times and termination errors
pub struct ScriptedSolver {
    times: Vec<f64>,
    errors: Vec<f64>,
    cursor: usize,
    time: Vec<f64>,
    series: Vec<f64>,
    /// Keep stepping past the script with this time increment
    endless_dt: Option<f64>,
    fail_at: Option<usize>,
    step_delay: Duration,
}

impl ScriptedSolver {
    /// Finishes after the last scripted time. A missing error entry reads as 1e10.
    pub fn new(times: Vec<f64>, errors: Vec<f64>) -> Self {
        Self {
            times,
            errors,
            cursor: 0,
            time: vec![0.0],
            series: vec![0.0],
            endless_dt: None,
            fail_at: None,
            step_delay: Duration::ZERO,
        }
    }

    /// Never finishes; the last scripted error repeats forever.
    pub fn endless(dt: f64, errors: Vec<f64>) -> Self {
        Self {
            endless_dt: Some(dt),
            ..Self::new(Vec::new(), errors)
        }
    }

    /// Fail on the given (1-based) step
    pub fn failing_at(mut self, step: usize) -> Self {
        self.fail_at = Some(step);
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn steps_taken(&self) -> usize {
        self.cursor
    }
}

impl Solver for ScriptedSolver {
    fn step(&mut self) -> Result<StepOutcome, StepError> {
        if !self.step_delay.is_zero() {
            thread::sleep(self.step_delay);
        }

        let step = self.cursor + 1;
        if self.fail_at == Some(step) {
            return Err(StepError::new("scripted failure", self.current_time()));
        }

        let t = match (self.times.get(self.cursor), self.endless_dt) {
            (Some(t), _) => *t,
            (None, Some(dt)) => self.current_time() + dt,
            (None, None) => return Ok(StepOutcome::Done),
        };
        self.cursor = step;
        self.time.push(t);
        self.series.push(self.termination_error());

        if self.endless_dt.is_none() && self.cursor == self.times.len() {
            Ok(StepOutcome::Done)
        } else {
            Ok(StepOutcome::Continue)
        }
    }

    fn time_vector(&self) -> &[f64] {
        &self.time
    }

    fn termination_error(&self) -> f64 {
        if self.cursor == 0 {
            return 1e10;
        }
        self.errors
            .get(self.cursor - 1)
            .or(self.errors.last())
            .copied()
            .unwrap_or(1e10)
    }

    fn diagnostic_series(&self) -> &[f64] {
        &self.series
    }
}

/// Factory counting how many solvers it has built
pub fn counting_factory<F>(make: F) -> (SolverFactory, Arc<AtomicUsize>)
where
    F: Fn() -> ScriptedSolver + Send + Sync + 'static,
{
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let factory: SolverFactory = Box::new(move |_config: &RunConfig| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(make()) as BoxedSolver)
    });
    (factory, built)
}

/// Config that publishes progress on every step with a short yield
pub fn fast_config(measurement: Option<Measurement>, t_end: f64, steady_period: f64) -> RunConfig {
    let mut config = RunConfig::default();
    config.termination.measurement = measurement;
    config.termination.t_end = t_end;
    config.termination.steady_period = steady_period;
    config.termination.tolerance = 1e-3;
    config.worker.progress_interval = 1;
    config.worker.yield_interval_us = 50;
    config.monitor.poll_interval_ms = 1;
    config
}

/// Spin until `condition` holds; panics after five seconds.
pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}
