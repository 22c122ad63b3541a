//! First-order relaxation model
//!
//! A temperature relaxes toward its equilibrium value with explicit Euler
//! steps; the heat release rate follows the remaining temperature deficit.
//! Small enough to run anywhere, but it converges the way a real
//! steady-state solve does: the termination error decays exponentially.

use super::{Solver, StepOutcome, UNDEFINED_ERROR};
use crate::config::{Measurement, RunConfig, TerminationCondition};
use crate::errors::StepError;

/// Sentinel reported before a full steady-state window exists
const WINDOW_NOT_FILLED: f64 = 1e10;

/// Physical parameters of the relaxation model
#[derive(Debug, Clone, PartialEq)]
pub struct RelaxationParams {
    pub initial_temperature: f64,
    pub equilibrium_temperature: f64,
    /// Relaxation rate [1/s]
    pub rate: f64,
    /// Heat release at equilibrium
    pub baseline_heat_release: f64,
    pub time_step: f64,
}

impl RelaxationParams {
    /// Parameters scaled to the termination condition: about 50 steps per
    /// steady-state window, 1000 steps for fixed end-time runs.
    pub fn for_termination(tc: &TerminationCondition) -> Self {
        let time_step = match tc.measurement {
            Some(_) => tc.steady_period / 50.0,
            None => tc.t_end / 1000.0,
        };

        Self {
            initial_temperature: 300.0,
            equilibrium_temperature: 2000.0,
            rate: 20.0,
            baseline_heat_release: 1.0e6,
            time_step,
        }
    }
}

/// Relaxation solver implementing the [`Solver`] capability
pub struct RelaxationSolver {
    params: RelaxationParams,
    termination: TerminationCondition,
    temperature: f64,
    time: Vec<f64>,
    series: Vec<f64>,
    termination_error: f64,
}

impl RelaxationSolver {
    pub fn new(params: RelaxationParams, termination: TerminationCondition) -> Self {
        Self {
            temperature: params.initial_temperature,
            params,
            termination,
            time: Vec::new(),
            series: Vec::new(),
            termination_error: WINDOW_NOT_FILLED,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        let params = RelaxationParams::for_termination(&config.termination);
        Self::new(params, config.termination.clone())
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    fn heat_release(&self) -> f64 {
        let p = &self.params;
        p.baseline_heat_release
            + p.rate * (p.equilibrium_temperature - self.temperature) * 1.0e3
    }

    fn measured(&self) -> f64 {
        match self.termination.measurement {
            Some(Measurement::HeatRelease) => self.heat_release(),
            Some(Measurement::Temperature) | None => self.temperature,
        }
    }

    fn record(&mut self, t: f64) {
        let value = self.measured();
        self.time.push(t);
        self.series.push(value);
    }

    /// Relative change of the measured quantity over the last steady period
    fn update_termination_error(&mut self) {
        let now = self.current_time();
        let window_start = now - self.termination.steady_period;
        if window_start < 0.0 {
            self.termination_error = WINDOW_NOT_FILLED;
            return;
        }

        let idx = self.time.partition_point(|&t| t < window_start);
        let (Some(&then), Some(&latest)) = (self.series.get(idx), self.series.last()) else {
            self.termination_error = WINDOW_NOT_FILLED;
            return;
        };

        self.termination_error = if latest != 0.0 {
            ((latest - then) / latest).abs()
        } else {
            WINDOW_NOT_FILLED
        };
    }
}

impl Solver for RelaxationSolver {
    fn initialize(&mut self) -> Result<(), StepError> {
        if !(self.params.time_step.is_finite() && self.params.time_step > 0.0) {
            return Err(StepError::new(
                format!("invalid time step {}", self.params.time_step),
                0.0,
            ));
        }

        self.temperature = self.params.initial_temperature;
        self.time.clear();
        self.series.clear();
        self.termination_error = WINDOW_NOT_FILLED;
        self.record(0.0);
        Ok(())
    }

    fn step(&mut self) -> Result<StepOutcome, StepError> {
        let p = &self.params;
        let t = self.current_time() + p.time_step;
        let dtemp = p.rate * (p.equilibrium_temperature - self.temperature);
        self.temperature += p.time_step * dtemp;

        if !self.temperature.is_finite() {
            return Err(StepError::new("temperature diverged", t));
        }

        self.record(t);
        if self.termination.measurement.is_some() {
            self.update_termination_error();
        }

        let tc = &self.termination;
        let steady = tc.measurement.is_some()
            && t >= tc.steady_period
            && self.termination_error < UNDEFINED_ERROR
            && self.termination_error < tc.tolerance;

        if steady || t >= tc.t_end {
            Ok(StepOutcome::Done)
        } else {
            Ok(StepOutcome::Continue)
        }
    }

    fn time_vector(&self) -> &[f64] {
        &self.time
    }

    fn termination_error(&self) -> f64 {
        self.termination_error
    }

    fn diagnostic_series(&self) -> &[f64] {
        &self.series
    }
}
