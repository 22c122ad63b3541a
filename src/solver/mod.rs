//! Solver capability consumed by the run supervisor
//!
//! The numerical method is opaque here: a solver can be stepped, asked
//! whether it is done, and read for time-series diagnostics.

pub mod relaxation;

pub use relaxation::RelaxationSolver;

use crate::config::RunConfig;
use crate::errors::{Result, StepError};

/// Termination-error values at or above this mean "not yet defined".
pub const UNDEFINED_ERROR: f64 = 1e9;

/// Result of advancing a solver by one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// More steps are needed
    Continue,
    /// The termination condition has been met
    Done,
}

impl StepOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, StepOutcome::Done)
    }
}

/// A steppable solver owned by the supervisor for the duration of a run.
pub trait Solver: Send {
    /// Prepare initial conditions. Called once per fresh run.
    fn initialize(&mut self) -> std::result::Result<(), StepError> {
        Ok(())
    }

    /// Advance by one step.
    fn step(&mut self) -> std::result::Result<StepOutcome, StepError>;

    /// Simulation times of accepted steps, monotonically growing.
    fn time_vector(&self) -> &[f64];

    /// Distance from the steady-state criterion; `>= UNDEFINED_ERROR`
    /// until enough history exists to compute it.
    fn termination_error(&self) -> f64;

    /// Measured quantity, one sample per entry of `time_vector`.
    fn diagnostic_series(&self) -> &[f64];

    /// Time of the last accepted step.
    fn current_time(&self) -> f64 {
        self.time_vector().last().copied().unwrap_or(0.0)
    }
}

/// Boxed solver as stored in the shared state
pub type BoxedSolver = Box<dyn Solver>;

/// Builds a solver for a validated configuration.
pub type SolverFactory = Box<dyn Fn(&RunConfig) -> Result<BoxedSolver> + Send + Sync>;

/// Factory for the built-in relaxation model
pub fn relaxation_factory() -> SolverFactory {
    Box::new(|config: &RunConfig| {
        Ok(Box::new(RelaxationSolver::from_config(config)) as BoxedSolver)
    })
}
