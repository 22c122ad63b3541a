//! stepwatch - supervision for long-running numerical solvers
//!
//! Steps a solver on a background thread, estimates a bounded, monotone
//! completion fraction from its termination criterion, and exposes
//! start / pause / resume / stop plus periodic status snapshots.
//!
//! # Architecture
//!
//! - **solver**: the steppable solver capability and a demo model
//! - **progress**: two-stage progress estimation
//! - **run**: worker, status monitor and lifecycle controller
//! - **config** / **cli** / **telemetry**: ambient surfaces for the binary

pub mod errors;
pub mod config;
pub mod solver;
pub mod progress;
pub mod run;
pub mod telemetry;
pub mod cli;

// Re-export commonly used types
pub use config::{Measurement, RunConfig, TerminationCondition};
pub use errors::{Result, StepError, SupervisorError};
pub use progress::{ProgressEstimator, RunState, Stage};
pub use run::{RunController, RunHandle, RunPhase, RunSummary, StatusSnapshot};
pub use solver::{Solver, SolverFactory, StepOutcome};
