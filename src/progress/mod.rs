//! Progress estimation for supervised solver runs
//!
//! Converts irregular convergence diagnostics into a bounded, monotonic
//! progress signal.

pub mod estimator;

pub use estimator::{
    ProgressDomainError, ProgressEstimator, ProgressSample, RunState, Stage, SEEKING_FRACTION,
};
