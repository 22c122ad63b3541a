//! Progress estimation from convergence diagnostics
//!
//! Turns the solver's clock and termination error into a fraction in
//! [0, 1] with a guarantee: published progress is monotonic non-decreasing.
//!
//! # Model
//!
//! Fixed end-time runs are linear in simulated time. Steady-state runs are
//! split in two stages:
//!
//! - **Seeking**: the first `frac0` of the bar covers reaching the minimum
//!   steady period, linear in time. The same slope continues past the
//!   window while the error is still undefined.
//! - **Converging**: once the termination error is meaningful (finite and
//!   positive), its
//!   logarithmic approach toward the tolerance is mapped onto the remaining
//!   `1 - frac0` through a square-root easing curve:
//!
//!   A = log10(tol + (err - tol) / ref) / log10(tol)
//!   P = frac0 + (1 - frac0) * sqrt(A)

use crate::config::TerminationCondition;
use crate::solver::UNDEFINED_ERROR;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Share of the bar attributed to reaching the measurement window
pub const SEEKING_FRACTION: f64 = 0.15;

/// Heuristic stage of a steady-state run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// No meaningful termination error yet
    Seeking,
    /// Termination error is being driven toward the tolerance
    Converging,
}

/// Estimator state carried across worker restarts
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    pub stage: Stage,
    /// Termination error captured at the Seeking -> Converging transition
    pub reference_error: Option<f64>,
    pub progress: f64,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            stage: Stage::Seeking,
            reference_error: None,
            progress: 0.0,
        }
    }
}

/// Latest diagnostics read from the solver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub current_time: f64,
    pub termination_error: f64,
}

/// Out-of-domain input to the convergence curve. Never leaves this module.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ProgressDomainError {
    #[error("termination error {0} is not finite")]
    NonFiniteError(f64),

    #[error("reference error {0} cannot normalize the convergence curve")]
    BadReference(f64),

    #[error("log10 argument {0} is not positive")]
    NonPositiveLogArgument(f64),

    #[error("convergence fraction evaluated to {0}")]
    NonFiniteFraction(f64),
}

/// Progress estimator bound to one termination condition
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    termination: TerminationCondition,
    frac0: f64,
    state: RunState,
}

impl ProgressEstimator {
    pub fn new(termination: TerminationCondition) -> Self {
        Self::resume(termination, RunState::default())
    }

    /// Continue from state saved by a previous worker
    pub fn resume(termination: TerminationCondition, state: RunState) -> Self {
        Self {
            termination,
            frac0: SEEKING_FRACTION,
            state,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn into_state(self) -> RunState {
        self.state
    }

    pub fn progress(&self) -> f64 {
        self.state.progress
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    /// Fold a new sample into the estimate and return the new progress.
    pub fn update(&mut self, sample: ProgressSample) -> f64 {
        let (candidate, next) = next_estimate(&self.termination, self.frac0, &self.state, sample);

        if next.stage != self.state.stage {
            info!(
                time = sample.current_time,
                reference_error = ?next.reference_error,
                "progress estimator entered converging stage"
            );
        }

        self.state = next;
        if let Some(candidate) = candidate {
            self.state.progress = monotone(self.state.progress, candidate);
        }
        self.state.progress
    }

    /// Mark the run complete; progress is exactly 1.0 from here on.
    pub fn finish(&mut self) -> f64 {
        self.state.progress = 1.0;
        self.state.progress
    }
}

/// Never below `previous`, always inside [0, 1].
pub fn monotone(previous: f64, candidate: f64) -> f64 {
    let candidate = if candidate.is_nan() { 0.0 } else { candidate.clamp(0.0, 1.0) };
    candidate.max(previous)
}

/// Pure transition: candidate progress (if any) and the next stage state.
/// `progress` in the returned state is unchanged; callers apply `monotone`.
pub fn next_estimate(
    tc: &TerminationCondition,
    frac0: f64,
    state: &RunState,
    sample: ProgressSample,
) -> (Option<f64>, RunState) {
    let mut next = state.clone();

    if tc.measurement.is_none() {
        return (Some(sample.current_time / tc.t_end), next);
    }

    match (state.stage, state.reference_error) {
        (Stage::Converging, Some(reference)) => {
            let candidate = match convergence_fraction(tc.tolerance, sample.termination_error, reference) {
                Ok(a) => Some((frac0 + (1.0 - frac0) * a.sqrt()).min(1.0)),
                Err(ProgressDomainError::NonPositiveLogArgument(arg)) => {
                    debug!(arg, "error below tolerance, saturating convergence fraction");
                    Some(1.0)
                }
                Err(err) => {
                    debug!(%err, "skipping progress sample");
                    None
                }
            };
            (candidate, next)
        }
        _ => {
            let candidate = frac0 * sample.current_time / tc.steady_period;
            let err = sample.termination_error;
            // a zero or negative reference cannot normalize the curve
            if err.is_finite() && err > 0.0 && err < UNDEFINED_ERROR {
                next.stage = Stage::Converging;
                next.reference_error = Some(err);
            }
            (Some(candidate), next)
        }
    }
}

/// The `A` term of the convergence curve, clamped to [0, 1].
pub fn convergence_fraction(
    tolerance: f64,
    err_now: f64,
    reference: f64,
) -> Result<f64, ProgressDomainError> {
    if !err_now.is_finite() {
        return Err(ProgressDomainError::NonFiniteError(err_now));
    }
    if !reference.is_finite() || reference == 0.0 {
        return Err(ProgressDomainError::BadReference(reference));
    }

    let arg = tolerance + (err_now - tolerance) / reference;
    if arg <= 0.0 {
        return Err(ProgressDomainError::NonPositiveLogArgument(arg));
    }

    let a = arg.log10() / tolerance.log10();
    if !a.is_finite() {
        return Err(ProgressDomainError::NonFiniteFraction(a));
    }
    Ok(a.clamp(0.0, 1.0))
}
