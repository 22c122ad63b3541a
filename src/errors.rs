//! Error types for stepwatch
//!
//! Library errors are `thiserror` enums; the binary wraps them in `anyhow`.

use thiserror::Error;

/// Failure reported by a solver while advancing or initializing.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("solver step failed at t={time:.6e}: {message}")]
pub struct StepError {
    pub message: String,
    /// Simulation time of the last accepted step
    pub time: f64,
}

impl StepError {
    pub fn new(message: impl Into<String>, time: f64) -> Self {
        Self {
            message: message.into(),
            time,
        }
    }
}

/// Main error type for the run supervisor
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// Configuration rejected before any worker started
    #[error("Configuration error: {0}")]
    ConfigValidation(String),

    /// Config file could not be read or written
    #[error("Config file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for `RunConfig`
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config could not be serialized
    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// The solver failed; the run was terminated
    #[error(transparent)]
    Step(#[from] StepError),

    /// Lifecycle transition not allowed from the current phase
    #[error("Invalid run transition from {from} via {event}: {reason}")]
    InvalidTransition {
        from: String,
        event: String,
        reason: String,
    },

    /// The worker thread unwound instead of returning
    #[error("Worker thread panicked: {0}")]
    WorkerPanicked(String),

    /// Thread spawn or other OS errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("Supervisor error: {0}")]
    Generic(String),
}

/// Result type alias for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;

impl From<anyhow::Error> for SupervisorError {
    fn from(err: anyhow::Error) -> Self {
        SupervisorError::Generic(err.to_string())
    }
}
