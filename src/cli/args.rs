//! Command-line argument parsing for stepwatch
//!
//! Provides clap-based CLI with subcommands, config overrides and
//! verbosity control.

use crate::config::RunConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// stepwatch - run a solver in the background and watch it converge
#[derive(Parser, Debug)]
#[command(name = "stepwatch")]
#[command(version)]
#[command(about = "Supervise a long-running solver with live progress", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Simulation end time
    #[arg(long)]
    pub t_end: Option<f64>,

    /// Window over which the measurement must stay steady
    #[arg(long)]
    pub steady_period: Option<f64>,

    /// Relative tolerance of the steady-state test
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Ignore the steady-state measurement and run to t_end
    #[arg(long)]
    pub no_measurement: bool,

    /// Emit status snapshots as JSON lines instead of a progress bar
    #[arg(long)]
    pub json: bool,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except the final summary)
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the built-in relaxation model (default)
    Run,

    /// Print the effective configuration as TOML
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Subcommand to execute, `run` when none was given
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }

    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply_overrides(&self, config: &mut RunConfig) {
        let termination = &mut config.termination;
        if let Some(t_end) = self.t_end {
            termination.t_end = t_end;
        }
        if let Some(period) = self.steady_period {
            termination.steady_period = period;
        }
        if let Some(tolerance) = self.tolerance {
            termination.tolerance = tolerance;
        }
        if self.no_measurement {
            termination.measurement = None;
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Default tracing filter directive for this level
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "stepwatch=info",
            Verbosity::VeryVerbose => "stepwatch=debug",
        }
    }

    /// Check if should show progress bars
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should show detailed events
    pub fn show_events(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Measurement;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(parse(&["stepwatch"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["stepwatch", "-q"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["stepwatch", "-v"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["stepwatch", "-vv"]).verbosity(), Verbosity::VeryVerbose);
    }

    #[test]
    fn test_quiet_wins_over_verbose() {
        assert_eq!(parse(&["stepwatch", "-q", "-vv"]).verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_default_command_is_run() {
        assert_eq!(parse(&["stepwatch"]).command(), Commands::Run);
        assert_eq!(parse(&["stepwatch", "config"]).command(), Commands::Config);
    }

    #[test]
    fn test_overrides_applied() {
        let args = parse(&[
            "stepwatch",
            "--t-end",
            "2.5",
            "--steady-period",
            "0.01",
            "--tolerance",
            "1e-3",
        ]);
        let mut config = RunConfig::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.termination.t_end, 2.5);
        assert_eq!(config.termination.steady_period, 0.01);
        assert_eq!(config.termination.tolerance, 1e-3);
        assert_eq!(config.termination.measurement, Some(Measurement::HeatRelease));
    }

    #[test]
    fn test_no_measurement_clears_measurement() {
        let mut config = RunConfig::default();
        parse(&["stepwatch", "--no-measurement"]).apply_overrides(&mut config);
        assert_eq!(config.termination.measurement, None);
    }

    #[test]
    fn test_verbosity_methods() {
        assert!(!Verbosity::Quiet.show_progress());
        assert!(Verbosity::Normal.show_progress());

        assert!(!Verbosity::Normal.show_events());
        assert!(Verbosity::Verbose.show_events());

        assert_eq!(Verbosity::VeryVerbose.log_filter(), "stepwatch=debug");
    }
}
