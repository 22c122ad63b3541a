//! CLI module for stepwatch
//!
//! Handles command-line argument parsing and terminal rendering.

pub mod args;
pub mod display;

pub use args::{Args, Commands, Verbosity};
pub use display::{print_failure, print_summary, ProgressBarSink};
