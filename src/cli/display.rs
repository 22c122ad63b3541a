//! Terminal rendering for the stepwatch binary
//!
//! A progress-bar status sink plus colored run summaries.

use crate::run::{RunPhase, RunSummary, StatusSink, StatusSnapshot};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Bar resolution; progress is shown in tenths of a percent
const BAR_LENGTH: u64 = 1000;

/// Renders monitor snapshots on an indicatif progress bar
pub struct ProgressBarSink {
    bar: ProgressBar,
}

impl ProgressBarSink {
    pub fn new() -> Self {
        let bar = ProgressBar::new(BAR_LENGTH);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} Solving [{bar:40.cyan/blue}] {percent:>3}% | {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        Self { bar }
    }

    /// Leave the bar on screen at its last position
    pub fn finish(&self) {
        self.bar.abandon();
    }

    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressBarSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for ProgressBarSink {
    fn publish(&self, snapshot: &StatusSnapshot) {
        let position = (snapshot.progress.clamp(0.0, 1.0) * BAR_LENGTH as f64).round() as u64;
        self.bar.set_position(position);

        let error = if snapshot.diagnostics.termination_error >= crate::solver::UNDEFINED_ERROR {
            "err = n/a".to_string()
        } else {
            format!("err = {:.3e}", snapshot.diagnostics.termination_error)
        };
        self.bar
            .set_message(format!("t = {:.4e} | {}", snapshot.diagnostics.current_time, error));
    }
}

/// Display a finished run
pub fn print_summary(summary: &RunSummary) {
    let status = match summary.phase {
        RunPhase::Completed => format!("✓ {}", summary.phase).green().bold(),
        RunPhase::Failed => format!("✗ {}", summary.phase).red().bold(),
        _ => summary.phase.to_string().yellow().bold(),
    };

    println!();
    println!("{} {}", status, summary.run_id.to_string().dimmed());
    println!("  Progress:   {:.1}%", summary.progress * 100.0);
    println!("  Final time: {:.6e}", summary.final_time);
    println!("  Steps:      {}", summary.steps);
    if let Some(finished) = summary.finished_at {
        let elapsed = finished - summary.started_at;
        println!("  Wall time:  {} ms", elapsed.num_milliseconds());
    }
}

/// Display a run that ended on a solver error
pub fn print_failure(error: &str) {
    println!("{} {}", "Error:".red().bold(), error.red());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::Diagnostics;

    fn snapshot(progress: f64) -> StatusSnapshot {
        StatusSnapshot {
            progress,
            done: false,
            worker_active: true,
            failure: None,
            diagnostics: Diagnostics::default(),
        }
    }

    #[test]
    fn test_bar_tracks_progress() {
        let sink = ProgressBarSink::new();
        sink.publish(&snapshot(0.25));
        assert_eq!(sink.bar.position(), 250);

        sink.publish(&snapshot(1.0));
        assert_eq!(sink.bar.position(), BAR_LENGTH);
        sink.clear();
    }

    #[test]
    fn test_bar_clamps_out_of_range() {
        let sink = ProgressBarSink::new();
        sink.publish(&snapshot(3.0));
        assert_eq!(sink.bar.position(), BAR_LENGTH);
        sink.clear();
    }
}
