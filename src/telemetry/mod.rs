//! Telemetry system for stepwatch
//!
//! Collects lifecycle events of supervised runs and summarizes them.

use crate::cli::Verbosity;
use colored::Colorize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use uuid::Uuid;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum RunEvent {
    Started {
        run_id: Uuid,
        timestamp: Instant,
    },
    Paused {
        run_id: Uuid,
        steps: u64,
        progress: f64,
        timestamp: Instant,
    },
    Resumed {
        run_id: Uuid,
        timestamp: Instant,
    },
    Stopped {
        run_id: Uuid,
        steps: u64,
        timestamp: Instant,
    },
    Completed {
        run_id: Uuid,
        steps: u64,
        timestamp: Instant,
    },
    Failed {
        run_id: Uuid,
        steps: u64,
        error: String,
        timestamp: Instant,
    },
}

/// Telemetry statistics
///
/// `steps` sums the per-worker step counts carried by pause, stop,
/// completion and failure events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub runs_started: usize,
    pub pauses: usize,
    pub resumes: usize,
    pub stops: usize,
    pub completions: usize,
    pub failures: usize,
    pub steps: u64,
}

/// Telemetry collector, cheap to clone and share across threads
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<RunEvent>>>,
    stats: Arc<Mutex<RunStats>>,
    start_time: Instant,
}

impl TelemetryCollector {
    /// Create a new telemetry collector
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(RunStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: RunEvent) {
        {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            match &event {
                RunEvent::Started { .. } => stats.runs_started += 1,
                RunEvent::Paused { steps, .. } => {
                    stats.pauses += 1;
                    stats.steps += steps;
                }
                RunEvent::Resumed { .. } => stats.resumes += 1,
                RunEvent::Stopped { steps, .. } => {
                    stats.stops += 1;
                    stats.steps += steps;
                }
                RunEvent::Completed { steps, .. } => {
                    stats.completions += 1;
                    stats.steps += steps;
                }
                RunEvent::Failed { steps, .. } => {
                    stats.failures += 1;
                    stats.steps += steps;
                }
            }
        }

        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Get current statistics
    pub fn get_stats(&self) -> RunStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<RunEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal summary of collected telemetry
pub struct TelemetryDisplay {
    collector: TelemetryCollector,
    verbosity: Verbosity,
}

impl TelemetryDisplay {
    pub fn new(collector: TelemetryCollector, verbosity: Verbosity) -> Self {
        Self {
            collector,
            verbosity,
        }
    }

    /// Display summary statistics
    pub fn display_summary(&self) {
        if !self.verbosity.show_progress() {
            return;
        }

        let stats = self.collector.get_stats();
        println!("\n{}", "Run Summary".bold());
        println!("─────────────────────────────────────");
        println!("Duration:      {:?}", self.collector.elapsed());
        println!("Steps:         {}", stats.steps);
        println!("Pauses:        {}", stats.pauses);
        println!("Completed:     {}", stats.completions);
        if stats.failures > 0 {
            println!("Failures:      {}", stats.failures.to_string().red());
        }

        if self.verbosity.show_events() {
            for event in self.collector.recent_events(10) {
                println!("  {:?}", event);
            }
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_creation() {
        let collector = TelemetryCollector::new();
        assert_eq!(collector.event_count(), 0);
        assert_eq!(collector.get_stats(), RunStats::default());
    }

    #[test]
    fn test_pause_and_completion_accumulate_steps() {
        let collector = TelemetryCollector::new();
        let run_id = Uuid::new_v4();

        collector.record(RunEvent::Started {
            run_id,
            timestamp: Instant::now(),
        });
        collector.record(RunEvent::Paused {
            run_id,
            steps: 40,
            progress: 0.3,
            timestamp: Instant::now(),
        });
        collector.record(RunEvent::Resumed {
            run_id,
            timestamp: Instant::now(),
        });
        collector.record(RunEvent::Completed {
            run_id,
            steps: 60,
            timestamp: Instant::now(),
        });

        let stats = collector.get_stats();
        assert_eq!(stats.runs_started, 1);
        assert_eq!(stats.pauses, 1);
        assert_eq!(stats.resumes, 1);
        assert_eq!(stats.completions, 1);
        assert_eq!(stats.steps, 100);
    }

    #[test]
    fn test_recent_events() {
        let collector = TelemetryCollector::new();
        for _ in 0..10 {
            collector.record(RunEvent::Stopped {
                run_id: Uuid::new_v4(),
                steps: 1,
                timestamp: Instant::now(),
            });
        }

        assert_eq!(collector.recent_events(3).len(), 3);
        assert_eq!(collector.get_stats().stops, 10);
        assert_eq!(collector.get_stats().steps, 10);
    }

    #[test]
    fn test_clones_share_state() {
        let collector = TelemetryCollector::new();
        let clone = collector.clone();
        clone.record(RunEvent::Failed {
            run_id: Uuid::new_v4(),
            steps: 3,
            error: "diverged".to_string(),
            timestamp: Instant::now(),
        });
        assert_eq!(collector.get_stats().failures, 1);
        assert_eq!(collector.get_stats().steps, 3);
    }
}
