//! Consumers of status snapshots
//!
//! Rendering is not the supervisor's business; it hands each snapshot to a
//! [`StatusSink`] and moves on.

use crate::run::shared::StatusSnapshot;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

/// Receives snapshots from the status monitor thread
pub trait StatusSink: Send + Sync {
    fn publish(&self, snapshot: &StatusSnapshot);
}

/// Discards every snapshot
pub struct NullSink;

impl StatusSink for NullSink {
    fn publish(&self, _snapshot: &StatusSnapshot) {}
}

/// Emits one structured log event per snapshot
pub struct LogSink;

impl StatusSink for LogSink {
    fn publish(&self, snapshot: &StatusSnapshot) {
        info!(
            progress = snapshot.progress,
            time = snapshot.diagnostics.current_time,
            termination_error = snapshot.diagnostics.termination_error,
            done = snapshot.done,
            "run status"
        );
    }
}

/// Writes each snapshot as a JSON line
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> StatusSink for JsonLinesSink<W> {
    fn publish(&self, snapshot: &StatusSnapshot) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = write_line(&mut *writer, snapshot) {
            warn!(%err, "failed to write status line");
        }
    }
}

fn write_line<W: Write>(writer: &mut W, snapshot: &StatusSnapshot) -> std::io::Result<()> {
    serde_json::to_writer(&mut *writer, snapshot)?;
    writeln!(writer)?;
    writer.flush()
}

/// Keeps every snapshot in memory, for embedding and tests
#[derive(Default)]
pub struct CollectingSink {
    snapshots: Mutex<Vec<StatusSnapshot>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<StatusSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn progress_values(&self) -> Vec<f64> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| s.progress)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StatusSink for CollectingSink {
    fn publish(&self, snapshot: &StatusSnapshot) {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot.clone());
    }
}
