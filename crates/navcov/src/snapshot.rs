//! Post-test coverage snapshots.
//!
//! After every test the in-page coverage blob is captured and persisted
//! unmodified as `<output>/<uuid>.json`. A failed capture only costs timing
//! information and is logged as a warning; a failed write loses data, so it is
//! logged as an error and counted as a failure.

use crate::channel::ScriptChannel;
use crate::preserve::OperationGate;
use crate::reporter::{ResultCollector, ResultReport};
use crate::writer::JsonWriter;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// What a single snapshot attempt did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Coverage was written to the path
    Written(PathBuf),
    /// Coverage could not be read from the page; nothing was written
    CaptureFailed,
    /// Coverage was read but writing it to the path failed
    WriteFailed(PathBuf),
}

/// Captures and persists coverage after each test
pub struct CoverageSnapshotter {
    channel: ScriptChannel,
    writer: Arc<dyn JsonWriter>,
    collector: ResultCollector,
    output_directory: PathBuf,
    gate: Option<OperationGate>,
}

impl fmt::Debug for CoverageSnapshotter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverageSnapshotter")
            .field("output_directory", &self.output_directory)
            .field("serialized", &self.gate.is_some())
            .finish()
    }
}

impl CoverageSnapshotter {
    /// Create a snapshotter writing into `output_directory`
    #[must_use]
    pub fn new(
        channel: ScriptChannel,
        writer: Arc<dyn JsonWriter>,
        collector: ResultCollector,
        output_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            channel,
            writer,
            collector,
            output_directory: output_directory.into(),
            gate: None,
        }
    }

    /// Share `gate` with the preservation operations
    #[must_use]
    pub fn with_gate(mut self, gate: OperationGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Directory snapshots are written into
    #[must_use]
    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Fresh, unique snapshot path
    fn next_path(&self) -> PathBuf {
        self.output_directory
            .join(format!("{}.json", Uuid::new_v4()))
    }

    /// Capture and persist one snapshot. Never fails.
    pub async fn snapshot(&self) -> SnapshotOutcome {
        let _serialized = match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        let blob = match self.channel.capture_coverage().await {
            Ok(blob) => blob,
            Err(e) => {
                self.collector
                    .warning(format!("failed to gather coverage for snapshot: {e}"));
                return SnapshotOutcome::CaptureFailed;
            }
        };

        let path = self.next_path();
        match self.writer.write_json(&path, &blob) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "wrote coverage snapshot");
                SnapshotOutcome::Written(path)
            }
            Err(e) => {
                self.collector
                    .error(format!("failed to write coverage to {}: {e}", path.display()));
                SnapshotOutcome::WriteFailed(path)
            }
        }
    }

    /// Snapshot, then hand back the current report
    pub async fn post_test(&self) -> ResultReport {
        let _ = self.snapshot().await;
        self.collector.snapshot()
    }
}
