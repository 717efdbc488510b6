//! Coverage preservation around a wrapped call.
//!
//! ```text
//! Idle ──► CaptureInFlight ──ok──► CallExecuting ──► RestoreInFlight ──► Resolved
//!                │                                                          ▲
//!                └──err──► CaptureFailed ──► CallExecuting ─────────────────┘
//! ```
//!
//! Each stage can fail on its own. None of those failures reach the caller:
//! the operation always resolves with what the original returned (`None` if
//! the original itself failed) and reports problems through the
//! [`ResultCollector`], at most once per call.

use crate::channel::ScriptChannel;
use crate::reporter::ResultCollector;
use crate::result::NavcovError;
use crate::target::TargetFn;
use serde_json::Value;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared gate serializing whole preserve/snapshot sequences against the page
pub type OperationGate = Arc<Mutex<()>>;

/// Stage of a preservation operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreservePhase {
    /// Reading `__coverage__` before the call
    Capture,
    /// Running the original function
    Call,
    /// Writing `__coverage__` back after the call
    Restore,
}

impl fmt::Display for PreservePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Capture => "capture phase",
            Self::Call => "call phase",
            Self::Restore => "restore phase",
        })
    }
}

/// Everything that happened during one preservation operation
#[derive(Debug, Clone, PartialEq)]
pub struct PreserveOutcome {
    /// What the original function returned
    pub value: Option<Value>,
    /// Blob written back into the page, if a restore was attempted
    pub restored: Option<Value>,
    /// Stages that failed, in order
    pub failed_phases: Vec<PreservePhase>,
}

impl PreserveOutcome {
    /// Whether every stage succeeded
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed_phases.is_empty()
    }
}

/// The operation every installed proxy runs
pub struct CoveragePreserver {
    channel: ScriptChannel,
    collector: ResultCollector,
    gate: Option<OperationGate>,
}

impl fmt::Debug for CoveragePreserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoveragePreserver")
            .field("channel", &self.channel)
            .field("serialized", &self.gate.is_some())
            .finish()
    }
}

impl CoveragePreserver {
    /// Create an ungated preserver; overlapping calls may interleave
    #[must_use]
    pub fn new(channel: ScriptChannel, collector: ResultCollector) -> Self {
        Self {
            channel,
            collector,
            gate: None,
        }
    }

    /// Serialize every operation through `gate`
    #[must_use]
    pub fn with_gate(mut self, gate: OperationGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Run `original(args)` bracketed by a coverage capture and restore.
    ///
    /// Never fails. Resolves to the original's return value, or `None` when
    /// the original failed.
    pub async fn preserve(&self, original: &TargetFn, args: Vec<Value>) -> Option<Value> {
        self.preserve_detailed(original, args).await.value
    }

    /// Like [`preserve`](Self::preserve), also reporting what each stage did.
    pub async fn preserve_detailed(
        &self,
        original: &TargetFn,
        args: Vec<Value>,
    ) -> PreserveOutcome {
        let _serialized = match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };
        let mut failures: Vec<(PreservePhase, NavcovError)> = Vec::new();

        let captured = match self.channel.capture_coverage().await {
            Ok(blob) => Some(blob),
            Err(e) => {
                failures.push((PreservePhase::Capture, e));
                None
            }
        };

        let value = match call_original(original, &args) {
            Ok(value) => Some(value),
            Err(e) => {
                failures.push((PreservePhase::Call, e));
                None
            }
        };

        // Only after the call has returned, so the page's own writes land first.
        let mut restored = None;
        if let Some(blob) = captured {
            match self.channel.restore_coverage(blob.clone()).await {
                Ok(()) => restored = Some(blob),
                Err(e) => failures.push((PreservePhase::Restore, e)),
            }
        }

        self.report(&failures);
        PreserveOutcome {
            value,
            restored,
            failed_phases: failures.into_iter().map(|(phase, _)| phase).collect(),
        }
    }

    fn report(&self, failures: &[(PreservePhase, NavcovError)]) {
        if failures.is_empty() {
            tracing::trace!("coverage preserved");
            return;
        }
        let details = failures
            .iter()
            .map(|(phase, e)| format!("{phase}: {e}"))
            .collect::<Vec<_>>()
            .join("; ");
        self.collector
            .warning(format!("failed to preserve coverage ({details})"));
    }
}

fn call_original(original: &TargetFn, args: &[Value]) -> Result<Value, NavcovError> {
    match panic::catch_unwind(AssertUnwindSafe(|| original(args))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "target function panicked".to_string());
            Err(NavcovError::target(message))
        }
    }
}
