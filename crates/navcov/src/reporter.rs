//! Reporter - Result Collection for the Host Runner
//!
//! Coverage preservation is a side channel: it must never make the test it
//! brackets look like it failed. Every failure it hits is therefore turned
//! into an entry here, and the host runner reads the accumulated
//! [`ResultReport`] at teardown to decide what to do with it.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  log_assertion(message, force_fail)                           │
//! │                                                               │
//! │   log_assertions?  ──yes──►  append {passed:false, errorMsg}  │
//! │   fail_assertions || force_fail?  ──yes──►  failed_count += 1 │
//! │                                                               │
//! │  The two checks are independent.                              │
//! └───────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Description of the single spec result the plugin reports into
pub const SPEC_DESCRIPTION: &str = "coverage preservation";

/// How serious a logged assertion is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Timing was lost, data was not
    #[default]
    Warning,
    /// Data was lost
    Error,
}

/// One logged assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionEntry {
    /// Always `false` for entries logged by the plugin
    pub passed: bool,
    /// Human-readable message
    pub error_msg: String,
    /// Severity of the underlying failure
    #[serde(default)]
    pub severity: Severity,
}

/// A described group of assertions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecResult {
    /// Spec description
    pub description: String,
    /// Logged assertions, in order
    pub assertions: Vec<AssertionEntry>,
    /// Duration in milliseconds
    #[serde(rename = "duration")]
    pub duration_ms: u64,
}

impl SpecResult {
    /// Create an empty spec result
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            assertions: Vec::new(),
            duration_ms: 0,
        }
    }
}

/// Report returned to the host runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultReport {
    /// Number of assertions counted as failures; never decremented
    pub failed_count: usize,
    /// Spec results; the plugin always reports exactly one
    pub spec_results: Vec<SpecResult>,
}

impl Default for ResultReport {
    fn default() -> Self {
        Self {
            failed_count: 0,
            spec_results: vec![SpecResult::new(SPEC_DESCRIPTION)],
        }
    }
}

impl ResultReport {
    /// Create a fresh report
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All logged assertions, across spec results
    #[must_use]
    pub fn assertions(&self) -> Vec<&AssertionEntry> {
        self.spec_results
            .iter()
            .flat_map(|s| s.assertions.iter())
            .collect()
    }

    /// Whether anything was counted as a failure
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed_count > 0
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Which logged assertions are recorded and which are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssertionPolicy {
    /// Append logged assertions to the report
    pub log_assertions: bool,
    /// Count every logged assertion as a failure
    pub fail_assertions: bool,
}

#[derive(Debug, Default)]
struct CollectorState {
    policy: AssertionPolicy,
    report: ResultReport,
}

/// Shared, process-wide result collector
///
/// Cloning yields another handle onto the same report.
#[derive(Debug, Clone, Default)]
pub struct ResultCollector {
    state: Arc<Mutex<CollectorState>>,
}

impl ResultCollector {
    /// Create a collector with a fresh report and the default policy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector with `policy`
    #[must_use]
    pub fn with_policy(policy: AssertionPolicy) -> Self {
        let collector = Self::new();
        collector.set_policy(policy);
        collector
    }

    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the active policy
    pub fn set_policy(&self, policy: AssertionPolicy) {
        self.lock().policy = policy;
    }

    /// Active policy
    #[must_use]
    pub fn policy(&self) -> AssertionPolicy {
        self.lock().policy
    }

    /// Log an assertion.
    ///
    /// Recorded when `log_assertions` is on; counted when `fail_assertions`
    /// is on or `force_fail` is set.
    pub fn log_assertion(&self, message: impl Into<String>, force_fail: bool) {
        let severity = if force_fail {
            Severity::Error
        } else {
            Severity::Warning
        };
        let mut state = self.lock();
        let policy = state.policy;

        if policy.log_assertions {
            if state.report.spec_results.is_empty() {
                state
                    .report
                    .spec_results
                    .push(SpecResult::new(SPEC_DESCRIPTION));
            }
            state.report.spec_results[0].assertions.push(AssertionEntry {
                passed: false,
                error_msg: message.into(),
                severity,
            });
        }
        if policy.fail_assertions || force_fail {
            state.report.failed_count += 1;
        }
    }

    /// Log a warning-level assertion
    pub fn warning(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.log_assertion(message, false);
    }

    /// Log an error-level assertion; always counted as a failure
    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{message}");
        self.log_assertion(message, true);
    }

    /// Copy of the current report
    #[must_use]
    pub fn snapshot(&self) -> ResultReport {
        self.lock().report.clone()
    }

    /// Current failure count
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.lock().report.failed_count
    }
}
