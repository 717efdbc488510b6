//! Navcov: Coverage Preservation Across Page Navigations
//!
//! Istanbul-instrumented pages keep their counters in a page-global
//! `__coverage__` object, and a navigation wipes it. Navcov wraps the test
//! runner's navigation functions so every call captures the blob before the
//! call and writes it back after, then snapshots it to disk once per test.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    NAVCOV Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ HostObject │    │ Coverage   │    │ Script     │            │
//! │   │ (proxied   │───►│ Preserver  │───►│ Channel    │──► page    │
//! │   │  slots)    │    │            │    │            │            │
//! │   └────────────┘    └─────┬──────┘    └────────────┘            │
//! │                           │                 ▲                   │
//! │                           ▼                 │                   │
//! │                    ┌────────────┐    ┌────────────┐             │
//! │                    │ Result     │◄───│ Snapshotter│──► disk     │
//! │                    │ Collector  │    │ (postTest) │             │
//! │                    └────────────┘    └────────────┘             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod channel;
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
mod config;
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
mod driver;
mod logging;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod plugin;
mod preserve;
mod reporter;
mod result;
mod snapshot;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod target;
mod writer;

pub use channel::{ScriptChannel, CAPTURE_COVERAGE_SCRIPT, RESTORE_COVERAGE_SCRIPT};
pub use config::{PluginConfig, PluginConfigBuilder, PluginOptions};
#[cfg(feature = "browser")]
pub use driver::ChromiumDriver;
pub use driver::{MockDriver, ScriptCall, ScriptDriver};
pub use logging::{env_filter, init_logging, LogFormat, DEFAULT_FILTER};
pub use plugin::{Capabilities, CoveragePlugin, PluginState, RunnerPlugin};
pub use preserve::{CoveragePreserver, OperationGate, PreserveOutcome, PreservePhase};
pub use reporter::{
    AssertionEntry, AssertionPolicy, ResultCollector, ResultReport, Severity, SpecResult,
    SPEC_DESCRIPTION,
};
pub use result::{NavcovError, NavcovResult};
pub use snapshot::{CoverageSnapshotter, SnapshotOutcome};
pub use target::{
    install, target_fn, wrap, HostObject, Proxy, ProxyFn, Slot, TargetBinding, TargetFn,
};
pub use writer::{FsJsonWriter, JsonWriter};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::channel::*;
    pub use super::config::*;
    pub use super::driver::*;
    pub use super::plugin::*;
    pub use super::preserve::*;
    pub use super::reporter::*;
    pub use super::result::*;
    pub use super::snapshot::*;
    pub use super::target::*;
    pub use super::writer::*;
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
