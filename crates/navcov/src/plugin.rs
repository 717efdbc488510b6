//! Plugin facade exposed to the host test runner.
//!
//! ```text
//!              setup(config, driver)
//! Unconfigured ─────────┬──────────────► Enabled(Capabilities)
//!                       └──enabled=false──► Disabled
//! ```
//!
//! The state is picked once. `Disabled` carries no capabilities at all:
//! nothing is wrapped and there is no post-test snapshot to run.

use crate::channel::ScriptChannel;
use crate::config::PluginConfig;
use crate::driver::ScriptDriver;
use crate::preserve::{CoveragePreserver, OperationGate};
use crate::reporter::{ResultCollector, ResultReport};
use crate::result::{NavcovError, NavcovResult};
use crate::snapshot::CoverageSnapshotter;
use crate::target::{install, Proxy, TargetFn};
use crate::writer::{FsJsonWriter, JsonWriter};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Lifecycle hooks the host runner calls
#[async_trait]
pub trait RunnerPlugin: Send + Sync {
    /// Configure once, before any test runs.
    ///
    /// # Errors
    ///
    /// `Argument` for an invalid configuration, `InvalidState` if already set up.
    fn setup(
        &mut self,
        config: PluginConfig,
        driver: Option<Arc<dyn ScriptDriver>>,
    ) -> NavcovResult<()>;

    /// Called after every test. `None` when the plugin has no post-test hook.
    async fn post_test(&self) -> Option<ResultReport>;

    /// Called once at the end of the run.
    async fn teardown(&self) -> ResultReport;
}

/// What an enabled plugin can do
#[derive(Debug)]
pub struct Capabilities {
    preserver: Arc<CoveragePreserver>,
    snapshotter: CoverageSnapshotter,
    proxies: Vec<Proxy>,
}

impl Capabilities {
    /// Run `original` with coverage preserved around it
    pub async fn preserve_coverage(&self, original: &TargetFn, args: Vec<Value>) -> Option<Value> {
        self.preserver.preserve(original, args).await
    }

    /// Snapshot coverage to disk and return the current report
    pub async fn post_test(&self) -> ResultReport {
        self.snapshotter.post_test().await
    }

    /// Proxies installed during setup, in configuration order
    #[must_use]
    pub fn proxies(&self) -> &[Proxy] {
        &self.proxies
    }

    /// Shared preservation operation
    #[must_use]
    pub const fn preserver(&self) -> &Arc<CoveragePreserver> {
        &self.preserver
    }

    /// Post-test snapshotter
    #[must_use]
    pub const fn snapshotter(&self) -> &CoverageSnapshotter {
        &self.snapshotter
    }
}

/// Lifecycle state, chosen once by `setup`
#[derive(Debug, Default)]
pub enum PluginState {
    /// `setup` has not run
    #[default]
    Unconfigured,
    /// Set up and active
    Enabled(Capabilities),
    /// Set up with `enabled = false`
    Disabled,
}

/// Coverage-preserving test runner plugin
pub struct CoveragePlugin {
    channel: ScriptChannel,
    writer: Arc<dyn JsonWriter>,
    collector: ResultCollector,
    state: PluginState,
}

impl fmt::Debug for CoveragePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoveragePlugin")
            .field("channel", &self.channel)
            .field("state", &self.state)
            .finish()
    }
}

impl Default for CoveragePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl CoveragePlugin {
    /// Create an unconfigured plugin writing snapshots to the filesystem
    #[must_use]
    pub fn new() -> Self {
        Self::with_writer(Arc::new(FsJsonWriter::new()))
    }

    /// Create an unconfigured plugin using `writer` for snapshots
    #[must_use]
    pub fn with_writer(writer: Arc<dyn JsonWriter>) -> Self {
        Self {
            channel: ScriptChannel::new(),
            writer,
            collector: ResultCollector::new(),
            state: PluginState::Unconfigured,
        }
    }

    /// Bind (or rebind) the driver after setup
    pub fn set_driver(&self, driver: Arc<dyn ScriptDriver>) {
        self.channel.set_driver(driver);
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> &PluginState {
        &self.state
    }

    /// Capabilities, present only when set up and enabled
    #[must_use]
    pub const fn capabilities(&self) -> Option<&Capabilities> {
        match &self.state {
            PluginState::Enabled(capabilities) => Some(capabilities),
            PluginState::Unconfigured | PluginState::Disabled => None,
        }
    }

    /// Whether the plugin is set up and enabled
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.capabilities().is_some()
    }

    /// Shared result collector
    #[must_use]
    pub const fn collector(&self) -> &ResultCollector {
        &self.collector
    }

    fn enable(&self, config: &PluginConfig) -> Capabilities {
        let gate = config.serialize_operations().then(OperationGate::default);

        let mut preserver = CoveragePreserver::new(self.channel.clone(), self.collector.clone());
        let mut snapshotter = CoverageSnapshotter::new(
            self.channel.clone(),
            Arc::clone(&self.writer),
            self.collector.clone(),
            config.output_directory(),
        );
        if let Some(gate) = gate {
            preserver = preserver.with_gate(Arc::clone(&gate));
            snapshotter = snapshotter.with_gate(gate);
        }
        let preserver = Arc::new(preserver);

        let proxies = config
            .wrapped_targets()
            .iter()
            .map(|binding| install(binding, Arc::clone(&preserver)))
            .collect();

        Capabilities {
            preserver,
            snapshotter,
            proxies,
        }
    }
}

#[async_trait]
impl RunnerPlugin for CoveragePlugin {
    fn setup(
        &mut self,
        config: PluginConfig,
        driver: Option<Arc<dyn ScriptDriver>>,
    ) -> NavcovResult<()> {
        if !matches!(self.state, PluginState::Unconfigured) {
            return Err(NavcovError::invalid_state("plugin is already set up"));
        }
        // Bindings may have gone stale since the config was built.
        config.validate()?;
        self.collector.set_policy(config.assertion_policy());

        if !config.enabled() {
            tracing::info!("coverage preservation disabled");
            self.state = PluginState::Disabled;
            return Ok(());
        }

        if let Some(driver) = driver {
            self.channel.set_driver(driver);
        }
        let capabilities = self.enable(&config);
        tracing::info!(
            output = %config.output_directory().display(),
            proxies = capabilities.proxies.len(),
            serialized = config.serialize_operations(),
            "coverage preservation enabled"
        );
        self.state = PluginState::Enabled(capabilities);
        Ok(())
    }

    async fn post_test(&self) -> Option<ResultReport> {
        match self.capabilities() {
            Some(capabilities) => Some(capabilities.post_test().await),
            None => None,
        }
    }

    async fn teardown(&self) -> ResultReport {
        let report = self.collector.snapshot();
        tracing::debug!(failed = report.failed_count, "coverage plugin teardown");
        report
    }
}
