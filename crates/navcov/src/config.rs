//! Plugin configuration.
//!
//! [`PluginOptions`] is the plain, serializable part that a host runner hands
//! over as JSON or YAML. [`PluginConfig`] adds the target bindings and is only
//! obtainable through validation, so a `PluginConfig` in hand is always
//! well-formed.

use crate::reporter::AssertionPolicy;
use crate::result::{NavcovError, NavcovResult};
use crate::target::TargetBinding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Serializable plugin options
///
/// Missing fields take their defaults, so `{}` is a valid options document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginOptions {
    /// Directory coverage snapshots are written into
    pub output_path: String,
    /// Whether the plugin does anything at all
    pub enabled: bool,
    /// Record logged assertions in the report
    pub log_assertions: bool,
    /// Count every logged assertion as a failure
    pub fail_assertions: bool,
    /// Run preserve/snapshot sequences one at a time
    pub serialize_operations: bool,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            output_path: ".".to_string(),
            enabled: true,
            log_assertions: false,
            fail_assertions: false,
            serialize_operations: true,
        }
    }
}

impl PluginOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON
    ///
    /// # Errors
    ///
    /// `Argument` if the document is malformed or a field has the wrong type.
    pub fn from_json_str(json: &str) -> NavcovResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| NavcovError::argument(format!("invalid plugin options: {e}")))
    }

    /// Parse options from YAML
    ///
    /// # Errors
    ///
    /// `Argument` if the document is malformed or a field has the wrong type.
    pub fn from_yaml_str(yaml: &str) -> NavcovResult<Self> {
        serde_yaml_ng::from_str(yaml)
            .map_err(|e| NavcovError::argument(format!("invalid plugin options: {e}")))
    }

    /// Load options from a `.json`, `.yaml` or `.yml` file
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `Argument` if it does not parse.
    pub fn from_path(path: impl AsRef<Path>) -> NavcovResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    /// Check the options on their own
    ///
    /// # Errors
    ///
    /// `Argument` if the output path is blank.
    pub fn validate(&self) -> NavcovResult<()> {
        if self.output_path.trim().is_empty() {
            return Err(NavcovError::argument("outputPath must be a non-empty path"));
        }
        Ok(())
    }
}

/// Validated plugin configuration
#[derive(Debug, Clone)]
pub struct PluginConfig {
    options: PluginOptions,
    targets: Vec<TargetBinding>,
}

impl PluginConfig {
    /// Start building a configuration
    #[must_use]
    pub fn builder() -> PluginConfigBuilder {
        PluginConfigBuilder::default()
    }

    /// Validate `options` together with `targets`
    ///
    /// # Errors
    ///
    /// `Argument` on the first invalid option or binding.
    pub fn from_options(options: PluginOptions, targets: Vec<TargetBinding>) -> NavcovResult<Self> {
        let config = Self { options, targets };
        config.validate()?;
        Ok(config)
    }

    /// Re-check every option and binding
    ///
    /// # Errors
    ///
    /// `Argument` on the first invalid option or binding.
    pub fn validate(&self) -> NavcovResult<()> {
        self.options.validate()?;
        self.targets.iter().try_for_each(TargetBinding::validate)
    }

    /// Directory snapshots are written into
    #[must_use]
    pub fn output_directory(&self) -> PathBuf {
        PathBuf::from(&self.options.output_path)
    }

    /// Bindings to wrap, in order
    #[must_use]
    pub fn wrapped_targets(&self) -> &[TargetBinding] {
        &self.targets
    }

    /// Whether the plugin is enabled
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.options.enabled
    }

    /// Whether preserve/snapshot sequences are serialized
    #[must_use]
    pub const fn serialize_operations(&self) -> bool {
        self.options.serialize_operations
    }

    /// Assertion logging policy
    #[must_use]
    pub const fn assertion_policy(&self) -> AssertionPolicy {
        AssertionPolicy {
            log_assertions: self.options.log_assertions,
            fail_assertions: self.options.fail_assertions,
        }
    }

    /// Underlying options
    #[must_use]
    pub const fn options(&self) -> &PluginOptions {
        &self.options
    }
}

/// Builder for [`PluginConfig`]
#[derive(Debug, Clone, Default)]
pub struct PluginConfigBuilder {
    options: PluginOptions,
    targets: Vec<TargetBinding>,
}

impl PluginConfigBuilder {
    /// Replace all options at once
    #[must_use]
    pub fn options(mut self, options: PluginOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the output directory
    #[must_use]
    pub fn output_directory(mut self, path: impl AsRef<Path>) -> Self {
        self.options.output_path = path.as_ref().to_string_lossy().into_owned();
        self
    }

    /// Add a target to wrap
    #[must_use]
    pub fn wrap(mut self, binding: TargetBinding) -> Self {
        self.targets.push(binding);
        self
    }

    /// Set enabled
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.options.enabled = enabled;
        self
    }

    /// Set assertion logging
    #[must_use]
    pub const fn log_assertions(mut self, log: bool) -> Self {
        self.options.log_assertions = log;
        self
    }

    /// Set assertion failing
    #[must_use]
    pub const fn fail_assertions(mut self, fail: bool) -> Self {
        self.options.fail_assertions = fail;
        self
    }

    /// Set operation serialization
    #[must_use]
    pub const fn serialize_operations(mut self, serialize: bool) -> Self {
        self.options.serialize_operations = serialize;
        self
    }

    /// Validate and build
    ///
    /// # Errors
    ///
    /// `Argument` on the first invalid option or binding.
    pub fn build(self) -> NavcovResult<PluginConfig> {
        PluginConfig::from_options(self.options, self.targets)
    }
}
