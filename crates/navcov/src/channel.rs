//! Remote execution channel.
//!
//! Wraps the one pluggable [`ScriptDriver`] and exposes "run script, get
//! result". The driver is injected explicitly (at construction or later via
//! [`ScriptChannel::set_driver`]) so the channel can be shared by every
//! installed proxy without any ambient global.

use crate::driver::ScriptDriver;
use crate::result::{NavcovError, NavcovResult};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Reads the in-page Istanbul coverage global.
pub const CAPTURE_COVERAGE_SCRIPT: &str = "return __coverage__;";

/// Writes its sole argument back into the in-page Istanbul coverage global.
pub const RESTORE_COVERAGE_SCRIPT: &str = "__coverage__ = arguments[0];";

/// Shared handle onto the remote page
#[derive(Clone, Default)]
pub struct ScriptChannel {
    driver: Arc<RwLock<Option<Arc<dyn ScriptDriver>>>>,
}

impl fmt::Debug for ScriptChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptChannel")
            .field("driver_bound", &self.has_driver())
            .finish()
    }
}

impl ScriptChannel {
    /// Create a channel with no driver bound yet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel bound to `driver`
    #[must_use]
    pub fn with_driver(driver: Arc<dyn ScriptDriver>) -> Self {
        let channel = Self::new();
        channel.set_driver(driver);
        channel
    }

    /// Bind (or rebind) the driver used for every subsequent script
    pub fn set_driver(&self, driver: Arc<dyn ScriptDriver>) {
        let mut slot = self.driver.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(driver);
    }

    /// Whether a driver is currently bound
    #[must_use]
    pub fn has_driver(&self) -> bool {
        self.driver
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn current_driver(&self) -> NavcovResult<Arc<dyn ScriptDriver>> {
        self.driver
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| NavcovError::interface("no driver has been set, can't execute script"))
    }

    /// Run `script` in the page with `args` as its `arguments`.
    ///
    /// # Errors
    ///
    /// - `Argument` if the script is blank
    /// - `Interface` if no driver is bound
    /// - `ScriptExecution` if the driver reports a failure
    ///
    /// The first two are raised before the driver is touched.
    pub async fn execute_script(&self, script: &str, args: Vec<Value>) -> NavcovResult<Value> {
        if script.trim().is_empty() {
            return Err(NavcovError::argument("must provide a script for executing"));
        }
        let driver = self.current_driver()?;

        tracing::trace!(script, args = args.len(), "executing remote script");
        driver
            .execute_script(script, args)
            .await
            .map_err(|e| match e {
                NavcovError::ScriptExecution { .. } => e,
                other => NavcovError::script_execution(other.to_string()),
            })
    }

    /// Read the in-page coverage blob
    pub async fn capture_coverage(&self) -> NavcovResult<Value> {
        self.execute_script(CAPTURE_COVERAGE_SCRIPT, Vec::new()).await
    }

    /// Push `blob` back into the page's coverage global
    pub async fn restore_coverage(&self, blob: Value) -> NavcovResult<()> {
        self.execute_script(RESTORE_COVERAGE_SCRIPT, vec![blob])
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockDriver;
    use serde_json::json;

    mod channel_tests {
        use super::*;

        #[tokio::test]
        async fn test_uses_underlying_driver() {
            let driver = Arc::new(MockDriver::new());
            driver.set_js_result(json!("script return value"));
            let channel = ScriptChannel::with_driver(driver.clone());

            let value = channel
                .execute_script("valid script chunk;", vec![])
                .await
                .unwrap();
            assert_eq!(value, json!("script return value"));
            assert!(driver.was_called("valid script chunk;"));
        }

        #[tokio::test]
        async fn test_driver_failure_is_script_execution_error() {
            let driver = Arc::new(MockDriver::new());
            driver.fail_all(true);
            let channel = ScriptChannel::with_driver(driver);

            let err = channel
                .execute_script("valid script chunk;", vec![])
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "ScriptExecutionError");
        }

        #[tokio::test]
        async fn test_blank_script_is_argument_error() {
            let driver = Arc::new(MockDriver::new());
            let channel = ScriptChannel::with_driver(driver.clone());

            let err = channel.execute_script("   ", vec![]).await.unwrap_err();
            assert_eq!(err.kind(), "ArgumentError");
            assert!(driver.history().is_empty());
        }

        #[tokio::test]
        async fn test_missing_driver_is_interface_error() {
            let channel = ScriptChannel::new();
            assert!(!channel.has_driver());

            let err = channel
                .execute_script("valid script chunk;", vec![])
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "InterfaceError");
        }

        #[tokio::test]
        async fn test_rebinding_driver() {
            let first = Arc::new(MockDriver::new());
            let second = Arc::new(MockDriver::new());
            let channel = ScriptChannel::with_driver(first.clone());
            channel.set_driver(second.clone());

            channel.capture_coverage().await.unwrap();
            assert!(first.history().is_empty());
            assert_eq!(second.call_count(CAPTURE_COVERAGE_SCRIPT), 1);
        }
    }

    mod coverage_script_tests {
        use super::*;

        #[tokio::test]
        async fn test_capture_and_restore_round_trip_blob() {
            let blob = json!({"app.js": {"s": {"1": 3}}});
            let driver = Arc::new(MockDriver::with_coverage(blob.clone()));
            let channel = ScriptChannel::with_driver(driver.clone());

            let captured = channel.capture_coverage().await.unwrap();
            driver.navigate("http://localhost/other");
            channel.restore_coverage(captured).await.unwrap();

            assert_eq!(driver.page_coverage(), Some(blob));
            let history = driver.history();
            assert_eq!(history[0].script, "return __coverage__;");
            assert_eq!(history[1].script, "__coverage__ = arguments[0];");
        }

        #[test]
        fn test_channel_is_debug() {
            let channel = ScriptChannel::new();
            assert!(format!("{channel:?}").contains("driver_bound: false"));
        }
    }
}
