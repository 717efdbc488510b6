//! ScriptDriver - Abstract Remote Script Execution
//!
//! Navcov never drives the browser itself. Everything it needs from the page
//! goes through one capability: run a script body in the page context, with
//! WebDriver `executeScript` semantics (the body sees its inputs as
//! `arguments`), and hand back the JSON result.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  ScriptDriver (Abstract Trait)                                   │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────┐  ┌─────────────────────┐                │
//! │  │  ChromiumDriver     │  │  MockDriver         │                │
//! │  │  (feature browser)  │  │  (Unit Tests)       │                │
//! │  │  CDP Runtime.eval   │  │  in-memory page     │                │
//! │  └─────────────────────┘  └─────────────────────┘                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Connection and session teardown belong to whoever owns the driver.

use crate::channel::{CAPTURE_COVERAGE_SCRIPT, RESTORE_COVERAGE_SCRIPT};
use crate::result::{NavcovError, NavcovResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Abstract driver trait for in-page script execution
///
/// # Implementations
///
/// - `ChromiumDriver` - uses chromiumoxide (feature `browser`)
/// - `MockDriver` - for unit testing
#[async_trait]
pub trait ScriptDriver: Send + Sync {
    /// Execute `script` as a function body in the page context.
    ///
    /// `args` are exposed to the body as `arguments[0..]`. The body's return
    /// value comes back as JSON; `undefined` comes back as `Value::Null`.
    async fn execute_script(&self, script: &str, args: Vec<Value>) -> NavcovResult<Value>;
}

/// A single recorded driver invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCall {
    /// Script body as received
    pub script: String,
    /// Arguments passed alongside the body
    pub args: Vec<Value>,
}

#[derive(Debug, Default)]
struct MockPage {
    url: String,
    coverage: Option<Value>,
    coverage_on_load: Option<Value>,
    js_results: Vec<Value>,
    calls: Vec<ScriptCall>,
    failing_captures: usize,
    failing_restores: usize,
    fail_everything: bool,
}

/// Mock driver for unit testing
///
/// Models a single page holding an Istanbul-style `__coverage__` global.
/// Navigating the mock page replaces that global with the configured
/// on-load value, which is exactly what a real navigation does to
/// in-page instrumentation counters.
#[derive(Debug, Default)]
pub struct MockDriver {
    page: Mutex<MockPage>,
    latency: Option<Duration>,
}

impl MockDriver {
    /// Create new mock driver with an empty page and no `__coverage__`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock driver whose page already holds `coverage`
    #[must_use]
    pub fn with_coverage(coverage: Value) -> Self {
        let driver = Self::default();
        driver.page().coverage = Some(coverage);
        driver
    }

    /// Delay every script execution by `latency`
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn page(&self) -> MutexGuard<'_, MockPage> {
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate a navigation: the new page starts with the on-load coverage
    pub fn navigate(&self, url: &str) {
        let mut page = self.page();
        page.url = url.to_string();
        page.coverage = page.coverage_on_load.clone();
    }

    /// Coverage a freshly loaded page starts with (default: none)
    pub fn set_coverage_on_load(&self, coverage: Option<Value>) {
        self.page().coverage_on_load = coverage;
    }

    /// Overwrite the in-page `__coverage__` global
    pub fn set_page_coverage(&self, coverage: Option<Value>) {
        self.page().coverage = coverage;
    }

    /// Current in-page `__coverage__` global
    #[must_use]
    pub fn page_coverage(&self) -> Option<Value> {
        self.page().coverage.clone()
    }

    /// Current page URL
    #[must_use]
    pub fn current_url(&self) -> String {
        self.page().url.clone()
    }

    /// Queue a result for scripts other than the coverage scripts
    pub fn set_js_result(&self, result: Value) {
        self.page().js_results.push(result);
    }

    /// Make the next `count` coverage captures fail
    pub fn fail_next_captures(&self, count: usize) {
        self.page().failing_captures = count;
    }

    /// Make the next `count` coverage restores fail
    pub fn fail_next_restores(&self, count: usize) {
        self.page().failing_restores = count;
    }

    /// Make every script execution fail until switched off again
    pub fn fail_all(&self, fail: bool) {
        self.page().fail_everything = fail;
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<ScriptCall> {
        self.page().calls.clone()
    }

    /// Number of recorded calls running exactly `script`
    #[must_use]
    pub fn call_count(&self, script: &str) -> usize {
        self.page().calls.iter().filter(|c| c.script == script).count()
    }

    /// Check if `script` was executed at least once
    #[must_use]
    pub fn was_called(&self, script: &str) -> bool {
        self.call_count(script) > 0
    }

    fn run(&self, script: &str, args: Vec<Value>) -> NavcovResult<Value> {
        let mut page = self.page();
        page.calls.push(ScriptCall {
            script: script.to_string(),
            args: args.clone(),
        });

        if page.fail_everything {
            return Err(NavcovError::script_execution("mock driver is failing"));
        }

        match script {
            CAPTURE_COVERAGE_SCRIPT => {
                if page.failing_captures > 0 {
                    page.failing_captures -= 1;
                    return Err(NavcovError::script_execution("mock capture failure"));
                }
                Ok(page.coverage.clone().unwrap_or(Value::Null))
            }
            RESTORE_COVERAGE_SCRIPT => {
                if page.failing_restores > 0 {
                    page.failing_restores -= 1;
                    return Err(NavcovError::script_execution("mock restore failure"));
                }
                page.coverage = args.into_iter().next();
                Ok(Value::Null)
            }
            _ => Ok(page.js_results.first().cloned().unwrap_or(Value::Null)),
        }
    }
}

#[async_trait]
impl ScriptDriver for MockDriver {
    async fn execute_script(&self, script: &str, args: Vec<Value>) -> NavcovResult<Value> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.run(script, args)
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
mod cdp {
    use super::*;
    use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
    use chromiumoxide::page::Page as CdpPage;
    use std::sync::Arc;

    /// Script driver backed by a live Chromium page
    ///
    /// CDP has no `executeScript`, so the body is wrapped in a function and
    /// applied to the JSON-encoded argument list.
    #[derive(Debug, Clone)]
    pub struct ChromiumDriver {
        inner: Arc<tokio::sync::Mutex<CdpPage>>,
    }

    impl ChromiumDriver {
        /// Drive an already opened page
        #[must_use]
        pub fn new(page: CdpPage) -> Self {
            Self {
                inner: Arc::new(tokio::sync::Mutex::new(page)),
            }
        }

        fn wrap(script: &str, args: &[Value]) -> NavcovResult<String> {
            let args = serde_json::to_string(args)?;
            Ok(format!("(function() {{ {script} }}).apply(window, {args})"))
        }
    }

    #[async_trait]
    impl ScriptDriver for ChromiumDriver {
        async fn execute_script(&self, script: &str, args: Vec<Value>) -> NavcovResult<Value> {
            let params = EvaluateParams::builder()
                .expression(Self::wrap(script, &args)?)
                .return_by_value(true)
                .await_promise(true)
                .build()
                .map_err(NavcovError::script_execution)?;

            let page = self.inner.lock().await;
            let result = page
                .evaluate_expression(params)
                .await
                .map_err(|e| NavcovError::script_execution(e.to_string()))?;
            Ok(result.value().cloned().unwrap_or(Value::Null))
        }
    }

}

#[cfg(feature = "browser")]
pub use cdp::ChromiumDriver;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod mock_page_tests {
        use super::*;

        #[test]
        fn test_mock_driver_creation() {
            let driver = MockDriver::new();
            assert!(driver.history().is_empty());
            assert!(driver.page_coverage().is_none());
            assert!(driver.current_url().is_empty());
        }

        #[test]
        fn test_navigate_resets_coverage() {
            let driver = MockDriver::with_coverage(json!({"a.js": {"s": {"1": 4}}}));
            driver.navigate("http://localhost/next");
            assert!(driver.page_coverage().is_none());
            assert_eq!(driver.current_url(), "http://localhost/next");
        }

        #[test]
        fn test_navigate_uses_on_load_coverage() {
            let driver = MockDriver::new();
            driver.set_coverage_on_load(Some(json!({"fresh": true})));
            driver.navigate("http://localhost/");
            assert_eq!(driver.page_coverage(), Some(json!({"fresh": true})));
        }
    }

    mod async_driver_tests {
        use super::*;

        #[tokio::test]
        async fn test_capture_returns_page_coverage() {
            let driver = MockDriver::with_coverage(json!({"coverage": "object"}));
            let value = driver
                .execute_script(CAPTURE_COVERAGE_SCRIPT, vec![])
                .await
                .unwrap();
            assert_eq!(value, json!({"coverage": "object"}));
            assert!(driver.was_called(CAPTURE_COVERAGE_SCRIPT));
        }

        #[tokio::test]
        async fn test_capture_of_undefined_is_null() {
            let driver = MockDriver::new();
            let value = driver
                .execute_script(CAPTURE_COVERAGE_SCRIPT, vec![])
                .await
                .unwrap();
            assert_eq!(value, Value::Null);
        }

        #[tokio::test]
        async fn test_restore_sets_page_coverage() {
            let driver = MockDriver::new();
            driver
                .execute_script(RESTORE_COVERAGE_SCRIPT, vec![json!({"x": 1})])
                .await
                .unwrap();
            assert_eq!(driver.page_coverage(), Some(json!({"x": 1})));
            assert_eq!(driver.history()[0].args, vec![json!({"x": 1})]);
        }

        #[tokio::test]
        async fn test_failures_are_counted_down() {
            let driver = MockDriver::with_coverage(json!(1));
            driver.fail_next_captures(1);
            assert!(driver
                .execute_script(CAPTURE_COVERAGE_SCRIPT, vec![])
                .await
                .is_err());
            assert!(driver
                .execute_script(CAPTURE_COVERAGE_SCRIPT, vec![])
                .await
                .is_ok());
            assert_eq!(driver.call_count(CAPTURE_COVERAGE_SCRIPT), 2);
        }

        #[tokio::test]
        async fn test_fail_all() {
            let driver = MockDriver::new();
            driver.fail_all(true);
            let err = driver
                .execute_script("return 1;", vec![])
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "ScriptExecutionError");
        }

        #[tokio::test]
        async fn test_other_scripts_use_js_results() {
            let driver = MockDriver::new();
            driver.set_js_result(json!("script return value"));
            let value = driver
                .execute_script("return document.title;", vec![])
                .await
                .unwrap();
            assert_eq!(value, json!("script return value"));
        }
    }
}
