//! Property-based tests for navcov.
//!
//! Uses proptest to check that preservation is transparent to the wrapped
//! function and that failures never escape or multiply.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use navcov::prelude::*;
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn coverage_blob() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z/]{1,12}\\.js", 0u64..1000, 0..6).prop_map(|files| {
        Value::Object(
            files
                .into_iter()
                .map(|(file, hits)| (file, json!({"s": {"0": hits}})))
                .collect::<Map<String, Value>>(),
        )
    })
}

fn logging_preserver(driver: &Arc<MockDriver>) -> (CoveragePreserver, ResultCollector) {
    let collector = ResultCollector::with_policy(AssertionPolicy {
        log_assertions: true,
        fail_assertions: false,
    });
    let preserver = CoveragePreserver::new(
        ScriptChannel::with_driver(driver.clone()),
        collector.clone(),
    );
    (preserver, collector)
}

proptest! {
    /// Setup installs exactly one proxy per configured binding, in order.
    #[test]
    fn prop_one_proxy_per_binding(
        keys in prop::collection::btree_set("[a-z]{1,10}", 0..8)
    ) {
        let host = Arc::new(HostObject::new("browser"));
        let mut builder = PluginConfig::builder();
        for key in &keys {
            host.define(key.as_str(), |_| Ok(Value::Null));
            builder = builder.wrap(TargetBinding::from_host(&host, key).unwrap());
        }
        let mut plugin = CoveragePlugin::new();
        plugin.setup(builder.build().unwrap(), None).unwrap();

        let installed: Vec<&str> = plugin
            .capabilities()
            .unwrap()
            .proxies()
            .iter()
            .map(Proxy::key)
            .collect();
        let expected: Vec<&str> = keys.iter().map(String::as_str).collect();
        prop_assert_eq!(installed, expected);
        prop_assert!(keys.iter().all(|key| host.is_proxied(key)));
    }

    /// Whatever was in the page before a navigating call is there after it.
    #[test]
    fn prop_navigation_keeps_blob(blob in coverage_blob(), url in "/[a-z]{0,8}") {
        let driver = Arc::new(MockDriver::with_coverage(blob.clone()));
        let (preserver, collector) = logging_preserver(&driver);
        let page = Arc::clone(&driver);
        let original = target_fn(move |_| {
            page.navigate(&url);
            Ok(Value::Null)
        });

        let outcome = block_on(preserver.preserve_detailed(&original, vec![]));

        prop_assert!(outcome.is_clean());
        prop_assert_eq!(driver.page_coverage(), Some(blob));
        prop_assert_eq!(collector.snapshot().assertions().len(), 0);
    }

    /// Arguments reach the original unchanged and its value comes back.
    #[test]
    fn prop_arguments_and_value_pass_through(
        args in prop::collection::vec(any::<i64>().prop_map(|n| json!(n)), 0..8)
    ) {
        let driver = Arc::new(MockDriver::with_coverage(json!({})));
        let (preserver, _) = logging_preserver(&driver);
        let original = target_fn(|args| Ok(Value::Array(args.to_vec())));

        let value = block_on(preserver.preserve(&original, args.clone()));

        prop_assert_eq!(value, Some(Value::Array(args)));
    }

    /// Any mix of stage failures yields at most one logged assertion.
    #[test]
    fn prop_failures_log_at_most_once(
        capture_fails in any::<bool>(),
        call_fails in any::<bool>(),
        restore_fails in any::<bool>()
    ) {
        let driver = Arc::new(MockDriver::with_coverage(json!({"a": 1})));
        driver.fail_next_captures(usize::from(capture_fails));
        driver.fail_next_restores(usize::from(restore_fails));
        let (preserver, collector) = logging_preserver(&driver);
        let original = target_fn(move |_| {
            if call_fails {
                Err(NavcovError::target("boom"))
            } else {
                Ok(json!("ok"))
            }
        });

        let outcome = block_on(preserver.preserve_detailed(&original, vec![]));

        // A failed capture means no restore is attempted at all.
        let expected_failures = usize::from(capture_fails)
            + usize::from(call_fails)
            + usize::from(restore_fails && !capture_fails);
        prop_assert_eq!(outcome.failed_phases.len(), expected_failures);
        prop_assert_eq!(outcome.value.is_some(), !call_fails);
        let logged = collector.snapshot().assertions().len();
        prop_assert_eq!(logged, usize::from(expected_failures > 0));
        prop_assert_eq!(collector.failed_count(), 0);
    }
}
