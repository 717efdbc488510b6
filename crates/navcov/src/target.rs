//! Wrapped targets and proxy installation.
//!
//! A [`HostObject`] is a table of named callables, the call sites that
//! application and test code go through. Wrapping a target replaces the
//! callable stored under its key with a proxy that closes over the original
//! function and the shared [`CoveragePreserver`]; every later call through
//! the host then runs capture → call → restore.
//!
//! ```ignore
//! let page = Arc::new(HostObject::new("page"));
//! page.define("navigate", move |args| { /* ... */ Ok(Value::Null) });
//!
//! let binding = TargetBinding::from_host(&page, "navigate")?;
//! install(&binding, preserver);
//!
//! // Routed through the proxy from now on.
//! page.invoke("navigate", vec![json!("/next")]).await?;
//! ```

use crate::preserve::CoveragePreserver;
use crate::result::{NavcovError, NavcovResult};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// An original, synchronous target function taking any number of arguments.
///
/// An `Err` plays the part of a thrown exception.
pub type TargetFn = Arc<dyn Fn(&[Value]) -> NavcovResult<Value> + Send + Sync>;

/// An installed proxy: resolves to the original's return value, or `None`
/// when the original failed.
pub type ProxyFn = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Option<Value>> + Send + Sync>;

/// Box a closure as a [`TargetFn`]
pub fn target_fn<F>(f: F) -> TargetFn
where
    F: Fn(&[Value]) -> NavcovResult<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap `original` so that calling the result runs it through `preserver`.
#[must_use]
pub fn wrap(original: TargetFn, preserver: Arc<CoveragePreserver>) -> ProxyFn {
    Arc::new(move |args: Vec<Value>| {
        let original = Arc::clone(&original);
        let preserver = Arc::clone(&preserver);
        async move { preserver.preserve(&original, args).await }.boxed()
    })
}

/// A proxy installed in a host slot
#[derive(Clone)]
pub struct Proxy {
    key: String,
    original: TargetFn,
    call: ProxyFn,
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy").field("key", &self.key).finish()
    }
}

impl Proxy {
    /// Key the proxy is installed under
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The wrapped original function
    #[must_use]
    pub fn original(&self) -> &TargetFn {
        &self.original
    }

    /// Invoke the proxy
    pub fn call(&self, args: Vec<Value>) -> BoxFuture<'static, Option<Value>> {
        (self.call)(args)
    }
}

/// What a host slot currently holds
#[derive(Clone)]
pub enum Slot {
    /// A plain function
    Function(TargetFn),
    /// A coverage-preserving proxy
    Proxy(Proxy),
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(_) => f.write_str("Function"),
            Self::Proxy(proxy) => f.debug_tuple("Proxy").field(proxy).finish(),
        }
    }
}

/// Named call sites that targets can be wrapped in
#[derive(Default)]
pub struct HostObject {
    name: String,
    slots: RwLock<HashMap<String, Slot>>,
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = self.keys();
        keys.sort();
        f.debug_struct("HostObject")
            .field("name", &self.name)
            .field("keys", &keys)
            .finish()
    }
}

impl HostObject {
    /// Create an empty host object
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: RwLock::default(),
        }
    }

    /// Host name, for diagnostics
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Define (or redefine) `key` as a plain function
    pub fn define<F>(&self, key: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> NavcovResult<Value> + Send + Sync + 'static,
    {
        self.define_fn(key, target_fn(f));
    }

    /// Define (or redefine) `key` as an already boxed function
    pub fn define_fn(&self, key: impl Into<String>, f: TargetFn) {
        self.replace(key.into(), Slot::Function(f));
    }

    fn replace(&self, key: String, slot: Slot) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let _ = slots.insert(key, slot);
    }

    /// Remove `key`, returning what it held
    pub fn remove(&self, key: &str) -> Option<Slot> {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Current content of `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Slot> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Whether `key` holds anything
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Whether `key` currently holds a proxy
    #[must_use]
    pub fn is_proxied(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Slot::Proxy(_)))
    }

    /// All defined keys, unordered
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Call whatever `key` holds.
    ///
    /// A plain function's failure is returned as-is. A proxy never fails; it
    /// resolves to `None` when the original did.
    ///
    /// # Errors
    ///
    /// `Argument` if nothing is defined under `key`, otherwise whatever a
    /// plain function returns.
    pub async fn invoke(&self, key: &str, args: Vec<Value>) -> NavcovResult<Option<Value>> {
        let slot = self.get(key).ok_or_else(|| {
            NavcovError::argument(format!("{} has no function named '{key}'", self.name))
        })?;
        match slot {
            Slot::Function(f) => f(&args).map(Some),
            Slot::Proxy(proxy) => Ok(proxy.call(args).await),
        }
    }
}

/// Where to install a proxy, and which function it preserves
#[derive(Clone)]
pub struct TargetBinding {
    original: TargetFn,
    host: Arc<HostObject>,
    key: String,
}

impl fmt::Debug for TargetBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetBinding")
            .field("host", &self.host.name())
            .field("key", &self.key)
            .finish()
    }
}

impl TargetBinding {
    /// Bind an explicit original function to `host[key]`
    #[must_use]
    pub fn new(original: TargetFn, host: Arc<HostObject>, key: impl Into<String>) -> Self {
        Self {
            original,
            host,
            key: key.into(),
        }
    }

    /// Bind whatever function `host[key]` currently holds.
    ///
    /// A slot that already holds a proxy yields the proxy's original, so a
    /// target is never wrapped twice.
    ///
    /// # Errors
    ///
    /// `Argument` if the key is empty or undefined on `host`.
    pub fn from_host(host: &Arc<HostObject>, key: &str) -> NavcovResult<Self> {
        let original = match host.get(key) {
            Some(Slot::Function(f)) => f,
            Some(Slot::Proxy(proxy)) => Arc::clone(proxy.original()),
            None => {
                return Err(NavcovError::argument(format!(
                    "{} has no function named '{key}' to wrap",
                    host.name()
                )))
            }
        };
        let binding = Self::new(original, Arc::clone(host), key);
        binding.validate()?;
        Ok(binding)
    }

    /// Key on the host object
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Host object owning the slot
    #[must_use]
    pub const fn host(&self) -> &Arc<HostObject> {
        &self.host
    }

    /// Original function
    #[must_use]
    pub const fn original(&self) -> &TargetFn {
        &self.original
    }

    /// Check that the binding addresses a real slot
    ///
    /// # Errors
    ///
    /// `Argument` if the key is blank or the host does not define it.
    pub fn validate(&self) -> NavcovResult<()> {
        if self.key.trim().is_empty() {
            return Err(NavcovError::argument(format!(
                "target on {} is missing its key",
                self.host.name()
            )));
        }
        if !self.host.contains(&self.key) {
            return Err(NavcovError::argument(format!(
                "{} does not expose '{}'",
                self.host.name(),
                self.key
            )));
        }
        Ok(())
    }
}

/// Replace `binding.host[binding.key]` with a proxy around `binding.original`.
///
/// Installation is permanent for the life of the host object.
pub fn install(binding: &TargetBinding, preserver: Arc<CoveragePreserver>) -> Proxy {
    let proxy = Proxy {
        key: binding.key.clone(),
        original: Arc::clone(&binding.original),
        call: wrap(Arc::clone(&binding.original), preserver),
    };
    binding
        .host
        .replace(binding.key.clone(), Slot::Proxy(proxy.clone()));
    tracing::debug!(host = binding.host.name(), key = %binding.key, "installed coverage proxy");
    proxy
}
