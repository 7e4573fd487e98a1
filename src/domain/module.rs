//! Module descriptors resolved by loaders, and their normalized lifecycles.
//!
//! A loader resolves to a [`Module`]. Modules are dynamic on purpose: the code
//! behind a loader is fetched at runtime and may export anything, so the
//! shape is validated when the load completes rather than at compile time.
//!
//! Each lifecycle export may be a single hook or an ordered chain of hooks.
//! After validation every slot is normalized into a [`Lifecycle`], which runs
//! a chain sequentially and treats a missing slot as an immediate success.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::props::Props;
use super::timeouts::TimeoutOverrides;

/// A single lifecycle callable.
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    async fn call(&self, props: Props) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> LifecycleHook for F
where
    F: Fn(Props) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn call(&self, props: Props) -> anyhow::Result<()> {
        (self)(props).await
    }
}

/// Shared handle to a lifecycle callable.
pub type Hook = Arc<dyn LifecycleHook>;

/// Wrap an async closure as a [`Hook`].
pub fn hook<F, Fut>(f: F) -> Hook
where
    F: Fn(Props) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(f)
}

/// One named export of a module.
#[derive(Clone)]
pub enum Export {
    /// A single lifecycle callable.
    Hook(Hook),
    /// An ordered chain of lifecycle callables.
    Chain(Vec<Hook>),
    /// Any non-callable value.
    Value(Value),
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Export::Hook(_) => f.write_str("Hook(..)"),
            Export::Chain(hooks) => write!(f, "Chain(len={})", hooks.len()),
            Export::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// The exports object of a loaded module.
#[derive(Clone, Debug, Default)]
pub struct ModuleExports {
    entries: BTreeMap<String, Export>,
    timeouts: Option<TimeoutOverrides>,
}

impl ModuleExports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export a single hook under `name`.
    #[must_use]
    pub fn hook(mut self, name: &str, hook: Hook) -> Self {
        self.entries.insert(name.to_string(), Export::Hook(hook));
        self
    }

    /// Export a chain of hooks under `name`.
    #[must_use]
    pub fn chain(mut self, name: &str, hooks: Vec<Hook>) -> Self {
        self.entries.insert(name.to_string(), Export::Chain(hooks));
        self
    }

    /// Export a plain value under `name`.
    #[must_use]
    pub fn value(mut self, name: &str, value: Value) -> Self {
        self.entries.insert(name.to_string(), Export::Value(value));
        self
    }

    /// Per-application timeout overrides.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutOverrides) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Export> {
        self.entries.get(name)
    }

    pub fn timeout_overrides(&self) -> Option<&TimeoutOverrides> {
        self.timeouts.as_ref()
    }
}

/// What a loader resolves to.
#[derive(Clone, Debug)]
pub enum Module {
    /// An exports object.
    Exports(ModuleExports),
    /// Anything that is not an object.
    Opaque(Value),
}

impl From<ModuleExports> for Module {
    fn from(exports: ModuleExports) -> Self {
        Module::Exports(exports)
    }
}

/// A normalized lifecycle slot.
#[derive(Clone, Default)]
pub enum Lifecycle {
    /// Missing slot; completes immediately.
    #[default]
    Noop,
    Single(Hook),
    /// Hooks awaited one after another; the first failure stops the chain.
    Sequence(Vec<Hook>),
}

impl Lifecycle {
    fn from_export(export: &Export) -> Option<Self> {
        match export {
            Export::Hook(hook) => Some(Lifecycle::Single(Arc::clone(hook))),
            Export::Chain(hooks) => Some(Lifecycle::Sequence(hooks.clone())),
            Export::Value(_) => None,
        }
    }

    /// Run the slot with `props`.
    pub async fn invoke(&self, props: Props) -> anyhow::Result<()> {
        match self {
            Lifecycle::Noop => Ok(()),
            Lifecycle::Single(hook) => hook.call(props).await,
            Lifecycle::Sequence(hooks) => {
                for hook in hooks {
                    hook.call(props.clone()).await?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Noop => f.write_str("Noop"),
            Lifecycle::Single(_) => f.write_str("Single(..)"),
            Lifecycle::Sequence(hooks) => write!(f, "Sequence(len={})", hooks.len()),
        }
    }
}

/// The full set of normalized lifecycle slots of a loaded application.
#[derive(Clone, Debug, Default)]
pub struct Lifecycles {
    pub bootstrap: Lifecycle,
    pub mount: Lifecycle,
    pub unmount: Lifecycle,
    pub unload: Lifecycle,
    pub update: Lifecycle,
}

impl Module {
    /// Validate the module shape and normalize its lifecycle slots.
    ///
    /// `mount` and `unmount` are mandatory; `bootstrap`, `unload` and
    /// `update` are optional but must be callable when present.
    ///
    /// # Errors
    ///
    /// Returns a description of the first shape violation.
    pub fn normalize(&self) -> Result<(Lifecycles, Option<TimeoutOverrides>), String> {
        let exports = match self {
            Module::Exports(exports) => exports,
            Module::Opaque(_) => return Err("does not export anything".to_string()),
        };

        let optional = |name: &str| -> Result<Lifecycle, String> {
            match exports.get(name) {
                None => Ok(Lifecycle::Noop),
                Some(export) => Lifecycle::from_export(export).ok_or_else(|| {
                    format!("does not export a valid {name} function or array of functions")
                }),
            }
        };
        let required = |name: &str| -> Result<Lifecycle, String> {
            exports
                .get(name)
                .and_then(Lifecycle::from_export)
                .ok_or_else(|| format!("does not export a {name} function or array of functions"))
        };

        let lifecycles = Lifecycles {
            bootstrap: optional("bootstrap")?,
            mount: required("mount")?,
            unmount: required("unmount")?,
            unload: optional("unload")?,
            update: optional("update")?,
        };
        Ok((lifecycles, exports.timeout_overrides().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::{json, Map};

    fn props() -> Props {
        Props::new("test", Map::new())
    }

    fn ok_hook() -> Hook {
        hook(|_| async { Ok(()) })
    }

    fn recording(log: Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> Hook {
        hook(move |_| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(label);
                Ok(())
            }
        })
    }

    #[test]
    fn opaque_module_is_rejected() {
        let err = Module::Opaque(json!(42)).normalize().unwrap_err();
        assert_eq!(err, "does not export anything");
    }

    #[test]
    fn mount_and_unmount_are_mandatory() {
        let module = Module::from(ModuleExports::new().hook("mount", ok_hook()));
        let err = module.normalize().unwrap_err();
        assert!(err.contains("unmount"), "{err}");

        let module = Module::from(
            ModuleExports::new()
                .value("mount", json!("not a function"))
                .hook("unmount", ok_hook()),
        );
        let err = module.normalize().unwrap_err();
        assert!(err.contains("mount"), "{err}");
    }

    #[test]
    fn optional_slot_must_be_callable_when_present() {
        let module = Module::from(
            ModuleExports::new()
                .value("bootstrap", json!({}))
                .hook("mount", ok_hook())
                .hook("unmount", ok_hook()),
        );
        let err = module.normalize().unwrap_err();
        assert!(err.contains("valid bootstrap"), "{err}");
    }

    #[test]
    fn empty_chain_is_valid() {
        let module = Module::from(
            ModuleExports::new()
                .chain("mount", vec![])
                .hook("unmount", ok_hook()),
        );
        assert!(module.normalize().is_ok());
    }

    #[tokio::test]
    async fn chain_runs_in_order_and_stops_on_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing = hook(|_| async { Err(anyhow::anyhow!("second failed")) });
        let lifecycle = Lifecycle::Sequence(vec![
            recording(Arc::clone(&log), "first"),
            failing,
            recording(Arc::clone(&log), "third"),
        ]);

        let err = lifecycle.invoke(props()).await.unwrap_err();
        assert_eq!(err.to_string(), "second failed");
        assert_eq!(*log.lock(), vec!["first"]);
    }

    #[tokio::test]
    async fn missing_slot_is_noop() {
        let module = Module::from(
            ModuleExports::new()
                .hook("mount", ok_hook())
                .hook("unmount", ok_hook()),
        );
        let (lifecycles, overrides) = module.normalize().unwrap();
        assert!(matches!(lifecycles.bootstrap, Lifecycle::Noop));
        assert!(overrides.is_none());
        lifecycles.bootstrap.invoke(props()).await.unwrap();
    }
}
