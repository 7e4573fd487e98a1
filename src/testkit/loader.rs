//! Loaders with scripted behaviour.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::domain::{loader, AppLoader, LoadReturn, Loader, Module, Props};

/// A loader that counts its invocations.
#[derive(Clone)]
pub struct CountingLoader {
    inner: Loader,
    calls: Arc<AtomicUsize>,
}

impl CountingLoader {
    pub fn new(inner: Loader) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn loader(&self) -> Loader {
        Arc::new(self.clone())
    }
}

impl AppLoader for CountingLoader {
    fn load(&self, props: Props) -> LoadReturn {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.load(props)
    }
}

/// Resolves with `module` after `delay`.
pub fn delayed(module: Module, delay: Duration) -> Loader {
    loader(move |_| {
        let module = module.clone();
        async move {
            tokio::time::sleep(delay).await;
            Ok(module)
        }
    })
}

/// Always rejects with `message`.
pub fn rejecting(message: &'static str) -> Loader {
    loader(move |_| async move { Err(anyhow::anyhow!(message)) })
}

/// Rejects the first `failures` calls, then resolves with `module`.
pub fn flaky(failures: usize, module: Module) -> Loader {
    let attempts = Arc::new(AtomicUsize::new(0));
    loader(move |_| {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        let module = module.clone();
        async move {
            if attempt < failures {
                anyhow::bail!("attempt {} failed", attempt + 1);
            }
            Ok(module)
        }
    })
}

/// Resolves with something that is not an exports object.
pub fn opaque(value: Value) -> Loader {
    loader(move |_| {
        let value = value.clone();
        async move { Ok(Module::Opaque(value)) }
    })
}

/// Breaks the loader contract by handing back a plain value.
pub fn eager(module: Module) -> Loader {
    Arc::new(move |_props: Props| LoadReturn::Ready(module.clone()))
}
