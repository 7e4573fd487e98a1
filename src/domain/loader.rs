//! Loader contract: how an application's module is obtained.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};

use super::module::Module;
use super::props::Props;

/// What a loader hands back when invoked.
///
/// A well-behaved loader always returns [`LoadReturn::Pending`]. Returning a
/// [`LoadReturn::Ready`] value breaks the loader contract and marks the
/// application as broken.
pub enum LoadReturn {
    /// Asynchronous load in progress.
    Pending(BoxFuture<'static, anyhow::Result<Module>>),
    /// A plain value handed back synchronously.
    Ready(Module),
}

impl LoadReturn {
    /// A pending load that resolves immediately with `module`.
    pub fn resolved(module: Module) -> Self {
        LoadReturn::Pending(future::ready(Ok(module)).boxed())
    }

    /// A pending load that fails immediately.
    pub fn rejected(error: anyhow::Error) -> Self {
        LoadReturn::Pending(future::ready(Err(error)).boxed())
    }
}

impl fmt::Debug for LoadReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadReturn::Pending(_) => f.write_str("Pending(..)"),
            LoadReturn::Ready(module) => f.debug_tuple("Ready").field(module).finish(),
        }
    }
}

/// Something that can produce an application's module.
pub trait AppLoader: Send + Sync {
    fn load(&self, props: Props) -> LoadReturn;
}

impl<F> AppLoader for F
where
    F: Fn(Props) -> LoadReturn + Send + Sync,
{
    fn load(&self, props: Props) -> LoadReturn {
        (self)(props)
    }
}

/// Shared handle to a loader.
pub type Loader = Arc<dyn AppLoader>;

/// Wrap an async closure as a [`Loader`].
pub fn loader<F, Fut>(f: F) -> Loader
where
    F: Fn(Props) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Module>> + Send + 'static,
{
    Arc::new(move |props: Props| LoadReturn::Pending(f(props).boxed()))
}

/// A loader that always resolves with a copy of `module`.
pub fn static_loader(module: Module) -> Loader {
    Arc::new(move |_props: Props| LoadReturn::resolved(module.clone()))
}
