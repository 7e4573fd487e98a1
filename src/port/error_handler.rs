//! Process-wide error-handler hook.
//!
//! Lifecycle failures during reconciliation never abort a pass. They are
//! absorbed into the unit's status and reported here so the host can log or
//! alert.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;
use uuid::Uuid;

use crate::error::LifecycleError;

/// Receives lifecycle errors.
///
/// Handlers are called synchronously on the task that observed the failure
/// and should return quickly.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: &LifecycleError);
}

impl<F> ErrorHandler for F
where
    F: Fn(&LifecycleError) + Send + Sync,
{
    fn handle(&self, error: &LifecycleError) {
        (self)(error);
    }
}

/// Identifies a registered handler for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(Uuid);

/// Registry of error handlers.
///
/// With no handler registered, errors are logged instead of dropped.
#[derive(Default)]
pub struct ErrorHandlerRegistry {
    handlers: RwLock<Vec<(HandlerId, Arc<dyn ErrorHandler>)>>,
}

impl ErrorHandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler.
    pub fn add(&self, handler: Arc<dyn ErrorHandler>) -> HandlerId {
        let id = HandlerId(Uuid::new_v4());
        self.handlers.write().push((id, handler));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Report an error to every handler.
    pub fn report(&self, err: &LifecycleError) {
        let handlers: Vec<Arc<dyn ErrorHandler>> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        if handlers.is_empty() {
            error!(app = %err.app(), status = %err.status(), error = %err, "Unhandled application error");
            return;
        }
        for handler in handlers {
            handler.handle(err);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}
