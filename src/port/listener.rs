//! Listener port for orchestrator events.
//!
//! Listeners observe reconciliation progress: a pass starting, the settled
//! result of a pass, and the first mount of any application.

use std::sync::Arc;

use crate::domain::Location;
use crate::reconcile::SettledState;

/// Events emitted by the orchestrator.
#[derive(Debug, Clone)]
pub enum Event {
    /// A reconciliation pass is about to change application statuses.
    BeforeReconcile {
        location: Location,
        total_app_changes: usize,
    },
    /// A pass finished after changing at least one application.
    AppChange(SettledState),
    /// A pass finished without any application needing a change.
    NoAppChange(SettledState),
    /// Emitted after every pass, after `AppChange` / `NoAppChange`.
    Reconciled(SettledState),
    /// The first mount of any application is about to start.
    BeforeFirstMount,
    /// The first mount of any application completed.
    FirstMount,
}

/// Trait for event handlers.
///
/// Implementations must be thread-safe and should return quickly; slow
/// work belongs on a spawned task.
pub trait Listener: Send + Sync {
    fn notify(&self, event: Event);
}

/// Registry of listeners (composite pattern).
pub struct ListenerRegistry {
    listeners: parking_lot::RwLock<Vec<Arc<dyn Listener>>>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: parking_lot::RwLock::new(vec![]),
        }
    }

    pub fn register(&self, listener: Box<dyn Listener>) {
        self.listeners.write().push(Arc::from(listener));
    }

    /// Notify all registered listeners.
    ///
    /// Listeners run outside the registry lock and may register more
    /// listeners; those only see later events.
    pub fn notify_all(&self, event: Event) {
        let listeners: Vec<Arc<dyn Listener>> = self.listeners.read().iter().cloned().collect();
        for listener in listeners {
            listener.notify(event.clone());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A no-op listener.
pub struct NullListener;

impl Listener for NullListener {
    fn notify(&self, _event: Event) {}
}

/// A listener that logs events via tracing.
pub struct LogListener;

impl Listener for LogListener {
    fn notify(&self, event: Event) {
        use tracing::{debug, info};
        match event {
            Event::BeforeReconcile {
                location,
                total_app_changes,
            } => {
                debug!(location = %location, changes = total_app_changes, "Reconciliation starting");
            }
            Event::AppChange(state) => {
                info!(
                    location = %state.location,
                    changes = state.total_app_changes,
                    mounted = ?state.names_with(crate::domain::Status::Mounted),
                    "Applications changed"
                );
            }
            Event::NoAppChange(state) => {
                debug!(location = %state.location, "No application changes");
            }
            Event::Reconciled(state) => {
                debug!(location = %state.location, settled = state.is_settled(), "Reconciled");
            }
            Event::BeforeFirstMount => {
                debug!("First mount starting");
            }
            Event::FirstMount => {
                info!("First application mounted");
            }
        }
    }
}
