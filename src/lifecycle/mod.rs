//! Lifecycle transition functions.
//!
//! Each function drives one unit through one transition:
//!
//! - [`to_load`] - `NotLoaded`/`LoadError` → `Loading` → `NotBootstrapped`
//! - [`to_bootstrap`] - `NotBootstrapped` → `Bootstrapping` → `NotMounted`
//! - [`to_mount`] - `NotMounted` → `Mounting` → `Mounted`
//! - [`to_unmount`] - `Mounted` → `Unmounting` → `NotMounted`
//! - [`to_update`] - `Mounted` → `Updating` → `Mounted`
//! - [`to_unload`] - `NotMounted`/`NotBootstrapped`/`LoadError` → `Unloading` → `NotLoaded`
//!
//! A call on a unit that is not in the entry status returns the unit
//! unchanged. The entry check is a compare-and-set on the status cell made
//! before the first `.await`, so two concurrent calls on one unit never both
//! run the transition.
//!
//! Failures are absorbed: the unit moves to `LoadError` or
//! `SkipBecauseBroken` and the error goes to the [`ErrorHandlerRegistry`].
//! Bootstrap, mount, unmount and update accept `hard_fail`, which returns the
//! error to the caller instead of reporting it.

mod bootstrap;
mod load;
mod mount;
mod timeout;
mod unload;
mod unmount;
mod update;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::{AppTimeouts, Lifecycles, Location, Phase, Status, Unit};
use crate::error::LifecycleError;
use crate::port::{ErrorHandlerRegistry, Event, ListenerRegistry};

pub use bootstrap::to_bootstrap;
pub use load::to_load;
pub use mount::to_mount;
pub use unload::{to_unload, unload_immediately, UnloadQueue, UnloadTicket};
pub use unmount::to_unmount;
pub use update::to_update;

/// Shared collaborators every transition function needs.
#[derive(Clone)]
pub struct LifecycleEnv {
    errors: Arc<ErrorHandlerRegistry>,
    listeners: Arc<ListenerRegistry>,
    defaults: Arc<RwLock<AppTimeouts>>,
    location: Arc<RwLock<Location>>,
    unloads: Arc<UnloadQueue>,
    first_mount: Arc<FirstMount>,
}

#[derive(Default)]
struct FirstMount {
    started: AtomicBool,
    finished: AtomicBool,
}

impl LifecycleEnv {
    pub fn new(defaults: AppTimeouts) -> Self {
        Self {
            errors: Arc::new(ErrorHandlerRegistry::new()),
            listeners: Arc::new(ListenerRegistry::new()),
            defaults: Arc::new(RwLock::new(defaults)),
            location: Arc::new(RwLock::new(Location::default())),
            unloads: Arc::new(UnloadQueue::default()),
            first_mount: Arc::new(FirstMount::default()),
        }
    }

    pub fn errors(&self) -> &ErrorHandlerRegistry {
        &self.errors
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn unloads(&self) -> &UnloadQueue {
        &self.unloads
    }

    /// Current location; props are computed against it.
    pub fn location(&self) -> Location {
        self.location.read().clone()
    }

    pub fn set_location(&self, location: Location) {
        *self.location.write() = location;
    }

    /// Global timeout defaults, captured by each unit when it loads.
    pub fn default_timeouts(&self) -> AppTimeouts {
        *self.defaults.read()
    }

    pub(crate) fn set_default_timeout(&self, phase: Phase, config: crate::domain::TimeoutConfig) -> bool {
        self.defaults.write().set(phase, config)
    }

    fn before_first_mount(&self) {
        if !self.first_mount.started.swap(true, Ordering::AcqRel) {
            self.listeners.notify_all(Event::BeforeFirstMount);
        }
    }

    fn after_first_mount(&self) {
        if !self.first_mount.finished.swap(true, Ordering::AcqRel) {
            self.listeners.notify_all(Event::FirstMount);
        }
    }
}

impl Default for LifecycleEnv {
    fn default() -> Self {
        Self::new(AppTimeouts::default())
    }
}

/// Move the unit to the status carried by `err` and report it.
pub(crate) fn handle_app_error(env: &LifecycleEnv, unit: &Unit, err: LifecycleError) {
    unit.status.set(err.status());
    env.errors.report(&err);
}

/// Mark the unit broken, then either report the error or hand it back.
fn settle_failure(
    env: &LifecycleEnv,
    unit: &Arc<Unit>,
    err: LifecycleError,
    hard_fail: bool,
) -> Result<Arc<Unit>, LifecycleError> {
    let err = err.with_status(Status::SkipBecauseBroken);
    if hard_fail {
        unit.status.set(err.status());
        Err(err)
    } else {
        handle_app_error(env, unit, err);
        Ok(Arc::clone(unit))
    }
}

/// Invoke one lifecycle slot of a loaded unit under its deadline.
async fn run_phase(
    unit: &Unit,
    env: &LifecycleEnv,
    phase: Phase,
    status: Status,
) -> Result<(), LifecycleError> {
    let lifecycles = unit
        .lifecycles()
        .unwrap_or_else(|| Arc::new(Lifecycles::default()));
    let slot = match phase {
        Phase::Bootstrap => lifecycles.bootstrap.clone(),
        Phase::Mount => lifecycles.mount.clone(),
        Phase::Unmount => lifecycles.unmount.clone(),
        Phase::Unload => lifecycles.unload.clone(),
        Phase::Update => lifecycles.update.clone(),
        Phase::Load => return Ok(()),
    };
    let config = unit.timeouts().get(phase);
    let props = unit.props(&env.location());
    timeout::reasonable_time(unit.name(), phase, status, slot, props, config).await
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::LifecycleEnv;
    use crate::activity::ActiveWhen;
    use crate::domain::{
        hook, loader, static_loader, CustomProps, Hook, Loader, Module, ModuleExports, Unit,
    };
    use crate::error::LifecycleError;

    pub(crate) fn unit_with(loader: Loader) -> Arc<Unit> {
        let activity = ActiveWhen::path("/")
            .compile()
            .expect("root pattern compiles");
        Arc::new(Unit::new(
            "unit".into(),
            loader,
            activity,
            CustomProps::default(),
        ))
    }

    pub(crate) fn ok_hook() -> Hook {
        hook(|_| async { Ok(()) })
    }

    pub(crate) fn failing_hook(message: &'static str) -> Hook {
        hook(move |_| async move { Err(anyhow::anyhow!(message)) })
    }

    pub(crate) fn module() -> ModuleExports {
        ModuleExports::new()
            .hook("mount", ok_hook())
            .hook("unmount", ok_hook())
    }

    pub(crate) fn unit_for(exports: ModuleExports) -> Arc<Unit> {
        unit_with(static_loader(Module::from(exports)))
    }

    pub(crate) fn failing_loader() -> Loader {
        loader(|_| async { Err(anyhow::anyhow!("network down")) })
    }

    pub(crate) fn collect_errors(env: &LifecycleEnv) -> Arc<Mutex<Vec<LifecycleError>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        env.errors().add(Arc::new(move |err: &LifecycleError| {
            sink.lock().push(err.clone());
        }));
        seen
    }
}
