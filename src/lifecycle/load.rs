use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error};

use super::{handle_app_error, LifecycleEnv};
use crate::domain::{LoadHandle, LoadReturn, Module, Status, Unit};
use crate::error::LifecycleError;

/// Load the unit's module and install its lifecycles.
///
/// Concurrent callers share one in-flight load: whoever arrives while a load
/// is running awaits that same load instead of starting another. A unit that
/// is neither `NotLoaded` nor `LoadError` is returned as is.
///
/// Never fails. A loader that rejects leaves the unit in `LoadError` with the
/// failure time recorded; a loader that returns a non-deferred value or a
/// module without the required hooks leaves it in `SkipBecauseBroken`.
pub async fn to_load(unit: &Arc<Unit>, env: &LifecycleEnv) -> Arc<Unit> {
    if let Some(handle) = begin_load(unit, env) {
        handle.await;
    }
    Arc::clone(unit)
}

fn begin_load(unit: &Arc<Unit>, env: &LifecycleEnv) -> Option<LoadHandle> {
    let mut in_flight = unit.in_flight_load.lock();
    if let Some(handle) = in_flight.as_ref() {
        return Some(handle.clone());
    }
    unit.status
        .transition_from(&[Status::NotLoaded, Status::LoadError], Status::Loading)?;

    debug!(app = %unit.name(), "Loading application");
    let task = tokio::spawn(load_module(Arc::clone(unit), env.clone()));
    let handle: LoadHandle = task.map(|_| ()).boxed().shared();
    *in_flight = Some(handle.clone());
    Some(handle)
}

async fn load_module(unit: Arc<Unit>, env: LifecycleEnv) {
    let props = unit.props(&env.location());
    let returned = std::panic::catch_unwind(AssertUnwindSafe(|| unit.loader.load(props)));

    let result = match returned {
        Ok(LoadReturn::Ready(_)) => Err(LifecycleError::NotAPromise {
            app: unit.name().to_string(),
            status: Status::SkipBecauseBroken,
        }),
        Ok(LoadReturn::Pending(pending)) => match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(Ok(module)) => {
                unit.clear_load_error();
                install_module(&unit, &env, &module)
            }
            Ok(Err(err)) => Err(load_failed(&unit, format!("{err:#}"))),
            Err(_) => Err(load_failed(&unit, "loading function panicked".to_string())),
        },
        Err(_) => Err(load_failed(&unit, "loading function panicked".to_string())),
    };

    if let Err(err) = result {
        if err.status() == Status::LoadError {
            unit.record_load_error();
        }
        handle_app_error(&env, &unit, err);
    }
    unit.in_flight_load.lock().take();
}

fn load_failed(unit: &Unit, message: String) -> LifecycleError {
    LifecycleError::LoadFailed {
        app: unit.name().to_string(),
        status: Status::LoadError,
        message,
    }
}

fn install_module(unit: &Unit, env: &LifecycleEnv, module: &Module) -> Result<(), LifecycleError> {
    let (lifecycles, overrides) = module.normalize().map_err(|reason| {
        error!(
            app = %unit.name(),
            reason = %reason,
            "Module does not export valid bootstrap, mount, and unmount hooks"
        );
        LifecycleError::ModuleShapeInvalid {
            app: unit.name().to_string(),
            status: Status::SkipBecauseBroken,
            reason,
        }
    })?;

    let timeouts = env
        .default_timeouts()
        .with_overrides(&overrides.unwrap_or_default());
    unit.install(lifecycles, timeouts);
    unit.status.set(Status::NotBootstrapped);
    debug!(app = %unit.name(), "Application loaded");
    Ok(())
}
