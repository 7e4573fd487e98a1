//! The orchestrator service: registration, reconciliation triggers, and
//! queries over the registered applications.
//!
//! # Example
//!
//! ```no_run
//! use stagehand::domain::{hook, Location, ModuleExports};
//! use stagehand::{Orchestrator, Registration};
//!
//! # async fn run() -> stagehand::error::Result<()> {
//! let orchestrator = Orchestrator::new();
//! let navbar = ModuleExports::new()
//!     .hook("mount", hook(|_| async { Ok(()) }))
//!     .hook("unmount", hook(|_| async { Ok(()) }));
//! orchestrator.register(Registration::new("navbar", navbar, "/"))?;
//!
//! orchestrator.start().await;
//! let settled = orchestrator
//!     .trigger_reconciliation(Some(Location::from_path("/settings")?))
//!     .await;
//! assert_eq!(settled.mounted_names(), vec!["navbar"]);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::{AppTimeouts, Location, Phase, Status, TimeoutConfig, Unit, UnitSnapshot};
use crate::error::{Error, RegistrationError, Result};
use crate::lifecycle::{to_unload, to_update, unload_immediately, LifecycleEnv};
use crate::port::{ErrorHandler, HandlerId, Listener};
use crate::reconcile::{Reconciler, SettledState, DEFAULT_RELOAD_BACKOFF};
use crate::registration::{LoaderCatalog, Registration, RegistrationConfig};
use crate::registry::UnitRegistry;

/// Options for [`Orchestrator::unload`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnloadOptions {
    /// Wait for the application to unmount on its own instead of unmounting
    /// it right away.
    pub wait_for_unmount: bool,
}

/// Handle to the orchestrator. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Arc<UnitRegistry>,
    reconciler: Reconciler,
}

impl Orchestrator {
    /// Orchestrator with default timeouts and a 200 ms reload back-off.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(AppTimeouts::default(), DEFAULT_RELOAD_BACKOFF)
    }

    #[must_use]
    pub fn with_settings(defaults: AppTimeouts, reload_backoff: Duration) -> Self {
        let registry = Arc::new(UnitRegistry::new());
        let env = LifecycleEnv::new(defaults);
        let reconciler = Reconciler::new(Arc::clone(&registry), env, reload_backoff);
        Self {
            inner: Arc::new(Inner {
                registry,
                reconciler,
            }),
        }
    }

    /// Build from configuration and register its declared applications.
    ///
    /// # Errors
    ///
    /// Returns a registration error for the first declared application that
    /// fails validation.
    pub fn from_config(config: &Config, catalog: &LoaderCatalog) -> Result<Self> {
        let orchestrator =
            Self::with_settings(config.timeouts, config.reconcile.reload_backoff());
        for table in &config.applications {
            orchestrator.register_config(RegistrationConfig::from_table(table, catalog)?)?;
        }
        Ok(orchestrator)
    }

    fn env(&self) -> &LifecycleEnv {
        self.inner.reconciler.env()
    }

    /// Register an application and schedule a reconciliation pass.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for invalid input and
    /// `DuplicateRegistration` if the name is taken. Nothing is registered
    /// on error.
    pub fn register(&self, registration: Registration) -> std::result::Result<(), RegistrationError> {
        let unit = registration.into_unit()?;
        let unit = self.inner.registry.insert(unit)?;
        debug!(app = %unit.name(), "Application registered");
        self.schedule_reconciliation();
        Ok(())
    }

    /// Register from the keyed configuration form.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn register_config(
        &self,
        config: RegistrationConfig,
    ) -> std::result::Result<(), RegistrationError> {
        self.register(config.into_registration()?)
    }

    /// Unmount and unload an application, then remove it.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` if no such application exists, or the
    /// lifecycle error that made the unload fail.
    pub async fn unregister(&self, name: &str) -> Result<()> {
        let unit = self.unit(name)?;
        self.unload_unit(&unit, UnloadOptions::default(), false).await?;
        self.inner.registry.remove(name);
        info!(app = %name, "Application unregistered");
        Ok(())
    }

    /// Unload an application so that its next activation loads it afresh.
    ///
    /// Without `wait_for_unmount`, a mounted application is unmounted and
    /// unloaded right away and a reconciliation pass follows. An application
    /// caught mid-transition is unloaded once that transition settles. With it, the
    /// unload happens once a pass unmounts the application on its own.
    /// Concurrent requests for one application share a single result.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` if no such application exists, or the
    /// lifecycle error that made the unload fail.
    pub async fn unload(&self, name: &str, options: UnloadOptions) -> Result<()> {
        let unit = self.unit(name)?;
        self.unload_unit(&unit, options, true).await
    }

    async fn unload_unit(
        &self,
        unit: &Arc<Unit>,
        options: UnloadOptions,
        reconcile_after: bool,
    ) -> Result<()> {
        let ticket = self.env().unloads().request(unit.name());
        if options.wait_for_unmount {
            if unit.status() == Status::NotLoaded {
                to_unload(unit, self.env()).await;
            }
        } else {
            let (unit, env, this) = (Arc::clone(unit), self.env().clone(), self.clone());
            tokio::spawn(async move {
                unload_immediately(&unit, &env).await;
                if reconcile_after {
                    this.schedule_reconciliation();
                }
            });
        }
        ticket.await.map_err(Error::from)
    }

    /// Re-run a mounted application's `update` hook with fresh props.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` for unknown names and the lifecycle error if
    /// the hook fails; the application is then `SkipBecauseBroken`.
    pub async fn update(&self, name: &str) -> Result<()> {
        let unit = self.unit(name)?;
        to_update(&unit, self.env(), true).await?;
        Ok(())
    }

    /// Move the orchestrator past pre-fetching: from now on passes bootstrap
    /// and mount. Runs a pass and returns its result.
    pub async fn start(&self) -> SettledState {
        if self.inner.reconciler.mark_started() {
            info!("Orchestrator started");
        }
        self.trigger_reconciliation(None).await
    }

    pub fn is_started(&self) -> bool {
        self.inner.reconciler.is_started()
    }

    /// Reconcile against `location`, or against the current location.
    pub async fn trigger_reconciliation(&self, location: Option<Location>) -> SettledState {
        self.inner.reconciler.reconcile(location).await
    }

    fn schedule_reconciliation(&self) {
        match Handle::try_current() {
            Ok(handle) => {
                let this = self.clone();
                handle.spawn(async move {
                    this.trigger_reconciliation(None).await;
                });
            }
            Err(_) => debug!("No runtime available, reconciliation deferred"),
        }
    }

    pub fn location(&self) -> Location {
        self.env().location()
    }

    pub fn mounted_names(&self) -> Vec<String> {
        self.inner.registry.mounted_names()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    pub fn status(&self, name: &str) -> Option<Status> {
        self.inner.registry.get(name).map(|unit| unit.status())
    }

    /// Names of applications whose activity matches `location`, whatever
    /// their status.
    pub fn check_activity(&self, location: &Location) -> Vec<String> {
        self.inner
            .registry
            .list()
            .iter()
            .filter(|unit| unit.matches(location))
            .map(|unit| unit.name().to_string())
            .collect()
    }

    /// Point-in-time view of every application, in registration order.
    pub fn snapshot(&self) -> Vec<UnitSnapshot> {
        self.inner
            .registry
            .list()
            .iter()
            .map(|unit| unit.snapshot())
            .collect()
    }

    /// Change a global timeout default. Applications loaded afterwards pick
    /// it up; loaded ones keep what they captured.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a zero deadline or for `Phase::Load`,
    /// which has no timeout.
    pub fn set_timeout(
        &self,
        phase: Phase,
        config: TimeoutConfig,
    ) -> std::result::Result<(), RegistrationError> {
        if config.millis == 0 {
            return Err(RegistrationError::invalid(format!(
                "{phase} timeout must be greater than 0 ms"
            )));
        }
        if !self.env().set_default_timeout(phase, config) {
            return Err(RegistrationError::invalid(format!(
                "{phase} has no configurable timeout"
            )));
        }
        Ok(())
    }

    pub fn default_timeouts(&self) -> AppTimeouts {
        self.env().default_timeouts()
    }

    pub fn add_error_handler<H>(&self, handler: H) -> HandlerId
    where
        H: ErrorHandler + 'static,
    {
        self.env().errors().add(Arc::new(handler))
    }

    pub fn remove_error_handler(&self, id: HandlerId) -> bool {
        self.env().errors().remove(id)
    }

    pub fn add_listener(&self, listener: Box<dyn Listener>) {
        self.env().listeners().register(listener);
    }

    fn unit(&self, name: &str) -> std::result::Result<Arc<Unit>, RegistrationError> {
        self.inner
            .registry
            .get(name)
            .ok_or_else(|| RegistrationError::NotRegistered {
                name: name.to_string(),
            })
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}
