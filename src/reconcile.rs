//! Reconciliation: bring every unit's status in line with the location.
//!
//! A pass classifies every registered unit into one of four buckets
//! ([`AppChanges`]) and then drives the needed transitions. Unloads and
//! unmounts start first and are joined into a shared "all unmounted" future;
//! each unit on the mount path bootstraps concurrently and waits on that
//! future before mounting, so no unit is mounted while an unmount from the
//! same pass is still running. Different units progress concurrently.
//!
//! Passes are serialized. A pass that starts while another is settling waits
//! for it, then classifies against the live statuses.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture, Shared};
use futures_util::FutureExt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::{Location, Status, Unit};
use crate::lifecycle::{
    to_bootstrap, to_load, to_mount, to_unload, to_unmount, LifecycleEnv, UnloadQueue,
};
use crate::port::Event;
use crate::registry::UnitRegistry;

/// Default back-off before a unit in `LoadError` is loaded again.
pub const DEFAULT_RELOAD_BACKOFF: Duration = Duration::from_millis(200);

type AllUnmounted = Shared<BoxFuture<'static, ()>>;

/// Units bucketed by the action a pass will take on them.
#[derive(Debug, Default, Clone)]
pub struct AppChanges {
    pub to_unload: Vec<Arc<Unit>>,
    pub to_unmount: Vec<Arc<Unit>>,
    pub to_load: Vec<Arc<Unit>>,
    pub to_mount: Vec<Arc<Unit>>,
}

impl AppChanges {
    /// Number of units the pass will touch.
    pub fn total(&self) -> usize {
        self.to_unload.len() + self.to_unmount.len() + self.to_load.len() + self.to_mount.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    fn all(&self) -> impl Iterator<Item = &Arc<Unit>> {
        self.to_unload
            .iter()
            .chain(&self.to_unmount)
            .chain(&self.to_load)
            .chain(&self.to_mount)
    }
}

/// Classify units against `location`.
///
/// Units in an in-progress status or in `SkipBecauseBroken` are left out;
/// the next pass reconsiders them once they settle.
pub fn app_changes(
    units: &[Arc<Unit>],
    location: &Location,
    unloads: &UnloadQueue,
    reload_backoff: Duration,
    now: Instant,
) -> AppChanges {
    let mut changes = AppChanges::default();

    for unit in units {
        let should_be_active = unit.should_be_active(location);
        match unit.status() {
            Status::LoadError => {
                let backed_off = unit
                    .since_load_error(now)
                    .map_or(true, |elapsed| elapsed >= reload_backoff);
                if should_be_active && backed_off {
                    changes.to_load.push(Arc::clone(unit));
                }
            }
            Status::NotLoaded | Status::Loading => {
                if should_be_active {
                    changes.to_load.push(Arc::clone(unit));
                }
            }
            Status::NotBootstrapped | Status::NotMounted => {
                if !should_be_active && unloads.contains(unit.name()) {
                    changes.to_unload.push(Arc::clone(unit));
                } else if should_be_active {
                    changes.to_mount.push(Arc::clone(unit));
                }
            }
            Status::Mounted => {
                if !should_be_active {
                    changes.to_unmount.push(Arc::clone(unit));
                }
            }
            _ => {}
        }
    }

    changes
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone)]
pub struct SettledState {
    /// Location the pass reconciled against.
    pub location: Location,
    /// Every unit's status at the end of the pass, in registration order.
    pub statuses: Vec<(String, Status)>,
    /// Number of units the pass acted on.
    pub total_app_changes: usize,
    /// Units the pass acted on, grouped by the status they ended in.
    pub apps_by_new_status: BTreeMap<Status, Vec<String>>,
}

impl SettledState {
    pub fn status(&self, name: &str) -> Option<Status> {
        self.statuses
            .iter()
            .find(|(unit, _)| unit == name)
            .map(|(_, status)| *status)
    }

    pub fn names_with(&self, status: Status) -> Vec<String> {
        self.statuses
            .iter()
            .filter(|(_, current)| *current == status)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn mounted_names(&self) -> Vec<String> {
        self.names_with(Status::Mounted)
    }

    /// True when no unit was left in an in-progress status.
    pub fn is_settled(&self) -> bool {
        self.statuses.iter().all(|(_, status)| status.is_settled())
    }
}

/// Runs reconciliation passes over a registry.
pub struct Reconciler {
    registry: Arc<UnitRegistry>,
    env: LifecycleEnv,
    started: AtomicBool,
    pass: Mutex<()>,
    reload_backoff: Duration,
}

impl Reconciler {
    pub fn new(registry: Arc<UnitRegistry>, env: LifecycleEnv, reload_backoff: Duration) -> Self {
        Self {
            registry,
            env,
            started: AtomicBool::new(false),
            pass: Mutex::new(()),
            reload_backoff,
        }
    }

    pub fn env(&self) -> &LifecycleEnv {
        &self.env
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Allow passes to bootstrap and mount. Returns false if already started.
    pub(crate) fn mark_started(&self) -> bool {
        !self.started.swap(true, Ordering::AcqRel)
    }

    /// Run one pass, optionally moving to a new location first.
    ///
    /// Before [`mark_started`](Self::mark_started), the pass only loads
    /// units that should be active.
    pub async fn reconcile(&self, location: Option<Location>) -> SettledState {
        let _pass = self.pass.lock().await;
        if let Some(location) = location {
            self.env.set_location(location);
        }
        let location = self.env.location();
        let changes = app_changes(
            &self.registry.list(),
            &location,
            self.env.unloads(),
            self.reload_backoff,
            Instant::now(),
        );

        if self.is_started() {
            self.perform_app_changes(&changes, &location).await;
        } else {
            self.load_apps(&changes).await;
        }
        self.finish(&changes, location)
    }

    async fn load_apps(&self, changes: &AppChanges) {
        debug!(count = changes.to_load.len(), "Loading applications before start");
        join_all(changes.to_load.iter().map(|unit| to_load(unit, &self.env))).await;
    }

    async fn perform_app_changes(&self, changes: &AppChanges, location: &Location) {
        self.env.listeners().notify_all(Event::BeforeReconcile {
            location: location.clone(),
            total_app_changes: changes.total(),
        });

        let unloads = changes.to_unload.iter().map(|unit| {
            let (unit, env) = (Arc::clone(unit), self.env.clone());
            async move {
                to_unload(&unit, &env).await;
            }
            .boxed()
        });
        let unmounts = changes.to_unmount.iter().map(|unit| {
            let (unit, env) = (Arc::clone(unit), self.env.clone());
            async move {
                let _ = to_unmount(&unit, &env, false).await;
                to_unload(&unit, &env).await;
            }
            .boxed()
        });
        let all_unmounted: AllUnmounted = join_all(unloads.chain(unmounts).collect::<Vec<_>>())
            .map(|_| ())
            .boxed()
            .shared();

        let loads_then_mounts = changes.to_load.iter().map(|unit| {
            let (unit, env) = (Arc::clone(unit), self.env.clone());
            let (all_unmounted, location) = (all_unmounted.clone(), location.clone());
            async move {
                to_load(&unit, &env).await;
                bootstrap_and_mount(&unit, &env, all_unmounted, &location).await;
            }
            .boxed()
        });
        let mounts = changes.to_mount.iter().map(|unit| {
            let (unit, env) = (Arc::clone(unit), self.env.clone());
            let (all_unmounted, location) = (all_unmounted.clone(), location.clone());
            async move {
                bootstrap_and_mount(&unit, &env, all_unmounted, &location).await;
            }
            .boxed()
        });

        let mount_path = join_all(loads_then_mounts.chain(mounts).collect::<Vec<_>>());
        tokio::join!(all_unmounted, mount_path);
    }

    fn finish(&self, changes: &AppChanges, location: Location) -> SettledState {
        let statuses: Vec<(String, Status)> = self
            .registry
            .list()
            .iter()
            .map(|unit| (unit.name().to_string(), unit.status()))
            .collect();

        let mut apps_by_new_status: BTreeMap<Status, Vec<String>> = BTreeMap::new();
        for unit in changes.all() {
            apps_by_new_status
                .entry(unit.status())
                .or_default()
                .push(unit.name().to_string());
        }

        let state = SettledState {
            location,
            statuses,
            total_app_changes: changes.total(),
            apps_by_new_status,
        };

        if changes.is_empty() {
            self.env
                .listeners()
                .notify_all(Event::NoAppChange(state.clone()));
        } else {
            info!(
                location = %state.location,
                changes = state.total_app_changes,
                "Reconciliation changed applications"
            );
            self.env
                .listeners()
                .notify_all(Event::AppChange(state.clone()));
        }
        self.env
            .listeners()
            .notify_all(Event::Reconciled(state.clone()));
        state
    }
}

async fn bootstrap_and_mount(
    unit: &Arc<Unit>,
    env: &LifecycleEnv,
    all_unmounted: AllUnmounted,
    location: &Location,
) {
    if !unit.should_be_active(location) {
        all_unmounted.await;
        return;
    }
    let _ = to_bootstrap(unit, env, false).await;
    all_unmounted.await;
    if unit.should_be_active(location) {
        let _ = to_mount(unit, env, false).await;
    }
}
