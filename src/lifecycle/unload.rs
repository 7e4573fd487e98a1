//! Unloading and the queue of pending unload requests.
//!
//! An unload is requested by name first. The next reconciliation pass sees the
//! request, unmounts the unit if needed, then runs [`to_unload`], which
//! resolves every waiter holding a ticket for that name. An immediate unload
//! skips the pass and drives the unit out itself with [`unload_immediately`].

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::{handle_app_error, run_phase, to_unmount, LifecycleEnv};
use crate::domain::{Phase, Status, Unit};
use crate::error::LifecycleError;

/// Resolves when the requested unload finishes.
pub type UnloadTicket = Shared<BoxFuture<'static, Result<(), LifecycleError>>>;

struct PendingUnload {
    ticket: UnloadTicket,
    resolve: oneshot::Sender<Result<(), LifecycleError>>,
}

/// Pending unload requests keyed by application name.
#[derive(Default)]
pub struct UnloadQueue {
    pending: DashMap<String, PendingUnload>,
}

impl UnloadQueue {
    /// Request an unload, or join the request already pending for `name`.
    pub fn request(&self, name: &str) -> UnloadTicket {
        self.pending
            .entry(name.to_string())
            .or_insert_with(|| {
                let (resolve, done) = oneshot::channel();
                PendingUnload {
                    ticket: done.map(|outcome| outcome.unwrap_or(Ok(()))).boxed().shared(),
                    resolve,
                }
            })
            .ticket
            .clone()
    }

    pub fn ticket(&self, name: &str) -> Option<UnloadTicket> {
        self.pending.get(name).map(|pending| pending.ticket.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn finish(&self, name: &str, outcome: Result<(), LifecycleError>) {
        if let Some((_, pending)) = self.pending.remove(name) {
            let _ = pending.resolve.send(outcome);
        }
    }
}

/// Unload a unit whose unload was requested.
///
/// Without a pending request this does nothing. A unit that is already
/// `Unloading` awaits the running unload. `LoadError` and `SkipBecauseBroken`
/// units never had usable hooks installed, so they are reset to `NotLoaded`
/// without calling `unload`.
pub async fn to_unload(unit: &Arc<Unit>, env: &LifecycleEnv) -> Arc<Unit> {
    let Some(ticket) = env.unloads.ticket(unit.name()) else {
        return Arc::clone(unit);
    };

    match unit.status() {
        Status::NotLoaded => {
            finish_unloading(unit, env);
            return Arc::clone(unit);
        }
        Status::Unloading => {
            let _ = ticket.await;
            return Arc::clone(unit);
        }
        _ => {}
    }

    let Some(previous) = unit.status.transition_from(
        &[
            Status::NotMounted,
            Status::NotBootstrapped,
            Status::LoadError,
            Status::SkipBecauseBroken,
        ],
        Status::Unloading,
    ) else {
        return Arc::clone(unit);
    };

    let result = match previous {
        Status::LoadError | Status::SkipBecauseBroken => Ok(()),
        _ => run_phase(unit, env, Phase::Unload, Status::Unloading).await,
    };

    match result {
        Ok(()) => finish_unloading(unit, env),
        Err(err) => {
            unit.clear_lifecycles();
            let err = err.with_status(Status::SkipBecauseBroken);
            handle_app_error(env, unit, err.clone());
            env.unloads.finish(unit.name(), Err(err));
        }
    }
    Arc::clone(unit)
}

/// Unmount and unload a unit whose unload was requested, without waiting for
/// a reconciliation pass.
///
/// A unit caught mid-transition is waited on until it settles. The steps
/// repeat until the request is resolved, since a pass may start another
/// transition on the unit in between.
pub async fn unload_immediately(unit: &Arc<Unit>, env: &LifecycleEnv) -> Arc<Unit> {
    while env.unloads.contains(unit.name()) {
        let status = unit.status.settled().await;
        debug!(app = %unit.name(), status = %status, "Unloading immediately");
        if let Err(err) = to_unmount(unit, env, false).await {
            warn!(app = %unit.name(), error = %err, "Unmount before unload failed");
        }
        to_unload(unit, env).await;
    }
    Arc::clone(unit)
}

fn finish_unloading(unit: &Unit, env: &LifecycleEnv) {
    unit.clear_lifecycles();
    unit.status.set(Status::NotLoaded);
    debug!(app = %unit.name(), "Application unloaded");
    env.unloads.finish(unit.name(), Ok(()));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::hook;
    use crate::lifecycle::test_support::*;
    use crate::lifecycle::{to_bootstrap, to_load};

    #[tokio::test]
    async fn without_request_nothing_happens() {
        let env = LifecycleEnv::default();
        let unit = unit_for(module());
        to_load(&unit, &env).await;

        to_unload(&unit, &env).await;

        assert_eq!(unit.status(), Status::NotBootstrapped);
    }

    #[tokio::test]
    async fn unload_runs_hook_and_resolves_waiters() {
        let env = LifecycleEnv::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let unit = unit_for(module().hook(
            "unload",
            hook(move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        ));
        to_load(&unit, &env).await;
        to_bootstrap(&unit, &env, true).await.unwrap();

        let first = env.unloads().request("unit");
        let second = env.unloads().request("unit");
        assert_eq!(env.unloads().len(), 1);

        to_unload(&unit, &env).await;

        assert_eq!(first.await, Ok(()));
        assert_eq!(second.await, Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(unit.status(), Status::NotLoaded);
        assert!(unit.lifecycles().is_none());
        assert!(env.unloads().is_empty());
    }

    #[tokio::test]
    async fn load_error_unit_resets_without_hook() {
        let env = LifecycleEnv::default();
        let unit = unit_with(failing_loader());
        to_load(&unit, &env).await;
        let ticket = env.unloads().request("unit");

        to_unload(&unit, &env).await;

        assert_eq!(ticket.await, Ok(()));
        assert_eq!(unit.status(), Status::NotLoaded);
    }

    #[tokio::test]
    async fn failing_unload_breaks_and_rejects_ticket() {
        let env = LifecycleEnv::default();
        let errors = collect_errors(&env);
        let unit = unit_for(module().hook("unload", failing_hook("cannot unload")));
        to_load(&unit, &env).await;
        let ticket = env.unloads().request("unit");

        to_unload(&unit, &env).await;

        let err = ticket.await.unwrap_err();
        assert_eq!(err.status(), Status::SkipBecauseBroken);
        assert_eq!(unit.status(), Status::SkipBecauseBroken);
        assert_eq!(errors.lock().len(), 1);
    }

    #[tokio::test]
    async fn mounted_unit_is_not_unloaded() {
        let env = LifecycleEnv::default();
        let unit = unit_for(module());
        to_load(&unit, &env).await;
        unit.status.set(Status::Mounted);
        env.unloads().request("unit");

        to_unload(&unit, &env).await;

        assert_eq!(unit.status(), Status::Mounted);
        assert!(env.unloads().contains("unit"));
    }

    #[tokio::test]
    async fn immediate_unload_waits_out_an_in_flight_mount() {
        let env = LifecycleEnv::default();
        let unit = unit_for(module());
        to_load(&unit, &env).await;
        unit.status.set(Status::Mounting);
        let ticket = env.unloads().request("unit");

        tokio::join!(unload_immediately(&unit, &env), async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            unit.status.set(Status::Mounted);
        });

        assert_eq!(ticket.await, Ok(()));
        assert_eq!(unit.status(), Status::NotLoaded);
        assert!(env.unloads().is_empty());
    }

    #[tokio::test]
    async fn immediate_unload_of_a_mounted_unit_unmounts_first() {
        let env = LifecycleEnv::default();
        let unit = unit_for(module());
        to_load(&unit, &env).await;
        to_bootstrap(&unit, &env, true).await.unwrap();
        crate::lifecycle::to_mount(&unit, &env, true).await.unwrap();
        let ticket = env.unloads().request("unit");

        unload_immediately(&unit, &env).await;

        assert_eq!(ticket.await, Ok(()));
        assert_eq!(unit.status(), Status::NotLoaded);
    }

    #[tokio::test]
    async fn immediate_unload_without_request_is_a_no_op() {
        let env = LifecycleEnv::default();
        let unit = unit_for(module());
        to_load(&unit, &env).await;

        unload_immediately(&unit, &env).await;

        assert_eq!(unit.status(), Status::NotBootstrapped);
    }
}
