use std::sync::Arc;

use tracing::debug;

use super::{run_phase, settle_failure, LifecycleEnv};
use crate::domain::{Phase, Status, Unit};
use crate::error::LifecycleError;

/// Run the unit's bootstrap hook once.
///
/// Only acts on a `NotBootstrapped` unit. Any failure leaves the unit in
/// `SkipBecauseBroken`.
pub async fn to_bootstrap(
    unit: &Arc<Unit>,
    env: &LifecycleEnv,
    hard_fail: bool,
) -> Result<Arc<Unit>, LifecycleError> {
    if !unit
        .status
        .transition(Status::NotBootstrapped, Status::Bootstrapping)
    {
        return Ok(Arc::clone(unit));
    }

    match run_phase(unit, env, Phase::Bootstrap, Status::Bootstrapping).await {
        Ok(()) => {
            unit.status.set(Status::NotMounted);
            debug!(app = %unit.name(), "Application bootstrapped");
            Ok(Arc::clone(unit))
        }
        Err(err) => settle_failure(env, unit, err, hard_fail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::test_support::*;
    use crate::lifecycle::to_load;

    #[tokio::test]
    async fn bootstrap_moves_to_not_mounted() {
        let env = LifecycleEnv::default();
        let unit = unit_for(module().hook("bootstrap", ok_hook()));
        to_load(&unit, &env).await;

        to_bootstrap(&unit, &env, false).await.unwrap();

        assert_eq!(unit.status(), Status::NotMounted);
    }

    #[tokio::test]
    async fn failure_is_absorbed_without_hard_fail() {
        let env = LifecycleEnv::default();
        let errors = collect_errors(&env);
        let unit = unit_for(module().hook("bootstrap", failing_hook("boom")));
        to_load(&unit, &env).await;

        let result = to_bootstrap(&unit, &env, false).await;

        assert!(result.is_ok());
        assert_eq!(unit.status(), Status::SkipBecauseBroken);
        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].status(), Status::SkipBecauseBroken);
    }

    #[tokio::test]
    async fn hard_fail_returns_error_without_reporting() {
        let env = LifecycleEnv::default();
        let errors = collect_errors(&env);
        let unit = unit_for(module().hook("bootstrap", failing_hook("boom")));
        to_load(&unit, &env).await;

        let err = to_bootstrap(&unit, &env, true).await.unwrap_err();

        assert_eq!(err.status(), Status::SkipBecauseBroken);
        assert_eq!(err.app(), "unit");
        assert_eq!(unit.status(), Status::SkipBecauseBroken);
        assert!(errors.lock().is_empty());
    }

    #[tokio::test]
    async fn wrong_status_is_a_noop() {
        let env = LifecycleEnv::default();
        let unit = unit_for(module());

        to_bootstrap(&unit, &env, true).await.unwrap();

        assert_eq!(unit.status(), Status::NotLoaded);
    }
}
