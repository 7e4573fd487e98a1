use std::sync::Arc;

use tracing::debug;

use super::{run_phase, settle_failure, LifecycleEnv};
use crate::domain::{Phase, Status, Unit};
use crate::error::LifecycleError;

/// Unmount a `Mounted` unit.
pub async fn to_unmount(
    unit: &Arc<Unit>,
    env: &LifecycleEnv,
    hard_fail: bool,
) -> Result<Arc<Unit>, LifecycleError> {
    if !unit.status.transition(Status::Mounted, Status::Unmounting) {
        return Ok(Arc::clone(unit));
    }

    match run_phase(unit, env, Phase::Unmount, Status::Unmounting).await {
        Ok(()) => {
            unit.status.set(Status::NotMounted);
            debug!(app = %unit.name(), "Application unmounted");
            Ok(Arc::clone(unit))
        }
        Err(err) => settle_failure(env, unit, err, hard_fail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModuleExports, TimeoutConfig, TimeoutOverrides};
    use crate::lifecycle::test_support::*;
    use crate::lifecycle::{to_bootstrap, to_load, to_mount};

    async fn mounted(exports: ModuleExports, env: &LifecycleEnv) -> Arc<Unit> {
        let unit = unit_for(exports);
        to_load(&unit, env).await;
        to_bootstrap(&unit, env, true).await.unwrap();
        to_mount(&unit, env, true).await.unwrap();
        unit
    }

    #[tokio::test]
    async fn unmount_returns_to_not_mounted() {
        let env = LifecycleEnv::default();
        let unit = mounted(module(), &env).await;

        to_unmount(&unit, &env, false).await.unwrap();

        assert_eq!(unit.status(), Status::NotMounted);
    }

    #[tokio::test]
    async fn failing_unmount_breaks_the_unit() {
        let env = LifecycleEnv::default();
        let errors = collect_errors(&env);
        let exports = ModuleExports::new()
            .hook("mount", ok_hook())
            .hook("unmount", failing_hook("stuck"));
        let unit = mounted(exports, &env).await;

        to_unmount(&unit, &env, false).await.unwrap();

        assert_eq!(unit.status(), Status::SkipBecauseBroken);
        assert_eq!(errors.lock().len(), 1);
    }

    #[tokio::test]
    async fn slow_unmount_times_out() {
        let env = LifecycleEnv::default();
        let slow = crate::domain::hook(|_| async {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok(())
        });
        let exports = ModuleExports::new()
            .hook("mount", ok_hook())
            .hook("unmount", slow)
            .timeouts(TimeoutOverrides {
                unmount: Some(TimeoutConfig::new(20, true, 0)),
                ..TimeoutOverrides::default()
            });
        let unit = mounted(exports, &env).await;

        let err = to_unmount(&unit, &env, true).await.unwrap_err();

        assert!(matches!(err, LifecycleError::Timeout { phase: Phase::Unmount, .. }));
        assert_eq!(unit.status(), Status::SkipBecauseBroken);
    }

    #[tokio::test]
    async fn not_mounted_unit_is_left_alone() {
        let env = LifecycleEnv::default();
        let unit = unit_for(module());

        to_unmount(&unit, &env, true).await.unwrap();

        assert_eq!(unit.status(), Status::NotLoaded);
    }
}
