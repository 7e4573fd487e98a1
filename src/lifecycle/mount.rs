use std::sync::Arc;

use tracing::{debug, warn};

use super::{run_phase, settle_failure, to_unmount, LifecycleEnv};
use crate::domain::{Phase, Status, Unit};
use crate::error::LifecycleError;

/// Mount a `NotMounted` unit.
///
/// The first mount across all applications is bracketed by the
/// `BeforeFirstMount` and `FirstMount` events. When the mount hook fails, the
/// unit is unmounted again before it is marked broken, so a partly mounted
/// application gets a chance to clean up.
pub async fn to_mount(
    unit: &Arc<Unit>,
    env: &LifecycleEnv,
    hard_fail: bool,
) -> Result<Arc<Unit>, LifecycleError> {
    if !unit.status.transition(Status::NotMounted, Status::Mounting) {
        return Ok(Arc::clone(unit));
    }
    env.before_first_mount();

    match run_phase(unit, env, Phase::Mount, Status::Mounting).await {
        Ok(()) => {
            unit.status.set(Status::Mounted);
            debug!(app = %unit.name(), "Application mounted");
            env.after_first_mount();
            Ok(Arc::clone(unit))
        }
        Err(err) => {
            unit.status.set(Status::Mounted);
            if let Err(cleanup) = to_unmount(unit, env, true).await {
                warn!(app = %unit.name(), error = %cleanup, "Unmount after failed mount also failed");
            }
            settle_failure(env, unit, err, hard_fail)
        }
    }
}
