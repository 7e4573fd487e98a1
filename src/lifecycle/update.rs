use std::sync::Arc;

use tracing::debug;

use super::{run_phase, settle_failure, LifecycleEnv};
use crate::domain::{Phase, Status, Unit};
use crate::error::LifecycleError;

/// Ask a `Mounted` unit to refresh itself with new props.
///
/// A module without an `update` export treats this as a no-op.
pub async fn to_update(
    unit: &Arc<Unit>,
    env: &LifecycleEnv,
    hard_fail: bool,
) -> Result<Arc<Unit>, LifecycleError> {
    if !unit.status.transition(Status::Mounted, Status::Updating) {
        return Ok(Arc::clone(unit));
    }

    match run_phase(unit, env, Phase::Update, Status::Updating).await {
        Ok(()) => {
            unit.status.set(Status::Mounted);
            debug!(app = %unit.name(), "Application updated");
            Ok(Arc::clone(unit))
        }
        Err(err) => settle_failure(env, unit, err, hard_fail),
    }
}
