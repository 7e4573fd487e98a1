//! Deadline racing for lifecycle calls.
//!
//! The call runs on its own task. While it runs, a warning is logged every
//! `warning_millis`. At the hard deadline the call is reported as a timeout.
//! With `die_on_timeout` the task is aborted; otherwise it is detached and
//! keeps running, and its eventual result is logged and discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, sleep_until, Instant};
use tracing::{error, info, warn};

use crate::domain::{Lifecycle, Phase, Props, Status, TimeoutConfig};
use crate::error::LifecycleError;

/// Placeholder period for a disabled warning ticker.
const IDLE_PERIOD: Duration = Duration::from_secs(3600);

pub(super) async fn reasonable_time(
    app: &str,
    phase: Phase,
    status: Status,
    lifecycle: Lifecycle,
    props: Props,
    config: TimeoutConfig,
) -> Result<(), LifecycleError> {
    let abandoned = Arc::new(AtomicBool::new(false));
    let mut task = {
        let abandoned = Arc::clone(&abandoned);
        let app = app.to_string();
        tokio::spawn(async move {
            let result = lifecycle.invoke(props).await;
            if abandoned.load(Ordering::Acquire) {
                match &result {
                    Ok(()) => info!(app = %app, phase = %phase, "Abandoned lifecycle call resolved, result ignored"),
                    Err(err) => warn!(app = %app, phase = %phase, error = %err, "Abandoned lifecycle call rejected, result ignored"),
                }
            }
            result
        })
    };

    let started = Instant::now();
    let deadline = sleep_until(started + config.deadline());
    tokio::pin!(deadline);

    let warning_period = config.warning_period();
    let period = warning_period.unwrap_or(IDLE_PERIOD);
    let mut warnings = interval_at(started + period, period);

    loop {
        tokio::select! {
            joined = &mut task => {
                return match joined {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => Err(LifecycleError::LifecycleRejected {
                        app: app.to_string(),
                        phase,
                        status,
                        message: format!("{err:#}"),
                    }),
                    Err(join_err) => Err(LifecycleError::LifecycleRejected {
                        app: app.to_string(),
                        phase,
                        status,
                        message: join_err.to_string(),
                    }),
                };
            }
            () = &mut deadline => {
                if config.die_on_timeout {
                    task.abort();
                } else {
                    abandoned.store(true, Ordering::Release);
                }
                error!(
                    app = %app,
                    phase = %phase,
                    millis = config.millis,
                    die_on_timeout = config.die_on_timeout,
                    "Lifecycle call did not resolve or reject in time"
                );
                return Err(LifecycleError::Timeout {
                    app: app.to_string(),
                    phase,
                    status,
                    millis: config.millis,
                    dangling: !config.die_on_timeout,
                });
            }
            _ = warnings.tick(), if warning_period.is_some() => {
                warn!(
                    app = %app,
                    phase = %phase,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    deadline_ms = config.millis,
                    "Lifecycle call still running"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hook;
    use serde_json::Map;
    use std::sync::atomic::AtomicUsize;

    fn props() -> Props {
        Props::new("slow", Map::new())
    }

    fn sleeping(millis: u64, finished: Arc<AtomicUsize>) -> Lifecycle {
        Lifecycle::Single(hook(move |_| {
            let finished = Arc::clone(&finished);
            async move {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
    }

    #[tokio::test]
    async fn fast_call_succeeds() {
        let finished = Arc::new(AtomicUsize::new(0));
        let result = reasonable_time(
            "fast",
            Phase::Mount,
            Status::Mounting,
            sleeping(1, Arc::clone(&finished)),
            props(),
            TimeoutConfig::new(1000, true, 0),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn call_past_warning_but_within_deadline_succeeds() {
        let finished = Arc::new(AtomicUsize::new(0));
        let config = TimeoutConfig::new(200, true, 20);
        assert!(config.warning_period().is_some());

        let result = reasonable_time(
            "sluggish",
            Phase::Mount,
            Status::Mounting,
            sleeping(80, Arc::clone(&finished)),
            props(),
            config,
        )
        .await;

        assert_eq!(result, Ok(()));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejection_is_reported_with_message() {
        let failing = Lifecycle::Single(hook(|_| async { Err(anyhow::anyhow!("nope")) }));
        let err = reasonable_time(
            "bad",
            Phase::Bootstrap,
            Status::Bootstrapping,
            failing,
            props(),
            TimeoutConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::LifecycleRejected { ref message, phase: Phase::Bootstrap, .. } if message == "nope"
        ));
    }

    #[tokio::test]
    async fn panic_is_a_rejection() {
        let panicking = Lifecycle::Single(hook(|_| async { panic!("hook exploded") }));
        let err = reasonable_time(
            "panics",
            Phase::Mount,
            Status::Mounting,
            panicking,
            props(),
            TimeoutConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LifecycleError::LifecycleRejected { .. }));
    }

    #[tokio::test]
    async fn die_on_timeout_aborts_the_call() {
        let finished = Arc::new(AtomicUsize::new(0));
        let err = reasonable_time(
            "slow",
            Phase::Mount,
            Status::Mounting,
            sleeping(200, Arc::clone(&finished)),
            props(),
            TimeoutConfig::new(20, true, 5),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Timeout { millis: 20, dangling: false, .. }
        ));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_dying_timeout_leaves_call_running() {
        let finished = Arc::new(AtomicUsize::new(0));
        let err = reasonable_time(
            "slow",
            Phase::Unmount,
            Status::Unmounting,
            sleeping(100, Arc::clone(&finished)),
            props(),
            TimeoutConfig::new(20, false, 0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LifecycleError::Timeout { dangling: true, .. }));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
