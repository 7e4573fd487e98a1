//! Registered application units and their status gate.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, Shared};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::loader::Loader;
use super::location::Location;
use super::module::Lifecycles;
use super::props::{CustomProps, Props};
use super::status::Status;
use super::timeouts::AppTimeouts;
use crate::activity::ActivityFn;

/// Handle to an in-flight load, shared by every caller that asks for it.
pub(crate) type LoadHandle = Shared<BoxFuture<'static, ()>>;

/// Atomic status cell.
///
/// Transitions are compare-and-set operations, so the first caller to move a
/// unit into an in-progress status wins and every concurrent caller observes
/// the new status before any `.await` happens. Every change wakes the
/// tasks waiting in [`StatusCell::settled`].
pub(crate) struct StatusCell {
    raw: AtomicU8,
    changed: Notify,
}

impl StatusCell {
    fn new(status: Status) -> Self {
        Self {
            raw: AtomicU8::new(status as u8),
            changed: Notify::new(),
        }
    }

    pub(crate) fn get(&self) -> Status {
        Status::from_u8(self.raw.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, status: Status) {
        self.raw.store(status as u8, Ordering::Release);
        self.changed.notify_waiters();
    }

    /// Move from exactly `from` to `to`.
    pub(crate) fn transition(&self, from: Status, to: Status) -> bool {
        let moved = self
            .raw
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if moved {
            self.changed.notify_waiters();
        }
        moved
    }

    /// Wait until no transition is in flight and return that status.
    pub(crate) async fn settled(&self) -> Status {
        loop {
            // Registered before the check so a change in between still wakes us.
            let changed = self.changed.notified();
            let status = self.get();
            if status.is_settled() {
                return status;
            }
            changed.await;
        }
    }

    /// Move from any status in `from` to `to`, returning the previous status.
    pub(crate) fn transition_from(&self, from: &[Status], to: Status) -> Option<Status> {
        let mut current = self.raw.load(Ordering::Acquire);
        loop {
            if !from.contains(&Status::from_u8(current)) {
                return None;
            }
            match self
                .raw
                .compare_exchange(current, to as u8, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(previous) => {
                    self.changed.notify_waiters();
                    return Some(Status::from_u8(previous));
                }
                Err(actual) => current = actual,
            }
        }
    }
}

/// Time of the most recent load failure.
#[derive(Debug, Clone, Copy)]
struct LoadErrorTime {
    at: Instant,
    wall: DateTime<Utc>,
}

/// A registered application.
pub struct Unit {
    name: String,
    pub(crate) status: StatusCell,
    activity: ActivityFn,
    pub(crate) loader: Loader,
    custom_props: CustomProps,
    lifecycles: RwLock<Option<Arc<Lifecycles>>>,
    timeouts: RwLock<AppTimeouts>,
    load_error: Mutex<Option<LoadErrorTime>>,
    pub(crate) in_flight_load: Mutex<Option<LoadHandle>>,
}

impl Unit {
    pub(crate) fn new(
        name: String,
        loader: Loader,
        activity: ActivityFn,
        custom_props: CustomProps,
    ) -> Self {
        Self {
            name,
            status: StatusCell::new(Status::NotLoaded),
            activity,
            loader,
            custom_props,
            lifecycles: RwLock::new(None),
            timeouts: RwLock::new(AppTimeouts::default()),
            load_error: Mutex::new(None),
            in_flight_load: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> Status {
        self.status.get()
    }

    /// Whether the activity predicate matches, regardless of status.
    pub fn matches(&self, location: &Location) -> bool {
        (self.activity)(location)
    }

    /// Whether the unit should be active at `location`.
    ///
    /// Broken units are never active.
    pub fn should_be_active(&self, location: &Location) -> bool {
        self.status() != Status::SkipBecauseBroken && self.matches(location)
    }

    /// Props for a loader or lifecycle call made at `location`.
    pub fn props(&self, location: &Location) -> Props {
        Props::new(
            self.name.clone(),
            self.custom_props.resolve(&self.name, location),
        )
    }

    pub(crate) fn lifecycles(&self) -> Option<Arc<Lifecycles>> {
        self.lifecycles.read().clone()
    }

    pub(crate) fn install(&self, lifecycles: Lifecycles, timeouts: AppTimeouts) {
        *self.lifecycles.write() = Some(Arc::new(lifecycles));
        *self.timeouts.write() = timeouts;
    }

    pub(crate) fn clear_lifecycles(&self) {
        self.lifecycles.write().take();
    }

    /// Timeout policy captured when the unit was loaded.
    pub fn timeouts(&self) -> AppTimeouts {
        *self.timeouts.read()
    }

    pub(crate) fn record_load_error(&self) {
        *self.load_error.lock() = Some(LoadErrorTime {
            at: Instant::now(),
            wall: Utc::now(),
        });
    }

    pub(crate) fn clear_load_error(&self) {
        self.load_error.lock().take();
    }

    /// Time elapsed since the most recent load failure.
    pub fn since_load_error(&self, now: Instant) -> Option<Duration> {
        self.load_error
            .lock()
            .map(|time| now.saturating_duration_since(time.at))
    }

    pub fn load_error_at(&self) -> Option<DateTime<Utc>> {
        self.load_error.lock().map(|time| time.wall)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight_load.lock().is_some()
    }

    /// Point-in-time view of this unit.
    pub fn snapshot(&self) -> UnitSnapshot {
        UnitSnapshot {
            name: self.name.clone(),
            status: self.status(),
            loaded: self.lifecycles.read().is_some(),
            load_in_flight: self.is_loading(),
            load_error_at: self.load_error_at(),
        }
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("name", &self.name)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Serializable view of a unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitSnapshot {
    pub name: String,
    pub status: Status,
    pub loaded: bool,
    pub load_in_flight: bool,
    pub load_error_at: Option<DateTime<Utc>>,
}
