//! Application status values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a registered application.
///
/// Stable statuses are the ones a unit rests in between transitions.
/// Every other status marks a transition that is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Status {
    NotLoaded = 0,
    #[serde(rename = "LOADING_SOURCE_CODE")]
    Loading = 1,
    NotBootstrapped = 2,
    Bootstrapping = 3,
    NotMounted = 4,
    Mounting = 5,
    Mounted = 6,
    Updating = 7,
    Unmounting = 8,
    Unloading = 9,
    LoadError = 10,
    SkipBecauseBroken = 11,
}

impl Status {
    /// All statuses in declaration order.
    pub const ALL: [Status; 12] = [
        Status::NotLoaded,
        Status::Loading,
        Status::NotBootstrapped,
        Status::Bootstrapping,
        Status::NotMounted,
        Status::Mounting,
        Status::Mounted,
        Status::Updating,
        Status::Unmounting,
        Status::Unloading,
        Status::LoadError,
        Status::SkipBecauseBroken,
    ];

    /// Canonical upper-case name, as reported in errors and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Status::NotLoaded => "NOT_LOADED",
            Status::Loading => "LOADING_SOURCE_CODE",
            Status::NotBootstrapped => "NOT_BOOTSTRAPPED",
            Status::Bootstrapping => "BOOTSTRAPPING",
            Status::NotMounted => "NOT_MOUNTED",
            Status::Mounting => "MOUNTING",
            Status::Mounted => "MOUNTED",
            Status::Updating => "UPDATING",
            Status::Unmounting => "UNMOUNTING",
            Status::Unloading => "UNLOADING",
            Status::LoadError => "LOAD_ERROR",
            Status::SkipBecauseBroken => "SKIP_BECAUSE_BROKEN",
        }
    }

    /// True when no transition is in flight for a unit in this status.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(
            self,
            Status::NotLoaded
                | Status::NotBootstrapped
                | Status::NotMounted
                | Status::Mounted
                | Status::LoadError
                | Status::SkipBecauseBroken
        )
    }

    /// True for the mounted status only.
    #[must_use]
    pub const fn is_mounted(self) -> bool {
        matches!(self, Status::Mounted)
    }

    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Status::NotLoaded,
            1 => Status::Loading,
            2 => Status::NotBootstrapped,
            3 => Status::Bootstrapping,
            4 => Status::NotMounted,
            5 => Status::Mounting,
            6 => Status::Mounted,
            7 => Status::Updating,
            8 => Status::Unmounting,
            9 => Status::Unloading,
            10 => Status::LoadError,
            _ => Status::SkipBecauseBroken,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
