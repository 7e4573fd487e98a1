//! Per-phase deadline configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Load,
    Bootstrap,
    Mount,
    Unmount,
    Unload,
    Update,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Load => "load",
            Phase::Bootstrap => "bootstrap",
            Phase::Mount => "mount",
            Phase::Unmount => "unmount",
            Phase::Unload => "unload",
            Phase::Update => "update",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deadline policy for one lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Hard deadline in milliseconds.
    #[serde(default = "default_millis")]
    pub millis: u64,
    /// Fail with a timeout error at the deadline instead of detaching the call.
    #[serde(default)]
    pub die_on_timeout: bool,
    /// Interval between "still running" warnings. Zero disables warnings.
    #[serde(default = "default_warning_millis")]
    pub warning_millis: u64,
}

const fn default_millis() -> u64 {
    3000
}

const fn default_warning_millis() -> u64 {
    1000
}

impl TimeoutConfig {
    #[must_use]
    pub const fn new(millis: u64, die_on_timeout: bool, warning_millis: u64) -> Self {
        Self {
            millis,
            die_on_timeout,
            warning_millis,
        }
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.millis)
    }

    /// Warning period, if warnings fire before the hard deadline.
    pub fn warning_period(&self) -> Option<Duration> {
        (self.warning_millis > 0 && self.warning_millis < self.millis)
            .then(|| Duration::from_millis(self.warning_millis))
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::new(default_millis(), false, default_warning_millis())
    }
}

/// Deadline policies for every phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppTimeouts {
    #[serde(default = "default_bootstrap")]
    pub bootstrap: TimeoutConfig,
    #[serde(default)]
    pub mount: TimeoutConfig,
    #[serde(default)]
    pub unmount: TimeoutConfig,
    #[serde(default)]
    pub unload: TimeoutConfig,
    #[serde(default)]
    pub update: TimeoutConfig,
}

fn default_bootstrap() -> TimeoutConfig {
    TimeoutConfig::new(4000, false, 1000)
}

impl Default for AppTimeouts {
    fn default() -> Self {
        Self {
            bootstrap: default_bootstrap(),
            mount: TimeoutConfig::default(),
            unmount: TimeoutConfig::default(),
            unload: TimeoutConfig::default(),
            update: TimeoutConfig::default(),
        }
    }
}

impl AppTimeouts {
    /// Config for a phase. Loads have no deadline of their own and report
    /// the bootstrap policy.
    pub fn get(&self, phase: Phase) -> TimeoutConfig {
        match phase {
            Phase::Load | Phase::Bootstrap => self.bootstrap,
            Phase::Mount => self.mount,
            Phase::Unmount => self.unmount,
            Phase::Unload => self.unload,
            Phase::Update => self.update,
        }
    }

    /// Replace the config of a phase. Returns false for phases without a slot.
    pub fn set(&mut self, phase: Phase, config: TimeoutConfig) -> bool {
        let slot = match phase {
            Phase::Bootstrap => &mut self.bootstrap,
            Phase::Mount => &mut self.mount,
            Phase::Unmount => &mut self.unmount,
            Phase::Unload => &mut self.unload,
            Phase::Update => &mut self.update,
            Phase::Load => return false,
        };
        *slot = config;
        true
    }

    /// Merge per-application overrides over these defaults, phase by phase.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &TimeoutOverrides) -> Self {
        if let Some(config) = overrides.bootstrap {
            self.bootstrap = config;
        }
        if let Some(config) = overrides.mount {
            self.mount = config;
        }
        if let Some(config) = overrides.unmount {
            self.unmount = config;
        }
        if let Some(config) = overrides.unload {
            self.unload = config;
        }
        if let Some(config) = overrides.update {
            self.update = config;
        }
        self
    }
}

/// Per-application timeout overrides exported by a module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutOverrides {
    pub bootstrap: Option<TimeoutConfig>,
    pub mount: Option<TimeoutConfig>,
    pub unmount: Option<TimeoutConfig>,
    pub unload: Option<TimeoutConfig>,
    pub update: Option<TimeoutConfig>,
}
