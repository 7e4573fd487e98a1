//! Scripted modules that record their lifecycle calls.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::domain::{hook, Hook, Module, ModuleExports, Phase, Props, TimeoutOverrides};

/// One recorded lifecycle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub app: String,
    pub phase: Phase,
}

/// Shared, ordered record of lifecycle calls across modules.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, app: &str, phase: Phase) {
        self.calls.lock().push(Call {
            app: app.to_string(),
            phase,
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Phases called on `app`, in order.
    pub fn phases(&self, app: &str) -> Vec<Phase> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.app == app)
            .map(|call| call.phase)
            .collect()
    }

    pub fn count(&self, app: &str, phase: Phase) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.app == app && call.phase == phase)
            .count()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// Builder for a module whose hooks log to a [`CallLog`].
///
/// Every hook records its call before it sleeps or fails, so a timed-out or
/// rejected call still shows up in the log.
#[derive(Debug, Clone)]
pub struct ScriptedModule {
    app: String,
    log: CallLog,
    failing: HashSet<Phase>,
    delays: HashMap<Phase, Duration>,
    optional: HashSet<Phase>,
    timeouts: Option<TimeoutOverrides>,
}

impl ScriptedModule {
    /// Module exporting `mount` and `unmount` only.
    pub fn new(app: impl Into<String>, log: &CallLog) -> Self {
        Self {
            app: app.into(),
            log: log.clone(),
            failing: HashSet::new(),
            delays: HashMap::new(),
            optional: HashSet::new(),
            timeouts: None,
        }
    }

    /// Also export the optional `bootstrap`, `unload` and `update` hooks.
    #[must_use]
    pub fn with_all_hooks(mut self) -> Self {
        self.optional
            .extend([Phase::Bootstrap, Phase::Unload, Phase::Update]);
        self
    }

    /// Also export the hook for `phase`.
    #[must_use]
    pub fn with_hook(mut self, phase: Phase) -> Self {
        self.optional.insert(phase);
        self
    }

    /// Make the hook for `phase` reject. Implies exporting it.
    #[must_use]
    pub fn failing(mut self, phase: Phase) -> Self {
        self.failing.insert(phase);
        self.optional.insert(phase);
        self
    }

    /// Make the hook for `phase` sleep before resolving. Implies exporting it.
    #[must_use]
    pub fn delayed(mut self, phase: Phase, delay: Duration) -> Self {
        self.delays.insert(phase, delay);
        self.optional.insert(phase);
        self
    }

    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutOverrides) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    pub fn exports(&self) -> ModuleExports {
        let mut exports = ModuleExports::new()
            .hook(Phase::Mount.as_str(), self.hook_for(Phase::Mount))
            .hook(Phase::Unmount.as_str(), self.hook_for(Phase::Unmount));
        for phase in [Phase::Bootstrap, Phase::Unload, Phase::Update] {
            if self.optional.contains(&phase) {
                exports = exports.hook(phase.as_str(), self.hook_for(phase));
            }
        }
        if let Some(timeouts) = self.timeouts {
            exports = exports.timeouts(timeouts);
        }
        exports
    }

    pub fn module(&self) -> Module {
        Module::Exports(self.exports())
    }

    fn hook_for(&self, phase: Phase) -> Hook {
        let app = self.app.clone();
        let log = self.log.clone();
        let fails = self.failing.contains(&phase);
        let delay = self.delays.get(&phase).copied();
        hook(move |_props: Props| {
            log.push(&app, phase);
            let app = app.clone();
            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if fails {
                    anyhow::bail!("{app} {phase} failed on purpose");
                }
                Ok(())
            }
        })
    }
}
