use std::sync::Arc;

use parking_lot::Mutex;
use stagehand::domain::{Location, Status};
use stagehand::error::LifecycleError;
use stagehand::testkit::module::{CallLog, ScriptedModule};
use stagehand::{Orchestrator, Registration};

pub fn at(path: &str) -> Location {
    Location::from_path(path).expect("valid test path")
}

/// Orchestrator that is already started, with errors collected.
pub async fn started() -> (Orchestrator, Arc<Mutex<Vec<LifecycleError>>>) {
    let orchestrator = Orchestrator::new();
    let errors = collect_errors(&orchestrator);
    orchestrator.start().await;
    (orchestrator, errors)
}

pub fn collect_errors(orchestrator: &Orchestrator) -> Arc<Mutex<Vec<LifecycleError>>> {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    orchestrator.add_error_handler(move |err: &LifecycleError| sink.lock().push(err.clone()));
    errors
}

/// Register a scripted module active under `path`.
pub fn register_scripted(
    orchestrator: &Orchestrator,
    name: &str,
    path: &str,
    log: &CallLog,
) -> ScriptedModule {
    let module = ScriptedModule::new(name, log);
    orchestrator
        .register(Registration::new(name, module.exports(), path))
        .expect("register scripted module");
    module
}

pub fn assert_status(orchestrator: &Orchestrator, name: &str, expected: Status) {
    assert_eq!(
        orchestrator.status(name),
        Some(expected),
        "unexpected status for {name}"
    );
}
