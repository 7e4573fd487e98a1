//! Handler for the `run` command.

use tabled::{Table, Tabled};
use tracing::{info, warn};

use crate::cli::catalog::demo_catalog;
use crate::cli::{output, RunArgs};
use crate::config::Config;
use crate::domain::{Location, UnitSnapshot};
use crate::error::{LifecycleError, Result};
use crate::orchestrator::Orchestrator;
use crate::port::LogListener;
use crate::reconcile::SettledState;

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Application")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Loaded")]
    loaded: bool,
    #[tabled(rename = "Last load error")]
    load_error: String,
}

impl From<UnitSnapshot> for StatusRow {
    fn from(snapshot: UnitSnapshot) -> Self {
        Self {
            name: snapshot.name,
            status: snapshot.status.to_string(),
            loaded: snapshot.loaded,
            load_error: snapshot
                .load_error_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Load config, register its applications, then reconcile once per path.
///
/// The first path is pre-fetched before `start`, so its applications are
/// already loaded when the first mount happens.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".into();
    }
    config.init_logging();
    info!(config = %args.config.display(), "stagehand starting");

    let orchestrator = Orchestrator::from_config(&config, &demo_catalog())?;
    orchestrator.add_listener(Box::new(LogListener));
    orchestrator.add_error_handler(|err: &LifecycleError| {
        warn!(app = %err.app(), status = %err.status(), error = %err, "Application error");
    });

    let mut paths = args.paths.iter();
    if let Some(first) = paths.next() {
        orchestrator
            .trigger_reconciliation(Some(Location::from_path(first)?))
            .await;
        let state = orchestrator.start().await;
        report(&orchestrator, &state, args.json)?;
    }
    for path in paths {
        let state = orchestrator
            .trigger_reconciliation(Some(Location::from_path(path)?))
            .await;
        report(&orchestrator, &state, args.json)?;
    }

    info!("stagehand stopped");
    Ok(())
}

fn report(orchestrator: &Orchestrator, state: &SettledState, json: bool) -> Result<()> {
    let snapshot = orchestrator.snapshot();
    if json {
        println!("{}", serde_json::to_string(&snapshot)?);
        return Ok(());
    }

    output::section(&format!("Location {}", state.location.route()));
    let rows: Vec<StatusRow> = snapshot.into_iter().map(StatusRow::from).collect();
    output::table(&Table::new(rows).to_string());
    println!();
    let mounted = state.mounted_names();
    if mounted.is_empty() {
        output::warn("No applications mounted");
    } else {
        output::key_value("Mounted:", mounted.join(", "));
    }
    output::key_value("Changes:", state.total_app_changes);
    Ok(())
}
