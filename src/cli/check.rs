//! Configuration validation command.

use std::path::Path;

use tabled::{Table, Tabled};

use crate::cli::catalog::demo_catalog;
use crate::cli::output;
use crate::config::Config;
use crate::domain::Phase;
use crate::error::{Error, Result};
use crate::registration::RegistrationConfig;

#[derive(Tabled)]
struct TimeoutRow {
    #[tabled(rename = "Phase")]
    phase: Phase,
    #[tabled(rename = "Deadline (ms)")]
    millis: u64,
    #[tabled(rename = "Die on timeout")]
    die_on_timeout: bool,
    #[tabled(rename = "Warn every (ms)")]
    warning_millis: u64,
}

/// Validate a configuration file without running anything.
///
/// Every declared application is validated against the demo catalog; the
/// first invalid one is returned as the error after all are reported.
pub fn execute<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    println!("Checking configuration: {}", path.display());

    let config = Config::load(path)?;
    output::ok("Configuration file is valid");

    output::section("Settings");
    output::key_value("Log level:", &config.logging.level);
    output::key_value("Log format:", &config.logging.format);
    output::key_value(
        "Reload after:",
        format!("{} ms", config.reconcile.reload_backoff_ms),
    );

    output::section("Timeouts");
    let rows: Vec<TimeoutRow> = [
        Phase::Bootstrap,
        Phase::Mount,
        Phase::Unmount,
        Phase::Unload,
        Phase::Update,
    ]
    .into_iter()
    .map(|phase| {
        let timeout = config.timeouts.get(phase);
        TimeoutRow {
            phase,
            millis: timeout.millis,
            die_on_timeout: timeout.die_on_timeout,
            warning_millis: timeout.warning_millis,
        }
    })
    .collect();
    output::table(&Table::new(rows).to_string());

    output::section("Applications");
    if config.applications.is_empty() {
        output::warn("No applications declared");
        return Ok(());
    }

    let catalog = demo_catalog();
    let mut first_error: Option<Error> = None;
    for (index, table) in config.applications.iter().enumerate() {
        let label = table
            .get("name")
            .and_then(toml::Value::as_str)
            .map_or_else(|| format!("#{}", index + 1), str::to_string);
        let checked = RegistrationConfig::from_table(table, &catalog)
            .and_then(RegistrationConfig::into_registration)
            .and_then(|registration| registration.into_unit().map(|_| ()));
        match checked {
            Ok(()) => output::ok(&label),
            Err(err) => {
                output::error(&format!("{label}: {err}"));
                if first_error.is_none() {
                    first_error = Some(err.into());
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
