mod support;

use stagehand::config::Config;
use stagehand::domain::Status;
use stagehand::error::{ConfigError, Error, RegistrationError};
use stagehand::testkit::loader::rejecting;
use stagehand::testkit::module::{CallLog, ScriptedModule};
use stagehand::{LoaderCatalog, Orchestrator};
use support::config::write_temp_config;
use support::orchestrator::at;

fn catalog(log: &CallLog) -> LoaderCatalog {
    LoaderCatalog::new()
        .with(
            "nav",
            stagehand::domain::static_loader(ScriptedModule::new("nav", log).module()),
        )
        .with(
            "shop",
            stagehand::domain::static_loader(ScriptedModule::new("shop", log).module()),
        )
        .with("offline", rejecting("offline"))
}

#[test]
fn loads_settings_from_file() {
    let file = write_temp_config(
        r#"
        [logging]
        level = "debug"
        format = "json"

        [reconcile]
        reload_backoff_ms = 50

        [timeouts.mount]
        millis = 1200
        die_on_timeout = true
        "#,
    );

    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.reconcile.reload_backoff_ms, 50);
    assert_eq!(config.timeouts.mount.millis, 1200);
    assert!(config.timeouts.mount.die_on_timeout);
    assert_eq!(config.timeouts.bootstrap.millis, 3000);
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = Config::load(dir.path().join("absent.toml")).unwrap_err();

    assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))));
}

#[tokio::test]
async fn declared_applications_are_registered_in_order() {
    let log = CallLog::new();
    let file = write_temp_config(
        r#"
        [[applications]]
        name = "nav"
        app = "nav"
        active_when = "/"

        [[applications]]
        name = "shop"
        app = "shop"
        active_when = ["/shop", "/cart"]
        custom_props = { currency = "EUR" }

        [[applications]]
        name = "reviews"
        app = "offline"
        active_when = "/shop/:id/reviews"
        "#,
    );
    let config = Config::load(file.path()).unwrap();

    let orchestrator = Orchestrator::from_config(&config, &catalog(&log)).unwrap();
    orchestrator.start().await;
    let state = orchestrator
        .trigger_reconciliation(Some(at("/shop/42/reviews")))
        .await;

    assert_eq!(orchestrator.names(), vec!["nav", "shop", "reviews"]);
    assert_eq!(state.status("nav"), Some(Status::Mounted));
    assert_eq!(state.status("shop"), Some(Status::Mounted));
    assert_eq!(state.status("reviews"), Some(Status::LoadError));
}

#[test]
fn unknown_application_keys_are_rejected() {
    let log = CallLog::new();
    let config = Config::parse_toml(
        r#"
        [[applications]]
        name = "nav"
        app = "nav"
        active_when = "/"
        activeWhen = "/"
        "#,
    )
    .unwrap();

    let err = Orchestrator::from_config(&config, &catalog(&log)).unwrap_err();

    match err {
        Error::Registration(RegistrationError::UnknownConfigKey { invalid, .. }) => {
            assert_eq!(invalid, vec!["activeWhen"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_loader_key_is_rejected() {
    let log = CallLog::new();
    let config = Config::parse_toml(
        r#"
        [[applications]]
        name = "ghost"
        app = "missing"
        active_when = "/"
        "#,
    )
    .unwrap();

    let err = Orchestrator::from_config(&config, &catalog(&log)).unwrap_err();

    assert!(matches!(
        err,
        Error::Registration(RegistrationError::InvalidArgument(ref reason)) if reason.contains("missing")
    ));
}
