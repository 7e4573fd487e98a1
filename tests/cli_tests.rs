mod support;

use std::process::{Command, Output};

use serde_json::Value;
use support::config::write_temp_config;

const DEMO_CONFIG: &str = r#"
[logging]
level = "error"

[[applications]]
name = "nav"
app = "logging"
active_when = "/"

[[applications]]
name = "settings"
app = "logging"
active_when = "/settings"

[[applications]]
name = "legacy"
app = "invalid"
active_when = "/legacy"
"#;

fn stagehand(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stagehand"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run stagehand binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn run_reports_one_snapshot_per_path() {
    let file = write_temp_config(DEMO_CONFIG);
    let config = file.path().to_str().unwrap();

    let output = stagehand(&["run", "--config", config, "--json", "/settings", "/legacy"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let snapshots: Vec<Value> = stdout(&output)
        .lines()
        .filter(|line| line.starts_with('['))
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(snapshots.len(), 2);

    let status_of = |snapshot: &Value, name: &str| {
        snapshot
            .as_array()
            .unwrap()
            .iter()
            .find(|unit| unit["name"] == name)
            .map(|unit| unit["status"].as_str().unwrap().to_string())
            .unwrap()
    };
    assert_eq!(status_of(&snapshots[0], "nav"), "MOUNTED");
    assert_eq!(status_of(&snapshots[0], "settings"), "MOUNTED");
    assert_eq!(status_of(&snapshots[1], "settings"), "NOT_MOUNTED");
    assert_eq!(status_of(&snapshots[1], "legacy"), "SKIP_BECAUSE_BROKEN");
}

#[test]
fn run_prints_a_status_table() {
    let file = write_temp_config(DEMO_CONFIG);
    let config = file.path().to_str().unwrap();

    let output = stagehand(&["run", "--config", config, "/settings"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Application"));
    assert!(text.contains("settings"));
    assert!(text.contains("MOUNTED"));
}

#[test]
fn check_accepts_a_valid_config() {
    let file = write_temp_config(DEMO_CONFIG);

    let output = stagehand(&["check", "--config", file.path().to_str().unwrap()]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("Configuration file is valid"));
}

#[test]
fn check_fails_on_an_unknown_loader() {
    let file = write_temp_config(
        r#"
        [[applications]]
        name = "ghost"
        app = "nowhere"
        active_when = "/"
        "#,
    );

    let output = stagehand(&["check", "--config", file.path().to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(stdout(&output).contains("ghost"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

#[test]
fn check_fails_on_a_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let output = stagehand(&["check", "--config", missing.to_str().unwrap()]);

    assert!(!output.status.success());
}

#[test]
fn match_reports_whether_a_pattern_applies() {
    let hit = stagehand(&["match", "/users/:id", "/users/42/posts"]);
    assert!(hit.status.success());
    assert!(stdout(&hit).contains("matches"));
    assert!(!stdout(&hit).contains("does not match"));

    let miss = stagehand(&["match", "--exact", "/users/:id", "/users/42/posts"]);
    assert!(miss.status.success());
    assert!(stdout(&miss).contains("does not match"));
}
