//! End-to-end checks of the `workerscaled` binary that need neither Redis
//! nor Docker: configuration resolution, redaction, and exit status.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn workerscaled(args: &[&str], env: &[(&str, &str)]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_workerscaled"))
        .args(args)
        .env_clear()
        .envs(env.iter().copied())
        .output()
        .expect("failed to spawn workerscaled")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn check_prints_resolved_config() {
    let output = workerscaled(
        &["check", "--config-only"],
        &[
            ("COMPOSE_PROJECT_NAME", "automation"),
            ("REDIS_PASSWORD", "s3cret"),
            ("SCALE_UP_QUEUE_THRESHOLD", "10"),
        ],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let config = stdout_json(&output);
    assert_eq!(config["compose"]["project_name"], "automation");
    assert_eq!(config["scaling"]["scale_up_threshold"], 10);
    assert_ne!(config["redis"]["password"], "s3cret");
    assert!(!String::from_utf8_lossy(&output.stdout).contains("s3cret"));
}

#[test]
fn missing_project_name_fails() {
    let output = workerscaled(&["check", "--config-only"], &[]);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(stderr(&output).contains("COMPOSE_PROJECT_NAME"));
}

#[test]
fn run_refuses_to_start_without_project_name() {
    let output = workerscaled(&["run"], &[("REDIS_HOST", "127.0.0.1")]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("COMPOSE_PROJECT_NAME"));
}

#[test]
fn inverted_replica_bounds_fail() {
    let output = workerscaled(
        &["check", "--config-only"],
        &[
            ("COMPOSE_PROJECT_NAME", "automation"),
            ("MIN_REPLICAS", "4"),
            ("MAX_REPLICAS", "2"),
        ],
    );

    assert!(!output.status.success());
    assert!(stderr(&output).contains("maximum replicas"));
}

#[test]
fn check_rejects_missing_compose_file() {
    let output = workerscaled(
        &["check"],
        &[
            ("COMPOSE_PROJECT_NAME", "automation"),
            ("COMPOSE_FILE_PATH", "/nonexistent/docker-compose.yml"),
        ],
    );

    assert!(!output.status.success());
    assert!(stderr(&output).contains("compose file not found"));
}

#[test]
fn environment_overrides_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workerscale.toml");
    std::fs::write(
        &path,
        r#"
[queue]
name = "emails"

[scaling]
min_replicas = 2
max_replicas = 6

[compose]
project_name = "from-file"
"#,
    )
    .unwrap();

    let output = workerscaled(
        &["check", "--config-only", "--config", path_str(&path)],
        &[("MAX_REPLICAS", "9")],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let config = stdout_json(&output);
    assert_eq!(config["queue"]["name"], "emails");
    assert_eq!(config["scaling"]["min_replicas"], 2);
    assert_eq!(config["scaling"]["max_replicas"], 9);
    assert_eq!(config["compose"]["project_name"], "from-file");
}

#[test]
fn unreadable_config_file_fails() {
    let output = workerscaled(
        &["check", "--config", "/nonexistent/workerscale.toml"],
        &[("COMPOSE_PROJECT_NAME", "automation")],
    );

    assert!(!output.status.success());
    assert!(stderr(&output).contains("/nonexistent/workerscale.toml"));
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp path is not UTF-8")
}
