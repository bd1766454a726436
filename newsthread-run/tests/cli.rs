//! Command-line tests for newsthread-run
//!
//! No test here reaches the network: the runs stop at configuration
//! validation, at opening the database, at the budget gate, or on the
//! unreachable local endpoints.

use assert_cmd::Command;
use libnewsthread::quota::month_key;
use libnewsthread::Database;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const SECRET_VARS: [&str; 6] = [
    "NEWSTHREAD_X_CONSUMER_KEY",
    "NEWSTHREAD_X_CONSUMER_SECRET",
    "NEWSTHREAD_X_ACCESS_TOKEN",
    "NEWSTHREAD_X_ACCESS_TOKEN_SECRET",
    "NEWSTHREAD_SEARCH_API_KEY",
    "NEWSTHREAD_COMPOSER_API_KEY",
];

fn newsthread_run() -> Command {
    let mut cmd = Command::cargo_bin("newsthread-run").unwrap();
    for var in SECRET_VARS {
        cmd.env_remove(var);
    }
    cmd.env_remove("NEWSTHREAD_CONFIG");
    cmd
}

fn write_config(dir: &Path, with_secrets: bool) -> std::path::PathBuf {
    let db_path = dir.join("newsthread.db");
    let secrets = if with_secrets {
        r#"
consumer_key = "ck"
consumer_secret = "cs"
access_token = "at"
access_token_secret = "ats"
"#
    } else {
        ""
    };
    let keys = if with_secrets { "api_key = \"k\"" } else { "" };

    let config = format!(
        r#"
[database]
path = "{db}"

[search]
endpoint = "http://127.0.0.1:1/search"
{keys}

[composer]
endpoint = "http://127.0.0.1:1/compose"
{keys}

[x]
endpoint = "http://127.0.0.1:1/2/tweets"
{secrets}

[publishing]
pacing_delay = "0s"
"#,
        db = db_path.display(),
        keys = keys,
        secrets = secrets,
    );

    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, config).unwrap();
    config_path
}

#[test]
fn test_help() {
    newsthread_run()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("EXIT CODES"));
}

#[test]
fn test_missing_config_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();

    newsthread_run()
        .arg("--config")
        .arg(temp_dir.path().join("absent.toml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_missing_config_file_prints_failed_payload() {
    let temp_dir = TempDir::new().unwrap();

    let output = newsthread_run()
        .arg("--config")
        .arg(temp_dir.path().join("absent.toml"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["outcome"], "failed");
    assert_eq!(payload["status"], 500);
}

#[test]
fn test_unopenable_database_prints_failed_payload() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), true);

    // A regular file where the database directory should be
    let blocker = temp_dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let config = std::fs::read_to_string(&config_path).unwrap().replace(
        &temp_dir.path().join("newsthread.db").display().to_string(),
        &blocker.join("newsthread.db").display().to_string(),
    );
    std::fs::write(&config_path, config).unwrap();

    let output = newsthread_run()
        .arg("--config")
        .arg(&config_path)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["outcome"], "failed");
    assert_eq!(payload["status"], 500);
    assert!(payload["error"].as_str().unwrap().contains("Database error"));
}

#[test]
fn test_missing_secret_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), false);

    newsthread_run()
        .arg("--config")
        .arg(&config_path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("x.consumer_key"));
}

#[test]
fn test_secrets_from_environment_are_accepted() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), false);

    // Valid secrets get the run past validation; the unreachable search
    // endpoint then fails both queries.
    let mut cmd = newsthread_run();
    for var in SECRET_VARS {
        cmd.env(var, "from-env");
    }
    cmd.arg("--config")
        .arg(&config_path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"outcome\":\"failed\""))
        .stdout(predicate::str::contains("\"status\":500"));
}

#[tokio::test]
async fn test_exhausted_budget_exits_with_budget_code() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), true);

    let db_path = temp_dir.path().join("newsthread.db");
    let db = Database::new(&db_path.to_string_lossy()).await.unwrap();
    let now = chrono::Utc::now();
    db.increment_usage("x", &month_key(now), 450, now.timestamp())
        .await
        .unwrap();
    db.pool().close().await;

    let output = newsthread_run()
        .arg("--config")
        .arg(&config_path)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["outcome"], "budget_exceeded");
    assert_eq!(payload["status"], 429);
    assert_eq!(payload["service"], "x");
    assert_eq!(payload["used"], 450);
}
