use anyhow::Result;
use assert_cmd::Command;
use libnewsthread::types::{Thread, ThreadPost, ThreadStatus};
use libnewsthread::Database;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// Database with one completed and one partial thread, plus usage rows
async fn create_test_database() -> Result<(TempDir, PathBuf)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path.to_string_lossy()).await?;
    let now = chrono::Utc::now().timestamp();

    let completed = Thread::new("Morning digest".to_string(), 2);
    db.create_thread(&completed).await?;
    for position in 1..=2u32 {
        db.record_thread_post(&ThreadPost {
            id: None,
            thread_id: completed.id.clone(),
            position,
            body: format!("Completed thread post {}", position),
            external_id: Some(format!("100{}", position)),
            reply_to_id: (position > 1).then(|| "1001".to_string()),
            posted_at: now,
        })
        .await?;
    }
    db.finalize_thread(&completed.id, 2, ThreadStatus::Completed, now).await?;

    let partial = Thread::new("Evening digest".to_string(), 5);
    db.create_thread(&partial).await?;
    db.record_thread_post(&ThreadPost {
        id: None,
        thread_id: partial.id.clone(),
        position: 1,
        body: "Partial thread opener".to_string(),
        external_id: Some("2001".to_string()),
        reply_to_id: None,
        posted_at: now,
    })
    .await?;
    db.finalize_thread(&partial.id, 1, ThreadStatus::Partial, now).await?;

    db.increment_usage("x", "2026-09", 120, now).await?;
    db.increment_usage("x", "2026-10", 3, now).await?;
    db.increment_usage("search", "2026-10", 2, now).await?;
    db.pool().close().await;

    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            "[database]\npath = \"{}\"\n\n[search]\n\n[composer]\n\n[x]\n",
            db_path.display()
        ),
    )?;

    Ok((temp_dir, config_path))
}

fn history(config_path: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("newsthread-history").unwrap();
    cmd.env_remove("NEWSTHREAD_CONFIG").arg("--config").arg(config_path);
    cmd
}

#[tokio::test]
async fn test_lists_threads_with_posts() -> Result<()> {
    let (_temp_dir, config_path) = create_test_database().await?;

    history(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Morning digest"))
        .stdout(predicate::str::contains("Evening digest"))
        .stdout(predicate::str::contains("2/2 completed"))
        .stdout(predicate::str::contains("1/5 partial"))
        .stdout(predicate::str::contains("Completed thread post 2"));
    Ok(())
}

#[tokio::test]
async fn test_status_filter() -> Result<()> {
    let (_temp_dir, config_path) = create_test_database().await?;

    history(&config_path)
        .args(["--status", "partial"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Evening digest"))
        .stdout(predicate::str::contains("Morning digest").not());
    Ok(())
}

#[tokio::test]
async fn test_json_output() -> Result<()> {
    let (_temp_dir, config_path) = create_test_database().await?;

    let output = history(&config_path).args(["--format", "json"]).output()?;
    assert!(output.status.success());

    let threads: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let threads = threads.as_array().unwrap();
    assert_eq!(threads.len(), 2);
    for entry in threads {
        let published = entry["thread"]["published_count"].as_u64().unwrap();
        assert_eq!(entry["posts"].as_array().unwrap().len() as u64, published);
    }
    Ok(())
}

#[tokio::test]
async fn test_usage_for_month() -> Result<()> {
    let (_temp_dir, config_path) = create_test_database().await?;

    let output = history(&config_path)
        .args(["--usage", "--month", "2026-10", "--format", "jsonl"])
        .output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    for line in lines {
        let counter: serde_json::Value = serde_json::from_str(line)?;
        assert_eq!(counter["month_key"], "2026-10");
    }
    Ok(())
}

#[test]
fn test_missing_database() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            "[database]\npath = \"{}\"\n\n[search]\n\n[composer]\n\n[x]\n",
            temp_dir.path().join("missing.db").display()
        ),
    )
    .unwrap();

    history(&config_path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Database not found"));
}
