//! End-to-end tests for the bulkload binary
//!
//! These run the built CLI against a wiremock endpoint:
//! - Upload through to the queue summary
//! - Queue listing, table and JSON
//! - Inspect and config output
//! - Validation errors before anything is queued

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Helper to create a CSV with `rows` data rows
fn create_csv(dir: &TempDir, name: &str, rows: usize) -> PathBuf {
    let file = dir.path().join(name);
    let mut content = String::from("account,qty,desk\n");
    for i in 0..rows {
        content.push_str(&format!("ACC-{},{},rates\n", i, i * 5));
    }
    fs::write(&file, content).expect("Failed to create test CSV");
    file
}

/// Helper to build an isolated `bulkload` command
fn bulkload(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("bulkload").expect("binary builds");
    cmd.current_dir(dir.path())
        .env("NO_COLOR", "1")
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env("XDG_DATA_HOME", dir.path().join("data"))
        .env("BULKLOAD_QUEUE_PATH", queue_path(dir.path()))
        .env("BULKLOAD_CHUNK_SIZE", "2")
        .env("BULKLOAD_DELAY_BETWEEN_CHUNKS_MS", "0")
        .env("BULKLOAD_RETRY_DELAY_MS", "1")
        .env_remove("BULKLOAD_API_ENDPOINT");
    cmd
}

fn queue_path(dir: &Path) -> PathBuf {
    dir.join("queue.json")
}

fn endpoint(server: &MockServer) -> String {
    format!("{}/api/v1/uploads/chunks", server.uri())
}

#[tokio::test]
async fn test_upload_success_and_queue_list() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/uploads/chunks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(3)
        .mount(&server)
        .await;

    let file = create_csv(&dir, "trades.csv", 5);

    bulkload(&dir)
        .arg("--endpoint")
        .arg(endpoint(&server))
        .arg("upload")
        .arg(&file)
        .arg("--filter")
        .arg("desk=rates")
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued"))
        .stdout(predicate::str::contains("Upload Summary:"))
        .stdout(predicate::str::contains("trades.csv (5/5 records, 100%)"));

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(queue_path(dir.path())).unwrap()).unwrap();
    assert_eq!(saved["items"][0]["status"], "success");
    assert_eq!(saved["items"][0]["filters"]["desk"], "rates");

    bulkload(&dir)
        .args(["queue", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("trades.csv"))
        .stdout(predicate::str::contains("success"))
        .stdout(predicate::str::contains("1 upload(s)"));

    bulkload(&dir)
        .args(["queue", "list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"success\""));
}

#[tokio::test]
async fn test_upload_with_rejected_chunks_suggests_retry() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let file = create_csv(&dir, "positions.csv", 3);

    bulkload(&dir)
        .env("BULKLOAD_MAX_RETRIES", "1")
        .arg("--endpoint")
        .arg(endpoint(&server))
        .arg("upload")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 chunk(s) of positions.csv failed"))
        .stdout(predicate::str::contains("bulkload retry"));

    bulkload(&dir)
        .args(["queue", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("failed"));
}

#[test]
fn test_empty_queue_list() {
    let dir = TempDir::new().unwrap();

    bulkload(&dir)
        .args(["queue", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Upload queue is empty."));
}

#[test]
fn test_inspect_reports_headers_and_plan() {
    let dir = TempDir::new().unwrap();
    let file = create_csv(&dir, "ledger.csv", 5);

    bulkload(&dir)
        .arg("inspect")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("account"))
        .stdout(predicate::str::contains("desk"))
        .stdout(predicate::str::contains("Rows:       5"))
        .stdout(predicate::str::contains("Chunks:     3"));

    assert!(!queue_path(dir.path()).exists());
}

#[test]
fn test_inspect_header_only_file_fails() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("empty.csv");
    fs::write(&file, "account,qty\n").unwrap();

    bulkload(&dir)
        .arg("inspect")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No data found"));
}

#[test]
fn test_config_show() {
    let dir = TempDir::new().unwrap();

    bulkload(&dir)
        .args(["--endpoint", "https://ingest.example.com/chunks", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("api_endpoint = \"https://ingest.example.com/chunks\""))
        .stdout(predicate::str::contains("chunk_size = 2"))
        .stdout(predicate::str::contains("BULKLOAD_QUEUE_PATH"));
}

#[test]
fn test_invalid_endpoint_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = create_csv(&dir, "trades.csv", 2);

    bulkload(&dir)
        .args(["--endpoint", "not-a-url", "upload"])
        .arg(&file)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid API endpoint 'not-a-url'"));

    assert!(!queue_path(dir.path()).exists());
}

#[test]
fn test_unsupported_file_type_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("notes.txt");
    fs::write(&file, "hello").unwrap();

    bulkload(&dir)
        .args(["--endpoint", "http://127.0.0.1:1/chunks", "upload"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported type"));
}

#[test]
fn test_missing_subcommand_exits_with_usage_error() {
    let dir = TempDir::new().unwrap();

    bulkload(&dir)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("A subcommand is required"));
}
