use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{any, body_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Fixture helpers ────────────────────────────────────────────────────────

/// Create a login log root with one day of logins.
///
/// Layout:
///   <tmp>/logs/player_login/2024/06/15/00.jsonl  (u1 ios/Organic, u3 iOS/organic)
///   <tmp>/logs/player_login/2024/06/15/12.jsonl  (u2 Android/GOOGLE_PLAY, one malformed line)
fn create_login_fixture_dir() -> TempDir {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let day = tmp.path().join("logs/player_login/2024/06/15");
    fs::create_dir_all(&day).unwrap();

    fs::write(
        day.join("00.jsonl"),
        concat!(
            "{\"player_id\":\"u1\",\"platform\":\"ios\",\"channel\":\"Organic\"}\n",
            "{\"player_id\":\"u3\",\"platform\":\"iOS\",\"channel\":\"organic\"}\n",
        ),
    )
    .unwrap();
    fs::write(
        day.join("12.jsonl"),
        concat!(
            "{\"player_id\":\"u2\",\"platform\":\"Android\",\"channel\":\"GOOGLE_PLAY\"}\n",
            "{\"player_id\":\"u4\"}\n",
        ),
    )
    .unwrap();

    tmp
}

/// Mount a paying-users index holding `ids` (single scroll page).
async fn mount_paying_users(server: &MockServer, ids: &[&str]) {
    let hits: Vec<Value> = ids.iter().map(|id| json!({ "_id": id })).collect();
    Mock::given(method("POST"))
        .and(path("/paying-users/_search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "_scroll_id": "scroll-1", "hits": { "hits": hits } })),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_search/scroll"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "_scroll_id": "scroll-1", "hits": { "hits": [] } })),
        )
        .mount(server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/_search/scroll"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

/// Build a Command with a clean environment and complete settings.
fn cmd_with_env(es_host: &str, logs: &Path) -> Command {
    let mut cmd = Command::cargo_bin("payactive").unwrap();
    cmd.env_clear()
        .current_dir(logs)
        .env("ES_HOST", es_host)
        .env("LOGIN_LOG_DIR", logs)
        .env("S3_KEY_PREFIX", "logs")
        .env("PLAYER_LOGIN_EVENT", "player_login")
        .env("PAYING_USER_ID_SCHEME", "player");
    cmd
}

/// assert_cmd blocks; keep it off the runtime driving the mock server.
async fn run_blocking(mut cmd: Command) -> assert_cmd::assert::Assert {
    tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .expect("command task panicked")
}

// ── Argument handling ──────────────────────────────────────────────────────

#[test]
fn test_help_command() {
    let mut cmd = Command::cargo_bin("payactive").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Daily active paying users"))
        .stdout(predicate::str::contains("--day"));
}

#[test]
fn test_version_flag() {
    let mut cmd = Command::cargo_bin("payactive").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("payactive"));
}

#[test]
fn test_invalid_day_is_rejected() {
    let mut cmd = Command::cargo_bin("payactive").unwrap();
    cmd.args(["--day", "15/06/2024"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("YYYY-MM-DD"));
}

// ── Configuration ──────────────────────────────────────────────────────────

#[test]
fn test_missing_settings_are_all_reported() {
    let tmp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("payactive").unwrap();
    cmd.env_clear()
        .current_dir(tmp.path())
        .env("ES_PAYING_USERS_INDEX", "")
        .args(["--day", "2024-06-15"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ES_HOST"))
        .stderr(predicate::str::contains("ES_PAYING_USERS_INDEX"))
        .stderr(predicate::str::contains("S3_KEY_PREFIX"))
        .stderr(predicate::str::contains("PLAYER_LOGIN_EVENT"))
        .stderr(predicate::str::contains("S3_BUCKET"));
}

#[test]
fn test_settings_from_dotenv_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".env"),
        "ES_HOST=http://127.0.0.1:1\nS3_KEY_PREFIX=logs\nPLAYER_LOGIN_EVENT=player_login\n",
    )
    .unwrap();

    // Only the bucket is left unset, so that is the only name reported.
    let mut cmd = Command::cargo_bin("payactive").unwrap();
    cmd.env_clear()
        .current_dir(tmp.path())
        .args(["--day", "2024-06-15"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required settings: S3_BUCKET"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_incomplete_settings_abort_before_any_store_request() {
    let server = MockServer::start().await;
    let logs = create_login_fixture_dir();

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut cmd = Command::cargo_bin("payactive").unwrap();
    cmd.env_clear()
        .current_dir(logs.path())
        .env("ES_HOST", server.uri())
        .env("LOGIN_LOG_DIR", logs.path())
        .env("PLAYER_LOGIN_EVENT", "player_login")
        .args(["--day", "2024-06-15"]);
    run_blocking(cmd)
        .await
        .failure()
        .stderr(predicate::str::contains("missing required settings: S3_KEY_PREFIX"));

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty(), "unexpected requests: {}", requests.len());
}

#[test]
fn test_unreachable_search_store_fails() {
    let logs = create_login_fixture_dir();
    let mut cmd = cmd_with_env("http://127.0.0.1:1", logs.path());
    cmd.args(["--day", "2024-06-15"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("payment store unavailable"));
}

// ── End-to-end runs ────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_run_writes_one_document_per_segment() {
    let server = MockServer::start().await;
    let logs = create_login_fixture_dir();
    mount_paying_users(&server, &["u1", "u2"]).await;

    Mock::given(method("PUT"))
        .and(path("/active-paying-users/_doc/ios_organic"))
        .and(body_json(json!({
            "@timestamp": "2024-06-15T00:00:00Z",
            "count": 1,
            "platform": "ios",
            "channel": "organic",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/active-paying-users/_doc/android_google_store"))
        .and(body_json(json!({
            "@timestamp": "2024-06-15T00:00:00Z",
            "count": 1,
            "platform": "android",
            "channel": "google_store",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = cmd_with_env(&server.uri(), logs.path());
    cmd.args(["--day", "2024-06-15", "--json"]);
    let assert = run_blocking(cmd).await.success();

    let report: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["day"], "2024-06-15");
    assert_eq!(report["payingUsers"], 2);
    assert_eq!(report["loginEvents"], 3);
    assert_eq!(report["skippedLines"], 1);
    assert_eq!(report["written"], 2);
    assert_eq!(report["segments"].as_array().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dry_run_writes_nothing() {
    let server = MockServer::start().await;
    let logs = create_login_fixture_dir();
    mount_paying_users(&server, &["u1", "u2", "u3"]).await;

    Mock::given(method("PUT"))
        .and(path_regex("^/active-paying-users/_doc/.*"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let mut cmd = cmd_with_env(&server.uri(), logs.path());
    cmd.args(["--day", "2024-06-15", "--dry-run"]);
    run_blocking(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("ios_organic"))
        .stdout(predicate::str::contains("google_store"))
        .stdout(predicate::str::contains("Dry run"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_day_without_logs_succeeds_without_writes() {
    let server = MockServer::start().await;
    let logs = create_login_fixture_dir();
    mount_paying_users(&server, &["u1"]).await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let mut cmd = cmd_with_env(&server.uri(), logs.path());
    cmd.args(["--day", "2024-06-16"]);
    run_blocking(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("No active paying users for 2024-06-16"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_write_still_attempts_other_segments() {
    let server = MockServer::start().await;
    let logs = create_login_fixture_dir();
    mount_paying_users(&server, &["u1", "u2"]).await;

    Mock::given(method("PUT"))
        .and(path("/active-paying-users/_doc/android_google_store"))
        .respond_with(ResponseTemplate::new(400).set_body_string("mapper_parsing_exception"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/active-paying-users/_doc/ios_organic"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = cmd_with_env(&server.uri(), logs.path());
    cmd.args(["--day", "2024-06-15"]);
    run_blocking(cmd)
        .await
        .failure()
        .stderr(predicate::str::contains("1 of 2 segment writes failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rerun_for_same_day_targets_same_documents() {
    let server = MockServer::start().await;
    let logs = create_login_fixture_dir();
    mount_paying_users(&server, &["u1", "u2"]).await;

    Mock::given(method("PUT"))
        .and(path_regex("^/active-paying-users/_doc/(ios_organic|android_google_store)$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(4)
        .mount(&server)
        .await;

    for _ in 0..2 {
        let mut cmd = cmd_with_env(&server.uri(), logs.path());
        cmd.args(["--day", "2024-06-15"]);
        run_blocking(cmd).await.success();
    }
}
