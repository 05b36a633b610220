use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn stream_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(include_str!("fixtures/hello_stream.sse")),
        )
        .mount(&server)
        .await;
    server
}

/// Runs `tran translate` off the async runtime so the mock server keeps serving.
async fn translate(home: &Path, base_url: String, args: &[&str]) -> assert_cmd::assert::Assert {
    let home = home.to_path_buf();
    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
    tokio::task::spawn_blocking(move || {
        cargo_bin_cmd!("tran")
            .env("TRAN_HOME", &home)
            .env("TRAN_API_KEY", "sk-test")
            .env("TRAN_BASE_URL", base_url)
            .env_remove("TRAN_LOG")
            .arg("translate")
            .args(&args)
            .assert()
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_translate_replaces_selection_in_textarea() {
    let server = stream_server().await;
    let dir = tempdir().unwrap();

    translate(
        dir.path(),
        server.uri(),
        &["--text", "say Bonjour le monde!", "--select", "4..20"],
    )
    .await
    .success()
    .stdout(predicate::str::diff("say Hello world!\n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_translate_reads_stdin_and_replaces_everything() {
    let server = stream_server().await;
    let dir = tempdir().unwrap();
    let home = dir.path().to_path_buf();
    let base_url = server.uri();

    tokio::task::spawn_blocking(move || {
        cargo_bin_cmd!("tran")
            .env("TRAN_HOME", &home)
            .env("TRAN_API_KEY", "sk-test")
            .env("TRAN_BASE_URL", base_url)
            .args(["translate", "--surface", "editable"])
            .write_stdin("Bonjour le monde\n")
            .assert()
            .success()
            .stdout(predicate::str::diff("Hello world\n"));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rich_surface_prints_translation_for_manual_paste() {
    let server = stream_server().await;
    let dir = tempdir().unwrap();

    translate(
        dir.path(),
        server.uri(),
        &["--text", "Bonjour le monde", "--surface", "rich"],
    )
    .await
    .success()
    .stdout(predicate::str::diff("Hello world\n"))
    .stderr(predicate::str::contains("Could not replace the text in place"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_api_key_fails_with_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{\"error\":\"bad key\"}"))
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();

    translate(dir.path(), server.uri(), &["--text", "Bonjour"])
        .await
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("API key is invalid"))
        .stderr(predicate::str::contains("invalid_api_key"));
}

#[test]
fn test_missing_api_key_is_rejected_before_any_request() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("tran")
        .env("TRAN_HOME", dir.path())
        .env_remove("TRAN_API_KEY")
        .env("TRAN_BASE_URL", "http://127.0.0.1:9")
        .args(["translate", "--text", "Bonjour"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("API key is not configured"))
        .stderr(predicate::str::contains("TRAN_API_KEY"));
}

#[test]
fn test_blank_text_exits_cleanly() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("tran")
        .env("TRAN_HOME", dir.path())
        .env("TRAN_API_KEY", "sk-test")
        .env("TRAN_BASE_URL", "http://127.0.0.1:9")
        .args(["translate", "--text", "   "])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("nothing to translate"));
}
