use std::process::Command;

use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn conjoint() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_conjoint"));
    cmd.env_remove("CONJOINT_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn profiles_command_writes_108_rows() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("profiles.csv");

    let status = conjoint().arg("profiles").arg("--out").arg(&out).status().unwrap();
    assert!(status.success());

    let raw = std::fs::read_to_string(&out).unwrap();
    let mut lines = raw.lines();
    assert_eq!(lines.next(), Some("ID,Brand,Price,Size,RAM,Storage"));
    assert_eq!(raw.lines().count(), 109);
}

#[test]
fn pairs_command_is_seeded() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.csv");
    let b = dir.path().join("b.csv");

    for out in [&a, &b] {
        let status = conjoint()
            .args(["pairs", "--sample-size", "7", "--seed", "42"])
            .arg("--out")
            .arg(out)
            .status()
            .unwrap();
        assert!(status.success());
    }

    let first = std::fs::read_to_string(&a).unwrap();
    assert_eq!(first, std::fs::read_to_string(&b).unwrap());

    let mut reader = csv::Reader::from_reader(first.as_bytes());
    assert_eq!(
        reader.headers().unwrap().iter().collect::<Vec<_>>(),
        vec!["Product1_ID", "Product2_ID", "Prompt"]
    );
    assert_eq!(reader.records().count(), 7);
}

#[test]
fn run_without_credential_fails_before_any_call() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("results.csv");

    let output = conjoint()
        .args(["run", "--base-url", "http://127.0.0.1:9", "--pause-seconds", "0"])
        .arg("--out")
        .arg(&out)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("MissingApiKey"), "stderr: {stderr}");
    assert!(!out.exists());
}

#[test]
fn run_with_schemeless_base_url_fails_before_any_call() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("results.csv");

    let output = conjoint()
        .env("CONJOINT_API_KEY", "sk-test")
        .args(["run", "--base-url", "api.openai.com/v1", "--pause-seconds", "0"])
        .arg("--out")
        .arg(&out)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid"), "stderr: {stderr}");
    assert!(stderr.contains("api.openai.com/v1"), "stderr: {stderr}");
    assert!(!stderr.contains("Recorded response"), "stderr: {stderr}");
    assert!(!out.exists());
}

#[tokio::test]
async fn run_writes_results_against_mock_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "2" } }]
        })))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let out = dir.path().join("results.csv");
    let report = dir.path().join("report.json");
    let uri = server.uri();

    let output = tokio::task::spawn_blocking({
        let out = out.clone();
        let report = report.clone();
        move || {
            conjoint()
                .env("CONJOINT_API_KEY", "sk-test")
                .args(["run", "--pause-seconds", "0", "--sample-size", "6"])
                .args(["--submit-count", "3", "--seed", "7"])
                .arg("--base-url")
                .arg(&uri)
                .arg("--out")
                .arg(&out)
                .arg("--report")
                .arg(&report)
                .output()
                .unwrap()
        }
    })
    .await
    .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["option2"], 3);

    let raw = std::fs::read_to_string(&out).unwrap();
    let mut reader = csv::Reader::from_reader(raw.as_bytes());
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| &r[3] == "2"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(report["stop_reason"]["reason"], "completed");
}
