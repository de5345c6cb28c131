//! CLI integration tests.
//!
//! These tests run the pilot binary end-to-end against temporary projects.
//! Home, config and state directories point into a temporary directory so the
//! user's own configuration never leaks in.

use pilot_test_utils::fixtures::{BuiltTestProject, TestProject};
use serde_json::json;
use std::path::Path;
use std::process::{Output, Stdio};
use tempfile::TempDir;
use tokio::process::Command;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY_VARS: &[&str] = &[
    "PILOT_CONFIG_CONTENT",
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "RUST_LOG",
];

async fn pilot(home: &Path, root: &Path, args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_pilot"));
    command
        .arg("--root-folder")
        .arg(root)
        .args(args)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("XDG_STATE_HOME", home.join(".state"))
        .env("XDG_DATA_HOME", home.join(".data"))
        .stdin(Stdio::null());
    for var in KEY_VARS {
        command.env_remove(var);
    }
    command.output().await.expect("Failed to execute pilot")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// A project configured to use one OpenAI-compatible endpoint.
fn project_with_llm(server_uri: &str) -> TestProject {
    let config = json!({
        "project": "demo",
        "llm": {
            "openai": {
                "model": "gpt-4o",
                "api_key": "test-key",
                "base_url": server_uri,
            }
        }
    });
    TestProject::new().with_config(&config.to_string())
}

async fn llm_answering(text: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": text}}]
        })))
        .mount(&server)
        .await;
    server
}

fn app(project: TestProject) -> BuiltTestProject {
    project.with_python_app().build()
}

#[tokio::test]
async fn test_help_command() {
    let home = TempDir::new().unwrap();
    let output = pilot(home.path(), home.path(), &["--help"]).await;

    assert!(output.status.success());
    let text = stdout(&output);
    for command in ["run", "check-llm", "status", "history", "import", "restore"] {
        assert!(text.contains(command), "missing {command} in help");
    }
    assert!(text.contains("--root-folder"));
}

#[tokio::test]
async fn test_import_then_history_and_status() {
    let home = TempDir::new().unwrap();
    let project = app(TestProject::new().with_config(r#"{"project": "demo"}"#));

    let output = pilot(home.path(), project.path(), &["import"]).await;
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("Imported 3 files"), "{text}");
    assert!(text.contains("3 added, 0 modified, 0 deleted"), "{text}");

    let output = pilot(home.path(), project.path(), &["history"]).await;
    assert!(output.status.success());
    let text = stdout(&output);
    assert_eq!(text.lines().filter(|l| l.starts_with("sta_")).count(), 1);

    let output = pilot(home.path(), project.path(), &["status"]).await;
    assert!(stdout(&output).contains("Workspace matches the current state."));

    project.write_file("foo.txt", "bar");
    let output = pilot(home.path(), project.path(), &["status"]).await;
    let text = stdout(&output);
    assert!(text.contains("1 added, 0 modified, 0 deleted"));
    assert!(text.contains("A foo.txt"));
}

#[tokio::test]
async fn test_history_is_kept_in_project_folder() {
    let home = TempDir::new().unwrap();
    let project = app(TestProject::new());

    pilot(home.path(), project.path(), &["import"]).await;

    assert!(project.file_exists(".pilot/storage"));
    let output = pilot(home.path(), project.path(), &["status"]).await;
    assert!(stdout(&output).contains("Workspace matches the current state."));
}

#[tokio::test]
async fn test_restore_undoes_offline_edits() {
    let home = TempDir::new().unwrap();
    let project = app(TestProject::new());
    pilot(home.path(), project.path(), &["import"]).await;

    project.write_file("foo.txt", "bar");
    project.write_file("main.py", "broken");
    project.delete_file("requirements.txt");

    let output = pilot(home.path(), project.path(), &["restore"]).await;
    assert!(output.status.success(), "{}", stderr(&output));

    assert!(!project.file_exists("foo.txt"));
    assert!(project.read_file("main.py").contains("create_app"));
    assert_eq!(project.read_file("requirements.txt"), "flask==3.0.0\n");
}

#[tokio::test]
async fn test_restore_keeps_project_config() {
    let home = TempDir::new().unwrap();
    let project = TestProject::new()
        .with_config(r#"{"project": "demo"}"#)
        .build();

    let output = pilot(home.path(), project.path(), &["restore"]).await;
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(project.file_exists("pilot.json"));

    let output = pilot(home.path(), project.path(), &["status"]).await;
    assert!(stdout(&output).contains("Workspace matches the current state."));
}

#[tokio::test]
async fn test_run_without_answer_keeps_project_config() {
    let home = TempDir::new().unwrap();
    let server = llm_answering("START").await;
    let project = project_with_llm(&server.uri()).build();
    project.write_file("notes.txt", "draft\n");

    // Nothing recorded yet and the question is cancelled, so the workspace
    // is restored to the empty state.
    let output = pilot(home.path(), project.path(), &["run"]).await;
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(!project.file_exists("notes.txt"));
    assert!(project.file_exists("pilot.json"));
}

#[tokio::test]
async fn test_run_imports_with_yes() {
    let home = TempDir::new().unwrap();
    let server = llm_answering("START").await;
    let project = app(project_with_llm(&server.uri()));

    let output = pilot(home.path(), project.path(), &["run", "--yes"]).await;
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Project demo is at state"));

    let output = pilot(home.path(), project.path(), &["history"]).await;
    assert_eq!(
        stdout(&output).lines().filter(|l| l.starts_with("sta_")).count(),
        1
    );
}

#[tokio::test]
async fn test_run_without_answer_restores() {
    let home = TempDir::new().unwrap();
    let server = llm_answering("START").await;
    let project = app(project_with_llm(&server.uri()));
    pilot(home.path(), project.path(), &["import"]).await;

    project.write_file("foo.txt", "bar");

    // stdin is closed, so the question is cancelled.
    let output = pilot(home.path(), project.path(), &["run"]).await;
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(!project.file_exists("foo.txt"));
}

#[tokio::test]
async fn test_run_fails_when_llm_unreachable() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;
    let project = app(project_with_llm(&server.uri()));
    project.write_file("foo.txt", "bar");

    let output = pilot(home.path(), project.path(), &["run", "--yes"]).await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("LLM access check failed"));
    assert!(project.file_exists("foo.txt"));
    let output = pilot(home.path(), project.path(), &["history"]).await;
    assert!(stdout(&output).contains("No states recorded"));
}

#[tokio::test]
async fn test_check_llm_empty_answer_fails() {
    let home = TempDir::new().unwrap();
    let server = llm_answering("").await;
    let project = project_with_llm(&server.uri()).build();

    let output = pilot(home.path(), project.path(), &["check-llm"]).await;

    assert!(!output.status.success());
    assert!(stdout(&output).contains("failed"));
}

#[tokio::test]
async fn test_check_llm_ok_and_api_key_override() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(wiremock::matchers::header("authorization", "Bearer from-cli"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "START"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let project = project_with_llm(&server.uri()).build();

    let output = pilot(
        home.path(),
        project.path(),
        &["--api-key", "from-cli", "check-llm"],
    )
    .await;

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("LLM access OK."));
}

#[tokio::test]
async fn test_check_llm_without_providers() {
    let home = TempDir::new().unwrap();
    let project = TestProject::new().with_config(r#"{"llm": {}}"#).build();

    let output = pilot(home.path(), project.path(), &["check-llm"]).await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("No LLM provider configured"));
}

#[tokio::test]
async fn test_invalid_config_is_reported() {
    let home = TempDir::new().unwrap();
    let project = TestProject::new().with_config("{ not json").build();

    let output = pilot(home.path(), project.path(), &["status"]).await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("configuration"));
}
