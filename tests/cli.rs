//! End-to-end tests driving the compiled `unidesk` binary.
//!
//! Covers database initialization, training, degraded-mode answering, the
//! piped REPL, and the full train/ask/stats/docs flow against a mocked
//! embedding backend.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use httpmock::prelude::*;
use tempfile::TempDir;

fn unidesk_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("unidesk");
    path
}

/// Temp workspace with a config pointing at temp databases. Embeddings stay
/// disabled unless the test appends its own `[embedding]` section.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("data")).unwrap();
    fs::create_dir_all(root.join("files")).unwrap();

    let config_content = format!(
        r#"[storage]
index_path = "{root}/data/index.db"
activity_log_path = "{root}/data/activity.db"
"#,
        root = root.display()
    );

    let config_path = root.join("unidesk.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_unidesk(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = unidesk_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run unidesk binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn run_unidesk_with_stdin(config_path: &Path, args: &[&str], input: &str) -> (String, bool) {
    let binary = unidesk_binary();
    let mut child = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("Failed to spawn unidesk binary at {:?}: {}", binary, e));

    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    (stdout, output.status.success())
}

#[test]
fn test_init_creates_databases() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_unidesk(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/index.db").exists());
    assert!(tmp.path().join("data/activity.db").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_unidesk(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_unidesk(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ask_answers_without_any_index() {
    let (_tmp, config_path) = setup_test_env();

    run_unidesk(&config_path, &["init"]);
    let (stdout, stderr, success) =
        run_unidesk(&config_path, &["ask", "Qual o horário de atendimento?"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(
        stdout.contains("segunda a sexta") && stdout.contains("08:00"),
        "expected the schedule reply, got: {}",
        stdout
    );
}

#[test]
fn test_ask_blank_question_prompts_for_input() {
    let (_tmp, config_path) = setup_test_env();

    run_unidesk(&config_path, &["init"]);
    let (stdout, _, success) = run_unidesk(&config_path, &["ask", "   "]);
    assert!(success, "blank question must not fail the process");
    assert!(
        stdout.contains("digite uma pergunta"),
        "expected the blank-question prompt, got: {}",
        stdout
    );
}

#[test]
fn test_train_fails_when_embeddings_disabled() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("files/guia.txt");
    fs::write(&file, "Conteúdo do guia acadêmico.").unwrap();

    run_unidesk(&config_path, &["init"]);
    let (stdout, _, success) = run_unidesk(&config_path, &["train", file.to_str().unwrap()]);
    assert!(success, "train reports per-file outcomes, never aborts");
    assert!(stdout.contains("FAILED"), "got: {}", stdout);
    assert!(stdout.contains("Trained 0/1 files."), "got: {}", stdout);
}

#[test]
fn test_train_rejects_unsupported_extension() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("files/planilha.xlsx");
    fs::write(&file, "dados").unwrap();

    run_unidesk(&config_path, &["init"]);
    let (stdout, _, success) = run_unidesk(&config_path, &["train", file.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("FAILED"), "got: {}", stdout);
}

#[test]
fn test_stats_on_fresh_database() {
    let (_tmp, config_path) = setup_test_env();

    run_unidesk(&config_path, &["init"]);
    let (stdout, _, success) = run_unidesk(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("degraded"), "got: {}", stdout);
    assert!(stdout.contains("documents:  0"), "got: {}", stdout);
    assert!(stdout.contains("answered questions:  0"), "got: {}", stdout);
}

#[test]
fn test_docs_empty_message() {
    let (_tmp, config_path) = setup_test_env();

    run_unidesk(&config_path, &["init"]);
    let (stdout, _, success) = run_unidesk(&config_path, &["docs"]);
    assert!(success);
    assert!(stdout.contains("No documents trained yet."));
}

#[test]
fn test_completions_generate_without_config() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_unidesk(&config_path, &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("unidesk"), "got: {}", stdout);
}

#[test]
fn test_repl_answers_piped_questions() {
    let (_tmp, config_path) = setup_test_env();

    run_unidesk(&config_path, &["init"]);
    let input = "Qual o horário de atendimento?\nsair\n";
    let (stdout, success) = run_unidesk_with_stdin(&config_path, &["repl"], input);
    assert!(success, "piped repl session failed: {}", stdout);
    assert!(
        stdout.contains("segunda a sexta"),
        "expected an answer in the piped session, got: {}",
        stdout
    );
    // Piped input gets no interactive prompt.
    assert!(!stdout.contains("interactive session"), "got: {}", stdout);
}

#[test]
fn test_train_ask_stats_docs_end_to_end() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/tags");
        then.status(200).json_body(serde_json::json!({"models": []}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/embeddings");
        then.status(200)
            .json_body(serde_json::json!({"embedding": [0.1, 0.2, 0.3, 0.4]}));
    });

    let (tmp, config_path) = setup_test_env();
    let config_content = format!(
        r#"[storage]
index_path = "{root}/data/index.db"
activity_log_path = "{root}/data/activity.db"

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 4
base_url = "{url}"
max_retries = 0
"#,
        root = tmp.path().display(),
        url = server.url("")
    );
    fs::write(&config_path, config_content).unwrap();

    let file = tmp.path().join("files/horarios.txt");
    fs::write(
        &file,
        "Horário de atendimento da secretaria acadêmica:\n\
         Segunda a sexta das 08:00 às 21:00\n\
         Sábado das 08:00 às 12:00\n",
    )
    .unwrap();

    run_unidesk(&config_path, &["init"]);

    let (stdout, stderr, success) = run_unidesk(&config_path, &["train", file.to_str().unwrap()]);
    assert!(success, "train failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("ok"), "got: {}", stdout);
    assert!(stdout.contains("Trained 1/1 files."), "got: {}", stdout);

    // Retraining unchanged content must not duplicate the document.
    let (stdout, _, _) = run_unidesk(&config_path, &["train", file.to_str().unwrap()]);
    assert!(stdout.contains("Trained 1/1 files."), "got: {}", stdout);

    let (stdout, _, success) =
        run_unidesk(&config_path, &["ask", "Qual o horário de atendimento?"]);
    assert!(success);
    assert!(stdout.contains("08:00"), "got: {}", stdout);
    assert!(stdout.contains("horarios.txt"), "answers cite sources, got: {}", stdout);

    let (stdout, _, success) = run_unidesk(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("ready"), "got: {}", stdout);
    assert!(stdout.contains("nomic-embed-text"), "got: {}", stdout);
    assert!(stdout.contains("documents:  1"), "got: {}", stdout);
    assert!(stdout.contains("answered questions:  1"), "got: {}", stdout);
    assert!(stdout.contains("trained uploads:     2"), "got: {}", stdout);

    let (stdout, _, success) = run_unidesk(&config_path, &["docs"]);
    assert!(success);
    assert!(stdout.contains("horarios.txt"), "got: {}", stdout);
    assert!(stdout.contains("chunks"), "got: {}", stdout);
}
