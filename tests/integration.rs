use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn wq_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("wq");
    path
}

/// A config whose providers are disabled so no model is downloaded and no
/// network is touched.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("rates.txt"),
        "Mortgage rates climbed again this week.\n\nThe 30-year average reached 6.8 percent.",
    )
    .unwrap();

    let config_content = format!(
        r#"[store]
dir = "{}/store"
collection = "test"

[chunking]
chunk_size = 200
chunk_overlap = 40

[embedding]
provider = "disabled"

[llm]
provider = "disabled"
"#,
        root.display()
    );

    let config_path = config_dir.join("wq.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_wq(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = wq_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run wq binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(wq_binary()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["ingest", "ask", "status", "reset"] {
        assert!(stdout.contains(command), "missing {} in help: {}", command, stdout);
    }
}

#[test]
fn test_status_on_fresh_store() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_wq(&config_path, &["status"]);
    assert!(success, "status failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("collection: test"));
    assert!(stdout.contains("entries:    0"));
    assert!(tmp.path().join("store/vectorstore.sqlite").exists());
}

#[test]
fn test_ask_before_ingest() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_wq(&config_path, &["ask", "What is the interest rate?"]);
    assert!(!success);
    assert!(
        stderr.contains("run `wq ingest` first"),
        "unexpected stderr: {}",
        stderr
    );
}

#[test]
fn test_ask_blank_question() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_wq(&config_path, &["ask", "   "]);
    assert!(!success);
    assert!(stderr.contains("Please enter a question"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();

    let (_, stderr, success) = run_wq(&config_path, &["status"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr: {}", stderr);
}

#[test]
fn test_too_many_urls() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_wq(
        &config_path,
        &[
            "ingest",
            "urls",
            "http://127.0.0.1:9/a",
            "http://127.0.0.1:9/b",
            "http://127.0.0.1:9/c",
            "http://127.0.0.1:9/d",
        ],
    );
    assert!(!success);
    assert!(stderr.contains("At most 3 URLs"), "stderr: {}", stderr);
}

#[test]
fn test_ingest_reports_progress_and_failure() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("files/rates.txt");

    let (_, stderr, success) = run_wq(
        &config_path,
        &["--progress", "json", "ingest", "text", file.to_str().unwrap()],
    );
    assert!(!success, "ingestion without an embedder must fail");
    assert!(stderr.contains(r#""label":"Initializing components""#), "stderr: {}", stderr);
    assert!(stderr.contains(r#""phase":"indexing""#), "stderr: {}", stderr);
    assert!(stderr.contains("Embedding provider is disabled"), "stderr: {}", stderr);

    let (stdout, _, _) = run_wq(&config_path, &["status"]);
    assert!(stdout.contains("entries:    0"));
}

#[test]
fn test_missing_pdf_file() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("nope.pdf");

    let (_, stderr, success) = run_wq(&config_path, &["ingest", "pdf", missing.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Failed to read"), "stderr: {}", stderr);
}

#[test]
fn test_reset_empty_collection() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_wq(&config_path, &["reset"]);
    assert!(success, "reset failed: {}", stderr);
    assert!(stdout.contains("Reset collection 'test' (0 entries removed)"));
}
