use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docq_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docq"))
}

fn write_config(root: &Path, embedding_provider: &str, extra: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/vectors.sqlite"

[index]
collection = "quickstart"

[embedding]
provider = "{embedding_provider}"
dims = 64
batch_size = 2

[retrieval]
top_k = 2

[upload]
upload_dir = "{root}/uploads"
data_dir = "{root}/files"

[[sources]]
type = "txt"
path = "{root}/files/notes.txt"

[[sources]]
type = "csv"
path = "{root}/files/faq.csv"
text_column = "answer"
metadata_columns = ["topic"]
{extra}"#,
        root = root.display(),
        embedding_provider = embedding_provider,
        extra = extra,
    );

    let config_path = config_dir.join("docq.toml");
    fs::write(&config_path, config_content).unwrap();
    config_path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::create_dir_all(root.join("uploads")).unwrap();
    fs::write(
        files_dir.join("notes.txt"),
        "Deployment runs through the staging cluster before production.",
    )
    .unwrap();
    fs::write(
        files_dir.join("faq.csv"),
        "topic,answer\nbilling,Invoices are sent monthly\nsupport,Tickets are answered within a day\n",
    )
    .unwrap();

    let config_path = write_config(&root, "hash", "");
    (tmp, config_path)
}

fn run_docq(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docq_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docq binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docq(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("collection: quickstart"));
    assert!(stdout.contains("entries: 0"));
    assert!(tmp.path().join("data/vectors.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_docq(&config_path, &["init"]);
    assert!(success1, "First init failed");
    let (_, _, success2) = run_docq(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_init_refuses_disabled_embeddings() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path(), "disabled", "");

    let (_, stderr, success) = run_docq(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
}

#[test]
fn test_ingest_with_disabled_embeddings_leaves_store_usable() {
    let (tmp, config_path) = setup_test_env();
    write_config(tmp.path(), "disabled", "");

    let (_, stderr, success) = run_docq(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("configure an embedding provider"), "stderr: {}", stderr);

    write_config(tmp.path(), "hash", "");
    let (stdout, stderr, success) = run_docq(&config_path, &["ingest"]);
    assert!(success, "ingest after fixing config failed: {}", stderr);
    assert!(stdout.contains("collection entries: 3"));
}

#[test]
fn test_sources() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_docq(&config_path, &["sources"]);
    assert!(success);
    assert!(stdout.contains("txt"));
    assert!(stdout.contains("csv"));
    assert!(stdout.contains("OK"));
}

#[test]
fn test_sources_unknown_type_fails() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(
        tmp.path(),
        "hash",
        "\n[[sources]]\ntype = \"xml\"\npath = \"feed.xml\"\n",
    );

    let (stdout, stderr, success) = run_docq(&config_path, &["sources"]);
    assert!(!success);
    assert!(stdout.contains("UNSUPPORTED TYPE"));
    assert!(stderr.contains("unsupported data source type"));
}

#[test]
fn test_ingest_dry_run() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docq(&config_path, &["ingest", "--dry-run"]);
    assert!(success, "dry run failed: {}", stderr);
    assert!(stdout.contains("documents: 3"));
    assert!(!tmp.path().join("data/vectors.sqlite").exists());
}

#[test]
fn test_ingest_appends() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout1, stderr1, success1) = run_docq(&config_path, &["ingest"]);
    assert!(success1, "ingest failed: {}", stderr1);
    assert!(stdout1.contains("documents written: 3"));
    assert!(stdout1.contains("collection entries: 3"));

    // A second run appends; nothing is deduplicated.
    let (stdout2, _, _) = run_docq(&config_path, &["ingest"]);
    assert!(stdout2.contains("collection entries: 6"));

    let (stdout3, _, _) = run_docq(&config_path, &["ingest", "--reset"]);
    assert!(stdout3.contains("collection entries: 3"));
}

#[test]
fn test_ingest_missing_file_aborts() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_file(tmp.path().join("files/faq.csv")).unwrap();

    let (stdout, stderr, success) = run_docq(&config_path, &["ingest"]);
    assert!(!success);
    assert!(!stdout.contains("ok"));
    assert!(stderr.contains("source #1"), "stderr: {}", stderr);
}

#[test]
fn test_ingest_sources_file_override() {
    let (tmp, config_path) = setup_test_env();
    let records = tmp.path().join("files/records.json");
    fs::write(
        &records,
        r#"[{"content": "first record", "metadata": {"team": "ops"}}]"#,
    )
    .unwrap();
    let sources_file = tmp.path().join("config/sources.json");
    fs::write(
        &sources_file,
        format!(
            r#"{{"data_sources": [{{"type": "json", "path": "{}"}}]}}"#,
            records.display()
        ),
    )
    .unwrap();

    let (stdout, stderr, success) = run_docq(
        &config_path,
        &[
            "ingest",
            "--sources-file",
            sources_file.to_str().unwrap(),
            "--collection",
            "records",
        ],
    );
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("ingest records"));
    assert!(stdout.contains("documents written: 1"));
}

#[test]
fn test_query_empty_index_errors() {
    let (_tmp, config_path) = setup_test_env();
    run_docq(&config_path, &["init"]);

    let (_, stderr, success) = run_docq(&config_path, &["query", "staging"]);
    assert!(!success);
    assert!(stderr.contains("has no entries"), "stderr: {}", stderr);
}

#[test]
fn test_query_errors_when_completion_disabled() {
    let (_tmp, config_path) = setup_test_env();
    run_docq(&config_path, &["ingest"]);

    let (_, stderr, success) = run_docq(&config_path, &["query", "staging"]);
    assert!(!success);
    assert!(stderr.contains("completion"), "stderr: {}", stderr);
}

#[test]
fn test_admit_moves_valid_uploads() {
    let (tmp, config_path) = setup_test_env();
    let uploads = tmp.path().join("uploads");
    fs::write(uploads.join("handbook.txt"), "Welcome aboard.").unwrap();
    fs::write(uploads.join("installer.exe"), "MZ").unwrap();

    let (stdout, stderr, success) = run_docq(&config_path, &["admit"]);
    assert!(success, "admit failed: {}", stderr);
    assert!(stdout.contains("accepted: 1"));
    assert!(stdout.contains("rejected: 1"));
    assert!(tmp.path().join("files/handbook.txt").exists());
    assert!(uploads.join("installer.exe").exists());
}

#[test]
fn test_missing_config_errors() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_docq(&tmp.path().join("absent.toml"), &["sources"]);
    assert!(!success);
    assert!(stderr.contains("failed to read config file"));
}
