use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn escape_ngg_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_escape-ngg"))
}

fn run_cli(config_path: &Path, args: &[&str]) -> (String, String, Option<i32>) {
    let binary = escape_ngg_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("DATABASE_URL")
        .env_remove("WP_APP_PASSWORD")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run escape-ngg binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code())
}

fn write_config(content: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("escape-ngg.toml");
    fs::write(&path, content).unwrap();
    (tmp, path)
}

#[test]
fn test_bad_date_exits_with_one() {
    let (stdout, stderr, code) = run_cli(
        Path::new("/nonexistent/escape-ngg.toml"),
        &["run", "--start_date", "yesterday"],
    );
    assert_eq!(code, Some(1), "stdout={} stderr={}", stdout, stderr);
    assert!(stderr.contains("--start_date"));
    assert!(!stdout.contains("Running for our lives"));
}

#[test]
fn test_every_bad_option_is_reported() {
    let (_, stderr, code) = run_cli(
        Path::new("/nonexistent/escape-ngg.toml"),
        &[
            "run",
            "--end_date",
            "2011-13-01",
            "--post__in",
            "1,x",
            "--post_type",
            "product",
        ],
    );
    assert_eq!(code, Some(1));
    assert!(stderr.contains("--end_date"));
    assert!(stderr.contains("--post__in"));
    assert!(stderr.contains("--post_type"));
}

#[test]
fn test_missing_config_fails_after_validation() {
    let (_, stderr, code) = run_cli(
        Path::new("/nonexistent/escape-ngg.toml"),
        &["run", "--post__in", "4,5"],
    );
    assert_ne!(code, Some(0));
    assert!(!stderr.contains("--post__in"));
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config_path) = write_config(
        r#"
[site]
image_base_url = "https://example.com/"

[migration]
batch_size = 0
"#,
    );
    let (_, stderr, code) = run_cli(&config_path, &["run"]);
    assert_ne!(code, Some(0));
    assert!(stderr.contains("batch_size"));
}

#[test]
fn test_missing_database_url_reported() {
    let (_tmp, config_path) = write_config(
        r#"
[site]
image_base_url = "https://example.com/"
"#,
    );
    let (_, stderr, code) = run_cli(&config_path, &["status"]);
    assert_ne!(code, Some(0));
    assert!(stderr.contains("DATABASE_URL"));
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(escape_ngg_binary())
        .arg("--help")
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("run"));
    assert!(stdout.contains("status"));
}
