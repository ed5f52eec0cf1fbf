//! CLI integration tests for the cache management and listing flags

use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn zoofetch() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_zoofetch"));
    command.env_remove("ZOOFETCH_CACHE_DIR");
    command
}

#[test]
fn test_list_datasets() {
    let output = zoofetch()
        .arg("--list-datasets")
        .output()
        .expect("Failed to run zoofetch");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("open-images-v7"));
    assert!(stdout.contains("classifications, detections"));
}

#[test]
fn test_show_cache_dir_honors_cache_dir_argument() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    let output = zoofetch()
        .arg("--show-cache-dir")
        .arg("--cache-dir")
        .arg(temp_dir.path())
        .output()
        .expect("Failed to run zoofetch");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let expected = temp_dir.path().join("datasets");
    assert!(stdout.contains(&expected.display().to_string()));
    assert!(stdout.contains("--cache-dir argument"));
}

#[test]
fn test_list_and_clear_cached_datasets() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let split_dir = temp_dir
        .path()
        .join("datasets/open-images-v7/validation");
    fs::create_dir_all(split_dir.join("labels")).unwrap();
    fs::create_dir_all(split_dir.join("data")).unwrap();
    fs::write(split_dir.join("labels/classifications.csv"), "ImageID\n").unwrap();
    fs::write(split_dir.join("data/000a.jpg"), [0xFF, 0xD8]).unwrap();

    let output = zoofetch()
        .arg("--list-cached")
        .arg("--cache-dir")
        .arg(temp_dir.path())
        .output()
        .expect("Failed to run zoofetch");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("open-images-v7"));
    assert!(stdout.contains("Splits: validation"));
    assert!(stdout.contains("Media files: 1"));

    let output = zoofetch()
        .arg("--cache-dir")
        .arg(temp_dir.path())
        .arg("--clear-cache")
        .output()
        .expect("Failed to run zoofetch");
    assert!(output.status.success());
    assert!(!temp_dir.path().join("datasets/open-images-v7").exists());

    let output = zoofetch()
        .arg("--list-cached")
        .arg("--cache-dir")
        .arg(temp_dir.path())
        .output()
        .expect("Failed to run zoofetch");
    assert!(String::from_utf8_lossy(&output.stdout).contains("No cached datasets found."));
}

#[test]
fn test_inconsistent_flags_fail_before_any_download() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    let output = zoofetch()
        .args(["--seed", "42", "--max-samples", "1"])
        .arg("--cache-dir")
        .arg(temp_dir.path())
        .output()
        .expect("Failed to run zoofetch");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--seed has no effect without --shuffle"));
}

#[test]
fn test_invalid_split_is_rejected() {
    let output = zoofetch()
        .args(["--split", "holdout"])
        .output()
        .expect("Failed to run zoofetch");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown split 'holdout'"));
}
