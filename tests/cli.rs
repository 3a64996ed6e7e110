use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_init_creates_database() {
    let temp = TempDir::new().unwrap();

    Command::cargo_bin("larder")
        .unwrap()
        .args(["admin", "init", "--non-interactive", "--data-dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Database created"));

    assert!(temp.path().join("larder.db").exists());
}

#[test]
fn test_init_twice_fails() {
    let temp = TempDir::new().unwrap();

    Command::cargo_bin("larder")
        .unwrap()
        .args(["admin", "init", "--non-interactive", "--data-dir"])
        .arg(temp.path())
        .assert()
        .success();

    Command::cargo_bin("larder")
        .unwrap()
        .args(["admin", "init", "--non-interactive", "--data-dir"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn test_serve_requires_init() {
    let temp = TempDir::new().unwrap();

    Command::cargo_bin("larder")
        .unwrap()
        .args(["serve", "--data-dir"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}
