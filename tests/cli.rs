//! CLI-level tests for the requeue binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn requeue(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("requeue").unwrap();
    cmd.env("HOME", home.path());
    cmd
}

#[test]
fn help_describes_the_tool() {
    let home = TempDir::new().unwrap();
    requeue(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("offline replay queue"));
}

#[test]
fn completions_generate_for_bash() {
    let home = TempDir::new().unwrap();
    requeue(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("requeue"));
}

#[test]
fn list_without_worker_fails_loudly() {
    let home = TempDir::new().unwrap();
    requeue(&home)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn worker_status_without_worker_reports_not_running() {
    let home = TempDir::new().unwrap();
    requeue(&home)
        .args(["worker", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn send_rejects_invalid_json_body() {
    let home = TempDir::new().unwrap();
    requeue(&home)
        .args(["send", "post", "/api/todos", "--body", "not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid JSON body"));
}

#[test]
fn unknown_method_is_rejected() {
    let home = TempDir::new().unwrap();
    requeue(&home)
        .args(["add", "teleport", "/api/todos"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown HTTP method"));
}
