//! Command-line tests for the `demoflow` binary

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use super::common::fixtures::SINGLE_STEP_JSON;

/// Data directory, fast config and a script file in one temporary directory
struct CliEnv {
    dir: TempDir,
}

impl CliEnv {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(
            dir.path().join("config.toml"),
            "[rehearsal]\nload_delay_ms = 5\nload_jitter_ms = 10\n\n[agent]\nretry_delay_ms = 20\n",
        )
        .unwrap();
        fs::write(dir.path().join("script.json"), SINGLE_STEP_JSON).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn data_dir(&self) -> PathBuf {
        self.path("data")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("demoflow").unwrap();
        cmd.arg("--data-dir")
            .arg(self.data_dir())
            .arg("--config")
            .arg(self.path("config.toml"));
        cmd
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, contents).unwrap();
        path
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_validate_accepts_script() {
    let env = CliEnv::new();

    env.cmd()
        .args(["validate", arg(&env.path("script.json"))])
        .assert()
        .success()
        .stdout(predicate::str::contains("Valid: 1 step(s), 1 persona(s)"));
}

#[test]
fn test_validate_rejects_unknown_persona() {
    let env = CliEnv::new();
    let script = env.write(
        "bad.json",
        r#"{"personas": {}, "steps": [{"title": "Ghost", "urls": ["https://a.example"], "persona": "nobody"}]}"#,
    );

    env.cmd()
        .args(["validate", arg(&script)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown persona 'nobody'"));
}

#[test]
fn test_validate_rejects_too_many_canned_texts() {
    let env = CliEnv::new();
    let texts: Vec<String> = (0..10).map(|i| format!("\"line {i}\"")).collect();
    let script = env.write(
        "chatty.json",
        &format!(
            r#"{{"personas": {{"john": {{"name": "John Doe", "fakeText": [{}]}}}}, "steps": []}}"#,
            texts.join(",")
        ),
    );

    env.cmd()
        .args(["validate", arg(&script)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("10 canned texts"));
}

#[test]
fn test_play_without_script_fails() {
    let env = CliEnv::new();

    env.cmd()
        .arg("play")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No script to play"));
}

#[test]
fn test_play_file_shows_persona() {
    let env = CliEnv::new();

    env.cmd()
        .args(["play", arg(&env.path("script.json"))])
        .assert()
        .success()
        .stdout(predicate::str::contains("pages created:    4"))
        .stdout(predicate::str::contains("John Doe"));
}

#[test]
fn test_import_play_status_clear() {
    let env = CliEnv::new();

    env.cmd()
        .args([
            "import",
            arg(&env.path("script.json")),
            "--save-as",
            "cfo-review",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved template 'cfo-review'"))
        .stdout(predicate::str::contains("Imported 'Ledger' for Acme (1 step(s))"));

    env.cmd()
        .arg("templates")
        .assert()
        .success()
        .stdout(predicate::str::contains("cfo-review"));

    env.cmd()
        .arg("play")
        .assert()
        .success()
        .stdout(predicate::str::contains("John Doe"));

    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"created_page_ids\""))
        .stdout(predicate::str::contains("John Doe"));

    // The pages lived in the previous process: every removal finds them gone
    env.cmd()
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 4 page(s)"));

    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("John Doe").not());
}

#[test]
fn test_log_file_is_written_under_data_dir() {
    let env = CliEnv::new();

    env.cmd()
        .args(["validate", arg(&env.path("script.json"))])
        .assert()
        .success();

    assert!(env.data_dir().join("logs").join("demoflow.log").exists());
}
