//! Integration tests for the draftflow CLI.
//!
//! These tests cover argument handling and the failures that happen before
//! any host request is made.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to get draftflow command.
fn draftflow() -> Command {
    Command::new(env!("CARGO_BIN_EXE_draftflow"))
}

/// Helper to write a config file into a temp directory.
fn write_config(contents: &str) -> (TempDir, std::path::PathBuf) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let path = temp.path().join("draftflow.toml");
    fs::write(&path, contents).expect("Failed to write config");
    (temp, path)
}

// ============================================================================
// Basic CLI tests
// ============================================================================

#[test]
fn test_version_flag() {
    draftflow()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("draftflow"));
}

#[test]
fn test_help_flag() {
    draftflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("editorial workflow"))
        .stdout(predicate::str::contains("save"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("set-status"))
        .stdout(predicate::str::contains("publish"))
        .stdout(predicate::str::contains("discard"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn test_no_subcommand_shows_help() {
    draftflow()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

// ============================================================================
// Argument validation
// ============================================================================

#[test]
fn test_invalid_key_rejected() {
    draftflow()
        .args(["status", "posts/first"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid content key 'posts/first'"));
}

#[test]
fn test_save_requires_content() {
    draftflow()
        .args(["save", "first-post", "--entry", "posts/first.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--from"));
}

#[test]
fn test_save_content_and_from_conflict() {
    draftflow()
        .args([
            "save",
            "first-post",
            "--entry",
            "posts/first.md",
            "--content",
            "hello",
            "--from",
            "post.md",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_save_malformed_attachment() {
    draftflow()
        .args([
            "save",
            "first-post",
            "--entry",
            "posts/first.md",
            "--content",
            "hello",
            "--attach",
            "images/cover.png",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected REPO_PATH=LOCAL_PATH"));
}

#[test]
fn test_save_direct_conflicts_with_status() {
    draftflow()
        .args([
            "save",
            "first-post",
            "--entry",
            "posts/first.md",
            "--content",
            "hello",
            "--direct",
            "--status",
            "draft",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_save_help_describes_title() {
    draftflow()
        .args(["save", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("recorded in the draft's metadata"))
        .stdout(predicate::str::contains("--direct"));
}

#[test]
fn test_set_status_unknown_status() {
    draftflow()
        .args(["set-status", "first-post", "archived"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown status 'archived'"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_missing_repository_config() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("draftflow.toml");

    draftflow()
        .arg("--config")
        .arg(&config)
        .args(["status", "first-post"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Repository not configured"));
}

#[test]
fn test_config_without_repo() {
    let (_temp, config) = write_config("[host]\nowner = \"acme\"\n");

    draftflow()
        .arg("--config")
        .arg(&config)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Repository not configured"));
}

#[test]
fn test_malformed_config() {
    let (_temp, config) = write_config("[workflow\nbase_branch = ");

    draftflow()
        .arg("--config")
        .arg(&config)
        .args(["discard", "first-post"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_unknown_status_in_config() {
    let (_temp, config) = write_config(
        "[workflow]\ninitial_status = \"archived\"\n\n[host]\nowner = \"acme\"\nrepo = \"site\"\n",
    );

    draftflow()
        .arg("--config")
        .arg(&config)
        .args(["publish", "first-post"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_published_initial_status_in_config() {
    let (_temp, config) = write_config(
        "[workflow]\ninitial_status = \"published\"\n\n[host]\nowner = \"acme\"\nrepo = \"site\"\n",
    );

    draftflow()
        .arg("--config")
        .arg(&config)
        .args(["save", "first-post", "--entry", "posts/first.md", "--content", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("initial_status cannot be published"));
}

#[test]
fn test_delete_requires_repository_config() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("draftflow.toml");

    draftflow()
        .arg("--config")
        .arg(&config)
        .args(["delete", "posts/old.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Repository not configured"));
}

// ============================================================================
// Init
// ============================================================================

#[test]
fn test_init_writes_config() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("draftflow.toml");

    draftflow()
        .arg("--config")
        .arg(&config)
        .args(["init", "--owner", "acme", "--repo", "site", "--base-branch", "production"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let written = fs::read_to_string(&config).unwrap();
    assert!(written.contains("owner = \"acme\""));
    assert!(written.contains("repo = \"site\""));
    assert!(written.contains("base_branch = \"production\""));
}

#[test]
fn test_init_keeps_existing_config() {
    let (_temp, config) = write_config("[host]\nowner = \"old\"\nrepo = \"blog\"\n");

    draftflow()
        .arg("--config")
        .arg(&config)
        .args(["init", "--owner", "acme", "--repo", "site"])
        .assert()
        .success()
        .stderr(predicate::str::contains("--force"));

    let written = fs::read_to_string(&config).unwrap();
    assert!(written.contains("owner = \"old\""));
}
