//! Integration tests for the builderhub binary
//!
//! Every command runs with an isolated config file, token file and working
//! directory, and an API URL nothing listens on, so any test that reaches
//! the network fails loudly.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const DEAD_API: &str = "http://127.0.0.1:9";

/// Helper to create a builderhub Command scoped to `dir`
fn builderhub(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("builderhub");
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(dir.path().join("config.toml"))
        .env("BUILDERHUB_API_URL", DEAD_API)
        .env("BUILDERHUB_TOKEN_FILE", dir.path().join("session.json"))
        .env_remove("BUILDERHUB_POLL_INTERVAL_MS")
        .env_remove("BUILDERHUB_LOG_FORMAT")
        .env_remove("RUST_LOG");
    cmd
}

fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help_lists_commands() {
        let dir = temp_dir();
        builderhub(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("projects"))
            .stdout(predicate::str::contains("tasks"))
            .stdout(predicate::str::contains("watch"));
    }

    #[test]
    fn test_version() {
        let dir = temp_dir();
        builderhub(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("builderhub"));
    }

    #[test]
    fn test_unknown_status_is_rejected_by_parser() {
        let dir = temp_dir();
        builderhub(&dir)
            .args(["tasks", "move", "t1", "blocked"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid task status"));
    }
}

// =============================================================================
// Validation happens before any request
// =============================================================================

mod validation {
    use super::*;

    #[test]
    fn test_short_project_name_fails_without_network() {
        let dir = temp_dir();
        builderhub(&dir)
            .args(["projects", "create", "ab"])
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "Project name must be at least 3 characters",
            ))
            .stderr(predicate::str::contains("Network error").not());
    }

    #[test]
    fn test_long_project_description_fails() {
        let dir = temp_dir();
        let description = "x".repeat(501);
        builderhub(&dir)
            .args(["projects", "create", "Website", "--description", &description])
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "Description must be less than 500 characters",
            ));
    }

    #[test]
    fn test_task_create_reports_every_invalid_field() {
        let dir = temp_dir();
        builderhub(&dir)
            .args(["tasks", "create", "--project", "p1", "ab", "too short"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Title must be at least 3 characters"))
            .stderr(predicate::str::contains(
                "Description must be at least 10 characters",
            ));
    }

    #[test]
    fn test_magic_link_login_rejects_bad_email() {
        let dir = temp_dir();
        builderhub(&dir)
            .args(["login", "--magic-link", "--email", "not-an-email"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Please enter a valid email address"));
        assert!(!dir.path().join("session.json").exists());
    }

    #[test]
    fn test_criteria_needs_title_and_description() {
        let dir = temp_dir();
        builderhub(&dir)
            .args(["criteria", "Login", "  "])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Missing information"));
    }

    #[test]
    fn test_watch_rejects_users_collection() {
        let dir = temp_dir();
        builderhub(&dir)
            .args(["watch", "users"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not supported"));
    }
}

// =============================================================================
// Session
// =============================================================================

mod session {
    use super::*;

    #[test]
    fn test_whoami_without_token_makes_no_request() {
        let dir = temp_dir();
        builderhub(&dir)
            .arg("whoami")
            .assert()
            .success()
            .stdout(predicate::str::contains("Not signed in"));
    }

    #[test]
    fn test_logout_removes_token_file() {
        let dir = temp_dir();
        let token_file = dir.path().join("session.json");
        fs::write(&token_file, r#"{"authToken": "abc"}"#).unwrap();

        builderhub(&dir).arg("logout").assert().success();
        assert!(!token_file.exists());
    }

    #[test]
    fn test_logout_without_session_succeeds() {
        let dir = temp_dir();
        builderhub(&dir).arg("logout").assert().success();
    }

    #[test]
    fn test_unreachable_backend_reports_network_error() {
        let dir = temp_dir();
        builderhub(&dir)
            .args(["projects", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Network error"));
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_init_writes_defaults() {
        let dir = temp_dir();
        builderhub(&dir)
            .args(["config", "init"])
            .assert()
            .success();
        let content = fs::read_to_string(dir.path().join("config.toml")).unwrap();
        assert!(content.contains("[api]"));
        assert!(content.contains("poll_interval_ms"));

        builderhub(&dir)
            .args(["config", "init"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_show_reflects_env_and_flag_layers() {
        let dir = temp_dir();
        fs::write(
            dir.path().join("config.toml"),
            "[api]\nbase_url = \"http://from-file:8001\"\n",
        )
        .unwrap();

        builderhub(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains(DEAD_API));

        builderhub(&dir)
            .args(["--api-url", "http://from-flag:9000/", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("http://from-flag:9000\""));
    }

    #[test]
    fn test_config_validate_warns_on_bad_url() {
        let dir = temp_dir();
        builderhub(&dir)
            .args(["--api-url", "ftp://nope", "config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("should start with http://"));
    }

    #[test]
    fn test_invalid_config_file_fails() {
        let dir = temp_dir();
        fs::write(dir.path().join("config.toml"), "[api\n").unwrap();
        builderhub(&dir)
            .arg("whoami")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to load configuration"));
    }
}
