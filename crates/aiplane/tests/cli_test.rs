#![allow(deprecated)] // TODO: migrate Command::cargo_bin to the cargo_bin_cmd! macro

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

/// Command with a hermetic configuration: no keys from the host.
fn aiplane(config_dir: &Path) -> Command {
    let config = config_dir.join("aiplane.yaml");
    if !config.exists() {
        std::fs::write(&config, "base_url: http://127.0.0.1:9/v1\n").unwrap();
    }
    let mut cmd = Command::cargo_bin("aiplane").unwrap();
    cmd.env("AIPLANE_CONFIG_PATH", &config)
        .env_remove("OPENAI_API_KEY")
        .env_remove("OPENAI_ADMIN_KEY")
        .env_remove("OPENAI_BASE_URL")
        .env_remove("AIPLANE_KEY")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_cli_help() {
    let dir = tempfile::tempdir().unwrap();
    aiplane(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("resources"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"));
}

#[test]
fn test_cli_version() {
    let dir = tempfile::tempdir().unwrap();
    aiplane(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("aiplane"));
}

#[test]
fn test_resources_lists_catalog() {
    let dir = tempfile::tempdir().unwrap();
    aiplane(dir.path())
        .arg("resources")
        .assert()
        .success()
        .stdout(predicate::str::contains("project_api_key"))
        .stdout(predicate::str::contains("fine_tuning_job"))
        .stdout(predicate::str::contains("project_id:id"));
}

#[test]
fn test_plan_without_state_creates_everything() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("manifest.yaml");
    std::fs::write(
        &manifest,
        r#"
- type: project
  name: ml
  attributes:
    name: ML Platform
- type: invite
  name: alice
  attributes:
    email: alice@example.com
    role: reader
"#,
    )
    .unwrap();

    aiplane(dir.path())
        .args(["plan", "--manifest"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("project:ml"))
        .stdout(predicate::str::contains("invite:alice"))
        .stdout(predicate::str::contains("2 to create"));
}

#[test]
fn test_plan_detects_drift_and_orphans() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("manifest.yaml");
    std::fs::write(
        &manifest,
        "- type: project\n  name: ml\n  attributes:\n    name: ML Platform v2\n",
    )
    .unwrap();

    let state = dir.path().join("state.json");
    let observed = serde_json::json!({
        "version": 1,
        "resources": {
            "project:ml": {
                "id": {"parts": ["proj_1"]},
                "resource_type": "project",
                "status": "present",
                "attributes": {"id": "proj_1", "name": "ML Platform"},
                "untracked": [],
                "observed_at": "2026-01-01T00:00:00Z"
            },
            "invite:bob": {
                "id": {"parts": ["invite-1"]},
                "resource_type": "invite",
                "status": "present",
                "attributes": {"id": "invite-1", "email": "bob@example.com"},
                "untracked": [],
                "observed_at": "2026-01-01T00:00:00Z"
            }
        }
    });
    std::fs::write(&state, observed.to_string()).unwrap();

    aiplane(dir.path())
        .args(["plan", "--manifest"])
        .arg(&manifest)
        .arg("--state")
        .arg(&state)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 to update"))
        .stdout(predicate::str::contains("1 to delete"))
        .stdout(predicate::str::contains("ML Platform v2"));
}

#[test]
fn test_plan_rejects_unknown_type() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("manifest.yaml");
    std::fs::write(&manifest, "- type: spaceship\n  name: x\n").unwrap();

    aiplane(dir.path())
        .args(["plan", "--manifest"])
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown resource type"));
}

#[test]
fn test_apply_without_admin_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("manifest.yaml");
    std::fs::write(
        &manifest,
        "- type: project\n  name: ml\n  attributes:\n    name: ML Platform\n",
    )
    .unwrap();
    let out = dir.path().join("state.json");

    aiplane(dir.path())
        .env("OPENAI_API_KEY", "sk-project-only")
        .args(["apply", "--manifest"])
        .arg(&manifest)
        .arg("--out")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing_credential"))
        .stderr(predicate::str::contains("sk-project-only").not());

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert!(written["resources"].as_object().unwrap().is_empty());
}

#[test]
fn test_import_rejects_malformed_composite_id() {
    let dir = tempfile::tempdir().unwrap();
    aiplane(dir.path())
        .args(["import", "project_api_key", "key_only", "--key", "sk-test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid_request"));
}

#[test]
fn test_list_rejects_bad_page_size() {
    let dir = tempfile::tempdir().unwrap();
    aiplane(dir.path())
        .args(["list", "file", "--limit", "0", "--key", "sk-test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid_request"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("aiplane.yaml"), "concurrency: 0\n").unwrap();
    aiplane(dir.path())
        .args(["list", "file"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency"));
}
