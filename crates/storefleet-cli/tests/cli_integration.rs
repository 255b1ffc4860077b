//! CLI subprocess integration tests.
//!
//! These tests invoke the `storefleet` binary as a subprocess and verify
//! exit codes and JSON output. None of them needs docker, ssh or a registry.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn storefleet_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_storefleet"));
    cmd.env("STOREFLEET_SKIP_PREREQS", "1");
    cmd.env("STOREFLEET_LOG", "off");
    cmd
}

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("storefleet.toml");
    std::fs::write(&path, body).unwrap();
    path
}

fn run(config: &Path, args: &[&str]) -> Output {
    storefleet_bin()
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .unwrap()
}

const DOCKER_CONFIG: &str = r#"[provider]
name = "docker"

[provider.docker]
server = "unix:///var/run/docker.sock"
image = "jerome/store:25.1"
[provider.docker.workdir]
host = "/var/stores"
local = "/tmp/stores"
"#;

#[test]
fn cli_version_exits_zero() {
    let output = storefleet_bin().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("storefleet"));
}

#[test]
fn cli_help_lists_commands() {
    let output = storefleet_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["list", "create", "destroy", "neighbours", "serve", "doctor"] {
        assert!(stdout.contains(cmd), "help must list '{cmd}'");
    }
}

#[test]
fn missing_config_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&dir.path().join("absent.toml"), &["list"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("config error:"));
}

#[test]
fn unknown_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[provider]\nname = \"docker\"\nflavour = \"x\"\n");
    let output = run(&config, &["list"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn create_with_unknown_provider_reports_failed_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[provider]\nname = \"k8s\"\n");
    let output = run(
        &config,
        &["--json", "create", "--owner", "alice", "--name", "shop", "--id", "s-1"],
    );
    assert_eq!(output.status.code(), Some(2));

    let store: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(store["id"], "s-1");
    assert_eq!(store["status"], "FAILED");
    assert_eq!(store["location"], "#");
    assert_eq!(store["log"], "unable to find a provider for name: k8s");
}

#[test]
fn dokku_without_identity_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let body = format!(
        "[provider]\nname = \"dokku\"\n\n[provider.dokku]\nhost = \"paas.example.org\"\n\
         image = \"store:1\"\nidentity = \"{}\"\nknown_hosts = \"{}\"\n",
        dir.path().join("missing_rsa").display(),
        dir.path().join("known_hosts").display(),
    );
    let config = write_config(dir.path(), &body);
    let output = run(&config, &["list"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing_rsa"));
}

#[test]
fn neighbours_require_topology() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), DOCKER_CONFIG);
    let output = run(&config, &["neighbours"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("topology is disabled"));
}

#[test]
fn serve_requires_topology() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), DOCKER_CONFIG);
    assert_eq!(run(&config, &["serve"]).status.code(), Some(2));
}

#[test]
fn doctor_passes_on_valid_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), DOCKER_CONFIG);
    let output = run(&config, &["--json", "doctor"]);
    assert!(
        output.status.success(),
        "stdout: {}",
        String::from_utf8_lossy(&output.stdout)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["healthy"], true);
    let names: Vec<&str> = report["checks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["config", "provider", "prereqs", "topology"]);
}

#[test]
fn doctor_flags_missing_provider_section() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[provider]\nname = \"dokku\"\n");
    let output = run(&config, &["--json", "doctor"]);
    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["healthy"], false);
}

#[test]
fn doctor_reports_bad_config_without_failing_to_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "not toml at all [");
    let output = run(&config, &["doctor"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Some checks failed"));
}
