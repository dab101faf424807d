//! CLI Integration Tests
//!
//! These tests run the `miramode` binary and check its output and exit
//! codes. Each test points `MIRAMODE_CONFIG` at a scratch file so the
//! user's configuration is never touched. Tests that need a controller
//! are marked with #[ignore].
//!
//! Run hardware tests:
//! ```text
//! MIRAMODE_DEVICE="Mira Shower" cargo test --package miramode-cli --test cli_integration -- --ignored --nocapture
//! ```

use std::env;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Run miramode with an isolated config file
fn run_miramode(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_miramode"))
        .args(args)
        .env("MIRAMODE_CONFIG", config)
        .env_remove("MIRAMODE_DEVICE")
        .env_remove("MIRAMODE_CLIENT_ID")
        .env_remove("MIRAMODE_CLIENT_SLOT")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to run miramode binary")
}

fn scratch() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    (dir, path)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// =============================================================================
// Help and Version Tests (no hardware required)
// =============================================================================

#[test]
fn test_help_command() {
    let (_dir, config) = scratch();
    let output = run_miramode(&config, &["--help"]);

    assert!(output.status.success(), "Help should succeed");

    let out = stdout(&output);
    assert!(out.contains("Mira Mode"), "Help should mention Mira Mode");
    for command in [
        "client-list",
        "client-pair",
        "client-unpair",
        "state",
        "control",
        "preset-start",
        "scan",
        "config",
    ] {
        assert!(out.contains(command), "Help should list {}", command);
    }
}

#[test]
fn test_version_command() {
    let (_dir, config) = scratch();
    let output = run_miramode(&config, &["--version"]);

    assert!(output.status.success(), "Version should succeed");
    assert!(stdout(&output).contains("miramode"));
}

#[test]
fn test_subcommand_help() {
    let (_dir, config) = scratch();

    let output = run_miramode(&config, &["control", "--help"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("--outlet1"));
    assert!(out.contains("--temperature"));
    assert!(out.contains("--client-id"));

    let output = run_miramode(&config, &["client-pair", "--help"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("--client-name"));
}

#[test]
fn test_invalid_subcommand() {
    let (_dir, config) = scratch();
    let output = run_miramode(&config, &["frobnicate"]);

    assert!(!output.status.success(), "Unknown subcommand should fail");
}

#[test]
fn test_completions_bash() {
    let (_dir, config) = scratch();
    let output = run_miramode(&config, &["completions", "bash"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("miramode"));
}

// =============================================================================
// Argument validation (fails before any BLE activity)
// =============================================================================

#[test]
fn test_client_pair_rejects_long_name() {
    let (_dir, config) = scratch();
    let name = "x".repeat(21);
    let output = run_miramode(&config, &["client-pair", "-a", "AA:BB:CC:DD:EE:FF", "-n", &name]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("at most 20"));
}

#[test]
fn test_client_pair_rejects_reserved_id() {
    let (_dir, config) = scratch();
    let output = run_miramode(
        &config,
        &["client-pair", "-a", "AA:BB:CC:DD:EE:FF", "-n", "cli", "-c", "1423109731"],
    );

    assert!(!output.status.success());
}

#[test]
fn test_state_without_identity_fails() {
    let (_dir, config) = scratch();
    let output = run_miramode(&config, &["state", "-a", "AA:BB:CC:DD:EE:FF"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("No paired client specified"));
}

#[test]
fn test_info_without_device_fails() {
    let (_dir, config) = scratch();
    let output = run_miramode(&config, &["info"]);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("No device specified"));
    assert!(err.contains("miramode scan"));
}

#[test]
fn test_control_rejects_bad_outlet_value() {
    let (_dir, config) = scratch();
    let output = run_miramode(&config, &["control", "--outlet1", "maybe"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid boolean value"));
}

// =============================================================================
// Config management
// =============================================================================

#[test]
fn test_config_path_honors_env() {
    let (_dir, config) = scratch();
    let output = run_miramode(&config, &["config", "path"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), config.display().to_string());
}

#[test]
fn test_config_set_get_unset() {
    let (_dir, config) = scratch();

    let output = run_miramode(&config, &["config", "set", "client-id", "4242"]);
    assert!(output.status.success(), "set failed: {}", stderr(&output));
    let output = run_miramode(&config, &["config", "set", "temperature-mapping", "legacy"]);
    assert!(output.status.success(), "set failed: {}", stderr(&output));

    let output = run_miramode(&config, &["config", "get", "client-id"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "4242");

    let output = run_miramode(&config, &["--json", "config", "show"]);
    assert!(output.status.success());
    let shown: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(shown["client_id"], 4242);
    assert_eq!(shown["temperature_mapping"], "legacy");

    let output = run_miramode(&config, &["config", "unset", "client-id"]);
    assert!(output.status.success());
    let output = run_miramode(&config, &["config", "get", "client-id"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("client-id is not set"));
}

#[test]
fn test_config_set_rejects_invalid_values() {
    let (_dir, config) = scratch();

    for (key, value) in [
        ("client-id", "0"),
        ("client-slot", "300"),
        ("temperature-mapping", "kelvin"),
        ("connect-attempts", "0"),
        ("response-timeout", "soon"),
    ] {
        let output = run_miramode(&config, &["config", "set", key, value]);
        assert!(
            !output.status.success(),
            "{} = {} should be rejected",
            key,
            value
        );
    }
    assert!(!config.exists(), "rejected values must not create a config");
}

#[test]
fn test_config_init() {
    let (_dir, config) = scratch();

    let output = run_miramode(&config, &["config", "init"]);
    assert!(output.status.success());
    assert!(config.exists());

    let output = run_miramode(&config, &["config", "init"]);
    assert!(!output.status.success(), "init must not overwrite");
}

#[test]
fn test_identity_from_config_is_used() {
    let (_dir, config) = scratch();
    std::fs::write(&config, "client_id = 4242\nclient_slot = 1\n").unwrap();

    // Identity resolves from config, so the failure is the missing device.
    let output = run_miramode(&config, &["state"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No device specified"));
}

// =============================================================================
// Hardware Tests (require a controller)
// =============================================================================

fn get_device() -> Option<String> {
    env::var("MIRAMODE_DEVICE").ok().filter(|s| !s.is_empty())
}

#[test]
#[ignore = "requires BLE hardware"]
fn test_scan_json_hardware() {
    let (_dir, config) = scratch();
    let output = run_miramode(&config, &["--json", "scan", "-T", "5"]);

    assert!(output.status.success(), "scan failed: {}", stderr(&output));
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert!(parsed["count"].is_number());
}

#[test]
#[ignore = "requires BLE hardware"]
fn test_info_hardware() {
    let Some(device) = get_device() else {
        println!("MIRAMODE_DEVICE not set, skipping");
        return;
    };
    let (_dir, config) = scratch();
    let output = run_miramode(&config, &["--json", "info", "-a", &device]);

    assert!(output.status.success(), "info failed: {}", stderr(&output));
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert!(parsed["manufacturer"].is_string());
}
